//! Database schema definition

pub const SCHEMA: &str = r#"
-- Nodes table: code entities (functions, variables, constants, interfaces, types)
CREATE TABLE IF NOT EXISTS nodes (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    kind TEXT NOT NULL,
    name TEXT NOT NULL,
    module TEXT NOT NULL,
    file TEXT NOT NULL,
    line INTEGER NOT NULL,
    signature TEXT,
    doc TEXT
);

-- Edges table: relationships between nodes
CREATE TABLE IF NOT EXISTS edges (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    from_id INTEGER NOT NULL,
    to_id INTEGER NOT NULL,
    kind TEXT NOT NULL,
    call_site_file TEXT,
    call_site_line INTEGER,
    FOREIGN KEY (from_id) REFERENCES nodes(id),
    FOREIGN KEY (to_id) REFERENCES nodes(id)
);

CREATE INDEX IF NOT EXISTS idx_edges_from ON edges(from_id);
CREATE INDEX IF NOT EXISTS idx_edges_to ON edges(to_id);
CREATE INDEX IF NOT EXISTS idx_nodes_name ON nodes(name);
CREATE INDEX IF NOT EXISTS idx_nodes_module ON nodes(module);
"#;

/// Drops both tables; `SCHEMA` recreates them
pub const DROP_ALL: &str = r#"
DROP TABLE IF EXISTS edges;
DROP TABLE IF EXISTS nodes;
"#;
