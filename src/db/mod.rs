//! Database module for callmap
//!
//! Handles SQLite storage for the call graph including:
//! - Schema creation
//! - Node and edge storage with referential checks
//! - Ranked name lookup
//! - Scoped (per-module) deletes and orphan sweeping

mod schema;

use std::collections::BTreeSet;
use std::path::Path;

use rusqlite::{params, params_from_iter, Connection, OptionalExtension};
use tracing::debug;

use crate::error::{GraphError, Result};
use crate::types::{Edge, EdgeKind, Node, NodeKind, StoreStats};

pub use schema::SCHEMA;

const NODE_COLUMNS: &str = "n.id, n.kind, n.name, n.module, n.file, n.line, n.signature, n.doc";

/// Ranks a match: exact short name, then suffix, then substring; `?1` is the lowercased pattern
const MATCH_RANK: &str = r#"
    CASE
        WHEN lower(n.name) = ?1
          OR substr(lower(n.name), -(length(?1) + 1)) IN ('.' || ?1, '/' || ?1) THEN 0
        WHEN substr(lower(n.name), -length(?1)) = ?1 THEN 1
        ELSE 2
    END
"#;

/// Database handle for the call graph
pub struct Database {
    conn: Connection,
}

impl Database {
    /// Open or create a database at the given path
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let conn = Connection::open(path)?;
        let db = Self { conn };
        db.initialize()?;
        Ok(db)
    }

    /// Create an in-memory database (for testing)
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let db = Self { conn };
        db.initialize()?;
        Ok(db)
    }

    /// Enable foreign keys and create the schema
    fn initialize(&self) -> Result<()> {
        self.conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        self.conn.execute_batch(schema::SCHEMA)?;
        Ok(())
    }

    /// Underlying connection, for ad-hoc queries
    pub fn conn(&self) -> &Connection {
        &self.conn
    }

    // =========================================================================
    // Node Operations
    // =========================================================================

    /// Insert a node and return its ID
    pub fn insert_node(&self, node: &Node) -> Result<i64> {
        self.conn.execute(
            r#"
            INSERT INTO nodes (kind, name, module, file, line, signature, doc)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            "#,
            params![
                node.kind.as_str(),
                node.name,
                node.module,
                node.file_path,
                node.line as i64,
                node.signature,
                node.docstring,
            ],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    /// Get a node by ID
    pub fn get_node(&self, id: i64) -> Result<Option<Node>> {
        let sql = format!("SELECT {} FROM nodes n WHERE n.id = ?1", NODE_COLUMNS);
        let result = self
            .conn
            .query_row(&sql, params![id], Self::row_to_node)
            .optional()?;
        Ok(result)
    }

    /// Find a node by qualified name (exact match, lowest id wins)
    pub fn find_node_by_name(&self, name: &str) -> Result<Option<Node>> {
        let sql = format!(
            "SELECT {} FROM nodes n WHERE n.name = ?1 ORDER BY n.id LIMIT 1",
            NODE_COLUMNS
        );
        let result = self
            .conn
            .query_row(&sql, params![name], Self::row_to_node)
            .optional()?;
        Ok(result)
    }

    /// Every node whose qualified name is exactly `name`, lowest id first
    pub fn find_nodes_by_exact_name(&self, name: &str) -> Result<Vec<Node>> {
        let sql = format!(
            "SELECT {} FROM nodes n WHERE n.name = ?1 ORDER BY n.id",
            NODE_COLUMNS
        );
        self.query_nodes(&sql, params![name])
    }

    /// Find the node identified by name within a module and kind
    pub fn find_node(&self, name: &str, module: &str, kind: NodeKind) -> Result<Option<Node>> {
        let sql = format!(
            "SELECT {} FROM nodes n WHERE n.name = ?1 AND n.module = ?2 AND n.kind = ?3 LIMIT 1",
            NODE_COLUMNS
        );
        let result = self
            .conn
            .query_row(&sql, params![name, module, kind.as_str()], Self::row_to_node)
            .optional()?;
        Ok(result)
    }

    /// All nodes whose name contains `pattern` (case-insensitive), best match first.
    ///
    /// Ranking: exact short-name match, then name ends with the pattern, then
    /// name contains it; ties go to the shorter name.
    pub fn find_nodes_by_pattern(&self, pattern: &str) -> Result<Vec<Node>> {
        self.search_nodes(pattern, None, None)
    }

    /// Ranked search with optional kind filter and limit
    pub fn search_nodes(
        &self,
        pattern: &str,
        kind: Option<NodeKind>,
        limit: Option<u32>,
    ) -> Result<Vec<Node>> {
        let pattern = pattern.to_lowercase();
        if pattern.is_empty() {
            return Ok(Vec::new());
        }

        let sql = format!(
            r#"
            SELECT {} FROM nodes n
            WHERE instr(lower(n.name), ?1) > 0
              AND (?2 IS NULL OR n.kind = ?2)
            ORDER BY {}, length(n.name), n.name
            LIMIT ?3
            "#,
            NODE_COLUMNS, MATCH_RANK
        );

        let limit = limit.map(i64::from).unwrap_or(-1);
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map(
            params![pattern, kind.map(|k| k.as_str()), limit],
            Self::row_to_node,
        )?;

        let mut nodes = Vec::new();
        for row in rows {
            nodes.push(row?);
        }
        Ok(nodes)
    }

    /// All nodes of a kind, ordered by name
    pub fn get_nodes_by_kind(&self, kind: NodeKind) -> Result<Vec<Node>> {
        let sql = format!(
            "SELECT {} FROM nodes n WHERE n.kind = ?1 ORDER BY n.name",
            NODE_COLUMNS
        );
        self.query_nodes(&sql, params![kind.as_str()])
    }

    /// Nodes belonging to any of the given modules
    pub fn get_nodes_by_modules(&self, modules: &BTreeSet<String>) -> Result<Vec<Node>> {
        if modules.is_empty() {
            return Ok(Vec::new());
        }
        let sql = format!(
            "SELECT {} FROM nodes n WHERE n.module IN ({}) ORDER BY n.module, n.line",
            NODE_COLUMNS,
            placeholders(modules.len())
        );
        self.query_nodes(&sql, params_from_iter(modules.iter()))
    }

    /// Distinct module names in the store
    pub fn get_modules(&self) -> Result<Vec<String>> {
        let mut stmt = self
            .conn
            .prepare("SELECT DISTINCT module FROM nodes ORDER BY module")?;
        let rows = stmt.query_map([], |row| row.get(0))?;

        let mut modules = Vec::new();
        for row in rows {
            modules.push(row?);
        }
        Ok(modules)
    }

    /// Distinct `(file, module)` pairs of nodes that carry a source file
    pub fn get_file_modules(&self) -> Result<Vec<(String, String)>> {
        let mut stmt = self.conn.prepare(
            "SELECT DISTINCT file, module FROM nodes WHERE file != '' ORDER BY file, module",
        )?;
        let rows = stmt.query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?;

        let mut pairs = Vec::new();
        for row in rows {
            pairs.push(row?);
        }
        Ok(pairs)
    }

    fn row_to_node(row: &rusqlite::Row) -> rusqlite::Result<Node> {
        Ok(Node {
            id: row.get(0)?,
            kind: NodeKind::from_str(&row.get::<_, String>(1)?).unwrap_or(NodeKind::Function),
            name: row.get(2)?,
            module: row.get(3)?,
            file_path: row.get(4)?,
            line: row.get::<_, i64>(5)? as u32,
            signature: row.get(6)?,
            docstring: row.get(7)?,
        })
    }

    fn query_nodes<P: rusqlite::Params>(&self, sql: &str, params: P) -> Result<Vec<Node>> {
        let mut stmt = self.conn.prepare(sql)?;
        let rows = stmt.query_map(params, Self::row_to_node)?;

        let mut nodes = Vec::new();
        for row in rows {
            nodes.push(row?);
        }
        Ok(nodes)
    }

    // =========================================================================
    // Edge Operations
    // =========================================================================

    /// Insert an edge.
    ///
    /// Fails with `UnknownEndpoint` if either end is missing and with
    /// `InvalidEdge` if the edge kind cannot connect the two node kinds.
    pub fn insert_edge(&self, edge: &Edge) -> Result<i64> {
        let from_kind = self.node_kind(edge.source_id)?;
        let to_kind = self.node_kind(edge.target_id)?;
        let (from_kind, to_kind) = match (from_kind, to_kind) {
            (Some(f), Some(t)) => (f, t),
            _ => {
                return Err(GraphError::UnknownEndpoint {
                    from: edge.source_id,
                    to: edge.target_id,
                })
            }
        };
        if !edge.kind.accepts(from_kind, to_kind) {
            return Err(GraphError::InvalidEdge {
                kind: edge.kind,
                from_kind,
                to_kind,
            });
        }

        self.conn.execute(
            r#"
            INSERT INTO edges (from_id, to_id, kind, call_site_file, call_site_line)
            VALUES (?1, ?2, ?3, ?4, ?5)
            "#,
            params![
                edge.source_id,
                edge.target_id,
                edge.kind.as_str(),
                edge.file_path,
                edge.line.map(|l| l as i64),
            ],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    fn node_kind(&self, id: i64) -> Result<Option<NodeKind>> {
        let kind: Option<String> = self
            .conn
            .query_row("SELECT kind FROM nodes WHERE id = ?1", params![id], |row| {
                row.get(0)
            })
            .optional()?;
        Ok(kind.and_then(|k| NodeKind::from_str(&k)))
    }

    /// Nodes with an edge of `kind` pointing into `node_id`
    pub fn get_sources(&self, node_id: i64, kind: EdgeKind) -> Result<Vec<Node>> {
        let sql = format!(
            r#"
            SELECT DISTINCT {} FROM nodes n
            INNER JOIN edges e ON e.from_id = n.id
            WHERE e.to_id = ?1 AND e.kind = ?2
            ORDER BY n.name
            "#,
            NODE_COLUMNS
        );
        self.query_nodes(&sql, params![node_id, kind.as_str()])
    }

    /// Nodes that `node_id` points at with an edge of `kind`
    pub fn get_targets(&self, node_id: i64, kind: EdgeKind) -> Result<Vec<Node>> {
        let sql = format!(
            r#"
            SELECT DISTINCT {} FROM nodes n
            INNER JOIN edges e ON e.to_id = n.id
            WHERE e.from_id = ?1 AND e.kind = ?2
            ORDER BY n.name
            "#,
            NODE_COLUMNS
        );
        self.query_nodes(&sql, params![node_id, kind.as_str()])
    }

    /// Get callers of a node (nodes that call this node)
    pub fn get_callers(&self, node_id: i64) -> Result<Vec<Node>> {
        self.get_sources(node_id, EdgeKind::Calls)
    }

    /// Get callees of a node (nodes that this node calls)
    pub fn get_callees(&self, node_id: i64) -> Result<Vec<Node>> {
        self.get_targets(node_id, EdgeKind::Calls)
    }

    /// Count edges of `kind` pointing into a node
    pub fn count_incoming(&self, node_id: i64, kind: EdgeKind) -> Result<u64> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM edges WHERE to_id = ?1 AND kind = ?2",
            params![node_id, kind.as_str()],
            |row| row.get(0),
        )?;
        Ok(count as u64)
    }

    /// Nodes of `node_kind` ordered by incoming `edge_kind` count, highest first
    pub fn get_top_fan_in(
        &self,
        node_kind: NodeKind,
        edge_kind: EdgeKind,
        limit: u32,
    ) -> Result<Vec<(Node, u64)>> {
        let sql = format!(
            r#"
            SELECT {}, COUNT(e.id) AS fan_in FROM nodes n
            LEFT JOIN edges e ON e.to_id = n.id AND e.kind = ?2
            WHERE n.kind = ?1
            GROUP BY n.id
            ORDER BY fan_in DESC, n.name
            LIMIT ?3
            "#,
            NODE_COLUMNS
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map(
            params![node_kind.as_str(), edge_kind.as_str(), limit as i64],
            |row| Ok((Self::row_to_node(row)?, row.get::<_, i64>(8)? as u64)),
        )?;

        let mut ranked = Vec::new();
        for row in rows {
            ranked.push(row?);
        }
        Ok(ranked)
    }

    /// Every edge in the store
    pub fn get_all_edges(&self) -> Result<Vec<Edge>> {
        self.query_edges("SELECT * FROM edges ORDER BY id", [])
    }

    fn query_edges<P: rusqlite::Params>(&self, sql: &str, params: P) -> Result<Vec<Edge>> {
        let mut stmt = self.conn.prepare(sql)?;
        let rows = stmt.query_map(params, Self::row_to_edge)?;

        let mut edges = Vec::new();
        for row in rows {
            edges.push(row?);
        }
        Ok(edges)
    }

    fn row_to_edge(row: &rusqlite::Row) -> rusqlite::Result<Edge> {
        Ok(Edge {
            id: row.get(0)?,
            source_id: row.get(1)?,
            target_id: row.get(2)?,
            kind: EdgeKind::from_str(&row.get::<_, String>(3)?).unwrap_or(EdgeKind::Calls),
            file_path: row.get(4)?,
            line: row.get::<_, Option<i64>>(5)?.map(|l| l as u32),
        })
    }

    // =========================================================================
    // Deletes
    // =========================================================================

    /// Delete every node in `modules` together with any edge touching them.
    ///
    /// Runs in a savepoint: either all of it applies or none does. Inside an
    /// open transaction nothing is committed until the caller commits.
    /// Returns the number of deleted nodes.
    pub fn delete_by_modules(&mut self, modules: &BTreeSet<String>) -> Result<usize> {
        if modules.is_empty() {
            return Ok(0);
        }

        let in_list = placeholders(modules.len());
        let tx = self.conn.savepoint()?;

        let edges = tx.execute(
            &format!(
                "DELETE FROM edges
                 WHERE from_id IN (SELECT id FROM nodes WHERE module IN ({0}))
                    OR to_id IN (SELECT id FROM nodes WHERE module IN ({0}))",
                in_list
            ),
            params_from_iter(modules.iter()),
        )?;
        let nodes = tx.execute(
            &format!("DELETE FROM nodes WHERE module IN ({})", in_list),
            params_from_iter(modules.iter()),
        )?;

        tx.commit()?;
        debug!("Deleted {} nodes and {} edges in {} modules", nodes, edges, modules.len());
        Ok(nodes)
    }

    /// Delete edges whose endpoints no longer exist
    pub fn delete_orphan_edges(&self) -> Result<usize> {
        let count = self.conn.execute(
            r#"
            DELETE FROM edges
            WHERE from_id NOT IN (SELECT id FROM nodes)
               OR to_id NOT IN (SELECT id FROM nodes)
            "#,
            [],
        )?;
        Ok(count)
    }

    /// Remove all nodes and edges, resetting id sequences
    pub fn clear(&mut self) -> Result<()> {
        let tx = self.conn.savepoint()?;
        tx.execute_batch(schema::DROP_ALL)?;
        tx.execute_batch(schema::SCHEMA)?;
        tx.commit()?;
        Ok(())
    }

    // =========================================================================
    // Statistics
    // =========================================================================

    /// Get store statistics
    pub fn get_stats(&self) -> Result<StoreStats> {
        let total_nodes: u64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM nodes", [], |row| row.get(0))?;
        let total_edges: u64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM edges", [], |row| row.get(0))?;
        let total_modules: u64 = self.conn.query_row(
            "SELECT COUNT(DISTINCT module) FROM nodes",
            [],
            |row| row.get(0),
        )?;

        let db_size_bytes: u64 = self
            .conn
            .query_row(
                "SELECT page_count * page_size FROM pragma_page_count(), pragma_page_size()",
                [],
                |row| row.get(0),
            )
            .unwrap_or(0);

        let mut stmt = self
            .conn
            .prepare("SELECT kind, COUNT(*) FROM nodes GROUP BY kind ORDER BY kind")?;
        let kind_rows = stmt.query_map([], |row| {
            let kind_str: String = row.get(0)?;
            let count: u64 = row.get(1)?;
            Ok((kind_str, count))
        })?;
        let mut node_kinds = Vec::new();
        for row in kind_rows {
            let (kind, count) = row?;
            if let Some(kind) = NodeKind::from_str(&kind) {
                node_kinds.push((kind, count));
            }
        }

        let mut stmt = self
            .conn
            .prepare("SELECT kind, COUNT(*) FROM edges GROUP BY kind ORDER BY kind")?;
        let edge_rows = stmt.query_map([], |row| {
            let kind_str: String = row.get(0)?;
            let count: u64 = row.get(1)?;
            Ok((kind_str, count))
        })?;
        let mut edge_kinds = Vec::new();
        for row in edge_rows {
            let (kind, count) = row?;
            if let Some(kind) = EdgeKind::from_str(&kind) {
                edge_kinds.push((kind, count));
            }
        }

        Ok(StoreStats {
            total_nodes,
            total_edges,
            total_modules,
            db_size_bytes,
            node_kinds,
            edge_kinds,
        })
    }

    /// Begin a transaction
    pub fn begin_transaction(&mut self) -> Result<()> {
        self.conn.execute_batch("BEGIN TRANSACTION")?;
        Ok(())
    }

    /// Commit a transaction
    pub fn commit(&mut self) -> Result<()> {
        self.conn.execute_batch("COMMIT")?;
        Ok(())
    }

    /// Rollback a transaction
    pub fn rollback(&mut self) -> Result<()> {
        self.conn.execute_batch("ROLLBACK")?;
        Ok(())
    }
}

/// `?1, ?2, ..., ?n`; numbered so a list can be bound once and used twice
fn placeholders(n: usize) -> String {
    (1..=n)
        .map(|i| format!("?{}", i))
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn function(db: &Database, name: &str, module: &str) -> i64 {
        db.insert_node(&Node::new(NodeKind::Function, name, module).at("main.go", 1))
            .unwrap()
    }

    fn modules(names: &[&str]) -> BTreeSet<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_node_roundtrip() {
        let db = Database::in_memory().unwrap();
        let mut node = Node::new(NodeKind::Function, "app/store.Open", "app/store")
            .at("store/open.go", 12);
        node.signature = Some("func(path string) (*DB, error)".to_string());
        node.docstring = Some("Open opens the store".to_string());

        let id = db.insert_node(&node).unwrap();
        node.id = id;

        assert_eq!(db.get_node(id).unwrap(), Some(node));
        assert_eq!(db.get_node(id + 100).unwrap(), None);
    }

    #[test]
    fn test_insert_edge_unknown_endpoint() {
        let db = Database::in_memory().unwrap();
        let a = function(&db, "a", "m");

        let err = db.insert_edge(&Edge::new(a, 999, EdgeKind::Calls)).unwrap_err();
        assert!(matches!(err, GraphError::UnknownEndpoint { from, to } if from == a && to == 999));
        assert_eq!(db.get_stats().unwrap().total_edges, 0);
    }

    #[test]
    fn test_insert_edge_rejects_kind_mismatch() {
        let db = Database::in_memory().unwrap();
        let f = function(&db, "f", "m");
        let v = db.insert_node(&Node::new(NodeKind::Variable, "m.V", "m")).unwrap();

        let err = db.insert_edge(&Edge::new(f, v, EdgeKind::Calls)).unwrap_err();
        assert!(matches!(err, GraphError::InvalidEdge { .. }));
        db.insert_edge(&Edge::new(f, v, EdgeKind::References)).unwrap();
    }

    #[test]
    fn test_pattern_ranking() {
        let db = Database::in_memory().unwrap();
        function(&db, "app/jobs.RunAll", "app/jobs");
        function(&db, "app/jobs.PreRun", "app/jobs");
        function(&db, "app/worker.Run", "app/worker");
        function(&db, "app/cmd.(*Server).Run", "app/cmd");

        let names: Vec<String> = db
            .find_nodes_by_pattern("Run")
            .unwrap()
            .into_iter()
            .map(|n| n.name)
            .collect();

        assert_eq!(
            names,
            vec![
                "app/worker.Run",
                "app/cmd.(*Server).Run",
                "app/jobs.PreRun",
                "app/jobs.RunAll",
            ]
        );
    }

    #[test]
    fn test_search_kind_filter_and_limit() {
        let db = Database::in_memory().unwrap();
        for i in 0..10 {
            function(&db, &format!("m.handle{}", i), "m");
        }
        db.insert_node(&Node::new(NodeKind::Constant, "m.handleLimit", "m"))
            .unwrap();

        assert_eq!(db.search_nodes("handle", None, Some(4)).unwrap().len(), 4);
        let consts = db
            .search_nodes("handle", Some(NodeKind::Constant), None)
            .unwrap();
        assert_eq!(consts.len(), 1);
        assert_eq!(consts[0].name, "m.handleLimit");
        assert!(db.search_nodes("", None, None).unwrap().is_empty());
    }

    #[test]
    fn test_delete_by_modules_removes_touching_edges() {
        let mut db = Database::in_memory().unwrap();
        let a = function(&db, "a.A", "a");
        let b = function(&db, "b.B", "b");
        let c = function(&db, "c.C", "c");
        db.insert_edge(&Edge::new(a, b, EdgeKind::Calls)).unwrap();
        db.insert_edge(&Edge::new(b, c, EdgeKind::Calls)).unwrap();
        db.insert_edge(&Edge::new(a, c, EdgeKind::Calls)).unwrap();

        let deleted = db.delete_by_modules(&modules(&["b"])).unwrap();
        assert_eq!(deleted, 1);

        let edges = db.get_all_edges().unwrap();
        assert_eq!(edges.len(), 1);
        assert_eq!((edges[0].source_id, edges[0].target_id), (a, c));
        assert!(db.get_node(b).unwrap().is_none());
    }

    #[test]
    fn test_delete_by_modules_rolls_back_on_failure() {
        let mut db = Database::in_memory().unwrap();
        let a = function(&db, "a.A", "a");
        let b = function(&db, "b.B", "b");
        db.insert_edge(&Edge::new(a, b, EdgeKind::Calls)).unwrap();
        db.conn()
            .execute_batch(
                "CREATE TRIGGER keep_nodes BEFORE DELETE ON nodes
                 BEGIN SELECT RAISE(ABORT, 'nodes are pinned'); END;",
            )
            .unwrap();

        assert!(db.delete_by_modules(&modules(&["b"])).is_err());
        // The edge delete ran before the failing node delete and must be undone
        assert_eq!(db.get_all_edges().unwrap().len(), 1);
        assert!(db.get_node(b).unwrap().is_some());
    }

    #[test]
    fn test_delete_by_modules_waits_for_outer_commit() {
        let mut db = Database::in_memory().unwrap();
        let a = function(&db, "a.A", "a");
        let b = function(&db, "b.B", "b");
        db.insert_edge(&Edge::new(a, b, EdgeKind::Calls)).unwrap();

        db.begin_transaction().unwrap();
        assert_eq!(db.delete_by_modules(&modules(&["b"])).unwrap(), 1);
        assert!(db.get_node(b).unwrap().is_none());
        db.rollback().unwrap();

        assert!(db.get_node(b).unwrap().is_some());
        assert_eq!(db.get_all_edges().unwrap().len(), 1);
    }

    #[test]
    fn test_exact_name_lists_every_kind() {
        let db = Database::in_memory().unwrap();
        let t = db.insert_node(&Node::new(NodeKind::Type, "app.Config", "app")).unwrap();
        let f = function(&db, "app.Config", "app");
        function(&db, "app.ConfigFor", "app");

        let ids: Vec<i64> = db
            .find_nodes_by_exact_name("app.Config")
            .unwrap()
            .into_iter()
            .map(|n| n.id)
            .collect();
        assert_eq!(ids, vec![t, f]);
        assert!(db.find_nodes_by_exact_name("Config").unwrap().is_empty());
    }

    #[test]
    fn test_file_modules() {
        let db = Database::in_memory().unwrap();
        db.insert_node(
            &Node::new(NodeKind::Function, "example.com/app/store.Open", "example.com/app/store")
                .at("store/db.go", 3),
        )
        .unwrap();
        db.insert_node(
            &Node::new(NodeKind::Function, "example.com/app/store.Close", "example.com/app/store")
                .at("store/db.go", 9),
        )
        .unwrap();
        db.insert_node(&Node::new(NodeKind::Function, "builtin.len", "builtin"))
            .unwrap();

        assert_eq!(
            db.get_file_modules().unwrap(),
            vec![("store/db.go".to_string(), "example.com/app/store".to_string())]
        );
    }

    #[test]
    fn test_delete_orphan_edges() {
        let db = Database::in_memory().unwrap();
        let a = function(&db, "a", "m");
        let b = function(&db, "b", "m");
        db.insert_edge(&Edge::new(a, b, EdgeKind::Calls)).unwrap();

        db.conn()
            .execute_batch(
                "PRAGMA foreign_keys = OFF;
                 DELETE FROM nodes WHERE name = 'b';
                 PRAGMA foreign_keys = ON;",
            )
            .unwrap();

        assert_eq!(db.delete_orphan_edges().unwrap(), 1);
        assert_eq!(db.delete_orphan_edges().unwrap(), 0);
    }

    #[test]
    fn test_clear_resets_store() {
        let mut db = Database::in_memory().unwrap();
        let a = function(&db, "a", "m");
        let b = function(&db, "b", "m");
        db.insert_edge(&Edge::new(a, b, EdgeKind::Calls)).unwrap();

        db.clear().unwrap();

        let stats = db.get_stats().unwrap();
        assert_eq!(stats.total_nodes, 0);
        assert_eq!(stats.total_edges, 0);
        assert_eq!(function(&db, "c", "m"), 1);
    }

    #[test]
    fn test_top_fan_in() {
        let db = Database::in_memory().unwrap();
        let hot = function(&db, "hot", "m");
        let warm = function(&db, "warm", "m");
        let cold = function(&db, "cold", "m");
        for i in 0..3 {
            let caller = function(&db, &format!("caller{}", i), "m");
            db.insert_edge(&Edge::new(caller, hot, EdgeKind::Calls)).unwrap();
        }
        db.insert_edge(&Edge::new(cold, warm, EdgeKind::Calls)).unwrap();

        let top = db
            .get_top_fan_in(NodeKind::Function, EdgeKind::Calls, 2)
            .unwrap();
        assert_eq!(top.len(), 2);
        assert_eq!((top[0].0.id, top[0].1), (hot, 3));
        assert_eq!((top[1].0.id, top[1].1), (warm, 1));
        assert_eq!(db.count_incoming(hot, EdgeKind::Calls).unwrap(), 3);
    }

    #[test]
    fn test_stats_and_modules() {
        let db = Database::in_memory().unwrap();
        function(&db, "a.F", "a");
        function(&db, "b.G", "b");
        db.insert_node(&Node::new(NodeKind::Interface, "b.Runner", "b"))
            .unwrap();

        let stats = db.get_stats().unwrap();
        assert_eq!(stats.total_nodes, 3);
        assert_eq!(stats.total_modules, 2);
        assert!(stats.node_kinds.contains(&(NodeKind::Interface, 1)));
        assert_eq!(db.get_modules().unwrap(), vec!["a", "b"]);
        assert_eq!(db.get_nodes_by_modules(&modules(&["b"])).unwrap().len(), 2);
    }
}
