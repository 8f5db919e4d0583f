//! Change impact and risk
//!
//! Every reported risk `level` comes from direct fan-in, a single indexed
//! count. Transitive caller totals are only produced by
//! [`ImpactAnalyzer::transitive_risk`], which is bounded and never used as a
//! stand-in for the direct count.

use std::collections::HashSet;

use serde::Serialize;

use crate::db::Database;
use crate::error::{Lookup, Result};
use crate::graph::Graph;
use crate::types::{EdgeKind, Node, NodeKind, RiskLevel, RiskScore, TransitiveRisk};

/// Depth used by `transitive_risk` when asked for an unbounded walk
pub const MAX_TRANSITIVE_DEPTH: u32 = 10;

/// What a change to `target` touches.
///
/// For variables and constants `direct_callers` holds the functions that
/// reference the value, and both callee lists are empty.
#[derive(Debug, Clone, Serialize)]
pub struct ImpactReport {
    pub target: Node,
    pub direct_callers: Vec<Node>,
    pub indirect_callers: Vec<Node>,
    pub direct_callees: Vec<Node>,
    pub indirect_callees: Vec<Node>,
    /// Direct fan-in of the target
    pub fan_in: u64,
    pub risk: RiskLevel,
}

impl ImpactReport {
    /// Whether `direct_callers` holds referencing functions rather than callers
    pub fn is_value_target(&self) -> bool {
        self.target.kind.is_value()
    }

    pub fn total_callers(&self) -> usize {
        self.direct_callers.len() + self.indirect_callers.len()
    }

    pub fn total_callees(&self) -> usize {
        self.direct_callees.len() + self.indirect_callees.len()
    }

    pub fn summary(&self) -> String {
        format!(
            "Target: {}, Direct Callers: {}, Indirect Callers: {}, Direct Callees: {}, Indirect Callees: {}, Risk: {}",
            self.target.short_name(),
            self.direct_callers.len(),
            self.indirect_callers.len(),
            self.direct_callees.len(),
            self.indirect_callees.len(),
            self.risk
        )
    }
}

pub struct ImpactAnalyzer<'a> {
    db: &'a Database,
    graph: Graph<'a>,
}

impl<'a> ImpactAnalyzer<'a> {
    pub fn new(db: &'a Database) -> Self {
        Self {
            db,
            graph: Graph::new(db),
        }
    }

    /// Resolve a user-supplied name: exact qualified name first, then pattern.
    ///
    /// A qualified name shared by several entities is ambiguous.
    pub fn resolve(&self, pattern: &str) -> Result<Lookup<Node>> {
        let mut exact = self.db.find_nodes_by_exact_name(pattern)?;
        match exact.len() {
            0 => {}
            1 => return Ok(Lookup::Found(exact.remove(0))),
            _ => return Ok(Lookup::Ambiguous(exact)),
        }

        let mut candidates = self.db.find_nodes_by_pattern(pattern)?;
        Ok(match candidates.len() {
            0 => Lookup::NotFound(pattern.to_string()),
            1 => Lookup::Found(candidates.remove(0)),
            _ => Lookup::Ambiguous(candidates),
        })
    }

    pub fn analyze_impact(
        &self,
        pattern: &str,
        upstream_depth: u32,
        downstream_depth: u32,
    ) -> Result<Lookup<ImpactReport>> {
        let target = match self.resolve(pattern)? {
            Lookup::Found(node) => node,
            Lookup::Ambiguous(nodes) => return Ok(Lookup::Ambiguous(nodes)),
            Lookup::NotFound(name) => return Ok(Lookup::NotFound(name)),
        };
        self.impact_of(target, upstream_depth, downstream_depth)
            .map(Lookup::Found)
    }

    /// Impact report for an already resolved node
    pub fn impact_of(
        &self,
        target: Node,
        upstream_depth: u32,
        downstream_depth: u32,
    ) -> Result<ImpactReport> {
        let risk = self.risk_of_node(&target)?;

        if target.kind.is_value() {
            return Ok(ImpactReport {
                direct_callers: self.graph.referencing_units(target.id)?,
                indirect_callers: Vec::new(),
                direct_callees: Vec::new(),
                indirect_callees: Vec::new(),
                fan_in: risk.direct_callers,
                risk: risk.level,
                target,
            });
        }

        let callers = self.graph.upstream_reach(target.id, upstream_depth)?;
        let callees = self.graph.downstream_reach(target.id, downstream_depth)?;

        Ok(ImpactReport {
            direct_callers: callers.direct,
            indirect_callers: callers.indirect,
            direct_callees: callees.direct,
            indirect_callees: callees.indirect,
            fan_in: risk.direct_callers,
            risk: risk.level,
            target,
        })
    }

    /// Direct fan-in risk of a node; `None` if it does not exist
    pub fn risk_of(&self, id: i64) -> Result<Option<RiskScore>> {
        match self.db.get_node(id)? {
            Some(node) => self.risk_of_node(&node).map(Some),
            None => Ok(None),
        }
    }

    fn risk_of_node(&self, node: &Node) -> Result<RiskScore> {
        let direct_callers = match node.kind.fan_in_kind() {
            Some(kind) => self.db.count_incoming(node.id, kind)?,
            None => 0,
        };
        Ok(RiskScore {
            node: node.clone(),
            direct_callers,
            level: RiskLevel::from_direct_callers(direct_callers),
        })
    }

    /// Functions ranked by direct fan-in, highest first
    pub fn top_risky(&self, limit: u32) -> Result<Vec<RiskScore>> {
        let ranked = self
            .db
            .get_top_fan_in(NodeKind::Function, EdgeKind::Calls, limit)?;
        Ok(ranked
            .into_iter()
            .map(|(node, direct_callers)| RiskScore {
                node,
                direct_callers,
                level: RiskLevel::from_direct_callers(direct_callers),
            })
            .collect())
    }

    /// Exact risk from direct and transitive callers, walking at most
    /// `max_depth` levels (0 uses `MAX_TRANSITIVE_DEPTH`).
    ///
    /// For values the walk starts from the referencing functions.
    pub fn transitive_risk(&self, id: i64, max_depth: u32) -> Result<Option<TransitiveRisk>> {
        let node = match self.db.get_node(id)? {
            Some(node) => node,
            None => return Ok(None),
        };
        let depth = if max_depth == 0 {
            MAX_TRANSITIVE_DEPTH
        } else {
            max_depth.min(MAX_TRANSITIVE_DEPTH)
        };

        let direct = self.risk_of_node(&node)?.direct_callers;
        let mut callers: HashSet<i64> = if node.kind.is_value() {
            let mut all = HashSet::new();
            for unit in self.graph.referencing_units(node.id)? {
                all.insert(unit.id);
                if depth > 1 {
                    all.extend(self.graph.upstream(unit.id, depth - 1)?.iter().map(|n| n.id));
                }
            }
            all
        } else if node.kind.is_callable() {
            self.graph
                .upstream(node.id, depth)?
                .iter()
                .map(|n| n.id)
                .collect()
        } else {
            self.graph
                .implementations(node.id)?
                .iter()
                .map(|n| n.id)
                .collect()
        };
        callers.remove(&node.id);
        let total = callers.len() as u64;

        Ok(Some(TransitiveRisk {
            direct_callers: direct,
            total_callers: total,
            depth,
            level: RiskLevel::from_caller_counts(direct, total),
            node,
        }))
    }
}
