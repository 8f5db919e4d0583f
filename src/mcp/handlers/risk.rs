//! Risk handler

use super::resolve;
use crate::db::Database;
use crate::format;
use crate::impact::ImpactAnalyzer;
use crate::mcp::constants::DEFAULT_RISK_LIMIT;
use crate::mcp::types::RiskRequest;

pub fn handle_risk(db: &Database, req: &RiskRequest) -> String {
    let analyzer = ImpactAnalyzer::new(db);

    let symbol = match req.symbol.as_deref() {
        Some(symbol) => symbol,
        None => {
            return match analyzer.top_risky(req.limit.unwrap_or(DEFAULT_RISK_LIMIT)) {
                Ok(scores) => format::top_risky(&scores),
                Err(e) => format!("Error: {}", e),
            }
        }
    };

    let node = match resolve(db, symbol) {
        Ok(node) => node,
        Err(message) => return message,
    };

    let mut output = match analyzer.risk_of(node.id) {
        Ok(Some(score)) => format::risk(&score),
        Ok(None) => return format!("Symbol '{}' not found", symbol),
        Err(e) => return format!("Error: {}", e),
    };

    if req.transitive.unwrap_or(false) {
        match analyzer.transitive_risk(node.id, 0) {
            Ok(Some(exact)) => {
                output.push('\n');
                output.push_str(&format::transitive_risk(&exact));
            }
            Ok(None) => {}
            Err(e) => output.push_str(&format!("\nError computing transitive risk: {}\n", e)),
        }
    }

    output
}
