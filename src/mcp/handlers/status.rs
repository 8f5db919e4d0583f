//! Status handler

use crate::db::Database;
use crate::format;

pub fn handle_status(db: &Database) -> String {
    let stats = match db.get_stats() {
        Ok(s) => s,
        Err(e) => return format!("Error: {}", e),
    };

    let mut output = format::stats(&stats);

    match db.get_modules() {
        Ok(modules) if !modules.is_empty() => {
            output.push_str("\n**Modules:**\n");
            for module in modules.iter().take(50) {
                output.push_str(&format!("- {}\n", module));
            }
            if modules.len() > 50 {
                output.push_str(&format!("- ... and {} more\n", modules.len() - 50));
            }
        }
        Ok(_) => output.push_str("\nIndex is empty. Run `callmap index` first.\n"),
        Err(e) => output.push_str(&format!("\nError listing modules: {}\n", e)),
    }

    output
}
