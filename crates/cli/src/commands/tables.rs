//! `plotmaster tables` — print a memory-table export as the planner sees it.

use std::path::Path;

pub fn run(path: &Path) -> Result<(), Box<dyn std::error::Error>> {
    let json = std::fs::read_to_string(path)
        .map_err(|e| format!("Failed to read {}: {e}", path.display()))?;
    let export: serde_json::Value = serde_json::from_str(&json)?;
    print!("{}", plotmaster_planner::format_tables(Some(&export)));
    Ok(())
}
