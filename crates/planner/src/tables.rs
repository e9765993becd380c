//! Formats the memory-table plugin's export into a plain-text report.
//!
//! Export shape: `{ "<sheetId>": { "name": "...", "content": [[..headers..], [..row..], ...] } }`.
//! Row 0 holds the headers and column 0 of every row is the plugin's index
//! column, so both are skipped when emitting data.

use plotmaster_core::host::TableSource;
use serde_json::Value;

pub const NO_TABLE_DATA: &str = "No table data is currently available.";
pub const TABLE_INTRO: &str = "Below is all table data saved by the memory-table plugin for the current chat:\n";
pub const TABLE_END: &str = "\n--- End of table data ---\n";
pub const TABLE_PLUGIN_MISSING: &str = "The memory-table plugin is not loaded or is incompatible.";
pub const TABLE_EXPORT_FAILED: &str = r#"{"error": "failed to load table data"}"#;

/// Render an export for inclusion in a prompt.
pub fn format_tables(export: Option<&Value>) -> String {
    let sheets = match export {
        Some(Value::Object(sheets)) => sheets,
        _ => return format!("{NO_TABLE_DATA}{TABLE_END}"),
    };

    let body: String = sheets.values().filter_map(format_sheet).collect();

    if body.is_empty() {
        format!("{NO_TABLE_DATA}{TABLE_END}")
    } else {
        format!("{TABLE_INTRO}{body}{TABLE_END}")
    }
}

/// Query the table source, degrading to a sentinel instead of failing.
pub fn table_text(source: Option<&dyn TableSource>) -> String {
    let Some(source) = source else {
        return TABLE_PLUGIN_MISSING.to_string();
    };

    match source.export_tables() {
        Ok(export) => format_tables(Some(&export)),
        Err(e) => {
            tracing::warn!(error = %e, "Memory-table export failed");
            TABLE_EXPORT_FAILED.to_string()
        }
    }
}

fn format_sheet(sheet: &Value) -> Option<String> {
    let name = sheet.get("name").and_then(Value::as_str).filter(|n| !n.is_empty())?;
    let rows = sheet.get("content").and_then(Value::as_array)?;
    if rows.len() < 2 {
        return None;
    }

    let headers: Vec<String> = row_cells(&rows[0]).map(cell_text).collect();
    let mut out = format!("\n## Table: {name}\n");

    for (row_index, row) in rows[1..].iter().enumerate() {
        let cells: Vec<&Value> = row_cells(row).collect();
        let mut lines = String::new();

        for (column, header) in headers.iter().enumerate() {
            let Some(cell) = cells.get(column) else {
                continue;
            };
            let value = cell_text(cell);
            if value.trim().is_empty() {
                continue;
            }
            lines.push_str(&format!("  - {header}: {value}\n"));
        }

        if !lines.is_empty() {
            out.push_str(&format!("\n### {name} - Record {}\n{lines}", row_index + 1));
        }
    }

    Some(out)
}

/// Cells of a row after the index column.
fn row_cells(row: &Value) -> impl Iterator<Item = &Value> {
    row.as_array().into_iter().flatten().skip(1)
}

fn cell_text(cell: &Value) -> String {
    match cell {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use plotmaster_core::error::HostError;
    use serde_json::json;

    #[test]
    fn absent_or_empty_input_yields_sentinel_and_end_marker() {
        let expected = format!("{NO_TABLE_DATA}{TABLE_END}");
        assert_eq!(format_tables(None), expected);
        assert_eq!(format_tables(Some(&json!({}))), expected);
        assert_eq!(format_tables(Some(&json!(null))), expected);
        assert_eq!(format_tables(Some(&json!([1, 2]))), expected);
    }

    #[test]
    fn zero_valid_sheets_yields_sentinel_and_end_marker() {
        let export = json!({
            "s1": { "name": "", "content": [["", "h"], ["0", "v"]] },
            "s2": { "name": "Only headers", "content": [["", "h"]] },
            "s3": { "content": [["", "h"], ["0", "v"]] },
            "s4": "not a sheet"
        });
        assert_eq!(format_tables(Some(&export)), format!("{NO_TABLE_DATA}{TABLE_END}"));
    }

    #[test]
    fn formats_rows_and_skips_index_column() {
        let export = json!({
            "sheet_a": {
                "name": "Characters",
                "content": [
                    [null, "Name", "Mood"],
                    ["0", "Alice", "calm"],
                    ["1", "Bob", ""]
                ]
            }
        });
        let text = format_tables(Some(&export));
        let expected = format!(
            "{TABLE_INTRO}\n## Table: Characters\n\
             \n### Characters - Record 1\n  - Name: Alice\n  - Mood: calm\n\
             \n### Characters - Record 2\n  - Name: Bob\n\
             {TABLE_END}"
        );
        assert_eq!(text, expected);
    }

    #[test]
    fn blank_rows_are_skipped_but_keep_their_position() {
        let export = json!({
            "s": {
                "name": "Events",
                "content": [
                    ["", "What"],
                    ["0", "  "],
                    ["1", null],
                    ["2", "storm"]
                ]
            }
        });
        let text = format_tables(Some(&export));
        assert!(!text.contains("Record 1"));
        assert!(!text.contains("Record 2"));
        assert!(text.contains("### Events - Record 3\n  - What: storm\n"));
    }

    #[test]
    fn non_string_cells_are_rendered() {
        let export = json!({
            "s": { "name": "Stats", "content": [["", "HP", "Alive"], ["0", 42, true]] }
        });
        let text = format_tables(Some(&export));
        assert!(text.contains("  - HP: 42\n"));
        assert!(text.contains("  - Alive: true\n"));
    }

    #[test]
    fn sheets_keep_export_order() {
        let export = json!({
            "z": { "name": "Zeta", "content": [["", "k"], ["0", "1"]] },
            "a": { "name": "Alpha", "content": [["", "k"], ["0", "2"]] }
        });
        let text = format_tables(Some(&export));
        let zeta = text.find("Zeta").unwrap();
        let alpha = text.find("Alpha").unwrap();
        assert!(zeta < alpha);
    }

    struct Failing;

    impl TableSource for Failing {
        fn export_tables(&self) -> Result<Value, HostError> {
            Err(HostError::Unavailable("plugin crashed".into()))
        }
    }

    #[test]
    fn table_text_degrades() {
        assert_eq!(table_text(None), TABLE_PLUGIN_MISSING);
        assert_eq!(table_text(Some(&Failing)), TABLE_EXPORT_FAILED);

        let tables = plotmaster_core::host::StaticTables::new(json!({}));
        assert_eq!(table_text(Some(&tables)), format!("{NO_TABLE_DATA}{TABLE_END}"));
    }
}
