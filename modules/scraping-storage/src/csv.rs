// Minimal RFC 4180 writer for flat JSON rows.

use serde_json::{Map, Value};

/// Render rows as CSV with a header line. Missing columns become empty cells.
pub fn write_rows(columns: &[&str], rows: &[&Map<String, Value>]) -> String {
    let mut out = String::new();
    push_line(&mut out, columns.iter().map(|c| c.to_string()));
    for row in rows {
        push_line(
            &mut out,
            columns
                .iter()
                .map(|c| row.get(*c).map(render_cell).unwrap_or_default()),
        );
    }
    out
}

fn push_line(out: &mut String, cells: impl Iterator<Item = String>) {
    let line: Vec<String> = cells.map(|c| escape(&c)).collect();
    out.push_str(&line.join(","));
    out.push('\n');
}

fn render_cell(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        // Lists and nested objects are kept as JSON text.
        other => other.to_string(),
    }
}

fn escape(cell: &str) -> String {
    if cell.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", cell.replace('"', "\"\""))
    } else {
        cell.to_string()
    }
}
