//! Character-scanning CSV parser for discovery-call exports.
//!
//! Handles the dialect the historical exports actually use: comma
//! delimiters, double-quoted fields with embedded newlines and commas,
//! doubled double-quotes as escaped literal quotes, and both `\n` and
//! `\r\n` line endings. Fields are trimmed; rows whose fields are all
//! empty are dropped. The parser never fails: an unterminated quote
//! simply swallows the rest of the input into the current field.

/// Parse a whole CSV blob into rows of trimmed fields.
///
/// No header/data distinction is made here — callers treat row 0 as the
/// header.
pub fn parse_csv(input: &str) -> Vec<Vec<String>> {
    let mut rows: Vec<Vec<String>> = Vec::new();
    let mut row: Vec<String> = Vec::new();
    let mut field = String::new();
    let mut in_quotes = false;

    let mut chars = input.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '"' => {
                if in_quotes && chars.peek() == Some(&'"') {
                    // Escaped quote ("" -> ")
                    field.push('"');
                    chars.next();
                } else {
                    in_quotes = !in_quotes;
                }
            }
            ',' if !in_quotes => {
                row.push(field.trim().to_string());
                field.clear();
            }
            '\n' | '\r' if !in_quotes => {
                // \r\n is one line break, not two.
                if c == '\r' && chars.peek() == Some(&'\n') {
                    chars.next();
                }
                flush_row(&mut rows, &mut row, &mut field);
            }
            _ => field.push(c),
        }
    }

    flush_row(&mut rows, &mut row, &mut field);
    rows
}

/// Close out the current row, keeping it only if any field has content.
fn flush_row(rows: &mut Vec<Vec<String>>, row: &mut Vec<String>, field: &mut String) {
    if field.is_empty() && row.is_empty() {
        return;
    }
    row.push(std::mem::take(field).trim().to_string());
    if row.iter().any(|f| !f.is_empty()) {
        rows.push(std::mem::take(row));
    } else {
        row.clear();
    }
}
