//! Minimal comma-separated row codec.
//!
//! Writes fields with minimal quoting and `\r\n` row terminators. The reader
//! accepts quoted fields (doubled quotes, embedded separators and newlines)
//! with either `\n` or `\r\n` terminators.

use std::io::{self, Write};

fn needs_quotes(field: &str) -> bool {
    field.contains([',', '"', '\r', '\n'])
}

pub(crate) fn write_row<W: Write>(writer: &mut W, fields: &[&str]) -> io::Result<()> {
    for (i, field) in fields.iter().enumerate() {
        if i > 0 {
            writer.write_all(b",")?;
        }
        if needs_quotes(field) {
            write!(writer, "\"{}\"", field.replace('"', "\"\""))?;
        } else {
            writer.write_all(field.as_bytes())?;
        }
    }
    writer.write_all(b"\r\n")
}

/// Split `text` into rows of fields. Blank lines become empty rows.
pub(crate) fn parse_rows(text: &str) -> Result<Vec<Vec<String>>, String> {
    let mut rows = Vec::new();
    let mut row: Vec<String> = Vec::new();
    let mut field = String::new();
    let mut in_quotes = false;
    // The current line has at least one column, possibly empty.
    let mut row_open = false;
    let mut field_quoted = false;
    let mut chars = text.chars().peekable();

    while let Some(c) = chars.next() {
        if in_quotes {
            match c {
                '"' if chars.peek() == Some(&'"') => {
                    chars.next();
                    field.push('"');
                }
                '"' => in_quotes = false,
                other => field.push(other),
            }
            continue;
        }

        match c {
            '"' if field.is_empty() && !field_quoted => {
                in_quotes = true;
                field_quoted = true;
                row_open = true;
            }
            '"' => return Err(format!("unexpected quote in row {}", rows.len() + 1)),
            ',' => {
                row.push(std::mem::take(&mut field));
                field_quoted = false;
                row_open = true;
            }
            '\r' if chars.peek() == Some(&'\n') => {}
            '\n' | '\r' => {
                if row_open || !field.is_empty() {
                    row.push(std::mem::take(&mut field));
                }
                rows.push(std::mem::take(&mut row));
                row_open = false;
                field_quoted = false;
            }
            other => field.push(other),
        }
    }

    if in_quotes {
        return Err("unterminated quoted field".to_string());
    }
    if row_open || !field.is_empty() {
        row.push(field);
        rows.push(row);
    }

    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn written(fields: &[&str]) -> String {
        let mut buf = Vec::new();
        write_row(&mut buf, fields).unwrap();
        String::from_utf8(buf).unwrap()
    }

    #[test]
    fn plain_fields_are_not_quoted() {
        assert_eq!(written(&["a", "b"]), "a,b\r\n");
    }

    #[test]
    fn special_fields_are_quoted() {
        assert_eq!(written(&["a,b", "say \"hi\""]), "\"a,b\",\"say \"\"hi\"\"\"\r\n");
    }

    #[test]
    fn parses_quoted_and_multiline_fields() {
        let rows = parse_rows("\"a,b\",\"line1\nline2\"\r\nc,\"\"\n").unwrap();
        assert_eq!(
            rows,
            vec![
                vec!["a,b".to_string(), "line1\nline2".to_string()],
                vec!["c".to_string(), String::new()],
            ]
        );
    }

    #[test]
    fn last_row_without_terminator() {
        let rows = parse_rows("a,b\nc,d").unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[1], vec!["c".to_string(), "d".to_string()]);
    }

    #[test]
    fn blank_lines_are_empty_rows() {
        let rows = parse_rows("a,b\n\nc,d\n").unwrap();
        assert_eq!(rows[1], Vec::<String>::new());
    }

    #[test]
    fn stray_quote_is_an_error() {
        assert!(parse_rows("ab\"c,d\n").is_err());
        assert!(parse_rows("\"open,d\n").is_err());
    }
}
