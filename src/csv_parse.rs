//! Line-oriented, quote-aware tokenizer for the candidature feed.
//!
//! The feed is not strict RFC 4180: fields are padded with spaces around
//! delimiters and quotes may start after that padding or mid-field, which
//! the `csv` crate's reader treats as literal text. Records never span lines.

use std::collections::HashMap;

/// Header name to value for one accepted row.
pub type CsvRow = HashMap<String, String>;

#[derive(Debug, Clone, Default)]
pub struct ParsedDocument {
    pub headers: Vec<String>,
    pub rows: Vec<CsvRow>,
    /// Non-blank lines dropped because they had fewer fields than the header.
    pub short_rows: usize,
}

#[derive(Debug, Clone, Copy)]
pub struct CsvParser {
    delimiter: char,
}

impl Default for CsvParser {
    fn default() -> Self {
        Self { delimiter: ',' }
    }
}

impl CsvParser {
    pub fn with_delimiter(delimiter: char) -> Self {
        Self { delimiter }
    }

    /// Split one line into fields.
    ///
    /// `"` toggles quoting anywhere in a field and `""` inside quotes is a
    /// literal quote. Whitespace is trimmed from the ends of a field unless it
    /// was inside quotes.
    pub fn parse_line(&self, line: &str) -> Vec<String> {
        let mut fields = Vec::new();
        let mut current = String::new();
        let mut in_quotes = false;
        // Bytes of `current` that came from inside quotes and must survive trimming.
        let mut protected = 0usize;
        let mut chars = line.chars().peekable();

        while let Some(ch) = chars.next() {
            if ch == '"' {
                if in_quotes && chars.peek() == Some(&'"') {
                    current.push('"');
                    chars.next();
                    protected = current.len();
                } else {
                    in_quotes = !in_quotes;
                    protected = current.len();
                }
            } else if ch == self.delimiter && !in_quotes {
                fields.push(finish_field(&mut current, &mut protected));
            } else if in_quotes {
                current.push(ch);
                protected = current.len();
            } else if ch.is_whitespace() && current.is_empty() {
                // leading padding
            } else {
                current.push(ch);
            }
        }

        fields.push(finish_field(&mut current, &mut protected));
        fields
    }

    /// Parse a whole document: the first non-blank line is the header, blank
    /// lines are skipped, and rows shorter than the header are dropped. Extra
    /// trailing fields are ignored.
    pub fn parse_document(&self, text: &str) -> ParsedDocument {
        let mut lines = text.lines().filter(|l| !l.trim().is_empty());
        let Some(header_line) = lines.next() else {
            return ParsedDocument::default();
        };
        let headers = self.parse_line(header_line);

        let mut rows = Vec::new();
        let mut short_rows = 0usize;
        for line in lines {
            let values = self.parse_line(line);
            if values.len() < headers.len() {
                short_rows += 1;
                continue;
            }
            let row: CsvRow = headers.iter().cloned().zip(values).collect();
            rows.push(row);
        }

        ParsedDocument {
            headers,
            rows,
            short_rows,
        }
    }
}

fn finish_field(current: &mut String, protected: &mut usize) -> String {
    let keep = *protected + current[*protected..].trim_end().len();
    current.truncate(keep);
    *protected = 0;
    std::mem::take(current)
}
