//! Comma-separated table output for tool results.

use std::borrow::Cow;

/// Accumulates a header and rows, quoting fields per RFC 4180.
pub struct Table {
    buf: String,
    rows: usize,
}

impl Table {
    pub fn new(header: &[&str]) -> Self {
        let mut table = Self {
            buf: String::new(),
            rows: 0,
        };
        table.push_line(header);
        table
    }

    pub fn push_row<S: AsRef<str>>(&mut self, row: &[S]) {
        self.push_line(row);
        self.rows += 1;
    }

    /// Number of data rows (header excluded)
    pub fn len(&self) -> usize {
        self.rows
    }

    pub fn is_empty(&self) -> bool {
        self.rows == 0
    }

    pub fn finish(self) -> String {
        self.buf
    }

    fn push_line<S: AsRef<str>>(&mut self, fields: &[S]) {
        for (i, field) in fields.iter().enumerate() {
            if i > 0 {
                self.buf.push(',');
            }
            self.buf.push_str(&escape(field.as_ref()));
        }
        self.buf.push('\n');
    }
}

fn escape(field: &str) -> Cow<'_, str> {
    if field.contains([',', '"', '\n', '\r']) {
        Cow::Owned(format!("\"{}\"", field.replace('"', "\"\"")))
    } else {
        Cow::Borrowed(field)
    }
}
