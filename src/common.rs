//! Shared source-location primitives
//!
//! Syntax errors point into the document by byte span (and line/column);
//! every declaration in the raw tree is addressed by a document path such as
//! `service[0].aggregate[1].root.fields[2]`.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Byte range in the specification document
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

impl Span {
    pub fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }

    pub fn len(&self) -> usize {
        self.end.saturating_sub(self.start)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl From<std::ops::Range<usize>> for Span {
    fn from(range: std::ops::Range<usize>) -> Self {
        Self::new(range.start, range.end)
    }
}

/// 1-based line and column
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct LineCol {
    pub line: usize,
    pub column: usize,
}

impl LineCol {
    /// Translate a byte offset into a line/column pair.
    pub fn from_offset(source: &str, offset: usize) -> Self {
        let offset = offset.min(source.len());
        let before = &source[..floor_char_boundary(source, offset)];
        let line = before.matches('\n').count() + 1;
        let line_start = before.rfind('\n').map_or(0, |i| i + 1);
        let column = before[line_start..].chars().count() + 1;
        Self { line, column }
    }
}

impl fmt::Display for LineCol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.line, self.column)
    }
}

fn floor_char_boundary(source: &str, mut offset: usize) -> usize {
    while offset > 0 && !source.is_char_boundary(offset) {
        offset -= 1;
    }
    offset
}

/// Path of a declaration inside the specification document
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DocPath(String);

impl DocPath {
    pub fn root() -> Self {
        Self(String::new())
    }

    /// `parent.key`
    pub fn key(&self, key: &str) -> Self {
        if self.0.is_empty() {
            Self(key.to_string())
        } else {
            Self(format!("{}.{}", self.0, key))
        }
    }

    /// `parent.key[index]`
    pub fn index(&self, key: &str, index: usize) -> Self {
        let mut path = self.key(key);
        path.0.push_str(&format!("[{index}]"));
        path
    }

    pub fn as_str(&self) -> &str {
        if self.0.is_empty() { "<document>" } else { &self.0 }
    }
}

impl fmt::Display for DocPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_line_col() {
        let src = "a = 1\nbb = 2\n";
        assert_eq!(LineCol::from_offset(src, 0), LineCol { line: 1, column: 1 });
        assert_eq!(LineCol::from_offset(src, 8), LineCol { line: 2, column: 3 });
        assert_eq!(LineCol::from_offset(src, 999).line, 3);
    }

    #[test]
    fn test_doc_path() {
        let path = DocPath::root().index("service", 0).key("root").index("fields", 2);
        assert_eq!(path.as_str(), "service[0].root.fields[2]");
        assert_eq!(DocPath::root().as_str(), "<document>");
    }
}
