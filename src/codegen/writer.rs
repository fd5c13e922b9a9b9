//! Indented source writer and Rust naming helpers

use heck::{ToSnakeCase, ToUpperCamelCase};

/// First line of every generated file
pub const BANNER: &str = "// Code generated by svcforge. DO NOT EDIT.";

/// Output buffer with block indentation
pub struct CodeWriter {
    output: String,
    /// Current indentation level
    indent: usize,
}

impl CodeWriter {
    pub fn new() -> Self {
        Self {
            output: String::new(),
            indent: 0,
        }
    }

    /// Banner followed by a blank line
    pub fn banner(&mut self) {
        self.line(BANNER);
        self.blank();
    }

    pub fn line(&mut self, text: impl AsRef<str>) {
        let text = text.as_ref();
        if !text.is_empty() {
            for _ in 0..self.indent {
                self.output.push_str("    ");
            }
            self.output.push_str(text);
        }
        self.output.push('\n');
    }

    pub fn blank(&mut self) {
        self.output.push('\n');
    }

    /// `/// text`
    pub fn doc(&mut self, text: impl AsRef<str>) {
        self.line(format!("/// {}", text.as_ref()));
    }

    /// Write `text` (ending in an opening brace) and indent
    pub fn open(&mut self, text: impl AsRef<str>) {
        self.line(text);
        self.indent += 1;
    }

    /// Dedent and write `text`
    pub fn close(&mut self, text: impl AsRef<str>) {
        self.indent = self.indent.saturating_sub(1);
        self.line(text);
    }

    pub fn indent(&mut self) {
        self.indent += 1;
    }

    pub fn dedent(&mut self) {
        self.indent = self.indent.saturating_sub(1);
    }

    pub fn finish(self) -> String {
        self.output
    }
}

impl Default for CodeWriter {
    fn default() -> Self {
        Self::new()
    }
}

// ==================== NAMES ====================

/// Keywords usable as raw identifiers
const RAW_KEYWORDS: &[&str] = &[
    "abstract", "as", "async", "await", "become", "box", "break", "const", "continue", "do",
    "dyn", "else", "enum", "extern", "false", "final", "fn", "for", "gen", "if", "impl", "in",
    "let", "loop", "macro", "match", "mod", "move", "mut", "override", "priv", "pub", "ref",
    "return", "static", "struct", "trait", "true", "try", "type", "typeof", "unsafe",
    "unsized", "use", "virtual", "where", "while", "yield",
];

/// Keywords that cannot be raw identifiers
const RESERVED: &[&str] = &["self", "Self", "super", "crate", "_"];

/// Escape a name so it is a valid Rust identifier
pub fn escape(name: &str) -> String {
    if RESERVED.contains(&name) {
        format!("{name}_")
    } else if RAW_KEYWORDS.contains(&name) {
        format!("r#{name}")
    } else {
        name.to_string()
    }
}

/// Field, function or module name
pub fn field_ident(name: &str) -> String {
    escape(&name.to_snake_case())
}

/// Type or variant name
pub fn type_ident(name: &str) -> String {
    escape(&name.to_upper_camel_case())
}

/// Locals and parameters the generated repository and validation declare
const LOCALS: &[&str] = &[
    "tx", "now", "root", "id", "parent_id", "row", "deleted", "updated", "value", "path",
    "errors", "i", "v",
];

/// Local variable name that cannot shadow a generated local
pub fn local_ident(name: &str) -> String {
    let name = name.to_snake_case();
    if LOCALS.contains(&name.as_str()) {
        format!("{name}_")
    } else {
        escape(&name)
    }
}
