//! Name scopes
//!
//! Names are unique per scope. Two names clash when their snake_case forms
//! are equal, since that form becomes a directory, module, column or Rust
//! field name downstream. Generated type names clash on their UpperCamelCase
//! form instead.

use crate::common::DocPath;
use heck::{ToSnakeCase, ToUpperCamelCase};
use rustc_hash::FxHashMap;

/// Type names a generated module declares or imports besides the entity types
pub const GENERATED_TYPES: &[&str] = &[
    "UnknownVariant",
    "FieldError",
    "ApiError",
    "Serialize",
    "Deserialize",
    "Path",
    "State",
    "StatusCode",
    "IntoResponse",
    "Response",
    "Json",
    "Router",
    "Row",
    "String",
    "Vec",
    "Option",
    "Result",
];

/// Scope level
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScopeKind {
    /// Service names
    Document,
    /// Aggregate names of one service
    Aggregates,
    /// Entity names of one service
    Entities,
    /// Table names of one service
    Tables,
    /// Field and relation names of one entity
    Entity,
    /// Rust type names generated for one service
    Types,
}

impl ScopeKind {
    pub fn describe(&self) -> &'static str {
        match self {
            ScopeKind::Document => "service",
            ScopeKind::Aggregates => "aggregate",
            ScopeKind::Entities => "entity",
            ScopeKind::Tables => "table",
            ScopeKind::Entity => "field",
            ScopeKind::Types => "type",
        }
    }

    fn key(&self, name: &str) -> String {
        match self {
            ScopeKind::Types => name.to_upper_camel_case(),
            _ => name.to_snake_case(),
        }
    }
}

/// Previous definition of a clashing name
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Previous {
    pub name: String,
    pub path: DocPath,
}

/// A single scope
#[derive(Debug)]
pub struct Scope {
    pub kind: ScopeKind,
    /// snake_case key -> first definition
    names: FxHashMap<String, Previous>,
}

impl Scope {
    pub fn new(kind: ScopeKind) -> Self {
        Self {
            kind,
            names: FxHashMap::default(),
        }
    }

    /// Define a name; returns the earlier definition when it clashes
    pub fn define(&mut self, name: &str, path: &DocPath) -> Result<(), Previous> {
        let key = self.kind.key(name);
        if let Some(previous) = self.names.get(&key) {
            return Err(previous.clone());
        }
        self.names.insert(
            key,
            Previous {
                name: name.to_string(),
                path: path.clone(),
            },
        );
        Ok(())
    }
}

/// `[A-Za-z][A-Za-z0-9_]*`
pub fn is_valid_name(name: &str) -> bool {
    let mut chars = name.chars();
    chars.next().is_some_and(|c| c.is_ascii_alphabetic())
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snake_case_collision() {
        let mut scope = Scope::new(ScopeKind::Entity);
        assert!(scope.define("createdAt", &DocPath::root()).is_ok());
        let previous = scope.define("created_at", &DocPath::root()).unwrap_err();
        assert_eq!(previous.name, "createdAt");
        assert!(scope.define("CreatedAt", &DocPath::root()).is_err());
    }

    #[test]
    fn test_type_names_compare_in_camel_case() {
        let mut scope = Scope::new(ScopeKind::Types);
        assert!(scope.define("OrderStatus", &DocPath::root()).is_ok());
        assert!(scope.define("order_status", &DocPath::root()).is_err());
        assert!(scope.define("Order_statuses", &DocPath::root()).is_ok());
    }

    #[test]
    fn test_valid_names() {
        assert!(is_valid_name("List"));
        assert!(is_valid_name("line_item2"));
        assert!(!is_valid_name("2fast"));
        assert!(!is_valid_name("with-dash"));
        assert!(!is_valid_name(""));
    }
}
