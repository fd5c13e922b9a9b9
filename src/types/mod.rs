//! Fixed vocabularies of the specification language
//!
//! Field types, role tags, relation cardinalities and service capabilities.
//! The normalizer resolves raw strings against these; nothing outside this
//! module spells the vocabulary out.

use serde::Serialize;
use std::fmt;

/// Semantic field type
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum FieldType {
    String,
    Integer,
    Boolean,
    Timestamp,
    Identifier,
    /// Closed set of variants, stored as text
    Enum(Vec<String>),
}

impl FieldType {
    /// Names accepted in a field's `type` key
    pub const NAMES: [&'static str; 6] = [
        "string",
        "integer",
        "boolean",
        "timestamp",
        "identifier",
        "enum",
    ];

    /// Resolve a type name. Enum variants are attached by the caller.
    pub fn from_name(name: &str) -> Option<Self> {
        Some(match name {
            "string" => FieldType::String,
            "integer" => FieldType::Integer,
            "boolean" => FieldType::Boolean,
            "timestamp" => FieldType::Timestamp,
            "identifier" => FieldType::Identifier,
            "enum" => FieldType::Enum(Vec::new()),
            _ => return None,
        })
    }

    pub fn name(&self) -> &'static str {
        match self {
            FieldType::String => "string",
            FieldType::Integer => "integer",
            FieldType::Boolean => "boolean",
            FieldType::Timestamp => "timestamp",
            FieldType::Identifier => "identifier",
            FieldType::Enum(_) => "enum",
        }
    }

    pub fn is_enum(&self) -> bool {
        matches!(self, FieldType::Enum(_))
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Role tag driving generic per-field behavior
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Role {
    /// Primary key; generated on create when nil, never updated
    Identifier,
    /// Stamped once on create
    AuditCreated,
    /// Stamped on create and on every update
    AuditUpdated,
    /// Key referencing the owning entity
    OwnedBy,
}

impl Role {
    pub const ALL: [Role; 4] = [
        Role::Identifier,
        Role::AuditCreated,
        Role::AuditUpdated,
        Role::OwnedBy,
    ];

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|r| r.name() == name)
    }

    pub fn name(&self) -> &'static str {
        match self {
            Role::Identifier => "identifier",
            Role::AuditCreated => "audit-created",
            Role::AuditUpdated => "audit-updated",
            Role::OwnedBy => "owned-by",
        }
    }

    /// The only field type a field carrying this role may have
    pub fn required_type(&self) -> FieldType {
        match self {
            Role::Identifier | Role::OwnedBy => FieldType::Identifier,
            Role::AuditCreated | Role::AuditUpdated => FieldType::Timestamp,
        }
    }

    /// Field name used when the normalizer injects this role
    pub fn default_name(&self) -> Option<&'static str> {
        match self {
            Role::Identifier => Some("id"),
            Role::AuditCreated => Some("created_at"),
            Role::AuditUpdated => Some("updated_at"),
            Role::OwnedBy => None,
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Relation cardinality
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Cardinality {
    /// Optional single child
    One,
    /// Collection
    #[default]
    Many,
}

impl Cardinality {
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "one" => Some(Cardinality::One),
            "many" => Some(Cardinality::Many),
            _ => None,
        }
    }
}

// ==================== CAPABILITIES ====================

/// Persistence backend, which also selects the SQL dialect
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Backend {
    Postgres,
    Sqlite,
}

impl Backend {
    pub fn name(&self) -> &'static str {
        match self {
            Backend::Postgres => "postgres",
            Backend::Sqlite => "sqlite",
        }
    }
}

/// Presentation layer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Presentation {
    Http,
}

/// A capability an artifact can require
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Capability {
    Persistence,
    Presentation,
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Capability::Persistence => f.write_str("persistence"),
            Capability::Presentation => f.write_str("presentation"),
        }
    }
}

/// Capabilities enabled for one service
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Capabilities {
    pub persistence: Option<Backend>,
    pub presentation: Option<Presentation>,
}

impl Capabilities {
    /// Resolve a `persistence` value; `none` disables the capability
    pub fn backend_from_name(name: &str) -> Option<Option<Backend>> {
        match name {
            "postgres" => Some(Some(Backend::Postgres)),
            "sqlite" => Some(Some(Backend::Sqlite)),
            "none" => Some(None),
            _ => None,
        }
    }

    /// Resolve a `presentation` value; `none` disables the capability
    pub fn presentation_from_name(name: &str) -> Option<Option<Presentation>> {
        match name {
            "http" => Some(Some(Presentation::Http)),
            "none" => Some(None),
            _ => None,
        }
    }

    pub fn has(&self, capability: Capability) -> bool {
        match capability {
            Capability::Persistence => self.persistence.is_some(),
            Capability::Presentation => self.presentation.is_some(),
        }
    }

    /// First capability of `required` this set lacks
    pub fn missing(&self, required: &[Capability]) -> Option<Capability> {
        required.iter().copied().find(|c| !self.has(*c))
    }
}
