//! Raw declaration tree for specification documents
//!
//! This module defines the untyped tree produced by the parser. Nothing here
//! has been checked: type names, roles, capability names and references are
//! still plain strings, and unknown keys inside a recognized block are kept
//! verbatim in `extra` for the normalizer to judge.

use crate::common::DocPath;
use indexmap::IndexMap;
use serde::Serialize;

/// Unrecognized `key = value` pairs of a block, in document order
pub type Extra = IndexMap<String, toml::Value>;

/// Top-level document
#[derive(Debug, Clone, Serialize)]
pub struct Document {
    pub version: i64,
    pub services: Vec<ServiceDecl>,
}

impl Document {
    /// Total number of declared entities (roots and children)
    pub fn entity_count(&self) -> usize {
        self.services
            .iter()
            .flat_map(|s| &s.aggregates)
            .map(|a| a.entities.len() + usize::from(a.root.is_some()))
            .sum()
    }
}

// ==================== SERVICES ====================

/// `[[service]]` block
#[derive(Debug, Clone, Serialize)]
pub struct ServiceDecl {
    pub path: DocPath,
    pub name: Option<String>,
    /// Persistence backend name (`postgres`, `sqlite`, `none`)
    pub persistence: Option<String>,
    /// Presentation layer name (`http`, `none`)
    pub presentation: Option<String>,
    pub aggregates: Vec<AggregateDecl>,
    pub extra: Extra,
}

// ==================== AGGREGATES ====================

/// `[[service.aggregate]]` block
#[derive(Debug, Clone, Serialize)]
pub struct AggregateDecl {
    pub path: DocPath,
    pub name: Option<String>,
    pub root: Option<EntityDecl>,
    /// Child entity declarations
    pub entities: Vec<EntityDecl>,
    pub relations: Vec<RelationDecl>,
    pub extra: Extra,
}

/// Entity declaration (aggregate root or child)
#[derive(Debug, Clone, Serialize)]
pub struct EntityDecl {
    pub path: DocPath,
    pub name: Option<String>,
    pub table: Option<String>,
    pub fields: Vec<FieldDecl>,
    pub extra: Extra,
}

/// One entry of an entity's `fields` array
#[derive(Debug, Clone, Serialize)]
pub struct FieldDecl {
    pub path: DocPath,
    pub name: Option<String>,
    #[serde(rename = "type")]
    pub ty: Option<String>,
    pub nullable: bool,
    pub role: Option<String>,
    pub variants: Option<Vec<String>>,
    pub max_length: Option<i64>,
    pub min: Option<i64>,
    pub max: Option<i64>,
    pub extra: Extra,
}

/// `[[service.aggregate.relation]]` block
#[derive(Debug, Clone, Serialize)]
pub struct RelationDecl {
    pub path: DocPath,
    pub name: Option<String>,
    /// Source entity name; the root when absent
    pub from: Option<String>,
    /// Target entity name
    pub to: Option<String>,
    pub owned: Option<bool>,
    pub cardinality: Option<String>,
    /// Name of the target's owned-by field
    pub key: Option<String>,
    pub extra: Extra,
}
