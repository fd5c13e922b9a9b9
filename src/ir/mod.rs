//! Intermediate Representation (IR)
//!
//! The IR is the typed, validated graph produced by the normalizer:
//! `Service -> Aggregate -> Entity -> Field`, with relations between entities
//! of one aggregate. It contains:
//! - Resolved field types and role tags
//! - Injected identifier, audit and owned-by fields (marked `implicit`)
//! - Relations resolved to arena ids
//! - A canonical entity order per aggregate (root first, parents before children)
//!
//! An entity's field sequence is its projection. Every artifact that lists
//! columns reads it from here, in this order.

use crate::common::DocPath;
use crate::types::{Capabilities, Cardinality, FieldType, Role};
use heck::ToSnakeCase;
use id_arena::{Arena, Id};

/// Entity handle inside [`Ir::entities`]
pub type EntityId = Id<Entity>;

/// IR root
#[derive(Debug)]
pub struct Ir {
    pub services: Vec<Service>,
    pub entities: Arena<Entity>,
}

impl Ir {
    pub fn entity(&self, id: EntityId) -> &Entity {
        &self.entities[id]
    }

    /// All aggregates in declaration order, with their service
    pub fn aggregates(&self) -> impl Iterator<Item = (&Service, &Aggregate)> {
        self.services
            .iter()
            .flat_map(|s| s.aggregates.iter().map(move |a| (s, a)))
    }

    pub fn find_service(&self, name: &str) -> Option<&Service> {
        self.services.iter().find(|s| s.name == name)
    }
}

// ==================== SERVICES ====================

/// A deployable unit
#[derive(Debug, Clone)]
pub struct Service {
    pub name: String,
    pub capabilities: Capabilities,
    pub aggregates: Vec<Aggregate>,
    pub path: DocPath,
}

impl Service {
    /// Directory / module name of the service
    pub fn module_name(&self) -> String {
        self.name.to_snake_case()
    }

    pub fn find_aggregate(&self, name: &str) -> Option<&Aggregate> {
        self.aggregates.iter().find(|a| a.name == name)
    }
}

// ==================== AGGREGATES ====================

/// A root entity plus owned and referenced children
#[derive(Debug, Clone)]
pub struct Aggregate {
    pub name: String,
    pub root: EntityId,
    pub relations: Vec<Relation>,
    /// Root first, then children breadth-first along relations.
    /// Writes follow this order; deletes run it in reverse.
    pub order: Vec<EntityId>,
    pub path: DocPath,
}

impl Aggregate {
    pub fn module_name(&self) -> String {
        self.name.to_snake_case()
    }

    /// Children in canonical write order
    pub fn children(&self) -> &[EntityId] {
        self.order.get(1..).unwrap_or_default()
    }

    /// The single relation whose target is `child`
    pub fn relation_into(&self, child: EntityId) -> Option<&Relation> {
        self.relations.iter().find(|r| r.to == child)
    }

    /// `service.aggregate` label used in diagnostics
    pub fn label(&self, service: &Service) -> String {
        format!("{}.{}", service.name, self.name)
    }
}

/// Directed parent -> child edge
#[derive(Debug, Clone)]
pub struct Relation {
    pub name: String,
    pub from: EntityId,
    pub to: EntityId,
    pub cardinality: Cardinality,
    pub owned: bool,
    /// Index of the target's owned-by field
    pub key: usize,
    pub path: DocPath,
}

// ==================== ENTITIES ====================

/// A record type with an ordered field sequence
#[derive(Debug, Clone)]
pub struct Entity {
    pub name: String,
    pub table: String,
    pub fields: Vec<Field>,
    pub path: DocPath,
}

impl Entity {
    /// The ordered column sequence shared by every statement and scan
    pub fn projection(&self) -> &[Field] {
        &self.fields
    }

    /// Position of the field carrying `role`
    pub fn role_index(&self, role: Role) -> Option<usize> {
        self.fields.iter().position(|f| f.role == Some(role))
    }

}

/// A column of an entity
#[derive(Debug, Clone, PartialEq)]
pub struct Field {
    pub name: String,
    pub ty: FieldType,
    pub nullable: bool,
    pub role: Option<Role>,
    /// Injected by the normalizer rather than declared
    pub implicit: bool,
    pub constraints: Constraints,
    pub path: DocPath,
}

impl Field {
    /// A field the normalizer injects for `role`
    pub fn implicit(name: impl Into<String>, role: Role, path: DocPath) -> Self {
        Self {
            name: name.into(),
            ty: role.required_type(),
            nullable: false,
            role: Some(role),
            implicit: true,
            constraints: Constraints::default(),
            path,
        }
    }

    /// Whether the value is supplied by the generated code rather than the caller
    pub fn is_managed(&self) -> bool {
        self.role.is_some()
    }
}

/// Value constraints enforced by the generated validation routine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Constraints {
    pub max_length: Option<u32>,
    pub min: Option<i64>,
    pub max: Option<i64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_lookup() {
        let entity = Entity {
            name: "OrderLine".to_string(),
            table: "order_line".to_string(),
            fields: vec![
                Field::implicit("id", Role::Identifier, DocPath::root()),
                Field::implicit("order_id", Role::OwnedBy, DocPath::root()),
            ],
            path: DocPath::root(),
        };
        assert_eq!(entity.role_index(Role::OwnedBy), Some(1));
        assert_eq!(entity.role_index(Role::AuditCreated), None);
    }
}
