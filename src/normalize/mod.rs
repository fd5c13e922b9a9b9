//! Normalizer: raw declaration tree to IR
//!
//! Validates the raw tree and lowers it into the typed [`Ir`]. Every problem
//! found is collected; the caller gets either a complete IR or the complete
//! list of validation errors, never just the first one.
//!
//! Lowering an aggregate runs in phases:
//! 1. lower the declared fields of the root and each child
//! 2. resolve relations by entity name
//! 3. apply the defaulting rules of [`defaults`]
//! 4. declare relation names in their parent's field scope
//! 5. order entities breadth-first from the root and check reachability

mod defaults;
pub mod scope;

use crate::ast::*;
use crate::common::DocPath;
use crate::diagnostics::{ValidationCode, ValidationError};
use crate::ir::{Aggregate, Constraints, Entity, EntityId, Field, Ir, Relation, Service};
use crate::types::{Capabilities, Cardinality, FieldType, Role};
use heck::{ToSnakeCase, ToUpperCamelCase};
use id_arena::Arena;
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::Bfs;
use rustc_hash::FxHashMap;
use scope::{GENERATED_TYPES, Scope, ScopeKind, is_valid_name};

/// Normalize a raw document into IR
pub fn normalize(document: &Document) -> Result<Ir, Vec<ValidationError>> {
    let normalizer = Normalizer::new();
    normalizer.normalize(document)
}

/// Entity under construction
#[derive(Debug)]
pub(crate) struct EntityDraft {
    name: String,
    table: String,
    fields: Vec<Field>,
    path: DocPath,
    /// Field and relation names
    scope: Scope,
    /// Roles claimed by declared fields, including fields that failed to lower
    roles: FxHashMap<Role, DocPath>,
}

impl EntityDraft {
    fn role_index(&self, role: Role) -> Option<usize> {
        self.fields.iter().position(|f| f.role == Some(role))
    }

    /// Whether a declared field claims `role`, or one was injected
    fn claims(&self, role: Role) -> bool {
        self.roles.contains_key(&role) || self.role_index(role).is_some()
    }

    fn into_entity(self) -> Entity {
        Entity {
            name: self.name,
            table: self.table,
            fields: self.fields,
            path: self.path,
        }
    }
}

/// Relation resolved to draft indices
struct ResolvedRelation<'d> {
    decl: &'d RelationDecl,
    name: String,
    from: usize,
    to: usize,
    cardinality: Cardinality,
    owned: bool,
}

/// Which side of an aggregate an entity declaration sits on
#[derive(Debug, Clone, Copy)]
enum EntityKind<'a> {
    /// Named after the aggregate unless it declares a name
    Root { aggregate: Option<&'a str> },
    Child,
}

/// Per-service scopes shared by all aggregates of the service
struct ServiceScopes {
    aggregates: Scope,
    entities: Scope,
    tables: Scope,
    /// Entity structs, enums and repositories the templates will declare
    types: Scope,
}

/// Normalizer state
pub struct Normalizer {
    entities: Arena<Entity>,
    errors: Vec<ValidationError>,
}

impl Normalizer {
    pub fn new() -> Self {
        Self {
            entities: Arena::new(),
            errors: Vec::new(),
        }
    }

    /// Lower the whole document
    pub fn normalize(mut self, document: &Document) -> Result<Ir, Vec<ValidationError>> {
        let mut names = Scope::new(ScopeKind::Document);
        let mut services = Vec::new();

        for decl in &document.services {
            if let Some(service) = self.lower_service(decl, &mut names) {
                services.push(service);
            }
        }

        if !self.errors.is_empty() {
            tracing::debug!("normalization found {} errors", self.errors.len());
            return Err(self.errors);
        }

        Ok(Ir {
            services,
            entities: self.entities,
        })
    }

    fn error(&mut self, path: &DocPath, code: ValidationCode, message: impl Into<String>) {
        self.errors.push(ValidationError::new(path, code, message));
    }

    /// Checks a declared name; `None` when it is missing or malformed
    fn check_name(&mut self, name: Option<&String>, path: &DocPath, what: &str) -> Option<String> {
        match name {
            None => {
                self.error(path, ValidationCode::MissingName, format!("{what} has no `name`"));
                None
            }
            Some(name) if !is_valid_name(name) => {
                self.error(
                    path,
                    ValidationCode::InvalidName,
                    format!("`{name}` is not a valid {what} name"),
                );
                None
            }
            Some(name) => Some(name.clone()),
        }
    }

    fn define(&mut self, scope: &mut Scope, name: &str, path: &DocPath) -> bool {
        let Err(previous) = scope.define(name, path) else {
            return true;
        };
        let what = scope.kind.describe();
        self.error(
            path,
            ValidationCode::DuplicateName,
            format!(
                "{what} `{name}` clashes with {what} `{}` declared at {}",
                previous.name, previous.path
            ),
        );
        false
    }

    /// Reserve a Rust type name the generated modules will declare
    fn define_type(&mut self, types: &mut Scope, name: &str, path: &DocPath) {
        let ty = name.to_upper_camel_case();
        if GENERATED_TYPES.contains(&ty.as_str()) {
            self.error(
                path,
                ValidationCode::DuplicateName,
                format!("`{ty}` clashes with a name the generated code already uses"),
            );
        } else if let Err(previous) = types.define(&ty, path) {
            self.error(
                path,
                ValidationCode::DuplicateName,
                format!(
                    "generated type `{ty}` clashes with the type generated for {}",
                    previous.path
                ),
            );
        }
    }

    fn reject_extra(&mut self, extra: &Extra, path: &DocPath) {
        for key in extra.keys() {
            self.error(
                &path.key(key),
                ValidationCode::UnknownKey,
                format!("unknown key `{key}`"),
            );
        }
    }

    // ==================== SERVICES ====================

    fn lower_service(&mut self, decl: &ServiceDecl, names: &mut Scope) -> Option<Service> {
        let name = self.check_name(decl.name.as_ref(), &decl.path, "service");
        if let Some(name) = &name {
            self.define(names, name, &decl.path);
        }
        self.reject_extra(&decl.extra, &decl.path);

        let capabilities = self.lower_capabilities(decl);

        let mut scopes = ServiceScopes {
            aggregates: Scope::new(ScopeKind::Aggregates),
            entities: Scope::new(ScopeKind::Entities),
            tables: Scope::new(ScopeKind::Tables),
            types: Scope::new(ScopeKind::Types),
        };
        let aggregates: Vec<_> = decl
            .aggregates
            .iter()
            .filter_map(|a| self.lower_aggregate(a, &mut scopes))
            .collect();

        Some(Service {
            name: name?,
            capabilities,
            aggregates,
            path: decl.path.clone(),
        })
    }

    fn lower_capabilities(&mut self, decl: &ServiceDecl) -> Capabilities {
        let mut capabilities = Capabilities::default();

        if let Some(value) = &decl.persistence {
            match Capabilities::backend_from_name(value) {
                Some(backend) => capabilities.persistence = backend,
                None => self.error(
                    &decl.path.key("persistence"),
                    ValidationCode::UnknownCapability,
                    format!("unknown persistence backend `{value}` (expected postgres, sqlite or none)"),
                ),
            }
        }

        if let Some(value) = &decl.presentation {
            match Capabilities::presentation_from_name(value) {
                Some(presentation) => capabilities.presentation = presentation,
                None => self.error(
                    &decl.path.key("presentation"),
                    ValidationCode::UnknownCapability,
                    format!("unknown presentation layer `{value}` (expected http or none)"),
                ),
            }
        }

        if capabilities.presentation.is_some() && capabilities.persistence.is_none() {
            self.error(
                &decl.path.key("presentation"),
                ValidationCode::MissingCapability,
                "the presentation layer serves repositories and needs a persistence backend",
            );
        }

        capabilities
    }

    // ==================== AGGREGATES ====================

    fn lower_aggregate(
        &mut self,
        decl: &AggregateDecl,
        scopes: &mut ServiceScopes,
    ) -> Option<Aggregate> {
        let name = self.check_name(decl.name.as_ref(), &decl.path, "aggregate");
        if let Some(name) = &name {
            self.define(&mut scopes.aggregates, name, &decl.path);
        }
        self.reject_extra(&decl.extra, &decl.path);

        let Some(root_decl) = &decl.root else {
            self.error(
                &decl.path,
                ValidationCode::MissingRoot,
                "aggregate has no `root` entity",
            );
            // Children are still checked so their errors land in this run.
            for child in &decl.entities {
                self.lower_entity(child, EntityKind::Child, scopes);
            }
            return None;
        };

        // Phase 1: declared fields. Index 0 is the root.
        let root = self.lower_entity(
            root_decl,
            EntityKind::Root {
                aggregate: name.as_deref(),
            },
            scopes,
        );
        let children: Vec<_> = decl
            .entities
            .iter()
            .map(|child| self.lower_entity(child, EntityKind::Child, scopes))
            .collect();

        let (Some(root), Some(name)) = (root, name) else {
            return None;
        };
        let mut drafts = vec![root];
        let mut complete = true;
        for child in children {
            match child {
                Some(child) => drafts.push(child),
                None => complete = false,
            }
        }

        // Phase 2: relations
        let relations: Vec<_> = decl
            .relations
            .iter()
            .filter_map(|r| self.resolve_relation(r, &drafts, complete))
            .collect();
        self.check_ownership(&relations, &drafts);

        // Phase 3: defaulting rules
        let mut injected = Vec::new();
        defaults::inject_root_fields(&mut drafts[0], &mut injected);
        let mut keyed = Vec::with_capacity(relations.len());
        for relation in &relations {
            // A second owner is already reported by check_ownership.
            if keyed.contains(&relation.to) {
                continue;
            }
            keyed.push(relation.to);
            let parent = drafts[relation.from].name.clone();
            defaults::inject_child_fields(
                &mut drafts[relation.to],
                relation.decl.key.as_deref(),
                &parent,
                &relation.decl.path,
                &mut injected,
            );
        }
        for draft in drafts.iter().skip(1) {
            if draft.role_index(Role::OwnedBy).is_some()
                && !relations.iter().any(|r| drafts[r.to].name == draft.name)
            {
                injected.push(ValidationError::new(
                    &draft.path,
                    ValidationCode::InvalidOwnerKey,
                    format!("`{}` declares an owned-by field but no relation targets it", draft.name),
                ));
            }
        }
        self.errors.extend(injected);

        // Phase 4: relation names live in the parent's field scope
        for relation in &relations {
            let scope = &mut drafts[relation.from].scope;
            if let Err(previous) = scope.define(&relation.name, &relation.decl.path) {
                self.error(
                    &relation.decl.path,
                    ValidationCode::DuplicateName,
                    format!(
                        "relation `{}` clashes with `{}` of `{}`",
                        relation.name, previous.name, drafts[relation.from].name
                    ),
                );
            }
        }

        // Phase 5: canonical order and reachability
        let resolved_all = relations.len() == decl.relations.len();
        let order = self.entity_order(&drafts, &relations, resolved_all)?;
        if !complete || !self.errors.is_empty() {
            return None;
        }

        Some(self.allocate(name, decl.path.clone(), drafts, &relations, &order))
    }

    /// Breadth-first order from the root; reports unreachable children
    fn entity_order(
        &mut self,
        drafts: &[EntityDraft],
        relations: &[ResolvedRelation<'_>],
        report: bool,
    ) -> Option<Vec<usize>> {
        let mut graph = DiGraph::<usize, ()>::new();
        let nodes: Vec<NodeIndex> = (0..drafts.len()).map(|i| graph.add_node(i)).collect();
        // Neighbors are walked most-recent-first, so edges go in reversed
        // to keep breadth-first order equal to declaration order.
        for relation in relations.iter().rev() {
            graph.add_edge(nodes[relation.from], nodes[relation.to], ());
        }

        let mut order = Vec::with_capacity(drafts.len());
        let mut bfs = Bfs::new(&graph, nodes[0]);
        while let Some(node) = bfs.next(&graph) {
            order.push(graph[node]);
        }

        let mut reachable = true;
        for (i, draft) in drafts.iter().enumerate().skip(1) {
            if order.contains(&i) {
                continue;
            }
            reachable = false;
            // A relation that failed to resolve would make this a follow-on error.
            if report {
                self.error(
                    &draft.path,
                    ValidationCode::UnreachableEntity,
                    format!(
                        "`{}` is not reachable from root `{}` through relations",
                        draft.name, drafts[0].name
                    ),
                );
            }
        }

        reachable.then_some(order)
    }

    /// Move drafts into the arena in canonical order
    fn allocate(
        &mut self,
        name: String,
        path: DocPath,
        mut drafts: Vec<EntityDraft>,
        relations: &[ResolvedRelation<'_>],
        order: &[usize],
    ) -> Aggregate {
        let keys: Vec<usize> = relations
            .iter()
            .map(|r| drafts[r.to].role_index(Role::OwnedBy).unwrap_or_default())
            .collect();

        let mut slots: Vec<Option<EntityDraft>> = drafts.drain(..).map(Some).collect();
        let mut ids: FxHashMap<usize, EntityId> = FxHashMap::default();
        for &index in order {
            if let Some(draft) = slots[index].take() {
                ids.insert(index, self.entities.alloc(draft.into_entity()));
            }
        }

        let relations = relations
            .iter()
            .zip(keys)
            .map(|(r, key)| Relation {
                name: r.name.clone(),
                from: ids[&r.from],
                to: ids[&r.to],
                cardinality: r.cardinality,
                owned: r.owned,
                key,
                path: r.decl.path.clone(),
            })
            .collect();

        Aggregate {
            name,
            root: ids[&0],
            relations,
            order: order.iter().map(|i| ids[i]).collect(),
            path,
        }
    }

    // ==================== RELATIONS ====================

    fn resolve_relation<'d>(
        &mut self,
        decl: &'d RelationDecl,
        drafts: &[EntityDraft],
        complete: bool,
    ) -> Option<ResolvedRelation<'d>> {
        self.reject_extra(&decl.extra, &decl.path);
        let name = self.check_name(decl.name.as_ref(), &decl.path, "relation");

        let cardinality = match decl.cardinality.as_deref() {
            None => Some(Cardinality::default()),
            Some(value) => {
                let cardinality = Cardinality::from_name(value);
                if cardinality.is_none() {
                    self.error(
                        &decl.path.key("cardinality"),
                        ValidationCode::InvalidRelation,
                        format!("unknown cardinality `{value}` (expected one or many)"),
                    );
                }
                cardinality
            }
        };

        let from = match &decl.from {
            None => Some(0),
            Some(from) => self.lookup(drafts, from, &decl.path.key("from"), complete),
        };
        let to = match &decl.to {
            None => {
                self.error(
                    &decl.path,
                    ValidationCode::UnresolvedReference,
                    "relation has no target entity (`to`)",
                );
                None
            }
            Some(to) => self.lookup(drafts, to, &decl.path.key("to"), complete),
        };

        if let Some(key) = decl.key.as_ref().filter(|k| !is_valid_name(k)) {
            self.error(
                &decl.path.key("key"),
                ValidationCode::InvalidName,
                format!("`{key}` is not a valid field name"),
            );
            return None;
        }

        let (name, from, to, cardinality) = (name?, from?, to?, cardinality?);
        if to == 0 {
            self.error(
                &decl.path.key("to"),
                ValidationCode::InvalidRelation,
                format!("aggregate root `{}` cannot be a relation target", drafts[0].name),
            );
            return None;
        }
        if from == to {
            self.error(
                &decl.path,
                ValidationCode::InvalidRelation,
                format!("`{}` cannot relate to itself", drafts[to].name),
            );
            return None;
        }

        Some(ResolvedRelation {
            decl,
            name,
            from,
            to,
            cardinality,
            owned: decl.owned.unwrap_or(true),
        })
    }

    fn lookup(
        &mut self,
        drafts: &[EntityDraft],
        name: &str,
        path: &DocPath,
        complete: bool,
    ) -> Option<usize> {
        let found = drafts.iter().position(|d| d.name == name);
        // A child that failed to lower was already reported; do not pile an
        // unresolved-reference on top of it.
        if found.is_none() && complete {
            self.error(
                path,
                ValidationCode::UnresolvedReference,
                format!("no entity named `{name}` in this aggregate"),
            );
        }
        found
    }

    /// One owner per child; non-owned children own nothing themselves
    fn check_ownership(&mut self, relations: &[ResolvedRelation<'_>], drafts: &[EntityDraft]) {
        for (i, relation) in relations.iter().enumerate() {
            if relations[..i].iter().any(|r| r.to == relation.to) {
                self.error(
                    &relation.decl.path,
                    ValidationCode::InvalidRelation,
                    format!("`{}` already has an owner; an entity has exactly one parent", drafts[relation.to].name),
                );
            }
            let parent_is_reference = relations
                .iter()
                .any(|r| r.to == relation.from && !r.owned);
            if parent_is_reference {
                self.error(
                    &relation.decl.path,
                    ValidationCode::InvalidRelation,
                    format!(
                        "`{}` is reached through a non-owned relation and cannot have children",
                        drafts[relation.from].name
                    ),
                );
            }
        }
    }

    // ==================== ENTITIES ====================

    fn lower_entity(
        &mut self,
        decl: &EntityDecl,
        kind: EntityKind<'_>,
        scopes: &mut ServiceScopes,
    ) -> Option<EntityDraft> {
        let name = match (&decl.name, kind) {
            // The aggregate's own name problem is already reported.
            (None, EntityKind::Root { aggregate: None }) => None,
            (None, EntityKind::Root { aggregate: Some(aggregate) }) => Some(aggregate.to_string()),
            (declared, _) => self.check_name(declared.as_ref(), &decl.path, "entity"),
        };
        if let Some(name) = &name {
            if self.define(&mut scopes.entities, name, &decl.path) {
                self.define_type(&mut scopes.types, name, &decl.path);
                if let EntityKind::Root { .. } = kind {
                    self.define_type(&mut scopes.types, &format!("{name}_repository"), &decl.path);
                }
            }
        }
        self.reject_extra(&decl.extra, &decl.path);

        let table = match (&decl.table, &name) {
            (Some(table), _) if !is_valid_name(table) => {
                self.error(
                    &decl.path.key("table"),
                    ValidationCode::InvalidName,
                    format!("`{table}` is not a valid table name"),
                );
                None
            }
            (Some(table), _) => Some(table.clone()),
            (None, Some(name)) => Some(name.to_snake_case()),
            (None, None) => None,
        };
        if let Some(table) = &table {
            self.define(&mut scopes.tables, table, &decl.path);
        }

        let mut scope = Scope::new(ScopeKind::Entity);
        let mut roles: FxHashMap<Role, DocPath> = FxHashMap::default();
        let fields: Vec<_> = decl
            .fields
            .iter()
            .filter_map(|field| self.lower_field(field, &mut scope, &mut roles))
            .collect();
        if let Some(name) = &name {
            for field in fields.iter().filter(|f| f.ty.is_enum()) {
                let ty = format!("{name}_{}", field.name);
                self.define_type(&mut scopes.types, &ty, &field.path);
            }
        }

        match kind {
            EntityKind::Child => {
                // Audit timestamps only mean something on the aggregate root.
                for role in [Role::AuditCreated, Role::AuditUpdated] {
                    if let Some(path) = roles.get(&role) {
                        self.error(
                            path,
                            ValidationCode::RoleTypeMismatch,
                            format!("role `{role}` applies to aggregate roots only"),
                        );
                    }
                }
            }
            EntityKind::Root { .. } => {
                if let Some(path) = roles.get(&Role::OwnedBy) {
                    self.error(
                        path,
                        ValidationCode::InvalidOwnerKey,
                        "an aggregate root has no owner",
                    );
                }
            }
        }

        Some(EntityDraft {
            name: name?,
            table: table?,
            fields,
            path: decl.path.clone(),
            scope,
            roles,
        })
    }

    // ==================== FIELDS ====================

    fn lower_field(
        &mut self,
        decl: &FieldDecl,
        scope: &mut Scope,
        roles: &mut FxHashMap<Role, DocPath>,
    ) -> Option<Field> {
        let name = self.check_name(decl.name.as_ref(), &decl.path, "field");
        if let Some(name) = &name {
            self.define(scope, name, &decl.path);
        }
        self.reject_extra(&decl.extra, &decl.path);

        let ty = self.lower_type(decl);
        let role = self.lower_role(decl, ty.as_ref(), roles);
        let constraints = self.lower_constraints(decl, ty.as_ref());

        Some(Field {
            name: name?,
            ty: ty?,
            nullable: decl.nullable,
            role: role?,
            implicit: false,
            constraints: constraints?,
            path: decl.path.clone(),
        })
    }

    fn lower_type(&mut self, decl: &FieldDecl) -> Option<FieldType> {
        let Some(name) = &decl.ty else {
            self.error(&decl.path, ValidationCode::UnknownType, "field has no `type`");
            return None;
        };
        let Some(ty) = FieldType::from_name(name) else {
            self.error(
                &decl.path.key("type"),
                ValidationCode::UnknownType,
                format!("unknown type `{name}`"),
            );
            return None;
        };

        match (ty, &decl.variants) {
            (FieldType::Enum(_), None) => {
                self.error(&decl.path, ValidationCode::InvalidEnum, "enum field has no `variants`");
                None
            }
            (FieldType::Enum(_), Some(variants)) => self.lower_variants(variants, &decl.path),
            (_, Some(_)) => {
                self.error(
                    &decl.path.key("variants"),
                    ValidationCode::InvalidEnum,
                    format!("`variants` only applies to enum fields, not `{name}`"),
                );
                None
            }
            (ty, None) => Some(ty),
        }
    }

    fn lower_variants(&mut self, variants: &[String], path: &DocPath) -> Option<FieldType> {
        let path = path.key("variants");
        if variants.is_empty() {
            self.error(&path, ValidationCode::InvalidEnum, "enum field declares no variants");
            return None;
        }
        let mut seen = FxHashMap::default();
        let mut ok = true;
        for variant in variants {
            if !is_valid_name(variant) {
                self.error(
                    &path,
                    ValidationCode::InvalidEnum,
                    format!("`{variant}` is not a valid variant name"),
                );
                ok = false;
            } else if let Some(previous) = seen.insert(variant.to_upper_camel_case(), variant) {
                self.error(
                    &path,
                    ValidationCode::InvalidEnum,
                    format!("variant `{variant}` clashes with `{previous}`"),
                );
                ok = false;
            }
        }
        ok.then(|| FieldType::Enum(variants.to_vec()))
    }

    /// `Some(None)` for a field without a role, `None` on error
    fn lower_role(
        &mut self,
        decl: &FieldDecl,
        ty: Option<&FieldType>,
        roles: &mut FxHashMap<Role, DocPath>,
    ) -> Option<Option<Role>> {
        let Some(name) = &decl.role else {
            return Some(None);
        };
        let path = decl.path.key("role");
        let Some(role) = Role::from_name(name) else {
            self.error(&path, ValidationCode::UnknownRole, format!("unknown role `{name}`"));
            return None;
        };

        let mut ok = true;
        if let Some(previous) = roles.get(&role) {
            self.error(
                &path,
                ValidationCode::DuplicateRole,
                format!("role `{role}` is already carried by {previous}"),
            );
            ok = false;
        } else {
            roles.insert(role, decl.path.clone());
        }

        let required = role.required_type();
        if ty.is_some_and(|ty| *ty != required) {
            self.error(
                &path,
                ValidationCode::RoleTypeMismatch,
                format!("role `{role}` requires type `{required}`"),
            );
            ok = false;
        }
        if decl.nullable {
            self.error(
                &path,
                ValidationCode::RoleTypeMismatch,
                format!("a `{role}` field cannot be nullable"),
            );
            ok = false;
        }

        ok.then_some(Some(role))
    }

    fn lower_constraints(&mut self, decl: &FieldDecl, ty: Option<&FieldType>) -> Option<Constraints> {
        let mut constraints = Constraints::default();
        let mut ok = true;

        if let Some(max_length) = decl.max_length {
            if ty.is_some_and(|ty| *ty != FieldType::String) {
                self.error(
                    &decl.path.key("max_length"),
                    ValidationCode::InvalidConstraint,
                    "`max_length` applies to string fields only",
                );
                ok = false;
            }
            match u32::try_from(max_length) {
                Ok(n) if n > 0 => constraints.max_length = Some(n),
                _ => {
                    self.error(
                        &decl.path.key("max_length"),
                        ValidationCode::InvalidConstraint,
                        format!("`max_length` must be a positive integer, got {max_length}"),
                    );
                    ok = false;
                }
            }
        }

        if decl.min.is_some() || decl.max.is_some() {
            if ty.is_some_and(|ty| *ty != FieldType::Integer) {
                self.error(
                    &decl.path,
                    ValidationCode::InvalidConstraint,
                    "`min` and `max` apply to integer fields only",
                );
                ok = false;
            }
            if let (Some(min), Some(max)) = (decl.min, decl.max) {
                if min > max {
                    self.error(
                        &decl.path,
                        ValidationCode::InvalidConstraint,
                        format!("`min` ({min}) is greater than `max` ({max})"),
                    );
                    ok = false;
                }
            }
            constraints.min = decl.min;
            constraints.max = decl.max;
        }

        ok.then_some(constraints)
    }
}

impl Default for Normalizer {
    fn default() -> Self {
        Self::new()
    }
}
