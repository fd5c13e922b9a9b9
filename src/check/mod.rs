//! Consistency validator
//!
//! Audits the bindings the templates will read before anything is rendered.
//! For every aggregate it asks the planner which artifacts exist, binds the
//! aggregate and verifies:
//! - column lists: every write and read/scan list is the entity's projection
//! - transactional ownership: root and owned-child writes share the
//!   operation's transaction; non-owned children stay out of the root's paths
//! - identifier/audit: create and update stamps are exactly the managed fields
//! - unique paths: no two planned artifacts target the same file
//!
//! Persistence checks only run for aggregates whose service plans queries
//! or a repository.

use crate::bind::{
    self, AggregateBinding, Handle, Param, Stamp, StampAction, Statement, Target, WriteKind,
};
use crate::diagnostics::{ConsistencyError, Invariant};
use crate::ir::{Aggregate, Ir, Service};
use crate::plan::{self, ArtifactKind, ArtifactSpec};
use crate::types::Role;
use rustc_hash::FxHashMap;

/// Check every aggregate of the IR
pub fn check(ir: &Ir) -> Result<(), Vec<ConsistencyError>> {
    let mut errors = Vec::new();

    for service in &ir.services {
        let mut artifacts = Vec::new();
        for aggregate in &service.aggregates {
            let planned = plan::plan_aggregate(ir, service, aggregate);
            let binding = bind::bind_aggregate(ir, service, aggregate);
            errors.extend(check_aggregate(ir, service, aggregate, &binding, &planned));
            artifacts.extend(planned);
        }
        artifacts.push(plan::plan_service(service));
        errors.extend(check_paths(service, &artifacts));
    }

    tracing::debug!("consistency check found {} errors", errors.len());
    if errors.is_empty() { Ok(()) } else { Err(errors) }
}

/// Check one aggregate's binding against its planned artifacts
pub fn check_aggregate(
    ir: &Ir,
    service: &Service,
    aggregate: &Aggregate,
    binding: &AggregateBinding,
    planned: &[ArtifactSpec],
) -> Vec<ConsistencyError> {
    let mut checker = ConsistencyChecker::new(ir, aggregate.label(service), binding);
    let persistent = planned
        .iter()
        .any(|a| matches!(a.kind, ArtifactKind::Queries | ArtifactKind::Repository));
    if persistent {
        checker.check_columns();
        checker.check_transactions(aggregate);
        checker.check_stamps();
    }
    checker.errors
}

/// No two artifacts of a service share a target path
pub fn check_paths(service: &Service, artifacts: &[ArtifactSpec]) -> Vec<ConsistencyError> {
    let mut seen: FxHashMap<&str, &ArtifactSpec> = FxHashMap::default();
    let mut errors = Vec::new();
    for artifact in artifacts {
        if let Some(previous) = seen.insert(&artifact.path, artifact) {
            errors.push(ConsistencyError {
                aggregate: artifact.node(),
                artifact: artifact.kind,
                invariant: Invariant::UniquePath,
                message: format!(
                    "`{}` is also the target of the {} artifact of `{}` in service `{}`",
                    artifact.path,
                    previous.kind,
                    previous.node(),
                    service.name
                ),
            });
        }
    }
    errors
}

/// Per-aggregate checker state
struct ConsistencyChecker<'a> {
    ir: &'a Ir,
    label: String,
    binding: &'a AggregateBinding,
    errors: Vec<ConsistencyError>,
}

impl<'a> ConsistencyChecker<'a> {
    fn new(ir: &'a Ir, label: String, binding: &'a AggregateBinding) -> Self {
        Self {
            ir,
            label,
            binding,
            errors: Vec::new(),
        }
    }

    fn error(&mut self, artifact: ArtifactKind, invariant: Invariant, message: impl Into<String>) {
        self.errors.push(ConsistencyError {
            aggregate: self.label.clone(),
            artifact,
            invariant,
            message: message.into(),
        });
    }

    fn entity_name(&self, target: Target) -> String {
        self.binding
            .target(target)
            .map(|b| self.ir.entity(b.entity).name.clone())
            .unwrap_or_else(|| format!("{target:?}"))
    }

    // ==================== COLUMN LISTS ====================

    fn check_columns(&mut self) {
        let binding = self.binding;
        let root = &binding.root;
        let name = self.entity_name(Target::Root);
        let projection = &root.entity.projection;

        self.expect_list(Target::Root, "scan", &root.entity.scan, projection);
        let Some(queries) = &root.queries else {
            self.error(
                ArtifactKind::Queries,
                Invariant::ColumnList,
                format!("`{name}` has no statements although persistence is planned"),
            );
            return;
        };
        self.expect_statement(Target::Root, "INSERT", &queries.insert, projection);
        self.expect_statement(Target::Root, "SELECT by id", &queries.select_by_id, projection);
        self.expect_statement(Target::Root, "SELECT all", &queries.select_all, projection);

        let set: Vec<usize> = projection
            .iter()
            .copied()
            .filter(|&i| i != root.entity.identifier && i != root.created)
            .collect();
        self.expect_statement(Target::Root, "UPDATE", &queries.update, &set);
        let mut params: Vec<Param> = set.iter().map(|&i| Param::Field(i)).collect();
        params.push(Param::Field(root.entity.identifier));
        if queries.update.params != params {
            self.error(
                ArtifactKind::Queries,
                Invariant::ColumnList,
                format!("`{name}` UPDATE binds its parameters out of column order"),
            );
        }

        for (i, child) in binding.children.iter().enumerate() {
            let target = Target::Child(i);
            let projection = &child.entity.projection;
            self.expect_list(target, "scan", &child.entity.scan, projection);
            let Some(queries) = &child.queries else {
                let name = self.entity_name(target);
                self.error(
                    ArtifactKind::Queries,
                    Invariant::ColumnList,
                    format!("`{name}` has no statements although persistence is planned"),
                );
                continue;
            };
            self.expect_statement(target, "INSERT", &queries.insert, projection);
            self.expect_statement(target, "SELECT", &queries.select_scoped, projection);
        }
    }

    /// Written/read columns equal `expected`; writes bind them in the same order
    fn expect_statement(
        &mut self,
        target: Target,
        what: &str,
        statement: &Statement,
        expected: &[usize],
    ) {
        self.expect_list(target, what, &statement.columns, expected);
        if what == "INSERT" {
            let params: Vec<Param> = expected.iter().map(|&i| Param::Field(i)).collect();
            if statement.params != params {
                let name = self.entity_name(target);
                self.error(
                    ArtifactKind::Queries,
                    Invariant::ColumnList,
                    format!("`{name}` INSERT binds its parameters out of column order"),
                );
            }
        }
    }

    fn expect_list(&mut self, target: Target, what: &str, actual: &[usize], expected: &[usize]) {
        if actual == expected {
            return;
        }
        let message = format!(
            "`{}` {what} columns {} differ from the projection {}",
            self.entity_name(target),
            self.describe(target, actual),
            self.describe(target, expected)
        );
        self.error(ArtifactKind::Queries, Invariant::ColumnList, message);
    }

    /// Column names for a list of field indices
    fn describe(&self, target: Target, columns: &[usize]) -> String {
        let fields = self
            .binding
            .target(target)
            .map(|b| self.ir.entity(b.entity).fields.as_slice())
            .unwrap_or_default();
        let names: Vec<&str> = columns
            .iter()
            .map(|&i| fields.get(i).map_or("?", |f| f.name.as_str()))
            .collect();
        format!("[{}]", names.join(", "))
    }

    // ==================== TRANSACTIONS ====================

    fn check_transactions(&mut self, aggregate: &Aggregate) {
        let binding = self.binding;

        for (path, ops) in binding.write_paths() {
            for op in ops {
                if op.handle != Handle::Transaction {
                    let name = self.entity_name(op.target);
                    self.error(
                        ArtifactKind::Repository,
                        Invariant::TransactionalOwnership,
                        format!("{path} writes `{name}` on a connection outside the operation's transaction"),
                    );
                }
                if let Target::Child(i) = op.target {
                    if binding.child(i).is_some_and(|c| !c.owned) {
                        let name = self.entity_name(op.target);
                        self.error(
                            ArtifactKind::Repository,
                            Invariant::TransactionalOwnership,
                            format!("{path} writes `{name}`, which the aggregate does not own"),
                        );
                    }
                }
            }
        }

        // Every owned child is written by each path that writes the root.
        let expected: [(&str, &[WriteKind]); 3] = [
            ("create", &[WriteKind::Insert]),
            ("save", &[WriteKind::Delete, WriteKind::Insert]),
            ("delete", &[WriteKind::Delete]),
        ];
        for (i, child) in binding.children.iter().enumerate() {
            if !child.owned {
                continue;
            }
            for ((path, ops), (_, kinds)) in binding.write_paths().into_iter().zip(expected) {
                for kind in kinds {
                    let found = ops
                        .iter()
                        .any(|op| op.target == Target::Child(i) && op.kind == *kind);
                    if !found {
                        let name = self.entity_name(Target::Child(i));
                        self.error(
                            ArtifactKind::Repository,
                            Invariant::TransactionalOwnership,
                            format!(
                                "{path} path of `{}` never issues the {} of owned child `{name}`",
                                aggregate.name,
                                kind.name()
                            ),
                        );
                    }
                }
            }
        }

        self.check_order();
    }

    /// Parents are inserted before and deleted after their children
    fn check_order(&mut self) {
        let binding = self.binding;
        for (path, ops) in binding.write_paths() {
            let position = |target: Target, kind: WriteKind| {
                ops.iter().position(|op| op.target == target && op.kind == kind)
            };
            for (i, child) in binding.children.iter().enumerate() {
                let parent_kind = match (child.parent, path) {
                    (Target::Root, "save") => WriteKind::Update,
                    _ => WriteKind::Insert,
                };
                let (Some(child_insert), Some(parent_write)) = (
                    position(Target::Child(i), WriteKind::Insert),
                    position(child.parent, parent_kind),
                ) else {
                    continue;
                };
                if child_insert < parent_write {
                    let name = self.entity_name(Target::Child(i));
                    self.error(
                        ArtifactKind::Repository,
                        Invariant::TransactionalOwnership,
                        format!("{path} inserts `{name}` before its parent is written"),
                    );
                }
            }
            for (i, child) in binding.children.iter().enumerate() {
                let (Some(child_delete), Some(parent_delete)) = (
                    position(Target::Child(i), WriteKind::Delete),
                    position(child.parent, WriteKind::Delete),
                ) else {
                    continue;
                };
                if child_delete > parent_delete {
                    let name = self.entity_name(Target::Child(i));
                    self.error(
                        ArtifactKind::Repository,
                        Invariant::TransactionalOwnership,
                        format!("{path} deletes `{name}` after its parent"),
                    );
                }
            }
        }
    }

    // ==================== STAMPS ====================

    fn check_stamps(&mut self) {
        let binding = self.binding;
        let root = &binding.root;
        let name = self.entity_name(Target::Root);

        let create = [
            Stamp {
                field: root.entity.identifier,
                role: Role::Identifier,
                action: StampAction::GenerateIfNil,
            },
            Stamp {
                field: root.created,
                role: Role::AuditCreated,
                action: StampAction::Now,
            },
            Stamp {
                field: root.updated,
                role: Role::AuditUpdated,
                action: StampAction::Now,
            },
        ];
        if !same_stamps(&binding.create_stamps, &create) {
            self.error(
                ArtifactKind::Repository,
                Invariant::IdentifierAudit,
                format!("create path of `{name}` must stamp exactly its identifier and both audit timestamps"),
            );
        }

        let update = [Stamp {
            field: root.updated,
            role: Role::AuditUpdated,
            action: StampAction::Now,
        }];
        if !same_stamps(&binding.update_stamps, &update) {
            self.error(
                ArtifactKind::Repository,
                Invariant::IdentifierAudit,
                format!("save path of `{name}` must stamp exactly its update timestamp"),
            );
        }

        if let Some(queries) = &root.queries {
            if queries.update.columns.contains(&root.entity.identifier) {
                self.error(
                    ArtifactKind::Queries,
                    Invariant::IdentifierAudit,
                    format!("UPDATE of `{name}` rewrites its identifier"),
                );
            }
            if queries.update.columns.contains(&root.created) {
                self.error(
                    ArtifactKind::Queries,
                    Invariant::IdentifierAudit,
                    format!("UPDATE of `{name}` rewrites its creation timestamp"),
                );
            }
        }

        for (i, child) in binding.children.iter().enumerate() {
            let expected = [Stamp {
                field: child.entity.identifier,
                role: Role::Identifier,
                action: StampAction::GenerateIfNil,
            }];
            if !same_stamps(&child.insert_stamps, &expected) {
                let name = self.entity_name(Target::Child(i));
                self.error(
                    ArtifactKind::Repository,
                    Invariant::IdentifierAudit,
                    format!("insert of `{name}` must generate its identifier when nil"),
                );
            }
        }
    }
}

/// Same stamps, in any order
fn same_stamps(actual: &[Stamp], expected: &[Stamp]) -> bool {
    actual.len() == expected.len() && expected.iter().all(|s| actual.contains(s))
}
