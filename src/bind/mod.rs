//! Aggregate bindings
//!
//! Everything two generated files must agree on is computed here exactly
//! once per aggregate: column lists, SQL text and parameter order, scan
//! order, identifier/timestamp stamping and which handle each write of the
//! create/save/delete paths runs on. Templates read an [`AggregateBinding`]
//! by reference and the consistency validator audits the same value, so a
//! template can never disagree with what was checked.

pub mod sql;

use crate::ir::{Aggregate, Entity, EntityId, Ir, Service};
use crate::types::{Backend, Cardinality, Role};

/// Shared data of one aggregate
#[derive(Debug, Clone, PartialEq)]
pub struct AggregateBinding {
    /// `service.aggregate`
    pub label: String,
    pub backend: Option<Backend>,
    pub root: RootBinding,
    /// In canonical write order
    pub children: Vec<ChildBinding>,
    /// Writes of the create path, in execution order
    pub create: Vec<WriteOp>,
    /// Writes of the save path, in execution order
    pub save: Vec<WriteOp>,
    /// Writes of the delete path, in execution order
    pub delete: Vec<WriteOp>,
    /// Values stamped on the root before the create path runs
    pub create_stamps: Vec<Stamp>,
    /// Values stamped on the root before the save path runs
    pub update_stamps: Vec<Stamp>,
}

impl AggregateBinding {
    pub fn child(&self, index: usize) -> Option<&ChildBinding> {
        self.children.get(index)
    }

    pub fn target(&self, target: Target) -> Option<&EntityBinding> {
        match target {
            Target::Root => Some(&self.root.entity),
            Target::Child(i) => self.child(i).map(|c| &c.entity),
        }
    }

    /// Child bindings whose parent is `parent`
    pub fn children_of(&self, parent: Target) -> impl Iterator<Item = (usize, &ChildBinding)> {
        self.children
            .iter()
            .enumerate()
            .filter(move |(_, c)| c.parent == parent)
    }

    /// Chain of child indices from the root down to `index`, inclusive
    pub fn lineage(&self, index: usize) -> Vec<usize> {
        let mut chain = vec![index];
        let mut current = index;
        while let Some(Target::Child(parent)) = self.child(current).map(|c| c.parent) {
            chain.push(parent);
            current = parent;
        }
        chain.reverse();
        chain
    }

    /// All write paths, labelled
    pub fn write_paths(&self) -> [(&'static str, &[WriteOp]); 3] {
        [
            ("create", self.create.as_slice()),
            ("save", self.save.as_slice()),
            ("delete", self.delete.as_slice()),
        ]
    }
}

/// Column data of one entity
#[derive(Debug, Clone, PartialEq)]
pub struct EntityBinding {
    pub entity: EntityId,
    pub table: String,
    /// Field indices in column order
    pub projection: Vec<usize>,
    /// Field indices in the order a result row is read
    pub scan: Vec<usize>,
    /// Index of the identifier field
    pub identifier: usize,
}

/// Aggregate root
#[derive(Debug, Clone, PartialEq)]
pub struct RootBinding {
    pub entity: EntityBinding,
    pub created: usize,
    pub updated: usize,
    /// `None` without a persistence backend
    pub queries: Option<RootQueries>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RootQueries {
    pub insert: Statement,
    pub select_by_id: Statement,
    pub select_all: Statement,
    pub update: Statement,
    pub delete: Statement,
}

/// A child entity and the relation leading to it
#[derive(Debug, Clone, PartialEq)]
pub struct ChildBinding {
    pub entity: EntityBinding,
    pub parent: Target,
    /// Relation name, also the parent's field holding this child
    pub relation: String,
    pub cardinality: Cardinality,
    pub owned: bool,
    /// Index of the owned-by key field
    pub key: usize,
    /// Values stamped before each insert
    pub insert_stamps: Vec<Stamp>,
    pub queries: Option<ChildQueries>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ChildQueries {
    pub insert: Statement,
    /// Every row belonging to one root
    pub select_scoped: Statement,
    /// Delete every row belonging to one root
    pub delete_scoped: Statement,
    /// Delete a single row by identifier
    pub delete_by_id: Statement,
}

/// SQL text plus the columns it touches and its bind order
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Statement {
    pub sql: String,
    /// Columns written (INSERT, UPDATE SET) or read (SELECT), by field index
    pub columns: Vec<usize>,
    pub params: Vec<Param>,
}

/// A bound parameter
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Param {
    /// Value of a field of the row being written
    Field(usize),
    /// Identifier of the aggregate root
    RootId,
    /// Identifier of the single row being addressed
    RowId,
}

/// Root or a child by index into [`AggregateBinding::children`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Target {
    Root,
    Child(usize),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteKind {
    Insert,
    Update,
    Delete,
}

impl WriteKind {
    pub fn name(&self) -> &'static str {
        match self {
            WriteKind::Insert => "insert",
            WriteKind::Update => "update",
            WriteKind::Delete => "delete",
        }
    }
}

/// Executor a write runs on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Handle {
    /// The transaction opened for the operation
    Transaction,
    /// A pooled connection outside any transaction
    Connection,
}

/// One write of a repository operation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WriteOp {
    pub target: Target,
    pub kind: WriteKind,
    pub handle: Handle,
}

impl WriteOp {
    fn in_transaction(target: Target, kind: WriteKind) -> Self {
        Self {
            target,
            kind,
            handle: Handle::Transaction,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StampAction {
    /// Generate a fresh identifier unless the caller supplied one
    GenerateIfNil,
    /// Current time
    Now,
}

/// A managed value set by generated code
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Stamp {
    pub field: usize,
    pub role: Role,
    pub action: StampAction,
}

// ==================== LOWERING ====================

/// Bind every aggregate of the IR, in declaration order
pub fn bind(ir: &Ir) -> Vec<AggregateBinding> {
    ir.aggregates()
        .map(|(service, aggregate)| bind_aggregate(ir, service, aggregate))
        .collect()
}

/// Compute the binding of one aggregate
pub fn bind_aggregate(ir: &Ir, service: &Service, aggregate: &Aggregate) -> AggregateBinding {
    let backend = service.capabilities.persistence;
    let root_entity = ir.entity(aggregate.root);

    let root = bind_root(aggregate.root, root_entity, backend);

    // Children in canonical order; parents precede their children.
    let children_ids = aggregate.children();
    let position = |id: EntityId| -> Target {
        children_ids
            .iter()
            .position(|c| *c == id)
            .map_or(Target::Root, Target::Child)
    };

    let mut children: Vec<ChildBinding> = Vec::with_capacity(children_ids.len());
    for &id in children_ids {
        let Some(relation) = aggregate.relation_into(id) else {
            continue;
        };
        let entity = ir.entity(id);
        let parent = position(relation.from);
        let binding = entity_binding(id, entity);
        let queries = backend.map(|backend| {
            let scope = scope_filter(ir, &children, parent, relation.key, entity, backend);
            child_queries(backend, entity, &binding, scope)
        });
        children.push(ChildBinding {
            insert_stamps: vec![Stamp {
                field: binding.identifier,
                role: Role::Identifier,
                action: StampAction::GenerateIfNil,
            }],
            entity: binding,
            parent,
            relation: relation.name.clone(),
            cardinality: relation.cardinality,
            owned: relation.owned,
            key: relation.key,
            queries,
        });
    }

    let owned: Vec<usize> = children
        .iter()
        .enumerate()
        .filter(|(_, c)| c.owned)
        .map(|(i, _)| i)
        .collect();

    let mut create = vec![WriteOp::in_transaction(Target::Root, WriteKind::Insert)];
    create.extend(inserts(&owned));

    let mut save = vec![WriteOp::in_transaction(Target::Root, WriteKind::Update)];
    save.extend(deletes(&owned));
    save.extend(inserts(&owned));

    let mut delete: Vec<WriteOp> = deletes(&owned).collect();
    delete.push(WriteOp::in_transaction(Target::Root, WriteKind::Delete));

    let create_stamps = vec![
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
    let update_stamps = vec![Stamp {
        field: root.updated,
        role: Role::AuditUpdated,
        action: StampAction::Now,
    }];

    AggregateBinding {
        label: aggregate.label(service),
        backend,
        root,
        children,
        create,
        save,
        delete,
        create_stamps,
        update_stamps,
    }
}

fn inserts(owned: &[usize]) -> impl Iterator<Item = WriteOp> + '_ {
    owned
        .iter()
        .map(|&i| WriteOp::in_transaction(Target::Child(i), WriteKind::Insert))
}

/// Deepest first
fn deletes(owned: &[usize]) -> impl Iterator<Item = WriteOp> + '_ {
    owned
        .iter()
        .rev()
        .map(|&i| WriteOp::in_transaction(Target::Child(i), WriteKind::Delete))
}

fn entity_binding(id: EntityId, entity: &Entity) -> EntityBinding {
    let projection: Vec<usize> = (0..entity.projection().len()).collect();
    EntityBinding {
        entity: id,
        table: entity.table.clone(),
        scan: projection.clone(),
        identifier: entity.role_index(Role::Identifier).unwrap_or_default(),
        projection,
    }
}

fn bind_root(id: EntityId, entity: &Entity, backend: Option<Backend>) -> RootBinding {
    let binding = entity_binding(id, entity);
    let created = entity.role_index(Role::AuditCreated).unwrap_or_default();
    let updated = entity.role_index(Role::AuditUpdated).unwrap_or_default();
    let queries = backend.map(|backend| root_queries(backend, entity, &binding, created));
    RootBinding {
        entity: binding,
        created,
        updated,
        queries,
    }
}

fn names<'e>(entity: &'e Entity, columns: &[usize]) -> Vec<&'e str> {
    columns
        .iter()
        .map(|&i| entity.fields[i].name.as_str())
        .collect()
}

fn root_queries(
    backend: Backend,
    entity: &Entity,
    binding: &EntityBinding,
    created: usize,
) -> RootQueries {
    let projection = &binding.projection;
    let columns = names(entity, projection);
    let id = entity.fields[binding.identifier].name.as_str();

    // The identifier and creation stamp are fixed once the row exists.
    let set: Vec<usize> = projection
        .iter()
        .copied()
        .filter(|&i| i != binding.identifier && i != created)
        .collect();
    let mut update_params: Vec<Param> = set.iter().map(|&i| Param::Field(i)).collect();
    update_params.push(Param::Field(binding.identifier));

    RootQueries {
        insert: Statement {
            sql: sql::insert(backend, &entity.table, &columns),
            columns: projection.clone(),
            params: projection.iter().map(|&i| Param::Field(i)).collect(),
        },
        select_by_id: Statement {
            sql: sql::select(&entity.table, &columns, Some(sql::eq(backend, id, 1).as_str())),
            columns: projection.clone(),
            params: vec![Param::RootId],
        },
        select_all: Statement {
            sql: sql::select_ordered(&entity.table, &columns, id),
            columns: projection.clone(),
            params: Vec::new(),
        },
        update: Statement {
            sql: sql::update(backend, &entity.table, &names(entity, &set), id),
            columns: set,
            params: update_params,
        },
        delete: Statement {
            sql: sql::delete(&entity.table, &sql::eq(backend, id, 1)),
            columns: Vec::new(),
            params: vec![Param::RootId],
        },
    }
}

fn child_queries(
    backend: Backend,
    entity: &Entity,
    binding: &EntityBinding,
    scope: String,
) -> ChildQueries {
    let projection = &binding.projection;
    let columns = names(entity, projection);
    let id = entity.fields[binding.identifier].name.as_str();

    ChildQueries {
        insert: Statement {
            sql: sql::insert(backend, &entity.table, &columns),
            columns: projection.clone(),
            params: projection.iter().map(|&i| Param::Field(i)).collect(),
        },
        select_scoped: Statement {
            sql: format!(
                "{} ORDER BY {}",
                sql::select(&entity.table, &columns, Some(scope.as_str())),
                sql::quote(id)
            ),
            columns: projection.clone(),
            params: vec![Param::RootId],
        },
        delete_scoped: Statement {
            sql: sql::delete(&entity.table, &scope),
            columns: Vec::new(),
            params: vec![Param::RootId],
        },
        delete_by_id: Statement {
            sql: sql::delete(&entity.table, &sql::eq(backend, id, 1)),
            columns: Vec::new(),
            params: vec![Param::RowId],
        },
    }
}

/// Filter selecting the rows of `entity` that belong to one root.
///
/// A direct child of the root compares its key with the root id; deeper
/// children nest the parent's filter in a subquery.
fn scope_filter(
    ir: &Ir,
    children: &[ChildBinding],
    parent: Target,
    key: usize,
    entity: &Entity,
    backend: Backend,
) -> String {
    let key = entity.fields[key].name.as_str();
    match parent {
        Target::Root => sql::eq(backend, key, 1),
        Target::Child(index) => {
            let parent = &children[index];
            let parent_entity = ir.entity(parent.entity.entity);
            let parent_id = parent_entity.fields[parent.entity.identifier].name.as_str();
            let inner = scope_filter(
                ir,
                children,
                parent.parent,
                parent.key,
                parent_entity,
                backend,
            );
            sql::in_subquery(key, &parent.entity.table, parent_id, &inner)
        }
    }
}
