//! `repository.rs`: transactional CRUD over one aggregate
//!
//! The create, save and delete methods replay the aggregate binding's write
//! paths in order, each write on the executor its handle names. Loading
//! fetches every table of the aggregate inside one transaction and attaches
//! children to their parents deepest first.

use super::queries::{constant_name, scanner_name};
use super::writer::{CodeWriter, field_ident, local_ident, type_ident};
use super::{Context, Sqlx};
use crate::bind::{
    ChildBinding, Handle, Param, Stamp, StampAction, Statement, Target, WriteKind, WriteOp,
};
use crate::diagnostics::RenderError;
use crate::ir::Entity;
use crate::types::Cardinality;
use heck::ToSnakeCase;

/// Name of the repository type of an aggregate
pub(super) fn repository_name(cx: &Context<'_>) -> String {
    format!("{}Repository", type_ident(&cx.root().name))
}

pub(super) fn render(cx: &Context<'_>) -> Result<String, RenderError> {
    let sqlx = Sqlx::of(cx.backend()?);
    let root = cx.root();
    let root_ty = type_ident(&root.name);
    let name = repository_name(cx);

    let mut w = CodeWriter::new();
    w.banner();
    w.line(format!("use super::model::{{{}}};", cx.type_names().join(", ")));
    w.line("use super::queries;");
    w.blank();

    w.doc(format!(
        "Persistence of the `{}` aggregate. Every write runs in a transaction.",
        cx.aggregate.name
    ));
    w.line("#[derive(Debug, Clone)]");
    w.open(format!("pub struct {name} {{"));
    w.line(format!("pool: {},", sqlx.pool));
    w.close("}");
    w.blank();

    w.open(format!("impl {name} {{"));
    w.open(format!("pub fn new(pool: {}) -> Self {{", sqlx.pool));
    w.line("Self { pool }");
    w.close("}");
    w.blank();
    w.open(format!("pub fn pool(&self) -> &{} {{", sqlx.pool));
    w.line("&self.pool");
    w.close("}");

    let r = Renderer { cx, root, root_ty };
    w.blank();
    r.create(&mut w)?;
    w.blank();
    r.get(&mut w)?;
    w.blank();
    r.list(&mut w)?;
    w.blank();
    r.save(&mut w)?;
    w.blank();
    r.delete(&mut w)?;

    for (i, child) in cx.binding.children.iter().enumerate() {
        if !child.owned {
            w.blank();
            r.add(&mut w, i, child)?;
            w.blank();
            r.remove(&mut w, i)?;
        }
    }

    if r.has_owned_children() {
        w.blank();
        r.stamp_children(&mut w)?;
    }
    w.close("}");

    Ok(w.finish())
}

/// Executor expression for a write handle
fn executor(handle: Handle) -> &'static str {
    match handle {
        Handle::Transaction => "&mut *tx",
        Handle::Connection => "&self.pool",
    }
}

/// Variable holding the root model
const ROOT: &str = "root";

struct Renderer<'a, 'c> {
    cx: &'a Context<'c>,
    root: &'a Entity,
    root_ty: String,
}

impl Renderer<'_, '_> {
    fn has_owned_children(&self) -> bool {
        self.cx.binding.children.iter().any(|c| c.owned)
    }

    fn entity(&self, target: Target) -> Result<&Entity, RenderError> {
        self.cx.entity(target)
    }

    /// Variable naming one instance of `target`
    fn var(&self, target: Target) -> Result<String, RenderError> {
        match target {
            Target::Root => Ok(ROOT.to_string()),
            Target::Child(_) => Ok(local_ident(&self.entity(target)?.name)),
        }
    }

    fn rows_var(&self, target: Target) -> Result<String, RenderError> {
        Ok(format!("{}_rows", self.entity(target)?.name.to_snake_case()))
    }

    fn child(&self, index: usize) -> Result<&ChildBinding, RenderError> {
        self.cx
            .binding
            .child(index)
            .ok_or_else(|| self.cx.error(format!("no child bound at index {index}")))
    }

    /// `root.id`
    fn root_id(&self) -> String {
        let id = self.cx.binding.root.entity.identifier;
        format!("{ROOT}.{}", field_ident(&self.root.fields[id].name))
    }

    fn field(&self, target: Target, index: usize) -> Result<String, RenderError> {
        let entity = self.entity(target)?;
        entity
            .fields
            .get(index)
            .map(|f| field_ident(&f.name))
            .ok_or_else(|| self.cx.error(format!("`{}` has no field #{index}", entity.name)))
    }

    // ==================== STATEMENTS ====================

    /// Argument expression of one bound parameter
    fn argument(
        &self,
        target: Target,
        var: &str,
        param: Param,
        root_id: &str,
    ) -> Result<String, RenderError> {
        match param {
            Param::Field(index) => {
                let entity = self.entity(target)?;
                let field = entity.fields.get(index).ok_or_else(|| {
                    self.cx.error(format!("`{}` binds missing field #{index}", entity.name))
                })?;
                let ident = field_ident(&field.name);
                Ok(match (field.ty.is_enum(), field.nullable) {
                    (true, true) => format!("{var}.{ident}.map(|v| v.as_str())"),
                    (true, false) => format!("{var}.{ident}.as_str()"),
                    (false, _) => format!("&{var}.{ident}"),
                })
            }
            Param::RootId => Ok(root_id.to_string()),
            Param::RowId => Ok("id".to_string()),
        }
    }

    /// `{head}sqlx::query(..).bind(..)` followed by `tail`
    #[allow(clippy::too_many_arguments)]
    fn statement(
        &self,
        w: &mut CodeWriter,
        head: &str,
        target: Target,
        constant: &str,
        statement: &Statement,
        var: &str,
        root_id: &str,
        tail: &[String],
    ) -> Result<(), RenderError> {
        let entity = self.entity(target)?;
        let mut lines = vec![format!(
            "{head}sqlx::query(queries::{})",
            constant_name(entity, constant)
        )];
        for &param in &statement.params {
            lines.push(format!(".bind({})", self.argument(target, var, param, root_id)?));
        }
        lines.extend(tail.iter().cloned());
        chain(w, &lines);
        Ok(())
    }

    fn execute(handle: Handle) -> Vec<String> {
        vec![
            format!(".execute({})", executor(handle)),
            ".await?;".to_string(),
        ]
    }

    fn rows_affected(handle: Handle) -> Vec<String> {
        vec![
            format!(".execute({})", executor(handle)),
            ".await?".to_string(),
            ".rows_affected();".to_string(),
        ]
    }

    /// Replay one write of a create/save/delete path
    fn write(&self, w: &mut CodeWriter, op: WriteOp, root_id: &str) -> Result<(), RenderError> {
        let binding = self.cx.binding;
        match op.target {
            Target::Root => {
                let queries = binding
                    .root
                    .queries
                    .as_ref()
                    .ok_or_else(|| self.cx.error("the root has no bound statements"))?;
                match op.kind {
                    WriteKind::Insert => self.statement(
                        w,
                        "",
                        Target::Root,
                        "insert",
                        &queries.insert,
                        ROOT,
                        root_id,
                        &Self::execute(op.handle),
                    ),
                    WriteKind::Update => {
                        self.statement(
                            w,
                            "let updated = ",
                            Target::Root,
                            "update",
                            &queries.update,
                            ROOT,
                            root_id,
                            &Self::rows_affected(op.handle),
                        )?;
                        w.open("if updated == 0 {");
                        w.line("return Ok(None);");
                        w.close("}");
                        Ok(())
                    }
                    WriteKind::Delete => self.statement(
                        w,
                        "let deleted = ",
                        Target::Root,
                        "delete",
                        &queries.delete,
                        ROOT,
                        root_id,
                        &Self::rows_affected(op.handle),
                    ),
                }
            }
            Target::Child(index) => {
                let child = self.child(index)?;
                let queries = child.queries.as_ref().ok_or_else(|| {
                    self.cx.error(format!("child #{index} has no bound statements"))
                })?;
                match op.kind {
                    WriteKind::Insert => {
                        let depth = self.open_loops(w, index, false)?;
                        let var = self.var(op.target)?;
                        self.statement(
                            w,
                            "",
                            op.target,
                            "insert",
                            &queries.insert,
                            &var,
                            root_id,
                            &Self::execute(op.handle),
                        )?;
                        close_loops(w, depth);
                        Ok(())
                    }
                    WriteKind::Delete => self.statement(
                        w,
                        "",
                        op.target,
                        "delete_scoped",
                        &queries.delete_scoped,
                        "",
                        root_id,
                        &Self::execute(op.handle),
                    ),
                    WriteKind::Update => Err(self.cx.error(format!(
                        "child #{index} is rewritten, never updated in place"
                    ))),
                }
            }
        }
    }

    /// Open one loop per relation from the root down to child `index`
    fn open_loops(
        &self,
        w: &mut CodeWriter,
        index: usize,
        mutable: bool,
    ) -> Result<usize, RenderError> {
        let lineage = self.cx.binding.lineage(index);
        for &i in &lineage {
            let child = self.child(i)?;
            let parent = self.var(child.parent)?;
            let var = self.var(Target::Child(i))?;
            let relation = field_ident(&child.relation);
            w.open(match (child.cardinality, mutable) {
                (Cardinality::Many, true) => {
                    format!("for {var} in {parent}.{relation}.iter_mut() {{")
                }
                (Cardinality::Many, false) => format!("for {var} in &{parent}.{relation} {{"),
                (Cardinality::One, true) => {
                    format!("if let Some({var}) = {parent}.{relation}.as_mut() {{")
                }
                (Cardinality::One, false) => format!("if let Some({var}) = &{parent}.{relation} {{"),
            });
        }
        Ok(lineage.len())
    }

    fn stamps(&self, w: &mut CodeWriter, target: Target, stamps: &[Stamp]) -> Result<(), RenderError> {
        let var = self.var(target)?;
        for stamp in stamps {
            let field = self.field(target, stamp.field)?;
            match stamp.action {
                StampAction::GenerateIfNil => {
                    w.open(format!("if {var}.{field}.is_nil() {{"));
                    w.line(format!("{var}.{field} = uuid::Uuid::new_v4();"));
                    w.close("}");
                }
                StampAction::Now => w.line(format!("{var}.{field} = now;")),
            }
        }
        Ok(())
    }

    fn now_if_needed(w: &mut CodeWriter, stamps: &[Stamp]) {
        if stamps.iter().any(|s| s.action == StampAction::Now) {
            w.line("let now = chrono::Utc::now();");
        }
    }

    /// Replay a write path inside one transaction
    fn write_path(&self, w: &mut CodeWriter, ops: &[WriteOp], root_id: &str) -> Result<(), RenderError> {
        w.line("let mut tx = self.pool.begin().await?;");
        for &op in ops {
            self.write(w, op, root_id)?;
        }
        w.line("tx.commit().await?;");
        Ok(())
    }

    fn requires_root(&self, path: &str, ops: &[WriteOp], kind: WriteKind) -> Result<(), RenderError> {
        if ops.iter().any(|op| op.target == Target::Root && op.kind == kind) {
            Ok(())
        } else {
            Err(self.cx.error(format!("the {path} path never issues the root {}", kind.name())))
        }
    }

    // ==================== OPERATIONS ====================

    fn create(&self, w: &mut CodeWriter) -> Result<(), RenderError> {
        let binding = self.cx.binding;
        let ty = &self.root_ty;
        self.requires_root("create", &binding.create, WriteKind::Insert)?;

        w.doc("Insert the root and every owned child in one transaction.");
        w.doc("A nil identifier is replaced with a fresh one; both audit timestamps are set.");
        w.open(format!(
            "pub async fn create(&self, mut {ROOT}: {ty}) -> Result<{ty}, sqlx::Error> {{"
        ));
        Self::now_if_needed(w, &binding.create_stamps);
        self.stamps(w, Target::Root, &binding.create_stamps)?;
        if self.has_owned_children() {
            w.line(format!("Self::stamp_children(&mut {ROOT});"));
        }
        w.blank();
        self.write_path(w, &binding.create, &self.root_id())?;
        w.line(format!("Ok({ROOT})"));
        w.close("}");
        Ok(())
    }

    fn get(&self, w: &mut CodeWriter) -> Result<(), RenderError> {
        let binding = self.cx.binding;
        let ty = &self.root_ty;
        let queries = binding
            .root
            .queries
            .as_ref()
            .ok_or_else(|| self.cx.error("the root has no bound statements"))?;

        w.doc("Load the aggregate with all of its children");
        w.open(format!(
            "pub async fn get(&self, id: uuid::Uuid) -> Result<Option<{ty}>, sqlx::Error> {{"
        ));
        w.line("let mut tx = self.pool.begin().await?;");
        self.statement(
            w,
            "let Some(row) = ",
            Target::Root,
            "select_by_id",
            &queries.select_by_id,
            ROOT,
            "id",
            &[
                format!(".fetch_optional({})", executor(Handle::Transaction)),
                ".await?".to_string(),
            ],
        )?;
        w.open("else {");
        w.line("return Ok(None);");
        w.close("};");

        let mutable_root = binding.children_of(Target::Root).next().is_some();
        w.line(format!(
            "let {}{ROOT} = queries::{}(&row)?;",
            if mutable_root { "mut " } else { "" },
            scanner_name(self.root)
        ));

        for (i, child) in binding.children.iter().enumerate() {
            let target = Target::Child(i);
            let entity = self.entity(target)?;
            let queries = child.queries.as_ref().ok_or_else(|| {
                self.cx.error(format!("`{}` has no bound statements", entity.name))
            })?;
            let mutable = binding.children_of(target).next().is_some();
            let head = format!(
                "let {}{} = ",
                if mutable { "mut " } else { "" },
                self.rows_var(target)?
            );
            self.statement(
                w,
                &head,
                target,
                "select_scoped",
                &queries.select_scoped,
                "",
                "id",
                &[
                    format!(".fetch_all({})", executor(Handle::Transaction)),
                    ".await?".to_string(),
                    ".iter()".to_string(),
                    format!(".map(queries::{})", scanner_name(entity)),
                    format!(".collect::<Result<Vec<{}>, _>>()?;", type_ident(&entity.name)),
                ],
            )?;
        }
        w.line("tx.commit().await?;");

        for i in (0..binding.children.len()).rev() {
            self.attach(w, i)?;
        }
        w.line(format!("Ok(Some({ROOT}))"));
        w.close("}");
        Ok(())
    }

    /// Attach the loaded rows of child `index` to their parents
    fn attach(&self, w: &mut CodeWriter, index: usize) -> Result<(), RenderError> {
        let child = self.child(index)?;
        let target = Target::Child(index);
        let var = self.var(target)?;
        let rows = self.rows_var(target)?;
        let key = self.field(target, child.key)?;
        let relation = field_ident(&child.relation);

        let parent_entity = self.entity(child.parent)?;
        let parent_binding = self
            .cx
            .binding
            .target(child.parent)
            .ok_or_else(|| self.cx.error("parent is not bound"))?;
        let parent_id = field_ident(&parent_entity.fields[parent_binding.identifier].name);

        let select = match child.cardinality {
            Cardinality::Many => ".filter",
            Cardinality::One => ".find",
        };
        let finish = match child.cardinality {
            Cardinality::Many => ".cloned().collect()",
            Cardinality::One => ".cloned()",
        };
        match child.parent {
            Target::Root => {
                w.line(format!(
                    "{ROOT}.{relation} = {rows}.iter(){select}(|{var}| {var}.{key} == {ROOT}.{parent_id}){finish};"
                ));
            }
            Target::Child(_) => {
                let parent = self.var(child.parent)?;
                let parent_rows = self.rows_var(child.parent)?;
                w.open(format!("for {parent} in {parent_rows}.iter_mut() {{"));
                w.line(format!(
                    "{parent}.{relation} = {rows}.iter(){select}(|{var}| {var}.{key} == {parent}.{parent_id}){finish};"
                ));
                w.close("}");
            }
        }
        Ok(())
    }

    fn list(&self, w: &mut CodeWriter) -> Result<(), RenderError> {
        let ty = &self.root_ty;
        w.doc("Every root, without children");
        w.open(format!(
            "pub async fn list(&self) -> Result<Vec<{ty}>, sqlx::Error> {{"
        ));
        chain(
            w,
            &[
                format!("sqlx::query(queries::{})", constant_name(self.root, "select_all")),
                format!(".fetch_all({})", executor(Handle::Connection)),
                ".await?".to_string(),
                ".iter()".to_string(),
                format!(".map(queries::{})", scanner_name(self.root)),
                ".collect()".to_string(),
            ],
        );
        w.close("}");
        Ok(())
    }

    fn save(&self, w: &mut CodeWriter) -> Result<(), RenderError> {
        let binding = self.cx.binding;
        let ty = &self.root_ty;
        self.requires_root("save", &binding.save, WriteKind::Update)?;

        w.doc("Update the root and replace its owned children in one transaction.");
        w.doc("Returns `None` when no root with this identifier exists.");
        w.open(format!(
            "pub async fn save(&self, mut {ROOT}: {ty}) -> Result<Option<{ty}>, sqlx::Error> {{"
        ));
        Self::now_if_needed(w, &binding.update_stamps);
        self.stamps(w, Target::Root, &binding.update_stamps)?;
        if self.has_owned_children() {
            w.line(format!("Self::stamp_children(&mut {ROOT});"));
        }
        w.blank();
        self.write_path(w, &binding.save, &self.root_id())?;
        w.line(format!("self.get({}).await", self.root_id()));
        w.close("}");
        Ok(())
    }

    fn delete(&self, w: &mut CodeWriter) -> Result<(), RenderError> {
        let binding = self.cx.binding;
        self.requires_root("delete", &binding.delete, WriteKind::Delete)?;

        w.doc("Delete the root and every owned child in one transaction");
        w.open("pub async fn delete(&self, id: uuid::Uuid) -> Result<bool, sqlx::Error> {");
        self.write_path(w, &binding.delete, "id")?;
        w.line("Ok(deleted > 0)");
        w.close("}");
        Ok(())
    }

    /// `add_<child>` for a child the aggregate references but does not own
    fn add(&self, w: &mut CodeWriter, index: usize, child: &ChildBinding) -> Result<(), RenderError> {
        let target = Target::Child(index);
        let entity = self.entity(target)?;
        let parent = self.entity(child.parent)?;
        let ty = type_ident(&entity.name);
        let var = self.var(target)?;
        let key = self.field(target, child.key)?;
        let queries = child.queries.as_ref().ok_or_else(|| {
            self.cx.error(format!("`{}` has no bound statements", entity.name))
        })?;

        w.doc(format!(
            "Add a `{}` under an existing `{}` in its own transaction",
            entity.name, parent.name
        ));
        w.open(format!(
            "pub async fn add_{}(&self, parent_id: uuid::Uuid, mut {var}: {ty}) -> Result<{ty}, sqlx::Error> {{",
            entity.name.to_snake_case()
        ));
        Self::now_if_needed(w, &child.insert_stamps);
        self.stamps(w, target, &child.insert_stamps)?;
        w.line(format!("{var}.{key} = parent_id;"));
        w.blank();
        w.line("let mut tx = self.pool.begin().await?;");
        self.statement(
            w,
            "",
            target,
            "insert",
            &queries.insert,
            &var,
            "parent_id",
            &Self::execute(Handle::Transaction),
        )?;
        w.line("tx.commit().await?;");
        w.line(format!("Ok({var})"));
        w.close("}");
        Ok(())
    }

    fn remove(&self, w: &mut CodeWriter, index: usize) -> Result<(), RenderError> {
        let target = Target::Child(index);
        let child = self.child(index)?;
        let entity = self.entity(target)?;
        let queries = child.queries.as_ref().ok_or_else(|| {
            self.cx.error(format!("`{}` has no bound statements", entity.name))
        })?;

        w.doc(format!("Remove one `{}` in its own transaction", entity.name));
        w.open(format!(
            "pub async fn remove_{}(&self, id: uuid::Uuid) -> Result<bool, sqlx::Error> {{",
            entity.name.to_snake_case()
        ));
        w.line("let mut tx = self.pool.begin().await?;");
        self.statement(
            w,
            "let deleted = ",
            target,
            "delete_by_id",
            &queries.delete_by_id,
            "",
            "id",
            &Self::rows_affected(Handle::Transaction),
        )?;
        w.line("tx.commit().await?;");
        w.line("Ok(deleted > 0)");
        w.close("}");
        Ok(())
    }

    /// Identifier and owned-by key of every owned child, parents first
    fn stamp_children(&self, w: &mut CodeWriter) -> Result<(), RenderError> {
        let binding = self.cx.binding;
        w.open(format!("fn stamp_children({ROOT}: &mut {}) {{", self.root_ty));
        let stamps: Vec<Stamp> = binding
            .children
            .iter()
            .filter(|c| c.owned)
            .flat_map(|c| c.insert_stamps.iter().copied())
            .collect();
        Self::now_if_needed(w, &stamps);

        for (i, child) in binding.children.iter().enumerate() {
            if !child.owned {
                continue;
            }
            let target = Target::Child(i);
            let depth = self.open_loops(w, i, true)?;
            self.stamps(w, target, &child.insert_stamps)?;

            let var = self.var(target)?;
            let key = self.field(target, child.key)?;
            let parent = self.var(child.parent)?;
            let parent_binding = binding
                .target(child.parent)
                .ok_or_else(|| self.cx.error("parent is not bound"))?;
            let parent_id = self.field(child.parent, parent_binding.identifier)?;
            w.line(format!("{var}.{key} = {parent}.{parent_id};"));
            close_loops(w, depth);
        }
        w.close("}");
        Ok(())
    }
}

fn close_loops(w: &mut CodeWriter, depth: usize) {
    for _ in 0..depth {
        w.close("}");
    }
}

/// A method chain, one call per line
fn chain(w: &mut CodeWriter, lines: &[String]) {
    let Some((first, rest)) = lines.split_first() else {
        return;
    };
    w.line(first);
    w.indent();
    for line in rest {
        w.line(line);
    }
    w.dedent();
}
