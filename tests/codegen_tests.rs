//! Template tests
//!
//! Checks the generated source of the demo specification: every value two
//! files must agree on is spelled the same way in each of them.

use pretty_assertions::assert_eq;
use svcforge::bind::{self, Target};
use svcforge::codegen::writer::BANNER;
use svcforge::codegen::{self, Rendered};
use svcforge::diagnostics::RenderError;
use svcforge::plan::{self, ArtifactKind, ArtifactSpec, Plan};
use svcforge::{Ir, SourceFile};

const TODO: &str = include_str!("../demos/todo.toml");

fn demo() -> (Ir, Vec<Rendered>) {
    let ir = svcforge::analyze(&SourceFile::new("todo.toml", TODO)).unwrap();
    let plan = plan::plan(&ir);
    let rendered = codegen::render(&ir, &plan).unwrap();
    (ir, rendered)
}

fn file<'a>(rendered: &'a [Rendered], path: &str) -> &'a str {
    rendered
        .iter()
        .find(|r| r.path == path)
        .map(|r| r.contents.as_str())
        .unwrap_or_else(|| panic!("{path} was not rendered"))
}

#[test]
fn test_every_file_has_banner() {
    let (_, rendered) = demo();
    assert_eq!(rendered.len(), 13);
    for file in &rendered {
        assert!(file.contents.starts_with(BANNER), "{}", file.path);
    }
}

#[test]
fn test_rendered_in_plan_order() {
    let (ir, rendered) = demo();
    let plan = plan::plan(&ir);
    let rendered_paths: Vec<&str> = rendered.iter().map(|r| r.path.as_str()).collect();
    let planned_paths: Vec<&str> = plan.paths().collect();
    assert_eq!(rendered_paths, planned_paths);
}

#[test]
fn test_root_statements() {
    let (_, rendered) = demo();
    let queries = file(&rendered, "todo/lists/queries.rs");
    insta::assert_snapshot!(
        queries.lines().find(|l| l.starts_with("pub const LIST_INSERT")).unwrap(),
        @r###"pub const LIST_INSERT: &str = r#"INSERT INTO "lists" ("id", "name", "description", "created_at", "updated_at") VALUES ($1, $2, $3, $4, $5)"#;"###
    );
    insta::assert_snapshot!(
        queries.lines().find(|l| l.starts_with("pub const LIST_UPDATE")).unwrap(),
        @r###"pub const LIST_UPDATE: &str = r#"UPDATE "lists" SET "name" = $1, "description" = $2, "updated_at" = $3 WHERE "id" = $4"#;"###
    );
}

#[test]
fn test_nested_child_is_scoped_through_its_parent() {
    let (_, rendered) = demo();
    let queries = file(&rendered, "todo/lists/queries.rs");
    insta::assert_snapshot!(
        queries.lines().find(|l| l.starts_with("pub const REMINDER_SELECT_SCOPED")).unwrap(),
        @r###"pub const REMINDER_SELECT_SCOPED: &str = r#"SELECT "id", "item_id", "remind_at" FROM "reminders" WHERE "item_id" IN (SELECT "id" FROM "items" WHERE "list_id" = $1) ORDER BY "id""#;"###
    );
}

#[test]
fn test_sqlite_placeholders() {
    let (_, rendered) = demo();
    let queries = file(&rendered, "audit/events/queries.rs");
    assert!(queries.contains(
        r#"INSERT INTO "event" ("id", "kind", "payload", "created_at", "updated_at") VALUES (?, ?, ?, ?, ?)"#
    ));
    assert!(queries.contains("pub fn scan_event(row: &sqlx::sqlite::SqliteRow) -> Result<Event, sqlx::Error> {"));
}

#[test]
fn test_scanner_reads_the_projection_in_order() {
    let (_, rendered) = demo();
    let queries = file(&rendered, "todo/lists/queries.rs");
    assert!(queries.contains("/// Reads columns in order: id, name, description, created_at, updated_at"));
    assert!(queries.contains("        id: row.try_get(0)?,\n        name: row.try_get(1)?,"));
    assert!(queries.contains("        items: Vec::new(),\n        shares: Vec::new(),"));
    assert!(queries.contains("status: row.try_get::<String, _>(5)?.parse::<ItemStatus>()"));
    assert!(queries.contains("        reminder: None,"));
}

#[test]
fn test_model() {
    let (_, rendered) = demo();
    let model = file(&rendered, "todo/lists/model.rs");
    assert!(model.contains("pub struct List {"));
    assert!(model.contains("    pub description: Option<String>,"));
    assert!(model.contains("    #[serde(default = \"chrono::Utc::now\")]\n    pub created_at: chrono::DateTime<chrono::Utc>,"));
    assert!(model.contains("    #[serde(default)]\n    pub items: Vec<Item>,"));
    assert!(model.contains("    #[serde(default)]\n    pub reminder: Option<Reminder>,"));
    assert!(model.contains("pub enum ItemStatus {"));
    assert!(model.contains("    pub const ALL: [ItemStatus; 3] = [ItemStatus::Open, ItemStatus::Blocked, ItemStatus::Closed];"));
    assert!(model.contains("            \"blocked\" => Ok(ItemStatus::Blocked),"));
}

#[test]
fn test_repository_create_path() {
    let (_, rendered) = demo();
    let repository = file(&rendered, "todo/lists/repository.rs");
    let expected = "\
    pub async fn create(&self, mut root: List) -> Result<List, sqlx::Error> {
        let now = chrono::Utc::now();
        if root.id.is_nil() {
            root.id = uuid::Uuid::new_v4();
        }
        root.created_at = now;
        root.updated_at = now;
        Self::stamp_children(&mut root);

        let mut tx = self.pool.begin().await?;
        sqlx::query(queries::LIST_INSERT)
            .bind(&root.id)
            .bind(&root.name)
            .bind(&root.description)
            .bind(&root.created_at)
            .bind(&root.updated_at)
            .execute(&mut *tx)
            .await?;
        for item in &root.items {
            sqlx::query(queries::ITEM_INSERT)
                .bind(&item.id)
                .bind(&item.list_id)
                .bind(&item.title)
                .bind(&item.done)
                .bind(&item.priority)
                .bind(item.status.as_str())
                .execute(&mut *tx)
                .await?;
        }
        for item in &root.items {
            if let Some(reminder) = &item.reminder {
                sqlx::query(queries::REMINDER_INSERT)
                    .bind(&reminder.id)
                    .bind(&reminder.item_id)
                    .bind(&reminder.remind_at)
                    .execute(&mut *tx)
                    .await?;
            }
        }
        tx.commit().await?;
        Ok(root)
    }
";
    assert!(repository.contains(expected), "{repository}");
}

#[test]
fn test_repository_save_shares_one_transaction() {
    let (_, rendered) = demo();
    let repository = file(&rendered, "todo/lists/repository.rs");
    let start = repository.find("pub async fn save").unwrap();
    let end = start + repository[start..].find("\n    }\n").unwrap();
    let save = &repository[start..end];

    assert_eq!(save.matches("self.pool.begin()").count(), 1);
    assert_eq!(save.matches(".execute(&mut *tx)").count(), 5);
    assert!(!save.contains("&self.pool"));
    let update = save.find("LIST_UPDATE").unwrap();
    let delete_reminders = save.find("REMINDER_DELETE_SCOPED").unwrap();
    let delete_items = save.find("ITEM_DELETE_SCOPED").unwrap();
    let insert_items = save.find("ITEM_INSERT").unwrap();
    assert!(update < delete_reminders && delete_reminders < delete_items && delete_items < insert_items);
    assert!(!save.contains("SHARE_"));
    assert!(save.contains("if updated == 0 {\n            return Ok(None);\n        }"));
    assert!(save.ends_with("self.get(root.id).await"));
}

#[test]
fn test_repository_load_attaches_children() {
    let (_, rendered) = demo();
    let repository = file(&rendered, "todo/lists/repository.rs");
    assert!(repository.contains("        let mut item_rows = sqlx::query(queries::ITEM_SELECT_SCOPED)"));
    assert!(repository.contains("        let reminder_rows = sqlx::query(queries::REMINDER_SELECT_SCOPED)"));
    assert!(repository.contains(
        "            item.reminder = reminder_rows.iter().find(|reminder| reminder.item_id == item.id).cloned();"
    ));
    assert!(repository.contains(
        "        root.items = item_rows.iter().filter(|item| item.list_id == root.id).cloned().collect();"
    ));
    let reminders = repository.find("item.reminder = ").unwrap();
    let items = repository.find("root.items = ").unwrap();
    assert!(reminders < items);
}

#[test]
fn test_non_owned_child_operations() {
    let (_, rendered) = demo();
    let repository = file(&rendered, "todo/lists/repository.rs");
    assert!(repository.contains(
        "pub async fn add_share(&self, parent_id: uuid::Uuid, mut share: Share) -> Result<Share, sqlx::Error> {"
    ));
    assert!(repository.contains("        share.list_id = parent_id;"));
    assert!(repository.contains("pub async fn remove_share(&self, id: uuid::Uuid) -> Result<bool, sqlx::Error> {"));
    assert!(!repository.contains("for share in"));
}

#[test]
fn test_stamp_children() {
    let (_, rendered) = demo();
    let repository = file(&rendered, "todo/lists/repository.rs");
    let expected = "\
    fn stamp_children(root: &mut List) {
        for item in root.items.iter_mut() {
            if item.id.is_nil() {
                item.id = uuid::Uuid::new_v4();
            }
            item.list_id = root.id;
        }
        for item in root.items.iter_mut() {
            if let Some(reminder) = item.reminder.as_mut() {
                if reminder.id.is_nil() {
                    reminder.id = uuid::Uuid::new_v4();
                }
                reminder.item_id = item.id;
            }
        }
    }
";
    assert!(repository.contains(expected), "{repository}");
}

#[test]
fn test_validation() {
    let (_, rendered) = demo();
    let validation = file(&rendered, "todo/lists/validation.rs");
    assert!(validation.contains("pub fn validate_list(value: &List) -> Result<(), Vec<FieldError>> {"));
    assert!(validation.contains("    if value.name.chars().count() > 120 {"));
    assert!(validation.contains("    if value.priority < 1 {"));
    assert!(validation.contains("        check_item(item, &format!(\"{path}items[{i}].\"), errors);"));
    assert!(validation.contains("        check_reminder(reminder, &format!(\"{path}reminder.\"), errors);"));
    assert!(!validation.contains("check_share(share"));
}

#[test]
fn test_validation_locals_do_not_clash_with_children() {
    let ir = svcforge::analyze(&SourceFile::new(
        "report.toml",
        r#"
        version = 1
        [[service]]
        name = "reports"
        [[service.aggregate]]
        name = "reports"
        root = { name = "Report", fields = [{ name = "title", type = "string" }] }
        entity = [{ name = "Errors", fields = [{ name = "message", type = "string" }] }]
        relation = [{ name = "errors", to = "Errors" }]
        "#,
    ))
    .unwrap();
    let rendered = codegen::render(&ir, &plan::plan(&ir)).unwrap();
    let validation = file(&rendered, "reports/reports/validation.rs");
    assert!(validation.contains("    for (i, errors_) in value.errors.iter().enumerate() {"));
    assert!(validation.contains("        check_errors(errors_, &format!(\"{path}errors[{i}].\"), errors);"));
}

#[test]
fn test_handler_and_wiring() {
    let (_, rendered) = demo();
    let handler = file(&rendered, "todo/lists/handler.rs");
    assert!(handler.contains(".route(\"/lists\", get(index).post(create))"));
    assert!(handler.contains(".route(\"/lists/{id}\", get(show).put(update).delete(destroy))"));
    assert!(handler.contains("    validate_list(&body).map_err(ApiError::Invalid)?;"));

    assert_eq!(
        file(&rendered, "todo/lists/mod.rs"),
        "\
// Code generated by svcforge. DO NOT EDIT.

pub mod model;
pub mod validation;
pub mod queries;
pub mod repository;
pub mod handler;

pub use model::{List, Item, Share, Reminder};
pub use repository::ListRepository;
"
    );
    assert_eq!(
        file(&rendered, "todo/mod.rs"),
        "\
// Code generated by svcforge. DO NOT EDIT.

pub mod lists;

/// Every route of the `todo` service
pub fn router(pool: sqlx::PgPool) -> axum::Router {
    axum::Router::new()
        .merge(lists::handler::router(lists::ListRepository::new(pool.clone())))
}
"
    );
    // No presentation layer, no router.
    assert_eq!(
        file(&rendered, "audit/mod.rs"),
        "// Code generated by svcforge. DO NOT EDIT.\n\npub mod events;\n"
    );
}

#[test]
fn test_binding_is_shared_by_templates() {
    let (ir, rendered) = demo();
    let service = &ir.services[0];
    let binding = bind::bind_aggregate(&ir, service, &service.aggregates[0]);
    let queries = file(&rendered, "todo/lists/queries.rs");
    for (i, child) in binding.children.iter().enumerate() {
        let sql = &child.queries.as_ref().unwrap().insert.sql;
        assert!(queries.contains(sql.as_str()), "child {i}: {sql}");
        assert!(binding.target(Target::Child(i)).is_some());
    }
}

#[test]
fn test_missing_capability_is_a_render_error() {
    let ir = svcforge::analyze(&SourceFile::new(
        "t.toml",
        r#"
        version = 1
        [[service]]
        name = "s"
        [[service.aggregate]]
        name = "a"
        root = { name = "A", fields = [] }
        "#,
    ))
    .unwrap();
    let plan = Plan {
        artifacts: vec![ArtifactSpec {
            kind: ArtifactKind::Repository,
            service: "s".to_string(),
            aggregate: Some("a".to_string()),
            entity: Some("A".to_string()),
            required: ArtifactKind::Repository.required().to_vec(),
            path: "s/a/repository.rs".to_string(),
        }],
    };
    let err = codegen::render(&ir, &plan).unwrap_err();
    assert_eq!(
        err,
        RenderError {
            artifact: ArtifactKind::Repository,
            node: "s.a".to_string(),
            reason: "service `s` does not enable the persistence capability".to_string(),
        }
    );
}

#[test]
fn test_unknown_node_is_a_render_error() {
    let (ir, _) = demo();
    let mut plan = plan::plan(&ir);
    plan.artifacts[0].aggregate = Some("missing".to_string());
    let err = codegen::render(&ir, &plan).unwrap_err();
    assert_eq!(err.node, "todo.missing");
    assert_eq!(err.reason, "aggregate is not in the IR");
}
