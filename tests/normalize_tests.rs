//! Normalizer tests

use pretty_assertions::assert_eq;
use svcforge::SourceFile;
use svcforge::diagnostics::{ValidationCode, ValidationError};
use svcforge::ir::{Entity, Ir};
use svcforge::normalize::normalize;
use svcforge::parser::parse;
use svcforge::types::{Backend, Cardinality, FieldType, Role};

fn normalize_source(source: &str) -> Result<Ir, Vec<ValidationError>> {
    let doc = parse(&SourceFile::new("test.toml", source)).unwrap();
    normalize(&doc)
}

fn codes(errors: &[ValidationError]) -> Vec<ValidationCode> {
    errors.iter().map(|e| e.code).collect()
}

fn columns(entity: &Entity) -> Vec<&str> {
    entity.fields.iter().map(|f| f.name.as_str()).collect()
}

const TODO: &str = include_str!("../demos/todo.toml");

#[test]
fn test_demo_normalizes() {
    let ir = normalize_source(TODO).unwrap();
    assert_eq!(ir.services.len(), 2);

    let todo = &ir.services[0];
    assert_eq!(todo.capabilities.persistence, Some(Backend::Postgres));
    assert!(todo.capabilities.presentation.is_some());
    assert_eq!(ir.services[1].capabilities.persistence, Some(Backend::Sqlite));

    let lists = &todo.aggregates[0];
    let order: Vec<&str> = lists.order.iter().map(|id| ir.entity(*id).name.as_str()).collect();
    assert_eq!(order, ["List", "Item", "Share", "Reminder"]);
}

#[test]
fn test_root_gets_identifier_and_audit_fields() {
    let ir = normalize_source(TODO).unwrap();
    let lists = &ir.services[0].aggregates[0];
    let list = ir.entity(lists.root);
    assert_eq!(
        columns(list),
        ["id", "name", "description", "created_at", "updated_at"]
    );
    assert_eq!(list.fields[0].role, Some(Role::Identifier));
    assert!(list.fields[0].implicit);
    assert_eq!(list.fields[3].role, Some(Role::AuditCreated));
    assert_eq!(list.fields[4].ty, FieldType::Timestamp);
    assert_eq!(list.table, "lists");
}

#[test]
fn test_child_gets_identifier_and_owner_key() {
    let ir = normalize_source(TODO).unwrap();
    let lists = &ir.services[0].aggregates[0];
    let item = ir.entity(lists.order[1]);
    assert_eq!(columns(item), ["id", "list_id", "title", "done", "priority", "status"]);
    assert_eq!(item.fields[1].role, Some(Role::OwnedBy));

    let reminder = ir.entity(lists.order[3]);
    assert_eq!(columns(reminder), ["id", "item_id", "remind_at"]);
}

#[test]
fn test_relations() {
    let ir = normalize_source(TODO).unwrap();
    let lists = &ir.services[0].aggregates[0];
    let reminder = lists.relation_into(lists.order[3]).unwrap();
    assert_eq!(reminder.name, "reminder");
    assert_eq!(reminder.cardinality, Cardinality::One);
    assert_eq!(reminder.from, lists.order[1]);
    assert!(lists.relation_into(lists.order[1]).unwrap().owned);
    assert!(!lists.relation_into(lists.order[2]).unwrap().owned);
}

#[test]
fn test_declared_roles_are_not_duplicated() {
    let ir = normalize_source(
        r#"
        version = 1
        [[service]]
        name = "s"
        [[service.aggregate]]
        name = "docs"
        [service.aggregate.root]
        name = "Doc"
        fields = [
            { name = "title", type = "string" },
            { name = "key", type = "identifier", role = "identifier" },
            { name = "made", type = "timestamp", role = "audit-created" },
        ]
        "#,
    )
    .unwrap();
    let doc = ir.entity(ir.services[0].aggregates[0].root);
    assert_eq!(columns(doc), ["title", "key", "made", "updated_at"]);
}

#[test]
fn test_relation_key_names_owner_field() {
    let ir = normalize_source(
        r#"
        version = 1
        [[service]]
        name = "s"
        [[service.aggregate]]
        name = "orders"
        root = { name = "Order", fields = [] }
        entity = [{ name = "Line", fields = [{ name = "sku", type = "string" }] }]
        relation = [{ name = "lines", to = "Line", key = "order_ref" }]
        "#,
    )
    .unwrap();
    let aggregate = &ir.services[0].aggregates[0];
    let line = ir.entity(aggregate.order[1]);
    assert_eq!(columns(line), ["id", "order_ref", "sku"]);
    assert_eq!(aggregate.relations[0].key, 1);
}

#[test]
fn test_all_errors_are_reported_together() {
    let errors = normalize_source(
        r#"
        version = 1
        [[service]]
        name = "s"
        persistence = "mysql"
        [[service.aggregate]]
        name = "a"
        [service.aggregate.root]
        name = "A"
        fields = [
            { name = "x", type = "text" },
            { name = "y", type = "string", role = "primary" },
        ]
        "#,
    )
    .unwrap_err();
    assert_eq!(
        codes(&errors),
        [
            ValidationCode::UnknownCapability,
            ValidationCode::UnknownType,
            ValidationCode::UnknownRole,
        ]
    );
}

#[test]
fn test_duplicate_names_judged_in_snake_case() {
    let errors = normalize_source(
        r#"
        version = 1
        [[service]]
        name = "s"
        [[service.aggregate]]
        name = "a"
        root = { name = "A", fields = [{ name = "dueDate", type = "timestamp" }, { name = "due_date", type = "timestamp" }] }
        "#,
    )
    .unwrap_err();
    assert_eq!(codes(&errors), [ValidationCode::DuplicateName]);
}

#[test]
fn test_presentation_requires_persistence() {
    let errors = normalize_source(
        r#"
        version = 1
        [[service]]
        name = "s"
        presentation = "http"
        "#,
    )
    .unwrap_err();
    assert_eq!(codes(&errors), [ValidationCode::MissingCapability]);
    assert_eq!(errors[0].field.as_str(), "service[0].presentation");
}

#[test]
fn test_missing_root() {
    let errors = normalize_source(
        r#"
        version = 1
        [[service]]
        name = "s"
        [[service.aggregate]]
        name = "a"
        "#,
    )
    .unwrap_err();
    assert_eq!(codes(&errors), [ValidationCode::MissingRoot]);
}

#[test]
fn test_unresolved_and_unreachable() {
    let errors = normalize_source(
        r#"
        version = 1
        [[service]]
        name = "s"
        [[service.aggregate]]
        name = "a"
        root = { name = "A", fields = [] }
        entity = [{ name = "B", fields = [] }, { name = "C", fields = [] }]
        relation = [{ name = "bs", to = "B" }, { name = "ds", to = "D" }]
        "#,
    )
    .unwrap_err();
    assert_eq!(codes(&errors), [ValidationCode::UnresolvedReference]);

    let errors = normalize_source(
        r#"
        version = 1
        [[service]]
        name = "s"
        [[service.aggregate]]
        name = "a"
        root = { name = "A", fields = [] }
        entity = [{ name = "B", fields = [] }, { name = "C", fields = [] }]
        relation = [{ name = "bs", to = "B" }]
        "#,
    )
    .unwrap_err();
    assert_eq!(codes(&errors), [ValidationCode::UnreachableEntity]);
    assert_eq!(errors[0].field.as_str(), "service[0].aggregate[0].entity[1]");
}

#[test]
fn test_child_has_one_parent() {
    let errors = normalize_source(
        r#"
        version = 1
        [[service]]
        name = "s"
        [[service.aggregate]]
        name = "a"
        root = { name = "A", fields = [] }
        entity = [{ name = "B", fields = [] }, { name = "C", fields = [] }]
        relation = [
            { name = "bs", to = "B" },
            { name = "cs", to = "C" },
            { name = "more_cs", from = "B", to = "C" },
        ]
        "#,
    )
    .unwrap_err();
    assert_eq!(codes(&errors), [ValidationCode::InvalidRelation]);
}

#[test]
fn test_referenced_child_cannot_have_children() {
    let errors = normalize_source(
        r#"
        version = 1
        [[service]]
        name = "s"
        [[service.aggregate]]
        name = "a"
        root = { name = "A", fields = [] }
        entity = [{ name = "B", fields = [] }, { name = "C", fields = [] }]
        relation = [
            { name = "bs", to = "B", owned = false },
            { name = "cs", from = "B", to = "C" },
        ]
        "#,
    )
    .unwrap_err();
    assert_eq!(codes(&errors), [ValidationCode::InvalidRelation]);
}

#[test]
fn test_audit_role_on_child_rejected() {
    let errors = normalize_source(
        r#"
        version = 1
        [[service]]
        name = "s"
        [[service.aggregate]]
        name = "a"
        root = { name = "A", fields = [] }
        entity = [{ name = "B", fields = [{ name = "at", type = "timestamp", role = "audit-created" }] }]
        relation = [{ name = "bs", to = "B" }]
        "#,
    )
    .unwrap_err();
    assert_eq!(codes(&errors), [ValidationCode::RoleTypeMismatch]);
}

#[test]
fn test_unknown_keys_rejected() {
    let errors = normalize_source(
        r#"
        version = 1
        [[service]]
        name = "s"
        colour = "blue"
        "#,
    )
    .unwrap_err();
    assert_eq!(codes(&errors), [ValidationCode::UnknownKey]);
    assert_eq!(errors[0].field.as_str(), "service[0].colour");
}

#[test]
fn test_entity_names_unique_per_service() {
    let errors = normalize_source(
        r#"
        version = 1
        [[service]]
        name = "s"
        [[service.aggregate]]
        name = "a"
        root = { name = "Thing", fields = [] }
        [[service.aggregate]]
        name = "b"
        root = { name = "Thing", table = "other_things", fields = [] }
        "#,
    )
    .unwrap_err();
    assert_eq!(codes(&errors), [ValidationCode::DuplicateName]);

    // The same entity name in another service is fine.
    let ir = normalize_source(
        r#"
        version = 1
        [[service]]
        name = "s"
        [[service.aggregate]]
        name = "a"
        root = { name = "Thing", fields = [] }
        [[service]]
        name = "t"
        [[service.aggregate]]
        name = "a"
        root = { name = "Thing", fields = [] }
        "#,
    )
    .unwrap();
    assert_eq!(ir.aggregates().count(), 2);
}

#[test]
fn test_entity_clashing_with_generated_enum() {
    let errors = normalize_source(
        r#"
        version = 1
        [[service]]
        name = "s"
        [[service.aggregate]]
        name = "orders"
        root = { name = "Order", fields = [{ name = "status", type = "enum", variants = ["open", "paid"] }] }
        entity = [{ name = "OrderStatus", fields = [] }]
        relation = [{ name = "history", to = "OrderStatus" }]
        "#,
    )
    .unwrap_err();
    assert_eq!(codes(&errors), [ValidationCode::DuplicateName]);
    assert_eq!(errors[0].field.as_str(), "service[0].aggregate[0].entity[0]");
    assert!(errors[0].message.contains("service[0].aggregate[0].root.fields[0]"));
}

#[test]
fn test_entity_clashing_with_repository() {
    let errors = normalize_source(
        r#"
        version = 1
        [[service]]
        name = "s"
        [[service.aggregate]]
        name = "orders"
        root = { name = "Order", fields = [] }
        entity = [{ name = "OrderRepository", fields = [] }]
        relation = [{ name = "audit", to = "OrderRepository", cardinality = "one" }]
        "#,
    )
    .unwrap_err();
    assert_eq!(codes(&errors), [ValidationCode::DuplicateName]);
    assert_eq!(errors[0].field.as_str(), "service[0].aggregate[0].entity[0]");
}

#[test]
fn test_entity_named_like_an_imported_type() {
    let errors = normalize_source(
        r#"
        version = 1
        [[service]]
        name = "s"
        [[service.aggregate]]
        name = "a"
        root = { name = "Json", fields = [] }
        [[service.aggregate]]
        name = "b"
        root = { name = "field_error", fields = [] }
        "#,
    )
    .unwrap_err();
    assert_eq!(
        codes(&errors),
        [ValidationCode::DuplicateName, ValidationCode::DuplicateName]
    );
    assert_eq!(errors[0].field.as_str(), "service[0].aggregate[0].root");
    assert_eq!(errors[1].field.as_str(), "service[0].aggregate[1].root");
}
