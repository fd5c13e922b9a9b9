//! Artifact planner tests

use pretty_assertions::assert_eq;
use svcforge::SourceFile;
use svcforge::ir::Ir;
use svcforge::plan::{ArtifactKind, plan};
use svcforge::types::Capability;

const TODO: &str = include_str!("../demos/todo.toml");

fn analyze(source: &str) -> Ir {
    svcforge::analyze(&SourceFile::new("test.toml", source)).unwrap()
}

#[test]
fn test_demo_plan() {
    let ir = analyze(TODO);
    let plan = plan(&ir);
    let paths: Vec<&str> = plan.paths().collect();
    assert_eq!(
        paths,
        [
            "todo/lists/model.rs",
            "todo/lists/validation.rs",
            "todo/lists/queries.rs",
            "todo/lists/repository.rs",
            "todo/lists/handler.rs",
            "todo/lists/mod.rs",
            "todo/mod.rs",
            "audit/events/model.rs",
            "audit/events/validation.rs",
            "audit/events/queries.rs",
            "audit/events/repository.rs",
            "audit/events/mod.rs",
            "audit/mod.rs",
        ]
    );
}

#[test]
fn test_artifact_metadata() {
    let ir = analyze(TODO);
    let plan = plan(&ir);
    let handler = plan
        .iter()
        .find(|a| a.kind == ArtifactKind::Handler)
        .unwrap();
    assert_eq!(handler.service, "todo");
    assert_eq!(handler.aggregate.as_deref(), Some("lists"));
    assert_eq!(handler.entity.as_deref(), Some("List"));
    assert_eq!(
        handler.required,
        [Capability::Persistence, Capability::Presentation]
    );
    assert_eq!(handler.node(), "todo.lists");

    let wiring = plan.artifacts.last().unwrap();
    assert_eq!(wiring.kind, ArtifactKind::Wiring);
    assert_eq!(wiring.aggregate, None);
    assert_eq!(wiring.node(), "audit");
}

#[test]
fn test_capabilities_gate_artifacts() {
    let ir = analyze(
        r#"
        version = 1
        [[service]]
        name = "Shapes"
        [[service.aggregate]]
        name = "BoxSet"
        root = { name = "Box", fields = [{ name = "label", type = "string" }] }
        "#,
    );
    let plan = plan(&ir);
    let kinds: Vec<ArtifactKind> = plan.iter().map(|a| a.kind).collect();
    assert_eq!(
        kinds,
        [
            ArtifactKind::Model,
            ArtifactKind::Validation,
            ArtifactKind::Wiring,
            ArtifactKind::Wiring,
        ]
    );
    assert_eq!(plan.artifacts[0].path, "shapes/box_set/model.rs");
}

#[test]
fn test_for_aggregate() {
    let ir = analyze(TODO);
    let plan = plan(&ir);
    assert_eq!(plan.for_aggregate("todo", "lists").count(), 6);
    assert_eq!(plan.for_aggregate("audit", "events").count(), 5);
    assert_eq!(plan.for_aggregate("todo", "events").count(), 0);
}

#[test]
fn test_plan_is_deterministic() {
    let first = plan(&analyze(TODO));
    let second = plan(&analyze(TODO));
    assert_eq!(first, second);
}

#[test]
fn test_service_without_aggregates() {
    let ir = analyze("version = 1\n[[service]]\nname = \"empty\"\n");
    let plan = plan(&ir);
    assert_eq!(plan.paths().collect::<Vec<_>>(), ["empty/mod.rs"]);
}
