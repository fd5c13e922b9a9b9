//! End-to-end runs through the driver

use pretty_assertions::assert_eq;
use std::fs;
use svcforge::config::Mode;
use svcforge::diagnostics::Stage;
use svcforge::emit::{MANIFEST_FILE, Manifest};
use svcforge::{CancelToken, Driver, Error, GeneratorConfig, SourceFile};
use tempfile::TempDir;

const TODO: &str = include_str!("../demos/todo.toml");

fn driver(tmp: &TempDir, mode: Mode) -> Driver {
    Driver::new(GeneratorConfig {
        output_dir: tmp.path().join("generated"),
        mode,
        jobs: 2,
        ..GeneratorConfig::default()
    })
}

fn todo() -> SourceFile {
    SourceFile::new("todo.toml", TODO)
}

#[test]
fn test_generate_demo() {
    let tmp = TempDir::new().unwrap();
    let driver = driver(&tmp, Mode::Full);
    let report = driver.generate(&todo()).unwrap();

    assert_eq!(report.services, 2);
    assert_eq!(report.aggregates, 2);
    assert_eq!(report.artifacts, 13);
    assert_eq!(report.emit.written.len(), 13);

    let out = tmp.path().join("generated");
    let repository = fs::read_to_string(out.join("todo/lists/repository.rs")).unwrap();
    assert!(repository.contains("pub struct ListRepository {"));
    assert!(!out.join("audit/events/handler.rs").exists());

    let manifest = Manifest::load(&out).unwrap().unwrap();
    assert_eq!(manifest.files.len(), 13);
}

#[test]
fn test_regeneration_is_idempotent() {
    let tmp = TempDir::new().unwrap();
    let out = tmp.path().join("generated");
    driver(&tmp, Mode::Full).generate(&todo()).unwrap();
    let first = fs::read(out.join(MANIFEST_FILE)).unwrap();

    let report = driver(&tmp, Mode::Incremental).generate(&todo()).unwrap();
    assert!(report.emit.written.is_empty());
    assert_eq!(report.emit.unchanged.len(), 13);
    assert_eq!(fs::read(out.join(MANIFEST_FILE)).unwrap(), first);
}

#[test]
fn test_thread_count_does_not_change_output() {
    let source = todo();
    let one = Driver::new(GeneratorConfig {
        jobs: 1,
        ..GeneratorConfig::default()
    });
    let four = Driver::new(GeneratorConfig {
        jobs: 4,
        ..GeneratorConfig::default()
    });
    let (_, _, a) = one.render(&source).unwrap();
    let (_, _, b) = four.render(&source).unwrap();
    assert_eq!(a, b);
}

#[test]
fn test_dropping_an_aggregate_removes_its_files() {
    let tmp = TempDir::new().unwrap();
    let out = tmp.path().join("generated");
    driver(&tmp, Mode::Incremental).generate(&todo()).unwrap();

    let audit_only = &TODO[TODO.find("[[service]]\nname = \"audit\"").unwrap()..];
    let source = SourceFile::new("audit.toml", format!("version = 1\n{audit_only}"));
    let report = driver(&tmp, Mode::Incremental).generate(&source).unwrap();
    assert_eq!(report.emit.removed.len(), 7);
    assert!(!out.join("todo").exists());
    assert!(out.join("audit/events/queries.rs").exists());
}

#[test]
fn test_validation_errors_stop_before_emission() {
    let tmp = TempDir::new().unwrap();
    let source = SourceFile::new(
        "bad.toml",
        r#"
        version = 1
        [[service]]
        name = "s"
        [[service.aggregate]]
        name = "a"
        root = { name = "A", fields = [{ name = "x", type = "text" }, { name = "y", type = "money" }] }
        "#,
    );
    let diagnostics = driver(&tmp, Mode::Full).generate(&source).unwrap_err();
    assert_eq!(diagnostics.error_count(), 2);
    assert!(diagnostics.errors().iter().all(|e| e.stage() == Stage::Normalize));
    assert!(!tmp.path().join("generated").exists());

    let records: serde_json::Value = serde_json::from_str(&diagnostics.to_json().unwrap()).unwrap();
    assert_eq!(records[0]["stage"], "normalize");
    assert_eq!(records[0]["code"], "unknown-type");
    assert_eq!(records[0]["location"], "service[0].aggregate[0].root.fields[0].type");
}

#[test]
fn test_syntax_error_is_reported_alone() {
    let tmp = TempDir::new().unwrap();
    let source = SourceFile::new("bad.toml", "version = 1\n[[service]\n");
    let diagnostics = driver(&tmp, Mode::Full).generate(&source).unwrap_err();
    assert!(matches!(diagnostics.errors(), [Error::Parse(_)]));
}

#[test]
fn test_cancellation_stops_the_run() {
    let tmp = TempDir::new().unwrap();
    let token = CancelToken::new();
    let driver = driver(&tmp, Mode::Full).with_cancel(token.clone());
    token.cancel();

    let diagnostics = driver.generate(&todo()).unwrap_err();
    assert!(matches!(
        diagnostics.errors(),
        [Error::Cancelled { stage: Stage::Parse }]
    ));
    assert!(!tmp.path().join("generated").exists());
}

#[test]
fn test_config_discovery() {
    let tmp = TempDir::new().unwrap();
    let spec = tmp.path().join("todo.toml");
    fs::write(&spec, TODO).unwrap();

    let config = GeneratorConfig::discover(&spec, None).unwrap();
    assert_eq!(config, GeneratorConfig::default());

    fs::write(
        tmp.path().join("svcforge.toml"),
        "output_dir = \"out\"\nmode = \"incremental\"\n",
    )
    .unwrap();
    let config = GeneratorConfig::discover(&spec, None).unwrap();
    assert_eq!(config.output_dir, tmp.path().join("out"));
    assert_eq!(config.mode, Mode::Incremental);
}
