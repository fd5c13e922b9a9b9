//! File emitter tests

use pretty_assertions::assert_eq;
use std::fs;
use std::path::Path;
use svcforge::Rendered;
use svcforge::config::Mode;
use svcforge::emit::{MANIFEST_FILE, Manifest, emit};
use svcforge::plan::ArtifactKind;
use tempfile::TempDir;

fn file(path: &str, contents: &str) -> Rendered {
    Rendered {
        kind: ArtifactKind::Model,
        path: path.to_string(),
        contents: contents.to_string(),
    }
}

fn files() -> Vec<Rendered> {
    vec![
        file("todo/lists/model.rs", "pub struct List;\n"),
        file("todo/lists/mod.rs", "pub mod model;\n"),
        file("todo/mod.rs", "pub mod lists;\n"),
    ]
}

fn read(dir: &Path, path: &str) -> String {
    fs::read_to_string(dir.join(path)).unwrap()
}

#[test]
fn test_full_mode_writes_files_and_manifest() {
    let tmp = TempDir::new().unwrap();
    let out = tmp.path().join("generated");

    let report = emit(&out, &files(), Mode::Full).unwrap();
    assert_eq!(report.written.len(), 3);
    assert!(report.removed.is_empty());
    assert_eq!(read(&out, "todo/lists/model.rs"), "pub struct List;\n");

    let manifest = Manifest::load(&out).unwrap().unwrap();
    assert_eq!(manifest, Manifest::of(&files()));
    assert_eq!(
        manifest.files.keys().map(String::as_str).collect::<Vec<_>>(),
        ["todo/lists/mod.rs", "todo/lists/model.rs", "todo/mod.rs"]
    );
}

#[test]
fn test_full_mode_leaves_no_staging_behind() {
    let tmp = TempDir::new().unwrap();
    let out = tmp.path().join("generated");
    emit(&out, &files(), Mode::Full).unwrap();
    emit(&out, &files(), Mode::Full).unwrap();

    let mut names: Vec<String> = fs::read_dir(tmp.path())
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    assert_eq!(names, ["generated"]);
}

#[test]
fn test_full_mode_replaces_the_previous_tree() {
    let tmp = TempDir::new().unwrap();
    let out = tmp.path().join("generated");
    emit(&out, &files(), Mode::Full).unwrap();

    let next = vec![file("todo/mod.rs", "// empty\n")];
    let report = emit(&out, &next, Mode::Full).unwrap();
    assert_eq!(report.removed, ["todo/lists/mod.rs", "todo/lists/model.rs"]);
    assert!(!out.join("todo/lists").exists());
    assert_eq!(read(&out, "todo/mod.rs"), "// empty\n");
}

#[test]
fn test_foreign_directory_is_refused() {
    let tmp = TempDir::new().unwrap();
    let out = tmp.path().join("src");
    fs::create_dir(&out).unwrap();
    fs::write(out.join("main.rs"), "fn main() {}\n").unwrap();

    for mode in [Mode::Full, Mode::Incremental] {
        let errors = emit(&out, &files(), mode).unwrap_err();
        assert_eq!(errors.len(), 1);
        assert!(errors[0].message.contains("refusing to overwrite"));
    }
    assert_eq!(read(&out, "main.rs"), "fn main() {}\n");
    assert!(!out.join("todo").exists());
}

#[test]
fn test_empty_directory_is_accepted() {
    let tmp = TempDir::new().unwrap();
    let report = emit(tmp.path(), &files(), Mode::Incremental).unwrap();
    assert_eq!(report.written.len(), 3);
    assert!(tmp.path().join(MANIFEST_FILE).exists());
}

#[test]
fn test_output_path_must_be_a_directory() {
    let tmp = TempDir::new().unwrap();
    let out = tmp.path().join("generated");
    fs::write(&out, "").unwrap();
    let errors = emit(&out, &files(), Mode::Full).unwrap_err();
    assert_eq!(errors[0].message, "output path is not a directory");
}

#[test]
fn test_escaping_artifact_path_is_rejected() {
    let tmp = TempDir::new().unwrap();
    let errors = emit(tmp.path(), &[file("../outside.rs", "")], Mode::Full).unwrap_err();
    assert_eq!(errors[0].message, "artifact path must stay inside the output directory");
    assert!(!tmp.path().parent().unwrap().join("outside.rs").exists());
}

#[test]
fn test_incremental_mode_skips_unchanged_files() {
    let tmp = TempDir::new().unwrap();
    let out = tmp.path().join("generated");
    emit(&out, &files(), Mode::Full).unwrap();

    let mut next = files();
    next[0].contents = "pub struct List { pub id: u64 }\n".to_string();
    let report = emit(&out, &next, Mode::Incremental).unwrap();
    assert_eq!(report.written, ["todo/lists/model.rs"]);
    assert_eq!(report.unchanged, ["todo/lists/mod.rs", "todo/mod.rs"]);
    assert!(report.removed.is_empty());
    assert_eq!(Manifest::load(&out).unwrap().unwrap(), Manifest::of(&next));
}

#[test]
fn test_incremental_mode_repairs_edited_files() {
    let tmp = TempDir::new().unwrap();
    let out = tmp.path().join("generated");
    emit(&out, &files(), Mode::Full).unwrap();
    fs::write(out.join("todo/mod.rs"), "// edited by hand\n").unwrap();

    let report = emit(&out, &files(), Mode::Incremental).unwrap();
    assert_eq!(report.written, ["todo/mod.rs"]);
    assert_eq!(read(&out, "todo/mod.rs"), "pub mod lists;\n");
}

#[test]
fn test_incremental_mode_removes_stale_files_and_prunes() {
    let tmp = TempDir::new().unwrap();
    let out = tmp.path().join("generated");
    emit(&out, &files(), Mode::Incremental).unwrap();

    let next = vec![file("todo/mod.rs", "pub mod lists;\n")];
    let report = emit(&out, &next, Mode::Incremental).unwrap();
    assert_eq!(report.unchanged, ["todo/mod.rs"]);
    assert_eq!(report.removed, ["todo/lists/mod.rs", "todo/lists/model.rs"]);
    assert!(!out.join("todo/lists").exists());
    assert!(out.join("todo").is_dir());
}
