//! File emitter
//!
//! Writes rendered artifacts and the manifest under the output directory.
//!
//! - Full mode writes everything into a sibling staging directory and only
//!   then swaps it in, so a failed run leaves the previous tree untouched.
//! - Incremental mode rewrites changed files in place and deletes files the
//!   previous manifest lists but the new plan no longer produces.
//!
//! A directory that is neither empty nor carries a manifest is never
//! touched. I/O failures are collected per file.

pub mod manifest;

pub use manifest::{MANIFEST_FILE, Manifest};

use crate::codegen::Rendered;
use crate::config::Mode;
use crate::diagnostics::EmissionError;
use serde::Serialize;
use std::fs;
use std::io;
use std::path::{Component, Path, PathBuf};

/// What an emission changed
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct EmitReport {
    pub written: Vec<String>,
    pub unchanged: Vec<String>,
    pub removed: Vec<String>,
}

/// Write `files` under `target`
pub fn emit(target: &Path, files: &[Rendered], mode: Mode) -> Result<EmitReport, Vec<EmissionError>> {
    for file in files {
        check_relative(&file.path).map_err(|e| vec![e])?;
    }
    let previous = previous_manifest(target).map_err(|e| vec![e])?;
    let next = Manifest::of(files);

    let report = match mode {
        Mode::Full => full(target, files, &next, previous.as_ref())?,
        Mode::Incremental => incremental(target, files, &next, previous.as_ref())?,
    };
    tracing::info!(
        "emitted {} files ({} unchanged, {} removed) to {}",
        report.written.len(),
        report.unchanged.len(),
        report.removed.len(),
        target.display()
    );
    Ok(report)
}

/// Manifest of an existing target; refuses foreign non-empty directories
fn previous_manifest(target: &Path) -> Result<Option<Manifest>, EmissionError> {
    if !target.exists() {
        return Ok(None);
    }
    if !target.is_dir() {
        return Err(EmissionError::new(target, "output path is not a directory"));
    }
    if let Some(manifest) = Manifest::load(target)? {
        return Ok(Some(manifest));
    }
    let mut entries = fs::read_dir(target).map_err(|e| EmissionError::new(target, e))?;
    if entries.next().is_some() {
        return Err(EmissionError::new(
            target,
            format!("directory is not empty and has no {MANIFEST_FILE}; refusing to overwrite it"),
        ));
    }
    Ok(None)
}

/// Reject absolute paths and paths leaving the output directory
fn check_relative(path: &str) -> Result<(), EmissionError> {
    let escapes = Path::new(path)
        .components()
        .any(|c| !matches!(c, Component::Normal(_)));
    if path.is_empty() || escapes {
        return Err(EmissionError::new(path, "artifact path must stay inside the output directory"));
    }
    Ok(())
}

fn join(base: &Path, relative: &str) -> PathBuf {
    relative.split('/').fold(base.to_path_buf(), |p, part| p.join(part))
}

/// `<parent>/.<name>.svcforge-<suffix>`
fn sibling(target: &Path, suffix: &str) -> PathBuf {
    let name = target
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "out".to_string());
    let parent = target.parent().unwrap_or_else(|| Path::new("."));
    parent.join(format!(".{name}.svcforge-{suffix}"))
}

fn write_file(path: &Path, contents: &[u8]) -> io::Result<()> {
    if let Some(dir) = path.parent() {
        fs::create_dir_all(dir)?;
    }
    fs::write(path, contents)
}

fn remove_all(path: &Path) -> io::Result<()> {
    match fs::remove_dir_all(path) {
        Err(e) if e.kind() != io::ErrorKind::NotFound => Err(e),
        _ => Ok(()),
    }
}

// ==================== FULL ====================

fn full(
    target: &Path,
    files: &[Rendered],
    next: &Manifest,
    previous: Option<&Manifest>,
) -> Result<EmitReport, Vec<EmissionError>> {
    let staging = sibling(target, "staging");
    remove_all(&staging).map_err(|e| vec![EmissionError::new(&staging, e)])?;
    tracing::debug!("staging into {}", staging.display());

    let mut errors = Vec::new();
    for file in files {
        let path = join(&staging, &file.path);
        tracing::trace!("write {}", path.display());
        if let Err(e) = write_file(&path, file.contents.as_bytes()) {
            errors.push(EmissionError::new(join(target, &file.path), e));
        }
    }
    let manifest_path = staging.join(MANIFEST_FILE);
    if let Err(e) = write_file(&manifest_path, next.to_json().as_bytes()) {
        errors.push(EmissionError::new(target.join(MANIFEST_FILE), e));
    }

    if !errors.is_empty() {
        let _ = remove_all(&staging);
        return Err(errors);
    }
    promote(&staging, target).map_err(|e| vec![e])?;

    let mut report = EmitReport {
        written: files.iter().map(|f| f.path.clone()).collect(),
        ..EmitReport::default()
    };
    if let Some(previous) = previous {
        report.removed = previous.stale(next).map(str::to_string).collect();
    }
    Ok(report)
}

/// Swap `staging` in for `target`, restoring the previous tree on failure
fn promote(staging: &Path, target: &Path) -> Result<(), EmissionError> {
    let previous = sibling(target, "previous");
    remove_all(&previous).map_err(|e| EmissionError::new(&previous, e))?;

    let had_target = target.exists();
    if had_target {
        fs::rename(target, &previous).map_err(|e| EmissionError::new(target, e))?;
    } else if let Some(parent) = target.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|e| EmissionError::new(parent, e))?;
    }

    if let Err(e) = fs::rename(staging, target) {
        if had_target {
            let _ = fs::rename(&previous, target);
        }
        let _ = remove_all(staging);
        return Err(EmissionError::new(target, e));
    }
    tracing::debug!("promoted {} to {}", staging.display(), target.display());

    if had_target {
        remove_all(&previous).map_err(|e| EmissionError::new(&previous, e))?;
    }
    Ok(())
}

// ==================== INCREMENTAL ====================

fn incremental(
    target: &Path,
    files: &[Rendered],
    next: &Manifest,
    previous: Option<&Manifest>,
) -> Result<EmitReport, Vec<EmissionError>> {
    let mut report = EmitReport::default();
    let mut errors = Vec::new();

    for file in files {
        let path = join(target, &file.path);
        let unchanged = previous
            .and_then(|m| m.files.get(&file.path))
            .is_some_and(|digest| next.files.get(&file.path) == Some(digest))
            && fs::read(&path).is_ok_and(|bytes| bytes == file.contents.as_bytes());
        if unchanged {
            report.unchanged.push(file.path.clone());
            continue;
        }
        tracing::trace!("write {}", path.display());
        match write_file(&path, file.contents.as_bytes()) {
            Ok(()) => report.written.push(file.path.clone()),
            Err(e) => errors.push(EmissionError::new(path, e)),
        }
    }

    if let Some(previous) = previous {
        for stale in previous.stale(next) {
            let path = join(target, stale);
            tracing::trace!("remove {}", path.display());
            match fs::remove_file(&path) {
                Err(e) if e.kind() != io::ErrorKind::NotFound => {
                    errors.push(EmissionError::new(&path, e));
                }
                _ => {
                    prune(target, &path);
                    report.removed.push(stale.to_string());
                }
            }
        }
    }

    // Without a fresh manifest the next run rewrites everything again.
    if !errors.is_empty() {
        return Err(errors);
    }
    let manifest_path = target.join(MANIFEST_FILE);
    write_file(&manifest_path, next.to_json().as_bytes())
        .map_err(|e| vec![EmissionError::new(&manifest_path, e)])?;
    Ok(report)
}

/// Remove empty directories above `removed`, up to `root`
fn prune(root: &Path, removed: &Path) {
    let mut dir = removed.parent();
    while let Some(current) = dir {
        if current == root || fs::remove_dir(current).is_err() {
            break;
        }
        dir = current.parent();
    }
}
