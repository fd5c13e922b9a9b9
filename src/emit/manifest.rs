//! `.svcforge-manifest.json`: every generated path with its SHA-256 digest

use crate::codegen::Rendered;
use crate::diagnostics::EmissionError;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::fmt::Write;
use std::io;
use std::path::Path;

pub const MANIFEST_FILE: &str = ".svcforge-manifest.json";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Manifest {
    pub generator: String,
    /// Relative path to hex digest, sorted by path
    pub files: BTreeMap<String, String>,
}

impl Manifest {
    pub fn of(files: &[Rendered]) -> Self {
        Self {
            generator: format!("svcforge {}", crate::VERSION),
            files: files
                .iter()
                .map(|f| (f.path.clone(), digest(f.contents.as_bytes())))
                .collect(),
        }
    }

    pub fn to_json(&self) -> String {
        // A map of strings always serializes.
        let mut json = serde_json::to_string_pretty(self).unwrap_or_default();
        json.push('\n');
        json
    }

    /// Manifest of the tree at `dir`, if it has one
    pub fn load(dir: &Path) -> Result<Option<Self>, EmissionError> {
        let path = dir.join(MANIFEST_FILE);
        match std::fs::read_to_string(&path) {
            Ok(text) => serde_json::from_str(&text)
                .map(Some)
                .map_err(|e| EmissionError::new(&path, format!("unreadable manifest: {e}"))),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(EmissionError::new(&path, e)),
        }
    }

    /// Paths recorded here but absent from `next`
    pub fn stale<'a>(&'a self, next: &'a Manifest) -> impl Iterator<Item = &'a str> + 'a {
        self.files
            .keys()
            .filter(|path| !next.files.contains_key(*path))
            .map(String::as_str)
    }
}

/// Lowercase hex SHA-256 of `bytes`
pub fn digest(bytes: &[u8]) -> String {
    let hash = Sha256::digest(bytes);
    let mut hex = String::with_capacity(64);
    for byte in hash {
        let _ = write!(hex, "{byte:02x}");
    }
    hex
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plan::ArtifactKind;

    fn file(path: &str, contents: &str) -> Rendered {
        Rendered {
            kind: ArtifactKind::Model,
            path: path.to_string(),
            contents: contents.to_string(),
        }
    }

    #[test]
    fn test_digest() {
        assert_eq!(
            digest(b""),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }

    #[test]
    fn test_paths_sorted() {
        let manifest = Manifest::of(&[file("b/mod.rs", "b"), file("a/mod.rs", "a")]);
        let paths: Vec<&String> = manifest.files.keys().collect();
        assert_eq!(paths, ["a/mod.rs", "b/mod.rs"]);
    }

    #[test]
    fn test_stale() {
        let old = Manifest::of(&[file("a.rs", "a"), file("b.rs", "b")]);
        let new = Manifest::of(&[file("b.rs", "changed")]);
        assert_eq!(old.stale(&new).collect::<Vec<_>>(), ["a.rs"]);
    }
}
