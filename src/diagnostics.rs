//! Diagnostic reporting
//!
//! Every stage reports through the types in this module. Batching stages
//! (normalize, check, emit) return all of their findings at once; the
//! [`Diagnostics`] collector gathers them for a run and prints them with
//! miette or serializes them as JSON records.

use crate::common::{DocPath, LineCol, Span};
use crate::plan::ArtifactKind;
use miette::{Diagnostic, NamedSource, SourceSpan};
use serde::Serialize;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use thiserror::Error;

/// Source file for error reporting
#[derive(Debug, Clone)]
pub struct SourceFile {
    pub name: String,
    pub content: Arc<str>,
}

impl SourceFile {
    pub fn new(name: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            content: Arc::from(content.into()),
        }
    }

    pub fn to_named_source(&self) -> NamedSource<String> {
        NamedSource::new(self.name.clone(), self.content.to_string())
    }
}

/// Convert our Span to miette's SourceSpan
impl From<Span> for SourceSpan {
    fn from(span: Span) -> Self {
        SourceSpan::new(span.start.into(), span.len())
    }
}

/// Pipeline stage, used to attribute diagnostics
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    Config,
    Parse,
    Normalize,
    Check,
    Plan,
    Render,
    Emit,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Config => "config",
            Stage::Parse => "parse",
            Stage::Normalize => "normalize",
            Stage::Check => "check",
            Stage::Plan => "plan",
            Stage::Render => "render",
            Stage::Emit => "emit",
        };
        f.write_str(name)
    }
}

// ==================== PARSE ERRORS ====================

/// Fatal error turning document text into a raw tree
#[derive(Error, Debug, Diagnostic, Clone)]
pub enum ParseError {
    #[error("Malformed specification at {location}: {message}")]
    #[diagnostic(code(parse::syntax))]
    Syntax {
        message: String,
        location: LineCol,
        #[label("{message}")]
        span: SourceSpan,
        #[source_code]
        src: NamedSource<String>,
    },

    #[error("Unknown top-level key `{key}`")]
    #[diagnostic(
        code("parse::unknown-key"),
        help("the top level of a specification holds `version` and `service` only")
    )]
    UnknownKey { key: String },

    #[error("`{path}` must be {expected}")]
    #[diagnostic(code(parse::malformed))]
    Malformed {
        path: DocPath,
        expected: &'static str,
    },

    #[error("Specification is missing `version`")]
    #[diagnostic(code("parse::missing-version"), help("add `version = 1` at the top"))]
    MissingVersion,

    #[error("Unsupported specification version {found}")]
    #[diagnostic(code("parse::unsupported-version"), help("this compiler reads version 1"))]
    UnsupportedVersion { found: i64 },
}

impl ParseError {
    /// Document location: line/column for syntax errors, a path otherwise
    pub fn location(&self) -> Option<String> {
        match self {
            ParseError::Syntax { location, .. } => Some(location.to_string()),
            ParseError::UnknownKey { key } => Some(key.clone()),
            ParseError::Malformed { path, .. } => Some(path.to_string()),
            ParseError::MissingVersion | ParseError::UnsupportedVersion { .. } => None,
        }
    }
}

// ==================== VALIDATION ERRORS ====================

/// Machine-readable validation codes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum ValidationCode {
    MissingName,
    InvalidName,
    DuplicateName,
    UnknownKey,
    UnknownType,
    UnknownRole,
    DuplicateRole,
    RoleTypeMismatch,
    InvalidEnum,
    InvalidConstraint,
    UnknownCapability,
    MissingCapability,
    MissingRoot,
    UnresolvedReference,
    InvalidRelation,
    InvalidOwnerKey,
    UnreachableEntity,
}

impl ValidationCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ValidationCode::MissingName => "missing-name",
            ValidationCode::InvalidName => "invalid-name",
            ValidationCode::DuplicateName => "duplicate-name",
            ValidationCode::UnknownKey => "unknown-key",
            ValidationCode::UnknownType => "unknown-type",
            ValidationCode::UnknownRole => "unknown-role",
            ValidationCode::DuplicateRole => "duplicate-role",
            ValidationCode::RoleTypeMismatch => "role-type-mismatch",
            ValidationCode::InvalidEnum => "invalid-enum",
            ValidationCode::InvalidConstraint => "invalid-constraint",
            ValidationCode::UnknownCapability => "unknown-capability",
            ValidationCode::MissingCapability => "missing-capability",
            ValidationCode::MissingRoot => "missing-root",
            ValidationCode::UnresolvedReference => "unresolved-reference",
            ValidationCode::InvalidRelation => "invalid-relation",
            ValidationCode::InvalidOwnerKey => "invalid-owner-key",
            ValidationCode::UnreachableEntity => "unreachable-entity",
        }
    }
}

impl fmt::Display for ValidationCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The document is well-formed but semantically inconsistent
#[derive(Error, Debug, Clone, PartialEq)]
#[error("{field}: {message}")]
pub struct ValidationError {
    /// Path of the offending declaration
    pub field: DocPath,
    pub code: ValidationCode,
    pub message: String,
}

impl ValidationError {
    pub fn new(field: &DocPath, code: ValidationCode, message: impl Into<String>) -> Self {
        Self {
            field: field.clone(),
            code,
            message: message.into(),
        }
    }
}

impl Diagnostic for ValidationError {
    fn code<'a>(&'a self) -> Option<Box<dyn fmt::Display + 'a>> {
        Some(Box::new(self.code))
    }

    fn help<'a>(&'a self) -> Option<Box<dyn fmt::Display + 'a>> {
        let help = match self.code {
            ValidationCode::UnknownType => {
                "known types: string, integer, boolean, timestamp, identifier, enum"
            }
            ValidationCode::UnknownRole => {
                "known roles: identifier, audit-created, audit-updated, owned-by"
            }
            ValidationCode::MissingCapability => "set `persistence` when `presentation` is enabled",
            ValidationCode::InvalidName => {
                "names start with a letter and contain only letters, digits and `_`"
            }
            _ => return None,
        };
        Some(Box::new(help))
    }
}

// ==================== CONSISTENCY ERRORS ====================

/// Cross-artifact invariants audited before emission
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Invariant {
    /// Write and read/scan column lists are one projection
    ColumnList,
    /// Root and owned-child writes share one transaction
    TransactionalOwnership,
    /// Identifier and audit timestamps are stamped on create/update
    IdentifierAudit,
    /// No two artifacts target the same path
    UniquePath,
}

impl Invariant {
    pub fn as_str(&self) -> &'static str {
        match self {
            Invariant::ColumnList => "column-list",
            Invariant::TransactionalOwnership => "transactional-ownership",
            Invariant::IdentifierAudit => "identifier-audit",
            Invariant::UniquePath => "unique-path",
        }
    }
}

impl fmt::Display for Invariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The IR is valid per node but a planned artifact would break an invariant
#[derive(Error, Debug, Clone, PartialEq)]
#[error("{aggregate} ({artifact}): {message}")]
pub struct ConsistencyError {
    /// `service.aggregate`
    pub aggregate: String,
    pub artifact: ArtifactKind,
    pub invariant: Invariant,
    pub message: String,
}

impl Diagnostic for ConsistencyError {
    fn code<'a>(&'a self) -> Option<Box<dyn fmt::Display + 'a>> {
        Some(Box::new(self.invariant))
    }
}

// ==================== RENDER / EMISSION ERRORS ====================

/// Template binding defect inside the compiler itself
#[derive(Error, Debug, Diagnostic, Clone, PartialEq)]
#[error("Cannot render {artifact} for `{node}`: {reason}")]
#[diagnostic(
    code(render::binding),
    help("this is a compiler defect; the specification itself is valid")
)]
pub struct RenderError {
    pub artifact: ArtifactKind,
    /// IR node being rendered
    pub node: String,
    pub reason: String,
}

/// I/O failure writing one file
#[derive(Error, Debug, Diagnostic, Clone, PartialEq)]
#[error("Failed to write {}: {message}", path.display())]
#[diagnostic(code(emit::io))]
pub struct EmissionError {
    pub path: PathBuf,
    pub message: String,
}

impl EmissionError {
    pub fn new(path: impl Into<PathBuf>, err: impl fmt::Display) -> Self {
        Self {
            path: path.into(),
            message: err.to_string(),
        }
    }
}

// ==================== RUN-LEVEL ERRORS ====================

/// Any diagnostic a run can produce
#[derive(Error, Debug, Diagnostic, Clone)]
pub enum Error {
    #[error(transparent)]
    #[diagnostic(transparent)]
    Parse(#[from] ParseError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Consistency(#[from] ConsistencyError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Render(#[from] RenderError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Emission(#[from] EmissionError),

    #[error("Invalid configuration: {0}")]
    #[diagnostic(code(config::invalid))]
    Config(String),

    #[error("Run cancelled before the {stage} stage")]
    #[diagnostic(code(driver::cancelled))]
    Cancelled { stage: Stage },
}

impl Error {
    pub fn stage(&self) -> Stage {
        match self {
            Error::Parse(_) => Stage::Parse,
            Error::Validation(_) => Stage::Normalize,
            Error::Consistency(_) => Stage::Check,
            Error::Render(_) => Stage::Render,
            Error::Emission(_) => Stage::Emit,
            Error::Config(_) => Stage::Config,
            Error::Cancelled { stage } => *stage,
        }
    }

    /// Machine-readable code
    pub fn code(&self) -> String {
        Diagnostic::code(self).map_or_else(|| "unknown".to_string(), |c| c.to_string())
    }

    pub fn location(&self) -> Option<String> {
        match self {
            Error::Parse(e) => e.location(),
            Error::Validation(e) => Some(e.field.to_string()),
            Error::Consistency(e) => Some(e.aggregate.clone()),
            Error::Render(e) => Some(e.node.clone()),
            Error::Emission(e) => Some(e.path.display().to_string()),
            Error::Config(_) | Error::Cancelled { .. } => None,
        }
    }
}

/// Serializable view of one diagnostic
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Record {
    pub stage: Stage,
    pub code: String,
    pub location: Option<String>,
    pub message: String,
}

/// Diagnostics collected over one run
#[derive(Debug, Clone, Default)]
pub struct Diagnostics {
    errors: Vec<Error>,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn error(&mut self, error: impl Into<Error>) {
        self.errors.push(error.into());
    }

    pub fn extend<E: Into<Error>>(&mut self, errors: impl IntoIterator<Item = E>) {
        self.errors.extend(errors.into_iter().map(Into::into));
    }

    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    pub fn error_count(&self) -> usize {
        self.errors.len()
    }

    /// Get errors by reference
    pub fn errors(&self) -> &[Error] {
        &self.errors
    }

    /// Consume and return errors
    pub fn into_errors(self) -> Vec<Error> {
        self.errors
    }

    pub fn records(&self) -> Vec<Record> {
        self.errors
            .iter()
            .map(|e| Record {
                stage: e.stage(),
                code: e.code(),
                location: e.location(),
                message: e.to_string(),
            })
            .collect()
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(&self.records())
    }

    /// Print all diagnostics
    pub fn emit_all(&self) {
        for error in &self.errors {
            eprintln!("{:?}", miette::Report::new(error.clone()));
        }
    }
}

impl<E: Into<Error>> From<Vec<E>> for Diagnostics {
    fn from(errors: Vec<E>) -> Self {
        let mut diagnostics = Diagnostics::new();
        diagnostics.extend(errors);
        diagnostics
    }
}

impl From<Error> for Diagnostics {
    fn from(error: Error) -> Self {
        Self {
            errors: vec![error],
        }
    }
}
