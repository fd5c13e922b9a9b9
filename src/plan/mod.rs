//! Artifact planner
//!
//! Decides which files a run produces. Planning is a pure function of the
//! IR and each service's capabilities: the same IR always yields the same
//! artifact list, in the same order.
//!
//! Per aggregate, in order:
//! - `model`, `validation` (always)
//! - `queries`, `repository` (persistence enabled)
//! - `handler` (persistence and presentation enabled)
//! - the aggregate's `mod.rs`
//!
//! followed by one `mod.rs` per service.

use crate::ir::{Aggregate, Ir, Service};
use crate::types::Capability;
use serde::Serialize;
use std::fmt;

/// Kind of generated file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ArtifactKind {
    /// Data types of every entity in the aggregate
    Model,
    /// Field constraint checks
    Validation,
    /// SQL text and row scanning
    Queries,
    /// Transactional CRUD over the aggregate
    Repository,
    /// HTTP handlers and router
    Handler,
    /// `mod.rs` tying the other artifacts together
    Wiring,
}

impl ArtifactKind {
    pub fn name(&self) -> &'static str {
        match self {
            ArtifactKind::Model => "model",
            ArtifactKind::Validation => "validation",
            ArtifactKind::Queries => "queries",
            ArtifactKind::Repository => "repository",
            ArtifactKind::Handler => "handler",
            ArtifactKind::Wiring => "wiring",
        }
    }

    /// Capabilities a service must enable for this kind to be planned
    pub fn required(&self) -> &'static [Capability] {
        match self {
            ArtifactKind::Model | ArtifactKind::Validation | ArtifactKind::Wiring => &[],
            ArtifactKind::Queries | ArtifactKind::Repository => &[Capability::Persistence],
            ArtifactKind::Handler => &[Capability::Persistence, Capability::Presentation],
        }
    }

    /// Rust module name of an aggregate-level artifact
    pub fn module(&self) -> &'static str {
        match self {
            ArtifactKind::Wiring => "mod",
            other => other.name(),
        }
    }
}

impl fmt::Display for ArtifactKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// One planned file
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ArtifactSpec {
    pub kind: ArtifactKind,
    pub service: String,
    /// `None` for the service-level wiring module
    pub aggregate: Option<String>,
    /// Root entity of the aggregate
    pub entity: Option<String>,
    pub required: Vec<Capability>,
    /// Relative target path, `/`-separated
    pub path: String,
}

impl ArtifactSpec {
    /// `service`, or `service.aggregate`
    pub fn node(&self) -> String {
        match &self.aggregate {
            Some(aggregate) => format!("{}.{aggregate}", self.service),
            None => self.service.clone(),
        }
    }
}

/// Ordered artifact list of a run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Plan {
    pub artifacts: Vec<ArtifactSpec>,
}

impl Plan {
    pub fn len(&self) -> usize {
        self.artifacts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.artifacts.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ArtifactSpec> {
        self.artifacts.iter()
    }

    pub fn paths(&self) -> impl Iterator<Item = &str> {
        self.artifacts.iter().map(|a| a.path.as_str())
    }

    /// Artifacts belonging to one aggregate, in plan order
    pub fn for_aggregate<'a>(
        &'a self,
        service: &'a str,
        aggregate: &'a str,
    ) -> impl Iterator<Item = &'a ArtifactSpec> + 'a {
        self.artifacts
            .iter()
            .filter(move |a| a.service == service && a.aggregate.as_deref() == Some(aggregate))
    }
}

/// Plan every artifact of the IR
pub fn plan(ir: &Ir) -> Plan {
    let mut artifacts = Vec::new();
    for service in &ir.services {
        for aggregate in &service.aggregates {
            artifacts.extend(plan_aggregate(ir, service, aggregate));
        }
        artifacts.push(plan_service(service));
    }
    tracing::debug!("planned {} artifacts", artifacts.len());
    Plan { artifacts }
}

/// Artifacts of one aggregate, in plan order
pub fn plan_aggregate(ir: &Ir, service: &Service, aggregate: &Aggregate) -> Vec<ArtifactSpec> {
    let directory = format!("{}/{}", service.module_name(), aggregate.module_name());
    let root = ir.entity(aggregate.root).name.clone();

    [
        ArtifactKind::Model,
        ArtifactKind::Validation,
        ArtifactKind::Queries,
        ArtifactKind::Repository,
        ArtifactKind::Handler,
        ArtifactKind::Wiring,
    ]
    .into_iter()
    .filter(|kind| service.capabilities.missing(kind.required()).is_none())
    .map(|kind| ArtifactSpec {
        kind,
        service: service.name.clone(),
        aggregate: Some(aggregate.name.clone()),
        entity: Some(root.clone()),
        required: kind.required().to_vec(),
        path: format!("{directory}/{}.rs", kind.module()),
    })
    .collect()
}

/// The service-level wiring module
pub fn plan_service(service: &Service) -> ArtifactSpec {
    ArtifactSpec {
        kind: ArtifactKind::Wiring,
        service: service.name.clone(),
        aggregate: None,
        entity: None,
        required: Vec::new(),
        path: format!("{}/mod.rs", service.module_name()),
    }
}
