//! Template / emission engine
//!
//! Renders each planned artifact into Rust source. Every value two files
//! must agree on (column lists, SQL text, bind order, stamping, executor
//! handles) is read from the aggregate's [`AggregateBinding`]; templates
//! only decide how those values are spelled.
//!
//! Generated code targets `sqlx` for persistence, `axum` for handlers and
//! `serde`, `uuid` and `chrono` for the data model.
//!
//! Aggregates render in parallel on the current rayon pool; output is
//! collected in plan order.

mod handler;
mod model;
mod queries;
mod repository;
mod validation;
mod wiring;
pub mod writer;

use crate::bind::{self, AggregateBinding, Target};
use crate::diagnostics::RenderError;
use crate::ir::{Aggregate, Entity, Ir, Service};
use crate::plan::{ArtifactKind, ArtifactSpec, Plan};
use crate::types::Backend;
use rayon::prelude::*;

/// Source text of one artifact
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rendered {
    pub kind: ArtifactKind,
    /// Relative target path, `/`-separated
    pub path: String,
    pub contents: String,
}

/// Render every planned artifact
pub fn render(ir: &Ir, plan: &Plan) -> Result<Vec<Rendered>, RenderError> {
    let groups = group(plan);
    tracing::debug!(
        "rendering {} artifacts in {} groups on {} threads",
        plan.len(),
        groups.len(),
        rayon::current_num_threads()
    );

    let rendered: Vec<Result<Vec<Rendered>, RenderError>> = groups
        .par_iter()
        .map(|group| render_group(ir, group))
        .collect();

    let mut output = Vec::with_capacity(plan.len());
    for result in rendered {
        output.extend(result?);
    }
    Ok(output)
}

/// Consecutive artifacts of one aggregate (or one service wiring module)
fn group(plan: &Plan) -> Vec<Vec<&ArtifactSpec>> {
    let mut groups: Vec<Vec<&ArtifactSpec>> = Vec::new();
    for spec in plan.iter() {
        match groups.last_mut() {
            Some(last)
                if last.first().is_some_and(|first| {
                    first.service == spec.service
                        && first.aggregate.is_some()
                        && first.aggregate == spec.aggregate
                }) =>
            {
                last.push(spec)
            }
            _ => groups.push(vec![spec]),
        }
    }
    groups
}

fn render_group(ir: &Ir, group: &[&ArtifactSpec]) -> Result<Vec<Rendered>, RenderError> {
    let Some(first) = group.first() else {
        return Ok(Vec::new());
    };
    let service = ir
        .find_service(&first.service)
        .ok_or_else(|| missing_node(first, "service is not in the IR"))?;

    let Some(aggregate_name) = &first.aggregate else {
        return group
            .iter()
            .map(|spec| -> Result<Rendered, RenderError> {
                let contents = wiring::render_service(ir, service, spec)?;
                Ok(rendered(spec, contents))
            })
            .collect();
    };
    let aggregate = service
        .find_aggregate(aggregate_name)
        .ok_or_else(|| missing_node(first, "aggregate is not in the IR"))?;
    let binding = bind::bind_aggregate(ir, service, aggregate);

    group
        .iter()
        .map(|spec| {
            let cx = Context {
                ir,
                service,
                aggregate,
                binding: &binding,
                spec,
                siblings: group,
            };
            render_artifact(&cx).map(|contents| rendered(spec, contents))
        })
        .collect()
}

fn rendered(spec: &ArtifactSpec, contents: String) -> Rendered {
    Rendered {
        kind: spec.kind,
        path: spec.path.clone(),
        contents,
    }
}

fn missing_node(spec: &ArtifactSpec, reason: &str) -> RenderError {
    RenderError {
        artifact: spec.kind,
        node: spec.node(),
        reason: reason.to_string(),
    }
}

/// Render one aggregate-level artifact
pub fn render_artifact(cx: &Context<'_>) -> Result<String, RenderError> {
    if let Some(capability) = cx.service.capabilities.missing(&cx.spec.required) {
        return Err(cx.error(format!(
            "service `{}` does not enable the {capability} capability",
            cx.service.name
        )));
    }
    match cx.spec.kind {
        ArtifactKind::Model => model::render(cx),
        ArtifactKind::Validation => validation::render(cx),
        ArtifactKind::Queries => queries::render(cx),
        ArtifactKind::Repository => repository::render(cx),
        ArtifactKind::Handler => handler::render(cx),
        ArtifactKind::Wiring => wiring::render_aggregate(cx),
    }
}

/// Everything a template may read while rendering one artifact
pub struct Context<'a> {
    pub ir: &'a Ir,
    pub service: &'a Service,
    pub aggregate: &'a Aggregate,
    pub binding: &'a AggregateBinding,
    pub spec: &'a ArtifactSpec,
    /// Artifacts planned for the same aggregate
    pub siblings: &'a [&'a ArtifactSpec],
}

impl<'a> Context<'a> {
    pub fn error(&self, reason: impl Into<String>) -> RenderError {
        RenderError {
            artifact: self.spec.kind,
            node: self.spec.node(),
            reason: reason.into(),
        }
    }

    pub fn root(&self) -> &'a Entity {
        self.ir.entity(self.aggregate.root)
    }

    pub fn entity(&self, target: Target) -> Result<&'a Entity, RenderError> {
        self.binding
            .target(target)
            .map(|b| self.ir.entity(b.entity))
            .ok_or_else(|| self.error(format!("no entity bound at {target:?}")))
    }

    pub fn backend(&self) -> Result<Backend, RenderError> {
        self.binding
            .backend
            .ok_or_else(|| self.error("no persistence backend is bound"))
    }

    /// Whether an artifact of `kind` is planned next to this one
    pub fn plans(&self, kind: ArtifactKind) -> bool {
        self.siblings.iter().any(|s| s.kind == kind)
    }

    /// Root, then every child in canonical order
    pub fn targets(&self) -> impl Iterator<Item = Target> + 'a {
        std::iter::once(Target::Root).chain((0..self.binding.children.len()).map(Target::Child))
    }

    /// Model type names of every entity, in canonical order
    pub fn type_names(&self) -> Vec<String> {
        let ir = self.ir;
        self.aggregate
            .order
            .iter()
            .map(|id| writer::type_ident(&ir.entity(*id).name))
            .collect()
    }
}

/// sqlx names for a backend
pub(crate) struct Sqlx {
    pub pool: &'static str,
    pub row: &'static str,
}

impl Sqlx {
    pub fn of(backend: Backend) -> Self {
        match backend {
            Backend::Postgres => Sqlx {
                pool: "sqlx::PgPool",
                row: "sqlx::postgres::PgRow",
            },
            Backend::Sqlite => Sqlx {
                pool: "sqlx::SqlitePool",
                row: "sqlx::sqlite::SqliteRow",
            },
        }
    }
}
