//! `mod.rs` files: per aggregate and per service

use super::repository::repository_name;
use super::writer::{CodeWriter, field_ident, type_ident};
use super::{Context, Sqlx};
use crate::diagnostics::RenderError;
use crate::ir::{Ir, Service};
use crate::plan::{ArtifactKind, ArtifactSpec};
use crate::types::Capability;

/// Declare the aggregate's sibling modules and re-export its public types
pub(super) fn render_aggregate(cx: &Context<'_>) -> Result<String, RenderError> {
    let mut w = CodeWriter::new();
    w.banner();
    for spec in cx.siblings.iter().filter(|s| s.kind != ArtifactKind::Wiring) {
        w.line(format!("pub mod {};", spec.kind.module()));
    }

    if cx.plans(ArtifactKind::Model) {
        w.blank();
        w.line(format!("pub use model::{{{}}};", cx.type_names().join(", ")));
    }
    if cx.plans(ArtifactKind::Repository) {
        w.line(format!("pub use repository::{};", repository_name(cx)));
    }
    Ok(w.finish())
}

/// Declare every aggregate of a service, plus its router when it serves HTTP
pub(super) fn render_service(
    ir: &Ir,
    service: &Service,
    spec: &ArtifactSpec,
) -> Result<String, RenderError> {
    let mut w = CodeWriter::new();
    w.banner();
    for aggregate in &service.aggregates {
        w.line(format!("pub mod {};", field_ident(&aggregate.module_name())));
    }

    let serves = [Capability::Persistence, Capability::Presentation];
    let Some(backend) = service.capabilities.persistence else {
        return Ok(w.finish());
    };
    if service.capabilities.missing(&serves).is_some() {
        return Ok(w.finish());
    }
    let sqlx = Sqlx::of(backend);

    if !service.aggregates.is_empty() {
        w.blank();
    }
    w.doc(format!("Every route of the `{}` service", service.name));
    let pool = if service.aggregates.is_empty() {
        "_pool"
    } else {
        "pool"
    };
    w.open(format!("pub fn router({pool}: {}) -> axum::Router {{", sqlx.pool));
    w.line("axum::Router::new()");
    w.indent();
    for aggregate in &service.aggregates {
        let module = field_ident(&aggregate.module_name());
        let root = ir.entities.get(aggregate.root).ok_or_else(|| RenderError {
            artifact: spec.kind,
            node: aggregate.label(service),
            reason: "root entity is not in the IR".to_string(),
        })?;
        w.line(format!(
            ".merge({module}::handler::router({module}::{}Repository::new(pool.clone())))",
            type_ident(&root.name)
        ));
    }
    w.dedent();
    w.close("}");
    Ok(w.finish())
}
