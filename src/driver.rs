//! Run driver
//!
//! Sequences the stages of one run, stops at the first failing stage with
//! that stage's full diagnostic batch, and checks for cancellation between
//! stages. Rendering runs on a rayon pool sized by [`GeneratorConfig::jobs`].

use crate::codegen::{self, Rendered};
use crate::config::GeneratorConfig;
use crate::diagnostics::{Diagnostics, Error, SourceFile, Stage};
use crate::emit::{self, EmitReport};
use crate::ir::Ir;
use crate::plan::{self, Plan};
use crate::{check, normalize, parser};
use serde::Serialize;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Shared flag a caller sets to stop a run at the next stage boundary
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Outcome of a successful run
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RunReport {
    pub services: usize,
    pub aggregates: usize,
    pub artifacts: usize,
    pub emit: EmitReport,
}

pub struct Driver {
    config: GeneratorConfig,
    cancel: CancelToken,
}

impl Driver {
    pub fn new(config: GeneratorConfig) -> Self {
        Self {
            config,
            cancel: CancelToken::new(),
        }
    }

    pub fn with_cancel(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    pub fn config(&self) -> &GeneratorConfig {
        &self.config
    }

    fn checkpoint(&self, stage: Stage) -> Result<(), Diagnostics> {
        if self.cancel.is_cancelled() {
            tracing::info!("run cancelled before {stage}");
            return Err(Error::Cancelled { stage }.into());
        }
        Ok(())
    }

    /// Parse, normalize and check
    pub fn analyze(&self, source: &SourceFile) -> Result<Ir, Diagnostics> {
        self.checkpoint(Stage::Parse)?;
        tracing::info!("parsing {}", source.name);
        let document = parser::parse(source).map_err(Error::from)?;

        self.checkpoint(Stage::Normalize)?;
        tracing::info!("normalizing {} services", document.services.len());
        let ir = normalize::normalize(&document)?;

        self.checkpoint(Stage::Check)?;
        tracing::info!("checking consistency");
        check::check(&ir)?;
        Ok(ir)
    }

    /// Analyze, plan and render without touching the filesystem
    pub fn render(&self, source: &SourceFile) -> Result<(Ir, Plan, Vec<Rendered>), Diagnostics> {
        let ir = self.analyze(source)?;

        self.checkpoint(Stage::Plan)?;
        let plan = plan::plan(&ir);
        tracing::info!("planned {} artifacts", plan.len());

        self.checkpoint(Stage::Render)?;
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.config.jobs)
            .build()
            .map_err(|e| Error::Config(format!("cannot start {} render threads: {e}", self.config.jobs)))?;
        let rendered = pool
            .install(|| codegen::render(&ir, &plan))
            .map_err(Error::from)?;
        tracing::info!("rendered {} artifacts", rendered.len());
        Ok((ir, plan, rendered))
    }

    /// Run every stage and write the output tree
    pub fn generate(&self, source: &SourceFile) -> Result<RunReport, Diagnostics> {
        let (ir, plan, rendered) = self.render(source)?;

        self.checkpoint(Stage::Emit)?;
        tracing::info!(
            "emitting to {} ({} mode)",
            self.config.output_dir.display(),
            self.config.mode
        );
        let emit = emit::emit(&self.config.output_dir, &rendered, self.config.mode)?;

        Ok(RunReport {
            services: ir.services.len(),
            aggregates: ir.aggregates().count(),
            artifacts: plan.len(),
            emit,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cancelled_before_parse() {
        let driver = Driver::new(GeneratorConfig::default());
        driver.cancel_token().cancel();
        let source = SourceFile::new("spec.toml", "version = 1");
        let diagnostics = driver.analyze(&source).unwrap_err();
        assert!(matches!(
            diagnostics.errors(),
            [Error::Cancelled { stage: Stage::Parse }]
        ));
    }

    #[test]
    fn test_token_is_shared() {
        let token = CancelToken::new();
        let driver = Driver::new(GeneratorConfig::default()).with_cancel(token.clone());
        assert!(!driver.cancel_token().is_cancelled());
        token.cancel();
        assert!(driver.cancel_token().is_cancelled());
    }
}
