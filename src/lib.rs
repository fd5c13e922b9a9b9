//! svcforge: specification-to-artifact compiler
//!
//! Compiles a declarative description of services, aggregates, entities and
//! relations into Rust source: data models, validation routines, SQL,
//! transactional repositories, HTTP handlers and module wiring. Every file
//! that must agree with another (a repository and the table layout its
//! queries assume, a handler and the transaction boundary it relies on) is
//! rendered from one shared binding, and that binding is audited before
//! anything is written.
//!
//! # Architecture
//!
//! ```text
//! TOML → Parser → Raw tree → Normalizer → IR → Consistency check
//!      → Planner → Templates (parallel) → Emitter → output tree
//! ```
//!
//! # Example
//!
//! ```toml
//! version = 1
//!
//! [[service]]
//! name = "todo"
//! persistence = "postgres"
//!
//! [[service.aggregate]]
//! name = "lists"
//! root = { name = "List", fields = [{ name = "name", type = "string" }] }
//! ```

pub mod ast;
pub mod bind;
pub mod check;
pub mod codegen;
pub mod common;
pub mod config;
pub mod diagnostics;
pub mod driver;
pub mod emit;
pub mod ir;
pub mod normalize;
pub mod parser;
pub mod plan;
pub mod types;

pub use codegen::Rendered;
pub use config::GeneratorConfig;
pub use diagnostics::{Diagnostics, Error, SourceFile};
pub use driver::{CancelToken, Driver, RunReport};
pub use ir::Ir;
pub use plan::Plan;

/// Compiler version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Parse a specification to its raw tree
pub fn parse(source: &SourceFile) -> Result<ast::Document, Diagnostics> {
    parser::parse(source).map_err(|e| Error::from(e).into())
}

/// Parse, normalize and check a specification
pub fn analyze(source: &SourceFile) -> Result<Ir, Diagnostics> {
    let document = parse(source)?;
    let ir = normalize::normalize(&document)?;
    check::check(&ir)?;
    Ok(ir)
}

/// Render every artifact of a specification on the current thread pool
pub fn compile(source: &SourceFile) -> Result<Vec<Rendered>, Diagnostics> {
    let ir = analyze(source)?;
    let plan = plan::plan(&ir);
    codegen::render(&ir, &plan).map_err(|e| Error::from(e).into())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!VERSION.is_empty());
    }

    #[test]
    fn test_doc_example_compiles() {
        let source = SourceFile::new(
            "todo.toml",
            r#"
            version = 1

            [[service]]
            name = "todo"
            persistence = "postgres"

            [[service.aggregate]]
            name = "lists"
            root = { name = "List", fields = [{ name = "name", type = "string" }] }
            "#,
        );
        let rendered = compile(&source).unwrap();
        let paths: Vec<&str> = rendered.iter().map(|r| r.path.as_str()).collect();
        assert_eq!(
            paths,
            [
                "todo/lists/model.rs",
                "todo/lists/validation.rs",
                "todo/lists/queries.rs",
                "todo/lists/repository.rs",
                "todo/lists/mod.rs",
                "todo/mod.rs",
            ]
        );
    }
}
