//! `queries.rs`: SQL constants and row scanners

use super::model::enum_name;
use super::writer::{CodeWriter, field_ident, type_ident};
use super::{Context, Sqlx};
use crate::bind::{EntityBinding, Statement, Target};
use crate::diagnostics::RenderError;
use crate::ir::Entity;
use crate::types::Cardinality;
use heck::{ToShoutySnakeCase, ToSnakeCase};

pub(super) fn render(cx: &Context<'_>) -> Result<String, RenderError> {
    let sqlx = Sqlx::of(cx.backend()?);
    let mut w = CodeWriter::new();
    w.banner();
    w.line("use super::model::*;");
    w.line("use sqlx::Row;");

    let root = cx.root();
    let queries = cx
        .binding
        .root
        .queries
        .as_ref()
        .ok_or_else(|| cx.error(format!("`{}` has no bound statements", root.name)))?;
    w.blank();
    constant(&mut w, root, "insert", &queries.insert);
    constant(&mut w, root, "select_by_id", &queries.select_by_id);
    constant(&mut w, root, "select_all", &queries.select_all);
    constant(&mut w, root, "update", &queries.update);
    constant(&mut w, root, "delete", &queries.delete);

    for (i, child) in cx.binding.children.iter().enumerate() {
        let entity = cx.entity(Target::Child(i))?;
        let queries = child
            .queries
            .as_ref()
            .ok_or_else(|| cx.error(format!("`{}` has no bound statements", entity.name)))?;
        w.blank();
        constant(&mut w, entity, "insert", &queries.insert);
        constant(&mut w, entity, "select_scoped", &queries.select_scoped);
        constant(&mut w, entity, "delete_scoped", &queries.delete_scoped);
        constant(&mut w, entity, "delete_by_id", &queries.delete_by_id);
    }

    for target in cx.targets() {
        let entity = cx.entity(target)?;
        let binding = cx
            .binding
            .target(target)
            .ok_or_else(|| cx.error(format!("no binding for `{}`", entity.name)))?;
        w.blank();
        scanner(&mut w, cx, target, entity, binding, sqlx.row)?;
    }

    Ok(w.finish())
}

/// Name of the constant holding `statement` of `entity`
pub(super) fn constant_name(entity: &Entity, statement: &str) -> String {
    format!("{}_{}", entity.name.to_shouty_snake_case(), statement.to_shouty_snake_case())
}

/// Name of the scanner of `entity`
pub(super) fn scanner_name(entity: &Entity) -> String {
    field_ident(&format!("scan_{}", entity.name.to_snake_case()))
}

fn constant(w: &mut CodeWriter, entity: &Entity, name: &str, statement: &Statement) {
    w.line(format!(
        "pub const {}: &str = r#\"{}\"#;",
        constant_name(entity, name),
        statement.sql
    ));
}

fn scanner(
    w: &mut CodeWriter,
    cx: &Context<'_>,
    target: Target,
    entity: &Entity,
    binding: &EntityBinding,
    row: &str,
) -> Result<(), RenderError> {
    let ty = type_ident(&entity.name);
    let columns: Vec<&str> = binding
        .scan
        .iter()
        .map(|&i| entity.fields[i].name.as_str())
        .collect();
    w.doc(format!("Reads columns in order: {}", columns.join(", ")));
    w.open(format!(
        "pub fn {}(row: &{row}) -> Result<{ty}, sqlx::Error> {{",
        scanner_name(entity)
    ));
    w.open(format!("Ok({ty} {{"));
    for (position, &index) in binding.scan.iter().enumerate() {
        let field = entity.fields.get(index).ok_or_else(|| {
            cx.error(format!("scan of `{}` reads missing field #{index}", entity.name))
        })?;
        let ident = field_ident(&field.name);
        if field.ty.is_enum() {
            let name = enum_name(entity, field);
            if field.nullable {
                w.line(format!(
                    "{ident}: row.try_get::<Option<String>, _>({position})?.map(|v| v.parse::<{name}>()).transpose().map_err(|e| sqlx::Error::Decode(Box::new(e)))?,"
                ));
            } else {
                w.line(format!(
                    "{ident}: row.try_get::<String, _>({position})?.parse::<{name}>().map_err(|e| sqlx::Error::Decode(Box::new(e)))?,"
                ));
            }
        } else {
            w.line(format!("{ident}: row.try_get({position})?,"));
        }
    }
    for (_, child) in cx.binding.children_of(target) {
        let empty = match child.cardinality {
            Cardinality::Many => "Vec::new()",
            Cardinality::One => "None",
        };
        w.line(format!("{}: {empty},", field_ident(&child.relation)));
    }
    w.close("})");
    w.close("}");
    Ok(())
}
