//! `validation.rs`: field constraints checked before any write

use super::Context;
use super::writer::{CodeWriter, field_ident, local_ident, type_ident};
use crate::bind::Target;
use crate::diagnostics::RenderError;
use crate::ir::{Entity, Field};
use crate::types::{Cardinality, FieldType};
use heck::ToSnakeCase;

pub(super) fn render(cx: &Context<'_>) -> Result<String, RenderError> {
    let mut w = CodeWriter::new();
    w.banner();
    w.line(format!("use super::model::{{{}}};", cx.type_names().join(", ")));
    w.line("use serde::Serialize;");
    w.blank();

    w.doc("A rejected field, addressed by its path in the submitted document");
    w.line("#[derive(Debug, Clone, PartialEq, Eq, Serialize)]");
    w.open("pub struct FieldError {");
    w.line("pub field: String,");
    w.line("pub message: String,");
    w.close("}");

    for target in cx.targets() {
        let entity = cx.entity(target)?;
        w.blank();
        validate(&mut w, entity);
        w.blank();
        check(&mut w, cx, target, entity)?;
    }

    Ok(w.finish())
}

fn validate_name(entity: &Entity) -> String {
    field_ident(&format!("validate_{}", entity.name.to_snake_case()))
}

fn check_name(entity: &Entity) -> String {
    field_ident(&format!("check_{}", entity.name.to_snake_case()))
}

fn validate(w: &mut CodeWriter, entity: &Entity) {
    let ty = type_ident(&entity.name);
    w.doc(format!("Check a `{}` and every child it owns", entity.name));
    w.open(format!(
        "pub fn {}(value: &{ty}) -> Result<(), Vec<FieldError>> {{",
        validate_name(entity)
    ));
    w.line("let mut errors = Vec::new();");
    w.line(format!("{}(value, \"\", &mut errors);", check_name(entity)));
    w.open("if errors.is_empty() {");
    w.line("Ok(())");
    w.close("} else {");
    w.indent();
    w.line("Err(errors)");
    w.close("}");
    w.close("}");
}

fn check(
    w: &mut CodeWriter,
    cx: &Context<'_>,
    target: Target,
    entity: &Entity,
) -> Result<(), RenderError> {
    let ty = type_ident(&entity.name);
    w.line("#[allow(unused_variables)]");
    w.open(format!(
        "fn {}(value: &{ty}, path: &str, errors: &mut Vec<FieldError>) {{",
        check_name(entity)
    ));

    for field in entity.fields.iter().filter(|f| !f.is_managed()) {
        field_checks(w, field);
    }

    for (i, child) in cx.binding.children_of(target) {
        if !child.owned {
            continue;
        }
        let child_entity = cx.entity(Target::Child(i))?;
        let var = local_ident(&child_entity.name);
        let relation = field_ident(&child.relation);
        let check = check_name(child_entity);
        match child.cardinality {
            Cardinality::Many => {
                w.open(format!(
                    "for (i, {var}) in value.{relation}.iter().enumerate() {{"
                ));
                w.line(format!(
                    "{check}({var}, &format!(\"{{path}}{}[{{i}}].\"), errors);",
                    child.relation
                ));
                w.close("}");
            }
            Cardinality::One => {
                w.open(format!("if let Some({var}) = &value.{relation} {{"));
                w.line(format!(
                    "{check}({var}, &format!(\"{{path}}{}.\"), errors);",
                    child.relation
                ));
                w.close("}");
            }
        }
    }
    w.close("}");
    Ok(())
}

/// Conditions under which a field is rejected, with their messages.
/// `value` names the field's value and `number` reads it as an integer.
fn conditions(field: &Field, value: &str, number: &str) -> Vec<(String, String)> {
    let mut out = Vec::new();
    let c = field.constraints;
    match field.ty {
        FieldType::String => {
            if !field.nullable {
                out.push((
                    format!("{value}.trim().is_empty()"),
                    "must not be empty".to_string(),
                ));
            }
            if let Some(max) = c.max_length {
                out.push((
                    format!("{value}.chars().count() > {max}"),
                    format!("must be at most {max} characters"),
                ));
            }
        }
        FieldType::Integer => {
            if let Some(min) = c.min {
                out.push((format!("{number} < {min}"), format!("must be at least {min}")));
            }
            if let Some(max) = c.max {
                out.push((format!("{number} > {max}"), format!("must be at most {max}")));
            }
        }
        _ => {}
    }
    out
}

fn field_checks(w: &mut CodeWriter, field: &Field) {
    let ident = field_ident(&field.name);
    let conditions = if field.nullable {
        conditions(field, "v", "*v")
    } else {
        let value = format!("value.{ident}");
        conditions(field, &value, &value)
    };
    if conditions.is_empty() {
        return;
    }

    if field.nullable {
        w.open(format!("if let Some(v) = &value.{ident} {{"));
    }
    for (condition, message) in conditions {
        w.open(format!("if {condition} {{"));
        w.open("errors.push(FieldError {");
        w.line(format!("field: format!(\"{{path}}{}\"),", field.name));
        w.line(format!("message: {message:?}.to_string(),"));
        w.close("});");
        w.close("}");
    }
    if field.nullable {
        w.close("}");
    }
}
