//! `model.rs`: one struct per entity, one enum per enum field

use super::Context;
use super::writer::{CodeWriter, field_ident, type_ident};
use crate::bind::Target;
use crate::diagnostics::RenderError;
use crate::ir::{Entity, Field};
use crate::types::{Cardinality, FieldType, Role};

pub(super) fn render(cx: &Context<'_>) -> Result<String, RenderError> {
    let mut w = CodeWriter::new();
    w.banner();
    w.line("use serde::{Deserialize, Serialize};");

    let has_enums = cx
        .targets()
        .filter_map(|t| cx.entity(t).ok())
        .any(|e| e.fields.iter().any(|f| f.ty.is_enum()));
    if has_enums {
        w.blank();
        unknown_variant(&mut w);
    }

    for target in cx.targets() {
        let entity = cx.entity(target)?;
        for field in entity.fields.iter().filter(|f| f.ty.is_enum()) {
            w.blank();
            enumeration(&mut w, entity, field);
        }
        w.blank();
        structure(&mut w, cx, target, entity)?;
    }

    Ok(w.finish())
}

/// Rust type of a field, including nullability
pub(super) fn rust_type(entity: &Entity, field: &Field) -> String {
    let base = base_type(entity, field);
    if field.nullable {
        format!("Option<{base}>")
    } else {
        base
    }
}

pub(super) fn base_type(entity: &Entity, field: &Field) -> String {
    match &field.ty {
        FieldType::String => "String".to_string(),
        FieldType::Integer => "i64".to_string(),
        FieldType::Boolean => "bool".to_string(),
        FieldType::Timestamp => "chrono::DateTime<chrono::Utc>".to_string(),
        FieldType::Identifier => "uuid::Uuid".to_string(),
        FieldType::Enum(_) => enum_name(entity, field),
    }
}

/// `<Entity><Field>`
pub(super) fn enum_name(entity: &Entity, field: &Field) -> String {
    type_ident(&format!("{}_{}", entity.name, field.name))
}

/// Type of the parent's field holding a child
pub(super) fn relation_type(child: &str, cardinality: Cardinality) -> String {
    match cardinality {
        Cardinality::Many => format!("Vec<{child}>"),
        Cardinality::One => format!("Option<{child}>"),
    }
}

fn unknown_variant(w: &mut CodeWriter) {
    w.doc("A stored enum value no variant matches");
    w.line("#[derive(Debug, Clone, PartialEq, Eq)]");
    w.open("pub struct UnknownVariant {");
    w.line("pub ty: &'static str,");
    w.line("pub value: String,");
    w.close("}");
    w.blank();
    w.open("impl std::fmt::Display for UnknownVariant {");
    w.open("fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {");
    w.line("write!(f, \"unknown {} variant `{}`\", self.ty, self.value)");
    w.close("}");
    w.close("}");
    w.blank();
    w.line("impl std::error::Error for UnknownVariant {}");
}

fn enumeration(w: &mut CodeWriter, entity: &Entity, field: &Field) {
    let FieldType::Enum(variants) = &field.ty else {
        return;
    };
    let name = enum_name(entity, field);
    let arms: Vec<(String, &String)> = variants.iter().map(|v| (type_ident(v), v)).collect();

    w.line("#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]");
    w.open(format!("pub enum {name} {{"));
    for (ident, value) in &arms {
        w.line(format!("#[serde(rename = {value:?})]"));
        w.line(format!("{ident},"));
    }
    w.close("}");
    w.blank();

    w.open(format!("impl {name} {{"));
    let all: Vec<String> = arms.iter().map(|(ident, _)| format!("{name}::{ident}")).collect();
    w.line(format!(
        "pub const ALL: [{name}; {}] = [{}];",
        arms.len(),
        all.join(", ")
    ));
    w.blank();
    w.open("pub fn as_str(&self) -> &'static str {");
    w.open("match self {");
    for (ident, value) in &arms {
        w.line(format!("{name}::{ident} => {value:?},"));
    }
    w.close("}");
    w.close("}");
    w.close("}");
    w.blank();

    w.open(format!("impl std::fmt::Display for {name} {{"));
    w.open("fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {");
    w.line("f.write_str(self.as_str())");
    w.close("}");
    w.close("}");
    w.blank();

    w.open(format!("impl std::str::FromStr for {name} {{"));
    w.line("type Err = UnknownVariant;");
    w.blank();
    w.open("fn from_str(value: &str) -> Result<Self, Self::Err> {");
    w.open("match value {");
    for (ident, value) in &arms {
        w.line(format!("{value:?} => Ok({name}::{ident}),"));
    }
    w.open("other => Err(UnknownVariant {");
    w.line(format!("ty: {name:?},"));
    w.line("value: other.to_string(),");
    w.close("}),");
    w.close("}");
    w.close("}");
    w.close("}");
}

fn structure(
    w: &mut CodeWriter,
    cx: &Context<'_>,
    target: Target,
    entity: &Entity,
) -> Result<(), RenderError> {
    let binding = cx
        .binding
        .target(target)
        .ok_or_else(|| cx.error(format!("no binding for `{}`", entity.name)))?;

    match target {
        Target::Root => w.doc(format!("Root of the `{}` aggregate", cx.aggregate.name)),
        Target::Child(_) => w.doc(format!("Part of the `{}` aggregate", cx.aggregate.name)),
    }
    w.line("#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]");
    w.open(format!("pub struct {} {{", type_ident(&entity.name)));

    for &index in &binding.projection {
        let field = &entity.fields[index];
        let ident = field_ident(&field.name);
        match field.role {
            Some(Role::AuditCreated | Role::AuditUpdated) => {
                w.line("#[serde(default = \"chrono::Utc::now\")]");
            }
            Some(Role::Identifier | Role::OwnedBy) => w.line("#[serde(default)]"),
            None => {}
        }
        if ident.trim_start_matches("r#") != field.name {
            w.line(format!("#[serde(rename = {:?})]", field.name));
        }
        w.line(format!("pub {ident}: {},", rust_type(entity, field)));
    }

    for (i, child) in cx.binding.children_of(target) {
        let child_entity = cx.entity(Target::Child(i))?;
        w.line("#[serde(default)]");
        w.line(format!(
            "pub {}: {},",
            field_ident(&child.relation),
            relation_type(&type_ident(&child_entity.name), child.cardinality)
        ));
    }

    w.close("}");
    Ok(())
}
