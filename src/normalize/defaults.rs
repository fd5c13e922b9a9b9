//! Defaulting rules
//!
//! The only repairs the normalizer makes to a specification:
//! - an aggregate root gets an identifier (`id`, first column) and the two
//!   audit timestamps (`created_at`, `updated_at`, last columns) when it does
//!   not declare fields carrying those roles;
//! - a child gets an identifier the same way, plus an owned-by key pointing at
//!   its parent directly after the identifier.
//!
//! An injected name that clashes with a declared field is reported, not
//! renamed.

use super::EntityDraft;
use crate::common::DocPath;
use crate::diagnostics::{ValidationCode, ValidationError};
use crate::ir::Field;
use crate::types::Role;
use heck::ToSnakeCase;

/// Identifier plus audit timestamps for an aggregate root
pub(super) fn inject_root_fields(draft: &mut EntityDraft, errors: &mut Vec<ValidationError>) {
    inject_identifier(draft, errors);
    for role in [Role::AuditCreated, Role::AuditUpdated] {
        if !draft.claims(role) {
            let at = draft.fields.len();
            inject(draft, role, role.default_name().unwrap_or_default(), at, errors);
        }
    }
}

/// Identifier plus owned-by key for a child entity
pub(super) fn inject_child_fields(
    draft: &mut EntityDraft,
    key: Option<&str>,
    parent: &str,
    relation: &DocPath,
    errors: &mut Vec<ValidationError>,
) {
    inject_identifier(draft, errors);

    let declared = draft.role_index(Role::OwnedBy);
    if declared.is_none() && draft.claims(Role::OwnedBy) {
        // The declared key failed to lower and is already reported.
        return;
    }
    match (key, declared) {
        (Some(key), Some(i)) if draft.fields[i].name == key => {}
        (Some(key), Some(i)) => errors.push(ValidationError::new(
            relation,
            ValidationCode::InvalidOwnerKey,
            format!(
                "relation key `{key}` does not match owned-by field `{}` of `{}`",
                draft.fields[i].name, draft.name
            ),
        )),
        (Some(key), None) => {
            if draft.fields.iter().any(|f| f.name == key) {
                errors.push(ValidationError::new(
                    relation,
                    ValidationCode::InvalidOwnerKey,
                    format!(
                        "field `{key}` of `{}` is used as relation key but lacks `role = \"owned-by\"`",
                        draft.name
                    ),
                ));
            } else {
                let at = key_position(draft);
                inject(draft, Role::OwnedBy, key, at, errors);
            }
        }
        (None, Some(_)) => {}
        (None, None) => {
            let name = format!("{}_id", parent.to_snake_case());
            let at = key_position(draft);
            inject(draft, Role::OwnedBy, &name, at, errors);
        }
    }
}

fn inject_identifier(draft: &mut EntityDraft, errors: &mut Vec<ValidationError>) {
    if !draft.claims(Role::Identifier) {
        inject(
            draft,
            Role::Identifier,
            Role::Identifier.default_name().unwrap_or_default(),
            0,
            errors,
        );
    }
}

fn key_position(draft: &EntityDraft) -> usize {
    draft.role_index(Role::Identifier).map_or(0, |i| i + 1)
}

fn inject(
    draft: &mut EntityDraft,
    role: Role,
    name: &str,
    at: usize,
    errors: &mut Vec<ValidationError>,
) {
    let path = draft.path.key("fields").key(name);
    if let Err(previous) = draft.scope.define(name, &path) {
        errors.push(ValidationError::new(
            &previous.path,
            ValidationCode::DuplicateName,
            format!(
                "field `{}` of `{}` clashes with the implicit {role} field `{name}`; declare it with `role = \"{role}\"` instead",
                previous.name, draft.name
            ),
        ));
        return;
    }
    draft.fields.insert(at, Field::implicit(name, role, path));
}
