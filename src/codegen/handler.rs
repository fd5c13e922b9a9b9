//! `handler.rs`: axum routes over the aggregate repository

use super::Context;
use super::repository::repository_name;
use super::writer::{CodeWriter, field_ident, type_ident};
use crate::diagnostics::RenderError;
use heck::ToSnakeCase;

pub(super) fn render(cx: &Context<'_>) -> Result<String, RenderError> {
    let root = cx.root();
    let ty = type_ident(&root.name);
    let repository = repository_name(cx);
    let validate = field_ident(&format!("validate_{}", root.name.to_snake_case()));
    let id = cx
        .binding
        .target(crate::bind::Target::Root)
        .and_then(|b| root.fields.get(b.identifier))
        .map(|f| field_ident(&f.name))
        .ok_or_else(|| cx.error(format!("`{}` has no bound identifier", root.name)))?;
    let route = format!("/{}", cx.aggregate.module_name());

    let mut w = CodeWriter::new();
    w.banner();
    w.line(format!("use super::model::{ty};"));
    w.line(format!("use super::repository::{repository};"));
    w.line(format!("use super::validation::{{FieldError, {validate}}};"));
    w.line("use axum::extract::{Path, State};");
    w.line("use axum::http::StatusCode;");
    w.line("use axum::response::{IntoResponse, Response};");
    w.line("use axum::routing::get;");
    w.line("use axum::{Json, Router};");
    w.blank();

    w.doc("Failure of a request");
    w.line("#[derive(Debug)]");
    w.open("pub enum ApiError {");
    w.line("Invalid(Vec<FieldError>),");
    w.line("NotFound,");
    w.line("Database(sqlx::Error),");
    w.close("}");
    w.blank();
    w.open("impl From<sqlx::Error> for ApiError {");
    w.open("fn from(err: sqlx::Error) -> Self {");
    w.line("ApiError::Database(err)");
    w.close("}");
    w.close("}");
    w.blank();
    w.open("impl IntoResponse for ApiError {");
    w.open("fn into_response(self) -> Response {");
    w.open("match self {");
    w.line("ApiError::Invalid(errors) => (StatusCode::UNPROCESSABLE_ENTITY, Json(errors)).into_response(),");
    w.line("ApiError::NotFound => StatusCode::NOT_FOUND.into_response(),");
    w.line("ApiError::Database(err) => (StatusCode::INTERNAL_SERVER_ERROR, err.to_string()).into_response(),");
    w.close("}");
    w.close("}");
    w.close("}");
    w.blank();

    w.doc(format!("Routes of the `{}` aggregate", cx.aggregate.name));
    w.open(format!("pub fn router(repository: {repository}) -> Router {{"));
    w.line("Router::new()");
    w.indent();
    w.line(format!(".route(\"{route}\", get(index).post(create))"));
    w.line(format!(
        ".route(\"{route}/{{id}}\", get(show).put(update).delete(destroy))"
    ));
    w.line(".with_state(repository)");
    w.dedent();
    w.close("}");
    w.blank();

    let state = format!("State(repository): State<{repository}>");
    let path = "Path(id): Path<uuid::Uuid>";

    w.open(format!(
        "async fn index({state}) -> Result<Json<Vec<{ty}>>, ApiError> {{"
    ));
    w.line("Ok(Json(repository.list().await?))");
    w.close("}");
    w.blank();

    w.open(format!(
        "async fn show({state}, {path}) -> Result<Json<{ty}>, ApiError> {{"
    ));
    w.line("repository.get(id).await?.map(Json).ok_or(ApiError::NotFound)");
    w.close("}");
    w.blank();

    w.open(format!(
        "async fn create({state}, Json(body): Json<{ty}>) -> Result<(StatusCode, Json<{ty}>), ApiError> {{"
    ));
    w.line(format!("{validate}(&body).map_err(ApiError::Invalid)?;"));
    w.line("Ok((StatusCode::CREATED, Json(repository.create(body).await?)))");
    w.close("}");
    w.blank();

    w.open(format!(
        "async fn update({state}, {path}, Json(mut body): Json<{ty}>) -> Result<Json<{ty}>, ApiError> {{"
    ));
    w.line(format!("body.{id} = id;"));
    w.line(format!("{validate}(&body).map_err(ApiError::Invalid)?;"));
    w.line("repository.save(body).await?.map(Json).ok_or(ApiError::NotFound)");
    w.close("}");
    w.blank();

    w.open(format!(
        "async fn destroy({state}, {path}) -> Result<StatusCode, ApiError> {{"
    ));
    w.open("if repository.delete(id).await? {");
    w.line("Ok(StatusCode::NO_CONTENT)");
    w.close("} else {");
    w.indent();
    w.line("Err(ApiError::NotFound)");
    w.close("}");
    w.close("}");

    Ok(w.finish())
}
