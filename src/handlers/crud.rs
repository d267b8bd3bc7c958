//! Request adapters for the generic CRUD engine. The router binder attaches
//! one `CrudEngine` per model as a request extension.

use axum::{
    extract::{Path, Query, State},
    Extension,
};
use serde_json::Value;
use std::collections::HashMap;

use crate::api::JsonBody;
use crate::engine::CrudEngine;
use crate::middleware::{ApiResponse, ApiResult, AuthUser};
use crate::state::AppState;

type Actor = Option<Extension<AuthUser>>;

fn actor(user: &Actor) -> Option<&AuthUser> {
    user.as_ref().map(|Extension(u)| u)
}

/// POST /api/v1/:model
pub async fn create(
    State(state): State<AppState>,
    Extension(engine): Extension<CrudEngine>,
    user: Actor,
    JsonBody(body): JsonBody<Value>,
) -> ApiResult<Value> {
    let record = engine.create(&state, actor(&user), body).await?;
    Ok(ApiResponse::created(record))
}

/// GET /api/v1/:model?page=&limit=&<filter>=
pub async fn list(
    State(state): State<AppState>,
    Extension(engine): Extension<CrudEngine>,
    user: Actor,
    Query(params): Query<HashMap<String, String>>,
) -> ApiResult<Vec<Value>> {
    let (records, meta) = engine.list(&state, actor(&user), &params).await?;
    Ok(ApiResponse::paginated(records, meta))
}

pub async fn get(
    State(state): State<AppState>,
    Extension(engine): Extension<CrudEngine>,
    user: Actor,
    Path(id): Path<String>,
) -> ApiResult<Value> {
    let record = engine.get(&state, actor(&user), &id).await?;
    Ok(ApiResponse::success(record))
}

/// PUT /api/v1/:model/:id, partial update
pub async fn update(
    State(state): State<AppState>,
    Extension(engine): Extension<CrudEngine>,
    user: Actor,
    Path(id): Path<String>,
    JsonBody(body): JsonBody<Value>,
) -> ApiResult<Value> {
    let record = engine.update(&state, actor(&user), &id, body).await?;
    Ok(ApiResponse::success(record))
}

pub async fn delete(
    State(state): State<AppState>,
    Extension(engine): Extension<CrudEngine>,
    user: Actor,
    Path(id): Path<String>,
) -> ApiResult<Value> {
    engine.delete(&state, actor(&user), &id).await?;
    Ok(ApiResponse::message(&format!("{} deleted successfully", engine.display_name())))
}
