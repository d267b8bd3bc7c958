use axum::extract::{Path, State};

use crate::error::ApiError;
use crate::middleware::{ApiResponse, ApiResult};
use crate::registry::ModelDefinition;
use crate::state::AppState;

/// GET /api/v1/schema - every registered model in registration order
pub async fn schema_list(State(state): State<AppState>) -> ApiResult<Vec<ModelDefinition>> {
    Ok(ApiResponse::success(state.registry.get_models()))
}

/// GET /api/v1/schema/:model
pub async fn schema_get(State(state): State<AppState>, Path(model): Path<String>) -> ApiResult<ModelDefinition> {
    state
        .registry
        .get_model(&model)
        .map(ApiResponse::success)
        .ok_or_else(|| ApiError::not_found(format!("Model '{}' not found", model)))
}
