//! Function execution endpoints.

use axum::{
    Json, Router,
    body::Bytes,
    extract::{Path, State, rejection::JsonRejection},
    routing::{get, post},
};
use serde_json::{Map, Value};

use crate::error::AppError;
use crate::functions::{FunctionCall, FunctionDefinition, FunctionResponse, all_functions};
use crate::state::AppState;

/// Build the functions router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/functions", get(list_functions).post(call_function))
        .route("/api/functions/{name}", post(call_named_function))
}

/// Definitions of every callable function.
pub async fn list_functions() -> Json<Vec<FunctionDefinition>> {
    Json(all_functions())
}

/// Execute an `{operation, arguments}` call.
///
/// # Errors
///
/// Returns `AppError::BadRequest` for a malformed body and
/// `AppError::Dispatch` (404) for an unknown operation.
pub async fn call_function(
    State(state): State<AppState>,
    body: Result<Json<FunctionCall>, JsonRejection>,
) -> Result<Json<FunctionResponse>, AppError> {
    let Json(call) = body.map_err(|e| AppError::BadRequest(e.body_text()))?;
    let response = state.dispatcher().dispatch(&call).await?;
    Ok(Json(response))
}

/// Execute a function by path name; the body holds the arguments.
///
/// An empty body means no arguments.
///
/// # Errors
///
/// Returns `AppError::BadRequest` for a body that is not JSON and
/// `AppError::Dispatch` (404) for an unknown name.
pub async fn call_named_function(
    State(state): State<AppState>,
    Path(name): Path<String>,
    body: Bytes,
) -> Result<Json<FunctionResponse>, AppError> {
    let arguments = if body.iter().all(u8::is_ascii_whitespace) {
        Value::Object(Map::new())
    } else {
        serde_json::from_slice(&body).map_err(|e| AppError::BadRequest(e.to_string()))?
    };
    let response = state.dispatcher().execute(&name, &arguments).await?;
    Ok(Json(response))
}
