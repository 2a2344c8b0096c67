//! CSV import endpoints for the discovery-call knowledge base.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::routing::{delete, get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use parrita_core::import::import_discovery_calls;
use parrita_core::model::ImportBatchSummary;

use crate::error::ApiError;
use crate::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/v1/import", post(import))
        .route("/api/v1/import/batches", get(list_batches))
        .route("/api/v1/import/batches/{batch_id}", delete(delete_batch))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportRequest {
    #[serde(default)]
    pub csv_data: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ImportResponse {
    pub success: bool,
    pub imported: usize,
    pub errors: usize,
    pub message: String,
    pub batch_id: Uuid,
}

/// `POST /api/v1/import` — upload one CSV blob as a new batch.
async fn import(
    State(state): State<Arc<AppState>>,
    Json(req): Json<ImportRequest>,
) -> Result<Json<ImportResponse>, ApiError> {
    let csv_data = req
        .csv_data
        .filter(|s| !s.is_empty())
        .ok_or_else(|| ApiError::bad_request("csvData is required"))?;

    let summary = import_discovery_calls(&state.storage, &csv_data).await?;

    Ok(Json(ImportResponse {
        success: true,
        message: format!("Successfully imported {} discovery calls", summary.imported),
        imported: summary.imported,
        errors: summary.errors,
        batch_id: summary.batch_id,
    }))
}

/// `GET /api/v1/import/batches` — derived per-batch summaries.
async fn list_batches(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<ImportBatchSummary>>, ApiError> {
    Ok(Json(state.storage.list_import_batches().await?))
}

#[derive(Debug, Serialize)]
pub struct DeleteBatchResponse {
    pub batch_id: Uuid,
    pub deleted: usize,
}

/// `DELETE /api/v1/import/batches/{batch_id}` — drop a whole batch, e.g.
/// after a partially-failed import.
async fn delete_batch(
    State(state): State<Arc<AppState>>,
    Path(batch_id): Path<Uuid>,
) -> Result<Json<DeleteBatchResponse>, ApiError> {
    let deleted = state.storage.delete_import_batch(batch_id).await?;
    Ok(Json(DeleteBatchResponse { batch_id, deleted }))
}
