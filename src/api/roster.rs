//! Roster API endpoints.

use axum::{
    extract::{Path, Query, State},
    http::HeaderMap,
    Json,
};
use serde::Deserialize;

use super::{ok, reply, ApiResult};
use crate::auth::secret_from_headers;
use crate::errors::AppError;
use crate::models::{
    AddRecordRequest, AddRecordResponse, CycleStatusResponse, RecordId, RosterRecord, SortOrder,
};
use crate::roster::filter_and_sort;
use crate::AppState;

/// Query parameters for listing records.
#[derive(Debug, Deserialize)]
pub struct ListParams {
    #[serde(default)]
    pub q: String,
    #[serde(default)]
    pub order: SortOrder,
}

/// GET /api/roster - Filtered and sorted records.
pub async fn list_records(
    State(state): State<AppState>,
    Query(params): Query<ListParams>,
) -> ApiResult<Vec<RosterRecord>> {
    let snapshot = state.store.current();
    let records = filter_and_sort(&snapshot, &params.q, params.order)
        .into_iter()
        .cloned()
        .collect();

    ok(records, snapshot.revision)
}

/// GET /api/roster/:id - Get a single record from the mirror.
pub async fn get_record(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<RosterRecord> {
    let snapshot = state.store.current();

    let found = snapshot
        .get(&RecordId::from(id.as_str()))
        .cloned()
        .ok_or_else(|| AppError::NotFound(format!("Record {} not found", id)));

    reply(found, snapshot.revision)
}

/// POST /api/roster - Add a checked-in record.
pub async fn add_record(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(request): Json<AddRecordRequest>,
) -> ApiResult<AddRecordResponse> {
    let secret = secret_from_headers(&headers);

    let outcome = state
        .store
        .add_record(&request.label, &request.note, &secret)
        .await
        .map(|id| AddRecordResponse { id });

    reply(outcome, state.store.current().revision)
}

/// POST /api/roster/:id/cycle - Advance a record's status.
pub async fn cycle_status(
    State(state): State<AppState>,
    Path(id): Path<String>,
    headers: HeaderMap,
) -> ApiResult<CycleStatusResponse> {
    let secret = secret_from_headers(&headers);
    let id = RecordId::from(id);

    let outcome = state
        .store
        .cycle_status(&id, &secret)
        .await
        .map(|status| CycleStatusResponse { id, status });

    reply(outcome, state.store.current().revision)
}

/// DELETE /api/roster/:id - Delete a record.
pub async fn delete_record(
    State(state): State<AppState>,
    Path(id): Path<String>,
    headers: HeaderMap,
) -> ApiResult<()> {
    let secret = secret_from_headers(&headers);

    let outcome = state
        .store
        .delete_record(&RecordId::from(id), &secret)
        .await;

    reply(outcome, state.store.current().revision)
}
