//! Connection status endpoint.

use axum::extract::State;

use super::{ok, ApiResult};
use crate::models::ConnectionInfo;
use crate::AppState;

/// GET /api/connection - Subscription state of the roster mirror.
pub async fn get_connection(State(state): State<AppState>) -> ApiResult<ConnectionInfo> {
    let snapshot = state.store.current();

    let info = ConnectionInfo {
        collection: state.config.collection.clone(),
        status: state.store.connection(),
        revision: snapshot.revision,
        generated_at: snapshot.generated_at.clone(),
        record_count: snapshot.len(),
        pending: snapshot.pending.iter().cloned().collect(),
    };

    ok(info, snapshot.revision)
}
