//! REST API module.
//!
//! Every reply is stamped with the mirror revision it was produced against,
//! so the board can tell a fresh answer from one that predates its last write.

mod connection;
mod roster;

pub use connection::*;
pub use roster::*;

use axum::{
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

use crate::errors::{AppError, AppErrorWithRevision};

/// Success envelope.
#[derive(Debug, Serialize)]
pub struct Envelope<T: Serialize> {
    pub success: bool,
    pub data: T,
    pub revision: i64,
}

impl<T: Serialize> IntoResponse for Envelope<T> {
    fn into_response(self) -> Response {
        Json(self).into_response()
    }
}

pub type ApiResult<T> = Result<Envelope<T>, AppErrorWithRevision>;

/// Wrap data read from the mirror at `revision`.
pub fn ok<T: Serialize>(data: T, revision: i64) -> ApiResult<T> {
    Ok(Envelope {
        success: true,
        data,
        revision,
    })
}

/// Turn a store outcome into a reply stamped with `revision`.
pub fn reply<T, E>(outcome: Result<T, E>, revision: i64) -> ApiResult<T>
where
    T: Serialize,
    E: Into<AppError>,
{
    match outcome {
        Ok(data) => ok(data, revision),
        Err(e) => Err(AppErrorWithRevision {
            error: e.into(),
            revision,
        }),
    }
}
