//! Data models for the check-in roster.
//!
//! Field names on the wire match the documents written by the mobile board.

mod record;
mod snapshot;

pub use record::*;
pub use snapshot::*;
