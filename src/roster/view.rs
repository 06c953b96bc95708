//! Filter and sort view over a roster snapshot.

use crate::models::{RosterRecord, RosterSnapshot, SortOrder};

/// Records whose label contains `query` (case-insensitive), ordered by label.
/// Equal labels fall back to id order so the result is deterministic.
pub fn filter_and_sort<'a>(
    snapshot: &'a RosterSnapshot,
    query: &str,
    order: SortOrder,
) -> Vec<&'a RosterRecord> {
    let needle = query.to_lowercase();

    let mut records: Vec<&RosterRecord> = snapshot
        .records
        .values()
        .filter(|r| needle.is_empty() || r.label.to_lowercase().contains(&needle))
        .collect();

    records.sort_by(|a, b| {
        let ordering = a.label.cmp(&b.label).then_with(|| a.id.cmp(&b.id));
        match order {
            SortOrder::Asc => ordering,
            SortOrder::Desc => ordering.reverse(),
        }
    });

    records
}
