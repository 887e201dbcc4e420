use std::cmp::Reverse;
use std::collections::HashMap;

use crate::models::{RankAssignment, RatedEntry};

/// Orders entries by rating descending, then by id ascending
pub fn sort_by_standing(entries: &mut [RatedEntry]) {
    entries.sort_by_key(|e| (Reverse(e.rating), e.id));
}

/// Derives dense 1-based ranks for one owner's entries
///
/// The input order does not matter. Equal ratings are separated by id, so
/// every entry receives a distinct rank and the result is the same however
/// many times it is computed.
pub fn recompute_ranks(entries: &[RatedEntry]) -> Vec<RankAssignment> {
    let mut order: Vec<(Reverse<i32>, i64)> =
        entries.iter().map(|e| (Reverse(e.rating), e.id)).collect();
    order.sort_unstable();

    order
        .into_iter()
        .enumerate()
        .map(|(position, (_, id))| RankAssignment {
            id,
            rank: position as i32 + 1,
        })
        .collect()
}

/// Assignments whose rank differs from what the entries currently store
pub fn changed_ranks(entries: &[RatedEntry], assignments: &[RankAssignment]) -> Vec<RankAssignment> {
    let stored: HashMap<i64, Option<i32>> = entries.iter().map(|e| (e.id, e.rank)).collect();

    assignments
        .iter()
        .filter(|a| stored.get(&a.id).copied().flatten() != Some(a.rank))
        .copied()
        .collect()
}

/// True when the stored ranks already match a fresh recomputation
pub fn ranks_consistent(entries: &[RatedEntry]) -> bool {
    changed_ranks(entries, &recompute_ranks(entries)).is_empty()
}

/// Writes assignments into the in-memory entries and sorts them by standing
pub fn apply_assignments(entries: &mut [RatedEntry], assignments: &[RankAssignment]) {
    let ranks: HashMap<i64, i32> = assignments.iter().map(|a| (a.id, a.rank)).collect();
    for entry in entries.iter_mut() {
        entry.rank = ranks.get(&entry.id).copied();
    }
    sort_by_standing(entries);
}
