//! Outer/inner classification of one entity's shrink intervals.
//!
//! An interval is **inner** if some other interval of the same entity
//! contains its date span (inclusive on both ends), and **outer** otherwise.
//! Every outer interval opens a new group; an inner interval joins the group
//! of its chosen container.
//!
//! Intervals are sorted by `(start asc, end desc, input order)`, so every
//! container of an interval sorts before it. A running maximum of end dates
//! then locates the first container with a binary search (O(n log n)).
//!
//! Container choice when several qualify: earliest start, then tightest end,
//! then earliest input position. Exact duplicates therefore resolve to the
//! first one in input order being the container.

use chrono::NaiveDate;

use dendro_core::{ClassifiedEvent, EventRole, RawInterval};

/// Classify intervals produced by a single scan pass (tagged as pass 0).
pub fn classify(intervals: Vec<RawInterval>) -> Vec<ClassifiedEvent> {
    classify_tagged(intervals.into_iter().map(|iv| (0, iv)).collect())
}

/// Classify `(pass, interval)` pairs of one entity, possibly coming from
/// several scan passes.
///
/// Output is in `(start asc, end desc, input order)` order. Group ids are
/// dense and start at 0, assigned in that order.
pub fn classify_tagged(intervals: Vec<(u32, RawInterval)>) -> Vec<ClassifiedEvent> {
    let mut entries: Vec<(usize, u32, RawInterval)> = intervals
        .into_iter()
        .enumerate()
        .map(|(input, (pass, iv))| (input, pass, iv))
        .collect();

    entries.sort_by(|a, b| {
        a.2.start_date
            .cmp(&b.2.start_date)
            .then_with(|| b.2.end_date.cmp(&a.2.end_date))
            .then_with(|| a.0.cmp(&b.0))
    });

    let n = entries.len();
    // prefix_max_end[k] = max end_date over entries[..=k]; non-decreasing.
    let mut prefix_max_end: Vec<NaiveDate> = Vec::with_capacity(n);
    let mut assigned: Vec<(EventRole, u32)> = Vec::with_capacity(n);
    let mut next_group = 0u32;

    for pos in 0..n {
        let target = &entries[pos].2;

        // Every earlier entry starts no later than `target`, so it contains
        // `target` exactly when its end reaches `target.end_date`.
        let first = prefix_max_end.partition_point(|&end| end < target.end_date);

        let slot = if first == pos {
            let group = next_group;
            next_group += 1;
            (EventRole::Outer, group)
        } else {
            let container = first + tightest_container(&entries[first..pos], target.end_date);
            (EventRole::Inner, assigned[container].1)
        };
        assigned.push(slot);

        let max_end = prefix_max_end
            .last()
            .map_or(target.end_date, |&end| end.max(target.end_date));
        prefix_max_end.push(max_end);
    }

    entries
        .into_iter()
        .zip(assigned)
        .map(|((_, pass, interval), (role, group_id))| ClassifiedEvent {
            interval,
            pass,
            role,
            group_id,
        })
        .collect()
}

/// Offset into `candidates` of the chosen container.
///
/// `candidates[0]` is a known container with the earliest start. Among the
/// entries sharing that start (sorted by end desc, then input order), pick
/// the one with the smallest end still covering `end`.
fn tightest_container(candidates: &[(usize, u32, RawInterval)], end: NaiveDate) -> usize {
    let start = candidates[0].2.start_date;
    let block_len = candidates.partition_point(|e| e.2.start_date == start);
    let block = &candidates[..block_len];

    let covering = block.partition_point(|e| e.2.end_date >= end);
    let tightest_end = block[covering - 1].2.end_date;
    block[..covering].partition_point(|e| e.2.end_date > tightest_end)
}
