//! Day-aligned splitting of range queries.
//!
//! The storage behind the query endpoint is partitioned by UTC day, so a
//! query confined to one day hits one partition and caches well. Splitting
//! rewrites a multi-day query into per-day queries whose bounds stay aligned
//! to the evaluation step, so that the merged result evaluates exactly the
//! same instants as the original query.

use crate::server::request::RangeQuery;

/// Milliseconds in one UTC day, the storage partition width.
pub const MILLIS_PER_DAY: i64 = 24 * 60 * 60 * 1000;

/// Split a range query at UTC day boundaries.
///
/// Sub-queries keep the parent's path, step, and expression, are ordered by
/// start ascending, and cover the parent range with no instant evaluated
/// twice: each sub-query ends at the last step-aligned instant before the
/// next day boundary, and the next one starts one step later.
pub fn split_by_day(query: &RangeQuery) -> Vec<RangeQuery> {
    if query.start == query.end {
        // A zero-length range still evaluates one instant.
        return vec![query.clone()];
    }

    let mut subqueries = Vec::new();
    let mut start = query.start;
    while start < query.end {
        let boundary = next_day_boundary(start, query.step);
        let end = if boundary + query.step >= query.end {
            query.end
        } else {
            boundary
        };
        subqueries.push(RangeQuery {
            start,
            end,
            ..query.clone()
        });
        start = boundary + query.step;
    }
    subqueries
}

/// The latest step-aligned instant strictly before the next UTC day
/// boundary after `t`.
pub(crate) fn next_day_boundary(t: i64, step: i64) -> i64 {
    let offset = step - (t % MILLIS_PER_DAY % step);
    ((t / MILLIS_PER_DAY) + 1) * MILLIS_PER_DAY - offset
}
