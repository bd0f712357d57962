//! Merging of per-day sub-responses into one response.

use std::collections::btree_map::Entry;
use std::collections::BTreeMap;
use std::collections::HashMap;

use crate::error::{Error, Result};
use crate::server::request::RangeQuery;
use crate::server::response::{MatrixSeries, QueryRangeResult, ResultData};

/// A sub-query together with the downstream's result for it.
#[derive(Debug, Clone)]
pub struct SubResponse {
    pub query: RangeQuery,
    pub result: QueryRangeResult,
}

/// Merge sub-responses into one result, dispatching on the result type of
/// the earliest sub-response.
///
/// Responses are ordered by sub-query start first, so concatenation and
/// per-series appends preserve timestamp order; the splitter guarantees the
/// underlying ranges share no instant. All responses of one fan-out must
/// carry the same result type. Query statistics are not merged and are
/// dropped here.
pub fn merge(mut responses: Vec<SubResponse>) -> Result<QueryRangeResult> {
    responses.sort_by_key(|response| response.query.start);

    match responses.first() {
        Some(first) => match first.result.result {
            ResultData::Vector(_) => merge_vectors(responses),
            ResultData::Matrix(_) => merge_matrices(responses),
        },
        // The splitter always produces at least one sub-query.
        None => Err(Error::UnexpectedResponseType),
    }
}

fn merge_vectors(responses: Vec<SubResponse>) -> Result<QueryRangeResult> {
    let mut output = Vec::new();
    for response in responses {
        let ResultData::Vector(series) = response.result.result else {
            return Err(Error::UnexpectedResponseType);
        };
        output.extend(series);
    }
    Ok(QueryRangeResult::new(ResultData::Vector(output)))
}

fn merge_matrices(responses: Vec<SubResponse>) -> Result<QueryRangeResult> {
    // Series are matched across sub-responses by their label set. A series
    // missing from some sub-responses keeps the samples of those it appears
    // in; the result has gaps but stays monotonic.
    let mut output: BTreeMap<String, MatrixSeries> = BTreeMap::new();
    for response in responses {
        let ResultData::Matrix(series_list) = response.result.result else {
            return Err(Error::UnexpectedResponseType);
        };
        for series in series_list {
            match output.entry(canonical_labels(&series.metric)) {
                Entry::Vacant(entry) => {
                    entry.insert(series);
                }
                Entry::Occupied(mut entry) => {
                    entry.get_mut().values.extend(series.values);
                }
            }
        }
    }
    Ok(QueryRangeResult::new(ResultData::Matrix(
        output.into_values().collect(),
    )))
}

/// Stable string form of a label set: labels sorted by name, values quoted
/// so that no two distinct sets collide.
fn canonical_labels(metric: &HashMap<String, String>) -> String {
    let mut labels: Vec<(&str, &str)> = metric
        .iter()
        .map(|(name, value)| (name.as_str(), value.as_str()))
        .collect();
    labels.sort_unstable();
    let mut key = String::new();
    for (name, value) in labels {
        key.push_str(name);
        key.push('=');
        key.push_str(&format!("{:?}", value));
        key.push(',');
    }
    key
}
