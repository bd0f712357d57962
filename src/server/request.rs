//! Request types and codec for the range-query endpoint.
//!
//! Timestamps are integer milliseconds since the Unix epoch internally and
//! float epoch seconds (or RFC 3339) on the wire. The parse/emit pair is
//! byte-stable: a query string produced by [`RangeQuery::to_uri`] parses back
//! to an identical [`RangeQuery`].

use serde::Deserialize;

use crate::error::{Error, Result};

/// Cap on `(end - start) / step`, matching the query endpoint. Generous
/// enough for 60s resolution over a week or 1h resolution over a year.
pub const MAX_POINTS_PER_SERIES: i64 = 11_000;

/// Raw query-string parameters of a range query, before validation.
///
/// All fields default to empty so that a missing parameter reports the same
/// parse error as an unparseable one.
#[derive(Debug, Default, Deserialize)]
pub struct RangeParams {
    #[serde(default)]
    pub start: String,
    #[serde(default)]
    pub end: String,
    #[serde(default)]
    pub step: String,
    #[serde(default)]
    pub query: String,
}

/// A validated range query.
///
/// The expression in `query` is opaque to the frontend; it is carried
/// verbatim to the downstream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RangeQuery {
    /// Path of the endpoint the query was addressed to, kept so sub-queries
    /// hit the same downstream endpoint.
    pub path: String,
    /// Start of the range, milliseconds since epoch.
    pub start: i64,
    /// End of the range (inclusive evaluation bound), milliseconds since epoch.
    pub end: i64,
    /// Evaluation interval, milliseconds.
    pub step: i64,
    /// The query expression, never interpreted here.
    pub query: String,
}

impl RangeQuery {
    /// Validate raw parameters into a `RangeQuery`.
    ///
    /// Checks run in a fixed order so the reported error matches what the
    /// query endpoint itself would say for the same input.
    pub fn from_params(path: &str, params: &RangeParams) -> Result<RangeQuery> {
        let start = parse_time(&params.start)?;
        let end = parse_time(&params.end)?;
        if end < start {
            return Err(Error::EndBeforeStart);
        }

        let step = parse_step(&params.step)?;
        if step <= 0 {
            return Err(Error::NonPositiveStep);
        }

        if (end - start) / step > MAX_POINTS_PER_SERIES {
            return Err(Error::TooManyPoints);
        }

        Ok(RangeQuery {
            path: path.to_string(),
            start,
            end,
            step,
            query: params.query.clone(),
        })
    }

    /// Serialize back to a query string with parameters in `end, query,
    /// start, step` order, percent-encoded.
    pub fn to_query_string(&self) -> String {
        let params = [
            ("end", encode_time(self.end)),
            ("query", self.query.clone()),
            ("start", encode_time(self.start)),
            ("step", encode_step(self.step)),
        ];
        serde_urlencoded::to_string(&params[..])
            .expect("query string serialization cannot fail")
    }

    /// The full path-and-query form used to address the downstream.
    pub fn to_uri(&self) -> String {
        format!("{}?{}", self.path, self.to_query_string())
    }
}

/// Parse a timestamp that is either float epoch seconds or RFC 3339, to
/// milliseconds since epoch.
pub fn parse_time(s: &str) -> Result<i64> {
    if let Ok(t) = s.parse::<f64>() {
        let secs = t.trunc() as i64;
        let nanos = (t.fract() * 1e9) as i64;
        return Ok(secs * 1000 + nanos / 1_000_000);
    }
    if let Ok(t) = chrono::DateTime::parse_from_rfc3339(s) {
        return Ok(t.timestamp_millis());
    }
    Err(Error::InvalidTimestamp(s.to_string()))
}

/// Parse a step that is either float seconds or a duration literal
/// (`15s`, `5m`, `1h`, `1d`, `1w`, `1y`), to milliseconds.
pub fn parse_step(s: &str) -> Result<i64> {
    if let Ok(seconds) = s.parse::<f64>() {
        let millis = seconds * 1000.0;
        if !millis.is_finite() || millis >= i64::MAX as f64 || millis <= i64::MIN as f64 {
            return Err(Error::DurationOverflow(s.to_string()));
        }
        return Ok(millis as i64);
    }
    match promql_parser::util::parse_duration(s) {
        Ok(d) => i64::try_from(d.as_millis()).map_err(|_| Error::DurationOverflow(s.to_string())),
        Err(_) => Err(Error::InvalidDuration(s.to_string())),
    }
}

/// Encode milliseconds since epoch as float epoch seconds, using the
/// shortest decimal form that round-trips.
pub fn encode_time(millis: i64) -> String {
    format!("{}", millis as f64 / 1.0e3)
}

/// Encode a millisecond step as float seconds, shortest form.
pub fn encode_step(millis: i64) -> String {
    format!("{}", millis as f64 / 1.0e3)
}
