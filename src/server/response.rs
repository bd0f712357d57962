//! Response types and codec for the range-query JSON API.
//!
//! The wire format is the query endpoint's envelope:
//!
//! ```json
//! {
//!   "status": "success",
//!   "data": {
//!     "resultType": "matrix",
//!     "result": [{"metric": {...}, "values": [[1536763606.651, "137"], ...]}]
//!   }
//! }
//! ```
//!
//! Sample timestamps are float epoch seconds on the wire and integer
//! milliseconds in memory. The `result` payload is held as raw JSON until
//! `resultType` is known, then decoded into the matching variant.

use std::collections::HashMap;

use serde::ser::{SerializeMap, SerializeTuple};
use serde::{Deserialize, Serialize, Serializer};
use serde_json::value::RawValue;

use crate::error::{Error, Result};

/// One sample: a millisecond timestamp and a value.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SamplePair {
    pub timestamp_ms: i64,
    pub value: f64,
}

impl SamplePair {
    pub fn new(timestamp_ms: i64, value: f64) -> Self {
        Self {
            timestamp_ms,
            value,
        }
    }
}

impl Serialize for SamplePair {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut pair = serializer.serialize_tuple(2)?;
        pair.serialize_element(&(self.timestamp_ms as f64 / 1.0e3))?;
        pair.serialize_element(&format_sample_value(self.value))?;
        pair.end()
    }
}

impl<'de> Deserialize<'de> for SamplePair {
    fn deserialize<D: serde::Deserializer<'de>>(
        deserializer: D,
    ) -> std::result::Result<Self, D::Error> {
        let (seconds, value) = <(f64, String)>::deserialize(deserializer)?;
        let value = value
            .parse::<f64>()
            .map_err(|_| serde::de::Error::custom(format!("invalid sample value {:?}", value)))?;
        Ok(SamplePair {
            timestamp_ms: (seconds * 1000.0).round() as i64,
            value,
        })
    }
}

/// Values are strings on the wire. Rust's shortest float form is kept except
/// for the non-finite spellings, which follow the query endpoint.
fn format_sample_value(value: f64) -> String {
    if value.is_nan() {
        "NaN".to_string()
    } else if value == f64::INFINITY {
        "+Inf".to_string()
    } else if value == f64::NEG_INFINITY {
        "-Inf".to_string()
    } else {
        format!("{}", value)
    }
}

/// One series of an instantaneous vector result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VectorSeries {
    pub metric: HashMap<String, String>,
    pub value: SamplePair,
}

/// One series of a matrix result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatrixSeries {
    pub metric: HashMap<String, String>,
    pub values: Vec<SamplePair>,
}

/// The result payload, tagged by the wire `resultType`.
#[derive(Debug, Clone, PartialEq)]
pub enum ResultData {
    Vector(Vec<VectorSeries>),
    Matrix(Vec<MatrixSeries>),
}

impl ResultData {
    /// The wire discriminator for this variant.
    pub fn result_type(&self) -> &'static str {
        match self {
            ResultData::Vector(_) => "vector",
            ResultData::Matrix(_) => "matrix",
        }
    }

    pub fn is_empty(&self) -> bool {
        match self {
            ResultData::Vector(series) => series.is_empty(),
            ResultData::Matrix(series) => series.is_empty(),
        }
    }
}

/// The `data` field of a range-query response.
///
/// `stats` is an opaque statistics blob some backends attach; it is carried
/// through single responses untouched and never interpreted.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryRangeResult {
    pub result: ResultData,
    pub stats: Option<serde_json::Value>,
}

impl QueryRangeResult {
    pub fn new(result: ResultData) -> Self {
        Self {
            result,
            stats: None,
        }
    }
}

impl Serialize for QueryRangeResult {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let fields = 2 + usize::from(self.stats.is_some());
        let mut map = serializer.serialize_map(Some(fields))?;
        map.serialize_entry("resultType", self.result.result_type())?;
        if let Some(stats) = &self.stats {
            map.serialize_entry("stats", stats)?;
        }
        match &self.result {
            ResultData::Vector(series) => map.serialize_entry("result", series)?,
            ResultData::Matrix(series) => map.serialize_entry("result", series)?,
        }
        map.end()
    }
}

/// The response envelope of the range-query endpoint.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QueryRangeResponse {
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<QueryRangeResult>,
    #[serde(rename = "errorType", skip_serializing_if = "Option::is_none")]
    pub error_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl QueryRangeResponse {
    pub fn success(result: QueryRangeResult) -> Self {
        Self {
            status: "success".to_string(),
            data: Some(result),
            error_type: None,
            error: None,
        }
    }
}

/// Decode a response body into the envelope.
///
/// The `data.result` payload is kept as raw JSON until `data.resultType` is
/// known; an unrecognized type is a hard error rather than a skipped field.
pub fn decode(body: &[u8]) -> Result<QueryRangeResponse> {
    #[derive(Deserialize)]
    struct RawEnvelope {
        status: String,
        #[serde(default)]
        data: Option<Box<RawValue>>,
        #[serde(rename = "errorType", default)]
        error_type: Option<String>,
        #[serde(default)]
        error: Option<String>,
    }

    let raw: RawEnvelope =
        serde_json::from_slice(body).map_err(|e| Error::Decode(e.to_string()))?;
    let data = match raw.data {
        Some(data) => Some(decode_result(data.get())?),
        None => None,
    };

    Ok(QueryRangeResponse {
        status: raw.status,
        data,
        error_type: raw.error_type,
        error: raw.error,
    })
}

fn decode_result(json: &str) -> Result<QueryRangeResult> {
    #[derive(Deserialize)]
    struct RawResult {
        #[serde(rename = "resultType")]
        result_type: String,
        #[serde(default)]
        stats: Option<serde_json::Value>,
        result: Box<RawValue>,
    }

    let raw: RawResult = serde_json::from_str(json).map_err(|e| Error::Decode(e.to_string()))?;
    let result = match raw.result_type.as_str() {
        "vector" => ResultData::Vector(
            serde_json::from_str(raw.result.get()).map_err(|e| Error::Decode(e.to_string()))?,
        ),
        "matrix" => ResultData::Matrix(
            serde_json::from_str(raw.result.get()).map_err(|e| Error::Decode(e.to_string()))?,
        ),
        other => return Err(Error::UnexpectedValueType(other.to_string())),
    };

    Ok(QueryRangeResult {
        result,
        stats: raw.stats,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn labels(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(name, value)| (name.to_string(), value.to_string()))
            .collect()
    }

    #[test]
    fn should_decode_matrix_body_to_millisecond_samples() {
        // given
        let body = br#"{"status":"success","data":{"resultType":"matrix","result":[{"metric":{},"values":[[1536763606.651,"137"],[1536763607.651,"137"]]}]}}"#;

        // when
        let response = decode(body).unwrap();

        // then
        assert_eq!(response.status, "success");
        let data = response.data.unwrap();
        assert_eq!(
            data.result,
            ResultData::Matrix(vec![MatrixSeries {
                metric: HashMap::new(),
                values: vec![
                    SamplePair::new(1_536_763_606_651, 137.0),
                    SamplePair::new(1_536_763_607_651, 137.0),
                ],
            }])
        );
        assert!(data.stats.is_none());
    }

    #[test]
    fn should_decode_vector_body() {
        // given
        let body = br#"{"status":"success","data":{"resultType":"vector","result":[{"metric":{"job":"node"},"value":[1536763606.651,"1"]}]}}"#;

        // when
        let response = decode(body).unwrap();

        // then
        assert_eq!(
            response.data.unwrap().result,
            ResultData::Vector(vec![VectorSeries {
                metric: labels(&[("job", "node")]),
                value: SamplePair::new(1_536_763_606_651, 1.0),
            }])
        );
    }

    #[test]
    fn should_reject_unknown_result_type() {
        // given
        let body = br#"{"status":"success","data":{"resultType":"scalar","result":[1,"2"]}}"#;

        // when
        let err = decode(body).unwrap_err();

        // then
        assert_eq!(err.to_string(), "unexpected value type \"scalar\"");
    }

    #[test]
    fn should_decode_error_envelope_without_data() {
        // given
        let body = br#"{"status":"error","errorType":"bad_data","error":"invalid query"}"#;

        // when
        let response = decode(body).unwrap();

        // then
        assert_eq!(response.status, "error");
        assert!(response.data.is_none());
        assert_eq!(response.error_type.as_deref(), Some("bad_data"));
        assert_eq!(response.error.as_deref(), Some("invalid query"));
    }

    #[test]
    fn should_round_trip_matrix_response() {
        // given
        let response = QueryRangeResponse::success(QueryRangeResult::new(ResultData::Matrix(
            vec![MatrixSeries {
                metric: labels(&[("__name__", "up"), ("job", "node")]),
                values: vec![
                    SamplePair::new(1_536_763_606_651, 137.0),
                    SamplePair::new(1_536_763_621_651, 138.5),
                ],
            }],
        )));

        // when
        let body = serde_json::to_vec(&response).unwrap();
        let decoded = decode(&body).unwrap();

        // then
        assert_eq!(decoded, response);
    }

    #[test]
    fn should_round_trip_vector_response() {
        // given
        let response = QueryRangeResponse::success(QueryRangeResult::new(ResultData::Vector(
            vec![VectorSeries {
                metric: labels(&[("instance", "localhost:9090")]),
                value: SamplePair::new(1_536_763_606_000, 0.5),
            }],
        )));

        // when
        let body = serde_json::to_vec(&response).unwrap();
        let decoded = decode(&body).unwrap();

        // then
        assert_eq!(decoded, response);
    }

    #[test]
    fn should_preserve_stats_through_decode() {
        // given
        let body = br#"{"status":"success","data":{"resultType":"vector","stats":{"timings":{"evalTotalTime":0.1}},"result":[]}}"#;

        // when
        let data = decode(body).unwrap().data.unwrap();

        // then
        assert_eq!(
            data.stats,
            Some(serde_json::json!({"timings": {"evalTotalTime": 0.1}}))
        );
    }

    #[test]
    fn should_serialize_timestamps_as_float_seconds() {
        // given
        let sample = SamplePair::new(1_536_763_606_651, 137.0);

        // when
        let json = serde_json::to_string(&sample).unwrap();

        // then
        assert_eq!(json, r#"[1536763606.651,"137"]"#);
    }

    #[test]
    fn should_spell_non_finite_values_like_the_query_endpoint() {
        // given/when/then
        assert_eq!(format_sample_value(f64::INFINITY), "+Inf");
        assert_eq!(format_sample_value(f64::NEG_INFINITY), "-Inf");
        assert_eq!(format_sample_value(f64::NAN), "NaN");
        assert_eq!(format_sample_value(137.0), "137");
        assert_eq!(format_sample_value(138.5), "138.5");
    }

    #[test]
    fn should_reject_malformed_body() {
        // given/when
        let err = decode(b"not json").unwrap_err();

        // then
        assert!(matches!(err, Error::Decode(_)));
    }
}
