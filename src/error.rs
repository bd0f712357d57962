//! Error types for the query frontend.

/// Error type for frontend operations.
///
/// The parse and validation variants render the exact messages of the
/// upstream query API so that clients see no difference between talking to
/// the frontend and talking to the query endpoint directly.
#[derive(Debug, Clone, PartialEq)]
pub enum Error {
    /// A `start` or `end` value that is neither a float epoch timestamp nor
    /// an RFC 3339 instant. Carries the offending literal.
    InvalidTimestamp(String),

    /// A `step` value that is neither a float second count nor a duration
    /// literal such as `15s` or `1h`.
    InvalidDuration(String),

    /// A `step` value whose millisecond count does not fit in an i64.
    DurationOverflow(String),

    /// `end` precedes `start`.
    EndBeforeStart,

    /// Zero or negative `step`.
    NonPositiveStep,

    /// The requested range would produce more points per series than the
    /// query endpoint allows.
    TooManyPoints,

    /// A JSON `resultType` other than `vector` or `matrix`.
    UnexpectedValueType(String),

    /// Sub-responses with mismatched result types at merge time.
    UnexpectedResponseType,

    /// Malformed JSON from the downstream.
    Decode(String),

    /// The downstream failed a sub-query. Carries the downstream HTTP status
    /// when the failure was an HTTP error response.
    Downstream {
        status: Option<u16>,
        message: String,
    },

    /// The sub-query was abandoned before it completed, either because a
    /// peer failed or because the caller gave up on the whole query.
    Cancelled,
}

impl std::error::Error for Error {}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::InvalidTimestamp(value) => {
                write!(f, "cannot parse {:?} to a valid timestamp", value)
            }
            Error::InvalidDuration(value) => {
                write!(f, "cannot parse {:?} to a valid duration", value)
            }
            Error::DurationOverflow(value) => {
                write!(
                    f,
                    "cannot parse {:?} to a valid duration. It overflows int64",
                    value
                )
            }
            Error::EndBeforeStart => {
                write!(f, "end timestamp must not be before start time")
            }
            Error::NonPositiveStep => {
                write!(
                    f,
                    "zero or negative query resolution step widths are not accepted. Try a positive integer"
                )
            }
            Error::TooManyPoints => {
                write!(
                    f,
                    "exceeded maximum resolution of 11,000 points per timeseries. Try decreasing the query resolution (?step=XX)"
                )
            }
            Error::UnexpectedValueType(value_type) => {
                write!(f, "unexpected value type {:?}", value_type)
            }
            Error::UnexpectedResponseType => write!(f, "unexpected response type"),
            Error::Decode(msg) => write!(f, "invalid downstream response: {}", msg),
            Error::Downstream {
                status: Some(status),
                message,
            } => {
                write!(f, "downstream request failed with status {}: {}", status, message)
            }
            Error::Downstream {
                status: None,
                message,
            } => write!(f, "downstream request failed: {}", message),
            Error::Cancelled => write!(f, "query was cancelled"),
        }
    }
}

/// Result type alias for frontend operations.
pub type Result<T> = std::result::Result<T, Error>;
