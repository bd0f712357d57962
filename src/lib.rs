//! Query frontend - a day-splitting middleware for a metrics read path.
//!
//! A range query spanning many days is expensive to serve as one request:
//! it cannot be cached (every tick moves the window), and it cannot be
//! parallelised across the store's daily partitions. The frontend sits in
//! front of the query endpoint and rewrites each incoming range query into
//! per-day sub-queries aligned to the evaluation step, executes them
//! concurrently, and merges the results into a response indistinguishable
//! from an unsplit query.
//!
//! # Architecture
//!
//! - [`server::request`] / [`server::response`]: the wire codecs. Requests
//!   parse into [`server::request::RangeQuery`] (integer milliseconds
//!   internally) and re-emit byte-stably; responses carry the query API's
//!   JSON envelope with a `resultType`-tagged vector/matrix payload.
//! - [`split`]: the pure day-boundary splitter.
//! - [`frontend`]: [`SplitByDay`], the fan-out executor. One task per
//!   sub-query, first error cancels the rest.
//! - [`merge`]: the pure merger, concatenating vectors and stitching matrix
//!   series back together by label set.
//! - [`downstream`]: the [`QueryRange`] transport trait and its HTTP
//!   implementation.
//! - [`server`]: the axum server wiring it all up, with passthrough for
//!   every path that is not a range query.

pub mod config;
pub mod downstream;
pub mod error;
pub mod frontend;
pub mod merge;
pub mod server;
pub mod split;

pub use config::{CliArgs, FrontendConfig};
pub use downstream::{HttpDownstream, QueryRange};
pub use error::{Error, Result};
pub use frontend::SplitByDay;
pub use server::FrontendServer;
