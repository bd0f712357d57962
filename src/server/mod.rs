//! HTTP surface of the query frontend: request/response codecs, route
//! handlers, middleware, and the server itself.

mod error;
mod handlers;
mod http;
mod metrics;
mod middleware;
pub mod request;
pub mod response;

pub use self::handlers::AppState;
pub use self::http::{router, FrontendServer};
pub use self::metrics::Metrics;
