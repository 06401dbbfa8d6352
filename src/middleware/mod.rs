//! Built-in middleware.
//!
//! Every built-in is written against `&mut dyn Context`, so it fits routes
//! of any context type. None of them is installed implicitly: pass
//! [`defaults()`] (or [`Config::middleware`](crate::Config::middleware)) to
//! [`Router::with_middleware`](crate::Router::with_middleware), or register
//! them one by one.
//!
//! - [`recover`]: turns a panic further down the chain into a logged `500`
//! - [`access_log`]: one `info!` line per request with status and latency
//! - [`cors`]: CORS response headers, and answers `OPTIONS` with `204`

mod access_log;
mod cors;
mod recover;

pub use access_log::access_log;
pub use cors::{CorsConfig, cors};
pub use recover::recover;

use crate::handler::Middleware;

/// `[recover, access_log, cors]` with the default CORS settings. Order
/// matters: `recover` must come first to catch panics from everything after
/// it.
pub fn defaults() -> Vec<Middleware> {
    vec![recover(), access_log(), cors(CorsConfig::default())]
}
