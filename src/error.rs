//! Unified error type.

use thiserror::Error;

/// The error type returned by zapi's fallible operations.
///
/// Application-level failures (404, 405, 500) are expressed as HTTP
/// responses, not as `Error`s. This type surfaces configuration mistakes
/// caught by [`Router::build`](crate::Router::build) and infrastructure
/// failures in the [`Server`](crate::Server).
#[derive(Debug, Error)]
pub enum Error {
    /// Binding to a port or accepting a connection failed.
    #[error("io: {0}")]
    Io(#[from] std::io::Error),

    /// A route was registered without a terminal handler.
    #[error("route `{route}` has no handler")]
    MissingHandler { route: String },

    /// Two routes share a name.
    #[error("duplicate route name `{name}`")]
    DuplicateName { name: String },

    /// Two routes accept the same method on the same full path.
    /// `method` is `*` when one side declared no methods.
    #[error("duplicate route `{method} {path}`")]
    DuplicateRoute { path: String, method: String },

    /// A prefix middleware was written for a different context type than
    /// the route it applies to.
    #[error("route `{route}` uses context `{expected}` but a middleware expects `{found}`")]
    IncompatibleHandler {
        route: String,
        expected: &'static str,
        found: &'static str,
    },

    /// The matcher rejected a route pattern.
    #[error("invalid route path `{path}`: {source}")]
    InvalidPath {
        path: String,
        #[source]
        source: matchit::InsertError,
    },

    #[error("config: {0}")]
    Config(#[from] toml::de::Error),

    /// In-flight requests did not drain within the shutdown grace period.
    #[error("shutdown timed out with {in_flight} connection(s) still open")]
    ShutdownTimeout { in_flight: usize },
}
