//! The built route table and the per-request entry point.

use std::fmt;

use http::header::{ALLOW, HeaderValue};
use http::StatusCode;

use crate::matcher::{MatchError, Matcher};
use crate::request::Request;
use crate::response::ResponseWriter;
use crate::route::{RouteInfo, Serve};

/// An immutable, built route table. Produced by
/// [`Router::build`](crate::Router::build); share it behind an `Arc`.
pub struct App {
    routes: Vec<Box<dyn Serve>>,
    matcher: Matcher,
}

impl App {
    pub(crate) fn new(routes: Vec<Box<dyn Serve>>, matcher: Matcher) -> Self {
        Self { routes, matcher }
    }

    /// Routes one request and runs the matched chain to completion.
    ///
    /// - no path matches → `404 Not Found`
    /// - the path matches but no route there accepts the method →
    ///   `405 Method Not Allowed` with an `Allow` header
    /// - otherwise the route's context is acquired, initialised, started,
    ///   finished and released, and its response returned
    ///
    /// Beyond those two statuses the dispatcher never touches the response.
    pub fn dispatch(&self, mut request: Request) -> ResponseWriter {
        match self.matcher.find(request.method(), request.path()) {
            Ok(matched) => {
                request.set_params(matched.params);
                self.routes[matched.route].serve(request)
            }
            Err(MatchError::NotFound) => {
                let mut res = ResponseWriter::new();
                res.write_header(StatusCode::NOT_FOUND);
                res
            }
            Err(MatchError::MethodNotAllowed { allow }) => {
                let mut res = ResponseWriter::new();
                if let Ok(value) = HeaderValue::from_str(&allow.to_string()) {
                    res.set_header(ALLOW, value);
                }
                res.write_header(StatusCode::METHOD_NOT_ALLOWED);
                res
            }
        }
    }

    /// Every route, in registration order.
    pub fn routes(&self) -> impl Iterator<Item = &RouteInfo> {
        self.routes.iter().map(|r| r.info())
    }

    pub fn route(&self, name: &str) -> Option<&RouteInfo> {
        self.routes().find(|r| r.name == name)
    }
}

impl fmt::Debug for App {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("App")
            .field("routes", &self.routes().collect::<Vec<_>>())
            .finish_non_exhaustive()
    }
}
