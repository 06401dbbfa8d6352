//! # zapi
//!
//! Middleware-chain request dispatch on top of hyper.
//!
//! ## The model
//!
//! Every route owns an ordered handler chain:
//!
//! ```text
//! [ prefix middleware (outer group → inner group) ..., route middleware ..., handler ]
//! ```
//!
//! The chain is assembled once, when [`Router::build`] runs, and never
//! changes afterwards. For each request the matched route hands out a pooled
//! context ([`Ctx`]), installs the request and the chain, and runs the first
//! handler. Each handler either answers and returns, or calls
//! [`next`](Context::next) to run the rest of the chain and regains control
//! when it returns. After the chain unwinds the context is reset and goes
//! back to the route's pool.
//!
//! What zapi deliberately does not do:
//!
//! - **URL pattern matching**: [`matchit`] does that
//! - **TLS**: terminate it at the proxy
//! - **Body decoding and validation**: handlers get the raw bytes and the
//!   content type, and use whatever serializer they like
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use zapi::{middleware, Ctx, Response, Route, Router, Server};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), zapi::Error> {
//!     let app = Router::with_middleware(middleware::defaults())
//!         .group("/api", |api| {
//!             api.route(Route::get("/users/{id}", get_user))
//!                 .route(Route::post("/users", create_user));
//!         })
//!         .build()?;
//!
//!     Server::bind(([0, 0, 0, 0], 3000)).serve(app).await
//! }
//!
//! fn get_user(ctx: &mut Ctx) {
//!     let id = ctx.request().param("id").unwrap_or("unknown");
//!     let body = format!(r#"{{"id":"{id}"}}"#);
//!     ctx.response_mut().send(Response::json(body));
//! }
//!
//! fn create_user(ctx: &mut Ctx) {
//!     if ctx.request().body().is_empty() {
//!         ctx.response_mut().send(http::StatusCode::BAD_REQUEST);
//!         return;
//!     }
//!     ctx.response_mut().send(
//!         Response::builder()
//!             .status(http::StatusCode::CREATED)
//!             .json(r#"{"id":"99"}"#),
//!     );
//! }
//! ```

mod app;
mod config;
mod context;
mod error;
mod handler;
mod matcher;
mod method;
mod pool;
mod request;
mod response;
mod route;
mod router;
mod server;

pub mod middleware;

pub use app::App;
pub use config::{Config, LogConfig, MiddlewareConfig, ServerConfig};
pub use context::{Context, Ctx, Extension, State};
pub use error::Error;
pub use handler::{Chain, Handler, Middleware};
pub use matcher::{Match, MatchError, Matcher};
pub use method::{Method, MethodSet};
pub use pool::Pool;
pub use request::Request;
pub use response::{ContentType, IntoResponse, Response, ResponseBuilder, ResponseWriter};
pub use route::{Route, RouteInfo};
pub use router::{Group, Router};
pub use server::Server;
