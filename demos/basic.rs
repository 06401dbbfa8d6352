//! Minimal zapi example: grouped JSON endpoints behind the default middleware.
//!
//! Run with:
//!   cargo run --example basic
//!   cargo run --example basic -- demos/zapi.toml
//!
//! Try:
//!   curl http://localhost:8080/api/v1/ping
//!   curl http://localhost:8080/api/v1/users/42 -H 'x-user: alice'
//!   curl -X POST http://localhost:8080/api/v1/users \
//!        -H 'content-type: application/json' -H 'x-user: alice' \
//!        -d '{"name":"bob"}'
//!   curl -X DELETE http://localhost:8080/api/v1/ping     # 405
//!   curl http://localhost:8080/api/v1/panic              # 500, logged

use http::StatusCode;
use http::header::{HeaderValue, LOCATION};
use tracing_subscriber::EnvFilter;
use zapi::{Config, Ctx, Extension, Handler, Response, Route, Router, Server};

#[derive(Default)]
struct Session {
    user: Option<String>,
}

impl Extension for Session {}

#[tokio::main]
async fn main() -> Result<(), zapi::Error> {
    let config = match std::env::args().nth(1) {
        Some(path) => Config::load(path)?,
        None => Config::default(),
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&config.log.filter)),
        )
        .init();

    let app = Router::with_middleware(config.middleware())
        .group("/api/v1", |v1| {
            v1.route(Route::get("/ping", pong))
                .route(Route::get("/panic", |_: &mut Ctx| panic!("requested panic")))
                .group("/users", |users| {
                    users
                        .middleware(Handler::new(require_user))
                        .route(Route::get("/{id}", get_user))
                        .route(Route::post("", create_user));
                });
        })
        .build()?;

    let result = Server::from_config(&config.server).serve(app).await;
    if let Err(zapi::Error::ShutdownTimeout { in_flight }) = &result {
        tracing::error!(in_flight, "forcing exit");
        std::process::exit(1);
    }
    result
}

fn pong(ctx: &mut Ctx) {
    ctx.response_mut().send(Response::text("pong"));
}

// Every route under /users runs with a `Session`.
fn require_user(ctx: &mut Ctx<Session>) {
    ctx.user = ctx.request().header("x-user").map(str::to_owned);
    if ctx.user.is_none() {
        ctx.response_mut().send(StatusCode::UNAUTHORIZED);
        return;
    }
    ctx.next();
}

fn get_user(ctx: &mut Ctx<Session>) {
    let id = ctx.request().param("id").unwrap_or("unknown");
    let viewer = ctx.user.as_deref().unwrap_or("");
    let body = format!(r#"{{"id":"{id}","viewer":"{viewer}"}}"#);
    ctx.response_mut().send(Response::json(body));
}

// The body is handed over untouched: decode it with serde_json or anything
// else that takes bytes.
fn create_user(ctx: &mut Ctx<Session>) {
    if ctx.request().content_type() != "application/json" || ctx.request().body().is_empty() {
        ctx.response_mut().send(StatusCode::BAD_REQUEST);
        return;
    }
    ctx.response_mut().send(
        Response::builder()
            .status(StatusCode::CREATED)
            .header(LOCATION, HeaderValue::from_static("/api/v1/users/99"))
            .json(r#"{"id":"99"}"#),
    );
}
