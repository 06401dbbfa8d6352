use std::time::Instant;

use http::StatusCode;
use tracing::info;

use crate::context::Context;
use crate::handler::Middleware;

/// Logs one line per request under the `zapi::access` target, after the
/// rest of the chain has run.
pub fn access_log() -> Middleware {
    Middleware::any(log_access).named("access_log")
}

fn log_access(ctx: &mut dyn Context) {
    let started = Instant::now();
    ctx.next();

    let req = ctx.request();
    let client = req.client_ip().map_or_else(|| "unknown".to_owned(), |ip| ip.to_string());
    let status = ctx.response().status().unwrap_or(StatusCode::OK);
    info!(
        target: "zapi::access",
        %client,
        method = %req.method(),
        path = %req.path(),
        status = status.as_u16(),
        latency_us = started.elapsed().as_micros() as u64,
        "request",
    );
}
