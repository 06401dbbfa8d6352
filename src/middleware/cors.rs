use http::header::{
    ACCESS_CONTROL_ALLOW_CREDENTIALS, ACCESS_CONTROL_ALLOW_HEADERS, ACCESS_CONTROL_ALLOW_METHODS,
    ACCESS_CONTROL_ALLOW_ORIGIN, HeaderValue, ORIGIN,
};
use http::StatusCode;
use serde::Deserialize;
use tracing::warn;

use crate::context::Context;
use crate::handler::Middleware;

const DEFAULT_METHODS: &str = "POST, GET, OPTIONS, PATCH, PUT, DELETE";

/// CORS settings, usually read from the `[middleware.cors]` config table.
#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(default)]
pub struct CorsConfig {
    pub allow_credentials: bool,
    pub allow_methods: String,
    pub allow_headers: Option<String>,
}

impl Default for CorsConfig {
    fn default() -> Self {
        Self {
            allow_credentials: true,
            allow_methods: DEFAULT_METHODS.to_owned(),
            allow_headers: None,
        }
    }
}

/// Echoes the request's `Origin` and adds the configured CORS headers.
/// An `OPTIONS` request is answered with `204 No Content` without running
/// the rest of the chain.
pub fn cors(config: CorsConfig) -> Middleware {
    let methods = HeaderValue::from_str(&config.allow_methods).unwrap_or_else(|_| {
        warn!(value = %config.allow_methods, "invalid cors allow_methods, using default");
        HeaderValue::from_static(DEFAULT_METHODS)
    });
    let headers = config.allow_headers.as_deref().and_then(|h| HeaderValue::from_str(h).ok());
    let credentials = config.allow_credentials;

    Middleware::any(move |ctx: &mut dyn Context| {
        let origin = ctx.request().headers().get(ORIGIN).cloned();
        let preflight = ctx.request().method() == http::Method::OPTIONS;

        let res = ctx.response_mut();
        if let Some(origin) = origin {
            res.append_header(ACCESS_CONTROL_ALLOW_ORIGIN, origin);
        }
        if credentials {
            res.append_header(ACCESS_CONTROL_ALLOW_CREDENTIALS, HeaderValue::from_static("true"));
        }
        res.append_header(ACCESS_CONTROL_ALLOW_METHODS, methods.clone());
        if let Some(headers) = &headers {
            res.append_header(ACCESS_CONTROL_ALLOW_HEADERS, headers.clone());
        }

        if preflight {
            res.write_header(StatusCode::NO_CONTENT);
            return;
        }
        ctx.next();
    })
    .named("cors")
}

#[cfg(test)]
mod tests {
    use bytes::Bytes;

    use super::*;
    use crate::context::Ctx;
    use crate::handler::Handler;

    fn run(config: CorsConfig, method: http::Method) -> Ctx {
        let cors = cors(config).resolve::<()>().unwrap();
        let terminal = Handler::new(|ctx: &mut Ctx| {
            ctx.response_mut().write(b"reached");
        });
        let req = http::Request::builder()
            .method(method)
            .uri("/x")
            .header(ORIGIN, "https://app.example")
            .body(Bytes::new())
            .unwrap();

        let mut ctx: Ctx = Ctx::new();
        ctx.init(vec![cors, terminal].into(), req.into());
        ctx.start();
        ctx
    }

    #[test]
    fn adds_headers_and_continues() {
        let ctx = run(CorsConfig::default(), http::Method::GET);
        let headers = ctx.response().headers();

        assert_eq!(headers[ACCESS_CONTROL_ALLOW_ORIGIN], "https://app.example");
        assert_eq!(headers[ACCESS_CONTROL_ALLOW_CREDENTIALS], "true");
        assert_eq!(headers[ACCESS_CONTROL_ALLOW_METHODS], DEFAULT_METHODS);
        assert!(headers.get(ACCESS_CONTROL_ALLOW_HEADERS).is_none());
        assert_eq!(ctx.response().body(), b"reached");
    }

    #[test]
    fn preflight_short_circuits() {
        let ctx = run(CorsConfig::default(), http::Method::OPTIONS);
        assert_eq!(ctx.response().status(), Some(StatusCode::NO_CONTENT));
        assert!(ctx.response().body().is_empty());
        assert_eq!(ctx.cursor(), 1);
    }

    #[test]
    fn honours_config() {
        let config = CorsConfig {
            allow_credentials: false,
            allow_methods: "GET".to_owned(),
            allow_headers: Some("content-type, x-token".to_owned()),
        };
        let ctx = run(config, http::Method::GET);
        let headers = ctx.response().headers();

        assert!(headers.get(ACCESS_CONTROL_ALLOW_CREDENTIALS).is_none());
        assert_eq!(headers[ACCESS_CONTROL_ALLOW_METHODS], "GET");
        assert_eq!(headers[ACCESS_CONTROL_ALLOW_HEADERS], "content-type, x-token");
    }
}
