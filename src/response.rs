//! Response values and the write-once [`ResponseWriter`] every context owns.
//!
//! Handlers either write into the context's writer piecemeal
//! (`write_header`, `write`) or hand it a whole [`Response`] via
//! [`ResponseWriter::send`]. Either way the status line is committed exactly
//! once: later attempts are silently ignored, which is what lets a recovery
//! middleware write `500` without caring whether something downstream
//! already answered.

use bytes::{Bytes, BytesMut};
use http::header::{CONTENT_TYPE, HeaderMap, HeaderName, HeaderValue};
use http::StatusCode;
use http_body_util::Full;

// ── ContentType ───────────────────────────────────────────────────────────────

/// Common content-type values for use with [`ResponseBuilder::bytes`].
#[derive(Clone, Copy, Debug)]
pub enum ContentType {
    Csv,          // text/csv
    EventStream,  // text/event-stream  (SSE)
    Html,         // text/html; charset=utf-8
    Json,         // application/json
    OctetStream,  // application/octet-stream
    Text,         // text/plain; charset=utf-8
    Xml,          // application/xml
}

impl ContentType {
    fn header_value(self) -> HeaderValue {
        HeaderValue::from_static(match self {
            Self::Csv         => "text/csv",
            Self::EventStream => "text/event-stream",
            Self::Html        => "text/html; charset=utf-8",
            Self::Json        => "application/json",
            Self::OctetStream => "application/octet-stream",
            Self::Text        => "text/plain; charset=utf-8",
            Self::Xml         => "application/xml",
        })
    }
}

// ── Response ─────────────────────────────────────────────────────────────────

/// A complete response value, handed to [`ResponseWriter::send`].
///
/// ```rust
/// use zapi::{ContentType, Response};
/// use http::{header, HeaderValue, StatusCode};
///
/// Response::json(br#"{"id":1}"#.to_vec());
/// Response::text("hello");
/// Response::status(StatusCode::NO_CONTENT);
///
/// Response::builder()
///     .status(StatusCode::CREATED)
///     .header(header::LOCATION, HeaderValue::from_static("/users/42"))
///     .bytes(ContentType::Xml, b"<ok/>".to_vec());
/// ```
#[derive(Debug)]
pub struct Response {
    pub(crate) status: StatusCode,
    pub(crate) headers: HeaderMap,
    pub(crate) body: Bytes,
}

impl Response {
    /// `200 OK`, `application/json`.
    pub fn json(body: impl Into<Bytes>) -> Self {
        Self::builder().bytes(ContentType::Json, body)
    }

    /// `200 OK`, `text/plain; charset=utf-8`.
    pub fn text(body: impl Into<String>) -> Self {
        Self::builder().text(body)
    }

    /// Response with no body.
    pub fn status(code: StatusCode) -> Self {
        Self::builder().status(code).no_body()
    }

    /// Builder for responses that need a custom status or extra headers.
    pub fn builder() -> ResponseBuilder {
        ResponseBuilder { headers: HeaderMap::new(), status: StatusCode::OK }
    }
}

// ── ResponseBuilder ───────────────────────────────────────────────────────────

/// Fluent builder for [`Response`]. Defaults to `200 OK`.
#[derive(Debug)]
pub struct ResponseBuilder {
    headers: HeaderMap,
    status: StatusCode,
}

impl ResponseBuilder {
    pub fn status(mut self, code: StatusCode) -> Self {
        self.status = code;
        self
    }

    pub fn header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.append(name, value);
        self
    }

    pub fn json(self, body: impl Into<Bytes>) -> Response {
        self.bytes(ContentType::Json, body)
    }

    pub fn text(self, body: impl Into<String>) -> Response {
        let body: String = body.into();
        self.bytes(ContentType::Text, body)
    }

    /// Terminate with a typed body.
    pub fn bytes(mut self, content_type: ContentType, body: impl Into<Bytes>) -> Response {
        self.headers.insert(CONTENT_TYPE, content_type.header_value());
        Response { status: self.status, headers: self.headers, body: body.into() }
    }

    pub fn no_body(self) -> Response {
        Response { status: self.status, headers: self.headers, body: Bytes::new() }
    }
}

// ── IntoResponse ──────────────────────────────────────────────────────────────

/// Conversion into a [`Response`], accepted by [`ResponseWriter::send`].
pub trait IntoResponse {
    fn into_response(self) -> Response;
}

impl IntoResponse for Response {
    fn into_response(self) -> Response {
        self
    }
}

impl IntoResponse for &'static str {
    fn into_response(self) -> Response {
        Response::text(self)
    }
}

impl IntoResponse for String {
    fn into_response(self) -> Response {
        Response::text(self)
    }
}

impl IntoResponse for StatusCode {
    fn into_response(self) -> Response {
        Response::status(self)
    }
}

// ── ResponseWriter ────────────────────────────────────────────────────────────

/// Buffers one response and records whether, and with what status, it was
/// answered.
///
/// `status()` is `None` until the first header write; from then on the
/// status and the header block are frozen and further header writes are
/// no-ops. Body bytes keep appending.
#[derive(Debug, Default)]
pub struct ResponseWriter {
    status: Option<StatusCode>,
    responded: bool,
    headers: HeaderMap,
    body: BytesMut,
}

impl ResponseWriter {
    pub fn new() -> Self {
        Self::default()
    }

    /// The committed status, or `None` if nothing was written yet.
    pub fn status(&self) -> Option<StatusCode> {
        self.status
    }

    /// Whether any header or body write happened.
    pub fn is_responded(&self) -> bool {
        self.responded
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn body(&self) -> &[u8] {
        &self.body
    }

    /// Sets a header, replacing previous values. Ignored once the status
    /// was written; returns whether the header was stored.
    pub fn set_header(&mut self, name: HeaderName, value: HeaderValue) -> bool {
        if self.status.is_some() {
            return false;
        }
        self.headers.insert(name, value);
        true
    }

    /// Appends a header value. Ignored once the status was written.
    pub fn append_header(&mut self, name: HeaderName, value: HeaderValue) -> bool {
        if self.status.is_some() {
            return false;
        }
        self.headers.append(name, value);
        true
    }

    /// Commits the status line. Only the first call has any effect;
    /// returns whether this call was that first one.
    pub fn write_header(&mut self, status: StatusCode) -> bool {
        if self.status.is_some() {
            return false;
        }
        self.status = Some(status);
        self.responded = true;
        true
    }

    /// Appends body bytes, committing `200 OK` first if no status was
    /// written yet.
    pub fn write(&mut self, data: &[u8]) {
        self.write_header(StatusCode::OK);
        self.body.extend_from_slice(data);
    }

    /// Writes a whole response. A no-op returning `false` if the status was
    /// already committed.
    pub fn send(&mut self, response: impl IntoResponse) -> bool {
        if self.status.is_some() {
            return false;
        }
        let Response { status, headers, body } = response.into_response();
        let mut last = None;
        for (name, value) in headers {
            // `HeaderMap::into_iter` yields the name only on its first value.
            if let Some(name) = name {
                last = Some(name);
            }
            if let Some(name) = &last {
                self.headers.append(name.clone(), value);
            }
        }
        self.write_header(status);
        self.body.extend_from_slice(&body);
        true
    }

    /// Clears every field while keeping buffer capacity for the next request.
    pub fn reset(&mut self) {
        self.status = None;
        self.responded = false;
        self.headers.clear();
        self.body.clear();
    }

    /// Converts into the hyper response. An unanswered writer becomes an
    /// empty `200 OK`.
    pub fn into_http(self) -> http::Response<Full<Bytes>> {
        let mut res = http::Response::new(Full::new(self.body.freeze()));
        *res.status_mut() = self.status.unwrap_or(StatusCode::OK);
        *res.headers_mut() = self.headers;
        res
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::header::LOCATION;

    #[test]
    fn first_status_wins() {
        let mut w = ResponseWriter::new();
        assert_eq!(w.status(), None);
        assert!(!w.is_responded());

        assert!(w.write_header(StatusCode::CREATED));
        assert!(!w.write_header(StatusCode::INTERNAL_SERVER_ERROR));
        assert!(!w.write_header(StatusCode::OK));

        assert_eq!(w.status(), Some(StatusCode::CREATED));
        assert!(w.is_responded());
    }

    #[test]
    fn body_write_commits_ok() {
        let mut w = ResponseWriter::new();
        w.write(b"hello ");
        w.write(b"world");
        assert!(!w.write_header(StatusCode::NOT_FOUND));

        assert_eq!(w.status(), Some(StatusCode::OK));
        assert_eq!(w.body(), b"hello world");
    }

    #[test]
    fn headers_freeze_after_status() {
        let mut w = ResponseWriter::new();
        assert!(w.set_header(LOCATION, HeaderValue::from_static("/a")));
        w.write_header(StatusCode::FOUND);
        assert!(!w.set_header(LOCATION, HeaderValue::from_static("/b")));
        assert!(!w.append_header(LOCATION, HeaderValue::from_static("/c")));

        assert_eq!(w.headers().get_all(LOCATION).iter().count(), 1);
        assert_eq!(w.headers()[LOCATION], "/a");
    }

    #[test]
    fn send_is_write_once() {
        let mut w = ResponseWriter::new();
        let created = Response::builder()
            .status(StatusCode::CREATED)
            .header(LOCATION, HeaderValue::from_static("/users/42"))
            .json(r#"{"id":42}"#);
        assert!(w.send(created));
        assert!(!w.send(StatusCode::INTERNAL_SERVER_ERROR));

        assert_eq!(w.status(), Some(StatusCode::CREATED));
        assert_eq!(w.headers()[CONTENT_TYPE], "application/json");
        assert_eq!(w.headers()[LOCATION], "/users/42");
        assert_eq!(w.body(), br#"{"id":42}"#);
    }

    #[test]
    fn reset_returns_to_zero_state() {
        let mut w = ResponseWriter::new();
        w.send(Response::text("used"));
        w.reset();

        assert_eq!(w.status(), None);
        assert!(!w.is_responded());
        assert!(w.headers().is_empty());
        assert!(w.body().is_empty());
    }

    #[test]
    fn unanswered_writer_is_empty_ok() {
        let res = ResponseWriter::new().into_http();
        assert_eq!(res.status(), StatusCode::OK);
    }
}
