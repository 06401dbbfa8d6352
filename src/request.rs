//! Incoming HTTP request type.

use std::net::{IpAddr, SocketAddr};

use bytes::Bytes;
use http::{HeaderMap, Uri};

/// An incoming HTTP request with its body fully collected.
///
/// The default value is the "empty" request an idle pooled context holds
/// between uses.
#[derive(Debug, Default)]
pub struct Request {
    method: http::Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
    params: Vec<(String, String)>,
    remote_addr: Option<SocketAddr>,
}

impl Request {
    pub fn new(parts: http::request::Parts, body: Bytes) -> Self {
        Self {
            method: parts.method,
            uri: parts.uri,
            headers: parts.headers,
            body,
            params: Vec::new(),
            remote_addr: None,
        }
    }

    pub fn with_remote_addr(mut self, addr: SocketAddr) -> Self {
        self.remote_addr = Some(addr);
        self
    }

    pub(crate) fn set_params(&mut self, params: Vec<(String, String)>) {
        self.params = params;
    }

    pub fn method(&self) -> &http::Method {
        &self.method
    }

    pub fn uri(&self) -> &Uri {
        &self.uri
    }

    pub fn path(&self) -> &str {
        self.uri.path()
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn body(&self) -> &Bytes {
        &self.body
    }

    pub fn remote_addr(&self) -> Option<SocketAddr> {
        self.remote_addr
    }

    /// Case-insensitive header lookup. Non-UTF-8 values read as absent.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    /// The media type of the body without parameters:
    /// `application/json; charset=utf-8` yields `application/json`.
    pub fn content_type(&self) -> &str {
        let raw = self.header("content-type").unwrap_or("");
        match raw.find([' ', ';']) {
            Some(end) => &raw[..end],
            None => raw,
        }
    }

    /// Returns a named path parameter.
    ///
    /// For a route `/users/{id}`, `req.param("id")` on `/users/42` returns `Some("42")`.
    pub fn param(&self, key: &str) -> Option<&str> {
        self.params.iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn params(&self) -> &[(String, String)] {
        &self.params
    }

    /// Best guess at the originating client: the first `x-forwarded-for`
    /// entry, then `x-real-ip`, then the peer address.
    pub fn client_ip(&self) -> Option<IpAddr> {
        let forwarded = self.header("x-forwarded-for")
            .and_then(|v| v.split(',').next())
            .and_then(|v| v.trim().parse().ok());
        forwarded
            .or_else(|| self.header("x-real-ip").and_then(|v| v.trim().parse().ok()))
            .or_else(|| self.remote_addr.map(|a| a.ip()))
    }
}

impl From<http::Request<Bytes>> for Request {
    fn from(req: http::Request<Bytes>) -> Self {
        let (parts, body) = req.into_parts();
        Self::new(parts, body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(builder: http::request::Builder) -> Request {
        builder.body(Bytes::new()).unwrap().into()
    }

    #[test]
    fn content_type_strips_parameters() {
        let req = request(http::Request::builder()
            .header("content-type", "application/json; charset=utf-8"));
        assert_eq!(req.content_type(), "application/json");

        let req = request(http::Request::builder().header("content-type", "text/plain"));
        assert_eq!(req.content_type(), "text/plain");

        assert_eq!(Request::default().content_type(), "");
    }

    #[test]
    fn client_ip_prefers_forwarded_headers() {
        let peer: SocketAddr = "10.0.0.9:4000".parse().unwrap();

        let req = request(http::Request::builder()
            .header("x-forwarded-for", "203.0.113.7, 10.0.0.1"))
            .with_remote_addr(peer);
        assert_eq!(req.client_ip(), Some("203.0.113.7".parse().unwrap()));

        let req = request(http::Request::builder().header("x-real-ip", "198.51.100.2"))
            .with_remote_addr(peer);
        assert_eq!(req.client_ip(), Some("198.51.100.2".parse().unwrap()));

        let req = request(http::Request::builder()).with_remote_addr(peer);
        assert_eq!(req.client_ip(), Some(peer.ip()));
        assert_eq!(Request::default().client_ip(), None);
    }

    #[test]
    fn params_lookup_by_name() {
        let mut req = Request::default();
        req.set_params(vec![("id".into(), "42".into())]);
        assert_eq!(req.param("id"), Some("42"));
        assert_eq!(req.param("name"), None);
    }
}
