//! Scan targets: a request and, optionally, the response it produced.
//!
//! Targets are built upstream and are read-only to the engine. Checks that need
//! to send a variation derive a new [`Request`] with the `with_*` helpers, which
//! always assign a fresh id so findings can be correlated to the exact request
//! that triggered them.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A single header entry. Order and duplicates are preserved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Header {
    pub name: String,
    pub value: String,
}

impl Header {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

fn find_header<'a>(headers: &'a [Header], name: &str) -> Option<&'a str> {
    headers
        .iter()
        .find(|h| h.name.eq_ignore_ascii_case(name))
        .map(|h| h.value.as_str())
}

/// An HTTP request as seen by checks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Request {
    /// Unique request identifier, used for finding correlation
    pub id: String,
    pub method: String,
    pub host: String,
    pub port: u16,
    pub tls: bool,
    pub path: String,
    /// Raw query string without the leading `?`
    #[serde(default)]
    pub query: String,
    #[serde(default)]
    pub headers: Vec<Header>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,
}

impl Request {
    /// Create a request with a generated id.
    pub fn new(method: impl Into<String>, host: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            method: method.into(),
            host: host.into(),
            port: 443,
            tls: true,
            path: path.into(),
            query: String::new(),
            headers: Vec::new(),
            body: None,
        }
    }

    /// Shorthand for a `GET` request.
    pub fn get(host: impl Into<String>, path: impl Into<String>) -> Self {
        Self::new("GET", host, path)
    }

    /// Replace the generated id.
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    /// Set the port and scheme.
    pub fn with_endpoint(mut self, port: u16, tls: bool) -> Self {
        self.port = port;
        self.tls = tls;
        self
    }

    /// Derive a request with a different method.
    pub fn with_method(&self, method: impl Into<String>) -> Self {
        let mut derived = self.derive();
        derived.method = method.into();
        derived
    }

    /// Derive a request with a different path.
    pub fn with_path(&self, path: impl Into<String>) -> Self {
        let mut derived = self.derive();
        derived.path = path.into();
        derived
    }

    /// Derive a request with a different query string.
    pub fn with_query(&self, query: impl Into<String>) -> Self {
        let mut derived = self.derive();
        derived.query = query.into();
        derived
    }

    /// Derive a request with a header set, replacing any existing value.
    pub fn with_header(&self, name: impl Into<String>, value: impl Into<String>) -> Self {
        let name = name.into();
        let mut derived = self.derive();
        derived.headers.retain(|h| !h.name.eq_ignore_ascii_case(&name));
        derived.headers.push(Header::new(name, value));
        derived
    }

    /// Derive a request with a different body.
    pub fn with_body(&self, body: impl Into<String>) -> Self {
        let mut derived = self.derive();
        derived.body = Some(body.into());
        derived
    }

    fn derive(&self) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            ..self.clone()
        }
    }

    /// Look up a header value, case-insensitively.
    pub fn header(&self, name: &str) -> Option<&str> {
        find_header(&self.headers, name)
    }

    /// Full URL of the request.
    pub fn url(&self) -> String {
        let scheme = if self.tls { "https" } else { "http" };
        let default_port = if self.tls { 443 } else { 80 };
        let mut url = if self.port == default_port {
            format!("{}://{}{}", scheme, self.host, self.path)
        } else {
            format!("{}://{}:{}{}", scheme, self.host, self.port, self.path)
        };
        if !self.query.is_empty() {
            url.push('?');
            url.push_str(&self.query);
        }
        url
    }
}

/// An HTTP response as seen by checks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Response {
    pub id: String,
    pub status: u16,
    #[serde(default)]
    pub headers: Vec<Header>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,
    /// Time between sending the request and receiving the response
    #[serde(default)]
    pub roundtrip_ms: u64,
}

impl Response {
    /// Create a response with a generated id.
    pub fn new(status: u16) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            status,
            headers: Vec::new(),
            body: None,
            roundtrip_ms: 0,
        }
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push(Header::new(name, value));
        self
    }

    pub fn with_body(mut self, body: impl Into<String>) -> Self {
        self.body = Some(body.into());
        self
    }

    /// Look up a header value, case-insensitively.
    pub fn header(&self, name: &str) -> Option<&str> {
        find_header(&self.headers, name)
    }

    /// Body as text, empty when absent.
    pub fn body_text(&self) -> &str {
        self.body.as_deref().unwrap_or_default()
    }
}

/// A request/response pair under scan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanTarget {
    pub request: Request,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response: Option<Response>,
}

impl ScanTarget {
    pub fn new(request: Request, response: Option<Response>) -> Self {
        Self { request, response }
    }

    /// Target identity; the originating request id.
    pub fn id(&self) -> &str {
        &self.request.id
    }

    /// `host:path`, the usual dedupe key for checks that run once per endpoint.
    pub fn host_path_key(&self) -> String {
        format!("{}:{}", self.request.host, self.request.path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_url_default_port() {
        let req = Request::get("example.com", "/login").with_query("next=/home");
        assert_eq!(req.url(), "https://example.com/login?next=/home");
    }

    #[test]
    fn test_url_custom_port() {
        let req = Request::get("localhost", "/").with_endpoint(8080, false);
        assert_eq!(req.url(), "http://localhost:8080/");
    }

    #[test]
    fn test_derived_request_gets_new_id() {
        let original = Request::get("example.com", "/a").with_id("req-1");
        let derived = original.with_path("/b");
        assert_eq!(original.id, "req-1");
        assert_ne!(derived.id, "req-1");
        assert_eq!(derived.path, "/b");
        assert_eq!(derived.host, "example.com");
    }

    #[test]
    fn test_with_header_replaces_case_insensitively() {
        let req = Request::get("example.com", "/")
            .with_header("X-Test", "one")
            .with_header("x-test", "two");
        assert_eq!(req.headers.len(), 1);
        assert_eq!(req.header("X-TEST"), Some("two"));
    }

    #[test]
    fn test_response_helpers() {
        let res = Response::new(200)
            .with_header("Content-Type", "application/json")
            .with_body("{}");
        assert_eq!(res.header("content-type"), Some("application/json"));
        assert_eq!(res.body_text(), "{}");
        assert_eq!(Response::new(204).body_text(), "");
    }

    #[test]
    fn test_target_identity_and_key() {
        let target = ScanTarget::new(Request::get("example.com", "/test").with_id("t1"), None);
        assert_eq!(target.id(), "t1");
        assert_eq!(target.host_path_key(), "example.com:/test");
    }
}
