//! HTTP request/response data and the per-call transport configuration.
//!
//! # Design
//! Requests and responses are plain data. `RequestConfig` is what a request
//! function receives: method, URL and params are always filled in by the
//! hook, while `TransportConfig` carries the few knobs a call site may
//! adjust (headers, timeout). Splitting the two keeps call sites from
//! overriding the parts the cache key is derived from.

use std::fmt;
use std::time::Duration;

/// HTTP method for a request. Queries only ever read, so GET is the one verb.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HttpMethod {
    Get,
}

impl HttpMethod {
    pub fn as_str(self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
        }
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Transport options a call site may override.
///
/// Method, URL and params are deliberately absent: the hook owns them.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TransportConfig {
    pub headers: Vec<(String, String)>,
    pub timeout: Option<Duration>,
}

impl TransportConfig {
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

/// Fully resolved transport configuration handed to a request function.
#[derive(Debug, Clone, PartialEq)]
pub struct RequestConfig<P> {
    pub method: HttpMethod,
    pub url: String,
    pub params: Option<P>,
    pub headers: Vec<(String, String)>,
    pub timeout: Option<Duration>,
}

impl<P> RequestConfig<P> {
    pub fn new(method: HttpMethod, url: String, params: Option<P>, transport: TransportConfig) -> Self {
        Self {
            method,
            url,
            params,
            headers: transport.headers,
            timeout: transport.timeout,
        }
    }
}

/// An HTTP request described as plain data, ready for the wire.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpRequest {
    pub method: HttpMethod,
    pub url: String,
    pub query: Vec<(String, String)>,
    pub headers: Vec<(String, String)>,
    pub timeout: Option<Duration>,
}

/// An HTTP response described as plain data.
#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: String,
}

impl HttpResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}
