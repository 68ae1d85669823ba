//! Strongly-typed query hooks for a JSON HTTP API.
//!
//! # Overview
//! A [`QueryHook`] is built once from a static [`HookConfig`] (URL source,
//! default params, default options, request function) and invoked per call
//! with a [`CallConfig`]. Each invocation derives a [`CacheKey`] from
//! method, URL and effective params, layers the options, and lets the
//! [`QueryClient`] decide whether to serve a stored result or run the
//! request function. The key is returned alongside the result so callers can
//! invalidate exactly what they fetched.
//!
//! # Design
//! - Hooks are stateless; all shared state lives in `QueryClient`.
//! - Params precedence is strictly two-level (call site, else hook default).
//! - Options are layered field by field: builtin, hook, call site.
//! - Errors from request functions reach the caller unmodified.
//! - `HttpTransport` is the stock request backend; any async function with
//!   the right signature can replace it.

pub mod cache;
pub mod config;
pub mod error;
pub mod hook;
pub mod http;
pub mod key;
pub mod options;
pub mod todos;
pub mod transport;

pub use cache::{QueryClient, QueryResult, QueryStatus};
pub use config::{ConfigError, TransportSettings};
pub use error::ApiError;
pub use hook::{
    create_query_hook, json_request, CallConfig, HookConfig, HookResult, PreparedQuery, QueryHook,
    RequestContext, UrlSource, QUERY_METHOD,
};
pub use http::{HttpMethod, HttpRequest, HttpResponse, RequestConfig, TransportConfig};
pub use key::CacheKey;
pub use options::{QueryOptions, ResolvedOptions, DEFAULT_GC_TIME};
pub use transport::HttpTransport;
