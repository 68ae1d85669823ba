//! Factory for strongly-typed query hooks.
//!
//! # Overview
//! [`create_query_hook`] turns a static [`HookConfig`] (URL source, default
//! params, default options, request function) into a reusable
//! [`QueryHook`]. Each call of [`QueryHook::query`] supplies a
//! [`CallConfig`] and goes through the same steps:
//!
//! 1. resolve the URL from the call's input,
//! 2. pick the effective params: the call's params if set, else the hook's
//!    defaults, else none (never a field-level merge),
//! 3. derive the cache key `(GET, url, params)`,
//! 4. layer options builtin ← hook ← call,
//! 5. hand key, options and a producer wrapping the request function to the
//!    [`QueryClient`],
//! 6. return the client's result together with the cache key.
//!
//! # Design
//! The hook holds no mutable state; identical call configurations always
//! derive identical keys. Errors from the request function are returned in
//! the result untouched. The only error raised here is an
//! [`ApiError::Serialization`] for params that cannot be represented as a
//! key, reported before anything is fetched.

use std::future::Future;
use std::ops::Deref;
use std::sync::Arc;

use futures::future::{BoxFuture, FutureExt};
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::cache::{QueryClient, QueryResult};
use crate::error::ApiError;
use crate::http::{HttpMethod, RequestConfig, TransportConfig};
use crate::key::CacheKey;
use crate::options::{QueryOptions, ResolvedOptions};
use crate::transport::HttpTransport;

/// Every generated hook issues this method.
pub const QUERY_METHOD: HttpMethod = HttpMethod::Get;

/// Where a hook's URL comes from.
pub enum UrlSource<I> {
    Static(String),
    Resolver(Arc<dyn Fn(&I) -> String + Send + Sync>),
}

impl<I> UrlSource<I> {
    pub fn resolver(f: impl Fn(&I) -> String + Send + Sync + 'static) -> Self {
        UrlSource::Resolver(Arc::new(f))
    }

    pub fn resolve(&self, input: &I) -> String {
        match self {
            UrlSource::Static(url) => url.clone(),
            UrlSource::Resolver(f) => f(input),
        }
    }
}

impl<I> Clone for UrlSource<I> {
    fn clone(&self) -> Self {
        match self {
            UrlSource::Static(url) => UrlSource::Static(url.clone()),
            UrlSource::Resolver(f) => UrlSource::Resolver(Arc::clone(f)),
        }
    }
}

impl<I> From<&str> for UrlSource<I> {
    fn from(url: &str) -> Self {
        UrlSource::Static(url.to_string())
    }
}

impl<I> From<String> for UrlSource<I> {
    fn from(url: String) -> Self {
        UrlSource::Static(url)
    }
}

/// What a request function receives on every fetch.
#[derive(Debug, Clone)]
pub struct RequestContext<I, P> {
    pub input: I,
    pub params: Option<P>,
    pub transport: RequestConfig<P>,
}

type RequestFn<I, P, O> =
    Arc<dyn Fn(RequestContext<I, P>) -> BoxFuture<'static, Result<O, ApiError>> + Send + Sync>;

/// Static configuration of a hook. Immutable once passed to
/// [`create_query_hook`].
pub struct HookConfig<I, P, O> {
    url: UrlSource<I>,
    default_params: Option<P>,
    options: QueryOptions,
    request_fn: RequestFn<I, P, O>,
}

impl<I, P, O> HookConfig<I, P, O>
where
    I: 'static,
    P: 'static,
    O: 'static,
{
    pub fn new<F, Fut>(url: impl Into<UrlSource<I>>, request_fn: F) -> Self
    where
        F: Fn(RequestContext<I, P>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<O, ApiError>> + Send + 'static,
    {
        Self {
            url: url.into(),
            default_params: None,
            options: QueryOptions::default(),
            request_fn: Arc::new(move |ctx: RequestContext<I, P>| request_fn(ctx).boxed()),
        }
    }

    pub fn default_params(mut self, params: P) -> Self {
        self.default_params = Some(params);
        self
    }

    pub fn options(mut self, options: QueryOptions) -> Self {
        self.options = options;
        self
    }
}

/// Per-call configuration. `input` is always required, even for endpoints
/// that ignore it (use `()`).
#[derive(Debug, Clone)]
pub struct CallConfig<I, P> {
    pub input: I,
    pub params: Option<P>,
    pub transport: TransportConfig,
    pub options: QueryOptions,
}

impl<I, P> CallConfig<I, P> {
    pub fn new(input: I) -> Self {
        Self {
            input,
            params: None,
            transport: TransportConfig::default(),
            options: QueryOptions::default(),
        }
    }

    pub fn params(mut self, params: P) -> Self {
        self.params = Some(params);
        self
    }

    pub fn transport(mut self, transport: TransportConfig) -> Self {
        self.transport = transport;
        self
    }

    pub fn options(mut self, options: QueryOptions) -> Self {
        self.options = options;
        self
    }
}

/// Everything derived from a call before any fetch happens.
#[derive(Debug, Clone)]
pub struct PreparedQuery<P> {
    pub url: String,
    pub params: Option<P>,
    pub cache_key: CacheKey,
    pub options: ResolvedOptions,
}

/// The client's result plus the key it was stored under.
#[derive(Debug, Clone)]
pub struct HookResult<O> {
    pub result: QueryResult<O>,
    pub cache_key: CacheKey,
}

impl<O> Deref for HookResult<O> {
    type Target = QueryResult<O>;

    fn deref(&self) -> &Self::Target {
        &self.result
    }
}

/// A reusable, typed query invoker. Cheap to clone.
pub struct QueryHook<I, P, O> {
    config: Arc<HookConfig<I, P, O>>,
}

impl<I, P, O> Clone for QueryHook<I, P, O> {
    fn clone(&self) -> Self {
        Self {
            config: Arc::clone(&self.config),
        }
    }
}

/// Build a hook from its static configuration. No side effects.
pub fn create_query_hook<I, P, O>(config: HookConfig<I, P, O>) -> QueryHook<I, P, O> {
    QueryHook {
        config: Arc::new(config),
    }
}

impl<I, P, O> QueryHook<I, P, O>
where
    P: Serialize + Clone,
{
    /// Resolve URL, params, cache key and options for `call`.
    pub fn prepare(&self, call: &CallConfig<I, P>) -> Result<PreparedQuery<P>, ApiError> {
        let url = self.config.url.resolve(&call.input);
        let params = call
            .params
            .clone()
            .or_else(|| self.config.default_params.clone());
        let cache_key = CacheKey::new(QUERY_METHOD, url.as_str(), params.as_ref())?;
        let options = QueryOptions::merge(&self.config.options, &call.options);
        tracing::debug!(key = %cache_key, "prepared query");
        Ok(PreparedQuery {
            url,
            params,
            cache_key,
            options,
        })
    }

    /// Run the query through `client`.
    pub async fn query(
        &self,
        client: &QueryClient,
        call: CallConfig<I, P>,
    ) -> Result<HookResult<O>, ApiError>
    where
        O: Clone + Send + Sync + 'static,
    {
        let prepared = self.prepare(&call)?;
        let ctx = RequestContext {
            input: call.input,
            params: prepared.params.clone(),
            transport: RequestConfig::new(
                QUERY_METHOD,
                prepared.url,
                prepared.params,
                call.transport,
            ),
        };
        let request_fn = Arc::clone(&self.config.request_fn);
        let result = client
            .fetch_query(&prepared.cache_key, &prepared.options, move || request_fn(ctx))
            .await;
        Ok(HookResult {
            result,
            cache_key: prepared.cache_key,
        })
    }

    /// Invalidate exactly the key `call` derives.
    pub async fn invalidate(&self, client: &QueryClient, call: &CallConfig<I, P>) -> Result<bool, ApiError> {
        let prepared = self.prepare(call)?;
        Ok(client.invalidate(&prepared.cache_key).await)
    }

    /// Read what `client` holds for `call` without fetching. Reports
    /// `Loading` while another invocation of the same key is in flight.
    pub async fn state(&self, client: &QueryClient, call: &CallConfig<I, P>) -> Result<HookResult<O>, ApiError>
    where
        O: Clone + 'static,
    {
        let prepared = self.prepare(call)?;
        let result = client.query_state(&prepared.cache_key).await;
        Ok(HookResult {
            result,
            cache_key: prepared.cache_key,
        })
    }
}

/// Request function that GETs the resolved URL through `transport` and
/// decodes the JSON body.
pub fn json_request<I, P, O>(
    transport: HttpTransport,
) -> impl Fn(RequestContext<I, P>) -> BoxFuture<'static, Result<O, ApiError>> + Send + Sync + 'static
where
    I: Send + 'static,
    P: Serialize + Send + Sync + 'static,
    O: DeserializeOwned + Send + 'static,
{
    move |ctx: RequestContext<I, P>| {
        let transport = transport.clone();
        async move { transport.get_json::<P, O>(&ctx.transport).await }.boxed()
    }
}
