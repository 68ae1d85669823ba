//! The keyed query store every hook delegates to.
//!
//! # Design
//! `QueryClient` owns all shared state in the crate. It stores the last
//! outcome per [`CacheKey`], decides whether a stored value is still fresh,
//! and serializes fetches per key so concurrent callers of the same key share
//! one request. Values are type-erased; a read with the wrong output type is
//! treated as a miss.
//!
//! The client never inspects or retries errors. Whatever the producer returns
//! is stored and handed back as is.
//!
//! Entries that sit unused for longer than their `gc_time` are dropped by the
//! next settle, or by an explicit [`QueryClient::collect_garbage`].

use std::any::Any;
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::{Mutex, RwLock};

use crate::error::ApiError;
use crate::key::CacheKey;
use crate::options::{ResolvedOptions, DEFAULT_GC_TIME};

/// Where a query stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryStatus {
    /// The query is disabled, or nothing was ever fetched for it.
    Idle,
    /// A producer for this key is running right now.
    Loading,
    Success,
    Error,
}

/// Result of [`QueryClient::fetch_query`] and [`QueryClient::query_state`].
#[derive(Debug, Clone)]
pub struct QueryResult<O> {
    pub status: QueryStatus,
    pub data: Option<O>,
    pub error: Option<ApiError>,
    /// `true` when the value came from the store without running the producer.
    pub from_cache: bool,
    /// When the stored data was last written, if ever.
    pub updated_at: Option<Instant>,
}

impl<O> QueryResult<O> {
    fn idle() -> Self {
        Self {
            status: QueryStatus::Idle,
            data: None,
            error: None,
            from_cache: false,
            updated_at: None,
        }
    }

    pub fn is_idle(&self) -> bool {
        self.status == QueryStatus::Idle
    }

    pub fn is_loading(&self) -> bool {
        self.status == QueryStatus::Loading
    }

    pub fn is_success(&self) -> bool {
        self.status == QueryStatus::Success
    }

    pub fn is_error(&self) -> bool {
        self.status == QueryStatus::Error
    }
}

struct Entry {
    data: Option<Arc<dyn Any + Send + Sync>>,
    data_updated_at: Option<Instant>,
    error: Option<ApiError>,
    settled_at: Instant,
    /// Latest invalidation not yet answered by a fetch started after it.
    invalidated_at: Option<Instant>,
    refetch_on_window_focus: bool,
    gc_time: Duration,
}

impl Entry {
    fn data<O: Clone + 'static>(&self) -> Option<O> {
        self.data.as_ref().and_then(|d| d.downcast_ref::<O>()).cloned()
    }

    /// Whether a reader expecting `O` can use this entry. An entry holding
    /// only an error fits any type.
    fn holds<O: 'static>(&self) -> bool {
        self.data.as_ref().map_or(self.error.is_some(), |d| d.is::<O>())
    }

    fn is_fresh(&self, options: &ResolvedOptions) -> bool {
        self.invalidated_at.is_none()
            && self.error.is_none()
            && self
                .data_updated_at
                .is_some_and(|at| at.elapsed() < options.stale_time)
    }

    fn is_expired(&self, now: Instant) -> bool {
        now.saturating_duration_since(self.settled_at) > self.gc_time
    }

    fn invalidate(&mut self) {
        self.invalidated_at = Some(Instant::now());
    }

    fn to_result<O: Clone + 'static>(&self, from_cache: bool) -> QueryResult<O> {
        QueryResult {
            status: if self.error.is_some() {
                QueryStatus::Error
            } else {
                QueryStatus::Success
            },
            data: self.data(),
            error: self.error.clone(),
            from_cache,
            updated_at: self.data_updated_at,
        }
    }
}

/// Shared query store. Cloning is cheap and clones share state.
#[derive(Clone, Default)]
pub struct QueryClient {
    entries: Arc<RwLock<HashMap<CacheKey, Entry>>>,
    in_flight: Arc<Mutex<HashMap<CacheKey, Arc<Mutex<()>>>>>,
}

impl QueryClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the stored result for `key` or run `producer` to refresh it.
    pub async fn fetch_query<O, F, Fut>(
        &self,
        key: &CacheKey,
        options: &ResolvedOptions,
        producer: F,
    ) -> QueryResult<O>
    where
        O: Clone + Send + Sync + 'static,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<O, ApiError>>,
    {
        if !options.enabled {
            tracing::debug!(%key, "query disabled");
            let entries = self.entries.read().await;
            let entry = entries.get(key);
            return QueryResult {
                status: QueryStatus::Idle,
                data: entry.and_then(Entry::data),
                error: None,
                from_cache: entry.is_some(),
                updated_at: entry.and_then(|e| e.data_updated_at),
            };
        }

        if let Some(result) = self.fresh(key, options).await {
            tracing::debug!(%key, "cache hit");
            return result;
        }

        let waiting_since = Instant::now();
        let key_lock = self.key_lock(key).await;
        let guard = key_lock.lock().await;

        // Another caller may have settled this key while we waited.
        let settled = {
            let entries = self.entries.read().await;
            entries
                .get(key)
                .filter(|e| e.invalidated_at.is_none() && e.settled_at >= waiting_since)
                .filter(|e| e.holds::<O>())
                .map(|e| e.to_result(true))
        };
        let result = match settled {
            Some(result) => {
                tracing::debug!(%key, "joined concurrent fetch");
                result
            }
            None => {
                tracing::debug!(%key, "fetching");
                let started = Instant::now();
                let outcome = producer().await;
                self.settle(key, options, started, outcome).await
            }
        };

        drop(guard);
        self.release_key_lock(key, key_lock).await;
        result
    }

    /// Current state of `key` without fetching or waiting on a running fetch.
    /// Reports [`QueryStatus::Loading`], with any previous data, while a
    /// producer for the key is in flight.
    pub async fn query_state<O: Clone + 'static>(&self, key: &CacheKey) -> QueryResult<O> {
        let loading = self
            .in_flight
            .lock()
            .await
            .get(key)
            .is_some_and(|lock| lock.try_lock().is_err());
        let mut result = self
            .entries
            .read()
            .await
            .get(key)
            .filter(|e| e.holds::<O>())
            .map_or_else(QueryResult::idle, |e| e.to_result(true));
        if loading {
            result.status = QueryStatus::Loading;
        }
        result
    }

    /// Mark `key` stale so the next fetch runs the producer. Returns whether
    /// an entry existed.
    pub async fn invalidate(&self, key: &CacheKey) -> bool {
        let mut entries = self.entries.write().await;
        match entries.get_mut(key) {
            Some(entry) => {
                tracing::debug!(%key, "invalidated");
                entry.invalidate();
                true
            }
            None => false,
        }
    }

    /// Mark every key matching `predicate` stale. Returns how many matched.
    pub async fn invalidate_where(&self, predicate: impl Fn(&CacheKey) -> bool) -> usize {
        let mut entries = self.entries.write().await;
        let mut count = 0;
        for (key, entry) in entries.iter_mut() {
            if predicate(key) {
                tracing::debug!(%key, "invalidated");
                entry.invalidate();
                count += 1;
            }
        }
        count
    }

    /// Host notification that the window regained focus. Entries last
    /// fetched with `refetch_on_window_focus` become stale.
    pub async fn window_focused(&self) -> usize {
        let mut entries = self.entries.write().await;
        let mut count = 0;
        for entry in entries.values_mut().filter(|e| e.refetch_on_window_focus) {
            entry.invalidate();
            count += 1;
        }
        tracing::debug!(count, "window focus revalidation");
        count
    }

    /// Drop every entry that has not settled within its `gc_time`.
    /// Returns how many were dropped.
    pub async fn collect_garbage(&self) -> usize {
        let mut entries = self.entries.write().await;
        Self::sweep(&mut entries, Instant::now(), None)
    }

    pub async fn remove(&self, key: &CacheKey) -> bool {
        self.entries.write().await.remove(key).is_some()
    }

    pub async fn clear(&self) {
        self.entries.write().await.clear();
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }

    pub async fn get_query_data<O: Clone + 'static>(&self, key: &CacheKey) -> Option<O> {
        self.entries.read().await.get(key).and_then(Entry::data)
    }

    /// Store `data` under `key` as if a fetch had just succeeded.
    pub async fn set_query_data<O: Send + Sync + 'static>(&self, key: CacheKey, data: O) {
        let now = Instant::now();
        let mut entries = self.entries.write().await;
        let previous = entries.get(&key);
        let refetch_on_window_focus = previous.is_some_and(|e| e.refetch_on_window_focus);
        let gc_time = previous.map_or(DEFAULT_GC_TIME, |e| e.gc_time);
        entries.insert(
            key,
            Entry {
                data: Some(Arc::new(data)),
                data_updated_at: Some(now),
                error: None,
                settled_at: now,
                invalidated_at: None,
                refetch_on_window_focus,
                gc_time,
            },
        );
    }

    async fn fresh<O: Clone + 'static>(
        &self,
        key: &CacheKey,
        options: &ResolvedOptions,
    ) -> Option<QueryResult<O>> {
        let entries = self.entries.read().await;
        entries
            .get(key)
            .filter(|e| e.is_fresh(options))
            .filter(|e| e.data.as_ref().is_some_and(|d| d.is::<O>()))
            .map(|e| e.to_result(true))
    }

    async fn settle<O>(
        &self,
        key: &CacheKey,
        options: &ResolvedOptions,
        started: Instant,
        outcome: Result<O, ApiError>,
    ) -> QueryResult<O>
    where
        O: Clone + Send + Sync + 'static,
    {
        let now = Instant::now();
        let mut entries = self.entries.write().await;
        Self::sweep(&mut entries, now, Some(key));
        let entry = entries.entry(key.clone()).or_insert_with(|| Entry {
            data: None,
            data_updated_at: None,
            error: None,
            settled_at: now,
            invalidated_at: None,
            refetch_on_window_focus: options.refetch_on_window_focus,
            gc_time: options.gc_time,
        });
        entry.settled_at = now;
        // An invalidation that arrived after the producer started still applies.
        if entry.invalidated_at.is_some_and(|at| at < started) {
            entry.invalidated_at = None;
        }
        entry.refetch_on_window_focus = options.refetch_on_window_focus;
        entry.gc_time = options.gc_time;
        match outcome {
            Ok(data) => {
                entry.data = Some(Arc::new(data));
                entry.data_updated_at = Some(now);
                entry.error = None;
            }
            Err(error) => {
                tracing::debug!(%key, %error, "query failed");
                entry.error = Some(error);
            }
        }
        entry.to_result(false)
    }

    fn sweep(entries: &mut HashMap<CacheKey, Entry>, now: Instant, keep: Option<&CacheKey>) -> usize {
        let before = entries.len();
        entries.retain(|key, entry| {
            let expired = Some(key) != keep && entry.is_expired(now);
            if expired {
                tracing::debug!(%key, "evicted idle entry");
            }
            !expired
        });
        before - entries.len()
    }

    async fn key_lock(&self, key: &CacheKey) -> Arc<Mutex<()>> {
        let mut in_flight = self.in_flight.lock().await;
        Arc::clone(in_flight.entry(key.clone()).or_default())
    }

    async fn release_key_lock(&self, key: &CacheKey, key_lock: Arc<Mutex<()>>) {
        let mut in_flight = self.in_flight.lock().await;
        // One reference in the map plus ours means nobody else is waiting.
        if Arc::strong_count(&key_lock) == 2 {
            in_flight.remove(key);
        }
    }
}
