//! Layered query options.
//!
//! Options come from three places: the builtin defaults, the hook's factory
//! configuration, and the call site. [`QueryOptions::merge`] applies them in
//! that order, one field at a time, so a later layer that sets a field
//! always wins and an unset field falls through to the layer below.

use std::time::Duration;

/// One layer of query options. `None` means "not set at this layer".
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct QueryOptions {
    /// Mark the entry stale when the host reports a window focus event.
    pub refetch_on_window_focus: Option<bool>,
    /// When `false` the request function is never called.
    pub enabled: Option<bool>,
    /// How long a successful result is served without refetching.
    pub stale_time: Option<Duration>,
    /// How long a settled entry may sit unused before
    /// [`QueryClient::collect_garbage`](crate::QueryClient::collect_garbage)
    /// drops it.
    pub gc_time: Option<Duration>,
}

/// Idle entries are dropped after five minutes unless a layer says otherwise.
pub const DEFAULT_GC_TIME: Duration = Duration::from_secs(300);

/// Effective options after layering.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolvedOptions {
    pub refetch_on_window_focus: bool,
    pub enabled: bool,
    pub stale_time: Duration,
    pub gc_time: Duration,
}

impl QueryOptions {
    /// The layer every hook starts from.
    pub fn builtin() -> Self {
        Self {
            refetch_on_window_focus: Some(false),
            enabled: Some(true),
            stale_time: Some(Duration::ZERO),
            gc_time: Some(DEFAULT_GC_TIME),
        }
    }

    pub fn refetch_on_window_focus(mut self, value: bool) -> Self {
        self.refetch_on_window_focus = Some(value);
        self
    }

    pub fn enabled(mut self, value: bool) -> Self {
        self.enabled = Some(value);
        self
    }

    pub fn stale_time(mut self, value: Duration) -> Self {
        self.stale_time = Some(value);
        self
    }

    pub fn gc_time(mut self, value: Duration) -> Self {
        self.gc_time = Some(value);
        self
    }

    /// Put `self` underneath `over`: fields set in `over` win.
    pub fn overlay(self, over: &QueryOptions) -> QueryOptions {
        QueryOptions {
            refetch_on_window_focus: over.refetch_on_window_focus.or(self.refetch_on_window_focus),
            enabled: over.enabled.or(self.enabled),
            stale_time: over.stale_time.or(self.stale_time),
            gc_time: over.gc_time.or(self.gc_time),
        }
    }

    /// builtin ← factory ← call site.
    pub fn merge(factory: &QueryOptions, call: &QueryOptions) -> ResolvedOptions {
        let merged = QueryOptions::builtin().overlay(factory).overlay(call);
        ResolvedOptions {
            refetch_on_window_focus: merged.refetch_on_window_focus.unwrap_or(false),
            enabled: merged.enabled.unwrap_or(true),
            stale_time: merged.stale_time.unwrap_or(Duration::ZERO),
            gc_time: merged.gc_time.unwrap_or(DEFAULT_GC_TIME),
        }
    }
}

impl Default for ResolvedOptions {
    fn default() -> Self {
        QueryOptions::merge(&QueryOptions::default(), &QueryOptions::default())
    }
}
