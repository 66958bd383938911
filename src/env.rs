//! Explicit environment value (spec §3 "Global per-thread environment", §9).
//!
//! The source kept allocator hooks, the last error, and a trace level as
//! thread-local globals. Rust's allocator cannot be hooked without `nightly`
//! or a custom global allocator, and the last-error slot is unnecessary once
//! every fallible call returns a `Result` (see [`crate::error`]). What
//! remains worth keeping explicit is the trace level and an optional
//! allocation-pressure callback, so both travel together in one value that
//! is constructed once at startup and threaded through [`crate::server`]
//! rather than reached for via a global.

use std::sync::Arc;

/// Called when a server-side allocation governed by a configured limit (e.g.
/// queue capacity, slot pool growth) would be exceeded. Default behavior is
/// to record the condition via `tracing::warn!` and return `false`,
/// matching spec §3's "record `VE_MEM` and return null" default.
pub type AllocPressureHook = Arc<dyn Fn(&str) -> bool + Send + Sync>;

/// Ambient, explicitly-passed environment. One instance is normally shared
/// (via `Arc`) across the reactor and all workers of a single server.
#[derive(Clone)]
pub struct Environment {
    pub trace_level: u8,
    pub on_alloc_pressure: AllocPressureHook,
}

impl Default for Environment {
    fn default() -> Self {
        Environment {
            trace_level: 3,
            on_alloc_pressure: Arc::new(|where_: &str| {
                tracing::warn!(target: "tidalpool::env", "allocation pressure at {where_}");
                false
            }),
        }
    }
}

impl Environment {
    pub fn new(trace_level: u8) -> Self {
        Environment {
            trace_level,
            ..Default::default()
        }
    }

    pub fn with_alloc_pressure_hook(mut self, hook: AllocPressureHook) -> Self {
        self.on_alloc_pressure = hook;
        self
    }
}

impl std::fmt::Debug for Environment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Environment")
            .field("trace_level", &self.trace_level)
            .finish_non_exhaustive()
    }
}
