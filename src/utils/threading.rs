//! # Threading Configuration
//!
//! Configure rayon thread pools for per-node resolution.

use crate::error::{PangoError, Result};

/// Create a configured thread pool
pub fn build_thread_pool(n_threads: usize) -> Result<rayon::ThreadPool> {
    rayon::ThreadPoolBuilder::new()
        .num_threads(n_threads)
        .thread_name(|i| format!("pango-worker-{}", i))
        .build()
        .map_err(|e| PangoError::config(format!("Failed to create thread pool: {}", e)))
}

/// Configure the global rayon pool.
///
/// A pool that was already initialized (e.g. by a test harness) is kept.
pub fn configure_global_pool(n_threads: usize) {
    if let Err(e) = rayon::ThreadPoolBuilder::new()
        .num_threads(n_threads)
        .thread_name(|i| format!("pango-worker-{}", i))
        .build_global()
    {
        tracing::debug!("global thread pool already configured: {}", e);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_thread_pool() {
        let pool = build_thread_pool(2).unwrap();
        assert_eq!(pool.current_num_threads(), 2);
        let name = pool.install(|| std::thread::current().name().map(str::to_string));
        assert!(name.unwrap().starts_with("pango-worker-"));
    }
}
