//! Parallel processing utilities

use crate::error::{Result, TuneError};
use rayon::prelude::*;
use rayon::ThreadPool;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Configuration for parallel processing
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ParallelConfig {
    /// Number of threads (None = use all available)
    pub n_threads: Option<usize>,
}

impl ParallelConfig {
    /// Create a new parallel configuration
    pub fn new() -> Self {
        Self::default()
    }

    /// Set number of threads
    pub fn with_threads(mut self, n: usize) -> Self {
        self.n_threads = Some(n);
        self
    }

    /// Get the number of threads to use
    pub fn num_threads(&self) -> usize {
        self.n_threads.unwrap_or_else(rayon::current_num_threads)
    }

    /// Build the shared pool that hosts intra-search parallelism
    pub fn build_pool(&self) -> Result<Arc<ThreadPool>> {
        if self.n_threads == Some(0) {
            return Err(TuneError::ConfigError("n_jobs must be at least 1".to_string()));
        }
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.num_threads())
            .thread_name(|i| format!("holdcv-worker-{}", i))
            .build()?;
        Ok(Arc::new(pool))
    }
}

/// True when the caller already runs on a rayon worker, where further fan-out
/// would only compete with sibling tasks
pub fn in_parallel_region() -> bool {
    rayon::current_thread_index().is_some()
}

/// Map in parallel unless already inside a parallel region; output keeps input order
pub fn map_maybe_parallel<T, U, F>(items: &[T], f: F) -> Vec<U>
where
    T: Sync,
    U: Send,
    F: Fn(&T) -> U + Send + Sync,
{
    if in_parallel_region() {
        items.iter().map(f).collect()
    } else {
        items.par_iter().map(f).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_map_keeps_order() {
        let items: Vec<i32> = (0..1000).collect();
        let results = map_maybe_parallel(&items, |x| x * 2);
        assert_eq!(results, (0..1000).map(|x| x * 2).collect::<Vec<_>>());
    }

    #[test]
    fn test_pool_size() {
        let pool = ParallelConfig::new().with_threads(3).build_pool().unwrap();
        assert_eq!(pool.current_num_threads(), 3);
        assert!(pool.install(in_parallel_region));
        assert!(!in_parallel_region());
    }

    #[test]
    fn test_zero_threads_rejected() {
        let result = ParallelConfig::new().with_threads(0).build_pool();
        assert!(matches!(result, Err(TuneError::ConfigError(_))));
    }
}
