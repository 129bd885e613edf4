//! Parallel batch checking using Rayon
//!
//! The matcher is read-only once loaded, so every worker queries the same
//! instance. Results keep input order, and each line carries its own error
//! instead of aborting the batch.

use anyhow::Result;
use ipmatch::Matcher;
use rayon::prelude::*;
use serde::Serialize;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tracing::debug;

/// Progress is logged every this many addresses
const PROGRESS_INTERVAL: usize = 10_000;

/// Outcome of checking one input line
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CheckResult {
    pub input: String,
    pub matched: Option<bool>,
    pub error: Option<String>,
}

impl CheckResult {
    /// Check a single address against `matcher`
    pub fn check(matcher: &Matcher, input: &str) -> Self {
        match matcher.has(input) {
            Ok(matched) => Self {
                input: input.to_string(),
                matched: Some(matched),
                error: None,
            },
            Err(e) => Self {
                input: input.to_string(),
                matched: None,
                error: Some(e.to_string()),
            },
        }
    }
}

/// Batch processor with parallel execution
pub struct BatchProcessor {
    matcher: Arc<Matcher>,
    thread_pool: rayon::ThreadPool,
}

impl BatchProcessor {
    /// Create a new batch processor
    ///
    /// # Arguments
    ///
    /// * `matcher` - Loaded matcher to query
    /// * `num_threads` - Number of threads (default: CPU cores * 2)
    pub fn new(matcher: Matcher, num_threads: Option<usize>) -> Result<Self> {
        let num_threads = num_threads.unwrap_or_else(|| num_cpus::get() * 2);

        let thread_pool = rayon::ThreadPoolBuilder::new()
            .num_threads(num_threads)
            .build()?;

        Ok(Self {
            matcher: Arc::new(matcher),
            thread_pool,
        })
    }

    /// Check a batch of addresses in parallel
    pub fn process(&self, addresses: Vec<String>) -> Vec<CheckResult> {
        let total = addresses.len();
        let processed = AtomicUsize::new(0);
        let matcher = self.matcher.as_ref();

        self.thread_pool.install(|| {
            addresses
                .into_par_iter()
                .map(|address| {
                    let result = CheckResult::check(matcher, &address);

                    let count = processed.fetch_add(1, Ordering::Relaxed) + 1;
                    if count % PROGRESS_INTERVAL == 0 || count == total {
                        debug!("Processed {}/{} addresses", count, total);
                    }

                    result
                })
                .collect()
        })
    }

    /// Get thread pool info
    pub fn thread_count(&self) -> usize {
        self.thread_pool.current_num_threads()
    }
}
