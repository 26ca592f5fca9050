use std::sync::Arc;

use log::debug;
use tokio::sync::Semaphore;

use crate::errors::MarketDataError;

/// Default number of blocking provider calls allowed at once.
const DEFAULT_MAX_CONCURRENCY: usize = 4;

/// Bounded pool for blocking provider calls.
///
/// Jobs run on tokio's blocking threads so they never stall the async
/// workers; the semaphore caps how many run at once. The permit travels
/// with the job, so a caller that gives up (timeout, cancellation) does not
/// free a slot until the blocking work has actually finished.
#[derive(Clone, Debug)]
pub struct BlockingPool {
    permits: Arc<Semaphore>,
    max_concurrency: usize,
}

impl BlockingPool {
    pub fn new(max_concurrency: usize) -> Self {
        let max_concurrency = max_concurrency.max(1);
        Self {
            permits: Arc::new(Semaphore::new(max_concurrency)),
            max_concurrency,
        }
    }

    pub fn max_concurrency(&self) -> usize {
        self.max_concurrency
    }

    /// Slots currently free.
    pub fn available(&self) -> usize {
        self.permits.available_permits()
    }

    /// Run `job` on a blocking thread once a slot is free.
    pub async fn run<T, F>(&self, provider: &str, job: F) -> Result<T, MarketDataError>
    where
        F: FnOnce() -> Result<T, MarketDataError> + Send + 'static,
        T: Send + 'static,
    {
        let permit = self
            .permits
            .clone()
            .acquire_owned()
            .await
            .map_err(|_| MarketDataError::ProviderError {
                provider: provider.to_string(),
                message: "blocking pool is closed".to_string(),
            })?;

        debug!(
            "Blocking pool: running job for '{}' ({} slots left)",
            provider,
            self.permits.available_permits()
        );

        tokio::task::spawn_blocking(move || {
            let _permit = permit;
            job()
        })
        .await
        .map_err(|e| MarketDataError::ProviderError {
            provider: provider.to_string(),
            message: format!("blocking job failed: {}", e),
        })?
    }
}

impl Default for BlockingPool {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_CONCURRENCY)
    }
}
