use std::{
    sync::Arc,
    time::{Duration, Instant},
};
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

use crate::config::BackendConfig;
use crate::utils::error::BridgeError;

/// Caps in-flight calls to the generation backend
#[derive(Clone)]
pub struct Limiters {
    pub backend: Arc<Semaphore>,
    pub acquire_timeout: Duration,
}

impl Limiters {
    pub fn new(cfg: &BackendConfig) -> Self {
        Self {
            backend: Arc::new(Semaphore::new(cfg.max_concurrency.max(1))),
            acquire_timeout: Duration::from_millis(cfg.acquire_timeout_ms.max(1)),
        }
    }

    pub async fn acquire_timed(
        sem: Arc<Semaphore>,
        acquire_timeout: Duration,
        op: &'static str,
    ) -> Result<(OwnedSemaphorePermit, Duration), BridgeError> {
        let start = Instant::now();

        let permit = tokio::time::timeout(acquire_timeout, sem.acquire_owned())
            .await
            .map_err(|_| BridgeError::BackendTimeout(format!("limiter acquire timeout for op={}", op)))?
            .map_err(|_| BridgeError::Backend(format!("limiter closed for op={}", op)))?;

        Ok((permit, start.elapsed()))
    }

    pub async fn acquire_backend(
        &self,
        op: &'static str,
    ) -> Result<(OwnedSemaphorePermit, Duration), BridgeError> {
        Self::acquire_timed(self.backend.clone(), self.acquire_timeout, op).await
    }
}
