//! Injectable sleep for bounded polling loops.

use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

/// Source of delays between polling attempts.
#[async_trait]
pub trait Sleeper: Send + Sync {
    async fn sleep(&self, duration: Duration);
}

/// Real sleep on the tokio timer.
#[derive(Debug, Default, Clone, Copy)]
pub struct TokioSleeper;

#[async_trait]
impl Sleeper for TokioSleeper {
    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

/// Returns immediately and records every requested delay.
///
/// Time only "passes" in the log, so polling loops can be driven to their
/// ceiling in tests without waiting.
#[derive(Debug, Default)]
pub struct NullSleeper {
    slept: Mutex<Vec<Duration>>,
}

impl NullSleeper {
    pub fn new() -> Self {
        Self::default()
    }

    /// Delays requested so far.
    pub fn requested(&self) -> Vec<Duration> {
        self.slept.lock().map(|s| s.clone()).unwrap_or_default()
    }

    /// Sum of requested delays.
    pub fn elapsed(&self) -> Duration {
        self.requested().iter().sum()
    }
}

#[async_trait]
impl Sleeper for NullSleeper {
    async fn sleep(&self, duration: Duration) {
        if let Ok(mut slept) = self.slept.lock() {
            slept.push(duration);
        }
        tokio::task::yield_now().await;
    }
}
