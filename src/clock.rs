use std::time::Duration;

use async_trait::async_trait;

/// Source of the waits between experiment phases.
#[async_trait]
pub trait Clock: Send + Sync {
    async fn sleep(&self, duration: Duration);
}

#[async_trait]
impl<T: Clock + ?Sized> Clock for &T {
    async fn sleep(&self, duration: Duration) {
        (**self).sleep(duration).await
    }
}

/// Wall-clock sleeps on the tokio timer.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioClock;

#[async_trait]
impl Clock for TokioClock {
    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await
    }
}
