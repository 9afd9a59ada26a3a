//! Ambient request context threaded through every pipeline call (spec §9:
//! "ambient request context ... plumbed via a client runtime; the core
//! receives `{userId, deadline, cancellationSignal}` as an explicit parameter
//! struct"). The teacher has no equivalent (it's a synchronous CLI that reads
//! one file, start to finish) so this is drawn from `ibank-service`'s
//! request-scoped async plumbing.

use std::time::Duration;

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::model::Id;

#[derive(Clone)]
pub struct RequestContext {
    pub user_id: Id,
    pub deadline: Instant,
    pub cancellation: CancellationToken,
}

impl RequestContext {
    pub fn new(user_id: Id, timeout: Duration) -> Self {
        Self {
            user_id,
            deadline: Instant::now() + timeout,
            cancellation: CancellationToken::new(),
        }
    }

    pub fn remaining(&self) -> Duration {
        self.deadline.saturating_duration_since(Instant::now())
    }

    pub fn is_expired(&self) -> bool {
        Instant::now() >= self.deadline || self.cancellation.is_cancelled()
    }

    /// Races an async operation against both the deadline and the
    /// cancellation signal. Every extractor and repository call in the
    /// pipeline goes through this rather than its own ad-hoc timeout.
    pub async fn run<F, T>(&self, fut: F) -> Option<T>
    where
        F: std::future::Future<Output = T>,
    {
        tokio::select! {
            _ = self.cancellation.cancelled() => None,
            _ = tokio::time::sleep_until(self.deadline) => None,
            out = fut => Some(out),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn run_completes_before_deadline() {
        let ctx = RequestContext::new(Id::new(), Duration::from_secs(5));
        let out = ctx.run(async { 42 }).await;
        assert_eq!(Some(42), out);
    }

    #[tokio::test]
    async fn run_times_out() {
        let ctx = RequestContext::new(Id::new(), Duration::from_millis(10));
        let out = ctx
            .run(async {
                tokio::time::sleep(Duration::from_secs(5)).await;
                42
            })
            .await;
        assert_eq!(None, out);
    }

    #[tokio::test]
    async fn run_cancels() {
        let ctx = RequestContext::new(Id::new(), Duration::from_secs(5));
        ctx.cancellation.cancel();
        let out = ctx
            .run(async {
                tokio::time::sleep(Duration::from_secs(5)).await;
                42
            })
            .await;
        assert_eq!(None, out);
    }
}
