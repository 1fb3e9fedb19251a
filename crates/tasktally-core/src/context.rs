//! Cancellable, deadline-bearing context passed to every repository call.

use std::time::{Duration, Instant};

use tokio_util::sync::CancellationToken;

use crate::error::{CoreError, Result};

/// Request-scoped operation context.
///
/// Cloning shares the cancellation token; cancelling any clone cancels all
/// of them. [`OpContext::child_with_timeout`] derives a context that is
/// cancelled with its parent but carries its own (never later) deadline.
#[derive(Debug, Clone)]
pub struct OpContext {
    token: CancellationToken,
    deadline: Option<Instant>,
}

impl Default for OpContext {
    fn default() -> Self {
        Self::background()
    }
}

impl OpContext {
    /// A context that is never cancelled and has no deadline.
    pub fn background() -> Self {
        Self {
            token: CancellationToken::new(),
            deadline: None,
        }
    }

    pub fn with_timeout(timeout: Duration) -> Self {
        Self {
            token: CancellationToken::new(),
            deadline: Some(Instant::now() + timeout),
        }
    }

    pub fn child_with_timeout(&self, timeout: Duration) -> Self {
        let candidate = Instant::now() + timeout;
        let deadline = match self.deadline {
            Some(existing) if existing < candidate => existing,
            _ => candidate,
        };
        Self {
            token: self.token.child_token(),
            deadline: Some(deadline),
        }
    }

    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// The abort reason, if this context is already done.
    pub fn err(&self) -> Option<CoreError> {
        if self.token.is_cancelled() {
            return Some(CoreError::Canceled);
        }
        match self.deadline {
            Some(deadline) if Instant::now() >= deadline => Some(CoreError::Timeout),
            _ => None,
        }
    }

    /// Fails with `Canceled`/`Timeout` once the context is done.
    pub fn check(&self) -> Result<()> {
        match self.err() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    /// Resolves when the context is cancelled or its deadline passes.
    pub async fn done(&self) -> CoreError {
        match self.deadline {
            Some(deadline) => {
                let sleep = tokio::time::sleep_until(tokio::time::Instant::from_std(deadline));
                tokio::select! {
                    _ = self.token.cancelled() => CoreError::Canceled,
                    _ = sleep => CoreError::Timeout,
                }
            }
            None => {
                self.token.cancelled().await;
                CoreError::Canceled
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn background_is_never_done() {
        let ctx = OpContext::background();
        assert!(ctx.check().is_ok());
        assert!(ctx.deadline().is_none());
    }

    #[test]
    fn cancel_is_shared_between_clones() {
        let ctx = OpContext::background();
        let clone = ctx.clone();
        clone.cancel();
        assert!(matches!(ctx.check(), Err(CoreError::Canceled)));
    }

    #[test]
    fn zero_timeout_is_expired() {
        let ctx = OpContext::with_timeout(Duration::ZERO);
        assert!(matches!(ctx.err(), Some(CoreError::Timeout)));
    }

    #[test]
    fn child_keeps_earlier_parent_deadline() {
        let parent = OpContext::with_timeout(Duration::from_millis(10));
        let child = parent.child_with_timeout(Duration::from_secs(60));
        assert_eq!(child.deadline(), parent.deadline());
    }

    #[test]
    fn cancelling_parent_cancels_child() {
        let parent = OpContext::background();
        let child = parent.child_with_timeout(Duration::from_secs(60));
        parent.cancel();
        assert!(matches!(child.check(), Err(CoreError::Canceled)));
    }

    #[tokio::test]
    async fn done_reports_timeout() {
        let ctx = OpContext::with_timeout(Duration::from_millis(20));
        assert!(matches!(ctx.done().await, CoreError::Timeout));
    }

    #[tokio::test]
    async fn done_reports_cancel() {
        let ctx = OpContext::background();
        let handle = ctx.clone();
        tokio::spawn(async move { handle.cancel() });
        assert!(matches!(ctx.done().await, CoreError::Canceled));
    }
}
