//! Cancellable suspension points.
//!
//! Every wait in an extraction or injection pass goes through
//! [`await_condition`] or [`pause`], both of which race a
//! [`CancellationToken`]. A pass abandoned by its caller therefore stops at
//! its next suspension point and never touches the document again.

use anyhow::Result;
use model_relay::RelayError;
use std::future::Future;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// Outcome of [`await_condition`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WaitOutcome<T> {
    /// The probe produced a value.
    Ready(T),
    /// The bound elapsed without a value.
    TimedOut,
    /// The token was cancelled while waiting.
    Cancelled,
}

impl<T> WaitOutcome<T> {
    /// The ready value, if any.
    pub fn ready(self) -> Option<T> {
        match self {
            Self::Ready(v) => Some(v),
            _ => None,
        }
    }
}

/// Poll `probe` every `interval` until it yields `Some`, `timeout` elapses,
/// or `cancel` fires. The probe always runs at least once.
///
/// Probe errors abort the wait and propagate.
pub async fn await_condition<T, F, Fut>(
    mut probe: F,
    timeout: Duration,
    interval: Duration,
    cancel: &CancellationToken,
) -> Result<WaitOutcome<T>>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<Option<T>>>,
{
    let deadline = Instant::now() + timeout;
    loop {
        if cancel.is_cancelled() {
            return Ok(WaitOutcome::Cancelled);
        }
        if let Some(value) = probe().await? {
            return Ok(WaitOutcome::Ready(value));
        }

        let now = Instant::now();
        if now >= deadline {
            return Ok(WaitOutcome::TimedOut);
        }
        let nap = interval.min(deadline - now);
        tokio::select! {
            biased;
            _ = cancel.cancelled() => return Ok(WaitOutcome::Cancelled),
            _ = tokio::time::sleep(nap) => {}
        }
    }
}

/// Sleep for `duration` unless cancelled first.
pub async fn pause(duration: Duration, cancel: &CancellationToken) -> Result<()> {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(RelayError::Cancelled.into()),
        _ = tokio::time::sleep(duration) => Ok(()),
    }
}

/// Fail with [`RelayError::Cancelled`] if the token has fired.
pub fn ensure_live(cancel: &CancellationToken) -> Result<()> {
    if cancel.is_cancelled() {
        return Err(RelayError::Cancelled.into());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test]
    async fn test_ready_after_some_polls() {
        let counter = AtomicUsize::new(0);
        let calls = &counter;
        let cancel = CancellationToken::new();
        let outcome = await_condition(
            move || async move {
                let n = calls.fetch_add(1, Ordering::SeqCst);
                Ok(if n >= 2 { Some(n) } else { None })
            },
            Duration::from_secs(2),
            Duration::from_millis(5),
            &cancel,
        )
        .await
        .unwrap();
        assert_eq!(outcome, WaitOutcome::Ready(2));
        assert_eq!(counter.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_times_out() {
        let cancel = CancellationToken::new();
        let started = std::time::Instant::now();
        let outcome: WaitOutcome<()> = await_condition(
            || async { Ok(None) },
            Duration::from_millis(60),
            Duration::from_millis(10),
            &cancel,
        )
        .await
        .unwrap();
        assert_eq!(outcome, WaitOutcome::TimedOut);
        assert!(started.elapsed() >= Duration::from_millis(60));
    }

    #[tokio::test]
    async fn test_cancelled_token_stops_wait() {
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            trigger.cancel();
        });
        let outcome: WaitOutcome<()> = await_condition(
            || async { Ok(None) },
            Duration::from_secs(10),
            Duration::from_millis(5),
            &cancel,
        )
        .await
        .unwrap();
        assert_eq!(outcome, WaitOutcome::Cancelled);
    }

    #[tokio::test]
    async fn test_probe_error_propagates() {
        let cancel = CancellationToken::new();
        let result: Result<WaitOutcome<()>> = await_condition(
            || async { Err(anyhow::anyhow!("page gone")) },
            Duration::from_secs(1),
            Duration::from_millis(5),
            &cancel,
        )
        .await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_pause_cancelled() {
        let cancel = CancellationToken::new();
        cancel.cancel();
        let err = pause(Duration::from_secs(5), &cancel).await.unwrap_err();
        assert!(matches!(
            err.downcast_ref::<RelayError>(),
            Some(RelayError::Cancelled)
        ));
        assert!(ensure_live(&cancel).is_err());
    }
}
