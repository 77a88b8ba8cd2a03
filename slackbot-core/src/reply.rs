// ABOUTME: Reply-received flag shared between event handlers and waiting callers
// ABOUTME: Supports both a fixed-interval poll and an event-driven wait with timeout

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;

/// Flag a handler sets once the reply a caller is waiting for has arrived.
///
/// Clones share the same flag.
#[derive(Debug, Clone)]
pub struct ReplySignal {
    tx: Arc<watch::Sender<bool>>,
}

impl ReplySignal {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(false);
        Self { tx: Arc::new(tx) }
    }

    pub fn mark_received(&self) {
        self.tx.send_replace(true);
    }

    pub fn is_received(&self) -> bool {
        *self.tx.borrow()
    }

    pub fn reset(&self) {
        self.tx.send_replace(false);
    }

    /// Wait until the flag is set or `timeout` elapses. Returns the flag.
    pub async fn wait(&self, timeout: Duration) -> bool {
        let mut rx = self.tx.subscribe();
        let waited = tokio::time::timeout(timeout, rx.wait_for(|received| *received)).await;
        matches!(waited, Ok(Ok(_)))
    }
}

impl Default for ReplySignal {
    fn default() -> Self {
        Self::new()
    }
}

/// What a poll loop observed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollOutcome {
    pub received: bool,
    /// Sleep-then-check rounds performed
    pub iterations: u32,
}

/// Sleep `interval`, then check the flag; repeat up to `attempts` times.
///
/// A flag set anywhere inside round N is reported as `iterations == N`. One
/// set at the exact instant a round ends races that round's check and may be
/// counted in round N+1.
pub async fn poll_for_reply(
    signal: &ReplySignal,
    interval: Duration,
    attempts: u32,
) -> PollOutcome {
    for iteration in 1..=attempts {
        tokio::time::sleep(interval).await;
        if signal.is_received() {
            return PollOutcome {
                received: true,
                iterations: iteration,
            };
        }
    }
    PollOutcome {
        received: false,
        iterations: attempts,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_poll_exits_after_first_observed_reply() {
        let signal = ReplySignal::new();
        let setter = signal.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(500)).await;
            setter.mark_received();
        });

        let outcome = poll_for_reply(&signal, Duration::from_secs(1), 3).await;
        assert_eq!(
            outcome,
            PollOutcome {
                received: true,
                iterations: 1
            }
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_reply_just_before_first_check_counts_as_one_round() {
        let signal = ReplySignal::new();
        let setter = signal.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(999)).await;
            setter.mark_received();
        });

        let started = tokio::time::Instant::now();
        let outcome = poll_for_reply(&signal, Duration::from_secs(1), 3).await;

        assert!(outcome.received);
        assert_eq!(outcome.iterations, 1);
        assert_eq!(started.elapsed(), Duration::from_secs(1));
    }

    #[tokio::test(start_paused = true)]
    async fn test_reply_just_after_first_check_counts_as_two_rounds() {
        let signal = ReplySignal::new();
        let setter = signal.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(1001)).await;
            setter.mark_received();
        });

        let outcome = poll_for_reply(&signal, Duration::from_secs(1), 3).await;

        assert!(outcome.received);
        assert_eq!(outcome.iterations, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_poll_times_out_without_error() {
        let signal = ReplySignal::new();
        let started = tokio::time::Instant::now();
        let outcome = poll_for_reply(&signal, Duration::from_secs(1), 3).await;

        assert!(!outcome.received);
        assert_eq!(outcome.iterations, 3);
        assert_eq!(started.elapsed(), Duration::from_secs(3));
    }

    #[tokio::test(start_paused = true)]
    async fn test_poll_with_zero_attempts() {
        let signal = ReplySignal::new();
        signal.mark_received();
        let outcome = poll_for_reply(&signal, Duration::from_secs(1), 0).await;
        assert!(!outcome.received);
        assert_eq!(outcome.iterations, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_wait_returns_as_soon_as_marked() {
        let signal = ReplySignal::new();
        let setter = signal.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(1200)).await;
            setter.mark_received();
        });

        let started = tokio::time::Instant::now();
        assert!(signal.wait(Duration::from_secs(10)).await);
        assert!(started.elapsed() < Duration::from_secs(2));
    }

    #[tokio::test(start_paused = true)]
    async fn test_wait_times_out() {
        let signal = ReplySignal::new();
        assert!(!signal.wait(Duration::from_secs(3)).await);
    }

    #[tokio::test]
    async fn test_wait_when_already_marked() {
        let signal = ReplySignal::new();
        signal.mark_received();
        assert!(signal.wait(Duration::from_millis(1)).await);
    }

    #[test]
    fn test_reset_clears_flag() {
        let signal = ReplySignal::new();
        signal.mark_received();
        assert!(signal.is_received());
        signal.reset();
        assert!(!signal.is_received());
    }
}
