use std::future::Future;
use std::time::Duration;

use tokio::time::sleep;
use tracing::debug;

/// Outcome of a bounded poll: either the value showed up in time, or the
/// attempts ran out. Exhaustion is an expected result, not an error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Polled<T> {
    Ready(T),
    Pending,
}

impl<T> Polled<T> {
    pub fn is_pending(&self) -> bool {
        matches!(self, Polled::Pending)
    }

    pub fn ready(self) -> Option<T> {
        match self {
            Polled::Ready(v) => Some(v),
            Polled::Pending => None,
        }
    }

    pub fn as_ref(&self) -> Polled<&T> {
        match self {
            Polled::Ready(v) => Polled::Ready(v),
            Polled::Pending => Polled::Pending,
        }
    }
}

/// Fixed attempt count with a fixed delay between attempts.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub attempts: u32,
    pub interval: Duration,
}

impl RetryPolicy {
    pub const fn new(attempts: u32, interval: Duration) -> Self {
        Self { attempts, interval }
    }
}

/// Run `probe` up to `policy.attempts` times, sleeping `policy.interval`
/// between attempts. The probe handles its own command errors and returns
/// `None` for "not there yet".
pub async fn poll_until<T, F, Fut>(policy: RetryPolicy, mut probe: F) -> Polled<T>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Option<T>>,
{
    for attempt in 1..=policy.attempts {
        if let Some(value) = probe(attempt).await {
            return Polled::Ready(value);
        }
        debug!(attempt, max = policy.attempts, "poll attempt came up empty");
        if attempt < policy.attempts {
            sleep(policy.interval).await;
        }
    }
    Polled::Pending
}
