//! Bounded fixed-interval polling shared by every wait in the workflow.

use std::{future::Future, time::Duration};

use tracing::debug;

use crate::error::{DigestError, Result};

/// Outcome of a single probe.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Poll<T> {
    Ready(T),
    Pending,
}

/// How many probes to make and how long to sleep between them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WaitPolicy {
    pub max_attempts: usize,
    pub interval: Duration,
}

impl WaitPolicy {
    pub const fn new(max_attempts: usize, interval: Duration) -> Self {
        Self {
            max_attempts,
            interval,
        }
    }

    /// Upper bound on the time spent sleeping.
    pub fn budget(&self) -> Duration {
        self.interval
            .saturating_mul(self.max_attempts.saturating_sub(1) as u32)
    }
}

/// Inference results: 24 probes, 15 seconds apart.
pub const INFERENCE_RESULT_WAIT: WaitPolicy = WaitPolicy::new(24, Duration::from_secs(15));

/// Call `probe` until it yields a value or the attempt budget runs out.
///
/// Errors returned by the probe are terminal and propagate unchanged.
pub async fn poll_until<T, F, Fut>(policy: WaitPolicy, what: &str, mut probe: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<Poll<T>>>,
{
    let attempts = policy.max_attempts.max(1);
    for attempt in 1..=attempts {
        if let Poll::Ready(value) = probe().await? {
            debug!(what, attempt, "wait satisfied");
            return Ok(value);
        }
        if attempt < attempts {
            debug!(what, attempt, interval = ?policy.interval, "not ready, sleeping");
            tokio::time::sleep(policy.interval).await;
        }
    }
    Err(DigestError::WaitTimeout {
        what: what.to_string(),
        attempts,
        interval: policy.interval,
    })
}
