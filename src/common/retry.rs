// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2026 ® John Hauger Mitander <john@on1.no>

use std::future::Future;
use std::time::Duration;
use tokio::time::sleep;

const MAX_BACKOFF: Duration = Duration::from_secs(2);

/// Retry an async operation with capped exponential backoff. The closure
/// receives the 1-based attempt number.
pub async fn retry_async<F, Fut, T, E>(
    mut op: F,
    attempts: usize,
    initial_delay: Duration,
) -> Result<T, E>
where
    F: FnMut(usize) -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    let mut delay = initial_delay;
    for attempt in 1..attempts {
        match op(attempt).await {
            Ok(v) => return Ok(v),
            Err(_) => {
                sleep(delay).await;
                delay = delay.saturating_mul(2).min(MAX_BACKOFF);
            }
        }
    }
    op(attempts).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test]
    async fn succeeds_after_transient_failures() {
        let counter = AtomicUsize::new(0);
        let res: Result<u32, ()> = retry_async(
            |_| {
                let current = counter.fetch_add(1, Ordering::Relaxed);
                async move { if current < 2 { Err(()) } else { Ok(9) } }
            },
            4,
            Duration::from_millis(1),
        )
        .await;

        assert_eq!(res.unwrap(), 9);
        assert_eq!(counter.load(Ordering::Relaxed), 3);
    }

    #[tokio::test]
    async fn exhausts_budget_and_returns_last_error() {
        let counter = AtomicUsize::new(0);
        let res: Result<u32, usize> = retry_async(
            |attempt| {
                counter.fetch_add(1, Ordering::Relaxed);
                async move { Err(attempt) }
            },
            3,
            Duration::from_millis(1),
        )
        .await;

        assert_eq!(res.unwrap_err(), 3);
        assert_eq!(counter.load(Ordering::Relaxed), 3);
    }
}
