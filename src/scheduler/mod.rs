use std::future::Future;
use std::time::Duration as StdDuration;

use chrono::{DateTime, Duration, Timelike, Utc};
use serde::Deserialize;
use tokio::time::{interval, sleep, MissedTickBehavior};

/// When trading cycles fire.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Cadence {
    /// A fixed delay between cycle starts.
    Interval { seconds: u64 },
    /// Aligned to wall-clock minute boundaries (e.g. :00, :05, :10 for
    /// `minutes = 5`), recomputed from the clock each cycle so slow cycles
    /// never accumulate drift.
    WallClock { minutes: u32 },
}

/// The next strict-future instant where the minute is a multiple of
/// `minutes` and seconds are zero. An instant exactly on a boundary maps to
/// the following one.
///
/// `minutes` must be non-zero; configuration validation rejects a zero
/// cadence before any loop starts.
pub fn next_boundary(now: DateTime<Utc>, minutes: u32) -> DateTime<Utc> {
    let truncated = now
        .with_second(0)
        .and_then(|t| t.with_nanosecond(0))
        .unwrap_or(now);
    let step = minutes - now.minute() % minutes;
    truncated + Duration::minutes(i64::from(step))
}

/// Drive `cycle` forever at the given cadence.
///
/// A cycle error is logged and swallowed; one bad cycle (stale feed, broker
/// hiccup) must not stop the loop. Shutdown happens by dropping the future,
/// normally via select! against a ctrl_c signal.
pub async fn run<F, Fut>(cadence: Cadence, mut cycle: F)
where
    F: FnMut(DateTime<Utc>) -> Fut,
    Fut: Future<Output = crate::Result<()>>,
{
    match cadence {
        Cadence::Interval { seconds } => {
            let mut ticker = interval(StdDuration::from_secs(seconds));
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                ticker.tick().await;
                let now = Utc::now();
                if let Err(e) = cycle(now).await {
                    tracing::error!(error = %e, "trading cycle failed");
                }
            }
        }
        Cadence::WallClock { minutes } => loop {
            let now = Utc::now();
            let target = next_boundary(now, minutes);
            let wait = (target - now).to_std().unwrap_or(StdDuration::ZERO);
            tracing::debug!(target = %target, wait_secs = wait.as_secs(), "sleeping to boundary");
            sleep(wait).await;

            let fired_at = Utc::now();
            if let Err(e) = cycle(fired_at).await {
                tracing::error!(error = %e, "trading cycle failed");
            }
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(h: u32, m: u32, s: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 3, h, m, s).unwrap()
    }

    #[test]
    fn test_boundary_rounds_up_to_next_multiple() {
        assert_eq!(next_boundary(at(12, 3, 27), 5), at(12, 5, 0));
        assert_eq!(next_boundary(at(12, 7, 0), 5), at(12, 10, 0));
        assert_eq!(next_boundary(at(12, 59, 59), 5), at(13, 0, 0));
    }

    #[test]
    fn test_boundary_on_exact_boundary_moves_forward() {
        // Exactly on a boundary: schedule the next one, never fire twice
        assert_eq!(next_boundary(at(12, 5, 0), 5), at(12, 10, 0));
        assert_eq!(next_boundary(at(12, 0, 0), 5), at(12, 5, 0));
    }

    #[test]
    fn test_boundary_with_seconds_on_boundary_minute() {
        // Mid-boundary-minute still rounds to the next multiple
        assert_eq!(next_boundary(at(12, 5, 30), 5), at(12, 10, 0));
    }

    #[test]
    fn test_boundary_other_periods() {
        assert_eq!(next_boundary(at(12, 0, 10), 1), at(12, 1, 0));
        assert_eq!(next_boundary(at(12, 14, 0), 15), at(12, 15, 0));
        assert_eq!(next_boundary(at(12, 31, 0), 30), at(13, 0, 0));
    }

    #[test]
    fn test_boundary_result_is_strictly_future() {
        let samples = [at(12, 0, 0), at(12, 2, 59), at(12, 57, 1), at(23, 59, 59)];
        for now in samples {
            for minutes in [1u32, 5, 15] {
                let next = next_boundary(now, minutes);
                assert!(next > now, "boundary {next} not after {now}");
                assert_eq!(next.second(), 0);
                assert_eq!(next.minute() % minutes, 0);
            }
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_interval_cadence_keeps_running_after_errors() {
        use std::sync::atomic::{AtomicUsize, Ordering};
        use std::sync::Arc;

        let count = Arc::new(AtomicUsize::new(0));
        let seen = count.clone();
        let loop_fut = run(Cadence::Interval { seconds: 1 }, move |_now| {
            let n = seen.fetch_add(1, Ordering::SeqCst);
            async move {
                if n == 0 {
                    Err(crate::BotError::Connectivity("feed outage".into()))
                } else {
                    Ok(())
                }
            }
        });

        tokio::select! {
            _ = loop_fut => unreachable!("scheduler loop never returns"),
            _ = tokio::time::sleep(StdDuration::from_secs(4)) => {}
        }

        // The failed first cycle did not stop subsequent ones
        assert!(count.load(Ordering::SeqCst) >= 3);
    }
}
