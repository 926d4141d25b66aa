use std::sync::Arc;
use std::time::Duration;

use backon::Retryable;
use chrono::Utc;

use crate::retry::quota_backoff;
use crate::sync::{ProgressCallback, SyncProgress, emit};

use super::errors::{Result, TrackerError, short_error_message};
use super::types::{QuotaStatus, TrackerClient};

/// Remaining-request floor; enough to survive a full page walk.
pub const DEFAULT_RATE_FLOOR: u32 = 100;

/// Delay between attempts while the quota endpoint is failing.
pub const DEFAULT_QUOTA_RETRY_DELAY: Duration = Duration::from_secs(5 * 60);

/// Quota-check retries before the gate gives up for this cycle.
pub const DEFAULT_QUOTA_RETRY_ATTEMPTS: usize = 12;

/// Static throttle for trackers without a quota endpoint.
pub const DEFAULT_UNMETERED_DELAY: Duration = Duration::from_secs(10);

/// How many times the gate sleeps until a reset before giving up.
const MAX_RESET_WAITS: usize = 3;

#[derive(Debug, Clone)]
pub struct RateGateConfig {
    pub floor: u32,
    pub quota_retry_delay: Duration,
    pub quota_retry_attempts: usize,
    pub unmetered_delay: Duration,
}

impl Default for RateGateConfig {
    fn default() -> Self {
        Self {
            floor: DEFAULT_RATE_FLOOR,
            quota_retry_delay: DEFAULT_QUOTA_RETRY_DELAY,
            quota_retry_attempts: DEFAULT_QUOTA_RETRY_ATTEMPTS,
            unmetered_delay: DEFAULT_UNMETERED_DELAY,
        }
    }
}

/// Blocks callers until the tracker has quota to spare.
///
/// Metered trackers are polled via [`TrackerClient::check_quota`]; below the
/// floor the gate sleeps until the advertised reset. Unmetered trackers get
/// a fixed sleep instead.
pub struct RateGate<C: ?Sized> {
    client: Arc<C>,
    config: RateGateConfig,
}

impl<C: ?Sized> Clone for RateGate<C> {
    fn clone(&self) -> Self {
        Self {
            client: Arc::clone(&self.client),
            config: self.config.clone(),
        }
    }
}

impl<C: TrackerClient + ?Sized> RateGate<C> {
    pub fn new(client: Arc<C>, config: RateGateConfig) -> Self {
        Self { client, config }
    }

    pub fn config(&self) -> &RateGateConfig {
        &self.config
    }

    /// Wait until the tracker's remaining quota is at or above the floor.
    ///
    /// Unmetered trackers always sleep the fixed delay.
    ///
    /// # Errors
    /// Returns the last quota-check error once the bounded retries are
    /// spent, or `RateLimited` if the quota stays below the floor across
    /// several resets. Either way the caller should abandon this cycle.
    pub async fn await_capacity(&self, on_progress: Option<&ProgressCallback>) -> Result<()> {
        self.wait(true, on_progress).await
    }

    /// Gate a follow-up page of a walk that already passed
    /// [`await_capacity`](Self::await_capacity). Unmetered trackers are not
    /// throttled again.
    pub async fn await_next_page(&self, on_progress: Option<&ProgressCallback>) -> Result<()> {
        self.wait(false, on_progress).await
    }

    async fn wait(
        &self,
        throttle_unmetered: bool,
        on_progress: Option<&ProgressCallback>,
    ) -> Result<()> {
        let mut last_reset = Utc::now();

        for _ in 0..MAX_RESET_WAITS {
            match self.check_quota().await? {
                QuotaStatus::Unmetered => {
                    if throttle_unmetered {
                        tokio::time::sleep(self.config.unmetered_delay).await;
                    }
                    return Ok(());
                }
                status if status.has_capacity(self.config.floor) => return Ok(()),
                QuotaStatus::Metered {
                    remaining,
                    reset_at,
                } => {
                    let wait = (reset_at - Utc::now()).to_std().unwrap_or(Duration::ZERO);
                    tracing::info!(
                        remaining,
                        floor = self.config.floor,
                        reset_at = %reset_at,
                        wait_secs = wait.as_secs(),
                        "Quota below floor, waiting for reset"
                    );
                    emit(
                        on_progress,
                        SyncProgress::QuotaWait {
                            remaining,
                            floor: self.config.floor,
                            wait_secs: wait.as_secs(),
                        },
                    );
                    last_reset = reset_at;
                    tokio::time::sleep(wait).await;
                }
            }
        }

        Err(TrackerError::RateLimited {
            reset_at: last_reset,
        })
    }

    async fn check_quota(&self) -> Result<QuotaStatus> {
        let backoff = quota_backoff(
            self.config.quota_retry_delay,
            self.config.quota_retry_attempts,
        );

        (|| self.client.check_quota())
            .retry(backoff)
            .notify(|err, dur| {
                tracing::warn!(
                    error = %short_error_message(err),
                    retry_in_secs = dur.as_secs(),
                    "Quota check failed, retrying"
                );
            })
            .await
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use chrono::Duration as ChronoDuration;
    use tokio::time::Instant;

    use super::*;
    use crate::testing::FakeTracker;

    fn gate(tracker: FakeTracker) -> (Arc<FakeTracker>, RateGate<FakeTracker>) {
        let tracker = Arc::new(tracker);
        let gate = RateGate::new(Arc::clone(&tracker), RateGateConfig::default());
        (tracker, gate)
    }

    #[tokio::test(start_paused = true)]
    async fn returns_immediately_above_floor() {
        let (tracker, gate) = gate(FakeTracker::github());
        tracker.push_quota(Ok(QuotaStatus::Metered {
            remaining: 150,
            reset_at: Utc::now() + ChronoDuration::minutes(30),
        }));

        let start = Instant::now();
        gate.await_capacity(None).await.unwrap();

        assert_eq!(start.elapsed(), Duration::ZERO);
        assert_eq!(tracker.quota_calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn blocks_until_reset_below_floor() {
        let (tracker, gate) = gate(FakeTracker::github());
        tracker.push_quota(Ok(QuotaStatus::Metered {
            remaining: 50,
            reset_at: Utc::now() + ChronoDuration::seconds(60),
        }));
        tracker.push_quota(Ok(QuotaStatus::Metered {
            remaining: 5000,
            reset_at: Utc::now() + ChronoDuration::hours(1),
        }));

        let waits = Arc::new(Mutex::new(Vec::new()));
        let waits_capture = Arc::clone(&waits);
        let callback: ProgressCallback = Arc::new(move |event| {
            if let SyncProgress::QuotaWait { remaining, .. } = event {
                waits_capture.lock().unwrap().push(remaining);
            }
        });

        let start = Instant::now();
        gate.await_capacity(Some(&callback)).await.unwrap();

        // Wall-clock drift between building the fixture and computing the
        // wait can shave off a fraction of a second.
        assert!(start.elapsed() >= Duration::from_secs(59));
        assert_eq!(tracker.quota_calls(), 2);
        assert_eq!(*waits.lock().unwrap(), vec![50]);
    }

    #[tokio::test(start_paused = true)]
    async fn retries_failed_quota_checks_with_fixed_backoff() {
        let (tracker, gate) = gate(FakeTracker::github());
        tracker.push_quota(Err(TrackerError::network("connection reset")));
        tracker.push_quota(Err(TrackerError::network("connection reset")));
        tracker.push_quota(Ok(QuotaStatus::Metered {
            remaining: 4000,
            reset_at: Utc::now(),
        }));

        let start = Instant::now();
        gate.await_capacity(None).await.unwrap();

        assert_eq!(start.elapsed(), DEFAULT_QUOTA_RETRY_DELAY * 2);
        assert_eq!(tracker.quota_calls(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn gives_up_after_bounded_retries() {
        let tracker = Arc::new(FakeTracker::github());
        for _ in 0..10 {
            tracker.push_quota(Err(TrackerError::network("down")));
        }
        let gate = RateGate::new(
            Arc::clone(&tracker),
            RateGateConfig {
                quota_retry_attempts: 2,
                ..RateGateConfig::default()
            },
        );

        let err = gate.await_capacity(None).await.unwrap_err();

        assert!(matches!(err, TrackerError::Network { .. }));
        assert_eq!(tracker.quota_calls(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn unmetered_tracker_sleeps_fixed_delay() {
        let (tracker, gate) = gate(FakeTracker::gitlab());

        let start = Instant::now();
        gate.await_capacity(None).await.unwrap();

        assert_eq!(start.elapsed(), DEFAULT_UNMETERED_DELAY);
        assert_eq!(tracker.quota_calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn follow_up_pages_skip_unmetered_sleep() {
        let (tracker, gate) = gate(FakeTracker::gitlab());

        let start = Instant::now();
        gate.await_next_page(None).await.unwrap();

        assert_eq!(start.elapsed(), Duration::ZERO);
        assert_eq!(tracker.quota_calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn follow_up_pages_still_respect_metered_floor() {
        let (tracker, gate) = gate(FakeTracker::github());
        tracker.push_quota(Ok(QuotaStatus::Metered {
            remaining: 10,
            reset_at: Utc::now() + ChronoDuration::seconds(120),
        }));

        let start = Instant::now();
        gate.await_next_page(None).await.unwrap();

        assert!(start.elapsed() >= Duration::from_secs(119));
        assert_eq!(tracker.quota_calls(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn persistent_low_quota_is_reported_as_rate_limited() {
        let (tracker, gate) = gate(FakeTracker::github());
        for _ in 0..MAX_RESET_WAITS {
            tracker.push_quota(Ok(QuotaStatus::Metered {
                remaining: 0,
                reset_at: Utc::now() - ChronoDuration::seconds(1),
            }));
        }

        let err = gate.await_capacity(None).await.unwrap_err();
        assert!(err.is_rate_limited());
        assert_eq!(tracker.quota_calls(), MAX_RESET_WAITS);
    }
}
