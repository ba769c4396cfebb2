//! The "poll until terminal" loop shared by every tool.
//!
//! Vendors differ only in their status vocabulary, so each vendor job
//! record maps itself onto [`JobState`] and the [`Poller`] owns the
//! interval/timeout bookkeeping.

use std::future::Future;
use std::time::Duration;

use tokio::time::Instant;

use crate::{Error, Result};

/// The lifecycle every remote job reduces to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobState {
    Pending,
    Succeeded,
    Failed,
    Canceled,
}

impl JobState {
    pub fn is_terminal(self) -> bool {
        !matches!(self, JobState::Pending)
    }
}

/// A vendor-side asynchronous job that can report its lifecycle state.
pub trait RemoteJob {
    fn state(&self) -> JobState;

    /// Vendor-supplied error text, surfaced verbatim on failure.
    fn failure_message(&self) -> Option<String> {
        None
    }
}

/// Fixed-interval polling with a wall-clock budget.
#[derive(Debug, Clone, Copy)]
pub struct Poller {
    pub interval: Duration,
    pub timeout: Duration,
}

impl Poller {
    pub fn new(interval: Duration, timeout: Duration) -> Self {
        Self { interval, timeout }
    }

    pub fn from_secs(interval: u64, timeout: u64) -> Self {
        Self::new(Duration::from_secs(interval), Duration::from_secs(timeout))
    }

    /// Drive `job` to a terminal state. `refresh` fetches a fresh copy of
    /// the job record; `progress` is called once per non-terminal check
    /// with the elapsed time.
    ///
    /// Returns the final job on success, the vendor's error text on a
    /// failed or canceled job, and [`Error::Timeout`] when the budget is
    /// exhausted before any terminal state arrives.
    pub async fn wait<J, F, Fut>(
        &self,
        mut job: J,
        mut refresh: F,
        mut progress: impl FnMut(&J, Duration),
    ) -> Result<J>
    where
        J: RemoteJob,
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<J>>,
    {
        let start = Instant::now();
        loop {
            match job.state() {
                JobState::Succeeded => return Ok(job),
                JobState::Failed | JobState::Canceled => {
                    let message = job
                        .failure_message()
                        .unwrap_or_else(|| "no error reported by the vendor".to_string());
                    return Err(Error::JobFailed(message));
                }
                JobState::Pending => {}
            }

            let elapsed = start.elapsed();
            if elapsed >= self.timeout {
                return Err(Error::Timeout(self.timeout));
            }
            progress(&job, elapsed);
            tokio::time::sleep(self.interval).await;
            job = refresh().await?;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug)]
    struct FakeJob {
        state: JobState,
        error: Option<&'static str>,
    }

    impl FakeJob {
        fn pending() -> Self {
            Self { state: JobState::Pending, error: None }
        }

        fn succeeded() -> Self {
            Self { state: JobState::Succeeded, error: None }
        }
    }

    impl RemoteJob for FakeJob {
        fn state(&self) -> JobState {
            self.state
        }

        fn failure_message(&self) -> Option<String> {
            self.error.map(str::to_string)
        }
    }

    #[tokio::test]
    async fn immediate_success_never_refreshes() {
        let poller = Poller::new(Duration::from_millis(1), Duration::from_millis(100));
        let job = poller
            .wait(
                FakeJob::succeeded(),
                || async { panic!("refresh should not be called") },
                |_, _| {},
            )
            .await
            .unwrap();
        assert_eq!(job.state(), JobState::Succeeded);
    }

    #[tokio::test]
    async fn reaches_terminal_state_before_timeout() {
        let mut upcoming = vec![FakeJob::succeeded(), FakeJob::pending()];
        let poller = Poller::new(Duration::from_millis(1), Duration::from_millis(500));
        let mut ticks = 0;
        let job = poller
            .wait(
                FakeJob::pending(),
                || {
                    let next = upcoming.pop().expect("refresh past terminal state");
                    async move { Ok(next) }
                },
                |_, _| ticks += 1,
            )
            .await
            .unwrap();
        assert_eq!(job.state(), JobState::Succeeded);
        assert_eq!(ticks, 2);
    }

    #[tokio::test]
    async fn vendor_failure_surfaces_its_message() {
        let poller = Poller::new(Duration::from_millis(1), Duration::from_millis(500));
        let err = poller
            .wait(
                FakeJob::pending(),
                || async {
                    Ok(FakeJob { state: JobState::Failed, error: Some("model exploded") })
                },
                |_, _| {},
            )
            .await
            .unwrap_err();
        match err {
            Error::JobFailed(message) => assert_eq!(message, "model exploded"),
            other => panic!("expected JobFailed, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn never_terminal_reports_timeout_not_success() {
        let poller = Poller::new(Duration::from_millis(2), Duration::from_millis(10));
        let started = Instant::now();
        let err = poller
            .wait(FakeJob::pending(), || async { Ok(FakeJob::pending()) }, |_, _| {})
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Timeout(_)));
        // Must give up within timeout plus one interval (plus scheduling slack).
        assert!(started.elapsed() < Duration::from_millis(100));
    }
}
