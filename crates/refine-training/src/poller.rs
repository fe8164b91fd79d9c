//! Waiting for a fine-tuning job to reach a terminal state.

use crate::progress::{ProgressEvent, ProgressSink};
use refine_abstraction::{FineTuningJob, FineTuningProvider};
use std::time::Duration;
use tracing::{debug, warn};

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(10);

#[derive(Debug, Clone, Copy)]
pub struct JobPoller {
    interval: Duration,
}

impl Default for JobPoller {
    fn default() -> Self {
        Self { interval: DEFAULT_POLL_INTERVAL }
    }
}

impl JobPoller {
    #[must_use]
    pub const fn new(interval: Duration) -> Self {
        Self { interval }
    }

    #[must_use]
    pub const fn interval(&self) -> Duration {
        self.interval
    }

    /// Poll `job_id` until it is succeeded, failed or cancelled.
    ///
    /// Errors from the status call are reported to `sink` and polling carries
    /// on. There is no overall timeout.
    pub async fn poll_until_terminal(
        &self,
        provider: &dyn FineTuningProvider,
        job_id: &str,
        sink: &dyn ProgressSink,
    ) -> FineTuningJob {
        let mut attempt: u64 = 0;
        loop {
            attempt += 1;
            match provider.retrieve_job(job_id).await {
                Ok(job) => {
                    debug!(job_id, attempt, status = %job.status, "Polled job");
                    if job.status.is_terminal() {
                        sink.on_event(ProgressEvent::Finished {
                            job_id: job.id.clone(),
                            status: job.status,
                            fine_tuned_model: job.fine_tuned_model.clone(),
                        });
                        return job;
                    }
                    sink.on_event(ProgressEvent::Status { job_id: job_id.to_string(), status: job.status });
                }
                Err(e) => {
                    warn!(job_id, attempt, error = %e, "Failed to retrieve job status; will retry");
                    sink.on_event(ProgressEvent::PollError { job_id: job_id.to_string(), message: e.to_string() });
                }
            }
            tokio::time::sleep(self.interval).await;
        }
    }
}
