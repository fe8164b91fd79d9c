use refine_abstraction::JobStatus;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ProgressEvent {
    Submitted { job_id: String },
    Status { job_id: String, status: JobStatus },
    PollError { job_id: String, message: String },
    Finished { job_id: String, status: JobStatus, fine_tuned_model: Option<String> },
}

pub trait ProgressSink: Send + Sync {
    fn on_event(&self, event: ProgressEvent);
}

/// Prints human-readable progress lines.
#[derive(Debug, Default)]
pub struct StdoutProgressSink;

impl ProgressSink for StdoutProgressSink {
    fn on_event(&self, event: ProgressEvent) {
        match event {
            ProgressEvent::Submitted { job_id } => println!("[job:{job_id}] submitted"),
            ProgressEvent::Status { job_id, status } => println!("[job:{job_id}] {status}"),
            ProgressEvent::PollError { job_id, message } => println!("[job:{job_id}] poll failed: {message}"),
            ProgressEvent::Finished { job_id, status, fine_tuned_model } => match fine_tuned_model {
                Some(model) => println!("[job:{job_id}] {status}: {model}"),
                None => println!("[job:{job_id}] {status}"),
            },
        }
    }
}

/// Routes progress to the log, leaving stdout free for machine-readable output.
///
/// Poll errors are already logged at `warn` by the poller, so they appear here at `debug`.
#[derive(Debug, Default)]
pub struct TracingProgressSink;

impl ProgressSink for TracingProgressSink {
    fn on_event(&self, event: ProgressEvent) {
        match event {
            ProgressEvent::Submitted { job_id } => info!(job_id = %job_id, "Job submitted"),
            ProgressEvent::Status { job_id, status } => info!(job_id = %job_id, status = %status, "Job status"),
            ProgressEvent::PollError { job_id, message } => debug!(job_id = %job_id, error = %message, "Poll failed"),
            ProgressEvent::Finished { job_id, status, fine_tuned_model } => {
                info!(job_id = %job_id, status = %status, fine_tuned_model = ?fine_tuned_model, "Job finished");
            }
        }
    }
}
