//! Remote conversion for formats that cannot be written locally.
//!
//! The mesh is uploaded as binary STL, the job is polled until it completes
//! or fails, and the converted file is downloaded. Transport is behind
//! [`ConversionService`]; [`RemoteExporter`] only drives the protocol.

use std::fmt;
use std::thread;
use std::time::Duration;

use mesh_types::MeshTopology;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::{IoError, IoResult};
use crate::{stl_bytes, ExportFormat};

/// Identifier the service assigns to a submitted job.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(pub String);

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// State of a conversion job.
#[derive(Debug, Clone, PartialEq)]
pub enum JobStatus {
    /// Waiting for a worker, with progress in `[0, 1]`.
    Queued(f32),
    /// Converting, with progress in `[0, 1]`.
    Processing(f32),
    /// Done; the reference is passed to [`ConversionService::download`].
    Completed(String),
    /// The service gave up, with its message.
    Failed(String),
}

/// Job status as the service reports it in JSON.
///
/// ```json
/// {"job_id": "j1", "status": "processing", "progress": 0.4, "result_url": null, "error": null}
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobStatusResponse {
    /// Job identifier.
    pub job_id: String,
    /// One of `queued`, `processing`, `completed`, `failed`.
    pub status: String,
    /// Progress in `[0, 1]`.
    #[serde(default)]
    pub progress: f32,
    /// Download location once completed.
    #[serde(default)]
    pub result_url: Option<String>,
    /// Failure message.
    #[serde(default)]
    pub error: Option<String>,
}

impl JobStatusResponse {
    /// Parse a status document.
    ///
    /// # Errors
    ///
    /// Returns [`IoError::Json`] on malformed JSON.
    pub fn from_json(json: &str) -> IoResult<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Interpret the response.
    ///
    /// A completed job without a `result_url` is downloaded by job id.
    ///
    /// # Errors
    ///
    /// Returns [`IoError::InvalidContent`] for an unknown status string.
    pub fn into_status(self) -> IoResult<JobStatus> {
        let progress = self.progress.clamp(0.0, 1.0);
        match self.status.to_ascii_lowercase().as_str() {
            "queued" | "pending" => Ok(JobStatus::Queued(progress)),
            "processing" | "running" => Ok(JobStatus::Processing(progress)),
            "completed" | "done" => {
                Ok(JobStatus::Completed(self.result_url.unwrap_or(self.job_id)))
            }
            "failed" | "error" => Ok(JobStatus::Failed(
                self.error.unwrap_or_else(|| "unknown error".to_string()),
            )),
            other => Err(IoError::invalid_content(format!("unknown job status '{other}'"))),
        }
    }
}

/// Transport to a conversion service.
pub trait ConversionService {
    /// Upload binary STL for conversion to `format`.
    ///
    /// # Errors
    ///
    /// Returns an error if the upload is rejected.
    fn submit(&self, stl: &[u8], format: ExportFormat) -> IoResult<JobId>;

    /// Current job state.
    ///
    /// # Errors
    ///
    /// Returns an error if the status cannot be retrieved.
    fn poll(&self, job: &JobId) -> IoResult<JobStatus>;

    /// Fetch the converted file.
    ///
    /// # Errors
    ///
    /// Returns an error if the download fails.
    fn download(&self, reference: &str) -> IoResult<Vec<u8>>;
}

/// How often and how long to poll.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct PollPolicy {
    /// Wait before each status check.
    pub interval: Duration,
    /// Status checks before giving up.
    pub max_attempts: u32,
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(2),
            max_attempts: 300,
        }
    }
}

impl PollPolicy {
    /// Set the polling interval.
    #[must_use]
    pub const fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// Set the attempt budget.
    #[must_use]
    pub const fn with_max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = attempts;
        self
    }
}

/// Progress of a remote export.
#[derive(Debug, Clone, PartialEq)]
pub enum ExportProgress {
    /// Sending the mesh.
    Uploading,
    /// The service is working, with progress in `[0, 1]`.
    Processing(f32),
    /// The converted file has been downloaded; holds its size in bytes.
    Completed(usize),
}

/// Drives upload, polling and download against a [`ConversionService`].
#[derive(Debug)]
pub struct RemoteExporter<S> {
    service: S,
    policy: PollPolicy,
}

impl<S: ConversionService> RemoteExporter<S> {
    /// Use `service` with the default poll policy.
    pub fn new(service: S) -> Self {
        Self {
            service,
            policy: PollPolicy::default(),
        }
    }

    /// Replace the poll policy.
    #[must_use]
    pub const fn with_policy(mut self, policy: PollPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// The underlying service.
    pub const fn service(&self) -> &S {
        &self.service
    }

    /// Convert `mesh` to `format` remotely and return the converted bytes.
    ///
    /// `on_progress` receives [`ExportProgress`] updates in order.
    ///
    /// # Errors
    ///
    /// - [`IoError::InvalidContent`] if `format` can be written locally
    /// - [`IoError::Remote`] if the job fails
    /// - [`IoError::Timeout`] if the attempt budget runs out
    /// - any transport error from the service
    pub fn export<M, F>(
        &self,
        mesh: &M,
        format: ExportFormat,
        mut on_progress: F,
    ) -> IoResult<Vec<u8>>
    where
        M: MeshTopology + ?Sized,
        F: FnMut(ExportProgress),
    {
        if !format.requires_conversion() {
            return Err(IoError::invalid_content(format!(
                "{format} is written locally, not converted"
            )));
        }

        on_progress(ExportProgress::Uploading);
        let stl = stl_bytes(mesh)?;
        let job = self.service.submit(&stl, format)?;
        info!(
            job = %job,
            format = format.extension(),
            bytes = stl.len(),
            "Submitted conversion job"
        );

        for attempt in 1..=self.policy.max_attempts {
            if !self.policy.interval.is_zero() {
                thread::sleep(self.policy.interval);
            }
            match self.service.poll(&job)? {
                JobStatus::Queued(progress) => {
                    debug!(job = %job, attempt, progress, "Conversion queued");
                }
                JobStatus::Processing(progress) => {
                    debug!(job = %job, attempt, progress, "Conversion processing");
                    on_progress(ExportProgress::Processing(progress));
                }
                JobStatus::Completed(reference) => {
                    let bytes = self.service.download(&reference)?;
                    info!(job = %job, bytes = bytes.len(), "Conversion complete");
                    on_progress(ExportProgress::Completed(bytes.len()));
                    return Ok(bytes);
                }
                JobStatus::Failed(message) => {
                    warn!(job = %job, %message, "Conversion failed");
                    return Err(IoError::remote(message));
                }
            }
        }

        warn!(job = %job, attempts = self.policy.max_attempts, "Conversion timed out");
        Err(IoError::Timeout {
            attempts: self.policy.max_attempts,
        })
    }
}
