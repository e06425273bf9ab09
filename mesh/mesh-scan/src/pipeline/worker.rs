//! Background reconstruction.

use std::thread::{self, JoinHandle};

use mesh_types::PointCloud;
use tracing::{info, warn};

use super::{
    CancellationToken, PipelineConfig, PipelineResult, ProgressSink, ReconstructionPipeline,
};
use crate::error::PipelineError;

const THREAD_NAME: &str = "scan-reconstruction";

/// A reconstruction running on its own thread.
#[derive(Debug)]
pub struct PipelineHandle {
    cancel: CancellationToken,
    thread: JoinHandle<Result<PipelineResult, PipelineError>>,
}

impl PipelineHandle {
    /// Asks the run to stop before its next stage.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// A token that cancels this run.
    #[must_use]
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// True once the worker has returned.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.thread.is_finished()
    }

    /// Waits for the run to end.
    ///
    /// # Errors
    ///
    /// Returns the run's error, or [`PipelineError::WorkerPanicked`].
    pub fn join(self) -> Result<PipelineResult, PipelineError> {
        self.thread.join().unwrap_or_else(|_| {
            warn!("Reconstruction worker panicked");
            Err(PipelineError::WorkerPanicked)
        })
    }
}

pub(super) fn spawn<P>(
    pipeline: ReconstructionPipeline,
    cloud: PointCloud,
    config: PipelineConfig,
    progress: P,
) -> Result<PipelineHandle, PipelineError>
where
    P: ProgressSink + Send + 'static,
{
    let cancel = CancellationToken::new();
    let token = cancel.clone();
    let thread = thread::Builder::new()
        .name(THREAD_NAME.to_string())
        .spawn(move || pipeline.process(&cloud, &config, &progress, &token))
        .map_err(PipelineError::Spawn)?;
    info!(thread = THREAD_NAME, "Reconstruction worker started");
    Ok(PipelineHandle { cancel, thread })
}
