//! In-process stand-in for the host task queue
//!
//! Runs attempts back to back, sleeping the requested countdown between a
//! retry directive and the next attempt. Attempts of one run are strictly
//! sequential.

use std::sync::Arc;

use tracing::{error, info, warn};

use crate::error::Result;
use crate::export::ExportResult;

use super::{ExportRegistry, TaskArgs, TaskOutcome};

/// Local scheduler driving registered export tasks
#[derive(Clone)]
pub struct LocalScheduler {
    registry: Arc<ExportRegistry>,
}

impl LocalScheduler {
    pub fn new(registry: Arc<ExportRegistry>) -> Self {
        Self { registry }
    }

    /// Run a single attempt
    pub async fn run_once(&self, args: TaskArgs) -> TaskOutcome {
        self.registry.dispatch(args).await
    }

    /// Run attempts until success or terminal failure
    pub async fn run_to_completion(&self, mut args: TaskArgs) -> Result<ExportResult> {
        loop {
            match self.registry.dispatch(args).await {
                TaskOutcome::Success(result) => {
                    info!(
                        "Run {} of '{}' finished",
                        result.run.map(|r| r.to_string()).unwrap_or_default(),
                        result.table
                    );
                    return Ok(result);
                }
                TaskOutcome::Retry {
                    error,
                    countdown,
                    args: next,
                } => {
                    warn!(
                        "Scheduling retry #{} of '{}' in {}s after: {}",
                        next.retries,
                        next.table,
                        countdown.as_secs(),
                        error
                    );
                    tokio::time::sleep(countdown).await;
                    args = next;
                }
                TaskOutcome::Failed(e) => {
                    error!("Export failed: {}", e);
                    return Err(e);
                }
            }
        }
    }
}
