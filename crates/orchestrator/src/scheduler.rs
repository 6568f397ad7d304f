//! Job scheduler
//!
//! Replaces fire-and-forget task spawning with an explicit queue: request
//! handlers enqueue a job id and return immediately; a dispatcher consumes
//! the queue and runs jobs on background tasks under a concurrency bound.
//! The dispatcher skips ids that already have an active run, so there is at
//! most one orchestrator run per job id at any time. There is no global
//! lock across jobs: distinct jobs proceed independently.

use crate::Orchestrator;
use presence_common::{PipelineError, Result};
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex, Semaphore};
use tracing::{info, warn};

/// Scheduler configuration
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    /// Queue capacity before `enqueue` applies backpressure
    pub queue_depth: usize,
    /// Maximum number of jobs processed concurrently
    pub max_concurrent_jobs: usize,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            queue_depth: 256,
            max_concurrent_jobs: 4,
        }
    }
}

/// Handle for enqueueing jobs onto the pipeline
#[derive(Clone)]
pub struct PipelineScheduler {
    tx: mpsc::Sender<String>,
}

impl PipelineScheduler {
    /// Start the dispatcher and worker pool for the given orchestrator
    #[must_use]
    pub fn start(orchestrator: Arc<Orchestrator>, config: SchedulerConfig) -> Self {
        let (tx, mut rx) = mpsc::channel::<String>(config.queue_depth);
        let semaphore = Arc::new(Semaphore::new(config.max_concurrent_jobs));
        let active: Arc<Mutex<HashSet<String>>> = Arc::new(Mutex::new(HashSet::new()));

        tokio::spawn(async move {
            info!(
                "Pipeline scheduler started (max {} concurrent jobs)",
                config.max_concurrent_jobs
            );

            while let Some(job_id) = rx.recv().await {
                {
                    let mut active_jobs = active.lock().await;
                    if !active_jobs.insert(job_id.clone()) {
                        warn!("Job {} already has an active run, skipping duplicate", job_id);
                        continue;
                    }
                }

                // Acquire before spawning so the queue drains no faster than
                // the worker pool
                let permit = match semaphore.clone().acquire_owned().await {
                    Ok(permit) => permit,
                    Err(_) => break,
                };

                let orchestrator = orchestrator.clone();
                let active = active.clone();
                tokio::spawn(async move {
                    orchestrator.run(&job_id).await;
                    drop(permit);
                    active.lock().await.remove(&job_id);
                });
            }

            info!("Pipeline scheduler stopped");
        });

        Self { tx }
    }

    /// Enqueue a job for processing. Returns once the id is queued; the
    /// pipeline itself runs in the background.
    pub async fn enqueue(&self, job_id: String) -> Result<()> {
        self.tx
            .send(job_id)
            .await
            .map_err(|_| PipelineError::Other("job queue is closed".to_string()))
    }
}
