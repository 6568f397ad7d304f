//! Job orchestrator for the executive-presence pipeline
//!
//! Sequences the stages that turn one uploaded video into one completed (or
//! failed) report: audio extraction, transcription, the concurrent analysis
//! stages, coaching synthesis, and report assembly. The orchestrator is the
//! single writer of a job's status, progress, and current step; stages
//! return values or fail, they never touch job state. Each transition is one
//! atomic store update, so concurrent status pollers always observe a
//! consistent record with non-decreasing progress.

pub mod scheduler;

pub use scheduler::{PipelineScheduler, SchedulerConfig};

use presence_analysis::{
    analyze_gravitas, analyze_storytelling, generate_coaching_tips, gravitas, storytelling,
    AnalysisModel,
};
use presence_audio_extractor::AudioExtractor;
use presence_common::{ErrorKind, Job, JobError, JobStatus, PipelineError, Result, RetryPolicy};
use presence_report::ReportAssembler;
use presence_storage::{MetadataStore, ObjectStore};
use presence_transcription::{transcribe_with_retry, Transcriber};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{error, info, warn};

/// Orchestrates the processing pipeline for individual jobs.
///
/// Constructed once at startup with its collaborators and shared behind an
/// `Arc`; each job is processed by one `run` call.
pub struct Orchestrator {
    store: Arc<dyn MetadataStore>,
    blobs: Arc<dyn ObjectStore>,
    audio: Arc<dyn AudioExtractor>,
    transcriber: Arc<dyn Transcriber>,
    model: Arc<dyn AnalysisModel>,
    assembler: ReportAssembler,
    retry: RetryPolicy,
}

impl Orchestrator {
    #[must_use]
    pub fn new(
        store: Arc<dyn MetadataStore>,
        blobs: Arc<dyn ObjectStore>,
        audio: Arc<dyn AudioExtractor>,
        transcriber: Arc<dyn Transcriber>,
        model: Arc<dyn AnalysisModel>,
    ) -> Self {
        Self {
            store,
            blobs,
            audio,
            transcriber,
            model,
            assembler: ReportAssembler::default(),
            retry: RetryPolicy::default(),
        }
    }

    /// Override the collaborator retry policy
    #[must_use]
    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Override the report assembler (e.g. custom dimension weights)
    #[must_use]
    pub fn with_assembler(mut self, assembler: ReportAssembler) -> Self {
        self.assembler = assembler;
        self
    }

    /// Run one job to a terminal state.
    ///
    /// The scheduler guarantees at most one active `run` per job id; this
    /// method additionally refuses jobs that are already terminal, so a
    /// re-enqueued finished job is a no-op.
    pub async fn run(&self, job_id: &str) {
        let job = match self.store.get_job(job_id).await {
            Ok(job) => job,
            Err(e) => {
                error!("Cannot load job {}: {}", job_id, e);
                return;
            }
        };

        if job.status.is_terminal() {
            warn!(
                "Job {} is already {} - skipping",
                job_id,
                job.status.name()
            );
            return;
        }

        info!("Starting pipeline for job {}", job_id);
        match self.execute(&job).await {
            Ok(report_id) => {
                if let Err(e) = self.store.complete_job(job_id, &report_id).await {
                    // The job must not linger in a non-terminal state
                    error!("Failed to mark job {} completed: {}", job_id, e);
                    let job_error =
                        JobError::new(ErrorKind::AssemblyFailed, &e.to_string());
                    if let Err(e) = self.store.fail_job(job_id, &job_error).await {
                        error!("Failed to mark job {} failed: {}", job_id, e);
                    }
                    return;
                }
                info!("Job {} completed with report {}", job_id, report_id);
            }
            Err(e) => {
                error!("Job {} failed: {}", job_id, e);
                let job_error = JobError::from(&e);
                if let Err(e) = self.store.fail_job(job_id, &job_error).await {
                    error!("Failed to mark job {} failed: {}", job_id, e);
                }
            }
        }
    }

    /// Write one stage transition: status, checkpoint progress, and step
    /// label in a single atomic store update
    async fn advance(&self, job_id: &str, status: JobStatus) -> Result<()> {
        let progress = status.checkpoint().ok_or_else(|| {
            PipelineError::Other(format!("status {} has no checkpoint", status.name()))
        })?;
        info!(
            "Job {} -> {} ({:.0}%)",
            job_id,
            status.name(),
            progress
        );
        self.store
            .advance_job(job_id, status, progress, status.step_label())
            .await
    }

    /// Execute all stages for one job and return the persisted report id.
    /// Any error here sends the job to `failed`; already-finished stage
    /// side effects (the stored video, temp artifacts) are not rolled back.
    async fn execute(&self, job: &Job) -> Result<String> {
        let asset = self.store.get_video_asset(&job.video_id).await?;

        self.advance(&job.job_id, JobStatus::ExtractingAudio).await?;
        let video = self.blobs.fetch(&job.video_id).await?;
        let audio = self.audio.extract(&video, &asset.filename).await?;

        self.advance(&job.job_id, JobStatus::Transcribing).await?;
        let transcript =
            transcribe_with_retry(self.transcriber.as_ref(), &audio, &self.retry).await?;
        info!(
            "Job {} transcribed: {} chars, {:.1}s of audio",
            job.job_id,
            transcript.text.len(),
            transcript.duration
        );

        self.advance(&job.job_id, JobStatus::Analyzing).await?;
        // Independent stages over a shared read-only transcript; merged by
        // dimension name so completion order never matters
        let (gravitas_result, storytelling_result) = tokio::join!(
            analyze_gravitas(self.model.as_ref(), &transcript, &self.retry),
            analyze_storytelling(self.model.as_ref(), &transcript, &self.retry),
        );
        let mut dimensions = BTreeMap::new();
        dimensions.insert(gravitas::DIMENSION.to_string(), gravitas_result);
        dimensions.insert(storytelling::DIMENSION.to_string(), storytelling_result);

        self.advance(&job.job_id, JobStatus::Synthesizing).await?;
        let tips = generate_coaching_tips(self.model.as_ref(), &dimensions, &self.retry).await;

        self.advance(&job.job_id, JobStatus::Assembling).await?;
        let report = self
            .assembler
            .assemble(&job.user_id, &job.job_id, dimensions, tips);
        self.store
            .store_report(&report)
            .await
            .map_err(|e| PipelineError::AssemblyFailed(e.to_string()))?;

        Ok(report.report_id)
    }
}
