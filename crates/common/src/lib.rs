/// Common types and utilities for the executive-presence analysis pipeline
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;
use thiserror::Error;

/// Maximum length of the user-visible message stored on a failed job.
/// Collaborator payloads and process output are truncated to this bound.
const MAX_ERROR_MESSAGE_LEN: usize = 240;

/// Pipeline errors
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("Storage unavailable: {0}")]
    StorageUnavailable(String),

    #[error("Payload too large: {size} bytes (max: {max})")]
    PayloadTooLarge { size: u64, max: u64 },

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),

    #[error("Audio extraction failed: {0}")]
    AudioExtractionFailed(String),

    #[error("Transcription failed: {0}")]
    TranscriptionFailed(String),

    #[error("Transcript was empty")]
    EmptyTranscript,

    #[error("Analysis model unavailable: {0}")]
    ModelUnavailable(String),

    #[error("Report assembly failed: {0}")]
    AssemblyFailed(String),

    #[error("Job cancelled")]
    Cancelled,

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Other error: {0}")]
    Other(String),
}

impl PipelineError {
    /// Map to the machine-readable kind recorded on a failed job
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::StorageUnavailable(_) => ErrorKind::StorageUnavailable,
            Self::PayloadTooLarge { .. } => ErrorKind::PayloadTooLarge,
            Self::AudioExtractionFailed(_) | Self::UnsupportedFormat(_) => {
                ErrorKind::AudioExtractionFailed
            }
            Self::TranscriptionFailed(_) => ErrorKind::TranscriptionFailed,
            Self::EmptyTranscript => ErrorKind::EmptyTranscript,
            Self::AssemblyFailed(_) => ErrorKind::AssemblyFailed,
            Self::Cancelled => ErrorKind::Cancelled,
            _ => ErrorKind::Internal,
        }
    }
}

/// Result type for pipeline operations
pub type Result<T> = std::result::Result<T, PipelineError>;

/// Machine-readable failure kinds exposed on job records
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    StorageUnavailable,
    PayloadTooLarge,
    AudioExtractionFailed,
    TranscriptionFailed,
    EmptyTranscript,
    AssemblyFailed,
    Cancelled,
    Internal,
}

/// Stable error record stored on a failed job.
///
/// The message is truncated so that collaborator payloads and process
/// output never leak to polling clients in full.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobError {
    pub kind: ErrorKind,
    pub message: String,
}

impl JobError {
    #[must_use]
    pub fn new(kind: ErrorKind, message: &str) -> Self {
        let message = if message.len() > MAX_ERROR_MESSAGE_LEN {
            let mut end = MAX_ERROR_MESSAGE_LEN;
            while !message.is_char_boundary(end) {
                end -= 1;
            }
            format!("{}...", &message[..end])
        } else {
            message.to_string()
        };
        Self { kind, message }
    }
}

impl From<&PipelineError> for JobError {
    fn from(err: &PipelineError) -> Self {
        Self::new(err.kind(), &err.to_string())
    }
}

/// Job lifecycle states.
///
/// `pending` is set at creation; every later transition is written by the
/// owning orchestrator run. `completed` and `failed` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Pending,
    ExtractingAudio,
    Transcribing,
    Analyzing,
    Synthesizing,
    Assembling,
    Completed,
    Failed,
}

impl JobStatus {
    /// Get the stable wire name for this status
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::ExtractingAudio => "extracting_audio",
            Self::Transcribing => "transcribing",
            Self::Analyzing => "analyzing",
            Self::Synthesizing => "synthesizing",
            Self::Assembling => "assembling",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }

    /// Progress checkpoint written when this status is entered.
    ///
    /// `Failed` has no checkpoint: a failing job keeps the progress of the
    /// last stage it reached.
    #[must_use]
    pub fn checkpoint(&self) -> Option<f64> {
        match self {
            Self::Pending => Some(0.0),
            Self::ExtractingAudio => Some(10.0),
            Self::Transcribing => Some(30.0),
            Self::Analyzing => Some(60.0),
            Self::Synthesizing => Some(80.0),
            Self::Assembling => Some(95.0),
            Self::Completed => Some(100.0),
            Self::Failed => None,
        }
    }

    /// Human-readable step label shown to polling clients
    #[must_use]
    pub fn step_label(&self) -> &'static str {
        match self {
            Self::Pending => "Waiting to start",
            Self::ExtractingAudio => "Extracting audio track",
            Self::Transcribing => "Transcribing speech",
            Self::Analyzing => "Analyzing delivery",
            Self::Synthesizing => "Generating coaching tips",
            Self::Assembling => "Assembling report",
            Self::Completed => "Complete",
            Self::Failed => "Failed",
        }
    }

    /// Check whether this status accepts no further transitions
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }
}

/// An uploaded video, immutable once created
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VideoAsset {
    pub video_id: String,
    pub user_id: String,
    pub filename: String,
    pub size_bytes: u64,
    pub content_type: String,
    pub uploaded_at: DateTime<Utc>,
}

/// One processing job for one uploaded video.
///
/// Exactly one orchestrator run owns the mutable fields at any time;
/// status pollers read the record concurrently but never write it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    pub job_id: String,
    pub user_id: String,
    pub video_id: String,
    pub status: JobStatus,
    pub progress: f64,
    pub current_step: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub report_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<JobError>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Job {
    /// Create a job in `pending`, ready to be enqueued
    #[must_use]
    pub fn new(job_id: String, user_id: String, video_id: String) -> Self {
        let now = Utc::now();
        Self {
            job_id,
            user_id,
            video_id,
            status: JobStatus::Pending,
            progress: 0.0,
            current_step: JobStatus::Pending.step_label().to_string(),
            report_id: None,
            error: None,
            created_at: now,
            updated_at: now,
        }
    }
}

/// A timed span of transcribed speech (word- or segment-level)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimedSpan {
    pub text: String,
    pub start: f64,
    pub end: f64,
}

/// A transcript with word- and segment-level timing.
///
/// Produced once per job and immutable afterward; optional timing data the
/// collaborator omits is represented as empty, not an error.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Transcript {
    pub text: String,
    pub words: Vec<TimedSpan>,
    pub segments: Vec<TimedSpan>,
    pub duration: f64,
}

/// Structured outcome of one analysis dimension
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisResult {
    /// Named sub-scores on a 0-100 scale, ordered by name
    pub scores: BTreeMap<String, f64>,
    /// Dimension-level overall score (0-100)
    pub overall: f64,
    /// Free-text observations from the analysis
    pub observations: Vec<String>,
    /// The dimension legitimately did not apply (e.g. no narrative present)
    #[serde(default)]
    pub not_applicable: bool,
    /// The fallback default was used because the collaborator response
    /// could not be parsed
    #[serde(default)]
    pub degraded: bool,
}

/// A completed executive-presence report, written once and immutable
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Report {
    pub report_id: String,
    pub user_id: String,
    pub job_id: String,
    /// Per-dimension results, keyed by dimension name
    pub dimensions: BTreeMap<String, AnalysisResult>,
    /// Weighted composite of the applicable dimensions' overall scores
    pub overall_score: f64,
    /// Ordered coaching tips
    pub tips: Vec<String>,
    pub created_at: DateTime<Utc>,
}

/// Bounded retry policy with exponential backoff for collaborator calls
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(500),
        }
    }
}

impl RetryPolicy {
    /// Policy with no delay between attempts, for tests
    #[must_use]
    pub fn immediate(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            base_delay: Duration::ZERO,
        }
    }

    /// Delay to wait after the given 1-based failed attempt
    #[must_use]
    pub fn delay_after(&self, attempt: u32) -> Duration {
        self.base_delay * 2u32.saturating_pow(attempt.saturating_sub(1))
    }
}
