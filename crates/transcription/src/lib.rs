//! Transcription stage
//!
//! Converts extracted audio into a [`Transcript`] with word- and
//! segment-level timing by calling the speech-to-text collaborator.
//! Service errors are retried with bounded exponential backoff; a
//! non-error response with an empty `text` field is a distinct terminal
//! condition (`EmptyTranscript`), never silently scored downstream.

use presence_common::{PipelineError, Result, RetryPolicy, TimedSpan, Transcript};
use serde::Deserialize;
use tracing::warn;

/// Transcription service configuration
#[derive(Debug, Clone)]
pub struct TranscriptionConfig {
    /// Base URL of the OpenAI-compatible API
    pub base_url: String,
    /// Bearer token
    pub api_key: String,
    /// Model identifier
    pub model: String,
}

impl Default for TranscriptionConfig {
    fn default() -> Self {
        Self {
            base_url: std::env::var("TRANSCRIPTION_API_URL")
                .unwrap_or_else(|_| "https://api.openai.com/v1".to_string()),
            api_key: std::env::var("OPENAI_API_KEY").unwrap_or_default(),
            model: std::env::var("TRANSCRIPTION_MODEL")
                .unwrap_or_else(|_| "whisper-1".to_string()),
        }
    }
}

/// Verbose transcription payload from the collaborator.
///
/// Every optional field defaults to empty: the absence of word or segment
/// timing is tolerated, not an error.
#[derive(Debug, Deserialize)]
struct VerboseTranscription {
    #[serde(default)]
    text: String,
    #[serde(default)]
    words: Vec<ApiWord>,
    #[serde(default)]
    segments: Vec<ApiSegment>,
    #[serde(default)]
    duration: f64,
}

#[derive(Debug, Deserialize)]
struct ApiWord {
    word: String,
    #[serde(default)]
    start: f64,
    #[serde(default)]
    end: f64,
}

#[derive(Debug, Deserialize)]
struct ApiSegment {
    text: String,
    #[serde(default)]
    start: f64,
    #[serde(default)]
    end: f64,
}

impl From<VerboseTranscription> for Transcript {
    fn from(payload: VerboseTranscription) -> Self {
        Self {
            text: payload.text,
            words: payload
                .words
                .into_iter()
                .map(|w| TimedSpan {
                    text: w.word,
                    start: w.start,
                    end: w.end,
                })
                .collect(),
            segments: payload
                .segments
                .into_iter()
                .map(|s| TimedSpan {
                    text: s.text,
                    start: s.start,
                    end: s.end,
                })
                .collect(),
            duration: payload.duration,
        }
    }
}

/// Speech-to-text collaborator trait
#[async_trait::async_trait]
pub trait Transcriber: Send + Sync {
    /// Transcribe a mono PCM WAV stream, requesting word- and
    /// segment-level timestamps
    async fn transcribe(&self, audio: &[u8]) -> Result<Transcript>;
}

/// HTTP client for an OpenAI-compatible transcription endpoint
pub struct HttpTranscriptionClient {
    client: reqwest::Client,
    config: TranscriptionConfig,
}

impl HttpTranscriptionClient {
    #[must_use]
    pub fn new(config: TranscriptionConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            config,
        }
    }
}

#[async_trait::async_trait]
impl Transcriber for HttpTranscriptionClient {
    async fn transcribe(&self, audio: &[u8]) -> Result<Transcript> {
        let file_part = reqwest::multipart::Part::bytes(audio.to_vec())
            .file_name("audio.wav")
            .mime_str("audio/wav")
            .map_err(|e| PipelineError::TranscriptionFailed(e.to_string()))?;

        let form = reqwest::multipart::Form::new()
            .part("file", file_part)
            .text("model", self.config.model.clone())
            .text("response_format", "verbose_json")
            .text("timestamp_granularities[]", "word")
            .text("timestamp_granularities[]", "segment");

        let response = self
            .client
            .post(format!("{}/audio/transcriptions", self.config.base_url))
            .header("Authorization", format!("Bearer {}", self.config.api_key))
            .multipart(form)
            .send()
            .await
            .map_err(|e| PipelineError::TranscriptionFailed(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(PipelineError::TranscriptionFailed(format!(
                "transcription service returned {status}: {body}"
            )));
        }

        let payload: VerboseTranscription = response
            .json()
            .await
            .map_err(|e| PipelineError::TranscriptionFailed(e.to_string()))?;

        Ok(payload.into())
    }
}

/// Run the transcription stage with bounded retries.
///
/// Transport/service errors are retried with exponential backoff; a
/// successful but empty transcript is also retried. After the attempts are
/// exhausted the final condition decides the error: `EmptyTranscript` if
/// the collaborator last answered with no text, `TranscriptionFailed`
/// otherwise.
pub async fn transcribe_with_retry(
    transcriber: &dyn Transcriber,
    audio: &[u8],
    policy: &RetryPolicy,
) -> Result<Transcript> {
    let mut last_error = PipelineError::TranscriptionFailed("no attempts made".to_string());

    for attempt in 1..=policy.max_attempts {
        match transcriber.transcribe(audio).await {
            Ok(transcript) if transcript.text.trim().is_empty() => {
                warn!(
                    "Transcription attempt {}/{} returned an empty transcript",
                    attempt, policy.max_attempts
                );
                last_error = PipelineError::EmptyTranscript;
            }
            Ok(transcript) => return Ok(transcript),
            Err(e) => {
                warn!(
                    "Transcription attempt {}/{} failed: {}",
                    attempt, policy.max_attempts, e
                );
                last_error = e;
            }
        }

        if attempt < policy.max_attempts {
            tokio::time::sleep(policy.delay_after(attempt)).await;
        }
    }

    Err(last_error)
}
