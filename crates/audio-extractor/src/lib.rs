//! Audio extraction stage
//!
//! Derives a mono, fixed-sample-rate PCM audio stream from an uploaded video
//! by shelling out to `ffmpeg`. A non-zero exit code or a missing output
//! artifact is a hard failure of the stage. All intermediate files live in a
//! scoped temporary directory that is removed on every exit path.

use presence_common::{PipelineError, Result};
use std::path::Path;
use std::process::Stdio;
use tempfile::TempDir;
use tokio::process::Command;
use tracing::debug;

/// Container formats accepted at the pipeline boundary
pub const SUPPORTED_EXTENSIONS: &[&str] = &["mp4", "mov", "avi", "mkv", "webm"];

/// How much of ffmpeg's stderr to keep in an error message
const STDERR_EXCERPT_LEN: usize = 500;

/// Audio extraction configuration
#[derive(Debug, Clone)]
pub struct AudioConfig {
    /// Target sample rate (16000 for speech models)
    pub sample_rate: u32,
    /// Number of channels (1 for mono)
    pub channels: u8,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            sample_rate: 16000,
            channels: 1,
        }
    }
}

/// Check whether a filename carries an accepted container extension
#[must_use]
pub fn is_supported_container(filename: &str) -> bool {
    Path::new(filename)
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| {
            let ext = ext.to_ascii_lowercase();
            SUPPORTED_EXTENSIONS.contains(&ext.as_str())
        })
        .unwrap_or(false)
}

/// Build the ffmpeg argument list for a video -> PCM WAV conversion
fn build_ffmpeg_args(input: &Path, output: &Path, config: &AudioConfig) -> Vec<String> {
    vec![
        "-i".to_string(),
        input.display().to_string(),
        "-vn".to_string(),
        "-acodec".to_string(),
        "pcm_s16le".to_string(),
        "-ar".to_string(),
        config.sample_rate.to_string(),
        "-ac".to_string(),
        config.channels.to_string(),
        "-y".to_string(),
        output.display().to_string(),
    ]
}

/// Audio extraction trait
#[async_trait::async_trait]
pub trait AudioExtractor: Send + Sync {
    /// Extract a mono PCM WAV audio stream from raw video bytes.
    ///
    /// `source_name` is the original filename; its extension is validated
    /// against the container allow-list before any process is spawned.
    async fn extract(&self, video: &[u8], source_name: &str) -> Result<Vec<u8>>;
}

/// FFmpeg-backed audio extractor
#[derive(Debug, Clone, Default)]
pub struct FfmpegAudioExtractor {
    config: AudioConfig,
}

impl FfmpegAudioExtractor {
    #[must_use]
    pub fn new(config: AudioConfig) -> Self {
        Self { config }
    }
}

#[async_trait::async_trait]
impl AudioExtractor for FfmpegAudioExtractor {
    async fn extract(&self, video: &[u8], source_name: &str) -> Result<Vec<u8>> {
        if !is_supported_container(source_name) {
            return Err(PipelineError::UnsupportedFormat(format!(
                "unsupported container for {source_name} (accepted: {})",
                SUPPORTED_EXTENSIONS.join(", ")
            )));
        }

        // Scoped working directory; dropped (and removed) on every exit path
        let workdir = TempDir::new()?;
        let extension = Path::new(source_name)
            .extension()
            .and_then(|ext| ext.to_str())
            .unwrap_or("mp4")
            .to_ascii_lowercase();
        let input_path = workdir.path().join(format!("input.{extension}"));
        let output_path = workdir.path().join("audio.wav");

        tokio::fs::write(&input_path, video).await?;

        let args = build_ffmpeg_args(&input_path, &output_path, &self.config);
        debug!("Running ffmpeg {}", args.join(" "));

        let output = Command::new("ffmpeg")
            .args(&args)
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .output()
            .await
            .map_err(|e| {
                PipelineError::AudioExtractionFailed(format!("failed to spawn ffmpeg: {e}"))
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let excerpt: String = stderr
                .chars()
                .rev()
                .take(STDERR_EXCERPT_LEN)
                .collect::<Vec<_>>()
                .into_iter()
                .rev()
                .collect();
            return Err(PipelineError::AudioExtractionFailed(format!(
                "ffmpeg exited with {}: {excerpt}",
                output.status
            )));
        }

        if !output_path.exists() {
            return Err(PipelineError::AudioExtractionFailed(
                "ffmpeg succeeded but produced no output artifact".to_string(),
            ));
        }

        let audio = tokio::fs::read(&output_path).await?;
        Ok(audio)
    }
}
