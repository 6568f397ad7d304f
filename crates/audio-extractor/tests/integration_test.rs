//! Integration tests that exercise the real ffmpeg binary.
//!
//! Skipped when ffmpeg is not installed on the machine running the tests.

use presence_audio_extractor::{AudioConfig, AudioExtractor, FfmpegAudioExtractor};
use presence_common::PipelineError;

fn ffmpeg_available() -> bool {
    std::process::Command::new("ffmpeg")
        .arg("-version")
        .output()
        .is_ok()
}

#[tokio::test]
async fn test_garbage_input_is_a_hard_failure() {
    if !ffmpeg_available() {
        eprintln!("Skipping test - ffmpeg not installed");
        return;
    }

    let extractor = FfmpegAudioExtractor::new(AudioConfig::default());
    let err = extractor
        .extract(b"this is not a valid mp4 container", "broken.mp4")
        .await
        .unwrap_err();

    match err {
        PipelineError::AudioExtractionFailed(msg) => {
            assert!(msg.contains("ffmpeg"), "unexpected message: {msg}");
        }
        other => panic!("expected AudioExtractionFailed, got {other:?}"),
    }
}
