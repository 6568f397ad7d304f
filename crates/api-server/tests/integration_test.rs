//! Integration tests for the API server
//!
//! These start the real server over in-memory storage backends and scripted
//! pipeline collaborators, then drive the full upload -> process -> poll ->
//! report flow over HTTP.

use presence_analysis::AnalysisModel;
use presence_api_server::AppState;
use presence_audio_extractor::AudioExtractor;
use presence_common::{PipelineError, Result, RetryPolicy, Transcript};
use presence_orchestrator::{Orchestrator, PipelineScheduler, SchedulerConfig};
use presence_storage::{MemoryMetadataStore, MemoryObjectStore};
use presence_transcription::Transcriber;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;

struct StubExtractor;

#[async_trait::async_trait]
impl AudioExtractor for StubExtractor {
    async fn extract(&self, _video: &[u8], source_name: &str) -> Result<Vec<u8>> {
        if !presence_audio_extractor::is_supported_container(source_name) {
            return Err(PipelineError::UnsupportedFormat(source_name.to_string()));
        }
        Ok(b"RIFF....WAVE".to_vec())
    }
}

struct StubTranscriber;

#[async_trait::async_trait]
impl Transcriber for StubTranscriber {
    async fn transcribe(&self, _audio: &[u8]) -> Result<Transcript> {
        Ok(Transcript {
            text: "we committed to the new roadmap because the data demanded it".to_string(),
            duration: 21.0,
            ..Default::default()
        })
    }
}

struct StubModel;

#[async_trait::async_trait]
impl AnalysisModel for StubModel {
    async fn complete(&self, prompt: &str, _max_tokens: u32) -> Result<String> {
        if prompt.contains("GRAVITAS") {
            Ok(r#"{"commanding_presence": 70, "decisiveness": 70, "poise_under_pressure": 70,
                   "emotional_intelligence": 70, "vision_articulation": 70,
                   "overall_gravitas": 70.0, "key_observations": []}"#
                .to_string())
        } else if prompt.contains("STORYTELLING") {
            Ok(r#"{"has_story": false, "observations": ["No narrative present"]}"#.to_string())
        } else {
            Ok(r#"["Lead with the decision", "Add one concrete story", "Pause between sections",
                   "Quantify the outcome", "Confident tone - keep it up"]"#
                .to_string())
        }
    }
}

fn test_state() -> AppState {
    let store = Arc::new(MemoryMetadataStore::new());
    let blobs = Arc::new(MemoryObjectStore::new());

    let orchestrator = Arc::new(
        Orchestrator::new(
            store.clone(),
            blobs.clone(),
            Arc::new(StubExtractor),
            Arc::new(StubTranscriber),
            Arc::new(StubModel),
        )
        .with_retry_policy(RetryPolicy::immediate(3)),
    );
    let scheduler = PipelineScheduler::start(orchestrator, SchedulerConfig::default());

    AppState::new(store, blobs, scheduler)
}

async fn start_test_server(addr: &'static str) {
    let state = test_state();
    tokio::spawn(async move {
        presence_api_server::start_server(addr, state)
            .await
            .expect("Failed to start server");
    });

    // Give server time to start
    sleep(Duration::from_millis(300)).await;
}

#[tokio::test]
async fn test_health_endpoint() {
    start_test_server("127.0.0.1:18090").await;

    let client = reqwest::Client::new();
    let response = client
        .get("http://127.0.0.1:18090/health")
        .send()
        .await
        .expect("Failed to send health check request");

    assert_eq!(response.status(), 200);

    let json: serde_json::Value = response.json().await.expect("Failed to parse JSON");
    assert_eq!(json["status"], "ok");
    assert!(json["version"].is_string());
}

#[tokio::test]
async fn test_upload_process_poll_report_flow() {
    start_test_server("127.0.0.1:18091").await;
    let base = "http://127.0.0.1:18091";
    let client = reqwest::Client::new();

    // Upload a small "video"
    let form = reqwest::multipart::Form::new().part(
        "file",
        reqwest::multipart::Part::bytes(vec![0u8; 2 * 1024 * 1024])
            .file_name("standup.mp4")
            .mime_str("video/mp4")
            .unwrap(),
    );
    let response = client
        .post(format!("{base}/api/videos/upload"))
        .header("x-user-id", "user_7")
        .multipart(form)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);
    let upload: serde_json::Value = response.json().await.unwrap();
    let video_id = upload["video_id"].as_str().unwrap().to_string();

    // Start processing
    let response = client
        .post(format!("{base}/api/videos/{video_id}/process"))
        .header("x-user-id", "user_7")
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 202);
    let process: serde_json::Value = response.json().await.unwrap();
    let job_id = process["job_id"].as_str().unwrap().to_string();

    // Poll until terminal, checking that progress never decreases
    let mut last_progress = -1.0;
    let mut job = serde_json::Value::Null;
    for _ in 0..100 {
        let response = client
            .get(format!("{base}/api/jobs/{job_id}/status"))
            .header("x-user-id", "user_7")
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), 200);
        job = response.json().await.unwrap();

        let progress = job["progress"].as_f64().unwrap();
        assert!(
            progress >= last_progress,
            "progress regressed: {last_progress} -> {progress}"
        );
        last_progress = progress;

        let status = job["status"].as_str().unwrap();
        if status == "completed" || status == "failed" {
            break;
        }
        sleep(Duration::from_millis(50)).await;
    }

    assert_eq!(job["status"], "completed");
    assert_eq!(job["progress"], 100.0);
    assert_eq!(job["current_step"], "Complete");
    let report_id = job["report_id"].as_str().expect("report reference missing");

    // Fetch the report
    let response = client
        .get(format!("{base}/api/reports/{report_id}"))
        .header("x-user-id", "user_7")
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);
    let report: serde_json::Value = response.json().await.unwrap();

    // Storytelling found no narrative, so the composite is gravitas alone
    assert_eq!(report["overall_score"], 70.0);
    assert!(report["dimensions"]["gravitas"]["scores"]["decisiveness"].is_number());
    assert_eq!(report["dimensions"]["storytelling"]["not_applicable"], true);
    assert_eq!(report["tips"].as_array().unwrap().len(), 5);

    // The report shows up in the caller's list
    let response = client
        .get(format!("{base}/api/reports"))
        .header("x-user-id", "user_7")
        .send()
        .await
        .unwrap();
    let list: serde_json::Value = response.json().await.unwrap();
    assert_eq!(list["reports"].as_array().unwrap().len(), 1);

    // Another caller cannot see the job or the report
    let response = client
        .get(format!("{base}/api/jobs/{job_id}/status"))
        .header("x-user-id", "someone_else")
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 404);
}

#[tokio::test]
async fn test_process_unknown_video_is_not_found() {
    start_test_server("127.0.0.1:18092").await;

    let client = reqwest::Client::new();
    let response = client
        .post("http://127.0.0.1:18092/api/videos/vid_missing/process")
        .header("x-user-id", "user_7")
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 404);
}
