//! HTTP request handlers for API endpoints

use axum::{
    extract::{Multipart, Path, State},
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    Json,
};
use chrono::Utc;
use presence_common::{Job, PipelineError, VideoAsset};
use presence_storage::MAX_UPLOAD_BYTES;
use tracing::{info, warn};
use uuid::Uuid;

use crate::types::{HealthResponse, ProcessResponse, ReportListResponse, UploadResponse};
use crate::AppState;

/// Maximum number of reports returned by the list endpoint
const REPORT_LIST_LIMIT: i64 = 50;

/// Resolve the calling user.
///
/// Authentication is handled upstream; this service only needs the owning
/// user id for the records it writes, taken from a plain header.
fn caller_id(headers: &HeaderMap) -> String {
    headers
        .get("x-user-id")
        .and_then(|value| value.to_str().ok())
        .filter(|value| !value.is_empty())
        .unwrap_or("anonymous")
        .to_string()
}

/// Map a pipeline error onto an HTTP response
fn error_response(err: &PipelineError) -> (StatusCode, String) {
    let status = match err {
        PipelineError::NotFound(_) => StatusCode::NOT_FOUND,
        PipelineError::PayloadTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
        PipelineError::UnsupportedFormat(_) => StatusCode::UNSUPPORTED_MEDIA_TYPE,
        PipelineError::StorageUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    (status, err.to_string())
}

/// Health check endpoint
pub async fn health_check() -> impl IntoResponse {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// Upload a video.
///
/// The upload ceiling is enforced here and again inside the object store,
/// before any byte is persisted; a rejected upload leaves no blob and no
/// metadata behind.
pub async fn upload_video(
    State(state): State<AppState>,
    headers: HeaderMap,
    mut multipart: Multipart,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let user_id = caller_id(&headers);

    while let Some(field) = multipart.next_field().await.map_err(|e| {
        (
            StatusCode::BAD_REQUEST,
            format!("Malformed multipart body: {e}"),
        )
    })? {
        if field.name() != Some("file") {
            continue;
        }

        let filename = field
            .file_name()
            .unwrap_or("upload.mp4")
            .to_string();
        let content_type = field
            .content_type()
            .unwrap_or("application/octet-stream")
            .to_string();

        let data = field.bytes().await.map_err(|e| {
            (
                StatusCode::PAYLOAD_TOO_LARGE,
                format!("Failed to read upload: {e}"),
            )
        })?;

        if data.len() as u64 > MAX_UPLOAD_BYTES {
            return Err((
                StatusCode::PAYLOAD_TOO_LARGE,
                format!(
                    "Video size exceeds {} MiB limit",
                    MAX_UPLOAD_BYTES / (1024 * 1024)
                ),
            ));
        }

        let video_id = format!("vid_{}", Uuid::new_v4().simple());
        state
            .blobs
            .store(&video_id, &data)
            .await
            .map_err(|e| error_response(&e))?;

        let asset = VideoAsset {
            video_id: video_id.clone(),
            user_id,
            filename,
            size_bytes: data.len() as u64,
            content_type,
            uploaded_at: Utc::now(),
        };
        state
            .store
            .create_video_asset(&asset)
            .await
            .map_err(|e| error_response(&e))?;

        info!(
            "Stored upload {} ({} bytes) for user {}",
            video_id, asset.size_bytes, asset.user_id
        );

        return Ok(Json(UploadResponse {
            video_id,
            message: "Video uploaded successfully".to_string(),
        }));
    }

    Err((
        StatusCode::BAD_REQUEST,
        "Missing 'file' field in multipart body".to_string(),
    ))
}

/// Start processing an uploaded video.
///
/// Creates the job in `pending` and enqueues it; the pipeline runs in the
/// background and this handler returns immediately.
pub async fn process_video(
    State(state): State<AppState>,
    Path(video_id): Path<String>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let user_id = caller_id(&headers);

    let asset = state
        .store
        .get_video_asset(&video_id)
        .await
        .map_err(|e| error_response(&e))?;
    if asset.user_id != user_id {
        return Err((StatusCode::NOT_FOUND, format!("video asset {video_id}")));
    }

    let job_id = format!("job_{}", Uuid::new_v4().simple());
    let job = Job::new(job_id.clone(), user_id, video_id);
    state
        .store
        .create_job(&job)
        .await
        .map_err(|e| error_response(&e))?;

    if let Err(e) = state.scheduler.enqueue(job_id.clone()).await {
        warn!("Failed to enqueue job {}: {}", job_id, e);
        return Err(error_response(&e));
    }

    Ok((
        StatusCode::ACCEPTED,
        Json(ProcessResponse {
            job_id,
            message: "Processing started".to_string(),
        }),
    ))
}

/// Get job status.
///
/// Returns the job record verbatim; safe to poll concurrently while the
/// orchestrator advances the job.
pub async fn get_job_status(
    State(state): State<AppState>,
    Path(job_id): Path<String>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let user_id = caller_id(&headers);

    let job = state
        .store
        .get_job(&job_id)
        .await
        .map_err(|e| error_response(&e))?;
    if job.user_id != user_id {
        return Err((StatusCode::NOT_FOUND, format!("job {job_id}")));
    }

    Ok(Json(job))
}

/// Get one report
pub async fn get_report(
    State(state): State<AppState>,
    Path(report_id): Path<String>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let user_id = caller_id(&headers);

    let report = state
        .store
        .get_report(&report_id)
        .await
        .map_err(|e| error_response(&e))?;
    if report.user_id != user_id {
        return Err((StatusCode::NOT_FOUND, format!("report {report_id}")));
    }

    Ok(Json(report))
}

/// List the caller's reports, newest first
pub async fn list_reports(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let user_id = caller_id(&headers);

    let reports = state
        .store
        .list_reports(&user_id, REPORT_LIST_LIMIT)
        .await
        .map_err(|e| error_response(&e))?;

    Ok(Json(ReportListResponse { reports }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_caller_id_defaults_to_anonymous() {
        let headers = HeaderMap::new();
        assert_eq!(caller_id(&headers), "anonymous");

        let mut headers = HeaderMap::new();
        headers.insert("x-user-id", "user_42".parse().unwrap());
        assert_eq!(caller_id(&headers), "user_42");
    }

    #[test]
    fn test_error_response_mapping() {
        let (status, _) = error_response(&PipelineError::NotFound("job x".to_string()));
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, _) = error_response(&PipelineError::PayloadTooLarge { size: 1, max: 0 });
        assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);

        let (status, _) =
            error_response(&PipelineError::StorageUnavailable("s3 down".to_string()));
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);

        let (status, _) = error_response(&PipelineError::Other("boom".to_string()));
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    }
}
