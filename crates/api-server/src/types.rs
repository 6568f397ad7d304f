//! Request and response types for API endpoints

use presence_common::Report;
use serde::{Deserialize, Serialize};

/// Health check response
#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

/// Response to a successful video upload
#[derive(Debug, Serialize, Deserialize)]
pub struct UploadResponse {
    pub video_id: String,
    pub message: String,
}

/// Response to a processing request
#[derive(Debug, Serialize, Deserialize)]
pub struct ProcessResponse {
    pub job_id: String,
    pub message: String,
}

/// A user's reports, newest first
#[derive(Debug, Serialize, Deserialize)]
pub struct ReportListResponse {
    pub reports: Vec<Report>,
}
