//! In-memory backends for both storage tiers
//!
//! Used by tests and local development (`STORAGE_BACKEND=memory`). The
//! metadata backend enforces the same write guards as the `PostgreSQL`
//! backend and additionally records every (status, progress) write per job,
//! which tests use to assert progress monotonicity.

use crate::object_store::{check_payload_size, ObjectStore};
use crate::MetadataStore;
use presence_common::{Job, JobError, JobStatus, PipelineError, Report, Result, VideoAsset};
use std::collections::HashMap;
use tokio::sync::RwLock;

/// In-memory object storage
#[derive(Default)]
pub struct MemoryObjectStore {
    objects: RwLock<HashMap<String, Vec<u8>>>,
}

impl MemoryObjectStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored objects
    pub async fn len(&self) -> usize {
        self.objects.read().await.len()
    }

    /// Check whether the store holds no objects
    pub async fn is_empty(&self) -> bool {
        self.objects.read().await.is_empty()
    }
}

#[async_trait::async_trait]
impl ObjectStore for MemoryObjectStore {
    async fn store(&self, key: &str, data: &[u8]) -> Result<String> {
        check_payload_size(data.len() as u64)?;
        self.objects
            .write()
            .await
            .insert(key.to_string(), data.to_vec());
        Ok(key.to_string())
    }

    async fn fetch(&self, key: &str) -> Result<Vec<u8>> {
        self.objects
            .read()
            .await
            .get(key)
            .cloned()
            .ok_or_else(|| PipelineError::NotFound(key.to_string()))
    }

    async fn delete(&self, key: &str) -> Result<()> {
        self.objects.write().await.remove(key);
        Ok(())
    }
}

#[derive(Default)]
struct MemoryTables {
    assets: HashMap<String, VideoAsset>,
    jobs: HashMap<String, Job>,
    reports: HashMap<String, Report>,
    /// Every (status, progress) write per job, in write order
    job_trace: HashMap<String, Vec<(JobStatus, f64)>>,
}

/// In-memory document storage
#[derive(Default)]
pub struct MemoryMetadataStore {
    tables: RwLock<MemoryTables>,
}

impl MemoryMetadataStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The sequence of progress values written for a job, in write order
    pub async fn progress_trace(&self, job_id: &str) -> Vec<f64> {
        self.tables
            .read()
            .await
            .job_trace
            .get(job_id)
            .map(|trace| trace.iter().map(|(_, p)| *p).collect())
            .unwrap_or_default()
    }

    /// Number of stored reports
    pub async fn report_count(&self) -> usize {
        self.tables.read().await.reports.len()
    }

    /// Number of stored jobs
    pub async fn job_count(&self) -> usize {
        self.tables.read().await.jobs.len()
    }
}

#[async_trait::async_trait]
impl MetadataStore for MemoryMetadataStore {
    async fn init_schema(&self) -> Result<()> {
        Ok(())
    }

    async fn create_video_asset(&self, asset: &VideoAsset) -> Result<()> {
        self.tables
            .write()
            .await
            .assets
            .insert(asset.video_id.clone(), asset.clone());
        Ok(())
    }

    async fn get_video_asset(&self, video_id: &str) -> Result<VideoAsset> {
        self.tables
            .read()
            .await
            .assets
            .get(video_id)
            .cloned()
            .ok_or_else(|| PipelineError::NotFound(format!("video asset {video_id}")))
    }

    async fn create_job(&self, job: &Job) -> Result<()> {
        let mut tables = self.tables.write().await;
        tables.jobs.insert(job.job_id.clone(), job.clone());
        tables
            .job_trace
            .entry(job.job_id.clone())
            .or_default()
            .push((job.status, job.progress));
        Ok(())
    }

    async fn get_job(&self, job_id: &str) -> Result<Job> {
        self.tables
            .read()
            .await
            .jobs
            .get(job_id)
            .cloned()
            .ok_or_else(|| PipelineError::NotFound(format!("job {job_id}")))
    }

    async fn advance_job(
        &self,
        job_id: &str,
        status: JobStatus,
        progress: f64,
        current_step: &str,
    ) -> Result<()> {
        let mut tables = self.tables.write().await;
        let job = tables
            .jobs
            .get_mut(job_id)
            .ok_or_else(|| PipelineError::NotFound(format!("job {job_id}")))?;

        if job.status.is_terminal() || progress < job.progress {
            return Err(PipelineError::Other(format!(
                "illegal transition for job {job_id}: {} @ {:.0} -> {} @ {progress:.0}",
                job.status.name(),
                job.progress,
                status.name(),
            )));
        }

        job.status = status;
        job.progress = progress;
        job.current_step = current_step.to_string();
        job.updated_at = chrono::Utc::now();
        tables
            .job_trace
            .entry(job_id.to_string())
            .or_default()
            .push((status, progress));
        Ok(())
    }

    async fn complete_job(&self, job_id: &str, report_id: &str) -> Result<()> {
        let mut tables = self.tables.write().await;
        let job = tables
            .jobs
            .get_mut(job_id)
            .ok_or_else(|| PipelineError::NotFound(format!("job {job_id}")))?;

        if job.status.is_terminal() {
            return Err(PipelineError::Other(format!(
                "job {job_id} is already terminal"
            )));
        }

        job.status = JobStatus::Completed;
        job.progress = 100.0;
        job.current_step = JobStatus::Completed.step_label().to_string();
        job.report_id = Some(report_id.to_string());
        job.updated_at = chrono::Utc::now();
        tables
            .job_trace
            .entry(job_id.to_string())
            .or_default()
            .push((JobStatus::Completed, 100.0));
        Ok(())
    }

    async fn fail_job(&self, job_id: &str, error: &JobError) -> Result<()> {
        let mut tables = self.tables.write().await;
        let job = tables
            .jobs
            .get_mut(job_id)
            .ok_or_else(|| PipelineError::NotFound(format!("job {job_id}")))?;

        if job.status.is_terminal() {
            return Err(PipelineError::Other(format!(
                "job {job_id} is already terminal"
            )));
        }

        job.status = JobStatus::Failed;
        job.current_step = JobStatus::Failed.step_label().to_string();
        job.error = Some(error.clone());
        job.updated_at = chrono::Utc::now();
        let progress = job.progress;
        tables
            .job_trace
            .entry(job_id.to_string())
            .or_default()
            .push((JobStatus::Failed, progress));
        Ok(())
    }

    async fn store_report(&self, report: &Report) -> Result<()> {
        self.tables
            .write()
            .await
            .reports
            .insert(report.report_id.clone(), report.clone());
        Ok(())
    }

    async fn get_report(&self, report_id: &str) -> Result<Report> {
        self.tables
            .read()
            .await
            .reports
            .get(report_id)
            .cloned()
            .ok_or_else(|| PipelineError::NotFound(format!("report {report_id}")))
    }

    async fn list_reports(&self, user_id: &str, limit: i64) -> Result<Vec<Report>> {
        let tables = self.tables.read().await;
        let mut reports: Vec<Report> = tables
            .reports
            .values()
            .filter(|r| r.user_id == user_id)
            .cloned()
            .collect();
        reports.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        reports.truncate(limit as usize);
        Ok(reports)
    }
}
