//! Document storage for video assets, job records, and reports, backed by
//! `PostgreSQL`
//!
//! Job rows are written by exactly one orchestrator run and read by any
//! number of status pollers. Every mutation is a single guarded `UPDATE` so a
//! concurrent reader always observes a consistent
//! (`status`, `progress`, `current_step`) triple, progress never decreases,
//! and a terminal row is never rewritten.

use presence_common::{Job, JobError, JobStatus, PipelineError, Report, Result, VideoAsset};
use serde::{Deserialize, Serialize};
use tokio_postgres::{Client, NoTls, Row};

/// `PostgreSQL` configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PostgresConfig {
    /// Database host
    pub host: String,

    /// Database port
    pub port: u16,

    /// Database name
    pub database: String,

    /// Database user
    pub user: String,

    /// Database password
    pub password: String,
}

impl Default for PostgresConfig {
    fn default() -> Self {
        Self {
            host: std::env::var("POSTGRES_HOST").unwrap_or_else(|_| "localhost".to_string()),
            port: std::env::var("POSTGRES_PORT")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(5432),
            database: std::env::var("POSTGRES_DB")
                .unwrap_or_else(|_| "presence_insights".to_string()),
            user: std::env::var("POSTGRES_USER").unwrap_or_else(|_| "postgres".to_string()),
            password: std::env::var("POSTGRES_PASSWORD").unwrap_or_default(),
        }
    }
}

impl PostgresConfig {
    /// Build connection string
    #[must_use]
    pub fn connection_string(&self) -> String {
        format!(
            "host={} port={} dbname={} user={} password={}",
            self.host, self.port, self.database, self.user, self.password
        )
    }
}

/// Parse a stored status string back into the enum
pub(crate) fn parse_status(s: &str) -> Result<JobStatus> {
    match s {
        "pending" => Ok(JobStatus::Pending),
        "extracting_audio" => Ok(JobStatus::ExtractingAudio),
        "transcribing" => Ok(JobStatus::Transcribing),
        "analyzing" => Ok(JobStatus::Analyzing),
        "synthesizing" => Ok(JobStatus::Synthesizing),
        "assembling" => Ok(JobStatus::Assembling),
        "completed" => Ok(JobStatus::Completed),
        "failed" => Ok(JobStatus::Failed),
        other => Err(PipelineError::Other(format!(
            "unknown job status in store: {other}"
        ))),
    }
}

/// Document storage trait
#[async_trait::async_trait]
pub trait MetadataStore: Send + Sync {
    /// Initialize database schema (create tables if not exist)
    async fn init_schema(&self) -> Result<()>;

    /// Persist an uploaded video's metadata
    async fn create_video_asset(&self, asset: &VideoAsset) -> Result<()>;

    /// Retrieve video asset metadata by id
    async fn get_video_asset(&self, video_id: &str) -> Result<VideoAsset>;

    /// Create a job record (must be in `pending`)
    async fn create_job(&self, job: &Job) -> Result<()>;

    /// Retrieve a job record by id
    async fn get_job(&self, job_id: &str) -> Result<Job>;

    /// Advance a job to the next stage: one atomic write of
    /// (`status`, `progress`, `current_step`). Rejected if the job is
    /// terminal or the new progress would regress.
    async fn advance_job(
        &self,
        job_id: &str,
        status: JobStatus,
        progress: f64,
        current_step: &str,
    ) -> Result<()>;

    /// Mark a job completed with its report reference
    async fn complete_job(&self, job_id: &str, report_id: &str) -> Result<()>;

    /// Mark a job failed with a stable error record
    async fn fail_job(&self, job_id: &str, error: &JobError) -> Result<()>;

    /// Persist a fully-formed report (written once)
    async fn store_report(&self, report: &Report) -> Result<()>;

    /// Retrieve a report by id
    async fn get_report(&self, report_id: &str) -> Result<Report>;

    /// List a user's reports, newest first
    async fn list_reports(&self, user_id: &str, limit: i64) -> Result<Vec<Report>>;
}

/// `PostgreSQL` document storage implementation
pub struct PostgresMetadataStore {
    client: Client,
}

impl PostgresMetadataStore {
    /// Create a new `PostgreSQL` document storage client
    pub async fn new(config: PostgresConfig) -> Result<Self> {
        let (client, connection) = tokio_postgres::connect(&config.connection_string(), NoTls)
            .await
            .map_err(|e| PipelineError::StorageUnavailable(e.to_string()))?;

        // Spawn connection in background
        tokio::spawn(async move {
            if let Err(e) = connection.await {
                tracing::error!("PostgreSQL connection error: {}", e);
            }
        });

        Ok(Self { client })
    }

    fn job_from_row(row: &Row) -> Result<Job> {
        let status = parse_status(row.get::<_, &str>("status"))?;
        let error: Option<serde_json::Value> = row.get("error");
        let error = error
            .map(serde_json::from_value::<JobError>)
            .transpose()
            .map_err(|e| PipelineError::Other(format!("corrupt job error field: {e}")))?;

        Ok(Job {
            job_id: row.get("job_id"),
            user_id: row.get("user_id"),
            video_id: row.get("video_id"),
            status,
            progress: row.get("progress"),
            current_step: row.get("current_step"),
            report_id: row.get("report_id"),
            error,
            created_at: row.get("created_at"),
            updated_at: row.get("updated_at"),
        })
    }

    fn report_from_row(row: &Row) -> Result<Report> {
        let dimensions: serde_json::Value = row.get("dimensions");
        let tips: serde_json::Value = row.get("tips");

        Ok(Report {
            report_id: row.get("report_id"),
            user_id: row.get("user_id"),
            job_id: row.get("job_id"),
            dimensions: serde_json::from_value(dimensions)
                .map_err(|e| PipelineError::Other(format!("corrupt report dimensions: {e}")))?,
            overall_score: row.get("overall_score"),
            tips: serde_json::from_value(tips)
                .map_err(|e| PipelineError::Other(format!("corrupt report tips: {e}")))?,
            created_at: row.get("created_at"),
        })
    }
}

fn pg_err(e: tokio_postgres::Error) -> PipelineError {
    PipelineError::StorageUnavailable(e.to_string())
}

#[async_trait::async_trait]
impl MetadataStore for PostgresMetadataStore {
    async fn init_schema(&self) -> Result<()> {
        self.client
            .execute(
                r"
                CREATE TABLE IF NOT EXISTS video_assets (
                    video_id TEXT PRIMARY KEY,
                    user_id TEXT NOT NULL,
                    filename TEXT NOT NULL,
                    size_bytes BIGINT NOT NULL,
                    content_type TEXT NOT NULL,
                    uploaded_at TIMESTAMP WITH TIME ZONE NOT NULL
                )
                ",
                &[],
            )
            .await
            .map_err(pg_err)?;

        self.client
            .execute(
                r"
                CREATE TABLE IF NOT EXISTS jobs (
                    job_id TEXT PRIMARY KEY,
                    user_id TEXT NOT NULL,
                    video_id TEXT NOT NULL,
                    status TEXT NOT NULL,
                    progress DOUBLE PRECISION NOT NULL,
                    current_step TEXT NOT NULL,
                    report_id TEXT,
                    error JSONB,
                    created_at TIMESTAMP WITH TIME ZONE NOT NULL,
                    updated_at TIMESTAMP WITH TIME ZONE NOT NULL
                )
                ",
                &[],
            )
            .await
            .map_err(pg_err)?;

        self.client
            .execute(
                r"
                CREATE TABLE IF NOT EXISTS reports (
                    report_id TEXT PRIMARY KEY,
                    user_id TEXT NOT NULL,
                    job_id TEXT NOT NULL,
                    dimensions JSONB NOT NULL,
                    overall_score DOUBLE PRECISION NOT NULL,
                    tips JSONB NOT NULL,
                    created_at TIMESTAMP WITH TIME ZONE NOT NULL
                )
                ",
                &[],
            )
            .await
            .map_err(pg_err)?;

        self.client
            .execute(
                "CREATE INDEX IF NOT EXISTS reports_user_idx ON reports (user_id, created_at DESC)",
                &[],
            )
            .await
            .map_err(pg_err)?;

        Ok(())
    }

    async fn create_video_asset(&self, asset: &VideoAsset) -> Result<()> {
        self.client
            .execute(
                r"
                INSERT INTO video_assets
                    (video_id, user_id, filename, size_bytes, content_type, uploaded_at)
                VALUES ($1, $2, $3, $4, $5, $6)
                ",
                &[
                    &asset.video_id,
                    &asset.user_id,
                    &asset.filename,
                    &(asset.size_bytes as i64),
                    &asset.content_type,
                    &asset.uploaded_at,
                ],
            )
            .await
            .map_err(pg_err)?;
        Ok(())
    }

    async fn get_video_asset(&self, video_id: &str) -> Result<VideoAsset> {
        let row = self
            .client
            .query_opt("SELECT * FROM video_assets WHERE video_id = $1", &[&video_id])
            .await
            .map_err(pg_err)?
            .ok_or_else(|| PipelineError::NotFound(format!("video asset {video_id}")))?;

        Ok(VideoAsset {
            video_id: row.get("video_id"),
            user_id: row.get("user_id"),
            filename: row.get("filename"),
            size_bytes: row.get::<_, i64>("size_bytes") as u64,
            content_type: row.get("content_type"),
            uploaded_at: row.get("uploaded_at"),
        })
    }

    async fn create_job(&self, job: &Job) -> Result<()> {
        let error = job
            .error
            .as_ref()
            .map(serde_json::to_value)
            .transpose()
            .map_err(|e| PipelineError::Other(e.to_string()))?;

        self.client
            .execute(
                r"
                INSERT INTO jobs
                    (job_id, user_id, video_id, status, progress, current_step,
                     report_id, error, created_at, updated_at)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
                ",
                &[
                    &job.job_id,
                    &job.user_id,
                    &job.video_id,
                    &job.status.name(),
                    &job.progress,
                    &job.current_step,
                    &job.report_id,
                    &error,
                    &job.created_at,
                    &job.updated_at,
                ],
            )
            .await
            .map_err(pg_err)?;
        Ok(())
    }

    async fn get_job(&self, job_id: &str) -> Result<Job> {
        let row = self
            .client
            .query_opt("SELECT * FROM jobs WHERE job_id = $1", &[&job_id])
            .await
            .map_err(pg_err)?
            .ok_or_else(|| PipelineError::NotFound(format!("job {job_id}")))?;

        Self::job_from_row(&row)
    }

    async fn advance_job(
        &self,
        job_id: &str,
        status: JobStatus,
        progress: f64,
        current_step: &str,
    ) -> Result<()> {
        let updated = self
            .client
            .execute(
                r"
                UPDATE jobs
                SET status = $2, progress = $3, current_step = $4, updated_at = NOW()
                WHERE job_id = $1
                  AND status NOT IN ('completed', 'failed')
                  AND progress <= $3
                ",
                &[&job_id, &status.name(), &progress, &current_step],
            )
            .await
            .map_err(pg_err)?;

        if updated == 0 {
            // Distinguish a missing job from an illegal transition
            let job = self.get_job(job_id).await?;
            return Err(PipelineError::Other(format!(
                "illegal transition for job {job_id}: {} @ {:.0} -> {} @ {progress:.0}",
                job.status.name(),
                job.progress,
                status.name(),
            )));
        }
        Ok(())
    }

    async fn complete_job(&self, job_id: &str, report_id: &str) -> Result<()> {
        let updated = self
            .client
            .execute(
                r"
                UPDATE jobs
                SET status = 'completed', progress = 100.0, current_step = $3,
                    report_id = $2, updated_at = NOW()
                WHERE job_id = $1 AND status NOT IN ('completed', 'failed')
                ",
                &[&job_id, &report_id, &JobStatus::Completed.step_label()],
            )
            .await
            .map_err(pg_err)?;

        if updated == 0 {
            return Err(PipelineError::Other(format!(
                "job {job_id} is missing or already terminal"
            )));
        }
        Ok(())
    }

    async fn fail_job(&self, job_id: &str, error: &JobError) -> Result<()> {
        let error =
            serde_json::to_value(error).map_err(|e| PipelineError::Other(e.to_string()))?;

        let updated = self
            .client
            .execute(
                r"
                UPDATE jobs
                SET status = 'failed', current_step = $3, error = $2, updated_at = NOW()
                WHERE job_id = $1 AND status NOT IN ('completed', 'failed')
                ",
                &[&job_id, &error, &JobStatus::Failed.step_label()],
            )
            .await
            .map_err(pg_err)?;

        if updated == 0 {
            return Err(PipelineError::Other(format!(
                "job {job_id} is missing or already terminal"
            )));
        }
        Ok(())
    }

    async fn store_report(&self, report: &Report) -> Result<()> {
        let dimensions = serde_json::to_value(&report.dimensions)
            .map_err(|e| PipelineError::Other(e.to_string()))?;
        let tips =
            serde_json::to_value(&report.tips).map_err(|e| PipelineError::Other(e.to_string()))?;

        self.client
            .execute(
                r"
                INSERT INTO reports
                    (report_id, user_id, job_id, dimensions, overall_score, tips, created_at)
                VALUES ($1, $2, $3, $4, $5, $6, $7)
                ",
                &[
                    &report.report_id,
                    &report.user_id,
                    &report.job_id,
                    &dimensions,
                    &report.overall_score,
                    &tips,
                    &report.created_at,
                ],
            )
            .await
            .map_err(pg_err)?;
        Ok(())
    }

    async fn get_report(&self, report_id: &str) -> Result<Report> {
        let row = self
            .client
            .query_opt("SELECT * FROM reports WHERE report_id = $1", &[&report_id])
            .await
            .map_err(pg_err)?
            .ok_or_else(|| PipelineError::NotFound(format!("report {report_id}")))?;

        Self::report_from_row(&row)
    }

    async fn list_reports(&self, user_id: &str, limit: i64) -> Result<Vec<Report>> {
        let rows = self
            .client
            .query(
                r"
                SELECT * FROM reports
                WHERE user_id = $1
                ORDER BY created_at DESC
                LIMIT $2
                ",
                &[&user_id, &limit],
            )
            .await
            .map_err(pg_err)?;

        rows.iter().map(Self::report_from_row).collect()
    }
}
