//! Storage layer for the executive-presence analysis pipeline
//!
//! Two tiers:
//! - **Object storage (S3/MinIO)**: raw uploaded video bytes
//! - **Document storage (`PostgreSQL`)**: video asset metadata, job records,
//!   and completed reports
//!
//! Both tiers are defined as traits so the orchestrator and API server can
//! run against the in-memory backends in tests and local development.
//!
//! Concurrency contract for job records: exactly one orchestrator run writes
//! a given job; status pollers read concurrently without locking. The
//! document store enforces the two invariants that make that safe to observe:
//! progress never decreases, and terminal jobs accept no further writes.

pub mod memory;
pub mod metadata_store;
pub mod object_store;

pub use memory::{MemoryMetadataStore, MemoryObjectStore};
pub use metadata_store::{MetadataStore, PostgresConfig, PostgresMetadataStore};
pub use object_store::{ObjectStore, S3Config, S3ObjectStore, MAX_UPLOAD_BYTES};

use serde::{Deserialize, Serialize};

/// Complete storage configuration for both tiers
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct StorageConfig {
    /// S3/MinIO configuration for object storage
    #[serde(default)]
    pub s3: S3Config,

    /// `PostgreSQL` configuration for document storage
    #[serde(default)]
    pub postgres: PostgresConfig,
}
