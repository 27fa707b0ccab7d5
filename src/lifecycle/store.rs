//! Write-once result partitions, one per organization.
//!
//! Each shard is the only writer of its organization's partition, so a
//! second write under the same key is rejected rather than merged.

use log::{info, warn};
use serde_json::Value;
use std::collections::BTreeMap;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use thiserror::Error;
use tokio::io::AsyncWriteExt;
use walkdir::WalkDir;

use crate::runtime::AsyncTask;

use super::record::ClassificationResult;

const PARTITION_EXTENSION: &str = "json";

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Partition for {0} already written")]
    AlreadyWritten(String),

    #[error("Invalid partition key '{0}'")]
    InvalidKey(String),

    #[error("I/O error on {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Malformed partition {path}: {source}")]
    Malformed {
        path: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("Store task failed: {0}")]
    Task(String),
}

/// Results of one organization.
#[derive(Clone, Debug, PartialEq)]
pub struct ResultPartition {
    organization: String,
    results: Vec<ClassificationResult>,
}

impl ResultPartition {
    pub fn new(organization: impl Into<String>, results: Vec<ClassificationResult>) -> Self {
        Self {
            organization: organization.into(),
            results,
        }
    }

    #[must_use]
    pub fn organization(&self) -> &str {
        &self.organization
    }

    #[must_use]
    pub fn results(&self) -> &[ClassificationResult] {
        &self.results
    }

    #[must_use]
    pub fn into_results(self) -> Vec<ClassificationResult> {
        self.results
    }
}

/// Partitioned persistence between shards and the aggregator.
pub trait ResultStore: Send + Sync {
    /// Write a partition once. Fails if the key was already written.
    fn write_partition(
        &self,
        partition: &ResultPartition,
    ) -> impl Future<Output = Result<(), StoreError>> + Send;

    /// Read one partition, `None` when it was never written.
    fn read_partition(
        &self,
        organization: &str,
    ) -> impl Future<Output = Result<Option<ResultPartition>, StoreError>> + Send;

    /// Keys of every written partition, sorted.
    fn partition_keys(&self) -> impl Future<Output = Result<Vec<String>, StoreError>> + Send;
}

/// One safe path component: ASCII alphanumerics, `-`, `_` and `.`.
fn validate_key(key: &str) -> Result<(), StoreError> {
    let valid = !key.is_empty()
        && !key.starts_with('-')
        && key
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == '.')
        && key != "."
        && key != "..";
    if valid {
        Ok(())
    } else {
        Err(StoreError::InvalidKey(key.to_string()))
    }
}

/// Decode records, skipping any that do not parse.
fn decode_records(organization: &str, records: Vec<Value>) -> Vec<ClassificationResult> {
    records
        .into_iter()
        .filter_map(|record| match serde_json::from_value::<ClassificationResult>(record) {
            Ok(result) => Some(result),
            Err(e) => {
                warn!("Skipping unreadable record in partition {organization}: {e}");
                None
            }
        })
        .collect()
}

/// In-process store for tests and dry runs.
#[derive(Debug, Default)]
pub struct MemoryResultStore {
    partitions: Mutex<BTreeMap<String, Vec<Value>>>,
}

impl MemoryResultStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Store raw record documents, bypassing encoding. Only for tests that
    /// need partitions holding unreadable records.
    #[doc(hidden)]
    pub fn insert_raw(&self, organization: impl Into<String>, records: Vec<Value>) {
        if let Ok(mut partitions) = self.partitions.lock() {
            partitions.insert(organization.into(), records);
        }
    }
}

impl ResultStore for MemoryResultStore {
    async fn write_partition(&self, partition: &ResultPartition) -> Result<(), StoreError> {
        validate_key(partition.organization())?;
        let records = partition
            .results()
            .iter()
            .map(serde_json::to_value)
            .collect::<Result<Vec<_>, _>>()
            .map_err(|source| StoreError::Malformed {
                path: partition.organization().to_string(),
                source,
            })?;

        let mut partitions = self
            .partitions
            .lock()
            .map_err(|e| StoreError::Task(e.to_string()))?;
        if partitions.contains_key(partition.organization()) {
            return Err(StoreError::AlreadyWritten(partition.organization().to_string()));
        }
        partitions.insert(partition.organization().to_string(), records);
        Ok(())
    }

    async fn read_partition(&self, organization: &str) -> Result<Option<ResultPartition>, StoreError> {
        let records = {
            let partitions = self
                .partitions
                .lock()
                .map_err(|e| StoreError::Task(e.to_string()))?;
            partitions.get(organization).cloned()
        };
        Ok(records.map(|records| {
            ResultPartition::new(organization, decode_records(organization, records))
        }))
    }

    async fn partition_keys(&self) -> Result<Vec<String>, StoreError> {
        let partitions = self
            .partitions
            .lock()
            .map_err(|e| StoreError::Task(e.to_string()))?;
        Ok(partitions.keys().cloned().collect())
    }
}

/// One JSON file per organization under a run directory.
#[derive(Clone, Debug)]
pub struct FsResultStore {
    root: PathBuf,
}

impl FsResultStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Claim the next free `attempt-<n>` directory under
    /// `results_dir/run_ref`.
    ///
    /// CI re-runs keep their run reference, so each attempt gets its own
    /// root and never collides with the partitions of an earlier one.
    pub fn for_run(results_dir: impl AsRef<Path>, run_ref: &str) -> Result<Self, StoreError> {
        validate_key(run_ref)?;
        let run_dir = results_dir.as_ref().join(run_ref);
        std::fs::create_dir_all(&run_dir).map_err(io_error(&run_dir))?;

        let mut attempt = 1u32;
        loop {
            let root = run_dir.join(format!("attempt-{attempt}"));
            match std::fs::create_dir(&root) {
                Ok(()) => {
                    info!("Writing partitions to {}", root.display());
                    return Ok(Self { root });
                }
                Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => attempt += 1,
                Err(e) => return Err(io_error(&root)(e)),
            }
        }
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn partition_path(&self, organization: &str) -> Result<PathBuf, StoreError> {
        validate_key(organization)?;
        Ok(self
            .root
            .join(format!("{organization}.{PARTITION_EXTENSION}")))
    }
}

fn io_error(path: &Path) -> impl FnOnce(std::io::Error) -> StoreError + '_ {
    move |source| StoreError::Io {
        path: path.display().to_string(),
        source,
    }
}

impl ResultStore for FsResultStore {
    async fn write_partition(&self, partition: &ResultPartition) -> Result<(), StoreError> {
        let path = self.partition_path(partition.organization())?;
        let bytes = serde_json::to_vec_pretty(partition.results()).map_err(|source| {
            StoreError::Malformed {
                path: path.display().to_string(),
                source,
            }
        })?;

        tokio::fs::create_dir_all(&self.root)
            .await
            .map_err(io_error(&self.root))?;

        let mut file = match tokio::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .await
        {
            Ok(file) => file,
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                return Err(StoreError::AlreadyWritten(partition.organization().to_string()));
            }
            Err(e) => return Err(io_error(&path)(e)),
        };
        file.write_all(&bytes).await.map_err(io_error(&path))?;
        file.sync_all().await.map_err(io_error(&path))?;
        Ok(())
    }

    async fn read_partition(&self, organization: &str) -> Result<Option<ResultPartition>, StoreError> {
        let path = self.partition_path(organization)?;
        let bytes = match tokio::fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(io_error(&path)(e)),
        };
        let records: Vec<Value> =
            serde_json::from_slice(&bytes).map_err(|source| StoreError::Malformed {
                path: path.display().to_string(),
                source,
            })?;
        Ok(Some(ResultPartition::new(
            organization,
            decode_records(organization, records),
        )))
    }

    async fn partition_keys(&self) -> Result<Vec<String>, StoreError> {
        let root = self.root.clone();
        let keys = AsyncTask::spawn(move || {
            if !root.exists() {
                return Vec::new();
            }
            let mut keys: Vec<String> = WalkDir::new(&root)
                .min_depth(1)
                .max_depth(1)
                .into_iter()
                .filter_map(Result::ok)
                .filter(|entry| entry.file_type().is_file())
                .filter(|entry| {
                    entry.path().extension().and_then(|e| e.to_str()) == Some(PARTITION_EXTENSION)
                })
                .filter_map(|entry| {
                    entry
                        .path()
                        .file_stem()
                        .and_then(|s| s.to_str())
                        .map(str::to_string)
                })
                .collect();
            keys.sort();
            keys
        })
        .await
        .map_err(|e| StoreError::Task(e.to_string()))?;
        Ok(keys)
    }
}
