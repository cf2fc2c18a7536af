//! Persistence collaborators for configuration and buffered telemetry
//!
//! Backing storage is opaque to the engine: the file stores below persist
//! JSON blobs under a data directory, while the in-memory stores back tests
//! and hosts without a filesystem. Configuration uses two logical blobs
//! (optimization toggles, thresholds) so either can be updated alone.

use crate::config::{OptimizationConfig, ThresholdSet};
use crate::error::{Error, Result};
use crate::record::{ActionRecord, ErrorRecord, MetricRecord};
use async_trait::async_trait;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::fs;

const CONFIG_FILE: &str = "optimization_config.json";
const THRESHOLDS_FILE: &str = "thresholds.json";
const BUFFERS_FILE: &str = "telemetry_buffers.json";

/// Persisted engine configuration
#[async_trait]
pub trait ConfigStore: Send + Sync {
    /// Load the persisted configuration, `None` when nothing was saved yet
    async fn load(&self) -> Result<Option<(OptimizationConfig, ThresholdSet)>>;
    async fn save(&self, config: &OptimizationConfig, thresholds: &ThresholdSet) -> Result<()>;
    /// Erase all persisted configuration state
    async fn clear(&self) -> Result<()>;
}

/// Buffered telemetry that survived a shutdown
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StoredTelemetry {
    pub metrics: Vec<MetricRecord>,
    pub errors: Vec<ErrorRecord>,
    pub actions: Vec<ActionRecord>,
}

impl StoredTelemetry {
    pub fn is_empty(&self) -> bool {
        self.metrics.is_empty() && self.errors.is_empty() && self.actions.is_empty()
    }
}

/// Persisted buffer snapshots, loaded at init and rewritten after a
/// successful flush
#[async_trait]
pub trait BufferStore: Send + Sync {
    async fn load(&self) -> Result<Option<StoredTelemetry>>;
    async fn save(&self, telemetry: &StoredTelemetry) -> Result<()>;
    async fn clear(&self) -> Result<()>;
}

/// File-backed config store keeping two JSON blobs under a data directory
pub struct FileConfigStore {
    dir: PathBuf,
}

impl FileConfigStore {
    pub async fn new<P: AsRef<Path>>(dir: P) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        if !dir.exists() {
            fs::create_dir_all(&dir)
                .await
                .map_err(|e| Error::Storage(format!("failed to create data directory: {}", e)))?;
        }
        Ok(Self { dir })
    }

    fn config_path(&self) -> PathBuf {
        self.dir.join(CONFIG_FILE)
    }

    fn thresholds_path(&self) -> PathBuf {
        self.dir.join(THRESHOLDS_FILE)
    }
}

async fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<Option<T>> {
    match fs::read(path).await {
        Ok(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(Error::Storage(format!(
            "failed to read {}: {}",
            path.display(),
            e
        ))),
    }
}

async fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let bytes = serde_json::to_vec_pretty(value)?;
    fs::write(path, bytes)
        .await
        .map_err(|e| Error::Storage(format!("failed to write {}: {}", path.display(), e)))
}

async fn remove_if_exists(path: &Path) -> Result<()> {
    match fs::remove_file(path).await {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(Error::Storage(format!(
            "failed to remove {}: {}",
            path.display(),
            e
        ))),
    }
}

#[async_trait]
impl ConfigStore for FileConfigStore {
    async fn load(&self) -> Result<Option<(OptimizationConfig, ThresholdSet)>> {
        let config: Option<OptimizationConfig> = read_json(&self.config_path()).await?;
        let thresholds: Option<ThresholdSet> = read_json(&self.thresholds_path()).await?;
        if config.is_none() && thresholds.is_none() {
            return Ok(None);
        }
        Ok(Some((
            config.unwrap_or_default(),
            thresholds.unwrap_or_default(),
        )))
    }

    async fn save(&self, config: &OptimizationConfig, thresholds: &ThresholdSet) -> Result<()> {
        write_json(&self.config_path(), config).await?;
        write_json(&self.thresholds_path(), thresholds).await
    }

    async fn clear(&self) -> Result<()> {
        remove_if_exists(&self.config_path()).await?;
        remove_if_exists(&self.thresholds_path()).await
    }
}

/// File-backed buffer store keeping one JSON blob under a data directory
pub struct FileBufferStore {
    dir: PathBuf,
}

impl FileBufferStore {
    pub async fn new<P: AsRef<Path>>(dir: P) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        if !dir.exists() {
            fs::create_dir_all(&dir)
                .await
                .map_err(|e| Error::Storage(format!("failed to create data directory: {}", e)))?;
        }
        Ok(Self { dir })
    }

    fn path(&self) -> PathBuf {
        self.dir.join(BUFFERS_FILE)
    }
}

#[async_trait]
impl BufferStore for FileBufferStore {
    async fn load(&self) -> Result<Option<StoredTelemetry>> {
        read_json(&self.path()).await
    }

    async fn save(&self, telemetry: &StoredTelemetry) -> Result<()> {
        write_json(&self.path(), telemetry).await
    }

    async fn clear(&self) -> Result<()> {
        remove_if_exists(&self.path()).await
    }
}

/// In-memory config store for tests and filesystem-less hosts
#[derive(Default)]
pub struct MemoryConfigStore {
    state: Mutex<Option<(OptimizationConfig, ThresholdSet)>>,
}

impl MemoryConfigStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ConfigStore for MemoryConfigStore {
    async fn load(&self) -> Result<Option<(OptimizationConfig, ThresholdSet)>> {
        Ok(self.state.lock().clone())
    }

    async fn save(&self, config: &OptimizationConfig, thresholds: &ThresholdSet) -> Result<()> {
        *self.state.lock() = Some((config.clone(), thresholds.clone()));
        Ok(())
    }

    async fn clear(&self) -> Result<()> {
        *self.state.lock() = None;
        Ok(())
    }
}

/// In-memory buffer store for tests and filesystem-less hosts
#[derive(Default)]
pub struct MemoryBufferStore {
    state: Mutex<Option<StoredTelemetry>>,
}

impl MemoryBufferStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl BufferStore for MemoryBufferStore {
    async fn load(&self) -> Result<Option<StoredTelemetry>> {
        Ok(self.state.lock().clone())
    }

    async fn save(&self, telemetry: &StoredTelemetry) -> Result<()> {
        *self.state.lock() = Some(telemetry.clone());
        Ok(())
    }

    async fn clear(&self) -> Result<()> {
        *self.state.lock() = None;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::{MetricCategory, MetricRecord};

    #[tokio::test]
    async fn test_memory_config_store_round_trip() {
        let store = MemoryConfigStore::new();
        assert!(store.load().await.unwrap().is_none());

        let mut config = OptimizationConfig::default();
        config.prefetching = false;
        let thresholds = ThresholdSet {
            max_memory_mb: 128.0,
            ..ThresholdSet::default()
        };
        store.save(&config, &thresholds).await.unwrap();

        let (loaded_config, loaded_thresholds) = store.load().await.unwrap().unwrap();
        assert!(!loaded_config.prefetching);
        assert_eq!(loaded_thresholds.max_memory_mb, 128.0);

        store.clear().await.unwrap();
        assert!(store.load().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_file_config_store_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileConfigStore::new(dir.path()).await.unwrap();
        assert!(store.load().await.unwrap().is_none());

        let config = OptimizationConfig::default();
        let thresholds = ThresholdSet {
            max_cpu_percent: 45.0,
            ..ThresholdSet::default()
        };
        store.save(&config, &thresholds).await.unwrap();

        let (_, loaded) = store.load().await.unwrap().unwrap();
        assert_eq!(loaded.max_cpu_percent, 45.0);

        store.clear().await.unwrap();
        assert!(store.load().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_file_buffer_store_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileBufferStore::new(dir.path()).await.unwrap();
        assert!(store.load().await.unwrap().is_none());

        let telemetry = StoredTelemetry {
            metrics: vec![MetricRecord {
                timestamp: 123,
                category: MetricCategory::ApiCall,
                name: "api".into(),
                value: None,
                duration_ms: Some(50),
                metadata: None,
            }],
            errors: Vec::new(),
            actions: Vec::new(),
        };
        store.save(&telemetry).await.unwrap();

        let loaded = store.load().await.unwrap().unwrap();
        assert_eq!(loaded.metrics.len(), 1);
        assert_eq!(loaded.metrics[0].timestamp, 123);

        store.clear().await.unwrap();
        assert!(store.load().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_corrupt_config_blob_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileConfigStore::new(dir.path()).await.unwrap();
        tokio::fs::write(dir.path().join(CONFIG_FILE), b"not json")
            .await
            .unwrap();
        assert!(store.load().await.is_err());
    }
}
