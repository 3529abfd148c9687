//! Coordinator configuration
//!
//! Loaded from a JSON file. Only `data_dir` and at least one storage engine
//! are required; everything else has a default.
//!
//! ```json
//! {
//!   "data_dir": "/var/lib/polyroute",
//!   "replica_num": 1,
//!   "storage_engines": [
//!     { "id": 0, "kind": "filesystem" },
//!     { "id": 1, "kind": "filesystem", "params": { "dir": "/mnt/b" } }
//!   ]
//! }
//! ```

mod errors;

use std::collections::{BTreeMap, HashSet};
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::metadata::StorageEngineMeta;
use crate::observability::{log_event_with_fields, Event};
use crate::storage::filesystem;

pub use errors::{ConfigError, ConfigResult};

/// One backend to connect at startup
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorageEngineConfig {
    pub id: u64,
    pub kind: String,
    #[serde(default)]
    pub params: BTreeMap<String, String>,
}

impl StorageEngineConfig {
    /// Engine descriptor; a filesystem engine without `dir` lives under
    /// `<data_dir>/engine-<id>`
    pub fn to_engine_meta(&self, data_dir: &Path) -> StorageEngineMeta {
        let mut meta = StorageEngineMeta::new(self.id, self.kind.clone());
        meta.extra = self.params.clone();
        if self.kind == filesystem::KIND && !meta.extra.contains_key("dir") {
            let dir = data_dir.join(format!("engine-{}", self.id));
            meta.extra
                .insert("dir".to_string(), dir.to_string_lossy().into_owned());
        }
        meta
    }
}

/// Configuration file structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Root for engines that do not name their own directory (required)
    pub data_dir: String,

    /// Secondary replicas per insert (default 1)
    #[serde(default = "default_replica_num")]
    pub replica_num: usize,

    /// Points per adapter flush (default 10000)
    #[serde(default = "default_insert_batch_size")]
    pub insert_batch_size: usize,

    /// Path components forming the routing key (default 1)
    #[serde(default = "default_routing_key_depth")]
    pub routing_key_depth: usize,

    #[serde(default)]
    pub storage_engines: Vec<StorageEngineConfig>,
}

fn default_replica_num() -> usize {
    1
}
fn default_insert_batch_size() -> usize {
    10000
}
fn default_routing_key_depth() -> usize {
    1
}

impl Config {
    /// Load configuration from file
    pub fn load(path: &Path) -> ConfigResult<Self> {
        let content = fs::read_to_string(path).map_err(|e| ConfigError::Read {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
        let config = Self::from_json(&content)?;

        let engines = config.storage_engines.len().to_string();
        log_event_with_fields(
            Event::ConfigLoaded,
            &[
                ("path", path.display().to_string().as_str()),
                ("storage_engines", engines.as_str()),
            ],
        );
        Ok(config)
    }

    /// Parse and validate
    pub fn from_json(content: &str) -> ConfigResult<Self> {
        let config: Config =
            serde_json::from_str(content).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> ConfigResult<()> {
        if self.data_dir.trim().is_empty() {
            return Err(ConfigError::Invalid("data_dir must not be empty".into()));
        }
        if self.insert_batch_size == 0 {
            return Err(ConfigError::Invalid("insert_batch_size must be > 0".into()));
        }
        if self.routing_key_depth == 0 {
            return Err(ConfigError::Invalid("routing_key_depth must be > 0".into()));
        }
        if self.storage_engines.is_empty() {
            return Err(ConfigError::Invalid(
                "at least one storage engine is required".into(),
            ));
        }

        let mut ids = HashSet::new();
        for engine in &self.storage_engines {
            if !ids.insert(engine.id) {
                return Err(ConfigError::Invalid(format!(
                    "storage engine id {} declared twice",
                    engine.id
                )));
            }
            if engine.kind.trim().is_empty() {
                return Err(ConfigError::Invalid(format!(
                    "storage engine {} has no kind",
                    engine.id
                )));
            }
        }
        Ok(())
    }

    pub fn data_path(&self) -> &Path {
        Path::new(&self.data_dir)
    }

    /// Descriptors for every configured engine
    pub fn engine_metas(&self) -> Vec<StorageEngineMeta> {
        self.storage_engines
            .iter()
            .map(|e| e.to_engine_meta(self.data_path()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_defaults() {
        let config = Config::from_json(
            r#"{"data_dir": "/tmp/poly", "storage_engines": [{"id": 0, "kind": "filesystem"}]}"#,
        )
        .unwrap();
        assert_eq!(config.replica_num, 1);
        assert_eq!(config.insert_batch_size, 10000);
        assert_eq!(config.routing_key_depth, 1);
    }

    #[test]
    fn test_filesystem_dir_defaults_under_data_dir() {
        let config = Config::from_json(
            r#"{"data_dir": "/tmp/poly", "storage_engines": [
                {"id": 3, "kind": "filesystem"},
                {"id": 4, "kind": "filesystem", "params": {"dir": "/mnt/b"}}
            ]}"#,
        )
        .unwrap();
        let metas = config.engine_metas();
        let expected = Path::new("/tmp/poly")
            .join("engine-3")
            .to_string_lossy()
            .into_owned();
        assert_eq!(metas[0].param("dir"), Some(expected.as_str()));
        assert_eq!(metas[1].param("dir"), Some("/mnt/b"));
    }

    #[test]
    fn test_invalid_values() {
        let err = Config::from_json(
            r#"{"data_dir": "/tmp/poly", "insert_batch_size": 0, "storage_engines": [{"id": 0, "kind": "filesystem"}]}"#,
        )
        .unwrap_err();
        assert_eq!(err.code(), "POLY_CONFIG_INVALID");

        let err = Config::from_json(
            r#"{"data_dir": "/tmp/poly", "storage_engines": [
                {"id": 0, "kind": "filesystem"}, {"id": 0, "kind": "filesystem"}
            ]}"#,
        )
        .unwrap_err();
        assert!(err.to_string().contains("declared twice"));

        let err = Config::from_json(r#"{"data_dir": "/tmp/poly"}"#).unwrap_err();
        assert_eq!(err.code(), "POLY_CONFIG_INVALID");
    }

    #[test]
    fn test_malformed_json() {
        let err = Config::from_json("{not json").unwrap_err();
        assert_eq!(err.code(), "POLY_CONFIG_PARSE");
    }

    #[test]
    fn test_load_from_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("polyroute.json");
        fs::write(
            &path,
            r#"{"data_dir": "/tmp/poly", "replica_num": 0, "storage_engines": [{"id": 0, "kind": "filesystem"}]}"#,
        )
        .unwrap();

        let config = Config::load(&path).unwrap();
        assert_eq!(config.replica_num, 0);

        let err = Config::load(&dir.path().join("missing.json")).unwrap_err();
        assert_eq!(err.code(), "POLY_CONFIG_READ");
    }
}
