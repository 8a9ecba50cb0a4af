//! Knowledge configuration management.
//!
//! Loaded from `.tutor/knowledge.yaml`; every field has a default so a
//! missing or partial file is valid.

use crate::chunker::ChunkProfile;
use crate::embeddings::EmbeddingConfig;
use crate::error::{RagError, RagResult};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Collection name used by both index backends.
pub const DEFAULT_COLLECTION: &str = "korepetytor_materials";

/// Knowledge settings for a workspace.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct KnowledgeConfig {
    /// Directory with the source PDFs
    #[serde(default = "default_materials_dir")]
    pub materials_dir: PathBuf,

    /// Directory with the pre-parsed record files
    #[serde(default = "default_parsed_dir")]
    pub parsed_dir: PathBuf,

    #[serde(default)]
    pub index: IndexConfig,

    #[serde(default)]
    pub embedding: EmbeddingConfig,

    #[serde(default)]
    pub profiles: ProfilesConfig,

    #[serde(default)]
    pub timeouts: TimeoutsConfig,

    #[serde(default)]
    pub retrieval: RetrievalConfig,
}

fn default_materials_dir() -> PathBuf {
    PathBuf::from("materials")
}

fn default_parsed_dir() -> PathBuf {
    PathBuf::from("parsed")
}

impl Default for KnowledgeConfig {
    fn default() -> Self {
        Self {
            materials_dir: default_materials_dir(),
            parsed_dir: default_parsed_dir(),
            index: IndexConfig::default(),
            embedding: EmbeddingConfig::default(),
            profiles: ProfilesConfig::default(),
            timeouts: TimeoutsConfig::default(),
            retrieval: RetrievalConfig::default(),
        }
    }
}

/// Vector index backend selection.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum IndexBackend {
    #[default]
    Sqlite,
    Lancedb,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct IndexConfig {
    #[serde(default)]
    pub backend: IndexBackend,

    /// SQLite file or LanceDB directory; relative paths resolve against the workspace
    #[serde(default = "default_index_path")]
    pub path: PathBuf,

    #[serde(default = "default_collection")]
    pub collection: String,
}

fn default_index_path() -> PathBuf {
    PathBuf::from(".tutor/index.sqlite")
}

fn default_collection() -> String {
    DEFAULT_COLLECTION.to_string()
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            backend: IndexBackend::default(),
            path: default_index_path(),
            collection: default_collection(),
        }
    }
}

/// Chunking profiles used by the two build pipelines.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct ProfilesConfig {
    #[serde(default = "ChunkProfile::structured")]
    pub structured: ChunkProfile,

    #[serde(default = "ChunkProfile::raw_page", rename = "raw-page")]
    pub raw_page: ChunkProfile,
}

impl Default for ProfilesConfig {
    fn default() -> Self {
        Self {
            structured: ChunkProfile::structured(),
            raw_page: ChunkProfile::raw_page(),
        }
    }
}

/// Bounds on calls to the embedding provider and the index.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct TimeoutsConfig {
    #[serde(default = "default_embed_secs")]
    pub embed_secs: u64,

    #[serde(default = "default_index_secs")]
    pub index_secs: u64,
}

fn default_embed_secs() -> u64 {
    60
}

fn default_index_secs() -> u64 {
    30
}

impl TimeoutsConfig {
    pub fn embed(&self) -> Duration {
        Duration::from_secs(self.embed_secs)
    }

    pub fn index(&self) -> Duration {
        Duration::from_secs(self.index_secs)
    }
}

impl Default for TimeoutsConfig {
    fn default() -> Self {
        Self {
            embed_secs: default_embed_secs(),
            index_secs: default_index_secs(),
        }
    }
}

/// How many matches the retriever requests and how many it keeps.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct RetrievalConfig {
    #[serde(default = "default_request")]
    pub request: usize,

    #[serde(default = "default_keep")]
    pub keep: usize,
}

fn default_request() -> usize {
    5
}

fn default_keep() -> usize {
    4
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            request: default_request(),
            keep: default_keep(),
        }
    }
}

impl KnowledgeConfig {
    /// Resolve a configured path against the workspace root.
    pub fn resolve(&self, workspace: &Path, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            workspace.join(path)
        }
    }

    pub fn parsed_dir(&self, workspace: &Path) -> PathBuf {
        self.resolve(workspace, &self.parsed_dir)
    }

    pub fn materials_dir(&self, workspace: &Path) -> PathBuf {
        self.resolve(workspace, &self.materials_dir)
    }

    pub fn index_path(&self, workspace: &Path) -> PathBuf {
        self.resolve(workspace, &self.index.path)
    }
}

/// Load the knowledge configuration.
///
/// Reads `.tutor/knowledge.yaml` if it exists, otherwise returns defaults.
pub fn load_config(workspace: &Path) -> RagResult<KnowledgeConfig> {
    let config_path = get_config_path(workspace);

    if !config_path.exists() {
        tracing::debug!("No knowledge config at {:?}, using defaults", config_path);
        return Ok(KnowledgeConfig::default());
    }

    let content = fs::read_to_string(&config_path)?;
    let config: KnowledgeConfig = serde_yaml::from_str(&content).map_err(|e| {
        RagError::InvalidConfiguration(format!("Failed to parse {:?}: {}", config_path, e))
    })?;

    tracing::debug!("Loaded knowledge config from {:?}", config_path);
    Ok(config)
}

/// Save the knowledge configuration.
pub fn save_config(workspace: &Path, config: &KnowledgeConfig) -> RagResult<()> {
    let config_path = get_config_path(workspace);

    if let Some(parent) = config_path.parent() {
        fs::create_dir_all(parent)?;
    }

    let yaml = serde_yaml::to_string(config).map_err(|e| {
        RagError::InvalidConfiguration(format!("Failed to serialize config: {}", e))
    })?;
    fs::write(&config_path, yaml)?;

    tracing::debug!("Saved knowledge config to {:?}", config_path);
    Ok(())
}

/// Path of the knowledge config file.
pub fn get_config_path(workspace: &Path) -> PathBuf {
    workspace.join(".tutor").join("knowledge.yaml")
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_load_default_config() {
        let temp = TempDir::new().unwrap();
        let config = load_config(temp.path()).unwrap();

        assert_eq!(config.parsed_dir, PathBuf::from("parsed"));
        assert_eq!(config.index.backend, IndexBackend::Sqlite);
        assert_eq!(config.index.collection, "korepetytor_materials");
        assert_eq!(config.profiles.structured.window_size, 1100);
        assert_eq!(config.profiles.raw_page.overlap, 150);
        assert_eq!(config.timeouts.embed(), Duration::from_secs(60));
        assert_eq!(config.retrieval.request, 5);
        assert_eq!(config.retrieval.keep, 4);
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let temp = TempDir::new().unwrap();
        let path = get_config_path(temp.path());
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(
            &path,
            "parsed_dir: rag/parsed\nprofiles:\n  raw-page:\n    window_size: 500\n    overlap: 50\n",
        )
        .unwrap();

        let config = load_config(temp.path()).unwrap();
        assert_eq!(config.parsed_dir, PathBuf::from("rag/parsed"));
        assert_eq!(config.profiles.raw_page.window_size, 500);
        assert_eq!(config.profiles.structured.window_size, 1100);
        assert_eq!(config.timeouts.index_secs, 30);
    }

    #[test]
    fn test_save_and_load_config() {
        let temp = TempDir::new().unwrap();
        let mut config = KnowledgeConfig::default();
        config.embedding.provider = "mock".to_string();
        config.timeouts.embed_secs = 5;

        save_config(temp.path(), &config).unwrap();
        let loaded = load_config(temp.path()).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_malformed_file_is_invalid_configuration() {
        let temp = TempDir::new().unwrap();
        let path = get_config_path(temp.path());
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, "timeouts: [not, a, map]\n").unwrap();

        let err = load_config(temp.path()).unwrap_err();
        assert!(matches!(err, RagError::InvalidConfiguration(_)));
    }

    #[test]
    fn test_resolve_paths() {
        let config = KnowledgeConfig::default();
        let ws = Path::new("/srv/tutor");
        assert_eq!(config.parsed_dir(ws), PathBuf::from("/srv/tutor/parsed"));
        assert_eq!(
            config.index_path(ws),
            PathBuf::from("/srv/tutor/.tutor/index.sqlite")
        );
    }
}
