//! Configuration repository abstraction.
//!
//! A [`ConfigBackend`] holds every registered configuration document, keyed
//! by a numeric configuration ID, and remembers which one is the default.
//! Documents cross this boundary only as JSON text.
//!
//! Two implementations are provided:
//!
//! - [`MemoryBackend`] keeps everything in memory and is used by tests.
//! - [`LocalRepository`] keeps documents in a directory:
//!
//! ```text
//! <root>/
//! ├── configs/<id>.json
//! ├── registry.json
//! └── default_id
//! ```

use std::{
    collections::BTreeMap,
    fs,
    path::{Path, PathBuf},
};

use chrono::Local;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{
    error::{ConfigError, Result},
    store::RecordStore,
};

/// The default configuration document shipped with the tool.
pub const TEMPLATE_JSON: &str = include_str!("template.json");

/// Timestamp format of `SYS_CREATE_DT`.
const CREATE_DT_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.3f";

/// Storage and validation of configuration documents.
pub trait ConfigBackend {
    /// ID of the default configuration, `0` when none is registered.
    fn get_default_config_id(&self) -> Result<i64>;

    /// Make `config_id` the default configuration.
    ///
    /// # Errors
    ///
    /// Fails when `config_id` is not registered.
    fn set_default_config_id(&mut self, config_id: i64) -> Result<()>;

    /// JSON of a registered configuration.
    fn export_config(&self, config_id: i64) -> Result<String>;

    /// JSON of the default template document.
    fn create_config_from_template(&self) -> Result<String> {
        normalize(TEMPLATE_JSON)
    }

    /// Validate a document and return its normalized JSON.
    fn create_config_from_json(&self, json: &str) -> Result<String> {
        normalize(json)
    }

    /// Store a document under a fresh configuration ID.
    fn register_config(&mut self, json: &str, comment: &str) -> Result<i64>;

    /// Registry listing as `{"CONFIGS": [...]}` JSON.
    fn get_config_registry(&self) -> Result<String>;
}

/// Parse, check and re-encode a configuration document.
fn normalize(json: &str) -> Result<String> {
    let store = RecordStore::from_json(json)?;
    store.to_json()
}

/// One registered configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RegistryEntry {
    #[serde(rename = "CONFIG_ID")]
    pub config_id: i64,
    #[serde(rename = "CONFIG_COMMENTS")]
    pub comments: String,
    #[serde(rename = "SYS_CREATE_DT")]
    pub created: String,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct Registry {
    #[serde(rename = "CONFIGS")]
    configs: Vec<RegistryEntry>,
}

impl Registry {
    fn next_id(&self) -> i64 {
        self.configs
            .iter()
            .map(|c| c.config_id)
            .max()
            .map_or(1, |id| id + 1)
    }

    fn contains(&self, config_id: i64) -> bool {
        self.configs.iter().any(|c| c.config_id == config_id)
    }

    fn push(&mut self, comment: &str) -> i64 {
        let config_id = self.next_id();
        self.configs.push(RegistryEntry {
            config_id,
            comments: comment.to_string(),
            created: Local::now().format(CREATE_DT_FORMAT).to_string(),
        });
        config_id
    }
}

/// Keeps every registered document in memory.
#[derive(Debug, Default)]
pub struct MemoryBackend {
    registry: Registry,
    documents: BTreeMap<i64, String>,
    default_id: i64,
}

impl MemoryBackend {
    /// An empty repository with no default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// A repository whose default configuration is `doc`.
    ///
    /// # Errors
    ///
    /// Fails when `doc` is not a configuration document.
    pub fn with_document(doc: &Value, comment: &str) -> Result<Self> {
        let mut backend = Self::new();
        let json = backend.create_config_from_json(&doc.to_string())?;
        let config_id = backend.register_config(&json, comment)?;
        backend.set_default_config_id(config_id)?;
        Ok(backend)
    }
}

impl ConfigBackend for MemoryBackend {
    fn get_default_config_id(&self) -> Result<i64> {
        Ok(self.default_id)
    }

    fn set_default_config_id(&mut self, config_id: i64) -> Result<()> {
        if !self.registry.contains(config_id) {
            return Err(ConfigError::Backend(format!(
                "configuration {config_id} is not registered"
            )));
        }
        self.default_id = config_id;
        Ok(())
    }

    fn export_config(&self, config_id: i64) -> Result<String> {
        self.documents
            .get(&config_id)
            .cloned()
            .ok_or_else(|| ConfigError::Backend(format!("configuration {config_id} is not registered")))
    }

    fn register_config(&mut self, json: &str, comment: &str) -> Result<i64> {
        let json = normalize(json)?;
        let config_id = self.registry.push(comment);
        self.documents.insert(config_id, json);
        Ok(config_id)
    }

    fn get_config_registry(&self) -> Result<String> {
        Ok(serde_json::to_string(&self.registry)?)
    }
}

/// A configuration repository in a local directory.
#[derive(Debug)]
pub struct LocalRepository {
    root: PathBuf,
    registry: Registry,
}

impl LocalRepository {
    /// Open the repository at `root`, creating it when missing.
    ///
    /// A freshly created repository registers the template document as its
    /// first configuration and makes it the default.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Io`] when the directory cannot be created or
    /// read and [`ConfigError::Json`] for a corrupt registry.
    pub fn open(root: impl AsRef<Path>) -> Result<Self> {
        let root = root.as_ref().to_path_buf();
        fs::create_dir_all(root.join("configs"))?;

        let registry_path = root.join("registry.json");
        let registry = if registry_path.exists() {
            serde_json::from_str(&fs::read_to_string(&registry_path)?)?
        } else {
            Registry::default()
        };

        let mut repo = Self { root, registry };
        if repo.registry.configs.is_empty() {
            info!("creating configuration repository at {}", repo.root.display());
            let template = repo.create_config_from_template()?;
            let config_id = repo.register_config(&template, "Default configuration")?;
            repo.set_default_config_id(config_id)?;
        }
        Ok(repo)
    }

    /// Directory the repository lives in.
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn config_path(&self, config_id: i64) -> PathBuf {
        self.root.join("configs").join(format!("{config_id}.json"))
    }

    fn save_registry(&self) -> Result<()> {
        let text = serde_json::to_string_pretty(&self.registry)?;
        fs::write(self.root.join("registry.json"), text)?;
        Ok(())
    }
}

impl ConfigBackend for LocalRepository {
    fn get_default_config_id(&self) -> Result<i64> {
        let path = self.root.join("default_id");
        if !path.exists() {
            return Ok(0);
        }
        let text = fs::read_to_string(&path)?;
        text.trim()
            .parse()
            .map_err(|_| ConfigError::Backend(format!("corrupt default_id in {}", self.root.display())))
    }

    fn set_default_config_id(&mut self, config_id: i64) -> Result<()> {
        if !self.registry.contains(config_id) {
            return Err(ConfigError::Backend(format!(
                "configuration {config_id} is not registered"
            )));
        }
        fs::write(self.root.join("default_id"), config_id.to_string())?;
        debug!("default configuration is now {config_id}");
        Ok(())
    }

    fn export_config(&self, config_id: i64) -> Result<String> {
        if !self.registry.contains(config_id) {
            return Err(ConfigError::Backend(format!(
                "configuration {config_id} is not registered"
            )));
        }
        Ok(fs::read_to_string(self.config_path(config_id))?)
    }

    fn register_config(&mut self, json: &str, comment: &str) -> Result<i64> {
        let json = normalize(json)?;
        let config_id = self.registry.next_id();
        fs::write(self.config_path(config_id), json)?;
        self.registry.push(comment);
        self.save_registry()?;
        debug!("registered configuration {config_id}: {comment}");
        Ok(config_id)
    }

    fn get_config_registry(&self) -> Result<String> {
        Ok(serde_json::to_string(&self.registry)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_template_is_valid() {
        let store = RecordStore::from_json(TEMPLATE_JSON).unwrap();
        assert!(store.has_table("CFG_DSRC"));
        assert!(store.section("CONFIG_BASE_VERSION").is_some());
    }

    #[test]
    fn test_memory_register_and_default() {
        let mut backend = MemoryBackend::new();
        assert_eq!(backend.get_default_config_id().unwrap(), 0);

        let template = backend.create_config_from_template().unwrap();
        let first = backend.register_config(&template, "first").unwrap();
        let second = backend.register_config(&template, "second").unwrap();
        assert_eq!((first, second), (1, 2));

        backend.set_default_config_id(second).unwrap();
        assert_eq!(backend.get_default_config_id().unwrap(), 2);
        assert!(backend.set_default_config_id(9).is_err());

        let registry: Value = serde_json::from_str(&backend.get_config_registry().unwrap()).unwrap();
        assert_eq!(registry["CONFIGS"][1]["CONFIG_COMMENTS"], "second");
    }

    #[test]
    fn test_rejects_non_config_json() {
        let backend = MemoryBackend::new();
        assert!(backend.create_config_from_json("{\"A\": 1}").is_err());
        assert!(backend.create_config_from_json("not json").is_err());
    }

    #[test]
    fn test_local_repository_persists() {
        let dir = tempfile::tempdir().unwrap();
        let config_id = {
            let mut repo = LocalRepository::open(dir.path()).unwrap();
            assert_eq!(repo.get_default_config_id().unwrap(), 1);
            let json = repo.export_config(1).unwrap();
            let config_id = repo.register_config(&json, "copy").unwrap();
            repo.set_default_config_id(config_id).unwrap();
            config_id
        };

        let repo = LocalRepository::open(dir.path()).unwrap();
        assert_eq!(repo.get_default_config_id().unwrap(), config_id);
        assert!(dir.path().join("configs/2.json").exists());
        assert!(repo.export_config(3).is_err());
    }
}
