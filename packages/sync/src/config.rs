use crate::backend::Backend;
use crate::errors::ConfigError;
use crate::file::FileBackend;
use crate::memory::MemoryBackend;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

pub const DEFAULT_CONFIG_NAME: &str = "bindery.config.json";

/// Bindery configuration file format
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppConfig {
    /// Identifier of the bound data set
    #[serde(default = "default_id")]
    pub id: String,

    /// Where data is saved (`none` disables saving)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub storage: Option<String>,

    /// Where initial data comes from when storage has none
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,

    /// Schema file describing the template tree
    #[serde(default = "default_template")]
    pub template: String,

    /// Enter edit mode as soon as editing is permitted
    #[serde(default)]
    pub auto_edit: bool,

    #[serde(default = "default_autosave_delay")]
    pub autosave_delay_ms: u64,

    #[serde(default = "default_notice_timeout")]
    pub notice_timeout_ms: u64,

    /// Soft-delete fade duration
    #[serde(default = "default_fade")]
    pub fade_ms: u64,
}

fn default_id() -> String {
    "data".to_string()
}

fn default_template() -> String {
    "schema.json".to_string()
}

fn default_autosave_delay() -> u64 {
    3000
}

fn default_notice_timeout() -> u64 {
    5000
}

fn default_fade() -> u64 {
    400
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            id: default_id(),
            storage: None,
            source: None,
            template: default_template(),
            auto_edit: false,
            autosave_delay_ms: default_autosave_delay(),
            notice_timeout_ms: default_notice_timeout(),
            fade_ms: default_fade(),
        }
    }
}

impl AppConfig {
    /// Load config from a directory, falling back to defaults
    pub fn load(dir: &Path) -> Result<Self, ConfigError> {
        let config_path = dir.join(DEFAULT_CONFIG_NAME);

        if config_path.exists() {
            let content = std::fs::read_to_string(&config_path)?;
            Ok(serde_json::from_str(&content)?)
        } else {
            Ok(AppConfig::default())
        }
    }

    pub fn storage_spec(&self) -> BackendSpec {
        BackendSpec::parse(self.storage.as_deref())
    }

    pub fn source_spec(&self) -> BackendSpec {
        BackendSpec::parse(self.source.as_deref())
    }

    pub fn template_path(&self, dir: &Path) -> PathBuf {
        dir.join(&self.template)
    }

    pub fn autosave_delay(&self) -> Duration {
        Duration::from_millis(self.autosave_delay_ms)
    }

    pub fn notice_timeout(&self) -> Duration {
        Duration::from_millis(self.notice_timeout_ms)
    }

    pub fn fade(&self) -> Duration {
        Duration::from_millis(self.fade_ms)
    }
}

/// Parsed form of a `storage`/`source` setting
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackendSpec {
    None,
    /// `memory:<id>`
    Memory(String),
    File(PathBuf),
}

impl BackendSpec {
    pub fn parse(value: Option<&str>) -> Self {
        match value.map(str::trim) {
            None | Some("") | Some("none") => BackendSpec::None,
            Some(value) => match value.strip_prefix("memory:") {
                Some(id) => BackendSpec::Memory(id.to_string()),
                None => BackendSpec::File(PathBuf::from(value)),
            },
        }
    }

    /// Instantiate the backend, resolving file paths against `dir`
    pub fn build(&self, dir: &Path) -> Option<Arc<dyn Backend>> {
        match self {
            BackendSpec::None => None,
            BackendSpec::Memory(id) => Some(Arc::new(MemoryBackend::new(id.clone()))),
            BackendSpec::File(path) => Some(Arc::new(FileBackend::new(dir.join(path)))),
        }
    }
}
