//! Runtime settings loader for vecfuse.
//!
//! Loads and merges:
//! - System defaults: `<PRJ_ROOT>/packages/conf/settings.yaml`
//! - User overrides:  `<PRJ_CONFIG_HOME>/vecfuse/settings.yaml`
//!
//! Merge precedence is user over system. Unreadable or malformed files are
//! logged and skipped.

use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use std::time::Duration;

use serde::Deserialize;
use vecfuse_types::FilterFallback;

use crate::VectorStoreError;
use crate::client::{BackendKind, ClientConfig};
use crate::filter::DEFAULT_FILE_EXTENSIONS;
use crate::fusion::{Execution, FusionPolicy, ModalityFailurePolicy};

const DEFAULT_SYSTEM_SETTINGS_RELATIVE_PATH: &str = "packages/conf/settings.yaml";
const DEFAULT_USER_SETTINGS_RELATIVE_PATH: &str = "vecfuse/settings.yaml";
const DEFAULT_CONFIG_HOME_RELATIVE_PATH: &str = ".config";
const DEFAULT_LANCE_PATH: &str = ".data/vecfuse";
/// Embedding dimension used when no settings file names one.
pub const DEFAULT_DIMENSION: usize = 1024;
static CONFIG_HOME_OVERRIDE: OnceLock<PathBuf> = OnceLock::new();

/// Merged YAML settings. Every field is optional so files can overlay.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RuntimeSettings {
    /// Backend selection
    #[serde(default)]
    pub backend: BackendSettings,
    /// Filter translation
    #[serde(default)]
    pub filter: FilterSettings,
    /// Fusion engine
    #[serde(default)]
    pub fusion: FusionSettings,
}

/// `backend:` section.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct BackendSettings {
    /// `lance` or `memory`
    pub kind: Option<String>,
    /// Lance base directory; relative paths resolve against the project root
    pub path: Option<String>,
    /// Embedding dimension for new collections
    pub dimension: Option<usize>,
}

/// `filter:` section.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct FilterSettings {
    /// Policy for unparseable filter expressions
    pub fallback: Option<FilterFallback>,
    /// Extensions of the default predicate
    pub default_extensions: Option<Vec<String>>,
}

/// `fusion:` section.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct FusionSettings {
    /// `fail` or `degrade`
    pub on_modality_failure: Option<ModalityFailurePolicy>,
    /// `sequential` or `concurrent`
    pub execution: Option<Execution>,
    /// Whole-call deadline; `0` disables it
    pub timeout_ms: Option<u64>,
}

impl RuntimeSettings {
    fn merge(self, overlay: Self) -> Self {
        Self {
            backend: self.backend.merge(overlay.backend),
            filter: self.filter.merge(overlay.filter),
            fusion: self.fusion.merge(overlay.fusion),
        }
    }

    /// Resolve into a client configuration.
    ///
    /// # Errors
    ///
    /// Returns [`VectorStoreError::InvalidConfig`] for an unknown backend kind.
    pub fn client_config(&self) -> Result<ClientConfig, VectorStoreError> {
        let backend = match self
            .backend
            .kind
            .as_deref()
            .map(str::trim)
            .unwrap_or("lance")
            .to_ascii_lowercase()
            .as_str()
        {
            "lance" => {
                let raw = self.backend.path.as_deref().unwrap_or(DEFAULT_LANCE_PATH);
                BackendKind::Lance {
                    path: absolutize(&project_root(), PathBuf::from(raw)),
                }
            }
            "memory" => BackendKind::Memory,
            other => {
                return Err(VectorStoreError::InvalidConfig(format!(
                    "unknown backend kind '{other}' (expected 'lance' or 'memory')"
                )));
            }
        };

        let fusion = FusionPolicy {
            on_modality_failure: self.fusion.on_modality_failure.unwrap_or_default(),
            execution: self.fusion.execution.unwrap_or_default(),
            timeout: self
                .fusion
                .timeout_ms
                .filter(|ms| *ms > 0)
                .map(Duration::from_millis),
        };

        Ok(ClientConfig {
            backend,
            dimension: self.backend.dimension.unwrap_or(DEFAULT_DIMENSION),
            filter_fallback: self.filter.fallback.unwrap_or_default(),
            fusion,
            default_extensions: self.filter.default_extensions.clone().unwrap_or_else(|| {
                DEFAULT_FILE_EXTENSIONS
                    .iter()
                    .map(ToString::to_string)
                    .collect()
            }),
        })
    }
}

impl BackendSettings {
    fn merge(self, overlay: Self) -> Self {
        Self {
            kind: overlay.kind.or(self.kind),
            path: overlay.path.or(self.path),
            dimension: overlay.dimension.or(self.dimension),
        }
    }
}

impl FilterSettings {
    fn merge(self, overlay: Self) -> Self {
        Self {
            fallback: overlay.fallback.or(self.fallback),
            default_extensions: overlay.default_extensions.or(self.default_extensions),
        }
    }
}

impl FusionSettings {
    fn merge(self, overlay: Self) -> Self {
        Self {
            on_modality_failure: overlay.on_modality_failure.or(self.on_modality_failure),
            execution: overlay.execution.or(self.execution),
            timeout_ms: overlay.timeout_ms.or(self.timeout_ms),
        }
    }
}

/// Load system and user settings and merge them.
#[must_use]
pub fn load_runtime_settings() -> RuntimeSettings {
    let (system_path, user_path) = runtime_settings_paths();
    load_runtime_settings_from_paths(&system_path, &user_path)
}

#[doc(hidden)]
#[must_use]
pub fn runtime_settings_paths() -> (PathBuf, PathBuf) {
    let root = project_root();
    let system_path = root.join(DEFAULT_SYSTEM_SETTINGS_RELATIVE_PATH);
    let user_path = resolve_config_home(&root).join(DEFAULT_USER_SETTINGS_RELATIVE_PATH);
    (system_path, user_path)
}

#[doc(hidden)]
#[must_use]
pub fn load_runtime_settings_from_paths(system: &Path, user: &Path) -> RuntimeSettings {
    load_one(system).merge(load_one(user))
}

fn load_one(path: &Path) -> RuntimeSettings {
    if !path.exists() {
        return RuntimeSettings::default();
    }
    let raw = match std::fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(error) => {
            log::warn!(
                "failed to read settings file {}: {error}; ignoring",
                path.display()
            );
            return RuntimeSettings::default();
        }
    };
    match serde_yaml::from_str::<RuntimeSettings>(&raw) {
        Ok(value) => value,
        Err(error) => {
            log::warn!(
                "failed to parse settings yaml {}: {error}; ignoring file",
                path.display()
            );
            RuntimeSettings::default()
        }
    }
}

fn project_root() -> PathBuf {
    std::env::var("PRJ_ROOT")
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .map(PathBuf::from)
        .unwrap_or_else(|| std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")))
}

/// Set config-home override (used by CLI `--conf`).
///
/// The path can be absolute, or relative to `PRJ_ROOT`/cwd.
pub fn set_config_home_override(path: impl Into<PathBuf>) {
    let path = path.into();
    if path.as_os_str().is_empty() {
        return;
    }
    if CONFIG_HOME_OVERRIDE.set(path.clone()).is_err()
        && let Some(current) = CONFIG_HOME_OVERRIDE.get()
        && current != &path
    {
        log::warn!(
            "config home override already set to {}; ignoring {}",
            current.display(),
            path.display()
        );
    }
}

fn resolve_config_home(project_root: &Path) -> PathBuf {
    if let Some(path) = CONFIG_HOME_OVERRIDE.get() {
        return absolutize(project_root, path.clone());
    }

    let configured = std::env::var("PRJ_CONFIG_HOME")
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .unwrap_or_else(|| DEFAULT_CONFIG_HOME_RELATIVE_PATH.to_string());
    absolutize(project_root, PathBuf::from(configured))
}

fn absolutize(project_root: &Path, path: PathBuf) -> PathBuf {
    if path.is_absolute() {
        path
    } else {
        project_root.join(path)
    }
}
