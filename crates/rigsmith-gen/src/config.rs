//! Layered configuration system
//!
//! Config is loaded with three layers of precedence (highest wins):
//! 1. Environment variables: `RIGSMITH_{PROVIDER}_API_KEY` (`GEMINI_API_KEY`
//!    is also accepted for the gemini provider)
//! 2. Project-local: `.rigsmith/config.toml`
//! 3. Global: `~/.rigsmith/config.toml`

use rigsmith_compose::Tolerance;
use rigsmith_core::{Result, RigError};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// Providers that read API keys from the environment
const KEYED_PROVIDERS: [&str; 1] = ["gemini"];

/// Provider-specific configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProviderConfig {
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default)]
    pub api_url: Option<String>,
    #[serde(default = "default_true")]
    pub enabled: bool,
}

fn default_true() -> bool {
    true
}

/// Generation defaults
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationConfig {
    #[serde(default = "default_provider")]
    pub default_provider: String,
    #[serde(default = "default_image_model")]
    pub image_model: String,
    #[serde(default = "default_text_model")]
    pub text_model: String,
    #[serde(default = "default_video_model")]
    pub video_model: String,
    /// Side of the square canvas used for catalog exports
    #[serde(default = "default_batch_canvas")]
    pub batch_canvas: u32,
    #[serde(default = "default_output_dir")]
    pub output_dir: String,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            default_provider: default_provider(),
            image_model: default_image_model(),
            text_model: default_text_model(),
            video_model: default_video_model(),
            batch_canvas: default_batch_canvas(),
            output_dir: default_output_dir(),
        }
    }
}

fn default_provider() -> String {
    "gemini".to_string()
}
fn default_image_model() -> String {
    "imagen-4.0-generate-001".to_string()
}
fn default_text_model() -> String {
    "gemini-2.5-flash".to_string()
}
fn default_video_model() -> String {
    "veo-3.1-fast-generate-preview".to_string()
}
fn default_batch_canvas() -> u32 {
    2048
}
fn default_output_dir() -> String {
    "output".to_string()
}

/// Per-part chroma-key tolerance overrides, keyed by part name
/// (`back_hair`, `eyes`, ...)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ToleranceTable(HashMap<String, f64>);

impl ToleranceTable {
    pub fn set(&mut self, part: impl Into<String>, tolerance: f64) {
        self.0.insert(part.into(), tolerance);
    }

    /// The configured tolerance for `part`, or `default`
    pub fn tolerance_for(&self, part: &str, default: Tolerance) -> Tolerance {
        self.0.get(part).map(|&t| Tolerance::new(t)).unwrap_or(default)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Top-level config file structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RigConfigFile {
    #[serde(default)]
    pub providers: HashMap<String, ProviderConfig>,
    #[serde(default)]
    pub generation: GenerationConfig,
    #[serde(default)]
    pub keying: ToleranceTable,
}

/// Resolved configuration with environment variable overrides applied
#[derive(Debug, Clone, Default)]
pub struct RigConfig {
    pub providers: HashMap<String, ProviderConfig>,
    pub generation: GenerationConfig,
    pub keying: ToleranceTable,
}

impl RigConfig {
    /// Load config with layered precedence: global < project < env vars
    pub fn load() -> Result<Self> {
        let mut config = RigConfigFile::default();

        if let Some(global_path) = Self::global_config_path() {
            if global_path.exists() {
                let global = Self::load_file(&global_path)?;
                Self::merge_into(&mut config, global);
            }
        }

        let local_path = PathBuf::from(".rigsmith/config.toml");
        if local_path.exists() {
            let local = Self::load_file(&local_path)?;
            Self::merge_into(&mut config, local);
        }

        Self::apply_env_overrides(&mut config);
        Ok(config.into())
    }

    /// Load config from a specific file path only (plus env overrides)
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let mut config = Self::load_file(path)?;
        Self::apply_env_overrides(&mut config);
        Ok(config.into())
    }

    pub fn api_key(&self, provider_name: &str) -> Option<&str> {
        self.providers
            .get(provider_name)
            .and_then(|p| p.api_key.as_deref())
            .filter(|k| !k.is_empty())
    }

    pub fn api_url(&self, provider_name: &str) -> Option<&str> {
        self.providers
            .get(provider_name)
            .and_then(|p| p.api_url.as_deref())
    }

    pub fn is_enabled(&self, provider_name: &str) -> bool {
        self.providers
            .get(provider_name)
            .map(|p| p.enabled)
            .unwrap_or(true)
    }

    pub fn default_provider(&self) -> &str {
        &self.generation.default_provider
    }

    pub fn output_dir(&self) -> &Path {
        Path::new(&self.generation.output_dir)
    }

    fn global_config_path() -> Option<PathBuf> {
        dirs::home_dir().map(|h| h.join(".rigsmith").join("config.toml"))
    }

    fn load_file(path: &Path) -> Result<RigConfigFile> {
        let content = std::fs::read_to_string(path)?;
        toml::from_str(&content).map_err(|e| {
            RigError::ConfigError(format!("Failed to parse config {}: {}", path.display(), e))
        })
    }

    fn merge_into(base: &mut RigConfigFile, overlay: RigConfigFile) {
        for (name, provider) in overlay.providers {
            let entry = base.providers.entry(name).or_default();
            if provider.api_key.is_some() {
                entry.api_key = provider.api_key;
            }
            if provider.api_url.is_some() {
                entry.api_url = provider.api_url;
            }
            entry.enabled = provider.enabled;
        }

        let defaults = GenerationConfig::default();
        let gen = overlay.generation;
        if gen.default_provider != defaults.default_provider {
            base.generation.default_provider = gen.default_provider;
        }
        if gen.image_model != defaults.image_model {
            base.generation.image_model = gen.image_model;
        }
        if gen.text_model != defaults.text_model {
            base.generation.text_model = gen.text_model;
        }
        if gen.video_model != defaults.video_model {
            base.generation.video_model = gen.video_model;
        }
        if gen.batch_canvas != defaults.batch_canvas {
            base.generation.batch_canvas = gen.batch_canvas;
        }
        if gen.output_dir != defaults.output_dir {
            base.generation.output_dir = gen.output_dir;
        }

        for (part, tolerance) in overlay.keying.0 {
            base.keying.set(part, tolerance);
        }
    }

    fn apply_env_overrides(config: &mut RigConfigFile) {
        for name in KEYED_PROVIDERS {
            let env_key = format!("RIGSMITH_{}_API_KEY", name.to_uppercase());
            let vendor_key = format!("{}_API_KEY", name.to_uppercase());
            let key = std::env::var(&env_key).or_else(|_| std::env::var(&vendor_key));
            if let Ok(key) = key {
                let entry = config.providers.entry(name.to_string()).or_default();
                entry.api_key = Some(key);
            }
        }
    }
}

impl From<RigConfigFile> for RigConfig {
    fn from(file: RigConfigFile) -> Self {
        Self {
            providers: file.providers,
            generation: file.generation,
            keying: file.keying,
        }
    }
}
