//! CLI command implementations

pub mod animate;
pub mod catalog;
pub mod character;
pub mod inspect;
pub mod layers;
pub mod rig;

use anyhow::{Context as _, Result};
use rigsmith_catalog::LayerCatalog;
use rigsmith_core::{decode_image, RasterBuffer};
use rigsmith_gen::{create_provider, GenerationProvider, RigConfig};
use std::path::{Path, PathBuf};

/// Resolved configuration shared by the generating commands
pub struct Context {
    pub config: RigConfig,
    pub provider_name: String,
    pub output_dir: PathBuf,
}

impl Context {
    pub fn load(provider: Option<&str>, output: Option<&str>) -> Result<Self> {
        let config = RigConfig::load().context("Failed to load config")?;
        let provider_name = provider.unwrap_or_else(|| config.default_provider()).to_string();
        let output_dir = output
            .map(PathBuf::from)
            .unwrap_or_else(|| config.output_dir().to_path_buf());
        Ok(Self {
            config,
            provider_name,
            output_dir,
        })
    }

    pub fn provider(&self) -> Result<Box<dyn GenerationProvider>> {
        let provider = create_provider(&self.provider_name, &self.config)?;
        tracing::debug!(provider = provider.name(), "using provider");
        Ok(provider)
    }
}

/// The built-in catalog, or one loaded from `path`
pub fn load_catalog(path: Option<&str>) -> Result<LayerCatalog> {
    let catalog = match path {
        Some(p) => LayerCatalog::load(p).with_context(|| format!("Failed to load catalog {}", p))?,
        None => LayerCatalog::builtin()?,
    };
    Ok(catalog)
}

pub fn read_image(path: &str) -> Result<RasterBuffer> {
    if !Path::new(path).exists() {
        anyhow::bail!("Image not found: {}", path);
    }
    let bytes = std::fs::read(path).with_context(|| format!("Failed to read {}", path))?;
    let image = decode_image(&bytes).with_context(|| format!("Failed to decode {}", path))?;
    Ok(image)
}
