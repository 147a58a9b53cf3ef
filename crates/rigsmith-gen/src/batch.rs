//! Batch generation of catalog layers
//!
//! Walks a list of layer definitions one at a time, asking the provider for
//! each part in the shared style. A failed layer is recorded and the batch
//! moves on; nothing is retried automatically.

use crate::export::{write_document, ExportedDocument};
use crate::prompt::layer_prompt;
use crate::provider::{AspectRatio, GenerationProvider};
use crate::store::{GeneratedLayer, LayerStore};
use rigsmith_catalog::{LayerCatalog, LayerDefinition, LayerId};
use rigsmith_compose::{catalog_document, ZOrderedLayer};
use rigsmith_core::{Result, RigError};
use std::path::Path;

/// Reported before each layer is requested
#[derive(Debug, Clone, Copy)]
pub struct BatchProgress<'a> {
    /// 1-based position in the batch
    pub current: usize,
    pub total: usize,
    pub id: &'a LayerId,
}

/// One layer that could not be generated
#[derive(Debug, Clone, PartialEq)]
pub struct BatchError {
    pub id: LayerId,
    pub label: String,
    pub message: String,
}

/// Outcome of a batch run
#[derive(Debug, Clone, Default)]
pub struct BatchReport {
    pub total: usize,
    pub succeeded: usize,
    pub errors: Vec<BatchError>,
}

impl BatchReport {
    pub fn summary(&self) -> String {
        format!("{} of {} succeeded", self.succeeded, self.total)
    }

    pub fn is_partial_failure(&self) -> bool {
        !self.errors.is_empty()
    }

    /// Turn any failure into `PartialBatchFailure`
    pub fn ensure_complete(&self) -> Result<()> {
        if self.errors.is_empty() {
            Ok(())
        } else {
            Err(RigError::PartialBatchFailure {
                failed: self.errors.len(),
                total: self.total,
            })
        }
    }
}

fn require_style(style_prompt: &str) -> Result<()> {
    if style_prompt.trim().is_empty() {
        return Err(RigError::InvalidRequest(
            "a style prompt is required for layer generation".to_string(),
        ));
    }
    Ok(())
}

/// Generate one catalog layer into `store`.
///
/// The identity is marked in flight first and always ends up `Ready` or
/// `Failed`.
pub fn generate_single(
    provider: &dyn GenerationProvider,
    definition: &LayerDefinition,
    style_prompt: &str,
    store: &mut LayerStore,
) -> Result<()> {
    require_style(style_prompt)?;

    store.begin(&definition.id);
    let prompt = layer_prompt(definition, style_prompt);
    let aspect = AspectRatio::for_layer(&definition.id);

    match provider.generate_image(&prompt, aspect) {
        Ok(image) => {
            store.complete(GeneratedLayer {
                id: definition.id.clone(),
                image,
                placement: None,
            });
            Ok(())
        }
        Err(e) => {
            store.fail(&definition.id, e.to_string());
            Err(e)
        }
    }
}

/// Generate `definitions` in order, reporting progress before each one.
///
/// Per-layer failures are collected in the report; only an invalid request
/// fails the whole call.
pub fn run_batch<F>(
    provider: &dyn GenerationProvider,
    definitions: &[&LayerDefinition],
    style_prompt: &str,
    store: &mut LayerStore,
    mut on_progress: F,
) -> Result<BatchReport>
where
    F: FnMut(BatchProgress<'_>),
{
    require_style(style_prompt)?;

    let total = definitions.len();
    let mut report = BatchReport {
        total,
        ..Default::default()
    };

    for (i, definition) in definitions.iter().enumerate() {
        on_progress(BatchProgress {
            current: i + 1,
            total,
            id: &definition.id,
        });
        tracing::info!(id = %definition.id, current = i + 1, total, "generating layer");

        match generate_single(provider, definition, style_prompt, store) {
            Ok(()) => report.succeeded += 1,
            Err(e) => {
                tracing::warn!(id = %definition.id, error = %e, "layer generation failed");
                report.errors.push(BatchError {
                    id: definition.id.clone(),
                    label: definition.label.clone(),
                    message: e.to_string(),
                });
            }
        }
    }

    tracing::info!(summary = %report.summary(), "batch finished");
    Ok(report)
}

/// Stack every generated catalog layer on a square `canvas` and write it as
/// `Live2D_Assets_<timestamp>.psd`
pub fn export_catalog_document(
    catalog: &LayerCatalog,
    store: &LayerStore,
    canvas: u32,
    dir: &Path,
) -> Result<ExportedDocument> {
    let items: Vec<ZOrderedLayer> = catalog
        .definitions()
        .iter()
        .filter_map(|def| {
            store.get(&def.id).map(|layer| ZOrderedLayer {
                name: def.document_name(),
                z_order: def.z_order,
                image: layer.image.clone(),
            })
        })
        .collect();

    if items.is_empty() {
        return Err(RigError::AssemblyFailed(
            "no generated layers to export".to_string(),
        ));
    }

    let document = catalog_document(items, canvas, canvas)?;
    let bytes = document.to_psd()?;
    let exported = write_document(&bytes, dir, "Live2D_Assets")?;
    tracing::info!(
        path = %exported.path.display(),
        layers = document.len(),
        hash = %exported.content_hash.short(),
        "exported catalog document"
    );
    Ok(exported)
}
