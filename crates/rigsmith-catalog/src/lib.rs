//! Rigsmith Catalog - Character part definitions
//!
//! This crate provides the static table of layer definitions (identity,
//! required flag, stacking order, generation prompts) that both the batch
//! generator and the rigging pipeline read from.

mod catalog;
mod types;

pub use catalog::LayerCatalog;
pub use types::{LayerDefinition, LayerId};
