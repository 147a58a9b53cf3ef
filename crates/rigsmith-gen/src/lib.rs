//! Rigsmith Gen - Generating and assembling character layers
//!
//! Provides the generation provider framework (Gemini and a local mock), the
//! batch orchestrator for catalog layers, and the rigging pipeline that turns
//! one source image into a five-part layered PSD.

pub mod batch;
pub mod config;
pub mod export;
pub mod parts;
pub mod pipeline;
pub mod prompt;
pub mod provider;
pub mod providers;
pub mod store;

pub use batch::{export_catalog_document, generate_single, run_batch, BatchError, BatchProgress, BatchReport};
pub use config::{RigConfig, ToleranceTable};
pub use export::{write_document, write_timestamped, ExportedDocument};
pub use parts::PartKind;
pub use pipeline::{MasterCharacter, RiggingSession, RiggingState, RiggingStep};
pub use provider::{AspectRatio, GenerationProvider, ProviderStatus};
pub use providers::create_provider;
pub use store::{GeneratedLayer, LayerSlot, LayerStore};
