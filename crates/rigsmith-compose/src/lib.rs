//! Rigsmith Compose - Turning generated images into a layered document
//!
//! - `chroma` - white-background keying with a feathered edge band
//! - `placement` - face-relative geometry for eyes, mouth and front hair
//! - `document` - ordered layer stacks, z-order sorting, flattening
//! - `psd` - PSD serialization of a layer stack

pub mod chroma;
pub mod document;
pub mod placement;
pub mod psd;

pub use chroma::{extract_alpha, KeyStats, Tolerance};
pub use document::{assemble, catalog_document, LayerRecord, LayeredDocument, ZOrderedLayer};
pub use placement::{fit_to_frame, place, AttachKind, FaceFrame, PartFrame, Placement};
