//! Rigsmith Core - Foundational types for the rigsmith layer pipeline
//!
//! This crate provides the types that all other rigsmith crates depend on:
//! - `BoundingBox` - Normalized 0-1000 rectangles returned by vision models
//! - `RasterBuffer` - RGBA pixel buffers passed between pipeline stages
//! - `RiggingAnalysis` - Face location and rigging notes for a master image
//! - `ContentHash` - SHA-256 hashes of emitted documents
//! - Error types and Result alias

mod analysis;
mod error;
mod hash;
mod raster;
mod types;

pub use analysis::{RiggingAnalysis, DEFAULT_RECOMMENDATIONS};
pub use error::{Result, RigError};
pub use hash::ContentHash;
pub use raster::{decode_image, encode_png, RasterBuffer};
pub use types::{BoundingBox, PixelRect, DEFAULT_FACE_BOX, NORMALIZED_SCALE};
