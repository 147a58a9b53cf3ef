//! Generation provider trait and request types

use rigsmith_catalog::LayerId;
use rigsmith_core::{BoundingBox, RasterBuffer, Result, RiggingAnalysis};
use std::fmt;

/// Output frame requested from the image or video model
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AspectRatio {
    Square,
    Portrait3x4,
    Portrait9x16,
}

impl AspectRatio {
    pub fn as_str(&self) -> &'static str {
        match self {
            AspectRatio::Square => "1:1",
            AspectRatio::Portrait3x4 => "3:4",
            AspectRatio::Portrait9x16 => "9:16",
        }
    }

    /// Body layers are generated tall, everything else square
    pub fn for_layer(id: &LayerId) -> Self {
        if id.group() == "Body" {
            AspectRatio::Portrait3x4
        } else {
            AspectRatio::Square
        }
    }
}

impl fmt::Display for AspectRatio {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Status returned by a provider health check
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProviderStatus {
    Available,
    Unavailable(String),
    NoApiKey,
}

impl fmt::Display for ProviderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProviderStatus::Available => write!(f, "available"),
            ProviderStatus::Unavailable(reason) => write!(f, "unavailable ({})", reason),
            ProviderStatus::NoApiKey => write!(f, "no API key"),
        }
    }
}

/// The external generative service.
///
/// Every call blocks until the service answers. Implementations must be
/// shareable across the threads of a part fan-out.
pub trait GenerationProvider: Send + Sync {
    /// Provider name (e.g. "gemini", "mock")
    fn name(&self) -> &str;

    /// Check if the provider is usable (API key set)
    fn health_check(&self) -> Result<ProviderStatus>;

    /// Generate one image on a white background
    fn generate_image(&self, prompt: &str, aspect: AspectRatio) -> Result<RasterBuffer>;

    /// Animate a still image; returns encoded video bytes (MP4)
    fn generate_video(&self, prompt: &str, still: &RasterBuffer) -> Result<Vec<u8>>;

    /// Locate the main character's full body
    fn detect_bounding_box(&self, image: &RasterBuffer) -> Result<BoundingBox>;

    /// Free-text description of the character, used to drive regeneration
    fn describe(&self, image: &RasterBuffer) -> Result<String>;

    /// Face box and rigging notes for a master image
    fn analyze_face(&self, image: &RasterBuffer) -> Result<RiggingAnalysis>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_aspect_for_layer() {
        assert_eq!(
            AspectRatio::for_layer(&LayerId::new("Body/BodyBase")),
            AspectRatio::Portrait3x4
        );
        assert_eq!(
            AspectRatio::for_layer(&LayerId::new("Eye_L/EyeL_Iris")),
            AspectRatio::Square
        );
        assert_eq!(AspectRatio::Portrait9x16.to_string(), "9:16");
    }
}
