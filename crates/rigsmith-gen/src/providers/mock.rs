//! Mock provider for testing
//!
//! Draws a solid ellipse on a white background for every image request, and
//! answers detection and analysis with fixed values, all without network
//! calls. Failures and blank images can be scripted by prompt substring.

use crate::provider::*;
use rigsmith_core::{BoundingBox, RasterBuffer, Result, RigError, RiggingAnalysis};
use std::sync::Mutex;

const MOCK_VIDEO: &[u8] = b"\x00\x00\x00\x18ftypmp42\x00\x00\x00\x00mp42isom";

/// A provider that generates placeholder content locally
pub struct MockProvider {
    detection: BoundingBox,
    description: String,
    analysis: RiggingAnalysis,
    fail_on: Vec<String>,
    blank_on: Vec<String>,
    calls: Mutex<Vec<String>>,
}

impl Default for MockProvider {
    fn default() -> Self {
        Self {
            detection: BoundingBox::new(50, 250, 950, 750).unwrap_or(BoundingBox::FULL),
            description: "Mock character, silver twin tails, blue eyes, black sailor uniform"
                .to_string(),
            analysis: RiggingAnalysis::default(),
            fail_on: Vec::new(),
            blank_on: Vec::new(),
            calls: Mutex::new(Vec::new()),
        }
    }
}

impl MockProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail every call whose log line contains `needle`
    pub fn fail_on(mut self, needle: impl Into<String>) -> Self {
        self.fail_on.push(needle.into());
        self
    }

    /// Return an all-white image for prompts containing `needle`
    pub fn blank_on(mut self, needle: impl Into<String>) -> Self {
        self.blank_on.push(needle.into());
        self
    }

    pub fn with_detection(mut self, detection: BoundingBox) -> Self {
        self.detection = detection;
        self
    }

    pub fn with_analysis(mut self, analysis: RiggingAnalysis) -> Self {
        self.analysis = analysis;
        self
    }

    /// Every call made so far, e.g. `generate_image[1:1]: <prompt>`
    pub fn calls(&self) -> Vec<String> {
        self.lock_calls().clone()
    }

    /// Image size returned for an aspect ratio
    pub fn dimensions(aspect: AspectRatio) -> (u32, u32) {
        match aspect {
            AspectRatio::Square => (256, 256),
            AspectRatio::Portrait3x4 => (240, 320),
            AspectRatio::Portrait9x16 => (180, 320),
        }
    }

    fn lock_calls(&self) -> std::sync::MutexGuard<'_, Vec<String>> {
        self.calls.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn record(&self, call: String) -> Result<()> {
        let failing = self.fail_on.iter().any(|needle| call.contains(needle.as_str()));
        self.lock_calls().push(call.clone());
        if failing {
            return Err(RigError::GenerationFailed(format!("mock failure: {}", call)));
        }
        Ok(())
    }
}

impl GenerationProvider for MockProvider {
    fn name(&self) -> &str {
        "mock"
    }

    fn health_check(&self) -> Result<ProviderStatus> {
        Ok(ProviderStatus::Available)
    }

    fn generate_image(&self, prompt: &str, aspect: AspectRatio) -> Result<RasterBuffer> {
        self.record(format!("generate_image[{}]: {}", aspect, prompt))?;
        let (width, height) = Self::dimensions(aspect);
        if self.blank_on.iter().any(|needle| prompt.contains(needle.as_str())) {
            return Ok(RasterBuffer::from_pixel(width, height, image::Rgba([255, 255, 255, 255])));
        }
        Ok(draw_ellipse(width, height, prompt))
    }

    fn generate_video(&self, prompt: &str, still: &RasterBuffer) -> Result<Vec<u8>> {
        self.record(format!(
            "generate_video[{}x{}]: {}",
            still.width(),
            still.height(),
            prompt
        ))?;
        Ok(MOCK_VIDEO.to_vec())
    }

    fn detect_bounding_box(&self, image: &RasterBuffer) -> Result<BoundingBox> {
        self.record(format!("detect_bounding_box[{}x{}]", image.width(), image.height()))?;
        Ok(self.detection)
    }

    fn describe(&self, image: &RasterBuffer) -> Result<String> {
        self.record(format!("describe[{}x{}]", image.width(), image.height()))?;
        Ok(self.description.clone())
    }

    fn analyze_face(&self, image: &RasterBuffer) -> Result<RiggingAnalysis> {
        self.record(format!("analyze_face[{}x{}]", image.width(), image.height()))?;
        Ok(self.analysis.clone())
    }
}

/// A dark ellipse filling the middle of a white canvas, colored from the
/// prompt so different parts are distinguishable
fn draw_ellipse(width: u32, height: u32, prompt: &str) -> RasterBuffer {
    let hash_val = prompt
        .bytes()
        .fold(0u32, |acc, b| acc.wrapping_mul(31).wrapping_add(b as u32));
    let color = image::Rgba([
        40 + ((hash_val >> 16) & 0x7F) as u8,
        40 + ((hash_val >> 8) & 0x7F) as u8,
        40 + (hash_val & 0x7F) as u8,
        255,
    ]);

    let (cx, cy) = (width as f64 / 2.0, height as f64 / 2.0);
    let (rx, ry) = (width as f64 * 0.3, height as f64 * 0.3);
    RasterBuffer::from_fn(width, height, |x, y| {
        let dx = (x as f64 + 0.5 - cx) / rx;
        let dy = (y as f64 + 0.5 - cy) / ry;
        if dx * dx + dy * dy <= 1.0 {
            color
        } else {
            image::Rgba([255, 255, 255, 255])
        }
    })
}
