//! Normalized and pixel-space rectangles

use crate::error::{Result, RigError};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Upper bound of the normalized coordinate space used by vision models
pub const NORMALIZED_SCALE: u16 = 1000;

/// Face box assumed when a master image has no usable face analysis
pub const DEFAULT_FACE_BOX: BoundingBox = BoundingBox {
    y_min: 100,
    x_min: 300,
    y_max: 300,
    x_max: 700,
};

/// A rectangle on the fixed 0-1000 scale, independent of image resolution.
///
/// Always satisfies `y_min < y_max <= 1000` and `x_min < x_max <= 1000`.
/// Raw model output is clamped into range on construction, and the fields
/// are private so every box goes through [`BoundingBox::new`], serde
/// included.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "[i64; 4]", into = "[u16; 4]")]
pub struct BoundingBox {
    y_min: u16,
    x_min: u16,
    y_max: u16,
    x_max: u16,
}

impl BoundingBox {
    /// The whole image
    pub const FULL: Self = Self {
        y_min: 0,
        x_min: 0,
        y_max: NORMALIZED_SCALE,
        x_max: NORMALIZED_SCALE,
    };

    /// Build a box from `[y_min, x_min, y_max, x_max]`, clamping each value
    /// into `[0, 1000]`. Fails if the clamped box has no area.
    pub fn new(y_min: i64, x_min: i64, y_max: i64, x_max: i64) -> Result<Self> {
        let clamp = |v: i64| v.clamp(0, NORMALIZED_SCALE as i64) as u16;
        let bbox = Self {
            y_min: clamp(y_min),
            x_min: clamp(x_min),
            y_max: clamp(y_max),
            x_max: clamp(x_max),
        };
        if bbox.y_min >= bbox.y_max || bbox.x_min >= bbox.x_max {
            return Err(RigError::DetectionFailed(format!(
                "degenerate bounding box [{}, {}, {}, {}]",
                y_min, x_min, y_max, x_max
            )));
        }
        Ok(bbox)
    }

    /// Build a box from a model's `[ymin, xmin, ymax, xmax]` array
    pub fn from_values(values: &[i64]) -> Result<Self> {
        match values {
            [y_min, x_min, y_max, x_max, ..] => Self::new(*y_min, *x_min, *y_max, *x_max),
            _ => Err(RigError::DetectionFailed(format!(
                "expected 4 box coordinates, got {}",
                values.len()
            ))),
        }
    }

    pub fn y_min(&self) -> u16 {
        self.y_min
    }

    pub fn x_min(&self) -> u16 {
        self.x_min
    }

    pub fn y_max(&self) -> u16 {
        self.y_max
    }

    pub fn x_max(&self) -> u16 {
        self.x_max
    }

    pub fn to_array(&self) -> [u16; 4] {
        [self.y_min, self.x_min, self.y_max, self.x_max]
    }

    pub fn width(&self) -> u16 {
        self.x_max - self.x_min
    }

    pub fn height(&self) -> u16 {
        self.y_max - self.y_min
    }

    /// Expand every side by `fraction` of that axis' span, then clamp.
    ///
    /// Minimums are floored and maximums ceiled so padding never shrinks
    /// the box through rounding.
    pub fn pad(&self, fraction: f64) -> Self {
        let pad_y = self.height() as f64 * fraction;
        let pad_x = self.width() as f64 * fraction;
        let scale = NORMALIZED_SCALE as f64;
        let lo = |v: u16, pad: f64| (v as f64 - pad).floor().clamp(0.0, scale) as u16;
        let hi = |v: u16, pad: f64| (v as f64 + pad).ceil().clamp(0.0, scale) as u16;
        Self {
            y_min: lo(self.y_min, pad_y),
            x_min: lo(self.x_min, pad_x),
            y_max: hi(self.y_max, pad_y),
            x_max: hi(self.x_max, pad_x),
        }
    }

    /// Convert to a pixel rectangle inside an image of the given size.
    ///
    /// The result is at least 1x1 and never extends past the image edge.
    pub fn to_pixel_rect(&self, image_width: u32, image_height: u32) -> PixelRect {
        let scale = NORMALIZED_SCALE as f64;
        let to_px = |v: u16, extent: u32| v as f64 * extent as f64 / scale;

        let left = (to_px(self.x_min, image_width).floor() as u32).min(image_width.saturating_sub(1));
        let top = (to_px(self.y_min, image_height).floor() as u32).min(image_height.saturating_sub(1));
        let right = (to_px(self.x_max, image_width).ceil() as u32).min(image_width);
        let bottom = (to_px(self.y_max, image_height).ceil() as u32).min(image_height);

        PixelRect {
            x: left,
            y: top,
            width: right.saturating_sub(left).max(1),
            height: bottom.saturating_sub(top).max(1),
        }
    }
}

impl fmt::Display for BoundingBox {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}, {}, {}, {}]",
            self.y_min, self.x_min, self.y_max, self.x_max
        )
    }
}

impl TryFrom<[i64; 4]> for BoundingBox {
    type Error = RigError;

    fn try_from(values: [i64; 4]) -> Result<Self> {
        let [y_min, x_min, y_max, x_max] = values;
        Self::new(y_min, x_min, y_max, x_max)
    }
}

impl From<BoundingBox> for [u16; 4] {
    fn from(bbox: BoundingBox) -> Self {
        bbox.to_array()
    }
}

/// An axis-aligned rectangle in source-image pixels
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PixelRect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}
