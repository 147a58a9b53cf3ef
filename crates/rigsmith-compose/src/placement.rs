//! Face-relative placement of generated parts
//!
//! Eyes, mouth and front hair are generated as free-floating assets and then
//! sized and positioned relative to the face box found on the master image.
//! Body and back hair are generated at the master's aspect ratio and sit at
//! the canvas origin unscaled.

use image::imageops::{self, FilterType};
use rigsmith_core::{BoundingBox, RasterBuffer, NORMALIZED_SCALE};

/// Fraction of each side's span added around a detected character before
/// cropping
pub const CROP_PADDING: f64 = 0.1;

const EYES_WIDTH: f64 = 0.8;
const EYES_CENTER_Y: f64 = 0.35;
const MOUTH_WIDTH: f64 = 0.3;
const MOUTH_CENTER_Y: f64 = 0.75;
const FRONT_HAIR_WIDTH: f64 = 1.3;
const FRONT_HAIR_RISE: f64 = 0.2;

/// How a part is attached to the master canvas
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AttachKind {
    Eyes,
    Mouth,
    FrontHair,
    /// Full-canvas asset placed at the origin without resizing
    Canvas,
}

/// The face box in canvas pixels
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FaceFrame {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl FaceFrame {
    /// Scale a normalized face box onto a canvas of the given pixel size
    pub fn from_box(face: &BoundingBox, canvas_width: u32, canvas_height: u32) -> Self {
        let scale = NORMALIZED_SCALE as f64;
        let (w, h) = (canvas_width as f64, canvas_height as f64);
        Self {
            x: face.x_min() as f64 / scale * w,
            y: face.y_min() as f64 / scale * h,
            width: face.width() as f64 / scale * w,
            height: face.height() as f64 / scale * h,
        }
    }
}

/// Target rectangle for a part, in canvas pixels
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PartFrame {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl PartFrame {
    pub fn center_y(&self) -> f64 {
        self.y + self.height / 2.0
    }
}

/// Integer document offset of a placed part, plus the resize factors used
/// to fit it (None when the asset kept its generated size)
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Placement {
    pub left: i32,
    pub top: i32,
    pub scale: Option<(f64, f64)>,
}

impl Placement {
    pub const ORIGIN: Placement = Placement {
        left: 0,
        top: 0,
        scale: None,
    };
}

/// Compute where a generated asset of `asset_width` x `asset_height` goes
pub fn place(kind: AttachKind, face: &FaceFrame, asset_width: u32, asset_height: u32) -> PartFrame {
    let aspect = if asset_width == 0 {
        0.0
    } else {
        asset_height as f64 / asset_width as f64
    };
    let centered = |width: f64| face.x + (face.width - width) / 2.0;

    match kind {
        AttachKind::Eyes => {
            let width = face.width * EYES_WIDTH;
            let height = width * aspect;
            PartFrame {
                x: centered(width),
                y: face.y + face.height * EYES_CENTER_Y - height / 2.0,
                width,
                height,
            }
        }
        AttachKind::Mouth => {
            let width = face.width * MOUTH_WIDTH;
            let height = width * aspect;
            PartFrame {
                x: centered(width),
                y: face.y + face.height * MOUTH_CENTER_Y - height / 2.0,
                width,
                height,
            }
        }
        AttachKind::FrontHair => {
            let width = face.width * FRONT_HAIR_WIDTH;
            let height = width * aspect;
            PartFrame {
                x: centered(width),
                y: face.y - height * FRONT_HAIR_RISE,
                width,
                height,
            }
        }
        AttachKind::Canvas => PartFrame {
            x: 0.0,
            y: 0.0,
            width: asset_width as f64,
            height: asset_height as f64,
        },
    }
}

/// Padded crop region for a detected full-body box
pub fn crop_box(detected: &BoundingBox) -> BoundingBox {
    detected.pad(CROP_PADDING)
}

/// Resize `image` to the frame's size (if it differs) and round the frame
/// origin to an integer document offset
pub fn fit_to_frame(image: RasterBuffer, frame: &PartFrame) -> (RasterBuffer, Placement) {
    let target_w = (frame.width.round() as u32).max(1);
    let target_h = (frame.height.round() as u32).max(1);
    let (w, h) = image.dimensions();

    let (image, scale) = if (w, h) == (target_w, target_h) || w == 0 || h == 0 {
        (image, None)
    } else {
        let resized = imageops::resize(&image, target_w, target_h, FilterType::Lanczos3);
        let scale = (target_w as f64 / w as f64, target_h as f64 / h as f64);
        (resized, Some(scale))
    };

    let placement = Placement {
        left: frame.x.round() as i32,
        top: frame.y.round() as i32,
        scale,
    };
    (image, placement)
}
