//! White-background chroma keying
//!
//! Generated parts arrive on a white background with no alpha channel. Each
//! pixel's Euclidean distance from pure white decides its new alpha: inside
//! the tolerance it is cut out, within a 20-unit band beyond it the alpha
//! ramps up linearly for an anti-aliased edge, and beyond that the pixel is
//! left alone.

use rigsmith_core::RasterBuffer;
use std::fmt;

/// Width of the linear alpha ramp beyond the tolerance, in color-distance units
pub const FEATHER_WIDTH: f64 = 20.0;

/// Color distance from white under which a pixel becomes transparent.
///
/// Never negative; construction clamps negatives and NaN to zero.
#[derive(Clone, Copy, Debug, PartialEq, PartialOrd)]
pub struct Tolerance(f64);

impl Tolerance {
    /// Hair layers: soft shadows run close to white
    pub const SOFT: Tolerance = Tolerance(30.0);
    /// Body, eyes, mouth: sharply bounded shapes
    pub const SHARP: Tolerance = Tolerance(15.0);

    pub fn new(value: f64) -> Self {
        if value.is_nan() || value < 0.0 {
            Self(0.0)
        } else {
            Self(value)
        }
    }

    pub fn value(self) -> f64 {
        self.0
    }
}

impl fmt::Display for Tolerance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Pixel counts from one keying pass
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct KeyStats {
    pub total: usize,
    pub transparent: usize,
    pub feathered: usize,
}

impl KeyStats {
    /// True when nothing visible survived keying.
    ///
    /// Usually means the generator returned a blank or near-white image.
    pub fn is_fully_transparent(&self) -> bool {
        self.transparent == self.total
    }

    pub fn opaque(&self) -> usize {
        self.total - self.transparent - self.feathered
    }
}

/// Euclidean distance of an RGB triple from pure white
pub fn distance_from_white(r: u8, g: u8, b: u8) -> f64 {
    let dr = 255.0 - r as f64;
    let dg = 255.0 - g as f64;
    let db = 255.0 - b as f64;
    (dr * dr + dg * dg + db * db).sqrt()
}

/// Alpha for a pixel at distance `distance` from white, or `None` to keep
/// the existing alpha
fn keyed_alpha(distance: f64, tolerance: Tolerance) -> Option<u8> {
    let t = tolerance.value();
    if distance < t {
        Some(0)
    } else if distance < t + FEATHER_WIDTH {
        Some(((distance - t) / FEATHER_WIDTH * 255.0).floor() as u8)
    } else {
        None
    }
}

/// Key out the white background in place. RGB values are never touched.
pub fn extract_alpha(buffer: &mut RasterBuffer, tolerance: Tolerance) -> KeyStats {
    let mut stats = KeyStats {
        total: (buffer.width() as usize) * (buffer.height() as usize),
        ..Default::default()
    };

    for pixel in buffer.pixels_mut() {
        let [r, g, b, _] = pixel.0;
        match keyed_alpha(distance_from_white(r, g, b), tolerance) {
            Some(0) => {
                pixel.0[3] = 0;
                stats.transparent += 1;
            }
            Some(alpha) => {
                pixel.0[3] = alpha;
                stats.feathered += 1;
            }
            None => {}
        }
    }

    tracing::debug!(
        tolerance = %tolerance,
        transparent = stats.transparent,
        feathered = stats.feathered,
        total = stats.total,
        "keyed white background"
    );
    stats
}
