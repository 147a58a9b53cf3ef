//! Layered documents: ordered, positioned pixel buffers on a fixed canvas

use crate::psd;
use rigsmith_core::{RasterBuffer, Result, RigError};

/// Largest canvas side a PSD (version 1) can describe
pub const MAX_CANVAS_SIDE: u32 = 30_000;

/// One layer of a document, bottom-to-top order is given by its position in
/// the document
#[derive(Debug, Clone, PartialEq)]
pub struct LayerRecord {
    pub name: String,
    pub image: RasterBuffer,
    pub left: i32,
    pub top: i32,
    pub hidden: bool,
    /// 0.0 (invisible) to 1.0 (opaque)
    pub opacity: f32,
}

impl LayerRecord {
    pub fn new(name: impl Into<String>, image: RasterBuffer) -> Self {
        Self {
            name: name.into(),
            image,
            left: 0,
            top: 0,
            hidden: false,
            opacity: 1.0,
        }
    }

    pub fn at(mut self, left: i32, top: i32) -> Self {
        self.left = left;
        self.top = top;
        self
    }

    pub fn hidden(mut self) -> Self {
        self.hidden = true;
        self
    }

    pub fn with_opacity(mut self, opacity: f32) -> Self {
        self.opacity = if opacity.is_nan() { 1.0 } else { opacity.clamp(0.0, 1.0) };
        self
    }
}

/// A canvas and its layer stack, first layer at the bottom
#[derive(Debug, Clone, PartialEq)]
pub struct LayeredDocument {
    width: u32,
    height: u32,
    layers: Vec<LayerRecord>,
}

impl LayeredDocument {
    pub fn new(width: u32, height: u32) -> Result<Self> {
        if width == 0 || height == 0 || width > MAX_CANVAS_SIDE || height > MAX_CANVAS_SIDE {
            return Err(RigError::AssemblyFailed(format!(
                "canvas {}x{} is outside 1..={} pixels",
                width, height, MAX_CANVAS_SIDE
            )));
        }
        Ok(Self {
            width,
            height,
            layers: Vec::new(),
        })
    }

    /// Add a layer on top of the stack
    pub fn push(&mut self, layer: LayerRecord) {
        self.layers.push(layer);
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn layers(&self) -> &[LayerRecord] {
        &self.layers
    }

    pub fn len(&self) -> usize {
        self.layers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.layers.is_empty()
    }

    /// Composite the visible layers over white, clipped to the canvas
    pub fn flatten(&self) -> RasterBuffer {
        let mut canvas =
            RasterBuffer::from_pixel(self.width, self.height, image::Rgba([255, 255, 255, 255]));

        for layer in self.layers.iter().filter(|l| !l.hidden && l.opacity > 0.0) {
            for (x, y, src) in layer.image.enumerate_pixels() {
                let cx = layer.left as i64 + x as i64;
                let cy = layer.top as i64 + y as i64;
                if cx < 0 || cy < 0 || cx >= self.width as i64 || cy >= self.height as i64 {
                    continue;
                }
                let alpha = src.0[3] as f32 / 255.0 * layer.opacity;
                if alpha <= 0.0 {
                    continue;
                }
                let dst = canvas.get_pixel_mut(cx as u32, cy as u32);
                for c in 0..3 {
                    let blended = src.0[c] as f32 * alpha + dst.0[c] as f32 * (1.0 - alpha);
                    dst.0[c] = blended.round().clamp(0.0, 255.0) as u8;
                }
            }
        }
        canvas
    }

    /// Serialize as a PSD byte stream
    pub fn to_psd(&self) -> Result<Vec<u8>> {
        psd::encode(self)
    }
}

/// Serialize bottom-to-top `layers` on a `width` x `height` canvas
pub fn assemble(layers: Vec<LayerRecord>, width: u32, height: u32) -> Result<Vec<u8>> {
    let mut doc = LayeredDocument::new(width, height)?;
    for layer in layers {
        doc.push(layer);
    }
    doc.to_psd()
}

/// A catalog part waiting to be stacked by z-order
#[derive(Debug, Clone)]
pub struct ZOrderedLayer {
    pub name: String,
    pub z_order: i32,
    pub image: RasterBuffer,
}

/// Stack parts back-to-front by ascending z (ties keep input order), each
/// centred on the canvas
pub fn catalog_document(
    mut items: Vec<ZOrderedLayer>,
    width: u32,
    height: u32,
) -> Result<LayeredDocument> {
    let mut doc = LayeredDocument::new(width, height)?;
    items.sort_by_key(|item| item.z_order);

    for item in items {
        let left = centered_offset(width, item.image.width());
        let top = centered_offset(height, item.image.height());
        doc.push(LayerRecord::new(item.name, item.image).at(left, top));
    }
    Ok(doc)
}

/// `floor((canvas - part) / 2)`, negative when the part is larger
fn centered_offset(canvas: u32, part: u32) -> i32 {
    (canvas as i64 - part as i64).div_euclid(2) as i32
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    fn solid(w: u32, h: u32, rgba: [u8; 4]) -> RasterBuffer {
        RasterBuffer::from_pixel(w, h, Rgba(rgba))
    }

    #[test]
    fn test_catalog_document_sorts_by_z() {
        let doc = catalog_document(
            vec![
                ZOrderedLayer {
                    name: "A".to_string(),
                    z_order: 20,
                    image: solid(4, 4, [255, 0, 0, 255]),
                },
                ZOrderedLayer {
                    name: "B".to_string(),
                    z_order: 5,
                    image: solid(4, 4, [0, 255, 0, 255]),
                },
            ],
            16,
            16,
        )
        .unwrap();
        let names: Vec<&str> = doc.layers().iter().map(|l| l.name.as_str()).collect();
        assert_eq!(names, vec!["B", "A"]);
    }

    #[test]
    fn test_catalog_document_centres_parts() {
        let doc = catalog_document(
            vec![
                ZOrderedLayer {
                    name: "odd".to_string(),
                    z_order: 1,
                    image: solid(5, 3, [0, 0, 0, 255]),
                },
                ZOrderedLayer {
                    name: "oversized".to_string(),
                    z_order: 2,
                    image: solid(13, 10, [0, 0, 0, 255]),
                },
            ],
            10,
            10,
        )
        .unwrap();
        assert_eq!((doc.layers()[0].left, doc.layers()[0].top), (2, 3));
        // floor(-3 / 2) = -2
        assert_eq!((doc.layers()[1].left, doc.layers()[1].top), (-2, 0));
    }

    #[test]
    fn test_invalid_canvas() {
        assert!(LayeredDocument::new(0, 10).is_err());
        assert!(LayeredDocument::new(10, MAX_CANVAS_SIDE + 1).is_err());
        assert!(matches!(
            assemble(vec![], 0, 0).unwrap_err(),
            RigError::AssemblyFailed(_)
        ));
    }

    #[test]
    fn test_flatten_respects_hidden_and_opacity() {
        let mut doc = LayeredDocument::new(2, 1).unwrap();
        doc.push(LayerRecord::new("hidden", solid(2, 1, [0, 0, 0, 255])).hidden());
        doc.push(LayerRecord::new("half", solid(1, 1, [0, 0, 0, 255])).at(1, 0).with_opacity(0.5));

        let flat = doc.flatten();
        assert_eq!(flat.get_pixel(0, 0).0, [255, 255, 255, 255]);
        assert_eq!(flat.get_pixel(1, 0).0, [128, 128, 128, 255]);
    }

    #[test]
    fn test_flatten_clips_offscreen() {
        let mut doc = LayeredDocument::new(2, 2).unwrap();
        doc.push(LayerRecord::new("offset", solid(2, 2, [10, 20, 30, 255])).at(-1, 1));
        let flat = doc.flatten();
        assert_eq!(flat.get_pixel(0, 1).0, [10, 20, 30, 255]);
        assert_eq!(flat.get_pixel(0, 0).0, [255, 255, 255, 255]);
        assert_eq!(flat.get_pixel(1, 1).0, [255, 255, 255, 255]);
    }

    #[test]
    fn test_opacity_clamped() {
        let layer = LayerRecord::new("x", solid(1, 1, [0; 4])).with_opacity(1.7);
        assert_eq!(layer.opacity, 1.0);
        let layer = LayerRecord::new("x", solid(1, 1, [0; 4])).with_opacity(-0.2);
        assert_eq!(layer.opacity, 0.0);
    }
}
