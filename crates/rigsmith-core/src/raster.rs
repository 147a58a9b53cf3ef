//! RGBA raster buffers and codec helpers

use crate::error::{Result, RigError};
use std::io::Cursor;

/// Row-major RGBA8 pixels with explicit width and height.
pub type RasterBuffer = image::RgbaImage;

/// Decode PNG/JPEG/WebP bytes into an RGBA buffer.
///
/// Images without an alpha channel come back fully opaque.
pub fn decode_image(bytes: &[u8]) -> Result<RasterBuffer> {
    if bytes.is_empty() {
        return Err(RigError::ImageError("empty image data".to_string()));
    }
    let image = image::load_from_memory(bytes)?;
    Ok(image.to_rgba8())
}

/// Encode a buffer as PNG bytes
pub fn encode_png(buffer: &RasterBuffer) -> Result<Vec<u8>> {
    let mut out = Cursor::new(Vec::new());
    buffer.write_to(&mut out, image::ImageFormat::Png)?;
    Ok(out.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    #[test]
    fn test_png_roundtrip_preserves_pixels() {
        let mut img = RasterBuffer::from_pixel(3, 2, Rgba([255, 255, 255, 255]));
        img.put_pixel(1, 1, Rgba([12, 34, 56, 128]));

        let bytes = encode_png(&img).unwrap();
        let decoded = decode_image(&bytes).unwrap();
        assert_eq!(decoded.dimensions(), (3, 2));
        assert_eq!(decoded.get_pixel(1, 1), &Rgba([12, 34, 56, 128]));
    }

    #[test]
    fn test_decode_rejects_garbage() {
        assert!(decode_image(&[]).is_err());
        assert!(decode_image(b"not an image").is_err());
    }
}
