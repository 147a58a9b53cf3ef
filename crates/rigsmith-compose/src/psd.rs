//! Photoshop (PSD, version 1) codec for layered documents
//!
//! Writes 8-bit RGB documents with one RGBA layer record per document layer,
//! uncompressed channel data and a composite preview flattened over white.
//! Layer names are stored both as a Pascal string (ASCII) and as a `luni`
//! block (UTF-16) so non-ASCII names survive.
//!
//! The decoder reads back what the encoder produces, plus other raw-encoded
//! RGB files. RLE (PackBits) channel data is not supported.

use crate::document::{LayerRecord, LayeredDocument};
use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};
use rigsmith_core::{RasterBuffer, Result, RigError};
use std::io::{Cursor, Read, Write};

const SIGNATURE: &[u8; 4] = b"8BPS";
const RESOURCE_SIGNATURE: &[u8; 4] = b"8BIM";
const BLEND_NORMAL: &[u8; 4] = b"norm";
const UNICODE_NAME_KEY: &[u8; 4] = b"luni";

const VERSION: u16 = 1;
const DEPTH: u16 = 8;
const COLOR_MODE_RGB: u16 = 3;
const COMPRESSION_RAW: u16 = 0;

const FLAG_HIDDEN: u8 = 0x02;

const CHANNEL_ALPHA: i16 = -1;
/// Channel ids in the order layer channels are written
const LAYER_CHANNELS: [i16; 4] = [CHANNEL_ALPHA, 0, 1, 2];

/// Serialize a document
pub fn encode(doc: &LayeredDocument) -> Result<Vec<u8>> {
    let mut out = Vec::new();

    // Header
    out.write_all(SIGNATURE)?;
    out.write_u16::<BigEndian>(VERSION)?;
    out.write_all(&[0u8; 6])?;
    out.write_u16::<BigEndian>(3)?;
    out.write_u32::<BigEndian>(doc.height())?;
    out.write_u32::<BigEndian>(doc.width())?;
    out.write_u16::<BigEndian>(DEPTH)?;
    out.write_u16::<BigEndian>(COLOR_MODE_RGB)?;

    // Color mode data, image resources
    out.write_u32::<BigEndian>(0)?;
    out.write_u32::<BigEndian>(0)?;

    let layer_info = encode_layer_info(doc.layers())?;
    out.write_u32::<BigEndian>(layer_info.len() as u32 + 4 + 4)?;
    out.write_u32::<BigEndian>(layer_info.len() as u32)?;
    out.write_all(&layer_info)?;
    // Global layer mask info
    out.write_u32::<BigEndian>(0)?;

    // Composite, planar RGB
    let composite = doc.flatten();
    out.write_u16::<BigEndian>(COMPRESSION_RAW)?;
    for channel in 0..3 {
        out.extend(composite.pixels().map(|p| p.0[channel]));
    }

    tracing::debug!(
        width = doc.width(),
        height = doc.height(),
        layers = doc.len(),
        bytes = out.len(),
        "encoded PSD"
    );
    Ok(out)
}

fn encode_layer_info(layers: &[LayerRecord]) -> Result<Vec<u8>> {
    let mut info = Vec::new();
    info.write_i16::<BigEndian>(layers.len() as i16)?;

    for layer in layers {
        encode_layer_record(&mut info, layer)?;
    }
    for layer in layers {
        for id in LAYER_CHANNELS {
            info.write_u16::<BigEndian>(COMPRESSION_RAW)?;
            info.extend(channel_bytes(&layer.image, id));
        }
    }

    if info.len() % 2 == 1 {
        info.push(0);
    }
    Ok(info)
}

fn encode_layer_record(out: &mut Vec<u8>, layer: &LayerRecord) -> Result<()> {
    let (w, h) = layer.image.dimensions();
    let top = layer.top;
    let left = layer.left;
    let bottom = top
        .checked_add(h as i32)
        .ok_or_else(|| RigError::AssemblyFailed(format!("layer '{}' out of range", layer.name)))?;
    let right = left
        .checked_add(w as i32)
        .ok_or_else(|| RigError::AssemblyFailed(format!("layer '{}' out of range", layer.name)))?;

    out.write_i32::<BigEndian>(top)?;
    out.write_i32::<BigEndian>(left)?;
    out.write_i32::<BigEndian>(bottom)?;
    out.write_i32::<BigEndian>(right)?;

    let channel_len = 2 + (w as u64 * h as u64);
    let channel_len = u32::try_from(channel_len)
        .map_err(|_| RigError::AssemblyFailed(format!("layer '{}' is too large", layer.name)))?;
    out.write_u16::<BigEndian>(LAYER_CHANNELS.len() as u16)?;
    for id in LAYER_CHANNELS {
        out.write_i16::<BigEndian>(id)?;
        out.write_u32::<BigEndian>(channel_len)?;
    }

    out.write_all(RESOURCE_SIGNATURE)?;
    out.write_all(BLEND_NORMAL)?;
    out.write_u8((layer.opacity * 255.0).round().clamp(0.0, 255.0) as u8)?;
    out.write_u8(0)?; // clipping: base
    out.write_u8(if layer.hidden { FLAG_HIDDEN } else { 0 })?;
    out.write_u8(0)?;

    let mut extra = Vec::new();
    extra.write_u32::<BigEndian>(0)?; // layer mask
    extra.write_u32::<BigEndian>(0)?; // blending ranges
    write_pascal_name(&mut extra, &layer.name)?;
    write_unicode_name(&mut extra, &layer.name)?;

    out.write_u32::<BigEndian>(extra.len() as u32)?;
    out.write_all(&extra)?;
    Ok(())
}

fn channel_bytes(image: &RasterBuffer, id: i16) -> impl Iterator<Item = u8> + '_ {
    let index = if id == CHANNEL_ALPHA { 3 } else { id as usize };
    image.pixels().map(move |p| p.0[index])
}

/// ASCII Pascal string padded to a multiple of four bytes (length byte
/// included)
fn write_pascal_name(out: &mut Vec<u8>, name: &str) -> Result<()> {
    let ascii: Vec<u8> = name
        .chars()
        .map(|c| if c.is_ascii() && !c.is_ascii_control() { c as u8 } else { b'?' })
        .take(255)
        .collect();
    out.write_u8(ascii.len() as u8)?;
    out.write_all(&ascii)?;
    let written = 1 + ascii.len();
    out.extend(std::iter::repeat(0).take((4 - written % 4) % 4));
    Ok(())
}

fn write_unicode_name(out: &mut Vec<u8>, name: &str) -> Result<()> {
    let units: Vec<u16> = name.encode_utf16().collect();
    let mut block = Vec::with_capacity(4 + units.len() * 2);
    block.write_u32::<BigEndian>(units.len() as u32)?;
    for unit in &units {
        block.write_u16::<BigEndian>(*unit)?;
    }
    while block.len() % 4 != 0 {
        block.push(0);
    }

    out.write_all(RESOURCE_SIGNATURE)?;
    out.write_all(UNICODE_NAME_KEY)?;
    out.write_u32::<BigEndian>(block.len() as u32)?;
    out.write_all(&block)?;
    Ok(())
}

fn malformed(what: impl std::fmt::Display) -> RigError {
    RigError::ImageError(format!("malformed PSD: {}", what))
}

/// Parse a document produced by [`encode`] (or any raw-encoded 8-bit RGB PSD)
pub fn decode(bytes: &[u8]) -> Result<LayeredDocument> {
    let mut r = Cursor::new(bytes);
    let eof = |_: std::io::Error| malformed("unexpected end of data");

    let mut signature = [0u8; 4];
    r.read_exact(&mut signature).map_err(eof)?;
    if &signature != SIGNATURE {
        return Err(malformed("bad signature"));
    }
    let version = r.read_u16::<BigEndian>().map_err(eof)?;
    if version != VERSION {
        return Err(malformed(format!("unsupported version {}", version)));
    }
    skip(&mut r, 6)?;
    let _channels = r.read_u16::<BigEndian>().map_err(eof)?;
    let height = r.read_u32::<BigEndian>().map_err(eof)?;
    let width = r.read_u32::<BigEndian>().map_err(eof)?;
    let depth = r.read_u16::<BigEndian>().map_err(eof)?;
    let mode = r.read_u16::<BigEndian>().map_err(eof)?;
    if depth != DEPTH || mode != COLOR_MODE_RGB {
        return Err(malformed(format!("depth {} mode {} not supported", depth, mode)));
    }

    let color_mode_len = r.read_u32::<BigEndian>().map_err(eof)?;
    skip(&mut r, color_mode_len as u64)?;
    let resources_len = r.read_u32::<BigEndian>().map_err(eof)?;
    skip(&mut r, resources_len as u64)?;

    let mut doc = LayeredDocument::new(width, height).map_err(malformed)?;

    let section_len = r.read_u32::<BigEndian>().map_err(eof)?;
    if section_len == 0 {
        return Ok(doc);
    }
    let info_len = r.read_u32::<BigEndian>().map_err(eof)?;
    if info_len == 0 {
        return Ok(doc);
    }

    // A negative count means the first alpha channel holds composite
    // transparency; the layer count is its absolute value
    let count = r.read_i16::<BigEndian>().map_err(eof)?.unsigned_abs() as usize;
    let mut headers = Vec::with_capacity(count);
    for _ in 0..count {
        headers.push(read_layer_header(&mut r)?);
    }

    for header in headers {
        let w = extent(header.left, header.right, &header.name)?;
        let h = extent(header.top, header.bottom, &header.name)?;
        let plane = w as u64 * h as u64;
        if plane > remaining(&r) {
            return Err(malformed(format!("layer '{}' is larger than the file", header.name)));
        }
        let mut image = RasterBuffer::from_pixel(w, h, image::Rgba([0, 0, 0, 255]));

        for (id, len) in &header.channels {
            let compression = r.read_u16::<BigEndian>().map_err(eof)?;
            let data_len = (*len as u64).saturating_sub(2);
            if data_len > remaining(&r) {
                return Err(malformed("unexpected end of data"));
            }
            if compression != COMPRESSION_RAW {
                return Err(malformed(format!(
                    "layer '{}' uses compression {}",
                    header.name, compression
                )));
            }
            let mut data = vec![0u8; data_len as usize];
            r.read_exact(&mut data).map_err(eof)?;

            let index = match *id {
                CHANNEL_ALPHA => 3,
                0..=2 => *id as usize,
                // User masks and other extras
                _ => continue,
            };
            if data.len() != (w as usize) * (h as usize) {
                return Err(malformed(format!("layer '{}' channel size", header.name)));
            }
            for (pixel, value) in image.pixels_mut().zip(data) {
                pixel.0[index] = value;
            }
        }

        let mut record = LayerRecord::new(header.name, image)
            .at(header.left, header.top)
            .with_opacity(header.opacity as f32 / 255.0);
        if header.flags & FLAG_HIDDEN != 0 {
            record = record.hidden();
        }
        doc.push(record);
    }

    Ok(doc)
}

struct LayerHeader {
    top: i32,
    left: i32,
    bottom: i32,
    right: i32,
    channels: Vec<(i16, u32)>,
    opacity: u8,
    flags: u8,
    name: String,
}

fn read_layer_header(r: &mut Cursor<&[u8]>) -> Result<LayerHeader> {
    let eof = |_: std::io::Error| malformed("truncated layer record");

    let top = r.read_i32::<BigEndian>().map_err(eof)?;
    let left = r.read_i32::<BigEndian>().map_err(eof)?;
    let bottom = r.read_i32::<BigEndian>().map_err(eof)?;
    let right = r.read_i32::<BigEndian>().map_err(eof)?;

    let channel_count = r.read_u16::<BigEndian>().map_err(eof)?;
    let mut channels = Vec::with_capacity(channel_count as usize);
    for _ in 0..channel_count {
        let id = r.read_i16::<BigEndian>().map_err(eof)?;
        let len = r.read_u32::<BigEndian>().map_err(eof)?;
        channels.push((id, len));
    }

    skip(r, 8)?; // blend signature and key
    let opacity = r.read_u8().map_err(eof)?;
    let _clipping = r.read_u8().map_err(eof)?;
    let flags = r.read_u8().map_err(eof)?;
    let _filler = r.read_u8().map_err(eof)?;

    let extra_len = r.read_u32::<BigEndian>().map_err(eof)? as u64;
    let extra_end = r.position() + extra_len;

    let mask_len = r.read_u32::<BigEndian>().map_err(eof)?;
    skip(r, mask_len as u64)?;
    let ranges_len = r.read_u32::<BigEndian>().map_err(eof)?;
    skip(r, ranges_len as u64)?;

    let name_len = r.read_u8().map_err(eof)? as usize;
    let mut name_bytes = vec![0u8; name_len];
    r.read_exact(&mut name_bytes).map_err(eof)?;
    skip(r, ((4 - (1 + name_len) % 4) % 4) as u64)?;
    let mut name: String = name_bytes.iter().map(|&b| b as char).collect();

    // Additional layer info blocks
    while r.position() + 12 <= extra_end {
        let mut sig = [0u8; 4];
        let mut key = [0u8; 4];
        r.read_exact(&mut sig).map_err(eof)?;
        r.read_exact(&mut key).map_err(eof)?;
        let len = r.read_u32::<BigEndian>().map_err(eof)? as u64;
        let block_end = r.position() + len;

        if &key == UNICODE_NAME_KEY {
            let chars = r.read_u32::<BigEndian>().map_err(eof)? as u64;
            if r.position() + chars * 2 > block_end.min(r.get_ref().len() as u64) {
                return Err(malformed("unicode name overruns its block"));
            }
            let mut units = Vec::with_capacity(chars as usize);
            for _ in 0..chars {
                units.push(r.read_u16::<BigEndian>().map_err(eof)?);
            }
            name = String::from_utf16_lossy(&units);
        }
        r.set_position(block_end);
    }
    r.set_position(extra_end);

    Ok(LayerHeader {
        top,
        left,
        bottom,
        right,
        channels,
        opacity,
        flags,
        name,
    })
}

/// Width or height of a layer rectangle; inverted edges are an error
fn extent(start: i32, end: i32, layer: &str) -> Result<u32> {
    end.checked_sub(start)
        .and_then(|d| u32::try_from(d).ok())
        .ok_or_else(|| malformed(format!("layer '{}' has bounds {}..{}", layer, start, end)))
}

fn remaining(r: &Cursor<&[u8]>) -> u64 {
    (r.get_ref().len() as u64).saturating_sub(r.position())
}

fn skip(r: &mut Cursor<&[u8]>, n: u64) -> Result<()> {
    let target = r.position() + n;
    if target > r.get_ref().len() as u64 {
        return Err(malformed("unexpected end of data"));
    }
    r.set_position(target);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::assemble;
    use image::Rgba;

    fn checker(w: u32, h: u32) -> RasterBuffer {
        RasterBuffer::from_fn(w, h, |x, y| {
            if (x + y) % 2 == 0 {
                Rgba([200, 10, 10, 255])
            } else {
                Rgba([0, 0, 0, 0])
            }
        })
    }

    #[test]
    fn test_header_layout() {
        let bytes = assemble(vec![LayerRecord::new("Body", checker(2, 2))], 8, 6).unwrap();
        assert_eq!(&bytes[0..4], b"8BPS");
        assert_eq!(u16::from_be_bytes([bytes[4], bytes[5]]), 1);
        // height then width
        assert_eq!(u32::from_be_bytes([bytes[14], bytes[15], bytes[16], bytes[17]]), 6);
        assert_eq!(u32::from_be_bytes([bytes[18], bytes[19], bytes[20], bytes[21]]), 8);
        assert_eq!(u16::from_be_bytes([bytes[24], bytes[25]]), COLOR_MODE_RGB);
    }

    #[test]
    fn test_decode_preserves_layers() {
        let layers = vec![
            LayerRecord::new("Reference Image", checker(4, 4))
                .hidden()
                .with_opacity(0.4),
            LayerRecord::new("Back Hair", checker(3, 5)).at(-2, 7),
            LayerRecord::new("前髪 (Front Hair)", checker(1, 1)).at(10, 10),
        ];
        let bytes = assemble(layers.clone(), 32, 24).unwrap();
        let doc = decode(&bytes).unwrap();

        assert_eq!((doc.width(), doc.height()), (32, 24));
        assert_eq!(doc.len(), 3);
        let names: Vec<&str> = doc.layers().iter().map(|l| l.name.as_str()).collect();
        assert_eq!(names, vec!["Reference Image", "Back Hair", "前髪 (Front Hair)"]);

        let reference = &doc.layers()[0];
        assert!(reference.hidden);
        assert_eq!((reference.opacity * 255.0).round() as u8, 102);

        let back = &doc.layers()[1];
        assert!(!back.hidden);
        assert_eq!((back.left, back.top), (-2, 7));
        assert_eq!(back.image, layers[1].image);
    }

    #[test]
    fn test_pascal_name_sanitized() {
        let mut out = Vec::new();
        write_pascal_name(&mut out, "é1").unwrap();
        assert_eq!(out, vec![2, b'?', b'1', 0]);
    }

    #[test]
    fn test_empty_document() {
        let bytes = assemble(vec![], 4, 4).unwrap();
        let doc = decode(&bytes).unwrap();
        assert!(doc.is_empty());
    }

    #[test]
    fn test_decode_rejects_garbage() {
        assert!(matches!(decode(b"nope").unwrap_err(), RigError::ImageError(_)));
        assert!(decode(&[]).is_err());

        let bytes = assemble(vec![LayerRecord::new("x", checker(4, 4))], 4, 4).unwrap();
        assert!(decode(&bytes[..40]).is_err());
    }

    /// Byte offset of the first layer record's `top` field
    const FIRST_RECORD: usize = 26 + 4 + 4 + 4 + 4 + 2;

    fn patch_i32(bytes: &mut [u8], at: usize, value: i32) {
        bytes[at..at + 4].copy_from_slice(&value.to_be_bytes());
    }

    #[test]
    fn test_rejects_out_of_range_layer_bounds() {
        let bytes = assemble(vec![LayerRecord::new("x", checker(2, 2)).at(1, 1)], 4, 4).unwrap();
        assert_eq!(
            &bytes[FIRST_RECORD..FIRST_RECORD + 16],
            &[0, 0, 0, 1, 0, 0, 0, 1, 0, 0, 0, 3, 0, 0, 0, 3]
        );

        let mut wide = bytes.clone();
        patch_i32(&mut wide, FIRST_RECORD + 4, i32::MIN);
        patch_i32(&mut wide, FIRST_RECORD + 12, i32::MAX);
        assert!(matches!(decode(&wide).unwrap_err(), RigError::ImageError(_)));

        let mut inverted = bytes.clone();
        patch_i32(&mut inverted, FIRST_RECORD + 8, -5);
        assert!(matches!(decode(&inverted).unwrap_err(), RigError::ImageError(_)));

        // Valid i32 edges whose area is far larger than the file
        let mut huge = bytes;
        patch_i32(&mut huge, FIRST_RECORD + 8, 1_000_000);
        patch_i32(&mut huge, FIRST_RECORD + 12, 1_000_000);
        assert!(matches!(decode(&huge).unwrap_err(), RigError::ImageError(_)));
    }

    #[test]
    fn test_rejects_oversized_unicode_name() {
        let mut bytes = assemble(vec![LayerRecord::new("x", checker(1, 1))], 4, 4).unwrap();
        let at = bytes
            .windows(4)
            .position(|w| w == UNICODE_NAME_KEY)
            .unwrap();
        // key, block length, then the character count
        patch_i32(&mut bytes, at + 8, i32::MAX);
        assert!(matches!(decode(&bytes).unwrap_err(), RigError::ImageError(_)));
    }
}
