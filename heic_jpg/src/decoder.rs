//! HEIC/HEIF decoding.
//!
//! Uses libheif-rs to decode the primary image to interleaved RGB and to pull
//! out the embedded ICC profile and EXIF block.

use libheif_rs::{ColorSpace, HeifContext, ImageHandle, ItemId, LibHeif, RgbChroma};
use shared_utils::img_errors::{ConvertError, Result};
use std::path::Path;

/// Decoded primary image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedImage {
    pub width: u32,
    pub height: u32,
    /// Tightly packed RGB8, `width * height * 3` bytes.
    pub pixels: Vec<u8>,
    /// Raw ICC profile, if the file carries one.
    pub icc_profile: Option<Vec<u8>>,
    /// EXIF as a TIFF structure (starting at the byte order mark).
    pub exif: Option<Vec<u8>>,
}

/// Decoder seam, so the pipeline can run without libheif in tests.
pub trait HeicDecoder: Send + Sync {
    fn decode(&self, path: &Path) -> Result<DecodedImage>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct LibHeifDecoder;

impl HeicDecoder for LibHeifDecoder {
    fn decode(&self, path: &Path) -> Result<DecodedImage> {
        let lib_heif = LibHeif::new();

        // Read through std so non-UTF-8 file names work.
        let bytes = std::fs::read(path)?;
        let ctx = HeifContext::read_from_bytes(&bytes)
            .map_err(|e| ConvertError::Decode(format!("Failed to read HEIC: {}", e)))?;

        let handle = ctx
            .primary_image_handle()
            .map_err(|e| ConvertError::Decode(format!("Failed to get primary image: {}", e)))?;

        let icc_profile = handle
            .color_profile_raw()
            .map(|profile| profile.data)
            .filter(|data| !data.is_empty());
        let exif = read_exif(&handle, path);

        let decoded = lib_heif
            .decode(&handle, ColorSpace::Rgb(RgbChroma::Rgb), None)
            .map_err(|e| ConvertError::Decode(format!("Failed to decode HEIC: {}", e)))?;

        let planes = decoded.planes();
        let plane = planes
            .interleaved
            .ok_or_else(|| ConvertError::Decode("No RGB plane found".to_string()))?;

        let width = handle.width();
        let height = handle.height();
        let pixels = pack_rows(plane.data, width, height, plane.stride)?;

        Ok(DecodedImage {
            width,
            height,
            pixels,
            icc_profile,
            exif,
        })
    }
}

fn read_exif(handle: &ImageHandle, path: &Path) -> Option<Vec<u8>> {
    let mut ids: [ItemId; 1] = [0];
    if handle.metadata_block_ids(&mut ids, b"Exif") == 0 {
        return None;
    }
    let id = ids[0];
    match handle.metadata(id) {
        Ok(raw) => {
            let exif = exif_for_output(&raw);
            if exif.is_none() {
                tracing::warn!(path = %path.display(), "Ignoring malformed EXIF block");
            }
            exif
        }
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "Failed to read EXIF block");
            None
        }
    }
}

/// Locate the TIFF structure inside a HEIF `Exif` item.
///
/// The item starts with a big-endian u32 giving the offset from the end of
/// that field to the TIFF header (usually 6, skipping `Exif\0\0`).
pub fn exif_tiff_payload(raw: &[u8]) -> Option<&[u8]> {
    let offset_field: [u8; 4] = raw.get(..4)?.try_into().ok()?;
    let start = 4usize.checked_add(u32::from_be_bytes(offset_field) as usize)?;
    let payload = raw.get(start..)?;
    if payload.starts_with(b"II*\0") || payload.starts_with(b"MM\0*") {
        Some(payload)
    } else {
        None
    }
}

/// TIFF payload of a HEIF `Exif` item, with Orientation reset to 1.
///
/// libheif applies the container's rotation and mirroring while decoding, so
/// the pixels are already upright.
pub fn exif_for_output(raw: &[u8]) -> Option<Vec<u8>> {
    let mut tiff = exif_tiff_payload(raw)?.to_vec();
    reset_orientation(&mut tiff);
    Some(tiff)
}

const TAG_ORIENTATION: u16 = 0x0112;
const TYPE_SHORT: u16 = 3;

/// Set the IFD0 Orientation tag to 1 (top-left) in place.
///
/// Returns true if the tag was found and rewritten.
pub fn reset_orientation(tiff: &mut [u8]) -> bool {
    let big_endian = match tiff.get(..2) {
        Some(b"MM") => true,
        Some(b"II") => false,
        _ => return false,
    };
    let read_u16 = |buf: &[u8], at: usize| -> Option<u16> {
        let b: [u8; 2] = buf.get(at..at + 2)?.try_into().ok()?;
        Some(if big_endian { u16::from_be_bytes(b) } else { u16::from_le_bytes(b) })
    };
    let read_u32 = |buf: &[u8], at: usize| -> Option<u32> {
        let b: [u8; 4] = buf.get(at..at + 4)?.try_into().ok()?;
        Some(if big_endian { u32::from_be_bytes(b) } else { u32::from_le_bytes(b) })
    };

    let Some(ifd0) = read_u32(tiff, 4).map(|o| o as usize) else {
        return false;
    };
    let Some(count) = read_u16(tiff, ifd0) else {
        return false;
    };

    for i in 0..count as usize {
        let entry = ifd0 + 2 + i * 12;
        if read_u16(tiff, entry) != Some(TAG_ORIENTATION) {
            continue;
        }
        if read_u16(tiff, entry + 2) != Some(TYPE_SHORT) || read_u32(tiff, entry + 4) != Some(1) {
            return false;
        }
        let one = if big_endian { 1u16.to_be_bytes() } else { 1u16.to_le_bytes() };
        return match tiff.get_mut(entry + 8..entry + 10) {
            Some(value) => {
                value.copy_from_slice(&one);
                true
            }
            None => false,
        };
    }
    false
}

/// Copy a strided RGB plane into a tightly packed buffer.
fn pack_rows(data: &[u8], width: u32, height: u32, stride: usize) -> Result<Vec<u8>> {
    let row_len = width as usize * 3;
    let height = height as usize;
    if height == 0 || row_len == 0 {
        return Err(ConvertError::Decode("Image has zero size".to_string()));
    }
    let needed = stride
        .checked_mul(height - 1)
        .and_then(|n| n.checked_add(row_len));
    if stride < row_len || needed.map_or(true, |n| data.len() < n) {
        return Err(ConvertError::Decode(format!(
            "RGB plane too small: {} bytes, stride {}, {}x{}",
            data.len(),
            stride,
            width,
            height
        )));
    }

    if stride == row_len {
        return Ok(data[..row_len * height].to_vec());
    }

    let mut pixels = Vec::with_capacity(row_len * height);
    for row in data.chunks(stride).take(height) {
        pixels.extend_from_slice(&row[..row_len]);
    }
    Ok(pixels)
}
