//! JPEG encoding with embedded EXIF and ICC metadata.
//!
//! The `image` encoder writes a plain JFIF stream; EXIF (APP1) and the ICC
//! profile (APP2, chunked) are spliced in right after the JFIF header.

use image::codecs::jpeg::JpegEncoder;
use image::ExtendedColorType;
use shared_utils::img_errors::{ConvertError, Result};

const MARKER_SOI: [u8; 2] = [0xFF, 0xD8];
const MARKER_APP0: u8 = 0xE0;
const MARKER_APP1: u8 = 0xE1;
const MARKER_APP2: u8 = 0xE2;

const EXIF_HEADER: &[u8] = b"Exif\0\0";
const ICC_HEADER: &[u8] = b"ICC_PROFILE\0";

/// Largest payload a segment can carry (length field covers itself).
const MAX_SEGMENT_PAYLOAD: usize = u16::MAX as usize - 2;
const MAX_ICC_CHUNK: usize = MAX_SEGMENT_PAYLOAD - ICC_HEADER.len() - 2;

/// Encode tightly packed RGB8 pixels at `quality` (1-100).
pub fn encode_jpeg(
    width: u32,
    height: u32,
    pixels: &[u8],
    quality: u8,
    exif: Option<&[u8]>,
    icc_profile: Option<&[u8]>,
) -> Result<Vec<u8>> {
    let mut jpeg = Vec::new();
    JpegEncoder::new_with_quality(&mut jpeg, quality)
        .encode(pixels, width, height, ExtendedColorType::Rgb8)
        .map_err(|e| ConvertError::Encode(e.to_string()))?;

    let mut segments = Vec::new();
    if let Some(tiff) = exif {
        match exif_segment(tiff) {
            Some(segment) => segments.push(segment),
            None => tracing::warn!(len = tiff.len(), "EXIF block too large for APP1, dropped"),
        }
    }
    if let Some(icc) = icc_profile {
        segments.extend(icc_segments(icc));
    }

    insert_segments(jpeg, &segments)
}

fn segment(marker: u8, parts: &[&[u8]]) -> Vec<u8> {
    let payload_len: usize = parts.iter().map(|p| p.len()).sum();
    let length = (payload_len + 2) as u16;
    let mut out = Vec::with_capacity(payload_len + 4);
    out.extend_from_slice(&[0xFF, marker]);
    out.extend_from_slice(&length.to_be_bytes());
    for part in parts {
        out.extend_from_slice(part);
    }
    out
}

fn exif_segment(tiff: &[u8]) -> Option<Vec<u8>> {
    if EXIF_HEADER.len() + tiff.len() > MAX_SEGMENT_PAYLOAD {
        return None;
    }
    Some(segment(MARKER_APP1, &[EXIF_HEADER, tiff]))
}

/// ICC profiles larger than one segment are split; chunks are numbered from 1.
fn icc_segments(icc: &[u8]) -> Vec<Vec<u8>> {
    let chunks: Vec<&[u8]> = icc.chunks(MAX_ICC_CHUNK).collect();
    let count = chunks.len();
    if count == 0 || count > u8::MAX as usize {
        tracing::warn!(len = icc.len(), "ICC profile cannot be embedded, dropped");
        return Vec::new();
    }
    chunks
        .into_iter()
        .enumerate()
        .map(|(i, chunk)| {
            segment(
                MARKER_APP2,
                &[ICC_HEADER, &[(i + 1) as u8, count as u8][..], chunk],
            )
        })
        .collect()
}

/// Insert `segments` after SOI, and after the JFIF APP0 segment if present.
fn insert_segments(jpeg: Vec<u8>, segments: &[Vec<u8>]) -> Result<Vec<u8>> {
    if !jpeg.starts_with(&MARKER_SOI) {
        return Err(ConvertError::Encode("Encoder output is missing SOI".to_string()));
    }
    if segments.is_empty() {
        return Ok(jpeg);
    }

    let mut pos = MARKER_SOI.len();
    if jpeg.get(pos..pos + 2) == Some(&[0xFF, MARKER_APP0][..]) {
        let len = jpeg
            .get(pos + 2..pos + 4)
            .map(|b| u16::from_be_bytes([b[0], b[1]]) as usize)
            .ok_or_else(|| ConvertError::Encode("Truncated APP0 segment".to_string()))?;
        pos += 2 + len;
        if pos > jpeg.len() {
            return Err(ConvertError::Encode("Truncated APP0 segment".to_string()));
        }
    }

    let extra: usize = segments.iter().map(Vec::len).sum();
    let mut out = Vec::with_capacity(jpeg.len() + extra);
    out.extend_from_slice(&jpeg[..pos]);
    for s in segments {
        out.extend_from_slice(s);
    }
    out.extend_from_slice(&jpeg[pos..]);
    Ok(out)
}
