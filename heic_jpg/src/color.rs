//! ICC color management via LittleCMS.

use lcms2::{ColorSpaceSignature, InfoType, Intent, Locale, PixelFormat, Profile, Transform};
use shared_utils::img_errors::{ConvertError, Result};
use std::sync::OnceLock;

static SRGB_ICC: OnceLock<Vec<u8>> = OnceLock::new();

fn profile_error(e: lcms2::Error) -> ConvertError {
    ConvertError::ColorProfile(e.to_string())
}

/// Serialized built-in sRGB profile, embedded in every output JPG.
pub fn srgb_icc_profile() -> Result<&'static [u8]> {
    if let Some(icc) = SRGB_ICC.get() {
        return Ok(icc);
    }
    let icc = Profile::new_srgb().icc().map_err(profile_error)?;
    Ok(SRGB_ICC.get_or_init(|| icc))
}

fn is_srgb_profile(profile: &Profile) -> bool {
    profile
        .info(InfoType::Description, Locale::none())
        .map(|description| description.contains("sRGB"))
        .unwrap_or(false)
}

/// Convert RGB8 `pixels` from the `icc` color space to sRGB in place.
///
/// Returns `Ok(false)` when nothing was done: the profile already describes
/// sRGB, or it is not an RGB profile (libheif has already produced RGB).
pub fn transform_to_srgb(pixels: &mut [u8], icc: &[u8]) -> Result<bool> {
    let source = Profile::new_icc(icc).map_err(profile_error)?;
    if is_srgb_profile(&source) {
        return Ok(false);
    }
    if source.color_space() != ColorSpaceSignature::RgbData {
        tracing::warn!(
            color_space = ?source.color_space(),
            "Embedded profile is not RGB, leaving pixels unchanged"
        );
        return Ok(false);
    }

    let srgb = Profile::new_srgb();
    let transform: Transform<[u8; 3], [u8; 3]> = Transform::new(
        &source,
        PixelFormat::RGB_8,
        &srgb,
        PixelFormat::RGB_8,
        Intent::Perceptual,
    )
    .map_err(profile_error)?;

    let input: Vec<[u8; 3]> = pixels
        .chunks_exact(3)
        .map(|px| [px[0], px[1], px[2]])
        .collect();
    let mut output = vec![[0u8; 3]; input.len()];
    transform.transform_pixels(&input, &mut output);

    for (dst, src) in pixels.chunks_exact_mut(3).zip(&output) {
        dst.copy_from_slice(src);
    }
    Ok(true)
}
