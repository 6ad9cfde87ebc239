//! Test doubles shared by the unit tests.

use crate::decoder::{DecodedImage, HeicDecoder};
use crate::output::Confirm;
use lcms2::{CIExyY, CIExyYTRIPLE, Profile, ToneCurve};
use shared_utils::img_errors::{ConvertError, Result};
use std::cell::Cell;
use std::io;
use std::path::Path;

pub const FAKE_MAGIC: &[u8] = b"FAKEHEIC";
/// Minimal little-endian TIFF: header plus one empty IFD.
pub const FAKE_EXIF: &[u8] = b"II*\0\x08\0\0\0\0\0\0\0\0\0";

/// Write a file the fake decoder accepts.
pub fn write_fake_heic(path: &Path) {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).unwrap();
    }
    std::fs::write(path, FAKE_MAGIC).unwrap();
}

/// Write a file the fake decoder rejects.
pub fn write_corrupt_heic(path: &Path) {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).unwrap();
    }
    std::fs::write(path, b"\0\0\0\x18ftypjunk").unwrap();
}

/// Decodes files starting with [`FAKE_MAGIC`] into a small gradient.
#[derive(Debug, Default)]
pub struct FakeDecoder;

impl HeicDecoder for FakeDecoder {
    fn decode(&self, path: &Path) -> Result<DecodedImage> {
        let bytes = std::fs::read(path)?;
        if !bytes.starts_with(FAKE_MAGIC) {
            return Err(ConvertError::Decode("Invalid input: not a HEIF file".to_string()));
        }
        let (width, height) = (8u32, 6u32);
        let pixels = (0..width * height)
            .flat_map(|i| [(i * 5 % 256) as u8, (i * 11 % 256) as u8, 200])
            .collect();
        Ok(DecodedImage {
            width,
            height,
            pixels,
            icc_profile: None,
            exif: Some(FAKE_EXIF.to_vec()),
        })
    }
}

/// Display P3-like profile: D65 white, P3 primaries, gamma 2.2.
pub fn wide_gamut_icc() -> Vec<u8> {
    let white = CIExyY { x: 0.3127, y: 0.3290, Y: 1.0 };
    let primaries = CIExyYTRIPLE {
        Red: CIExyY { x: 0.680, y: 0.320, Y: 1.0 },
        Green: CIExyY { x: 0.265, y: 0.690, Y: 1.0 },
        Blue: CIExyY { x: 0.150, y: 0.060, Y: 1.0 },
    };
    let curve = ToneCurve::new(2.2);
    Profile::new_rgb(&white, &primaries, &[&curve, &curve, &curve])
        .unwrap()
        .icc()
        .unwrap()
}

pub const SOLID_RGB: [u8; 3] = [200, 100, 50];

/// Decodes any readable file into a 16x16 image of [`SOLID_RGB`] tagged
/// with `icc_profile`.
pub struct SolidDecoder {
    pub icc_profile: Option<Vec<u8>>,
}

impl HeicDecoder for SolidDecoder {
    fn decode(&self, path: &Path) -> Result<DecodedImage> {
        std::fs::read(path)?;
        let (width, height) = (16u32, 16u32);
        Ok(DecodedImage {
            width,
            height,
            pixels: SOLID_RGB.repeat((width * height) as usize),
            icc_profile: self.icc_profile.clone(),
            exif: None,
        })
    }
}

/// Always panics, to exercise task isolation.
#[derive(Debug, Default)]
pub struct PanickingDecoder;

impl HeicDecoder for PanickingDecoder {
    fn decode(&self, path: &Path) -> Result<DecodedImage> {
        panic!("decoder exploded on {}", path.display());
    }
}

/// Returns a fixed answer and counts how often it was asked.
pub struct ScriptedConfirm {
    answer: bool,
    asked: Cell<usize>,
}

impl ScriptedConfirm {
    pub fn new(answer: bool) -> Self {
        Self {
            answer,
            asked: Cell::new(0),
        }
    }

    pub fn asked(&self) -> usize {
        self.asked.get()
    }
}

impl Confirm for ScriptedConfirm {
    fn confirm(&self, _prompt: &str) -> io::Result<bool> {
        self.asked.set(self.asked.get() + 1);
        Ok(self.answer)
    }
}
