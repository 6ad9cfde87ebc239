//! Single-file conversion.
//!
//! Every failure is caught here and turned into [`ConversionResult::Failed`];
//! nothing propagates past the task boundary.

use crate::color;
use crate::decoder::HeicDecoder;
use crate::jpeg;
use crate::options::ConversionOptions;
use crate::output::{ConversionJob, OutputManager};
use serde::Serialize;
use shared_utils::img_errors::Result;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum SkipReason {
    DryRun,
    OutputExists,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::DryRun => write!(f, "dry-run"),
            SkipReason::OutputExists => write!(f, "output exists"),
        }
    }
}

/// Outcome of one conversion task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ConversionResult {
    Converted {
        source: PathBuf,
        output: PathBuf,
        input_bytes: u64,
        output_bytes: u64,
        /// The source was deleted after conversion.
        removed_original: bool,
    },
    Skipped {
        source: PathBuf,
        reason: SkipReason,
    },
    Failed {
        source: PathBuf,
        error: String,
    },
}

impl ConversionResult {
    pub fn source(&self) -> &Path {
        match self {
            ConversionResult::Converted { source, .. }
            | ConversionResult::Skipped { source, .. }
            | ConversionResult::Failed { source, .. } => source,
        }
    }

    pub fn is_converted(&self) -> bool {
        matches!(self, ConversionResult::Converted { .. })
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, ConversionResult::Failed { .. })
    }
}

/// Run one job to completion.
pub fn run_conversion(
    job: &ConversionJob,
    options: &ConversionOptions,
    decoder: &dyn HeicDecoder,
    output: &OutputManager,
) -> ConversionResult {
    let source = job.source.path();

    if options.dry_run() {
        tracing::info!(
            source = %source.display(),
            output = %job.output.display(),
            "Dry run: would convert"
        );
        return ConversionResult::Skipped {
            source: source.to_path_buf(),
            reason: SkipReason::DryRun,
        };
    }

    if options.skip_existing() && job.output.exists() {
        tracing::info!(source = %source.display(), "Skipping, JPG already exists");
        return ConversionResult::Skipped {
            source: source.to_path_buf(),
            reason: SkipReason::OutputExists,
        };
    }

    match convert(job, options, decoder, output) {
        Ok(Written {
            input_bytes,
            output_bytes,
            removed_original,
        }) => {
            tracing::info!(
                source = %source.display(),
                output = %job.output.display(),
                input_bytes,
                output_bytes,
                removed_original,
                "Converted"
            );
            ConversionResult::Converted {
                source: source.to_path_buf(),
                output: job.output.clone(),
                input_bytes,
                output_bytes,
                removed_original,
            }
        }
        Err(e) => {
            tracing::error!(source = %source.display(), error = %e, "Conversion failed");
            ConversionResult::Failed {
                source: source.to_path_buf(),
                error: e.to_string(),
            }
        }
    }
}

struct Written {
    input_bytes: u64,
    output_bytes: u64,
    removed_original: bool,
}

fn convert(
    job: &ConversionJob,
    options: &ConversionOptions,
    decoder: &dyn HeicDecoder,
    output: &OutputManager,
) -> Result<Written> {
    let source = job.source.path();
    let input_bytes = fs::metadata(source)?.len();

    let mut image = decoder.decode(source)?;

    if let Some(icc) = image.icc_profile.as_deref() {
        if color::transform_to_srgb(&mut image.pixels, icc)? {
            tracing::debug!(source = %source.display(), "Transformed embedded profile to sRGB");
        }
    }

    let bytes = jpeg::encode_jpeg(
        image.width,
        image.height,
        &image.pixels,
        options.quality(),
        image.exif.as_deref(),
        Some(color::srgb_icc_profile()?),
    )?;
    write_output(&job.output, &bytes)?;

    if let Err(e) = shared_utils::metadata::apply_file_timestamps(source, &job.output) {
        tracing::warn!(output = %job.output.display(), error = %e, "Failed to copy file timestamps");
    }

    let removed_original = options.remove_originals();
    if removed_original {
        output.remove_original(&job.source)?;
    }

    Ok(Written {
        input_bytes,
        output_bytes: bytes.len() as u64,
        removed_original,
    })
}

/// Write through a sibling `.part` file so a failed write never leaves a
/// truncated JPG behind.
fn write_output(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    let mut partial = path.as_os_str().to_owned();
    partial.push(".part");
    let partial = PathBuf::from(partial);

    if let Err(e) = fs::write(&partial, bytes).and_then(|_| fs::rename(&partial, path)) {
        let _ = fs::remove_file(&partial);
        return Err(e);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collector::SourceFile;
    use crate::test_support::{
        wide_gamut_icc, write_corrupt_heic, write_fake_heic, FakeDecoder, SolidDecoder, FAKE_EXIF,
        SOLID_RGB,
    };

    struct Fixture {
        dir: tempfile::TempDir,
        manager: OutputManager,
    }

    impl Fixture {
        fn new() -> Self {
            let dir = tempfile::tempdir().unwrap();
            let manager = OutputManager::new(dir.path(), false);
            std::fs::create_dir_all(manager.output_dir()).unwrap();
            Self { dir, manager }
        }

        fn job(&self, name: &str) -> ConversionJob {
            let source = SourceFile::new(self.dir.path().join(name));
            self.manager.plan(vec![source]).remove(0)
        }
    }

    fn options() -> ConversionOptions {
        ConversionOptions::new(85, 1).unwrap()
    }

    #[test]
    fn test_converts_and_embeds_exif() {
        let fx = Fixture::new();
        let job = fx.job("IMG_0001.HEIC");
        write_fake_heic(job.source.path());

        let result = run_conversion(&job, &options(), &FakeDecoder, &fx.manager);

        match &result {
            ConversionResult::Converted {
                output,
                output_bytes,
                removed_original,
                ..
            } => {
                assert!(!removed_original);
                assert_eq!(output, &fx.manager.output_dir().join("IMG_0001.jpg"));
                let bytes = std::fs::read(output).unwrap();
                assert_eq!(bytes.len() as u64, *output_bytes);
                assert!(bytes.windows(FAKE_EXIF.len()).any(|w| w == FAKE_EXIF));
                let decoded = image::load_from_memory(&bytes).unwrap();
                assert_eq!((decoded.width(), decoded.height()), (8, 6));
            }
            other => panic!("expected Converted, got {:?}", other),
        }
        assert!(job.source.path().exists(), "original kept by default");
        assert!(!job.output.with_extension("jpg.part").exists());
    }

    fn center_pixel(jpeg: &[u8]) -> [u8; 3] {
        image::load_from_memory(jpeg).unwrap().to_rgb8().get_pixel(8, 8).0
    }

    fn distance(a: [u8; 3], b: [u8; 3]) -> u32 {
        a.iter().zip(b).map(|(x, y)| x.abs_diff(y) as u32).sum()
    }

    #[test]
    fn test_wide_gamut_source_is_converted_to_srgb() {
        let fx = Fixture::new();
        let tagged = fx.job("p3.heic");
        let untagged = fx.job("plain.heic");
        write_fake_heic(tagged.source.path());
        write_fake_heic(untagged.source.path());

        let p3 = SolidDecoder { icc_profile: Some(wide_gamut_icc()) };
        let plain = SolidDecoder { icc_profile: None };
        assert!(run_conversion(&tagged, &options(), &p3, &fx.manager).is_converted());
        assert!(run_conversion(&untagged, &options(), &plain, &fx.manager).is_converted());

        let tagged_jpg = std::fs::read(&tagged.output).unwrap();
        let untagged_jpg = std::fs::read(&untagged.output).unwrap();

        // Untagged pixels are taken as sRGB and survive encoding nearly as-is.
        assert!(distance(center_pixel(&untagged_jpg), SOLID_RGB) <= 6);
        // P3 pixels were remapped before encoding.
        let moved = distance(center_pixel(&tagged_jpg), center_pixel(&untagged_jpg));
        assert!(moved > 10, "P3 pixels barely changed ({})", moved);

        for jpg in [&tagged_jpg, &untagged_jpg] {
            assert!(jpg.windows(12).any(|w| w == b"ICC_PROFILE\0"));
        }
        let srgb = crate::color::srgb_icc_profile().unwrap();
        assert!(tagged_jpg.windows(srgb.len()).any(|w| w == srgb));
    }

    #[test]
    fn test_output_keeps_source_mtime() {
        let fx = Fixture::new();
        let job = fx.job("IMG_0002.heic");
        write_fake_heic(job.source.path());
        let taken = filetime_from_unix(1_500_000_000);
        set_mtime(job.source.path(), taken);

        let result = run_conversion(&job, &options(), &FakeDecoder, &fx.manager);
        assert!(result.is_converted());
        let modified = std::fs::metadata(&job.output).unwrap().modified().unwrap();
        assert_eq!(modified, taken);
    }

    #[test]
    fn test_dry_run_touches_nothing() {
        let fx = Fixture::new();
        let job = fx.job("IMG_0003.heic");
        write_corrupt_heic(job.source.path());
        let opts = options().with_dry_run(true).with_remove_originals(true);

        let result = run_conversion(&job, &opts, &FakeDecoder, &fx.manager);

        assert_eq!(
            result,
            ConversionResult::Skipped {
                source: job.source.path().to_path_buf(),
                reason: SkipReason::DryRun,
            }
        );
        assert!(!job.output.exists());
        assert!(job.source.path().exists());
    }

    #[test]
    fn test_skip_existing() {
        let fx = Fixture::new();
        let job = fx.job("IMG_0004.heic");
        write_fake_heic(job.source.path());
        std::fs::write(&job.output, b"previous").unwrap();

        let result = run_conversion(
            &job,
            &options().with_skip_existing(true),
            &FakeDecoder,
            &fx.manager,
        );
        assert!(matches!(
            result,
            ConversionResult::Skipped { reason: SkipReason::OutputExists, .. }
        ));
        assert_eq!(std::fs::read(&job.output).unwrap(), b"previous");
    }

    #[test]
    fn test_existing_output_overwritten_by_default() {
        let fx = Fixture::new();
        let job = fx.job("IMG_0005.heic");
        write_fake_heic(job.source.path());
        std::fs::write(&job.output, b"previous").unwrap();

        assert!(run_conversion(&job, &options(), &FakeDecoder, &fx.manager).is_converted());
        assert_ne!(std::fs::read(&job.output).unwrap(), b"previous");
    }

    #[test]
    fn test_decode_failure_is_isolated() {
        let fx = Fixture::new();
        let job = fx.job("broken.heic");
        write_corrupt_heic(job.source.path());

        let result = run_conversion(
            &job,
            &options().with_remove_originals(true),
            &FakeDecoder,
            &fx.manager,
        );

        match result {
            ConversionResult::Failed { error, .. } => {
                assert!(error.contains("Failed to decode HEIC"), "got: {}", error)
            }
            other => panic!("expected Failed, got {:?}", other),
        }
        assert!(!job.output.exists());
        assert!(job.source.path().exists(), "failed file must never be deleted");
    }

    #[test]
    fn test_remove_originals_after_success() {
        let fx = Fixture::new();
        let job = fx.job("IMG_0006.heic");
        write_fake_heic(job.source.path());

        let result = run_conversion(
            &job,
            &options().with_remove_originals(true),
            &FakeDecoder,
            &fx.manager,
        );
        assert!(matches!(
            result,
            ConversionResult::Converted { removed_original: true, .. }
        ));
        assert!(job.output.exists());
        assert!(!job.source.path().exists());
    }

    #[test]
    fn test_missing_output_dir_is_io_failure() {
        let dir = tempfile::tempdir().unwrap();
        let manager = OutputManager::new(dir.path(), false);
        let source = SourceFile::new(dir.path().join("a.heic"));
        write_fake_heic(source.path());
        let job = manager.plan(vec![source]).remove(0);

        let result = run_conversion(&job, &options(), &FakeDecoder, &manager);
        assert!(result.is_failed());
        assert!(job.source.path().exists());
    }

    #[test]
    fn test_skip_reason_display() {
        assert_eq!(SkipReason::DryRun.to_string(), "dry-run");
        assert_eq!(SkipReason::OutputExists.to_string(), "output exists");
    }

    fn filetime_from_unix(secs: u64) -> std::time::SystemTime {
        std::time::UNIX_EPOCH + std::time::Duration::from_secs(secs)
    }

    fn set_mtime(path: &Path, time: std::time::SystemTime) {
        let file = std::fs::File::options().write(true).open(path).unwrap();
        file.set_modified(time).unwrap();
    }
}
