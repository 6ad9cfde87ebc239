use clap::{Parser, ValueEnum};
use heic_jpg::options::{ConversionOptions, DEFAULT_QUALITY};
use heic_jpg::{
    AssumeYes, Confirm, ConversionResult, LibHeifDecoder, RunObserver, TerminalConfirm,
};
use shared_utils::colors;
use shared_utils::logging::{init_logging, LogConfig};
use shared_utils::unified_progress::UnifiedProgressBar;
use std::path::PathBuf;
use std::sync::OnceLock;
use tracing::Level;

const EXIT_FATAL: i32 = 2;

#[derive(Parser)]
#[command(name = "heic2jpg")]
#[command(
    version,
    about = "Recursively convert HEIC images to JPG",
    long_about = "Recursively convert every .heic file under HEIC_DIR to JPG.\n\
                  Output goes to HEIC_DIR/ConvertedFiles, mirroring subdirectories.\n\
                  EXIF is preserved and colors are converted to sRGB."
)]
struct Cli {
    /// Directory to scan for HEIC files
    #[arg(value_name = "HEIC_DIR")]
    heic_dir: PathBuf,

    /// JPG quality (1-100)
    #[arg(short, long, default_value_t = DEFAULT_QUALITY, value_parser = clap::value_parser!(u8).range(1..=100))]
    quality: u8,

    /// Number of parallel workers [default: based on CPU count]
    #[arg(short, long)]
    workers: Option<usize>,

    /// Show what would be converted without writing anything
    #[arg(short, long)]
    dry: bool,

    /// Delete each original after it was converted successfully
    #[arg(long, visible_alias = "ro")]
    remove_originals: bool,

    /// Skip files whose JPG already exists instead of overwriting
    #[arg(long)]
    skip_existing: bool,

    /// Reuse a non-empty output directory without asking
    #[arg(short = 'y', long)]
    yes: bool,

    /// Summary format
    #[arg(short, long, value_enum, default_value = "human")]
    output: OutputFormat,

    /// Debug-level logging
    #[arg(short, long)]
    verbose: bool,

    /// Directory for log files [default: system temp dir]
    #[arg(long, value_name = "DIR")]
    log_dir: Option<PathBuf>,
}

#[derive(Copy, Clone, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    Human,
    Json,
}

/// Drives the progress bar from worker callbacks.
struct ProgressObserver {
    bar: OnceLock<UnifiedProgressBar>,
    visible: bool,
}

impl ProgressObserver {
    fn new(visible: bool) -> Self {
        Self {
            bar: OnceLock::new(),
            visible,
        }
    }

    fn finish(&self) {
        if let Some(bar) = self.bar.get() {
            bar.finish_with_message("done");
        }
    }
}

impl RunObserver for ProgressObserver {
    fn started(&self, total: usize) {
        let bar = if self.visible {
            UnifiedProgressBar::new(total as u64, "HEIC → JPG")
        } else {
            UnifiedProgressBar::hidden(total as u64)
        };
        let _ = self.bar.set(bar);
    }

    fn finished(&self, result: &ConversionResult) {
        let Some(bar) = self.bar.get() else {
            return;
        };
        if let ConversionResult::Failed { source, error } = result {
            bar.println(&format!(
                "{} {}: {}",
                colors::error().apply_to("❌"),
                source.display(),
                error
            ));
        }
        if let Some(name) = result.source().file_name() {
            bar.set_message(name.to_string_lossy());
        }
        bar.inc();
    }
}

fn main() {
    let cli = Cli::parse();

    let mut log_config = LogConfig::default();
    if cli.verbose {
        log_config = log_config.with_level(Level::DEBUG);
    }
    if let Some(dir) = &cli.log_dir {
        log_config = log_config.with_log_dir(dir);
    }
    if let Err(e) = init_logging("heic2jpg", log_config) {
        eprintln!(
            "{} Logging disabled: {:#}",
            colors::warning().apply_to("⚠️"),
            e
        );
    }

    match run(&cli) {
        Ok(code) => std::process::exit(code),
        Err(e) => {
            tracing::error!(error = %e, "Run aborted");
            eprintln!("{} {:#}", colors::error().apply_to("❌ Error:"), e);
            std::process::exit(EXIT_FATAL);
        }
    }
}

fn run(cli: &Cli) -> anyhow::Result<i32> {
    let workers = cli
        .workers
        .unwrap_or_else(shared_utils::thread_manager::default_worker_count);
    let options = ConversionOptions::new(cli.quality, workers)?
        .with_dry_run(cli.dry)
        .with_remove_originals(cli.remove_originals)
        .with_skip_existing(cli.skip_existing);

    let json = cli.output == OutputFormat::Json;
    if !json {
        eprintln!(
            "{} {}",
            colors::info().apply_to("📂 Scanning"),
            cli.heic_dir.display()
        );
        if options.dry_run() {
            eprintln!(
                "{}",
                colors::dim().apply_to("Dry run: nothing will be written or deleted")
            );
        } else if options.remove_originals() {
            eprintln!(
                "{}",
                colors::warning().apply_to("Originals will be deleted after successful conversion")
            );
        }
    }

    let confirm: &dyn Confirm = if cli.yes { &AssumeYes } else { &TerminalConfirm };
    let observer = ProgressObserver::new(!json);

    let summary = heic_jpg::run(&cli.heic_dir, &options, &LibHeifDecoder, confirm, &observer);
    observer.finish();
    let summary = summary?;

    if json {
        println!("{}", summary.to_json()?);
    } else if summary.total() == 0 {
        eprintln!(
            "{}",
            colors::dim().apply_to(format!("No HEIC files found in {}", cli.heic_dir.display()))
        );
    } else {
        summary.print_human();
        if summary.failed() == 0 {
            eprintln!("{}", colors::success().apply_to("✅ All files processed"));
        }
    }

    Ok(summary.exit_code())
}
