pub mod collector;
pub mod color;
pub mod decoder;
pub mod dispatcher;
pub mod jpeg;
pub mod options;
pub mod output;
pub mod pipeline;
pub mod summary;
pub mod task;

#[cfg(test)]
mod test_support;

pub use collector::{collect_heic_files, SourceFile};
pub use decoder::{DecodedImage, HeicDecoder, LibHeifDecoder};
pub use options::ConversionOptions;
pub use output::{AssumeYes, Confirm, ConversionJob, OutputManager, TerminalConfirm};
pub use pipeline::{run, NoopObserver, RunObserver};
pub use summary::RunSummary;
pub use task::{ConversionResult, SkipReason};

pub use shared_utils::img_errors::{ConvertError, Result};
