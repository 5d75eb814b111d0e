//! Streaming persistence of large response bodies.

pub mod downloader;
pub mod filename;
pub mod progress;

pub use downloader::{
    incomplete_path, DownloadOutcome, StreamingDownloader, TransferError, INCOMPLETE_SUFFIX,
};
pub use filename::{filename_from_content_disposition, synthesize_filename};
pub use progress::{BarProgress, ByteCounter, NoopProgress, ProgressSink};
