//! Byte progress reporting for streaming downloads.

use std::sync::atomic::{AtomicU64, Ordering};

use indicatif::{ProgressBar, ProgressStyle};

const BAR_TEMPLATE: &str =
    "{spinner:.blue} [{elapsed_precise}] {wide_bar:.cyan/blue} {bytes}/{total_bytes} ({bytes_per_sec}, {eta})";

const BAR_CHARS: &str = "█▓▒░  ";

/// Receives progress events from one download.
///
/// `start` is called once with the declared content length (if any),
/// `advance` after every chunk written, then exactly one of `finish` (the
/// artifact was published) or `abandon` (the transfer failed or was
/// cancelled).
pub trait ProgressSink: Send + Sync {
    fn start(&self, _total_bytes: Option<u64>) {}

    fn advance(&self, bytes: u64);

    fn finish(&self) {}

    fn abandon(&self) {}
}

/// Discards progress events.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopProgress;

impl ProgressSink for NoopProgress {
    fn advance(&self, _bytes: u64) {}
}

/// Renders an `indicatif` byte progress bar on stderr.
pub struct BarProgress {
    bar: ProgressBar,
}

impl BarProgress {
    pub fn new() -> Self {
        let bar = ProgressBar::no_length();
        if let Ok(style) = ProgressStyle::with_template(BAR_TEMPLATE) {
            bar.set_style(style.progress_chars(BAR_CHARS));
        }
        Self { bar }
    }
}

impl Default for BarProgress {
    fn default() -> Self {
        Self::new()
    }
}

impl ProgressSink for BarProgress {
    fn start(&self, total_bytes: Option<u64>) {
        if let Some(total) = total_bytes {
            self.bar.set_length(total);
        }
    }

    fn advance(&self, bytes: u64) {
        self.bar.inc(bytes);
    }

    fn finish(&self) {
        self.bar.finish();
    }

    fn abandon(&self) {
        self.bar.abandon();
    }
}

/// Counts bytes; useful for callers that poll progress themselves.
#[derive(Debug, Default)]
pub struct ByteCounter {
    total: AtomicU64,
    bytes: AtomicU64,
}

impl ByteCounter {
    pub fn bytes(&self) -> u64 {
        self.bytes.load(Ordering::Relaxed)
    }

    /// Declared length, `0` when unknown.
    pub fn total(&self) -> u64 {
        self.total.load(Ordering::Relaxed)
    }
}

impl ProgressSink for ByteCounter {
    fn start(&self, total_bytes: Option<u64>) {
        self.total.store(total_bytes.unwrap_or(0), Ordering::Relaxed);
    }

    fn advance(&self, bytes: u64) {
        self.bytes.fetch_add(bytes, Ordering::Relaxed);
    }
}

/// Picks the sink for `download.show_progress`.
pub(crate) fn sink_for(show_progress: bool) -> Box<dyn ProgressSink> {
    if show_progress {
        Box::new(BarProgress::new())
    } else {
        Box::new(NoopProgress)
    }
}
