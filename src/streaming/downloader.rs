//! Streaming artifact downloader with automatic cleanup on failure.
//!
//! Response bodies are written to `<final path>.incomplete` in the same
//! directory as the destination, then renamed onto the destination once the
//! stream has ended and passed the sanity floor. If the transfer fails, is
//! cancelled, or the future is dropped, the temporary file is removed.
//! A reader never observes a partial file at the final path.
//!
//! The temporary file is created exclusively, so two transfers can never
//! write through the same one.

use std::fmt;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use bytes::Bytes;
use futures_util::{Stream, StreamExt};
use thiserror::Error;
use tokio::fs::{File, OpenOptions};
use tokio::io::{AsyncWriteExt, BufWriter};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::DownloadConfig;
use crate::streaming::filename::{filename_from_headers, sanitize_filename, synthesize_filename};
use crate::streaming::progress::ProgressSink;

/// Suffix appended to the final path while a transfer is in flight.
pub const INCOMPLETE_SUFFIX: &str = ".incomplete";

/// Numbered variants tried for a server-suggested filename.
const MAX_NAME_ATTEMPTS: u32 = 1000;

// ─────────────────────────────────────────────────────────────────────────────
// Errors
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum TransferError {
    /// The body was below the sanity floor; it is an error message, not a raster.
    #[error("response too short to be an artifact ({bytes} bytes): {message}")]
    ShortResponse { bytes: u64, message: String },

    #[error("I/O error on {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("response stream failed: {0}")]
    Stream(String),

    #[error("transfer cancelled")]
    Cancelled,

    #[error("no free filename for {name} in {}", .dir.display())]
    NoFreeName { name: String, dir: PathBuf },
}

fn io_error(path: &Path) -> impl FnOnce(std::io::Error) -> TransferError + '_ {
    move |source| TransferError::Io {
        path: path.to_path_buf(),
        source,
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Public Types
// ─────────────────────────────────────────────────────────────────────────────

/// A published artifact.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadOutcome {
    pub path: PathBuf,
    pub bytes_written: u64,
    /// Time from request start to the first body byte, i.e. server-side
    /// processing time. `None` for an empty body.
    pub time_to_first_byte: Option<Duration>,
    pub elapsed: Duration,
}

/// Returns the temporary sibling used while `final_path` is being written.
pub fn incomplete_path(final_path: &Path) -> PathBuf {
    let mut name = final_path.as_os_str().to_owned();
    name.push(INCOMPLETE_SUFFIX);
    PathBuf::from(name)
}

/// `area.tif`, `area_1.tif`, `area_2.tif`, ...
fn numbered_name(name: &str, n: u32) -> String {
    if n == 0 {
        return name.to_string();
    }
    match name.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() => format!("{}_{}.{}", stem, n, ext),
        _ => format!("{}_{}", name, n),
    }
}

/// Removes the temporary file on drop unless disarmed.
///
/// Only ever built for a temp file this transfer created itself, so it never
/// removes another transfer's file.
struct IncompleteFile {
    path: PathBuf,
    armed: bool,
}

impl IncompleteFile {
    fn new(path: PathBuf) -> Self {
        Self { path, armed: true }
    }

    fn disarm(mut self) {
        self.armed = false;
    }
}

impl Drop for IncompleteFile {
    fn drop(&mut self) {
        if self.armed {
            // Best effort; a leftover temp file is not worth masking the real error.
            if let Err(e) = std::fs::remove_file(&self.path) {
                if e.kind() != std::io::ErrorKind::NotFound {
                    warn!("[DOWNLOAD] Failed to remove {}: {}", self.path.display(), e);
                }
            }
        }
    }
}

/// Exclusively creates the `.incomplete` sibling of `final_path`.
///
/// Fails with `AlreadyExists` while another transfer owns that path.
async fn open_incomplete(final_path: &Path) -> Result<(File, IncompleteFile), TransferError> {
    let temp_path = incomplete_path(final_path);
    let file = OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(&temp_path)
        .await
        .map_err(io_error(&temp_path))?;
    Ok((file, IncompleteFile::new(temp_path)))
}

fn is_already_exists(err: &TransferError) -> bool {
    matches!(err, TransferError::Io { source, .. } if source.kind() == ErrorKind::AlreadyExists)
}

async fn path_exists(path: &Path) -> Result<bool, TransferError> {
    tokio::fs::try_exists(path).await.map_err(io_error(path))
}

// ─────────────────────────────────────────────────────────────────────────────
// StreamingDownloader
// ─────────────────────────────────────────────────────────────────────────────

/// Writes response bodies to disk in fixed-size pieces.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamingDownloader {
    chunk_size: usize,
    min_artifact_bytes: u64,
}

impl Default for StreamingDownloader {
    fn default() -> Self {
        Self::from_config(&DownloadConfig::default())
    }
}

impl StreamingDownloader {
    pub fn new(chunk_size: usize, min_artifact_bytes: u64) -> Self {
        Self {
            chunk_size: chunk_size.max(1),
            min_artifact_bytes,
        }
    }

    pub fn from_config(config: &DownloadConfig) -> Self {
        Self::new(config.chunk_size_bytes, config.min_artifact_bytes)
    }

    /// Streams a response into `dir`.
    ///
    /// The filename is, in order: `filename` if given, the server's
    /// `Content-Disposition` suggestion, or `output-<uuid>.<extension>`.
    /// A server suggestion that is already taken, on disk or by a transfer in
    /// flight, gets a numeric suffix (`area_1.tif`). An explicit `filename`
    /// replaces an existing file, but not one another transfer is writing.
    /// `started` marks when the request was sent, for time-to-first-byte.
    ///
    /// # Errors
    ///
    /// Any `TransferError`; no file is left at the final or temporary path.
    #[allow(clippy::too_many_arguments)]
    pub async fn download(
        &self,
        response: reqwest::Response,
        dir: &Path,
        filename: Option<&str>,
        extension: &str,
        started: Instant,
        progress: &dyn ProgressSink,
        cancel: &CancellationToken,
    ) -> Result<DownloadOutcome, TransferError> {
        tokio::fs::create_dir_all(dir).await.map_err(io_error(dir))?;

        let (final_path, file, guard) = match filename.and_then(sanitize_filename) {
            Some(name) => {
                let final_path = dir.join(name);
                let (file, guard) = open_incomplete(&final_path).await?;
                (final_path, file, guard)
            }
            None => match filename_from_headers(response.headers()) {
                Some(name) => claim_free_name(dir, &name).await?,
                None => {
                    let final_path = dir.join(synthesize_filename(extension));
                    let (file, guard) = open_incomplete(&final_path).await?;
                    (final_path, file, guard)
                }
            },
        };

        progress.start(response.content_length());

        // reqwest errors embed the request URL.
        let stream = response
            .bytes_stream()
            .map(|chunk| chunk.map_err(|e| e.without_url()));

        self.write_into(stream, file, guard, &final_path, started, progress, cancel)
            .await
    }

    /// Writes `stream` to `final_path` through its `.incomplete` sibling.
    ///
    /// Chunks are appended strictly in order. The cancellation token is
    /// checked before every chunk read. An existing file at `final_path` is
    /// replaced only once the new one is complete.
    ///
    /// # Errors
    ///
    /// `TransferError::Io` with `AlreadyExists` if another transfer is
    /// writing the same `final_path`.
    pub async fn write_stream<S, E>(
        &self,
        stream: S,
        final_path: &Path,
        started: Instant,
        progress: &dyn ProgressSink,
        cancel: &CancellationToken,
    ) -> Result<DownloadOutcome, TransferError>
    where
        S: Stream<Item = Result<Bytes, E>>,
        E: fmt::Display,
    {
        let (file, guard) = open_incomplete(final_path).await?;
        self.write_into(stream, file, guard, final_path, started, progress, cancel)
            .await
    }

    #[allow(clippy::too_many_arguments)]
    async fn write_into<S, E>(
        &self,
        stream: S,
        file: File,
        guard: IncompleteFile,
        final_path: &Path,
        started: Instant,
        progress: &dyn ProgressSink,
        cancel: &CancellationToken,
    ) -> Result<DownloadOutcome, TransferError>
    where
        S: Stream<Item = Result<Bytes, E>>,
        E: fmt::Display,
    {
        let result = self
            .write_body(stream, file, guard, final_path, started, progress, cancel)
            .await;
        match &result {
            Ok(_) => progress.finish(),
            Err(_) => progress.abandon(),
        }
        result
    }

    #[allow(clippy::too_many_arguments)]
    async fn write_body<S, E>(
        &self,
        stream: S,
        file: File,
        guard: IncompleteFile,
        final_path: &Path,
        started: Instant,
        progress: &dyn ProgressSink,
        cancel: &CancellationToken,
    ) -> Result<DownloadOutcome, TransferError>
    where
        S: Stream<Item = Result<Bytes, E>>,
        E: fmt::Display,
    {
        let temp_path = guard.path.clone();
        // Dropped before `guard`, so the handle is closed before removal.
        let mut writer = BufWriter::with_capacity(self.chunk_size, file);

        let mut stream = std::pin::pin!(stream);
        let mut bytes_written: u64 = 0;
        let mut time_to_first_byte: Option<Duration> = None;
        let mut head: Vec<u8> = Vec::new();
        let head_limit = usize::try_from(self.min_artifact_bytes).unwrap_or(usize::MAX);

        loop {
            let next = tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    info!("[DOWNLOAD] Cancelled after {} bytes", bytes_written);
                    return Err(TransferError::Cancelled);
                }
                next = stream.next() => next,
            };

            let Some(chunk) = next else {
                break;
            };
            let chunk = chunk.map_err(|e| TransferError::Stream(e.to_string()))?;
            if chunk.is_empty() {
                continue;
            }

            if time_to_first_byte.is_none() {
                let ttfb = started.elapsed();
                info!(
                    "[DOWNLOAD] Request complete, time elapsed: {:.1}s",
                    ttfb.as_secs_f64()
                );
                time_to_first_byte = Some(ttfb);
            }

            if head.len() < head_limit {
                let take = (head_limit - head.len()).min(chunk.len());
                head.extend_from_slice(&chunk[..take]);
            }

            writer
                .write_all(&chunk)
                .await
                .map_err(io_error(&temp_path))?;
            bytes_written += chunk.len() as u64;
            progress.advance(chunk.len() as u64);
        }

        writer.flush().await.map_err(io_error(&temp_path))?;
        let file = writer.into_inner();
        file.sync_all().await.map_err(io_error(&temp_path))?;
        drop(file);

        if bytes_written < self.min_artifact_bytes {
            let message = first_line(&head);
            warn!(
                "[DOWNLOAD] Response of {} bytes is below the {} byte floor",
                bytes_written, self.min_artifact_bytes
            );
            return Err(TransferError::ShortResponse {
                bytes: bytes_written,
                message,
            });
        }

        tokio::fs::rename(&temp_path, final_path)
            .await
            .map_err(io_error(final_path))?;
        guard.disarm();

        let elapsed = started.elapsed();
        info!(
            "[DOWNLOAD] Saved {} ({} bytes) in {:.1}s",
            final_path.display(),
            bytes_written,
            elapsed.as_secs_f64()
        );
        debug!(
            "[DOWNLOAD] Transfer time after first byte: {:.1}s",
            elapsed
                .saturating_sub(time_to_first_byte.unwrap_or_default())
                .as_secs_f64()
        );

        Ok(DownloadOutcome {
            path: final_path.to_path_buf(),
            bytes_written,
            time_to_first_byte,
            elapsed,
        })
    }
}

/// Claims the first of `name`, `name_1`, ... in `dir` that neither exists nor
/// is being written by another transfer.
async fn claim_free_name(
    dir: &Path,
    name: &str,
) -> Result<(PathBuf, File, IncompleteFile), TransferError> {
    for n in 0..MAX_NAME_ATTEMPTS {
        let candidate = dir.join(numbered_name(name, n));
        if path_exists(&candidate).await? {
            continue;
        }

        let (file, guard) = match open_incomplete(&candidate).await {
            Ok(claimed) => claimed,
            Err(e) if is_already_exists(&e) => continue,
            Err(e) => return Err(e),
        };

        // Another transfer may have published this name between the check
        // and the claim.
        if path_exists(&candidate).await? {
            drop(file);
            drop(guard);
            continue;
        }

        if n > 0 {
            debug!("[DOWNLOAD] {} is taken, using {}", name, candidate.display());
        }
        return Ok((candidate, file, guard));
    }

    Err(TransferError::NoFreeName {
        name: name.to_string(),
        dir: dir.to_path_buf(),
    })
}

/// First non-empty line of a short body, used as its error message.
fn first_line(head: &[u8]) -> String {
    let text = String::from_utf8_lossy(head);
    let line = text
        .lines()
        .map(str::trim)
        .find(|line| !line.is_empty())
        .unwrap_or("empty response body");
    crate::error::sanitize_message(line, "server returned an error message (redacted)")
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::streaming::progress::{ByteCounter, NoopProgress};
    use futures_util::stream;
    use std::fs;
    use std::sync::atomic::{AtomicBool, Ordering};
    use tempfile::TempDir;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn chunks(sizes: &[usize]) -> Vec<Result<Bytes, String>> {
        sizes
            .iter()
            .enumerate()
            .map(|(i, size)| Ok(Bytes::from(vec![i as u8; *size])))
            .collect()
    }

    fn dir_entries(dir: &Path) -> Vec<String> {
        let mut names: Vec<String> = fs::read_dir(dir)
            .expect("Failed to read dir")
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        names
    }

    #[tokio::test]
    async fn test_successful_stream_is_published() {
        let temp_dir = TempDir::new().unwrap();
        let final_path = temp_dir.path().join("composite.tif");
        let downloader = StreamingDownloader::default();
        let counter = ByteCounter::default();

        let outcome = downloader
            .write_stream(
                stream::iter(chunks(&[400, 700, 2500])),
                &final_path,
                Instant::now(),
                &counter,
                &CancellationToken::new(),
            )
            .await
            .expect("download should succeed");

        assert_eq!(outcome.path, final_path);
        assert_eq!(outcome.bytes_written, 3600);
        assert!(outcome.time_to_first_byte.is_some());
        assert_eq!(fs::metadata(&final_path).unwrap().len(), 3600);
        assert_eq!(counter.bytes(), 3600);
        assert_eq!(dir_entries(temp_dir.path()), vec!["composite.tif"]);

        let content = fs::read(&final_path).unwrap();
        assert_eq!(content[0], 0);
        assert_eq!(content[400], 1);
        assert_eq!(content[3599], 2);
    }

    #[tokio::test]
    async fn test_stream_error_leaves_nothing_behind() {
        let temp_dir = TempDir::new().unwrap();
        let final_path = temp_dir.path().join("composite.tif");
        let items: Vec<Result<Bytes, String>> = vec![
            Ok(Bytes::from(vec![1u8; 4096])),
            Ok(Bytes::from(vec![2u8; 4096])),
            Err("connection reset by peer".to_string()),
            Ok(Bytes::from(vec![3u8; 4096])),
        ];

        let result = StreamingDownloader::default()
            .write_stream(
                stream::iter(items),
                &final_path,
                Instant::now(),
                &NoopProgress,
                &CancellationToken::new(),
            )
            .await;

        assert!(matches!(result, Err(TransferError::Stream(msg)) if msg.contains("reset")));
        assert!(!final_path.exists());
        assert!(!incomplete_path(&final_path).exists());
        assert!(dir_entries(temp_dir.path()).is_empty());
    }

    #[tokio::test]
    async fn test_short_response_reports_first_line() {
        let temp_dir = TempDir::new().unwrap();
        let final_path = temp_dir.path().join("composite.tif");
        let body = Bytes::from_static(b"No imagery available for date\nrequest id 42\n");

        let result = StreamingDownloader::default()
            .write_stream(
                stream::iter(vec![Ok::<_, String>(body)]),
                &final_path,
                Instant::now(),
                &NoopProgress,
                &CancellationToken::new(),
            )
            .await;

        match result {
            Err(TransferError::ShortResponse { bytes, message }) => {
                assert_eq!(bytes, 44);
                assert_eq!(message, "No imagery available for date");
            }
            other => panic!("Expected ShortResponse, got: {:?}", other),
        }
        assert!(dir_entries(temp_dir.path()).is_empty());
    }

    #[tokio::test]
    async fn test_exact_floor_is_accepted() {
        let temp_dir = TempDir::new().unwrap();
        let final_path = temp_dir.path().join("edge.tif");

        let outcome = StreamingDownloader::default()
            .write_stream(
                stream::iter(chunks(&[999, 1])),
                &final_path,
                Instant::now(),
                &NoopProgress,
                &CancellationToken::new(),
            )
            .await
            .unwrap();

        assert_eq!(outcome.bytes_written, 1000);
        assert!(final_path.exists());
    }

    #[tokio::test]
    async fn test_empty_body_is_short() {
        let temp_dir = TempDir::new().unwrap();
        let final_path = temp_dir.path().join("empty.tif");

        let result = StreamingDownloader::default()
            .write_stream(
                stream::iter(Vec::<Result<Bytes, String>>::new()),
                &final_path,
                Instant::now(),
                &NoopProgress,
                &CancellationToken::new(),
            )
            .await;

        assert!(matches!(
            result,
            Err(TransferError::ShortResponse { bytes: 0, .. })
        ));
        assert!(dir_entries(temp_dir.path()).is_empty());
    }

    #[tokio::test]
    async fn test_cancellation_removes_temp_file() {
        let temp_dir = TempDir::new().unwrap();
        let final_path = temp_dir.path().join("cancelled.tif");
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();

        // Cancels once the second chunk has been pulled.
        let items = stream::iter(chunks(&[2048, 2048, 2048]))
            .enumerate()
            .map(move |(i, item)| {
                if i == 1 {
                    trigger.cancel();
                }
                item
            });

        let result = StreamingDownloader::default()
            .write_stream(items, &final_path, Instant::now(), &NoopProgress, &cancel)
            .await;

        assert!(matches!(result, Err(TransferError::Cancelled)));
        assert!(dir_entries(temp_dir.path()).is_empty());
    }

    #[tokio::test]
    async fn test_existing_destination_is_replaced_only_on_success() {
        let temp_dir = TempDir::new().unwrap();
        let final_path = temp_dir.path().join("composite.tif");
        fs::write(&final_path, b"OLD_CONTENT").unwrap();

        let result = StreamingDownloader::default()
            .write_stream(
                stream::iter(chunks(&[10])),
                &final_path,
                Instant::now(),
                &NoopProgress,
                &CancellationToken::new(),
            )
            .await;
        assert!(result.is_err());
        assert_eq!(fs::read(&final_path).unwrap(), b"OLD_CONTENT");

        StreamingDownloader::default()
            .write_stream(
                stream::iter(chunks(&[1500])),
                &final_path,
                Instant::now(),
                &NoopProgress,
                &CancellationToken::new(),
            )
            .await
            .unwrap();
        assert_eq!(fs::metadata(&final_path).unwrap().len(), 1500);
    }

    #[tokio::test]
    async fn test_missing_directory_is_io_error() {
        let temp_dir = TempDir::new().unwrap();
        let final_path = temp_dir.path().join("missing").join("composite.tif");

        let result = StreamingDownloader::default()
            .write_stream(
                stream::iter(chunks(&[1500])),
                &final_path,
                Instant::now(),
                &NoopProgress,
                &CancellationToken::new(),
            )
            .await;

        assert!(matches!(result, Err(TransferError::Io { .. })));
    }

    #[tokio::test]
    async fn test_same_destination_in_flight_is_refused() {
        let temp_dir = TempDir::new().unwrap();
        let final_path = temp_dir.path().join("composite.tif");
        let downloader = StreamingDownloader::default();

        // The first transfer is slow enough for the second to start mid-way.
        let slow = stream::iter(vec![Ok::<_, String>(Bytes::from(vec![0xA; 4096])); 4]).then(
            |chunk| async move {
                tokio::time::sleep(Duration::from_millis(20)).await;
                chunk
            },
        );
        let first_cancel = CancellationToken::new();
        let first = downloader.write_stream(
            slow,
            &final_path,
            Instant::now(),
            &NoopProgress,
            &first_cancel,
        );
        let second = async {
            tokio::time::sleep(Duration::from_millis(10)).await;
            downloader
                .write_stream(
                    stream::iter(vec![Ok::<_, String>(Bytes::from(vec![0xB; 4096]))]),
                    &final_path,
                    Instant::now(),
                    &NoopProgress,
                    &CancellationToken::new(),
                )
                .await
        };

        let (first, second) = tokio::join!(first, second);

        assert_eq!(first.unwrap().bytes_written, 4 * 4096);
        assert!(matches!(
            second,
            Err(TransferError::Io { ref source, .. }) if source.kind() == ErrorKind::AlreadyExists
        ));
        let content = fs::read(&final_path).unwrap();
        assert_eq!(content.len(), 4 * 4096);
        assert!(content.iter().all(|b| *b == 0xA));
        assert_eq!(dir_entries(temp_dir.path()), vec!["composite.tif"]);
    }

    #[derive(Default)]
    struct RecordingProgress {
        finished: AtomicBool,
        abandoned: AtomicBool,
    }

    impl ProgressSink for RecordingProgress {
        fn advance(&self, _bytes: u64) {}

        fn finish(&self) {
            self.finished.store(true, Ordering::SeqCst);
        }

        fn abandon(&self) {
            self.abandoned.store(true, Ordering::SeqCst);
        }
    }

    #[tokio::test]
    async fn test_progress_is_abandoned_on_failure() {
        let temp_dir = TempDir::new().unwrap();
        let progress = RecordingProgress::default();

        let result = StreamingDownloader::default()
            .write_stream(
                stream::iter(chunks(&[10])),
                &temp_dir.path().join("short.tif"),
                Instant::now(),
                &progress,
                &CancellationToken::new(),
            )
            .await;

        assert!(result.is_err());
        assert!(progress.abandoned.load(Ordering::SeqCst));
        assert!(!progress.finished.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_progress_is_finished_on_success() {
        let temp_dir = TempDir::new().unwrap();
        let progress = RecordingProgress::default();

        StreamingDownloader::default()
            .write_stream(
                stream::iter(chunks(&[1500])),
                &temp_dir.path().join("ok.tif"),
                Instant::now(),
                &progress,
                &CancellationToken::new(),
            )
            .await
            .unwrap();

        assert!(progress.finished.load(Ordering::SeqCst));
        assert!(!progress.abandoned.load(Ordering::SeqCst));
    }

    #[test]
    fn test_numbered_name() {
        assert_eq!(numbered_name("area.tif", 0), "area.tif");
        assert_eq!(numbered_name("area.tif", 2), "area_2.tif");
        assert_eq!(numbered_name("area.v2.tif", 1), "area.v2_1.tif");
        assert_eq!(numbered_name("raster", 3), "raster_3");
        assert_eq!(numbered_name(".hidden", 1), ".hidden_1");
    }

    #[tokio::test]
    async fn test_claim_skips_published_and_in_flight_names() {
        let temp_dir = TempDir::new().unwrap();
        let dir = temp_dir.path();
        fs::write(dir.join("area.tif"), b"EARLIER").unwrap();
        fs::write(dir.join("area_1.tif.incomplete"), b"IN FLIGHT").unwrap();

        let (path, file, guard) = claim_free_name(dir, "area.tif").await.unwrap();

        assert_eq!(path, dir.join("area_2.tif"));
        assert!(incomplete_path(&path).exists());
        drop(file);
        drop(guard);
        assert!(!incomplete_path(&path).exists());
        assert_eq!(fs::read(dir.join("area_1.tif.incomplete")).unwrap(), b"IN FLIGHT");
        assert_eq!(fs::read(dir.join("area.tif")).unwrap(), b"EARLIER");
    }

    #[test]
    fn test_incomplete_path_appends_suffix() {
        assert_eq!(
            incomplete_path(Path::new("/data/out/area.tif")),
            PathBuf::from("/data/out/area.tif.incomplete")
        );
    }

    // ─────────────────────────────────────────────────────────────────────────
    // HTTP download Tests
    // ─────────────────────────────────────────────────────────────────────────

    async fn fetch(server: &MockServer, route: &str) -> reqwest::Response {
        reqwest::get(format!("{}{}", server.uri(), route))
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_download_uses_content_disposition_and_creates_dir() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/raster"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header(
                        "Content-Disposition",
                        "attachment; filename=\"../evil/area_2024.tif\"",
                    )
                    .set_body_bytes(vec![7u8; 5000]),
            )
            .mount(&mock_server)
            .await;

        let temp_dir = TempDir::new().unwrap();
        let out_dir = temp_dir.path().join("nested").join("out");

        let outcome = StreamingDownloader::default()
            .download(
                fetch(&mock_server, "/raster").await,
                &out_dir,
                None,
                "tif",
                Instant::now(),
                &NoopProgress,
                &CancellationToken::new(),
            )
            .await
            .unwrap();

        assert_eq!(outcome.path, out_dir.join("area_2024.tif"));
        assert_eq!(outcome.bytes_written, 5000);
        assert_eq!(dir_entries(&out_dir), vec!["area_2024.tif"]);
    }

    #[tokio::test]
    async fn test_download_synthesizes_name_without_header() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/raster"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![1u8; 1200]))
            .mount(&mock_server)
            .await;

        let temp_dir = TempDir::new().unwrap();

        let outcome = StreamingDownloader::default()
            .download(
                fetch(&mock_server, "/raster").await,
                temp_dir.path(),
                None,
                "tif",
                Instant::now(),
                &NoopProgress,
                &CancellationToken::new(),
            )
            .await
            .unwrap();

        let name = outcome.path.file_name().unwrap().to_string_lossy();
        assert!(name.starts_with("output-"));
        assert!(name.ends_with(".tif"));
    }

    #[tokio::test]
    async fn test_download_explicit_filename_wins() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/raster"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("Content-Disposition", "attachment; filename=server.tif")
                    .set_body_bytes(vec![1u8; 1200]),
            )
            .mount(&mock_server)
            .await;

        let temp_dir = TempDir::new().unwrap();

        let outcome = StreamingDownloader::default()
            .download(
                fetch(&mock_server, "/raster").await,
                temp_dir.path(),
                Some("mine.tif"),
                "tif",
                Instant::now(),
                &NoopProgress,
                &CancellationToken::new(),
            )
            .await
            .unwrap();

        assert_eq!(outcome.path, temp_dir.path().join("mine.tif"));
    }

    #[tokio::test]
    async fn test_download_numbers_taken_server_name() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/raster"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("Content-Disposition", "attachment; filename=\"area.tif\"")
                    .set_body_bytes(vec![9u8; 1200]),
            )
            .mount(&mock_server)
            .await;

        let temp_dir = TempDir::new().unwrap();
        fs::write(temp_dir.path().join("area.tif"), b"EARLIER").unwrap();

        let outcome = StreamingDownloader::default()
            .download(
                fetch(&mock_server, "/raster").await,
                temp_dir.path(),
                None,
                "tif",
                Instant::now(),
                &NoopProgress,
                &CancellationToken::new(),
            )
            .await
            .unwrap();

        assert_eq!(outcome.path, temp_dir.path().join("area_1.tif"));
        assert_eq!(fs::read(temp_dir.path().join("area.tif")).unwrap(), b"EARLIER");
        assert_eq!(dir_entries(temp_dir.path()), vec!["area.tif", "area_1.tif"]);
    }
}
