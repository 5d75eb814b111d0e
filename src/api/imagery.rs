//! Imagery search, composite estimates and composite retrieval.
//!
//! Composite retrieval is the only operation whose successful response is not
//! an envelope: the body is the raster itself and is streamed to disk.

use std::path::Path;
use std::time::Instant;

use reqwest::header::CONTENT_TYPE;
use reqwest::Method;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::api::client::ClearSkyClient;
use crate::api::envelope::{read_body, ServiceResult};
use crate::api::models::{
    CompositeCommand, CompositeEstimateData, CompositeEstimateQuery, SearchAvailableImageryData,
    SearchAvailableImageryQuery,
};
use crate::api::{COMPOSITE_ESTIMATE_PATH, COMPOSITE_PATH, SEARCH_AVAILABLE_PATH};
use crate::error::ClientError;
use crate::streaming::{DownloadOutcome, ProgressSink};
use crate::validation::GeometryRequest;

impl ClearSkyClient {
    /// Lists the dates with imagery over an area, per model and constellation.
    ///
    /// # Errors
    ///
    /// `ClientError::Validation` before any request if the geometry rule is broken.
    pub async fn search_available_imagery(
        &self,
        query: &SearchAvailableImageryQuery,
    ) -> Result<ServiceResult<SearchAvailableImageryData>, ClientError> {
        query.validate_geometry()?;
        self.call_json_envelope(Method::POST, SEARCH_AVAILABLE_PATH, &[], query)
            .await
    }

    /// Estimates area and credit cost of a composite.
    pub async fn estimate_composite(
        &self,
        query: &CompositeEstimateQuery,
    ) -> Result<ServiceResult<CompositeEstimateData>, ClientError> {
        query.validate_geometry()?;
        self.call_json_envelope(Method::POST, COMPOSITE_ESTIMATE_PATH, &[], query)
            .await
    }

    /// [`estimate_composite`](Self::estimate_composite), waiting and asking
    /// again while the service is unreachable.
    ///
    /// Attempts and wait come from `estimate_repoll` in the configuration.
    /// Only `ClientError::ConnectionFailed` is re-polled; every other outcome
    /// is returned as is.
    pub async fn estimate_composite_with_repoll(
        &self,
        query: &CompositeEstimateQuery,
    ) -> Result<ServiceResult<CompositeEstimateData>, ClientError> {
        let repoll = &self.config().estimate_repoll;
        let mut attempt = 1;

        loop {
            match self.estimate_composite(query).await {
                Err(ClientError::ConnectionFailed(reason)) if attempt < repoll.attempts => {
                    warn!(
                        "[API] Estimate attempt {}/{} failed ({}), retrying in {}s",
                        attempt, repoll.attempts, reason, repoll.interval_secs
                    );
                    tokio::time::sleep(repoll.interval()).await;
                    attempt += 1;
                }
                other => return other,
            }
        }
    }

    /// Processes a composite and streams the raster into `dir`.
    ///
    /// The file is named `filename` if given, else by the server's
    /// `Content-Disposition`, else `output-<uuid>.<FileType>`.
    ///
    /// # Errors
    ///
    /// - `ClientError::Validation` before any request
    /// - `ClientError::Transfer` if the body is short or cannot be written;
    ///   no partial file is left behind
    ///
    /// A refusal by the service is returned as `ServiceResult::Failure`.
    pub async fn retrieve_composite(
        &self,
        command: &CompositeCommand,
        dir: impl AsRef<Path>,
        filename: Option<&str>,
    ) -> Result<ServiceResult<DownloadOutcome>, ClientError> {
        let progress = self.progress_sink();
        self.retrieve_composite_with(
            command,
            dir.as_ref(),
            filename,
            progress.as_ref(),
            &CancellationToken::new(),
        )
        .await
    }

    /// [`retrieve_composite`](Self::retrieve_composite) with an explicit
    /// progress sink and cancellation token.
    pub async fn retrieve_composite_with(
        &self,
        command: &CompositeCommand,
        dir: &Path,
        filename: Option<&str>,
        progress: &dyn ProgressSink,
        cancel: &CancellationToken,
    ) -> Result<ServiceResult<DownloadOutcome>, ClientError> {
        command.validate_geometry()?;

        let started = Instant::now();
        let response = self
            .call_json(Method::POST, COMPOSITE_PATH, &[], command)
            .await?;

        let is_json = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .is_some_and(|v| v.starts_with("application/json"));

        // Refusals come back as an envelope instead of a raster.
        if !response.status().is_success() || is_json {
            let (status, body) = read_body(response).await?;
            return match ServiceResult::<serde_json::Value>::from_parts(status, &body)? {
                ServiceResult::Failure(failure) => {
                    info!(
                        "[API] Composite refused ({}): {}",
                        failure.code, failure.message
                    );
                    Ok(ServiceResult::Failure(failure))
                }
                ServiceResult::Success(_) => Err(ClientError::InvalidResponse(
                    "Expected a raster body, got a JSON envelope".into(),
                )),
            };
        }

        let outcome = self
            .downloader()
            .download(
                response,
                dir,
                filename,
                command.file_extension(),
                started,
                progress,
                cancel,
            )
            .await?;

        Ok(ServiceResult::Success(outcome))
    }
}
