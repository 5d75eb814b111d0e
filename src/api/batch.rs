//! Concurrent variants of the imagery operations.
//!
//! Each batch runs through a [`JobDispatcher`]; results come back in input
//! order. A refusal by the service lands in the job's slot as
//! `ClientError::Service`, next to transport and transfer failures.

use std::path::Path;

use crate::api::client::ClearSkyClient;
use crate::api::models::{CompositeCommand, CompositeEstimateData, CompositeEstimateQuery};
use crate::dispatch::{BatchResults, JobDispatcher};
use crate::error::ClientError;
use crate::streaming::{DownloadOutcome, NoopProgress};

impl ClearSkyClient {
    /// Estimates every query, at most `dispatcher.limit()` at a time.
    ///
    /// # Errors
    ///
    /// Only `ClientError::Unauthorized`; every other failure is per job.
    pub async fn estimate_composites(
        &self,
        queries: Vec<CompositeEstimateQuery>,
        dispatcher: &JobDispatcher,
    ) -> Result<BatchResults<CompositeEstimateQuery, CompositeEstimateData>, ClientError> {
        dispatcher
            .run(queries, |query| {
                let client = self.clone();
                let query = query.clone();
                async move { client.estimate_composite(&query).await?.into_result() }
            })
            .await
    }

    /// Retrieves every composite into `dir`, at most `dispatcher.limit()` at a time.
    ///
    /// Files are named by the server or synthesized; when several responses
    /// suggest the same name, later ones get a numeric suffix (`area_1.tif`),
    /// so every outcome points at its own bytes. There is no per-file
    /// progress bar. Cancelling the dispatcher's token also stops transfers
    /// already under way, leaving no partial files.
    pub async fn retrieve_composites(
        &self,
        dir: impl AsRef<Path>,
        commands: Vec<CompositeCommand>,
        dispatcher: &JobDispatcher,
    ) -> Result<BatchResults<CompositeCommand, DownloadOutcome>, ClientError> {
        let dir = dir.as_ref().to_path_buf();
        let cancel = dispatcher.cancellation_token();

        dispatcher
            .run(commands, |command| {
                let client = self.clone();
                let command = command.clone();
                let dir = dir.clone();
                let cancel = cancel.clone();
                async move {
                    client
                        .retrieve_composite_with(&command, &dir, None, &NoopProgress, &cancel)
                        .await?
                        .into_result()
                }
            })
            .await
    }
}
