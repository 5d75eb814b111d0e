//! Client for the ClearSky Vision satellite imagery API.
//!
//! ```no_run
//! use clearsky_client::{ApiKey, ClearSkyClient, ClientConfig, CompositeEstimateQuery};
//!
//! # async fn demo() -> Result<(), clearsky_client::ClientError> {
//! let client = ClearSkyClient::new(ApiKey::new("my-key"), ClientConfig::default())?;
//! let query = CompositeEstimateQuery::from_wkt("POLYGON((10 55,10.1 55,10.1 55.1,10 55.1,10 55))", 4326);
//! let estimate = client.estimate_composite(&query).await?.into_result()?;
//! println!("{} credits", estimate.credit_estimate);
//! # Ok(())
//! # }
//! ```

pub mod api;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod logging;
pub mod streaming;
pub mod validation;

pub use api::{
    sanitize_url_for_logs, ApiKey, ClearSkyClient, LoggingMode, ServiceFailure, ServiceResult,
};
pub use api::models::*;
pub use config::{ClientConfig, DownloadConfig, EstimateRepollConfig};
pub use dispatch::{BatchResults, FailurePolicy, JobDispatcher, JobOutcome, JobScheduler};
pub use error::ClientError;
pub use streaming::{DownloadOutcome, ProgressSink, StreamingDownloader, TransferError};
pub use validation::{GeometryField, GeometryRequest, ValidationError};
