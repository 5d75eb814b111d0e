//! ClearSky Vision API surface.
//!
//! - `client`: authenticated transport and safe request logging
//! - `envelope`: `{Succeeded, Error, Data}` decoding
//! - `models`: request and response records
//! - `account`, `imagery`, `tasking`: one method per remote operation
//! - `batch`: concurrent variants of the imagery operations

pub mod account;
pub mod batch;
pub mod client;
pub mod envelope;
pub mod imagery;
pub mod models;
pub mod tasking;

pub use client::{sanitize_url_for_logs, ApiKey, ClearSkyClient, LoggingMode, API_KEY_HEADER};
pub use envelope::{ServiceFailure, ServiceResult};
pub use models::*;

// ─────────────────────────────────────────────────────────────────────────────
// Endpoints
// ─────────────────────────────────────────────────────────────────────────────

pub(crate) const API_KEY_INFO_PATH: &str = "/api/apikey/info";
pub(crate) const SEARCH_AVAILABLE_PATH: &str = "/api/satelliteimages/search/available";
pub(crate) const COMPOSITE_ESTIMATE_PATH: &str = "/api/satelliteimages/process/composite/estimate";
pub(crate) const COMPOSITE_PATH: &str = "/api/satelliteimages/process/composite";
pub(crate) const TASKING_MODELS_PATH: &str = "/api/tasking/models";
pub(crate) const TASKING_ORDERS_PATH: &str = "/api/tasking/orders";
pub(crate) const TASKING_ORDER_ESTIMATE_PATH: &str = "/api/tasking/orders/estimate";
pub(crate) const TASKING_ORDER_CREATE_PATH: &str = "/api/tasking/orders/create";
pub(crate) const TASKING_ORDER_CANCEL_PATH: &str = "/api/tasking/orders/cancel";
pub(crate) const TASKING_TILE_SEARCH_PATH: &str = "/api/tasking/search/tiles";
