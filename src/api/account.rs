//! Account operations.

use reqwest::Method;
use tracing::info;

use crate::api::client::ClearSkyClient;
use crate::api::envelope::ServiceResult;
use crate::api::models::ApiKeyData;
use crate::api::API_KEY_INFO_PATH;
use crate::dispatch::JobDispatcher;
use crate::error::ClientError;

impl ClearSkyClient {
    /// Fetches credits, limits and contact details for the calling key.
    pub async fn get_api_key_info(&self) -> Result<ServiceResult<ApiKeyData>, ClientError> {
        self.call_envelope(Method::GET, API_KEY_INFO_PATH, &[], None)
            .await
    }

    /// Builds a dispatcher sized by the key's `MaxConcurrentConnections`.
    ///
    /// # Errors
    ///
    /// Transport errors, or `ClientError::Service` if the key info lookup
    /// was refused.
    pub async fn dispatcher_for_key(&self) -> Result<JobDispatcher, ClientError> {
        let info = self.get_api_key_info().await?.into_result()?;
        let dispatcher = JobDispatcher::from_key_info(&info);
        info!(
            "[API] Key allows {} concurrent connections",
            dispatcher.limit()
        );
        Ok(dispatcher)
    }
}
