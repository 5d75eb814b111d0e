//! Tasking operations: models, orders and orderable tiles.

use reqwest::Method;
use tracing::info;

use crate::api::client::ClearSkyClient;
use crate::api::envelope::{read_body, ServiceResult};
use crate::api::models::{
    TaskOrder, TaskingModelsData, TaskingOrderEstimateData, TaskingOrderRequest,
    TaskingOrdersData, TaskingTileSearchData, TaskingTileSearchQuery,
};
use crate::api::{
    TASKING_MODELS_PATH, TASKING_ORDERS_PATH, TASKING_ORDER_CANCEL_PATH,
    TASKING_ORDER_CREATE_PATH, TASKING_ORDER_ESTIMATE_PATH, TASKING_TILE_SEARCH_PATH,
};
use crate::error::ClientError;
use crate::validation::GeometryRequest;

impl ClearSkyClient {
    /// Lists the models available for tasking and their constellations.
    pub async fn get_tasking_models(&self) -> Result<ServiceResult<TaskingModelsData>, ClientError> {
        self.call_envelope(Method::POST, TASKING_MODELS_PATH, &[], None)
            .await
    }

    /// Lists the key's tasking orders, optionally only the recurring ones.
    pub async fn get_tasking_orders(
        &self,
        recurring_only: bool,
    ) -> Result<ServiceResult<TaskingOrdersData>, ClientError> {
        self.call_envelope(
            Method::POST,
            TASKING_ORDERS_PATH,
            &[("recurringOnly", recurring_only.to_string())],
            None,
        )
        .await
    }

    /// Prices a tasking order without placing it.
    pub async fn estimate_tasking_order(
        &self,
        request: &TaskingOrderRequest,
    ) -> Result<ServiceResult<TaskingOrderEstimateData>, ClientError> {
        request.validate_geometry()?;
        self.call_json_envelope(Method::POST, TASKING_ORDER_ESTIMATE_PATH, &[], request)
            .await
    }

    /// Places a tasking order.
    pub async fn create_tasking_order(
        &self,
        request: &TaskingOrderRequest,
    ) -> Result<ServiceResult<TaskOrder>, ClientError> {
        request.validate_geometry()?;
        let result: ServiceResult<TaskOrder> = self
            .call_json_envelope(Method::POST, TASKING_ORDER_CREATE_PATH, &[], request)
            .await?;
        if let ServiceResult::Success(order) = &result {
            info!(
                "[API] Tasking order created ({})",
                order.ordering_process_status
            );
        }
        Ok(result)
    }

    /// Cancels a recurring tasking order.
    ///
    /// Any 2xx is a success, whether or not the body is an envelope; an
    /// envelope explicitly reporting failure is still a failure.
    pub async fn cancel_recurring_order(
        &self,
        task_order_guid: &str,
    ) -> Result<ServiceResult<()>, ClientError> {
        let response = self
            .call(
                Method::DELETE,
                TASKING_ORDER_CANCEL_PATH,
                &[("taskOrderGuid", task_order_guid.to_string())],
                None,
            )
            .await?;

        let (status, body) = read_body(response).await?;
        let decoded = ServiceResult::<serde_json::Value>::from_parts(status, &body);

        if status.is_success() {
            return Ok(match decoded {
                Ok(ServiceResult::Failure(failure)) => ServiceResult::Failure(failure),
                _ => ServiceResult::Success(()),
            });
        }

        match decoded? {
            ServiceResult::Failure(failure) => Ok(ServiceResult::Failure(failure)),
            ServiceResult::Success(_) => Err(ClientError::InvalidResponse(format!(
                "Succeeded envelope with HTTP {}",
                status.as_u16()
            ))),
        }
    }

    /// Finds orderable tiles by geometry or by tile ids.
    pub async fn search_orderable_tiles(
        &self,
        query: &TaskingTileSearchQuery,
    ) -> Result<ServiceResult<TaskingTileSearchData>, ClientError> {
        query.validate_geometry()?;
        self.call_json_envelope(Method::POST, TASKING_TILE_SEARCH_PATH, &[], query)
            .await
    }
}
