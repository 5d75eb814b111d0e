//! Service result envelope decoding.
//!
//! Every endpoint wraps its payload in `{Succeeded, Error, Data}`. This module
//! turns that wire shape into [`ServiceResult`], enforcing:
//!
//! - `Succeeded = true` requires `Data` and forbids `Error`
//! - `Succeeded = false` requires `Error`
//!
//! Anything else is reported as `ClientError::InvalidResponse`. Business
//! failures are values, never raised: the caller branches on them.

use std::collections::BTreeMap;

use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{sanitize_message, ClientError};

/// Replacement text when server-supplied text looks like it carries credentials.
const REDACTED_MESSAGE: &str = "Service error (details redacted)";

// ─────────────────────────────────────────────────────────────────────────────
// Internal Wire Types (match the API JSON exactly)
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct WireServiceResult {
    succeeded: bool,
    #[serde(default)]
    error: Option<WireServiceError>,
    #[serde(default)]
    data: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct WireServiceError {
    #[serde(default)]
    message: String,
    #[serde(default)]
    code: i64,
}

// ─────────────────────────────────────────────────────────────────────────────
// Public Types
// ─────────────────────────────────────────────────────────────────────────────

/// A business failure reported by the service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceFailure {
    /// Server-supplied error code, or the HTTP status for non-envelope bodies.
    pub code: i64,
    pub message: String,
    /// Field name to issue messages, e.g. `{"Wkt": ["Polygon is not closed"]}`.
    pub issues: BTreeMap<String, Vec<String>>,
}

impl ServiceFailure {
    /// The message followed by every field issue.
    pub fn summary(&self) -> String {
        let issues: Vec<&str> = self
            .issues
            .values()
            .flatten()
            .map(String::as_str)
            .collect();

        if issues.is_empty() {
            self.message.clone()
        } else {
            format!("{} {}", self.message, issues.join(", "))
        }
    }

    /// Converts the failure into `ClientError::Service`.
    pub fn into_error(self) -> ClientError {
        let message = self.summary();
        ClientError::Service {
            code: self.code,
            message,
            issues: self.issues,
        }
    }
}

/// Outcome of one enveloped call.
#[derive(Debug, Clone, PartialEq)]
pub enum ServiceResult<T> {
    Success(T),
    Failure(ServiceFailure),
}

impl<T> ServiceResult<T> {
    pub fn is_success(&self) -> bool {
        matches!(self, ServiceResult::Success(_))
    }

    pub fn success(&self) -> Option<&T> {
        match self {
            ServiceResult::Success(value) => Some(value),
            ServiceResult::Failure(_) => None,
        }
    }

    pub fn failure(&self) -> Option<&ServiceFailure> {
        match self {
            ServiceResult::Success(_) => None,
            ServiceResult::Failure(failure) => Some(failure),
        }
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> ServiceResult<U> {
        match self {
            ServiceResult::Success(value) => ServiceResult::Success(f(value)),
            ServiceResult::Failure(failure) => ServiceResult::Failure(failure),
        }
    }

    /// Folds a business failure into `ClientError::Service`.
    pub fn into_result(self) -> Result<T, ClientError> {
        match self {
            ServiceResult::Success(value) => Ok(value),
            ServiceResult::Failure(failure) => Err(failure.into_error()),
        }
    }
}

impl<T: DeserializeOwned> ServiceResult<T> {
    /// Reads and decodes a response body.
    ///
    /// 401 never reaches this point; the transport client maps it to
    /// `ClientError::Unauthorized` first.
    pub async fn from_response(response: reqwest::Response) -> Result<Self, ClientError> {
        let (status, body) = read_body(response).await?;
        Self::from_parts(status, &body)
    }

    /// Decodes a status and body.
    ///
    /// # Errors
    ///
    /// `ClientError::InvalidResponse` when a 2xx body is not a valid envelope,
    /// or when any envelope violates the success/error invariants.
    pub fn from_parts(status: StatusCode, body: &str) -> Result<Self, ClientError> {
        if status.is_success() {
            return Self::decode(body);
        }

        // Error statuses usually still carry an envelope.
        if serde_json::from_str::<WireServiceResult>(body).is_ok() {
            return Self::decode(body);
        }

        debug!("[API] Non-envelope error body for status {}", status.as_u16());
        Ok(ServiceResult::Failure(failure_from_status(status, body)))
    }

    /// Decodes an envelope body and enforces its invariants.
    pub fn decode(body: &str) -> Result<Self, ClientError> {
        let wire: WireServiceResult = serde_json::from_str(body)
            .map_err(|e| ClientError::InvalidResponse(format!("Malformed envelope: {}", e)))?;

        match (wire.succeeded, wire.error, wire.data) {
            (true, None, Some(data)) => {
                let value = serde_json::from_value(data).map_err(|e| {
                    ClientError::InvalidResponse(format!("Failed to decode Data: {}", e))
                })?;
                Ok(ServiceResult::Success(value))
            }
            (true, Some(_), _) => Err(ClientError::InvalidResponse(
                "Succeeded envelope carries an Error".into(),
            )),
            (true, None, None) => Err(ClientError::InvalidResponse(
                "Succeeded envelope is missing Data".into(),
            )),
            (false, Some(error), data) => Ok(ServiceResult::Failure(ServiceFailure {
                code: error.code,
                message: sanitize_message(&error.message, REDACTED_MESSAGE),
                issues: data.map(issues_from_data).unwrap_or_default(),
            })),
            (false, None, _) => Err(ClientError::InvalidResponse(
                "Failed envelope is missing Error".into(),
            )),
        }
    }
}

/// Extracts `{field: [issue, ...]}` from a failure's `Data`.
///
/// Anything that is not an object of string lists is ignored.
fn issues_from_data(data: serde_json::Value) -> BTreeMap<String, Vec<String>> {
    let serde_json::Value::Object(map) = data else {
        return BTreeMap::new();
    };

    map.into_iter()
        .filter_map(|(field, value)| match value {
            serde_json::Value::Array(items) => {
                let messages: Vec<String> = items
                    .into_iter()
                    .filter_map(|item| match item {
                        serde_json::Value::String(s) => Some(sanitize_message(&s, REDACTED_MESSAGE)),
                        _ => None,
                    })
                    .collect();
                Some((field, messages))
            }
            serde_json::Value::String(s) => Some((field, vec![sanitize_message(&s, REDACTED_MESSAGE)])),
            _ => None,
        })
        .collect()
}

/// Builds a failure from a status and a non-envelope body.
fn failure_from_status(status: StatusCode, body: &str) -> ServiceFailure {
    let first_line = body.lines().map(str::trim).find(|line| !line.is_empty());

    let message = match first_line {
        Some(line) => sanitize_message(line, REDACTED_MESSAGE),
        None => status
            .canonical_reason()
            .unwrap_or("Unknown error")
            .to_string(),
    };

    ServiceFailure {
        code: i64::from(status.as_u16()),
        message,
        issues: BTreeMap::new(),
    }
}

/// Reads a whole response body as text.
pub(crate) async fn read_body(response: reqwest::Response) -> Result<(StatusCode, String), ClientError> {
    let status = response.status();
    let body = response.text().await.map_err(|e| {
        ClientError::ConnectionFailed(format!("Failed to read response body: {}", kind_of(&e)))
    })?;
    Ok((status, body))
}

fn kind_of(e: &reqwest::Error) -> &'static str {
    if e.is_timeout() {
        "timed out"
    } else if e.is_decode() {
        "decode error"
    } else {
        "connection interrupted"
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[derive(Debug, PartialEq, Deserialize)]
    #[serde(rename_all = "PascalCase")]
    struct Estimate {
        credit_estimate: f64,
    }

    fn decode(value: serde_json::Value) -> Result<ServiceResult<Estimate>, ClientError> {
        ServiceResult::decode(&value.to_string())
    }

    #[test]
    fn success_envelope_decodes_data() {
        let result = decode(json!({
            "Succeeded": true,
            "Error": null,
            "Data": { "CreditEstimate": 12.5 }
        }))
        .unwrap();

        assert_eq!(
            result,
            ServiceResult::Success(Estimate {
                credit_estimate: 12.5
            })
        );
    }

    #[test]
    fn failure_envelope_carries_code_message_and_issues() {
        let result = decode(json!({
            "Succeeded": false,
            "Error": { "Message": "Validation failed.", "Code": 400 },
            "Data": { "Wkt": ["Polygon is not closed"], "Date": ["Date is in the future"] }
        }))
        .unwrap();

        let failure = result.failure().expect("should be a failure");
        assert_eq!(failure.code, 400);
        assert_eq!(failure.message, "Validation failed.");
        assert_eq!(failure.issues.len(), 2);
        assert_eq!(
            failure.summary(),
            "Validation failed. Date is in the future, Polygon is not closed"
        );
    }

    #[test]
    fn succeeded_without_data_is_invalid() {
        let result = decode(json!({ "Succeeded": true, "Error": null, "Data": null }));
        assert!(matches!(result, Err(ClientError::InvalidResponse(msg)) if msg.contains("Data")));
    }

    #[test]
    fn succeeded_with_error_is_invalid() {
        let result = decode(json!({
            "Succeeded": true,
            "Error": { "Message": "x", "Code": 1 },
            "Data": { "CreditEstimate": 1.0 }
        }));
        assert!(matches!(result, Err(ClientError::InvalidResponse(_))));
    }

    #[test]
    fn failed_without_error_is_invalid() {
        let result = decode(json!({ "Succeeded": false, "Error": null, "Data": null }));
        assert!(matches!(result, Err(ClientError::InvalidResponse(msg)) if msg.contains("Error")));
    }

    #[test]
    fn data_with_wrong_shape_is_invalid() {
        let result = decode(json!({ "Succeeded": true, "Data": { "CreditEstimate": "lots" } }));
        assert!(matches!(result, Err(ClientError::InvalidResponse(msg)) if msg.contains("Data")));
    }

    #[test]
    fn non_envelope_error_body_uses_status_and_first_line() {
        let result: ServiceResult<Estimate> = ServiceResult::from_parts(
            StatusCode::BAD_GATEWAY,
            "\nupstream unavailable\n<html>...</html>",
        )
        .unwrap();

        let failure = result.failure().unwrap();
        assert_eq!(failure.code, 502);
        assert_eq!(failure.message, "upstream unavailable");
        assert!(failure.issues.is_empty());
    }

    #[test]
    fn empty_error_body_uses_canonical_reason() {
        let result: ServiceResult<Estimate> =
            ServiceResult::from_parts(StatusCode::SERVICE_UNAVAILABLE, "").unwrap();

        assert_eq!(result.failure().unwrap().message, "Service Unavailable");
    }

    #[test]
    fn enveloped_error_status_is_decoded() {
        let body = json!({
            "Succeeded": false,
            "Error": { "Message": "Insufficient credits", "Code": 402 }
        })
        .to_string();

        let result: ServiceResult<Estimate> =
            ServiceResult::from_parts(StatusCode::PAYMENT_REQUIRED, &body).unwrap();

        assert_eq!(result.failure().unwrap().code, 402);
    }

    #[test]
    fn malformed_success_body_is_invalid() {
        let result: Result<ServiceResult<Estimate>, _> =
            ServiceResult::from_parts(StatusCode::OK, "not json");
        assert!(matches!(result, Err(ClientError::InvalidResponse(_))));
    }

    #[test]
    fn credential_text_is_redacted_from_failures() {
        let result = decode(json!({
            "Succeeded": false,
            "Error": { "Message": "bad x-api-key: abc123", "Code": 403 }
        }))
        .unwrap();

        let failure = result.failure().unwrap();
        assert!(!failure.message.contains("abc123"));
        assert_eq!(failure.message, REDACTED_MESSAGE);
    }

    #[test]
    fn into_result_maps_failure_to_service_error() {
        let failure = ServiceFailure {
            code: 400,
            message: "Invalid request.".into(),
            issues: BTreeMap::from([("Wkt".to_string(), vec!["Too large".to_string()])]),
        };

        let err = ServiceResult::<Estimate>::Failure(failure)
            .into_result()
            .unwrap_err();

        match err {
            ClientError::Service {
                code,
                message,
                issues,
            } => {
                assert_eq!(code, 400);
                assert_eq!(message, "Invalid request. Too large");
                assert_eq!(issues["Wkt"], vec!["Too large".to_string()]);
            }
            other => panic!("Expected Service error, got: {:?}", other),
        }
    }

    #[test]
    fn map_preserves_failure() {
        let result: ServiceResult<u32> = ServiceResult::Failure(ServiceFailure {
            code: 1,
            message: "nope".into(),
            issues: BTreeMap::new(),
        });
        let mapped = result.map(|n| n * 2);
        assert!(!mapped.is_success());
    }
}
