use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::error;

use crate::error::{InsightError, InsightResult};
use crate::models::insights::GraphErrorDetail;
use crate::services::fetcher::FetchResponse;

const UNKNOWN_API_ERROR: &str = "unknown Graph API error";
const MAX_BODY_IN_ERROR: usize = 500;

/// Decodes a response body and turns an upstream error payload into
/// `InsightError::Api`. Anything else non-2xx becomes `InsightError::Status`.
pub fn classify(response: FetchResponse) -> InsightResult<Value> {
    let body: Value = serde_json::from_str(&response.body).map_err(|e| {
        if response.is_success() {
            InsightError::Decode(format!("{} (status {})", e, response.status))
        } else {
            InsightError::Status {
                status: response.status,
                body: truncate(&response.body),
            }
        }
    })?;

    if let Some(descriptor) = body.get("error") {
        let err = api_error(descriptor);
        error!("Graph API error (status {}): {}", response.status, err);
        return Err(err);
    }

    if !response.is_success() {
        return Err(InsightError::Status {
            status: response.status,
            body: truncate(&response.body),
        });
    }

    Ok(body)
}

pub fn classify_as<T: DeserializeOwned>(response: FetchResponse) -> InsightResult<T> {
    let body = classify(response)?;
    serde_json::from_value(body).map_err(|e| InsightError::Decode(e.to_string()))
}

fn api_error(descriptor: &Value) -> InsightError {
    match serde_json::from_value::<GraphErrorDetail>(descriptor.clone()) {
        Ok(detail) => InsightError::Api {
            message: detail
                .message
                .filter(|m| !m.is_empty())
                .unwrap_or_else(|| UNKNOWN_API_ERROR.to_string()),
            code: detail.code,
            kind: detail.kind,
        },
        // Some endpoints answer with a bare string instead of a descriptor.
        Err(_) => InsightError::Api {
            message: descriptor
                .as_str()
                .map(str::to_string)
                .unwrap_or_else(|| descriptor.to_string()),
            code: None,
            kind: None,
        },
    }
}

fn truncate(body: &str) -> String {
    body.chars().take(MAX_BODY_IN_ERROR).collect()
}
