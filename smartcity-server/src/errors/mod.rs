pub mod alert;
pub mod api;
pub mod device;
pub mod rule;
pub mod weather;

pub use alert::AlertError;
pub use api::ApiError;
pub use device::DeviceError;
pub use rule::RuleError;
pub use weather::WeatherError;

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use uuid::Uuid;

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_message, error_id) = match self {
            ApiError::AlertError(e) => (e.status_code(), e.to_string(), None),
            ApiError::DeviceError(e) => (e.status_code(), e.to_string(), None),
            ApiError::RuleError(e) => (e.status_code(), e.to_string(), None),
            ApiError::WeatherError(e) => {
                if e.status_code().is_server_error() {
                    tracing::warn!("Weather lookup failed: {}", e);
                }
                (e.status_code(), e.to_string(), None)
            }
            ApiError::InternalError(e) => {
                let error_id = Uuid::new_v4();
                tracing::error!(error_id = ?error_id, "Internal error: {}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".to_string(),
                    Some(error_id.to_string()),
                )
            }
        };

        let mut error_obj = json!({
            "code": status.as_u16(),
            "message": error_message
        });

        if let Some(error_id) = error_id {
            error_obj["error_id"] = json!(error_id);
        }

        (status, Json(json!({ "error": error_obj }))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_error_body_shape() {
        let response = ApiError::from(DeviceError::DeviceExists).into_response();
        assert_eq!(response.status(), StatusCode::CONFLICT);

        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let body: serde_json::Value = serde_json::from_slice(&body).unwrap();

        assert_eq!(body["error"]["code"], json!(409));
        assert!(body["error"].get("error_id").is_none());
    }

    #[tokio::test]
    async fn test_internal_error_carries_id() {
        let response = ApiError::from(anyhow::anyhow!("dashboard stopped")).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let body: serde_json::Value = serde_json::from_slice(&body).unwrap();

        assert_eq!(body["error"]["message"], json!("Internal server error"));
        assert!(body["error"]["error_id"].is_string());
    }
}
