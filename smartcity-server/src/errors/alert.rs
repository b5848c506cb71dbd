use axum::http::StatusCode;

#[derive(Debug, thiserror::Error)]
pub enum AlertError {
    #[error("No active alert for this device")]
    AlertNotFound,
}

impl AlertError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            AlertError::AlertNotFound => StatusCode::NOT_FOUND,
        }
    }
}
