use axum::http::StatusCode;

#[derive(Debug, thiserror::Error)]
pub enum DeviceError {
    #[error("Device not found")]
    DeviceNotFound,

    #[error("A device with this name already exists in the zone")]
    DeviceExists,

    #[error("Device is not an actuator")]
    NotAnActuator,

    #[error("Invalid request parameters")]
    InvalidRequest,

    #[error("System is offline")]
    SystemOffline,
}

impl DeviceError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            DeviceError::DeviceNotFound => StatusCode::NOT_FOUND,
            DeviceError::DeviceExists => StatusCode::CONFLICT,
            DeviceError::NotAnActuator => StatusCode::BAD_REQUEST,
            DeviceError::InvalidRequest => StatusCode::BAD_REQUEST,
            DeviceError::SystemOffline => StatusCode::SERVICE_UNAVAILABLE,
        }
    }
}
