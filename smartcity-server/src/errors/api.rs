use super::{AlertError, DeviceError, RuleError, WeatherError};

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("Alert error: {0}")]
    AlertError(#[from] AlertError),

    #[error("Device error: {0}")]
    DeviceError(#[from] DeviceError),

    #[error("Rule error: {0}")]
    RuleError(#[from] RuleError),

    #[error("Weather error: {0}")]
    WeatherError(#[from] WeatherError),

    #[error("Internal error: {0}")]
    InternalError(#[from] anyhow::Error),
}
