use axum::http::StatusCode;

#[derive(Debug, thiserror::Error)]
pub enum WeatherError {
    #[error("Weather lookup is not configured")]
    NotConfigured,

    #[error("No city given and no default city configured")]
    MissingCity,

    #[error("City `{0}` not found")]
    CityNotFound(String),

    #[error("Weather service unreachable: {0}")]
    Request(#[from] reqwest::Error),

    #[error("Weather service answered {0}")]
    UpstreamStatus(u16),
}

impl WeatherError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            WeatherError::NotConfigured => StatusCode::NOT_FOUND,
            WeatherError::MissingCity => StatusCode::BAD_REQUEST,
            WeatherError::CityNotFound(_) => StatusCode::NOT_FOUND,
            WeatherError::Request(_) => StatusCode::BAD_GATEWAY,
            WeatherError::UpstreamStatus(_) => StatusCode::BAD_GATEWAY,
        }
    }
}
