use axum::http::StatusCode;
use smartcity_api::models::RuleKind;

#[derive(Debug, thiserror::Error)]
pub enum RuleError {
    #[error("Rule {0:?} has no numeric threshold")]
    ThresholdNotApplicable(RuleKind),

    #[error("Rule {0:?} has no air quality level")]
    LevelNotApplicable(RuleKind),

    #[error("Threshold must be a finite number")]
    InvalidThreshold,
}

impl RuleError {
    pub fn status_code(&self) -> StatusCode {
        StatusCode::BAD_REQUEST
    }
}
