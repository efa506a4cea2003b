use thiserror::Error;

use shared_api::ApiError;
use shared_models::error::AppError;

use crate::models::RuleError;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum AvailabilityError {
    #[error(transparent)]
    Api(#[from] ApiError),

    #[error("Invalid availability rule: {0}")]
    InvalidRule(#[from] RuleError),

    #[error("Select at least one day of the week")]
    EmptyWeekdaySelection,

    #[error("No practitioner profile found for the current user")]
    NoPractitionerProfile,
}

impl AvailabilityError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, AvailabilityError::Api(err) if err.is_not_found())
    }

    /// Short text suitable for showing to the user.
    pub fn user_message(&self) -> String {
        match self {
            AvailabilityError::Api(ApiError::Network(_)) => {
                "Could not reach the scheduling service. Please try again.".to_string()
            }
            AvailabilityError::Api(ApiError::Auth(_)) => "Your session has expired. Please sign in again.".to_string(),
            AvailabilityError::Api(ApiError::NotFound(_)) => "The requested availability was not found.".to_string(),
            AvailabilityError::Api(ApiError::Validation { message, .. }) => message.clone(),
            AvailabilityError::Api(_) => "The scheduling service returned an error.".to_string(),
            other => other.to_string(),
        }
    }
}

impl From<AvailabilityError> for AppError {
    fn from(err: AvailabilityError) -> Self {
        match err {
            AvailabilityError::Api(ApiError::Auth(msg)) => AppError::Auth(msg),
            AvailabilityError::Api(ApiError::NotFound(msg)) => AppError::NotFound(msg),
            AvailabilityError::Api(ApiError::Validation { message, .. }) => AppError::ValidationError(message),
            AvailabilityError::Api(other) => AppError::ExternalService(other.to_string()),
            AvailabilityError::InvalidRule(rule) => AppError::ValidationError(rule.to_string()),
            AvailabilityError::EmptyWeekdaySelection => {
                AppError::ValidationError(AvailabilityError::EmptyWeekdaySelection.to_string())
            }
            AvailabilityError::NoPractitionerProfile => {
                AppError::NotFound(AvailabilityError::NoPractitionerProfile.to_string())
            }
        }
    }
}
