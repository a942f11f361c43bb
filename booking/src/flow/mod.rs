pub mod controller;
pub mod pricing;
pub mod validation;

use chrono::NaiveDate;
use thiserror::Error;

use crate::remote::RemoteError;
use validation::ValidationError;

pub use controller::{BookingFlow, BookingForm, DateStatus, Stage};
pub use pricing::{PriceBreakdown, compute_total, format_amount};

pub const DATE_UNAVAILABLE_MESSAGE: &str = "This date is not available. Please select another date.";
pub const DATE_NO_LONGER_AVAILABLE_MESSAGE: &str =
    "This date is no longer available. Please select another date.";
pub const SUBMIT_FAILED_MESSAGE: &str = "Failed to create booking. Please try again.";

#[derive(Error, Debug)]
pub enum FlowError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("availability check for the selected date is still in progress")]
    AvailabilityPending,

    #[error("availability could not be verified: {0}")]
    AvailabilityUnverified(#[source] RemoteError),

    #[error("{date} is not available: {reason}")]
    DateUnavailable { date: NaiveDate, reason: String },

    #[error("cannot {action} from stage {stage}")]
    InvalidTransition { stage: Stage, action: &'static str },

    #[error("booking submission failed: {0}")]
    Remote(#[from] RemoteError),
}

impl FlowError {
    pub fn user_message(&self) -> String {
        match self {
            FlowError::Validation(e) => e.to_string(),
            FlowError::AvailabilityPending => {
                "Please wait while we check availability for this date.".to_string()
            }
            FlowError::AvailabilityUnverified(_) => {
                "Error checking availability. Please try again.".to_string()
            }
            FlowError::DateUnavailable { reason, .. } => reason.clone(),
            FlowError::InvalidTransition { .. } => self.to_string(),
            FlowError::Remote(e) => match e {
                RemoteError::Http(_) | RemoteError::Unauthorized => e.user_message(),
                RemoteError::Api { message, .. }
                | RemoteError::Conflict(message)
                | RemoteError::NotFound(message)
                | RemoteError::Rejected(message)
                    if !message.is_empty() =>
                {
                    message.clone()
                }
                _ => SUBMIT_FAILED_MESSAGE.to_string(),
            },
        }
    }
}
