use chrono::NaiveDate;
use thiserror::Error;

use crate::flow::FlowError;
use crate::flow::validation::ValidationError;
use crate::model::{BookingId, VenueId};
use crate::remote::RemoteError;
use crate::state::StateError;

#[derive(Error, Debug)]
pub enum AppError {
    #[error(transparent)]
    Remote(#[from] RemoteError),

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Flow(#[from] FlowError),

    #[error(transparent)]
    State(#[from] StateError),

    #[error("{date} is not available: {reason}")]
    DateUnavailable { date: NaiveDate, reason: String },

    #[error("venue not loaded: {0}")]
    VenueNotLoaded(VenueId),

    #[error("booking not found: {0}")]
    BookingNotFound(BookingId),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("local storage failed: {0:#}")]
    Storage(#[from] anyhow::Error),
}

impl AppError {
    /// Message suitable for showing to the end user.
    pub fn user_message(&self) -> String {
        match self {
            AppError::Remote(e) => e.user_message(),
            AppError::Flow(e) => e.user_message(),
            AppError::State(e) => e.user_message(),
            AppError::Validation(e) => e.to_string(),
            AppError::DateUnavailable { reason, .. } => reason.clone(),
            AppError::VenueNotLoaded(_) => "Venue not found. Please pick a venue again.".to_string(),
            AppError::BookingNotFound(_) => "Booking not found.".to_string(),
            AppError::Storage(_) => "Local storage is unavailable.".to_string(),
            other => other.to_string(),
        }
    }
}
