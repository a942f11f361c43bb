use std::sync::Arc;

use chrono::NaiveDate;
use tracing::{debug, instrument, warn};

use crate::calendar::Calendar;
use crate::model::VenueId;
use crate::remote::{AvailabilityVerdict, BookingService, RemoteError};

/// Reason reported when availability could not be determined.
pub const AVAILABILITY_ERROR_REASON: &str = "Error checking availability";

/// Answers "can this venue be booked on this day?".
///
/// Uncached: every call reaches the remote service.
#[derive(Clone)]
pub struct AvailabilityChecker {
    service: Arc<dyn BookingService>,
    calendar: Calendar,
}

impl AvailabilityChecker {
    pub fn new(service: Arc<dyn BookingService>, calendar: Calendar) -> Self {
        Self { service, calendar }
    }

    pub fn calendar(&self) -> Calendar {
        self.calendar
    }

    /// Fail-closed check: any failure reads as "not available".
    #[instrument(skip(self), target = "availability", fields(venue_id = %venue_id, date = %date))]
    pub async fn check(&self, venue_id: &VenueId, date: NaiveDate) -> AvailabilityVerdict {
        match self.check_strict(venue_id, date).await {
            Ok(verdict) => verdict,
            Err(e) => {
                warn!(error = %e, "availability unknown; treating date as unavailable");
                AvailabilityVerdict::unavailable(AVAILABILITY_ERROR_REASON)
            }
        }
    }

    /// Check that surfaces remote failures, for callers that offer a retry.
    #[instrument(skip(self), target = "availability", fields(venue_id = %venue_id, date = %date))]
    pub async fn check_strict(
        &self,
        venue_id: &VenueId,
        date: NaiveDate,
    ) -> Result<AvailabilityVerdict, RemoteError> {
        let window = self.calendar.day_window(date);
        let verdict = self.service.check_availability(venue_id, &window).await?;

        debug!(
            available = verdict.available,
            start = %window.start_param(),
            end = %window.end_param(),
            "availability resolved"
        );
        Ok(verdict)
    }
}
