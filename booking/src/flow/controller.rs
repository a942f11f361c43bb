use std::fmt;

use chrono::{NaiveDate, Utc};
use tracing::{debug, info, instrument, warn};

use super::pricing::{PriceBreakdown, compute_total};
use super::validation::{ValidationError, require, validate_guest_count};
use super::{DATE_NO_LONGER_AVAILABLE_MESSAGE, DATE_UNAVAILABLE_MESSAGE, FlowError};
use crate::availability::{AvailabilityChecker, AvailabilityFence, AvailabilityVerdict, CheckTicket};
use crate::model::{Addons, AuthUser, Booking, BookingStatus, EventType, PaymentMethod, Venue};
use crate::remote::{BookingService, GUEST_USER_ID, NewBooking};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    EventDetails,
    Addons,
    Payment,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Stage::EventDetails => "EventDetails",
            Stage::Addons => "Addons",
            Stage::Payment => "Payment",
        };
        f.write_str(s)
    }
}

/// Where the selected date stands with respect to availability.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum DateStatus {
    #[default]
    Unselected,
    Checking(NaiveDate),
    Available(NaiveDate),
    Unavailable { date: NaiveDate, reason: String },
}

/// User-entered booking details.
#[derive(Debug, Clone)]
pub struct BookingForm {
    pub guest_count: u32,
    pub event_type: Option<EventType>,
    pub special_requests: String,
    pub contact_name: String,
    pub contact_phone: String,
    pub addons: Addons,
    pub payment_method: PaymentMethod,
}

impl Default for BookingForm {
    fn default() -> Self {
        Self {
            guest_count: 1,
            event_type: None,
            special_requests: String::new(),
            contact_name: String::new(),
            contact_phone: String::new(),
            addons: Addons::NONE,
            payment_method: PaymentMethod::default(),
        }
    }
}

/// One booking attempt for one venue, from event details to payment.
pub struct BookingFlow {
    venue: Venue,
    stage: Stage,
    date: DateStatus,
    form: BookingForm,
    fence: AvailabilityFence,
    last_error: Option<String>,
}

impl BookingFlow {
    /// Starts at `EventDetails`, with contact details taken from the
    /// signed-in user when there is one.
    pub fn new(venue: Venue, user: Option<&AuthUser>) -> Self {
        let mut form = BookingForm::default();
        if let Some(u) = user {
            form.contact_name = u.name.clone();
            form.contact_phone = u.phone.clone().unwrap_or_default();
        }

        Self {
            venue,
            stage: Stage::EventDetails,
            date: DateStatus::Unselected,
            form,
            fence: AvailabilityFence::new(),
            last_error: None,
        }
    }

    pub fn venue(&self) -> &Venue {
        &self.venue
    }

    pub fn stage(&self) -> Stage {
        self.stage
    }

    pub fn date_status(&self) -> &DateStatus {
        &self.date
    }

    /// The date, once its availability has been confirmed.
    pub fn selected_date(&self) -> Option<NaiveDate> {
        match self.date {
            DateStatus::Available(d) => Some(d),
            _ => None,
        }
    }

    /// True while an availability check is outstanding; date input and
    /// forward navigation should be disabled meanwhile.
    pub fn is_checking(&self) -> bool {
        matches!(self.date, DateStatus::Checking(_))
    }

    pub fn form(&self) -> &BookingForm {
        &self.form
    }

    pub fn form_mut(&mut self) -> &mut BookingForm {
        &mut self.form
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    /// Price for the current add-on selection, recomputed on every call.
    pub fn price(&self) -> PriceBreakdown {
        PriceBreakdown::compute(self.venue.daily_rate, &self.form.addons)
    }

    /* =========================
    Date selection
    ========================= */

    /// Marks `date` as being checked and returns the ticket its answer must
    /// present. Any earlier outstanding ticket is superseded.
    pub fn begin_date_check(
        &mut self,
        date: NaiveDate,
        today: NaiveDate,
    ) -> Result<CheckTicket, FlowError> {
        if date < today {
            self.fence.invalidate();
            self.date = DateStatus::Unselected;
            return Err(self.fail(ValidationError::DateInPast.into()));
        }

        self.last_error = None;
        self.date = DateStatus::Checking(date);
        Ok(self.fence.issue(date))
    }

    /// Applies an availability answer if its ticket is still current.
    ///
    /// Returns false when the answer was stale and dropped.
    pub fn complete_date_check(&mut self, ticket: CheckTicket, verdict: AvailabilityVerdict) -> bool {
        if !self.fence.is_current(&ticket) {
            debug!(date = %ticket.date, seq = ticket.seq, "stale availability answer dropped");
            return false;
        }

        self.date = if verdict.available {
            DateStatus::Available(ticket.date)
        } else {
            DateStatus::Unavailable {
                date: ticket.date,
                reason: verdict
                    .reason
                    .unwrap_or_else(|| DATE_UNAVAILABLE_MESSAGE.to_string()),
            }
        };
        true
    }

    /// Selects `date` and checks it (fail-closed). Returns whether it is
    /// available.
    pub async fn select_date(
        &mut self,
        checker: &AvailabilityChecker,
        date: NaiveDate,
    ) -> Result<bool, FlowError> {
        let ticket = self.begin_date_check(date, checker.calendar().today())?;
        let verdict = checker.check(&self.venue.id, date).await;
        self.complete_date_check(ticket, verdict);
        Ok(self.selected_date() == Some(date))
    }

    /// Clears the date and fences any check still in flight.
    pub fn clear_date(&mut self) {
        self.fence.invalidate();
        self.date = DateStatus::Unselected;
    }

    /* =========================
    Navigation
    ========================= */

    pub fn advance(&mut self) -> Result<Stage, FlowError> {
        let next = match self.stage {
            Stage::EventDetails => {
                if let Err(e) = self.check_event_details() {
                    return Err(self.fail(e));
                }
                Stage::Addons
            }
            Stage::Addons => Stage::Payment,
            Stage::Payment => {
                return Err(FlowError::InvalidTransition {
                    stage: self.stage,
                    action: "advance",
                });
            }
        };

        self.last_error = None;
        self.stage = next;
        Ok(next)
    }

    pub fn back(&mut self) -> Result<Stage, FlowError> {
        let prev = match self.stage {
            Stage::EventDetails => {
                return Err(FlowError::InvalidTransition {
                    stage: self.stage,
                    action: "go back",
                });
            }
            Stage::Addons => Stage::EventDetails,
            Stage::Payment => Stage::Addons,
        };

        self.stage = prev;
        Ok(prev)
    }

    fn confirmed_date(&self) -> Result<NaiveDate, FlowError> {
        match &self.date {
            DateStatus::Available(d) => Ok(*d),
            DateStatus::Checking(_) => Err(FlowError::AvailabilityPending),
            DateStatus::Unavailable { date, reason } => Err(FlowError::DateUnavailable {
                date: *date,
                reason: reason.clone(),
            }),
            DateStatus::Unselected => Err(ValidationError::MissingField("Date").into()),
        }
    }

    fn check_event_details(&self) -> Result<(), FlowError> {
        self.confirmed_date()?;
        if self.form.event_type.is_none() {
            return Err(ValidationError::MissingField("Event type").into());
        }
        require("Contact name", &self.form.contact_name)?;
        require("Contact phone", &self.form.contact_phone)?;
        Ok(())
    }

    fn fail(&mut self, e: FlowError) -> FlowError {
        self.last_error = Some(e.user_message());
        e
    }

    /* =========================
    Submission
    ========================= */

    /// Creates the booking on the server.
    ///
    /// Availability is verified again first. On failure the flow stays at
    /// `Payment` with `last_error` set; the caller applies the returned
    /// booking to local state only on success.
    #[instrument(skip_all, target = "flow", fields(venue_id = %self.venue.id))]
    pub async fn submit(
        &mut self,
        service: &dyn BookingService,
        checker: &AvailabilityChecker,
        user: Option<&AuthUser>,
    ) -> Result<Booking, FlowError> {
        if self.stage != Stage::Payment {
            return Err(FlowError::InvalidTransition {
                stage: self.stage,
                action: "submit",
            });
        }

        self.last_error = None;
        match self.try_submit(service, checker, user).await {
            Ok(booking) => {
                info!(booking_id = %booking.id, total = booking.total_price, "booking created");
                Ok(booking)
            }
            Err(e) => {
                warn!(error = %e, "booking submission failed");
                Err(self.fail(e))
            }
        }
    }

    async fn try_submit(
        &mut self,
        service: &dyn BookingService,
        checker: &AvailabilityChecker,
        user: Option<&AuthUser>,
    ) -> Result<Booking, FlowError> {
        let date = self.confirmed_date()?;
        let event_type = self
            .form
            .event_type
            .ok_or(ValidationError::MissingField("Event type"))?;
        validate_guest_count(self.form.guest_count, self.venue.capacity)?;

        let verdict = checker
            .check_strict(&self.venue.id, date)
            .await
            .map_err(FlowError::AvailabilityUnverified)?;
        if !verdict.available {
            self.date = DateStatus::Unavailable {
                date,
                reason: DATE_NO_LONGER_AVAILABLE_MESSAGE.to_string(),
            };
            return Err(FlowError::DateUnavailable {
                date,
                reason: DATE_NO_LONGER_AVAILABLE_MESSAGE.to_string(),
            });
        }

        let window = checker.calendar().day_window(date);
        let total_price = compute_total(self.venue.daily_rate, &self.form.addons);
        let request = NewBooking {
            venue_id: self.venue.id.clone(),
            user_id: user
                .map(|u| u.id.as_str().to_string())
                .unwrap_or_else(|| GUEST_USER_ID.to_string()),
            start_date: window.start_param(),
            end_date: window.end_param(),
            guest_count: self.form.guest_count,
            event_type,
            special_requests: self.form.special_requests.clone(),
            contact_name: self.form.contact_name.clone(),
            contact_phone: self.form.contact_phone.clone(),
            addons: self.form.addons,
            payment_method: self.form.payment_method,
            total_price,
            status: BookingStatus::Confirmed,
        };

        let receipt = service.create_booking(&request).await?;

        let special_requests = Some(self.form.special_requests.trim())
            .filter(|s| !s.is_empty())
            .map(str::to_string);

        Ok(Booking {
            id: receipt.id,
            venue_id: self.venue.id.clone(),
            venue_name: self.venue.name.clone(),
            date,
            guest_count: self.form.guest_count,
            event_type: Some(event_type),
            special_requests,
            addons: self.form.addons,
            total_price,
            status: receipt.status.unwrap_or(BookingStatus::Confirmed),
            created_at: Some(receipt.created_at.unwrap_or_else(Utc::now)),
        })
    }
}
