pub mod client;
pub mod errors;
pub mod types;

use async_trait::async_trait;

use crate::calendar::DayWindow;
use crate::model::{AuthUser, Booking, BookingId, Venue, VenueId};

pub use client::HttpBookingService;
pub use errors::RemoteError;
pub use types::{
    AuthSession, AvailabilityVerdict, BookingReceipt, GUEST_USER_ID, NewBooking, NewUser,
};

/// The remote source of truth for venues and bookings.
///
/// Implementations normalize wire payloads; callers only see canonical types.
#[async_trait]
pub trait BookingService: Send + Sync {
    async fn list_venues(&self) -> Result<Vec<Venue>, RemoteError>;

    async fn venue(&self, venue_id: &VenueId) -> Result<Venue, RemoteError>;

    async fn check_availability(
        &self,
        venue_id: &VenueId,
        window: &DayWindow,
    ) -> Result<AvailabilityVerdict, RemoteError>;

    async fn create_booking(&self, request: &NewBooking) -> Result<BookingReceipt, RemoteError>;

    /// Bookings of the caller identified by the bearer token.
    async fn user_bookings(&self) -> Result<Vec<Booking>, RemoteError>;

    async fn cancel_booking(&self, booking_id: &BookingId) -> Result<(), RemoteError>;

    async fn reschedule_booking(
        &self,
        booking_id: &BookingId,
        window: &DayWindow,
    ) -> Result<(), RemoteError>;
}

/// Token issuance and verification. Owned by the auth backend; this is a thin client.
#[async_trait]
pub trait AuthService: Send + Sync {
    async fn login(&self, email: &str, password: &str) -> Result<AuthSession, RemoteError>;

    async fn register(&self, user: &NewUser) -> Result<AuthSession, RemoteError>;

    /// Verifies the current token and returns its user.
    async fn current_user(&self) -> Result<AuthUser, RemoteError>;

    /// Sets (or clears) the bearer token attached to every request.
    fn set_token(&self, token: Option<String>);

    fn has_token(&self) -> bool;
}
