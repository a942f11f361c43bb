pub mod booking;
pub mod ids;
pub mod user;
pub mod venue;

pub use booking::{Addons, Booking, BookingStatus, EventType, PaymentMethod};
pub use ids::{BookingId, UserId, VenueId};
pub use user::AuthUser;
pub use venue::{RangeFilter, Venue, VenueFilter};
