pub mod checker;
pub mod fence;

pub use crate::remote::AvailabilityVerdict;
pub use checker::{AVAILABILITY_ERROR_REASON, AvailabilityChecker};
pub use fence::{AvailabilityFence, CheckTicket};
