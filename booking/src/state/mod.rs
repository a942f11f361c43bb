pub mod errors;
pub mod manager;

pub use errors::StateError;
pub use manager::{BookingStateManager, ScopeIdentity};
