use thiserror::Error;

use crate::remote::RemoteError;

#[derive(Error, Debug)]
pub enum StateError {
    /// The active scope is the last user's cache, kept after logout.
    #[error("bookings of a signed-out user are read-only")]
    ReadOnlyScope,

    /// The scope switched (or is still loading) before the update landed.
    #[error("booking scope changed before the update was applied")]
    ScopeChanging,

    #[error(transparent)]
    Remote(#[from] RemoteError),
}

impl StateError {
    pub fn user_message(&self) -> String {
        match self {
            StateError::ReadOnlyScope => "Sign in to change these bookings.".to_string(),
            StateError::ScopeChanging => {
                "Your bookings are still loading. Please try again.".to_string()
            }
            StateError::Remote(e) => e.user_message(),
        }
    }
}
