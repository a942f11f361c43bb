use thiserror::Error;

use crate::remote::NewUser;

pub const PHONE_DIGITS: usize = 10;
pub const MIN_PASSWORD_LEN: usize = 6;

/// Client-side validation failures, reported before any network call.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("{0} is required")]
    MissingField(&'static str),

    #[error("Please enter a valid 10-digit phone number")]
    InvalidPhone,

    #[error("Passwords do not match")]
    PasswordMismatch,

    #[error("Password must be at least 6 characters")]
    PasswordTooShort,

    #[error("Guest count must be between 1 and {capacity}, got {count}")]
    GuestCountOutOfRange { count: u32, capacity: u32 },

    #[error("Bookings cannot be made for past dates")]
    DateInPast,
}

pub fn require(field: &'static str, value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        return Err(ValidationError::MissingField(field));
    }
    Ok(())
}

/// Exactly ten ASCII digits.
pub fn validate_phone(phone: &str) -> Result<(), ValidationError> {
    let phone = phone.trim();
    if phone.len() == PHONE_DIGITS && phone.bytes().all(|b| b.is_ascii_digit()) {
        Ok(())
    } else {
        Err(ValidationError::InvalidPhone)
    }
}

/// A guest count must be positive and fit the venue.
pub fn validate_guest_count(count: u32, capacity: u32) -> Result<(), ValidationError> {
    if count == 0 || count > capacity {
        return Err(ValidationError::GuestCountOutOfRange { count, capacity });
    }
    Ok(())
}

#[derive(Clone, Debug, Default)]
pub struct RegistrationForm {
    pub name: String,
    pub email: String,
    pub phone: String,
    pub password: String,
    pub confirm_password: String,
}

impl RegistrationForm {
    /// Checks the form in the order a user sees the errors and returns the
    /// payload for `POST /auth/register`.
    pub fn validate(&self) -> Result<NewUser, ValidationError> {
        require("Name", &self.name)?;
        require("Email", &self.email)?;
        require("Phone", &self.phone)?;
        require("Password", &self.password)?;

        validate_phone(&self.phone)?;

        if self.password != self.confirm_password {
            return Err(ValidationError::PasswordMismatch);
        }
        if self.password.chars().count() < MIN_PASSWORD_LEN {
            return Err(ValidationError::PasswordTooShort);
        }

        Ok(NewUser {
            name: self.name.trim().to_string(),
            email: self.email.trim().to_string(),
            password: self.password.clone(),
            phone: self.phone.trim().to_string(),
        })
    }
}
