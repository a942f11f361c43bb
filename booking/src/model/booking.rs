use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::model::ids::{BookingId, VenueId};

/// Reservation status. Cancellation is a status transition, never a delete.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BookingStatus {
    #[default]
    Confirmed,
    Cancelled,
}

impl BookingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BookingStatus::Confirmed => "confirmed",
            BookingStatus::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for BookingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Optional paid enhancements applied to a booking's price.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Addons {
    #[serde(default)]
    pub decoration: bool,
    #[serde(default)]
    pub catering: bool,
    #[serde(default)]
    pub equipment: bool,
}

impl Addons {
    pub const NONE: Addons = Addons {
        decoration: false,
        catering: false,
        equipment: false,
    };

    pub const ALL: Addons = Addons {
        decoration: true,
        catering: true,
        equipment: true,
    };
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventType {
    Wedding,
    Corporate,
    Birthday,
    Conference,
    Seminar,
    Exhibition,
    #[serde(other)]
    Other,
}

impl EventType {
    pub const ALL: [EventType; 7] = [
        EventType::Wedding,
        EventType::Corporate,
        EventType::Birthday,
        EventType::Conference,
        EventType::Seminar,
        EventType::Exhibition,
        EventType::Other,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            EventType::Wedding => "wedding",
            EventType::Corporate => "corporate",
            EventType::Birthday => "birthday",
            EventType::Conference => "conference",
            EventType::Seminar => "seminar",
            EventType::Exhibition => "exhibition",
            EventType::Other => "other",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            EventType::Wedding => "Wedding",
            EventType::Corporate => "Corporate Event",
            EventType::Birthday => "Birthday Party",
            EventType::Conference => "Conference",
            EventType::Seminar => "Seminar",
            EventType::Exhibition => "Exhibition",
            EventType::Other => "Other",
        }
    }
}

impl FromStr for EventType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase();
        EventType::ALL
            .into_iter()
            .find(|t| t.as_str() == wanted)
            .ok_or_else(|| format!("unknown event type: {s}"))
    }
}

/// Payment method captured with the booking. No payment is processed.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum PaymentMethod {
    #[default]
    #[serde(rename = "credit_card")]
    CreditCard,
    #[serde(rename = "upi")]
    Upi,
    #[serde(rename = "netbanking")]
    NetBanking,
}

impl PaymentMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentMethod::CreditCard => "credit_card",
            PaymentMethod::Upi => "upi",
            PaymentMethod::NetBanking => "netbanking",
        }
    }
}

impl FromStr for PaymentMethod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "credit_card" | "card" => Ok(PaymentMethod::CreditCard),
            "upi" => Ok(PaymentMethod::Upi),
            "netbanking" => Ok(PaymentMethod::NetBanking),
            other => Err(format!("unknown payment method: {other}")),
        }
    }
}

/// A single-day reservation of a venue.
///
/// This is the one canonical shape used everywhere inside the crate; wire
/// variants are normalized in `remote::types`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Booking {
    pub id: BookingId,
    pub venue_id: VenueId,
    #[serde(default)]
    pub venue_name: String,
    /// Calendar day (`YYYY-MM-DD`), not a timestamp.
    pub date: NaiveDate,
    pub guest_count: u32,
    #[serde(default)]
    pub event_type: Option<EventType>,
    #[serde(default)]
    pub special_requests: Option<String>,
    #[serde(default)]
    pub addons: Addons,
    pub total_price: f64,
    #[serde(default)]
    pub status: BookingStatus,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

impl Booking {
    pub fn is_cancelled(&self) -> bool {
        self.status == BookingStatus::Cancelled
    }

    pub fn mark_cancelled(&mut self) {
        self.status = BookingStatus::Cancelled;
    }

    /// Moves the booking to `date`; a rescheduled booking is always confirmed.
    pub fn reschedule_to(&mut self, date: NaiveDate) {
        self.date = date;
        self.status = BookingStatus::Confirmed;
    }
}
