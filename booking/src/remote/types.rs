//! Wire types for the remote booking service and the normalization boundary.
//!
//! The server is loose about field names (`_id` vs `id`, `date` vs
//! `startDate`, `image` vs `imageUrl`, populated vs bare references). Every
//! variant is resolved here so the rest of the crate only sees the canonical
//! `Booking` / `Venue` / `AuthUser` shapes.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::calendar::{Calendar, parse_date};
use crate::model::{
    Addons, AuthUser, Booking, BookingId, BookingStatus, EventType, PaymentMethod, UserId, Venue,
    VenueId,
};
use crate::remote::errors::RemoteError;

/// `userId` sent with bookings created without a signed-in user.
pub const GUEST_USER_ID: &str = "guest-user";

/// Response of `GET /bookings/check-availability`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AvailabilityVerdict {
    pub available: bool,
    #[serde(default)]
    pub reason: Option<String>,
}

impl AvailabilityVerdict {
    pub fn available() -> Self {
        Self {
            available: true,
            reason: None,
        }
    }

    pub fn unavailable(reason: impl Into<String>) -> Self {
        Self {
            available: false,
            reason: Some(reason.into()),
        }
    }
}

/// Body of `POST /bookings`.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NewBooking {
    pub venue_id: VenueId,
    pub user_id: String,
    pub start_date: String,
    pub end_date: String,
    pub guest_count: u32,
    pub event_type: EventType,
    pub special_requests: String,
    pub contact_name: String,
    pub contact_phone: String,
    pub addons: Addons,
    pub payment_method: PaymentMethod,
    pub total_price: f64,
    pub status: BookingStatus,
}

/// What the server tells us about a booking it just created.
#[derive(Clone, Debug, PartialEq)]
pub struct BookingReceipt {
    pub id: BookingId,
    pub status: Option<BookingStatus>,
    pub created_at: Option<DateTime<Utc>>,
}

/// Body of `POST /auth/register`.
#[derive(Clone, Debug, Serialize)]
pub struct NewUser {
    pub name: String,
    pub email: String,
    pub password: String,
    pub phone: String,
}

/// A verified session: bearer token plus the user it belongs to.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AuthSession {
    pub token: String,
    pub user: AuthUser,
}

/* =========================
Envelopes
========================= */

/// List endpoints answer either with a bare array or `{ data: [...] }`.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub(crate) enum ListBody<T> {
    Bare(Vec<T>),
    Wrapped {
        #[serde(alias = "venues", alias = "bookings")]
        data: Vec<T>,
    },
}

impl<T> ListBody<T> {
    pub(crate) fn into_vec(self) -> Vec<T> {
        match self {
            ListBody::Bare(v) | ListBody::Wrapped { data: v } => v,
        }
    }
}

/// Single-item endpoints answer either bare or `{ venue | booking | data: {...} }`.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub(crate) enum ItemBody<T> {
    // Tried first: every field of a bare receipt is optional, so `Bare`
    // would swallow a wrapped body.
    Wrapped {
        #[serde(alias = "venue", alias = "booking")]
        data: T,
    },
    Bare(T),
}

impl<T> ItemBody<T> {
    pub(crate) fn into_inner(self) -> T {
        match self {
            ItemBody::Bare(v) | ItemBody::Wrapped { data: v } => v,
        }
    }
}

/// Error body; the server uses either `error` or `message`.
#[derive(Debug, Default, Deserialize)]
pub(crate) struct ErrorBody {
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

impl ErrorBody {
    pub(crate) fn into_message(self) -> Option<String> {
        self.error.or(self.message)
    }
}

fn pick_id(mongo_id: Option<String>, id: Option<String>) -> Option<String> {
    mongo_id.or(id).filter(|s| !s.trim().is_empty())
}

/* =========================
Bookings
========================= */

/// `venueId` is a plain id, or the populated venue document.
#[derive(Clone, Debug, Deserialize)]
#[serde(untagged)]
pub(crate) enum VenueRef {
    Id(String),
    Populated {
        #[serde(default, rename = "_id")]
        mongo_id: Option<String>,
        #[serde(default)]
        id: Option<String>,
        #[serde(default)]
        name: Option<String>,
    },
}

#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct RemoteBooking {
    #[serde(default, rename = "_id")]
    mongo_id: Option<String>,
    #[serde(default)]
    id: Option<String>,
    venue_id: VenueRef,
    #[serde(default)]
    venue_name: Option<String>,
    #[serde(default)]
    date: Option<String>,
    #[serde(default)]
    start_date: Option<DateTime<Utc>>,
    #[serde(default)]
    guest_count: Option<u32>,
    #[serde(default)]
    event_type: Option<EventType>,
    #[serde(default)]
    special_requests: Option<String>,
    #[serde(default)]
    addons: Option<Addons>,
    #[serde(default)]
    total_price: Option<f64>,
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    created_at: Option<DateTime<Utc>>,
}

/// `YYYY-MM-DD`, or a full timestamp read in the client calendar.
fn parse_day(raw: &str, calendar: &Calendar) -> Option<NaiveDate> {
    parse_date(raw).ok().or_else(|| {
        DateTime::parse_from_rfc3339(raw.trim())
            .ok()
            .map(|dt| calendar.date_of(dt.with_timezone(&Utc)))
    })
}

pub(crate) fn parse_status(raw: &str) -> BookingStatus {
    match raw.trim().to_ascii_lowercase().as_str() {
        "cancelled" | "canceled" => BookingStatus::Cancelled,
        _ => BookingStatus::Confirmed,
    }
}

impl RemoteBooking {
    pub(crate) fn into_booking(self, calendar: &Calendar) -> Result<Booking, RemoteError> {
        let id = pick_id(self.mongo_id, self.id)
            .ok_or_else(|| RemoteError::InvalidResponse("booking without id".into()))?;

        let (venue_id, populated_name) = match self.venue_id {
            VenueRef::Id(v) => (Some(v), None),
            VenueRef::Populated { mongo_id, id, name } => (pick_id(mongo_id, id), name),
        };
        let venue_id = venue_id.ok_or_else(|| {
            RemoteError::InvalidResponse(format!("booking {id} without venue id"))
        })?;

        let date = match (self.date.as_deref(), self.start_date) {
            (Some(raw), _) => parse_day(raw, calendar).ok_or_else(|| {
                RemoteError::InvalidResponse(format!("booking {id} has bad date {raw:?}"))
            })?,
            (None, Some(start)) => calendar.date_of(start),
            (None, None) => {
                return Err(RemoteError::InvalidResponse(format!(
                    "booking {id} has neither date nor startDate"
                )));
            }
        };

        Ok(Booking {
            id: BookingId::new(id),
            venue_id: VenueId::new(venue_id),
            venue_name: self.venue_name.or(populated_name).unwrap_or_default(),
            date,
            guest_count: self.guest_count.unwrap_or(1),
            event_type: self.event_type,
            special_requests: self.special_requests.filter(|s| !s.is_empty()),
            addons: self.addons.unwrap_or_default(),
            total_price: self.total_price.unwrap_or(0.0),
            status: self
                .status
                .as_deref()
                .map(parse_status)
                .unwrap_or_default(),
            created_at: self.created_at,
        })
    }
}

#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct RemoteReceipt {
    #[serde(default, rename = "_id")]
    mongo_id: Option<String>,
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    created_at: Option<DateTime<Utc>>,
}

impl RemoteReceipt {
    pub(crate) fn into_receipt(self) -> Result<BookingReceipt, RemoteError> {
        let id = pick_id(self.mongo_id, self.id).ok_or_else(|| {
            RemoteError::InvalidResponse("created booking has no id".into())
        })?;

        Ok(BookingReceipt {
            id: BookingId::new(id),
            status: self.status.as_deref().map(parse_status),
            created_at: self.created_at,
        })
    }
}

/* =========================
Venues
========================= */

#[derive(Clone, Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct RemoteAddress {
    #[serde(default)]
    street: Option<String>,
    #[serde(default)]
    city: Option<String>,
    #[serde(default)]
    state: Option<String>,
    #[serde(default)]
    country: Option<String>,
    #[serde(default)]
    zip_code: Option<String>,
}

impl RemoteAddress {
    fn render(&self) -> String {
        [
            &self.street,
            &self.city,
            &self.state,
            &self.country,
            &self.zip_code,
        ]
        .into_iter()
        .flatten()
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join(", ")
    }
}

#[derive(Clone, Debug, Deserialize)]
#[serde(untagged)]
pub(crate) enum RemoteLocation {
    Text(String),
    Structured {
        #[serde(default)]
        address: Option<RemoteAddress>,
    },
}

#[derive(Clone, Debug, Deserialize)]
#[serde(untagged)]
pub(crate) enum RemoteAmenity {
    Name(String),
    Object { name: String },
}

#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct RemoteVenue {
    #[serde(default, rename = "_id")]
    mongo_id: Option<String>,
    #[serde(default)]
    id: Option<String>,
    name: String,
    #[serde(default)]
    description: Option<String>,
    #[serde(default, rename = "type")]
    venue_type: Option<String>,
    #[serde(default)]
    address: Option<String>,
    #[serde(default)]
    location: Option<RemoteLocation>,
    #[serde(default)]
    capacity: u32,
    daily_rate: f64,
    #[serde(default)]
    amenities: Vec<RemoteAmenity>,
    #[serde(default)]
    image_url: Option<String>,
    #[serde(default)]
    image: Option<String>,
}

impl RemoteVenue {
    pub(crate) fn into_venue(self) -> Result<Venue, RemoteError> {
        let id = pick_id(self.mongo_id, self.id).ok_or_else(|| {
            RemoteError::InvalidResponse(format!("venue {:?} without id", self.name))
        })?;

        let location = match (self.address, self.location) {
            (Some(addr), _) if !addr.trim().is_empty() => addr,
            (_, Some(RemoteLocation::Text(text))) => text,
            (_, Some(RemoteLocation::Structured { address: Some(a) })) => a.render(),
            _ => String::new(),
        };

        Ok(Venue {
            id: VenueId::new(id),
            name: self.name,
            description: self.description,
            venue_type: self.venue_type,
            location,
            capacity: self.capacity,
            daily_rate: self.daily_rate,
            amenities: self
                .amenities
                .into_iter()
                .map(|a| match a {
                    RemoteAmenity::Name(n) | RemoteAmenity::Object { name: n } => n,
                })
                .collect(),
            image_url: self.image_url.or(self.image),
        })
    }
}

/* =========================
Auth
========================= */

#[derive(Clone, Debug, Deserialize)]
pub(crate) struct RemoteUser {
    #[serde(default, rename = "_id")]
    mongo_id: Option<String>,
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    name: String,
    #[serde(default)]
    email: String,
    #[serde(default)]
    phone: Option<String>,
}

impl RemoteUser {
    pub(crate) fn into_user(self) -> Result<AuthUser, RemoteError> {
        let id = pick_id(self.mongo_id, self.id)
            .ok_or_else(|| RemoteError::InvalidResponse("user without id".into()))?;

        Ok(AuthUser {
            id: UserId::new(id),
            name: self.name,
            email: self.email,
            phone: self.phone.filter(|p| !p.is_empty()),
        })
    }
}

/// Body of `/auth/login`, `/auth/register` and `/auth/me`.
#[derive(Clone, Debug, Deserialize)]
pub(crate) struct AuthBody {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub token: Option<String>,
    #[serde(default)]
    pub user: Option<RemoteUser>,
    #[serde(default)]
    pub message: Option<String>,
}
