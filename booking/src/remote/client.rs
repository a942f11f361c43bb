use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::RwLock;
use reqwest::{Client, Method, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use tracing::{debug, instrument, warn};

use crate::calendar::{Calendar, DayWindow};
use crate::config::AppConfig;
use crate::model::{AuthUser, Booking, BookingId, Venue, VenueId};
use crate::remote::errors::RemoteError;
use crate::remote::types::{
    AuthBody, AuthSession, AvailabilityVerdict, BookingReceipt, ErrorBody, ItemBody, ListBody,
    NewBooking, NewUser, RemoteBooking, RemoteReceipt, RemoteVenue,
};
use crate::remote::{AuthService, BookingService};

/// reqwest-backed client for the booking REST API.
///
/// Cloning is cheap and clones share the bearer token.
#[derive(Clone)]
pub struct HttpBookingService {
    http: Client,
    base_url: String,
    calendar: Calendar,
    token: Arc<RwLock<Option<String>>>,
}

impl HttpBookingService {
    pub fn new(
        base_url: impl Into<String>,
        timeout: Duration,
        calendar: Calendar,
    ) -> Result<Self, RemoteError> {
        let http = Client::builder()
            .timeout(timeout)
            .pool_idle_timeout(Duration::from_secs(30))
            .tcp_keepalive(Duration::from_secs(30))
            .build()?;

        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            calendar,
            token: Arc::new(RwLock::new(None)),
        })
    }

    pub fn from_config(cfg: &AppConfig) -> Result<Self, RemoteError> {
        Self::new(cfg.api_base_url.clone(), cfg.request_timeout, cfg.calendar)
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let req = self.http.request(method, format!("{}{}", self.base_url, path));
        let token = self.token.read().clone();
        match token {
            Some(token) => req.bearer_auth(token),
            None => req,
        }
    }

    async fn send<T: DeserializeOwned>(&self, req: RequestBuilder) -> Result<T, RemoteError> {
        let resp = check_status(req.send().await?).await?;
        let bytes = resp.bytes().await?;

        serde_json::from_slice(&bytes).map_err(|e| RemoteError::InvalidResponse(e.to_string()))
    }

    async fn send_discarding_body(&self, req: RequestBuilder) -> Result<(), RemoteError> {
        check_status(req.send().await?).await?;
        Ok(())
    }

    fn session_from(body: AuthBody, fallback: &str) -> Result<AuthSession, RemoteError> {
        match (body.success, body.token, body.user) {
            (true, Some(token), Some(user)) => Ok(AuthSession {
                token,
                user: user.into_user()?,
            }),
            _ => Err(RemoteError::Rejected(
                body.message.unwrap_or_else(|| fallback.to_string()),
            )),
        }
    }
}

/// Maps non-2xx responses to `RemoteError`, keeping the server's message.
async fn check_status(resp: Response) -> Result<Response, RemoteError> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }

    let message = resp
        .json::<ErrorBody>()
        .await
        .ok()
        .and_then(ErrorBody::into_message)
        .unwrap_or_else(|| {
            status
                .canonical_reason()
                .unwrap_or("request failed")
                .to_string()
        });

    warn!(target: "remote", status = status.as_u16(), message = %message, "booking service error");

    Err(match status {
        StatusCode::UNAUTHORIZED => RemoteError::Unauthorized,
        StatusCode::NOT_FOUND => RemoteError::NotFound(message),
        StatusCode::CONFLICT => RemoteError::Conflict(message),
        s => RemoteError::Api {
            status: s.as_u16(),
            message,
        },
    })
}

/// Normalizes each list entry independently; malformed entries are skipped.
fn normalize_each<R, T>(
    items: Vec<Value>,
    what: &'static str,
    convert: impl Fn(R) -> Result<T, RemoteError>,
) -> Vec<T>
where
    R: DeserializeOwned,
{
    let mut out = Vec::with_capacity(items.len());
    for item in items {
        let parsed = serde_json::from_value::<R>(item)
            .map_err(|e| RemoteError::InvalidResponse(e.to_string()))
            .and_then(&convert);

        match parsed {
            Ok(v) => out.push(v),
            Err(e) => {
                warn!(target: "remote", error = %e, kind = what, "skipping malformed record");
            }
        }
    }
    out
}

#[async_trait]
impl BookingService for HttpBookingService {
    #[instrument(skip(self), target = "remote", level = "debug")]
    async fn list_venues(&self) -> Result<Vec<Venue>, RemoteError> {
        let body: ListBody<Value> = self.send(self.request(Method::GET, "/venues")).await?;
        let venues = normalize_each(body.into_vec(), "venue", RemoteVenue::into_venue);

        debug!(count = venues.len(), "venues fetched");
        Ok(venues)
    }

    #[instrument(skip(self), target = "remote", fields(venue_id = %venue_id), level = "debug")]
    async fn venue(&self, venue_id: &VenueId) -> Result<Venue, RemoteError> {
        let path = format!("/venues/{venue_id}");
        let body: ItemBody<RemoteVenue> = self.send(self.request(Method::GET, &path)).await?;

        body.into_inner().into_venue()
    }

    #[instrument(
        skip(self, window),
        target = "remote",
        fields(venue_id = %venue_id, date = %window.date),
        level = "debug"
    )]
    async fn check_availability(
        &self,
        venue_id: &VenueId,
        window: &DayWindow,
    ) -> Result<AvailabilityVerdict, RemoteError> {
        let req = self
            .request(Method::GET, "/bookings/check-availability")
            .query(&[
                ("venueId", venue_id.to_string()),
                ("startDate", window.start_param()),
                ("endDate", window.end_param()),
            ]);

        let verdict: AvailabilityVerdict = self.send(req).await?;

        debug!(
            available = verdict.available,
            reason = verdict.reason.as_deref().unwrap_or(""),
            "availability answered"
        );
        Ok(verdict)
    }

    #[instrument(
        skip(self, request),
        target = "remote",
        fields(venue_id = %request.venue_id, start = %request.start_date),
        level = "debug"
    )]
    async fn create_booking(&self, request: &NewBooking) -> Result<BookingReceipt, RemoteError> {
        let req = self.request(Method::POST, "/bookings").json(request);
        let body: ItemBody<RemoteReceipt> = self.send(req).await?;

        let receipt = body.into_inner().into_receipt()?;
        debug!(booking_id = %receipt.id, "booking created");
        Ok(receipt)
    }

    #[instrument(skip(self), target = "remote", level = "debug")]
    async fn user_bookings(&self) -> Result<Vec<Booking>, RemoteError> {
        let body: ListBody<Value> = self.send(self.request(Method::GET, "/bookings/user")).await?;
        let calendar = self.calendar;

        let bookings = normalize_each(body.into_vec(), "booking", |r: RemoteBooking| {
            r.into_booking(&calendar)
        });

        debug!(count = bookings.len(), "user bookings fetched");
        Ok(bookings)
    }

    #[instrument(skip(self), target = "remote", fields(booking_id = %booking_id), level = "debug")]
    async fn cancel_booking(&self, booking_id: &BookingId) -> Result<(), RemoteError> {
        let path = format!("/bookings/{booking_id}/cancel");
        self.send_discarding_body(self.request(Method::PUT, &path))
            .await
    }

    #[instrument(
        skip(self, window),
        target = "remote",
        fields(booking_id = %booking_id, date = %window.date),
        level = "debug"
    )]
    async fn reschedule_booking(
        &self,
        booking_id: &BookingId,
        window: &DayWindow,
    ) -> Result<(), RemoteError> {
        let path = format!("/bookings/{booking_id}/reschedule");
        let req = self.request(Method::PUT, &path).json(&json!({
            "startDate": window.start_param(),
            "endDate": window.end_param(),
        }));

        self.send_discarding_body(req).await
    }
}

#[async_trait]
impl AuthService for HttpBookingService {
    #[instrument(skip(self, password), target = "remote", level = "debug")]
    async fn login(&self, email: &str, password: &str) -> Result<AuthSession, RemoteError> {
        let req = self
            .request(Method::POST, "/auth/login")
            .json(&json!({ "email": email, "password": password }));

        let body: AuthBody = self.send(req).await?;
        Self::session_from(body, "Login failed")
    }

    #[instrument(skip(self, user), target = "remote", fields(email = %user.email), level = "debug")]
    async fn register(&self, user: &NewUser) -> Result<AuthSession, RemoteError> {
        let req = self.request(Method::POST, "/auth/register").json(user);

        let body: AuthBody = self.send(req).await?;
        Self::session_from(body, "Registration failed")
    }

    #[instrument(skip(self), target = "remote", level = "debug")]
    async fn current_user(&self) -> Result<AuthUser, RemoteError> {
        let body: AuthBody = self.send(self.request(Method::GET, "/auth/me")).await?;

        match (body.success, body.user) {
            (true, Some(user)) => user.into_user(),
            _ => Err(RemoteError::Unauthorized),
        }
    }

    fn set_token(&self, token: Option<String>) {
        *self.token.write() = token;
    }

    fn has_token(&self) -> bool {
        self.token.read().is_some()
    }
}
