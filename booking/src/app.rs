use std::sync::Arc;

use chrono::NaiveDate;
use parking_lot::RwLock;
use tracing::{Instrument, info, instrument, warn};

use crate::availability::AvailabilityChecker;
use crate::calendar::Calendar;
use crate::config::AppConfig;
use crate::db::Db;
use crate::error::AppError;
use crate::flow::BookingFlow;
use crate::flow::validation::{RegistrationForm, ValidationError, require};
use crate::logger::{TraceId, annotate_span, root_span};
use crate::model::{AuthUser, Booking, BookingId, Venue, VenueFilter, VenueId};
use crate::persistence::{LocalStore, ScopeKey, SqlxKeyValueStore};
use crate::remote::{AuthService, AuthSession, BookingService, HttpBookingService, RemoteError};
use crate::state::{BookingStateManager, StateError};

/// How a local change was reconciled with the server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RemoteSync {
    Synced,
    /// No signed-in user; the change is local only.
    Skipped,
    /// The server call failed; the local change was applied anyway.
    Failed(String),
}

/// Root object of the client: services, signed-in user, booking state and
/// the venue being looked at. Passed explicitly to whoever needs it.
pub struct AppState {
    service: Arc<dyn BookingService>,
    auth: Arc<dyn AuthService>,
    checker: AvailabilityChecker,
    bookings: BookingStateManager,
    store: LocalStore,
    calendar: Calendar,
    user: RwLock<Option<AuthUser>>,
    venues: RwLock<Vec<Venue>>,
    current_venue: RwLock<Option<Venue>>,
}

impl AppState {
    pub fn new(
        service: Arc<dyn BookingService>,
        auth: Arc<dyn AuthService>,
        store: LocalStore,
        calendar: Calendar,
    ) -> Self {
        Self {
            checker: AvailabilityChecker::new(service.clone(), calendar),
            bookings: BookingStateManager::new(service.clone(), store.clone(), calendar),
            store,
            service,
            auth,
            calendar,
            user: RwLock::new(None),
            venues: RwLock::new(Vec::new()),
            current_venue: RwLock::new(None),
        }
    }

    /// HTTP client + sqlite-backed local store, as configured.
    pub async fn from_config(cfg: &AppConfig) -> Result<Self, AppError> {
        let http = Arc::new(HttpBookingService::from_config(cfg)?);

        let db = Db::connect(&cfg.database_url).await?;
        db.migrate().await?;
        let store = LocalStore::new(Arc::new(SqlxKeyValueStore::new(db.pool.clone())));

        Ok(Self::new(http.clone(), http, store, cfg.calendar))
    }

    pub fn calendar(&self) -> Calendar {
        self.calendar
    }

    pub fn checker(&self) -> &AvailabilityChecker {
        &self.checker
    }

    pub fn bookings(&self) -> &BookingStateManager {
        &self.bookings
    }

    pub fn current_user(&self) -> Option<AuthUser> {
        self.user.read().clone()
    }

    pub fn current_venue(&self) -> Option<Venue> {
        self.current_venue.read().clone()
    }

    /* =========================
    Session
    ========================= */

    /// Re-establishes a session from `token`, or from the token saved on
    /// this device when none is given. Without either the signed-out view is
    /// restored. A token the server rejects counts as signed out and is
    /// forgotten.
    pub async fn restore_session(
        &self,
        token: Option<String>,
    ) -> Result<Option<AuthUser>, AppError> {
        let token = match token {
            Some(t) => Some(t),
            None => self.store.get(&ScopeKey::AuthToken).await,
        };
        let Some(token) = token else {
            self.bookings.on_auth_change(None).await;
            return Ok(None);
        };

        self.auth.set_token(Some(token.clone()));
        match self.auth.current_user().await {
            Ok(user) => {
                self.remember_token(&token).await;
                self.signed_in(user.clone()).await;
                Ok(Some(user))
            }
            Err(RemoteError::Unauthorized) => {
                warn!("stored session rejected; continuing signed out");
                self.forget_token().await;
                self.signed_out().await;
                Ok(None)
            }
            Err(e) => {
                warn!(error = %e, "session could not be verified");
                self.signed_out().await;
                Err(e.into())
            }
        }
    }

    #[instrument(skip(self, password), target = "app")]
    pub async fn login(&self, email: &str, password: &str) -> Result<AuthSession, AppError> {
        require("Email", email)?;
        require("Password", password)?;

        let session = self.auth.login(email.trim(), password).await?;
        self.auth.set_token(Some(session.token.clone()));
        self.remember_token(&session.token).await;
        self.signed_in(session.user.clone()).await;
        Ok(session)
    }

    #[instrument(skip_all, target = "app")]
    pub async fn register(&self, form: &RegistrationForm) -> Result<AuthSession, AppError> {
        let new_user = form.validate()?;

        let session = self.auth.register(&new_user).await?;
        self.auth.set_token(Some(session.token.clone()));
        self.remember_token(&session.token).await;
        self.signed_in(session.user.clone()).await;
        Ok(session)
    }

    pub async fn logout(&self) {
        self.forget_token().await;
        self.signed_out().await;
        info!("signed out");
    }

    async fn remember_token(&self, token: &str) {
        if let Err(e) = self.store.set(&ScopeKey::AuthToken, token).await {
            warn!(error = ?e, "failed to save session token");
        }
    }

    async fn forget_token(&self) {
        if let Err(e) = self.store.remove(&ScopeKey::AuthToken).await {
            warn!(error = ?e, "failed to remove session token");
        }
    }

    async fn signed_in(&self, user: AuthUser) {
        *self.user.write() = Some(user.clone());
        self.bookings.on_auth_change(Some(&user)).await;
    }

    async fn signed_out(&self) {
        self.auth.set_token(None);
        *self.user.write() = None;
        self.bookings.clear();
        self.bookings.on_auth_change(None).await;
    }

    /* =========================
    Venues
    ========================= */

    pub async fn load_venues(&self, filter: &VenueFilter) -> Result<Vec<Venue>, AppError> {
        let venues = self.service.list_venues().await?;
        let matching = filter.apply(&venues);
        *self.venues.write() = venues;
        Ok(matching)
    }

    /// Loads a venue and makes it the current venue. An unknown id is
    /// `VenueNotLoaded`.
    pub async fn load_venue(&self, venue_id: &VenueId) -> Result<Venue, AppError> {
        let venue = match self.service.venue(venue_id).await {
            Ok(v) => v,
            Err(RemoteError::NotFound(_)) => return Err(AppError::VenueNotLoaded(venue_id.clone())),
            Err(e) => return Err(e.into()),
        };
        *self.current_venue.write() = Some(venue.clone());
        Ok(venue)
    }

    /// Starts a booking flow, reusing an already loaded venue when possible.
    pub async fn start_booking(&self, venue_id: &VenueId) -> Result<BookingFlow, AppError> {
        let known = self
            .current_venue()
            .filter(|v| &v.id == venue_id)
            .or_else(|| self.venues.read().iter().find(|v| &v.id == venue_id).cloned());

        let venue = match known {
            Some(v) => {
                *self.current_venue.write() = Some(v.clone());
                v
            }
            None => self.load_venue(venue_id).await?,
        };

        Ok(BookingFlow::new(venue, self.current_user().as_ref()))
    }

    /* =========================
    Bookings
    ========================= */

    /// Submits the flow and, on success only, records the booking locally.
    pub async fn submit_booking(&self, flow: &mut BookingFlow) -> Result<Booking, AppError> {
        let trace = TraceId::generate();
        let span = root_span("submit_booking", &trace);
        let user = self.current_user();

        async {
            annotate_span(
                user.as_ref().map(|u| u.id.as_str()),
                Some(flow.venue().id.as_str()),
            );

            let booking = flow
                .submit(self.service.as_ref(), &self.checker, user.as_ref())
                .await?;

            if let Err(e) = self.bookings.add_or_update(booking.clone()).await {
                warn!(error = %e, booking_id = %booking.id, "booking created but not recorded locally");
            }
            self.bookings.remember_last_booking(&booking).await;
            Ok::<_, AppError>(booking)
        }
        .instrument(span)
        .await
    }

    /// Cancels on the server for signed-in users, then locally regardless of
    /// the server's answer. The last user's cache shown after logout is
    /// read-only.
    #[instrument(skip(self), target = "app", fields(booking_id = %booking_id))]
    pub async fn cancel_booking(&self, booking_id: &BookingId) -> Result<RemoteSync, AppError> {
        if self.bookings.is_read_only() {
            return Err(StateError::ReadOnlyScope.into());
        }

        let sync = if self.current_user().is_some() {
            match self.service.cancel_booking(booking_id).await {
                Ok(()) => RemoteSync::Synced,
                Err(e) => {
                    warn!(error = %e, "remote cancel failed; cancelling locally");
                    RemoteSync::Failed(e.user_message())
                }
            }
        } else {
            RemoteSync::Skipped
        };

        self.bookings.cancel(booking_id).await?;
        Ok(sync)
    }

    /// Moves a known booking to `new_date` once the venue is free that day.
    #[instrument(skip(self), target = "app", fields(booking_id = %booking_id, date = %new_date))]
    pub async fn reschedule_booking(
        &self,
        booking_id: &BookingId,
        new_date: NaiveDate,
    ) -> Result<(), AppError> {
        if self.bookings.is_read_only() {
            return Err(StateError::ReadOnlyScope.into());
        }
        if new_date < self.calendar.today() {
            return Err(ValidationError::DateInPast.into());
        }

        let booking = self
            .bookings
            .find(booking_id)
            .or_else(|| self.bookings.current_booking().filter(|b| &b.id == booking_id))
            .ok_or_else(|| AppError::BookingNotFound(booking_id.clone()))?;

        let verdict = self.checker.check(&booking.venue_id, new_date).await;
        if !verdict.available {
            return Err(AppError::DateUnavailable {
                date: new_date,
                reason: verdict
                    .reason
                    .unwrap_or_else(|| crate::flow::DATE_UNAVAILABLE_MESSAGE.to_string()),
            });
        }

        self.bookings.reschedule(booking_id, new_date).await?;
        Ok(())
    }

    pub async fn refresh_bookings(&self) -> Result<usize, AppError> {
        Ok(self.bookings.refresh_from_remote().await?)
    }
}
