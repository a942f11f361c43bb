use std::sync::Arc;
use std::time::Duration;

use chrono::NaiveDate;
use parking_lot::Mutex;
use tracing::{Instrument, debug, info, instrument, warn};

use crate::calendar::Calendar;
use crate::logger::{annotate_span, child_span, warn_if_slow};
use crate::model::{AuthUser, Booking, BookingId, BookingStatus, UserId};
use crate::persistence::{LocalStore, ScopeKey};
use crate::remote::{BookingService, RemoteError};

use super::errors::StateError;

/// The identity bookings are cached and reconciled under.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ScopeIdentity {
    pub user_id: UserId,
    /// True for a signed-in user whose token the server accepted. Unverified
    /// scopes (the last user after logout) are served from cache, read-only.
    pub verified: bool,
}

impl ScopeIdentity {
    pub fn verified(user_id: UserId) -> Self {
        Self {
            user_id,
            verified: true,
        }
    }

    pub fn cached(user_id: UserId) -> Self {
        Self {
            user_id,
            verified: false,
        }
    }
}

#[derive(Default)]
struct BookingState {
    scope: Option<ScopeIdentity>,
    /// Bumped on every scope change or clear; async loads and mutations
    /// admitted under an older epoch are discarded.
    epoch: u64,
    /// Set while the cache of a freshly switched scope is being read.
    hydrating: bool,
    current: Option<Booking>,
    bookings: Vec<Booking>,
}

impl BookingState {
    fn read_only(&self) -> bool {
        self.scope.as_ref().is_some_and(|s| !s.verified)
    }

    /// Epoch a mutation is admitted under.
    fn admit(&self) -> Result<u64, StateError> {
        if self.hydrating {
            return Err(StateError::ScopeChanging);
        }
        if self.read_only() {
            return Err(StateError::ReadOnlyScope);
        }
        Ok(self.epoch)
    }

    fn detach(&mut self) {
        self.bookings.clear();
        self.current = None;
        self.scope = None;
        self.hydrating = false;
        self.epoch += 1;
    }

    fn snapshot(&self) -> Snapshot {
        Snapshot {
            scope: self.scope.clone(),
            bookings: self.bookings.clone(),
            current: self.current.clone(),
        }
    }
}

struct Snapshot {
    scope: Option<ScopeIdentity>,
    bookings: Vec<Booking>,
    current: Option<Booking>,
}

/// In-memory current booking + booking list for the active scope.
///
/// Every mutation writes through to the `LocalStore` under the active scope.
/// The last user's cache, shown after logout, is read-only. The state lock
/// is never held across an `.await`.
pub struct BookingStateManager {
    service: Arc<dyn BookingService>,
    store: LocalStore,
    calendar: Calendar,
    state: Mutex<BookingState>,
    /// Serializes mutations with their write-through and with cache loads, so
    /// the latest snapshot is always written last.
    write_gate: tokio::sync::Mutex<()>,
}

impl BookingStateManager {
    pub fn new(service: Arc<dyn BookingService>, store: LocalStore, calendar: Calendar) -> Self {
        Self {
            service,
            store,
            calendar,
            state: Mutex::new(BookingState::default()),
            write_gate: tokio::sync::Mutex::new(()),
        }
    }

    pub fn active_scope(&self) -> Option<ScopeIdentity> {
        self.state.lock().scope.clone()
    }

    pub fn bookings(&self) -> Vec<Booking> {
        self.state.lock().bookings.clone()
    }

    pub fn current_booking(&self) -> Option<Booking> {
        self.state.lock().current.clone()
    }

    pub fn find(&self, booking_id: &BookingId) -> Option<Booking> {
        self.state
            .lock()
            .bookings
            .iter()
            .find(|b| &b.id == booking_id)
            .cloned()
    }

    pub fn confirmed_count(&self) -> usize {
        self.state
            .lock()
            .bookings
            .iter()
            .filter(|b| b.status == BookingStatus::Confirmed)
            .count()
    }

    /// True while the last user's cache is shown after logout.
    pub fn is_read_only(&self) -> bool {
        self.state.lock().read_only()
    }

    /* =========================
    Scope reconciliation
    ========================= */

    /// Follows sign-in state: a signed-in user becomes a verified scope and is
    /// remembered as the last user; after logout the last user's cache stays
    /// readable until someone else signs in.
    pub async fn on_auth_change(&self, user: Option<&AuthUser>) {
        match user {
            Some(u) => {
                if let Err(e) = self.store.set(&ScopeKey::LastUserId, &u.id).await {
                    warn!(error = ?e, "failed to remember last user id");
                }
                self.switch_scope(Some(ScopeIdentity::verified(u.id.clone())))
                    .await;
            }
            None => {
                let last: Option<UserId> = self.store.get(&ScopeKey::LastUserId).await;
                self.switch_scope(last.map(ScopeIdentity::cached)).await;
            }
        }
    }

    /// Makes `scope` the active scope.
    ///
    /// In-memory state is discarded before anything of the new scope is
    /// loaded, then the cached list is read for immediate display, then (for
    /// verified users) the remote list overwrites it. Mutations are refused
    /// until the cached list has been applied.
    pub async fn switch_scope(&self, scope: Option<ScopeIdentity>) {
        let span = child_span("switch_scope");
        async {
            let epoch = {
                let mut s = self.state.lock();
                s.bookings.clear();
                s.current = None;
                s.scope = scope.clone();
                s.hydrating = scope.is_some();
                s.epoch += 1;
                s.epoch
            };

            let Some(scope) = scope else {
                debug!("no active scope; booking state left empty");
                return;
            };
            annotate_span(Some(scope.user_id.as_str()), None);

            let applied = {
                let _gate = self.write_gate.lock().await;

                let cached: Option<Vec<Booking>> = self
                    .store
                    .get(&ScopeKey::Bookings(scope.user_id.clone()))
                    .await;
                let current: Option<Booking> = self
                    .store
                    .get(&ScopeKey::CurrentBooking(scope.user_id.clone()))
                    .await;

                let mut s = self.state.lock();
                if s.epoch == epoch {
                    s.bookings = cached.unwrap_or_default();
                    s.current = current;
                    s.hydrating = false;
                    info!(
                        cached = s.bookings.len(),
                        verified = scope.verified,
                        "booking scope activated"
                    );
                    true
                } else {
                    false
                }
            };

            if !applied {
                debug!("scope changed while reading cache; dropping stale load");
                return;
            }

            if scope.verified {
                if let Err(e) = self.refresh_from_remote().await {
                    warn!(error = %e, "remote booking refresh failed; keeping cached view");
                }
            }
        }
        .instrument(span)
        .await
    }

    /// Replaces the list with the server's view for the active verified scope.
    ///
    /// Returns the number of bookings applied. An empty remote answer keeps the
    /// cached list; an answer that arrives after the scope changed is dropped.
    #[instrument(skip(self), target = "state")]
    pub async fn refresh_from_remote(&self) -> Result<usize, RemoteError> {
        let (epoch, scope) = {
            let s = self.state.lock();
            (s.epoch, s.scope.clone())
        };

        let Some(scope) = scope.filter(|s| s.verified) else {
            debug!("no verified scope; remote refresh skipped");
            return Ok(0);
        };

        let remote = warn_if_slow("remote_user_bookings", Duration::from_millis(500), async {
            self.service.user_bookings().await
        })
        .await?;

        if remote.is_empty() {
            info!(user_id = %scope.user_id, "server returned no bookings; keeping cached list");
            return Ok(0);
        }

        let applied = self
            .mutate(epoch, move |s| {
                let refreshed_current = s
                    .current
                    .as_ref()
                    .and_then(|cur| remote.iter().find(|b| b.id == cur.id).cloned());
                if refreshed_current.is_some() {
                    s.current = refreshed_current;
                }
                s.bookings = remote;
                s.bookings.len()
            })
            .await;

        match applied {
            Ok(count) => {
                info!(user_id = %scope.user_id, count, "bookings refreshed from server");
                Ok(count)
            }
            Err(_) => {
                debug!("scope changed during remote refresh; discarding response");
                Ok(0)
            }
        }
    }

    /* =========================
    Mutations
    ========================= */

    /// Inserts or replaces by id and makes it the current booking.
    ///
    /// A booking made while the last user's cache is shown detaches from that
    /// cache: it is kept in memory only and never lands in their history.
    #[instrument(skip(self, booking), target = "state", fields(booking_id = %booking.id))]
    pub async fn add_or_update(&self, booking: Booking) -> Result<(), StateError> {
        let epoch = {
            let mut s = self.state.lock();
            if s.read_only() && !s.hydrating {
                info!("booking made while signed out; detaching from last user's cache");
                s.detach();
            }
            s.admit()?
        };

        self.mutate(epoch, move |s| {
            match s.bookings.iter_mut().find(|b| b.id == booking.id) {
                Some(existing) => {
                    *existing = booking.clone();
                    debug!("existing booking replaced");
                }
                None => {
                    s.bookings.push(booking.clone());
                    debug!(count = s.bookings.len(), "booking appended");
                }
            }
            s.current = Some(booking);
        })
        .await
    }

    /// Marks a booking cancelled in the list and, if it is current, there too.
    ///
    /// Returns false (and changes nothing) when the id is unknown.
    #[instrument(skip(self), target = "state", fields(booking_id = %booking_id))]
    pub async fn cancel(&self, booking_id: &BookingId) -> Result<bool, StateError> {
        let epoch = self.state.lock().admit()?;

        let found = self
            .mutate(epoch, |s| {
                let mut found = false;
                if let Some(b) = s.bookings.iter_mut().find(|b| &b.id == booking_id) {
                    b.mark_cancelled();
                    found = true;
                }
                if let Some(cur) = s.current.as_mut().filter(|c| &c.id == booking_id) {
                    cur.mark_cancelled();
                    found = true;
                }
                found
            })
            .await?;

        if !found {
            debug!("cancel for unknown booking ignored");
        }
        Ok(found)
    }

    /// Moves a booking to `new_date` and resets it to confirmed.
    ///
    /// For a verified user the server must accept the change first; on remote
    /// failure the error is returned and local state is left untouched.
    /// Guests update local state only.
    #[instrument(skip(self), target = "state", fields(booking_id = %booking_id, date = %new_date))]
    pub async fn reschedule(
        &self,
        booking_id: &BookingId,
        new_date: NaiveDate,
    ) -> Result<(), StateError> {
        let (epoch, verified) = {
            let s = self.state.lock();
            (s.admit()?, s.scope.as_ref().is_some_and(|scope| scope.verified))
        };

        if verified {
            let window = self.calendar.day_window(new_date);
            self.service
                .reschedule_booking(booking_id, &window)
                .await?;
        } else {
            debug!("guest booking; rescheduling locally only");
        }

        self.mutate(epoch, |s| {
            if let Some(b) = s.bookings.iter_mut().find(|b| &b.id == booking_id) {
                b.reschedule_to(new_date);
            }
            if let Some(cur) = s.current.as_mut().filter(|c| &c.id == booking_id) {
                cur.reschedule_to(new_date);
            }
        })
        .await
    }

    /// Empties in-memory state. Persisted data is left alone so the same user
    /// finds their history again after signing back in.
    ///
    /// Also detaches the scope: nothing is written until the next
    /// `switch_scope`, so a cleared (empty) list can never overwrite the cache.
    pub fn clear(&self) {
        self.state.lock().detach();
        debug!("in-memory booking state cleared");
    }

    /* =========================
    Confirmation fallback
    ========================= */

    /// Remembers `booking` outside any scope for the confirmation view.
    pub async fn remember_last_booking(&self, booking: &Booking) {
        if let Err(e) = self.store.set(&ScopeKey::LastBooking, booking).await {
            warn!(error = ?e, "failed to store last booking");
        }
    }

    /// Booking for the confirmation view: the current booking when state is
    /// hydrated, otherwise the last booking stored on this device.
    pub async fn confirmation_booking(&self) -> Option<Booking> {
        if let Some(current) = self.current_booking() {
            return Some(current);
        }
        self.store.get(&ScopeKey::LastBooking).await
    }

    /* =========================
    Write-through
    ========================= */

    /// Applies `apply` if the scope is still the one admitted under `epoch`
    /// and persists the resulting snapshot before the gate is released.
    async fn mutate<R>(
        &self,
        epoch: u64,
        apply: impl FnOnce(&mut BookingState) -> R,
    ) -> Result<R, StateError> {
        let _gate = self.write_gate.lock().await;

        let (out, snapshot) = {
            let mut s = self.state.lock();
            if s.epoch != epoch || s.hydrating {
                debug!("scope changed before the update landed; update dropped");
                return Err(StateError::ScopeChanging);
            }
            let out = apply(&mut *s);
            (out, s.snapshot())
        };

        self.persist(snapshot).await;
        Ok(out)
    }

    async fn persist(&self, snapshot: Snapshot) {
        let Some(scope) = snapshot.scope else {
            debug!("no active scope; change kept in memory only");
            return;
        };

        let uid = scope.user_id;
        if let Err(e) = self
            .store
            .set(&ScopeKey::Bookings(uid.clone()), &snapshot.bookings)
            .await
        {
            warn!(error = ?e, user_id = %uid, "failed to persist booking list");
        }

        if let Some(current) = snapshot.current {
            if let Err(e) = self
                .store
                .set(&ScopeKey::CurrentBooking(uid.clone()), &current)
                .await
            {
                warn!(error = ?e, user_id = %uid, "failed to persist current booking");
            }
        }
    }
}
