use std::sync::Arc;
use std::sync::atomic::Ordering;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::Semaphore;
use tokio::test;

use booking::calendar::Calendar;
use booking::model::{Booking, BookingId, BookingStatus, UserId};
use booking::persistence::{InMemoryKeyValueStore, KeyValueStore, LocalStore, ScopeKey};
use booking::state::{BookingStateManager, ScopeIdentity, StateError};

use mock_service::{MockBookingService, booking, future_day, user};

fn utc() -> Calendar {
    Calendar::from_offset_minutes(0).unwrap()
}

fn manager(service: Arc<MockBookingService>, store: LocalStore) -> BookingStateManager {
    BookingStateManager::new(service, store, utc())
}

async fn seed(store: &LocalStore, uid: &str, bookings: &[Booking]) {
    store
        .set(&ScopeKey::Bookings(UserId::new(uid)), bookings)
        .await
        .unwrap();
}

/// In-memory backend whose reads can be held until released.
#[derive(Default)]
struct GatedStore {
    inner: InMemoryKeyValueStore,
    gate: Mutex<Option<Arc<Semaphore>>>,
}

impl GatedStore {
    fn close(&self) -> Arc<Semaphore> {
        let sem = Arc::new(Semaphore::new(0));
        *self.gate.lock() = Some(sem.clone());
        sem
    }
}

#[async_trait]
impl KeyValueStore for GatedStore {
    async fn get_raw(&self, key: &str) -> anyhow::Result<Option<String>> {
        let gate = self.gate.lock().clone();
        if let Some(sem) = gate {
            let _permit = sem.acquire().await?;
        }
        self.inner.get_raw(key).await
    }

    async fn set_raw(&self, key: &str, value: &str) -> anyhow::Result<()> {
        self.inner.set_raw(key, value).await
    }

    async fn remove(&self, key: &str) -> anyhow::Result<()> {
        self.inner.remove(key).await
    }
}

/* =========================
Mutations
========================= */

#[test]
async fn add_or_update_keeps_exactly_one_entry_per_id() {
    let mgr = manager(MockBookingService::new(), LocalStore::in_memory());
    mgr.switch_scope(Some(ScopeIdentity::verified(UserId::new("u1"))))
        .await;

    let mut b = booking("b1", "v1", future_day(1));
    mgr.add_or_update(b.clone()).await.unwrap();

    b.guest_count = 120;
    mgr.add_or_update(b.clone()).await.unwrap();

    let matching: Vec<Booking> = mgr
        .bookings()
        .into_iter()
        .filter(|x| x.id == b.id)
        .collect();
    assert_eq!(matching, vec![b.clone()]);
    assert_eq!(mgr.current_booking(), Some(b));
}

#[test]
async fn cancel_is_idempotent() {
    let store = LocalStore::in_memory();
    let mgr = manager(MockBookingService::new(), store.clone());
    mgr.switch_scope(Some(ScopeIdentity::verified(UserId::new("u1"))))
        .await;

    mgr.add_or_update(booking("b1", "v1", future_day(1))).await.unwrap();
    mgr.add_or_update(booking("b2", "v1", future_day(2))).await.unwrap();

    let id = BookingId::new("b1");
    assert!(mgr.cancel(&id).await.unwrap());
    let once = (mgr.bookings(), mgr.current_booking());

    assert!(mgr.cancel(&id).await.unwrap());
    let twice = (mgr.bookings(), mgr.current_booking());

    assert_eq!(once, twice);
    assert!(mgr.find(&id).unwrap().is_cancelled());
    assert_eq!(mgr.confirmed_count(), 1);

    let persisted: Vec<Booking> = store
        .get(&ScopeKey::Bookings(UserId::new("u1")))
        .await
        .unwrap();
    assert_eq!(persisted, twice.0);
}

#[test]
async fn cancel_mirrors_onto_current_booking() {
    let mgr = manager(MockBookingService::new(), LocalStore::in_memory());
    mgr.switch_scope(Some(ScopeIdentity::verified(UserId::new("u1"))))
        .await;
    mgr.add_or_update(booking("b1", "v1", future_day(1))).await.unwrap();

    mgr.cancel(&BookingId::new("b1")).await.unwrap();

    assert_eq!(
        mgr.current_booking().map(|b| b.status),
        Some(BookingStatus::Cancelled)
    );
}

#[test]
async fn cancel_of_unknown_id_changes_nothing() {
    let mgr = manager(MockBookingService::new(), LocalStore::in_memory());
    mgr.switch_scope(Some(ScopeIdentity::verified(UserId::new("u1"))))
        .await;
    mgr.add_or_update(booking("b1", "v1", future_day(1))).await.unwrap();
    let before = mgr.bookings();

    assert!(!mgr.cancel(&BookingId::new("missing")).await.unwrap());
    assert_eq!(mgr.bookings(), before);
}

#[test]
async fn reschedule_failure_leaves_state_untouched() {
    let service = MockBookingService::new();
    service.fail_reschedule.store(true, Ordering::SeqCst);
    let mgr = manager(service.clone(), LocalStore::in_memory());

    mgr.switch_scope(Some(ScopeIdentity::verified(UserId::new("u1"))))
        .await;
    mgr.add_or_update(booking("b1", "v1", future_day(1))).await.unwrap();
    let before = (mgr.bookings(), mgr.current_booking());

    let res = mgr.reschedule(&BookingId::new("b1"), future_day(5)).await;

    assert!(res.is_err());
    assert_eq!((mgr.bookings(), mgr.current_booking()), before);
}

#[test]
async fn reschedule_for_verified_user_goes_to_server_first() {
    let service = MockBookingService::new();
    let mgr = manager(service.clone(), LocalStore::in_memory());
    mgr.switch_scope(Some(ScopeIdentity::verified(UserId::new("u1"))))
        .await;

    let mut b = booking("b1", "v1", future_day(1));
    b.status = BookingStatus::Cancelled;
    mgr.add_or_update(b).await.unwrap();

    mgr.reschedule(&BookingId::new("b1"), future_day(7))
        .await
        .unwrap();

    assert_eq!(
        *service.rescheduled.lock(),
        vec![(BookingId::new("b1"), future_day(7))]
    );
    let moved = mgr.find(&BookingId::new("b1")).unwrap();
    assert_eq!(moved.date, future_day(7));
    assert_eq!(moved.status, BookingStatus::Confirmed);
    assert_eq!(mgr.current_booking(), Some(moved));
}

#[test]
async fn guest_reschedule_is_local_only() {
    let service = MockBookingService::new();
    service.fail_reschedule.store(true, Ordering::SeqCst);
    let mgr = manager(service.clone(), LocalStore::in_memory());
    mgr.add_or_update(booking("b1", "v1", future_day(1))).await.unwrap();

    mgr.reschedule(&BookingId::new("b1"), future_day(3))
        .await
        .unwrap();

    assert!(service.rescheduled.lock().is_empty());
    assert_eq!(mgr.find(&BookingId::new("b1")).unwrap().date, future_day(3));
}

#[test]
async fn last_users_cache_is_read_only() {
    let service = MockBookingService::new();
    let store = LocalStore::in_memory();
    seed(&store, "u1", &[booking("b1", "v1", future_day(1))]).await;
    let mgr = manager(service.clone(), store.clone());
    mgr.switch_scope(Some(ScopeIdentity::cached(UserId::new("u1"))))
        .await;
    assert!(mgr.is_read_only());

    let id = BookingId::new("b1");
    assert!(matches!(
        mgr.cancel(&id).await,
        Err(StateError::ReadOnlyScope)
    ));
    assert!(matches!(
        mgr.reschedule(&id, future_day(4)).await,
        Err(StateError::ReadOnlyScope)
    ));
    assert!(service.rescheduled.lock().is_empty());

    let persisted: Vec<Booking> = store
        .get(&ScopeKey::Bookings(UserId::new("u1")))
        .await
        .unwrap();
    assert_eq!(persisted[0].status, BookingStatus::Confirmed);
    assert_eq!(persisted[0].date, future_day(1));
}

#[test]
async fn booking_while_signed_out_detaches_from_last_users_cache() {
    let store = LocalStore::in_memory();
    seed(&store, "u1", &[booking("b1", "v1", future_day(1))]).await;
    let mgr = manager(MockBookingService::new(), store.clone());
    mgr.switch_scope(Some(ScopeIdentity::cached(UserId::new("u1"))))
        .await;

    mgr.add_or_update(booking("guest", "v2", future_day(2)))
        .await
        .unwrap();

    assert_eq!(mgr.active_scope(), None);
    let ids: Vec<BookingId> = mgr.bookings().into_iter().map(|b| b.id).collect();
    assert_eq!(ids, vec![BookingId::new("guest")]);

    let persisted: Vec<Booking> = store
        .get(&ScopeKey::Bookings(UserId::new("u1")))
        .await
        .unwrap();
    let persisted: Vec<BookingId> = persisted.into_iter().map(|b| b.id).collect();
    assert_eq!(persisted, vec![BookingId::new("b1")]);
}

#[test]
async fn mutations_write_through_under_active_scope() {
    let store = LocalStore::in_memory();
    let mgr = manager(MockBookingService::new(), store.clone());
    mgr.switch_scope(Some(ScopeIdentity::verified(UserId::new("u1"))))
        .await;

    let b = booking("b1", "v1", future_day(1));
    mgr.add_or_update(b.clone()).await.unwrap();

    let list: Option<Vec<Booking>> = store.get(&ScopeKey::Bookings(UserId::new("u1"))).await;
    let current: Option<Booking> = store
        .get(&ScopeKey::CurrentBooking(UserId::new("u1")))
        .await;
    assert_eq!(list, Some(vec![b.clone()]));
    assert_eq!(current, Some(b));
}

#[test]
async fn mutations_without_scope_stay_in_memory() {
    let backend = Arc::new(InMemoryKeyValueStore::default());
    let mgr = manager(MockBookingService::new(), LocalStore::new(backend.clone()));

    mgr.add_or_update(booking("b1", "v1", future_day(1))).await.unwrap();

    assert_eq!(mgr.bookings().len(), 1);
    assert!(backend.is_empty());
}

/* =========================
Scopes
========================= */

#[test]
async fn switching_scope_replaces_previous_users_bookings() {
    let store = LocalStore::in_memory();
    seed(&store, "u1", &[booking("a1", "v1", future_day(1))]).await;
    seed(&store, "u2", &[booking("b1", "v2", future_day(2))]).await;
    let mgr = manager(MockBookingService::new(), store);

    mgr.switch_scope(Some(ScopeIdentity::cached(UserId::new("u1"))))
        .await;
    assert_eq!(mgr.bookings()[0].id, BookingId::new("a1"));

    mgr.switch_scope(Some(ScopeIdentity::cached(UserId::new("u2"))))
        .await;
    let ids: Vec<BookingId> = mgr.bookings().into_iter().map(|b| b.id).collect();
    assert_eq!(ids, vec![BookingId::new("b1")]);
}

#[tokio::test(flavor = "current_thread")]
async fn scope_switch_clears_memory_before_cache_loads() {
    let backend = Arc::new(GatedStore::default());
    let store = LocalStore::new(backend.clone());
    seed(&store, "u1", &[booking("a1", "v1", future_day(1))]).await;
    seed(&store, "u2", &[booking("b1", "v2", future_day(2))]).await;

    let mgr = Arc::new(manager(MockBookingService::new(), store));
    mgr.switch_scope(Some(ScopeIdentity::cached(UserId::new("u1"))))
        .await;
    assert_eq!(mgr.bookings().len(), 1);

    let gate = backend.close();
    let u2 = ScopeIdentity::cached(UserId::new("u2"));
    let task = {
        let mgr = mgr.clone();
        let u2 = u2.clone();
        tokio::spawn(async move { mgr.switch_scope(Some(u2)).await })
    };

    while mgr.active_scope() != Some(u2.clone()) {
        tokio::task::yield_now().await;
    }
    assert!(mgr.bookings().is_empty());
    assert!(mgr.current_booking().is_none());

    gate.add_permits(1);
    task.await.unwrap();

    assert_eq!(mgr.bookings()[0].id, BookingId::new("b1"));
}

#[tokio::test(flavor = "current_thread")]
async fn mutation_during_scope_load_cannot_overwrite_new_scope() {
    let backend = Arc::new(GatedStore::default());
    let store = LocalStore::new(backend.clone());
    seed(&store, "u2", &[booking("b1", "v2", future_day(2))]).await;

    let mgr = Arc::new(manager(MockBookingService::new(), store.clone()));
    mgr.switch_scope(Some(ScopeIdentity::verified(UserId::new("u1"))))
        .await;

    let gate = backend.close();
    let u2 = ScopeIdentity::verified(UserId::new("u2"));
    let task = {
        let mgr = mgr.clone();
        let u2 = u2.clone();
        tokio::spawn(async move { mgr.switch_scope(Some(u2)).await })
    };

    while mgr.active_scope() != Some(u2.clone()) {
        tokio::task::yield_now().await;
    }

    let late = mgr.add_or_update(booking("late", "v1", future_day(3))).await;
    assert!(matches!(late, Err(StateError::ScopeChanging)));

    gate.add_permits(1);
    task.await.unwrap();

    let ids: Vec<BookingId> = mgr.bookings().into_iter().map(|b| b.id).collect();
    assert_eq!(ids, vec![BookingId::new("b1")]);

    let persisted: Vec<Booking> = store
        .get(&ScopeKey::Bookings(UserId::new("u2")))
        .await
        .unwrap();
    let persisted: Vec<BookingId> = persisted.into_iter().map(|b| b.id).collect();
    assert_eq!(persisted, vec![BookingId::new("b1")]);
}

#[test]
async fn logout_falls_back_to_last_users_cache() {
    let store = LocalStore::in_memory();
    let mgr = manager(MockBookingService::new(), store.clone());
    let u1 = user("u1");

    mgr.on_auth_change(Some(&u1)).await;
    mgr.add_or_update(booking("b1", "v1", future_day(1))).await.unwrap();

    let last: Option<UserId> = store.get(&ScopeKey::LastUserId).await;
    assert_eq!(last, Some(u1.id.clone()));

    mgr.clear();
    assert!(mgr.bookings().is_empty());

    mgr.on_auth_change(None).await;

    assert_eq!(mgr.active_scope(), Some(ScopeIdentity::cached(u1.id.clone())));
    assert_eq!(mgr.bookings().len(), 1);
    assert_eq!(mgr.bookings()[0].id, BookingId::new("b1"));
}

#[test]
async fn logout_without_history_has_no_scope() {
    let mgr = manager(MockBookingService::new(), LocalStore::in_memory());

    mgr.on_auth_change(None).await;

    assert_eq!(mgr.active_scope(), None);
    assert!(mgr.bookings().is_empty());
}

/* =========================
Remote reconciliation
========================= */

#[test]
async fn remote_list_overwrites_cache_for_verified_user() {
    let service = MockBookingService::new();
    *service.remote_bookings.lock() = vec![
        booking("r1", "v1", future_day(3)),
        booking("r2", "v2", future_day(4)),
    ];
    let store = LocalStore::in_memory();
    seed(&store, "u1", &[booking("stale", "v1", future_day(1))]).await;
    let mgr = manager(service, store.clone());

    mgr.on_auth_change(Some(&user("u1"))).await;

    let ids: Vec<BookingId> = mgr.bookings().into_iter().map(|b| b.id).collect();
    assert_eq!(ids, vec![BookingId::new("r1"), BookingId::new("r2")]);

    let persisted: Vec<Booking> = store
        .get(&ScopeKey::Bookings(UserId::new("u1")))
        .await
        .unwrap();
    assert_eq!(persisted.len(), 2);
}

#[test]
async fn empty_remote_list_keeps_cache() {
    let store = LocalStore::in_memory();
    seed(&store, "u1", &[booking("cached", "v1", future_day(1))]).await;
    let mgr = manager(MockBookingService::new(), store);

    mgr.on_auth_change(Some(&user("u1"))).await;

    assert_eq!(mgr.bookings()[0].id, BookingId::new("cached"));
    assert_eq!(mgr.refresh_from_remote().await.unwrap(), 0);
}

#[test]
async fn remote_failure_keeps_cached_view() {
    let service = MockBookingService::new();
    service.fail_user_bookings.store(true, Ordering::SeqCst);
    let store = LocalStore::in_memory();
    seed(&store, "u1", &[booking("cached", "v1", future_day(1))]).await;
    let mgr = manager(service, store);

    mgr.on_auth_change(Some(&user("u1"))).await;

    assert_eq!(mgr.bookings().len(), 1);
    assert!(mgr.refresh_from_remote().await.is_err());
    assert_eq!(mgr.bookings().len(), 1);
}

#[test]
async fn unverified_scope_never_asks_the_server() {
    let service = MockBookingService::new();
    *service.remote_bookings.lock() = vec![booking("r1", "v1", future_day(3))];
    let store = LocalStore::in_memory();
    seed(&store, "u1", &[booking("cached", "v1", future_day(1))]).await;
    let mgr = manager(service, store);

    mgr.switch_scope(Some(ScopeIdentity::cached(UserId::new("u1"))))
        .await;

    assert_eq!(mgr.refresh_from_remote().await.unwrap(), 0);
    assert_eq!(mgr.bookings()[0].id, BookingId::new("cached"));
}

#[tokio::test(flavor = "current_thread")]
async fn remote_answer_for_superseded_scope_is_dropped() {
    let service = MockBookingService::new();
    *service.remote_bookings.lock() = vec![booking("u1-remote", "v1", future_day(3))];
    let gate = service.hold_user_bookings();

    let store = LocalStore::in_memory();
    seed(&store, "u2", &[booking("u2-cached", "v2", future_day(2))]).await;
    let mgr = Arc::new(manager(service.clone(), store.clone()));

    let task = {
        let mgr = mgr.clone();
        tokio::spawn(async move {
            mgr.switch_scope(Some(ScopeIdentity::verified(UserId::new("u1"))))
                .await
        })
    };

    while service.user_bookings_calls.load(Ordering::SeqCst) == 0 {
        tokio::task::yield_now().await;
    }

    mgr.switch_scope(Some(ScopeIdentity::cached(UserId::new("u2"))))
        .await;
    gate.notify_one();
    task.await.unwrap();

    let ids: Vec<BookingId> = mgr.bookings().into_iter().map(|b| b.id).collect();
    assert_eq!(ids, vec![BookingId::new("u2-cached")]);

    let u1_cache: Option<Vec<Booking>> = store.get(&ScopeKey::Bookings(UserId::new("u1"))).await;
    assert_eq!(u1_cache, None);
}

/* =========================
Confirmation fallback
========================= */

#[test]
async fn confirmation_falls_back_to_last_booking() {
    let store = LocalStore::in_memory();
    let b = booking("b9", "v1", future_day(9));

    let first = manager(MockBookingService::new(), store.clone());
    first.remember_last_booking(&b).await;

    let fresh = manager(MockBookingService::new(), store);
    assert_eq!(fresh.current_booking(), None);
    assert_eq!(fresh.confirmation_booking().await, Some(b));
}
