pub mod memory;
pub mod sqlx_store;

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::{debug, instrument, warn};

use crate::logger::warn_if_slow;
use crate::model::UserId;

pub use memory::InMemoryKeyValueStore;
pub use sqlx_store::SqlxKeyValueStore;

/// Raw string key-value storage that survives restarts.
///
/// Writes are last-write-wins; there are no transactions.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    async fn get_raw(&self, key: &str) -> Result<Option<String>>;

    async fn set_raw(&self, key: &str, value: &str) -> Result<()>;

    async fn remove(&self, key: &str) -> Result<()>;
}

/// Logical keys of the locally persisted booking state.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum ScopeKey {
    /// Cached booking list of one user.
    Bookings(UserId),
    /// Current booking pointer of one user.
    CurrentBooking(UserId),
    /// Last user that was signed in; survives logout.
    LastUserId,
    /// Last created booking, independent of scope.
    LastBooking,
    /// Session token of the signed-in user.
    AuthToken,
}

impl fmt::Display for ScopeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScopeKey::Bookings(uid) => write!(f, "bookings:{uid}"),
            ScopeKey::CurrentBooking(uid) => write!(f, "currentBooking:{uid}"),
            ScopeKey::LastUserId => f.write_str("lastUserId"),
            ScopeKey::LastBooking => f.write_str("lastBooking"),
            ScopeKey::AuthToken => f.write_str("authToken"),
        }
    }
}

/// Typed JSON view over a `KeyValueStore`.
///
/// Reads never fail: a missing, unreadable or malformed value is reported as
/// absent and logged, so a corrupt cache cannot take the caller down.
#[derive(Clone)]
pub struct LocalStore {
    backend: Arc<dyn KeyValueStore>,
}

impl LocalStore {
    pub fn new(backend: Arc<dyn KeyValueStore>) -> Self {
        Self { backend }
    }

    pub fn in_memory() -> Self {
        Self::new(Arc::new(InMemoryKeyValueStore::default()))
    }

    #[instrument(skip_all, target = "store", fields(key = %key))]
    pub async fn get<T: DeserializeOwned>(&self, key: &ScopeKey) -> Option<T> {
        let raw = warn_if_slow("kv_get", Duration::from_millis(50), async {
            self.backend.get_raw(&key.to_string()).await
        })
        .await;

        let raw = match raw {
            Ok(Some(raw)) => raw,
            Ok(None) => return None,
            Err(e) => {
                warn!(error = ?e, "local read failed; treating value as absent");
                return None;
            }
        };

        match serde_json::from_str(&raw) {
            Ok(v) => Some(v),
            Err(e) => {
                warn!(error = %e, "discarding malformed local value");
                None
            }
        }
    }

    #[instrument(skip_all, target = "store", fields(key = %key))]
    pub async fn set<T: Serialize + ?Sized>(&self, key: &ScopeKey, value: &T) -> Result<()> {
        let raw = serde_json::to_string(value).context("failed to serialize local value")?;

        warn_if_slow("kv_set", Duration::from_millis(50), async {
            self.backend.set_raw(&key.to_string(), &raw).await
        })
        .await
        .with_context(|| format!("failed to write {key}"))?;

        debug!(bytes = raw.len(), "local value written");
        Ok(())
    }

    #[instrument(skip_all, target = "store", fields(key = %key))]
    pub async fn remove(&self, key: &ScopeKey) -> Result<()> {
        self.backend
            .remove(&key.to_string())
            .await
            .with_context(|| format!("failed to remove {key}"))
    }
}
