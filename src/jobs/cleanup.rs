//! Background job: prune login records past the retention window.
//!
//! Runs once at startup and then hourly. Token records are untouched;
//! they expire by timestamp and are removed only by revocation.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::time;

use crate::models::clock::Clock;
use crate::store::sqlite::SqliteStore;
use crate::store::StoreError;

/// Spawn the background cleanup task. Call this once at startup.
pub fn spawn(store: SqliteStore, clock: Arc<dyn Clock>, retention: chrono::Duration) {
    tokio::spawn(async move {
        let mut interval = time::interval(Duration::from_secs(3600)); // every hour
        loop {
            interval.tick().await;
            if let Err(e) = prune_once(&store, clock.now(), retention).await {
                tracing::error!("login cleanup job failed: {}", e);
            }
        }
    });
}

/// Delete login records older than `now - retention`.
pub async fn prune_once(
    store: &SqliteStore,
    now: DateTime<Utc>,
    retention: chrono::Duration,
) -> Result<u64, StoreError> {
    let cutoff = now
        .checked_sub_signed(retention)
        .ok_or(StoreError::TimeOutOfRange)?;
    let removed = store.prune_logins(cutoff).await?;
    if removed > 0 {
        tracing::info!(rows = removed, "pruned expired login records");
    }
    Ok(removed)
}
