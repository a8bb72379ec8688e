//! Durable state synchronization
//!
//! Keeps the in-memory inspection state and the local SQLite store in step:
//! a background saver subscribes to the event bus, coalesces bursts of
//! state-changing events, and writes one snapshot per quiet window, so a
//! stale write can never overwrite a newer one. Restore runs the other way
//! on startup. Persistence failure degrades the app (ratings continue in
//! memory) instead of breaking it.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tracing::{debug, info, warn};

use trestle_common::db::SnapshotStore;
use trestle_common::events::TrestleEvent;

use crate::error::Result;
use crate::state::SharedState;

/// Whether an event means the persisted snapshot is out of date
fn is_state_changing(event: &TrestleEvent) -> bool {
    matches!(
        event,
        TrestleEvent::StructureLoaded { .. }
            | TrestleEvent::NavigationChanged { .. }
            | TrestleEvent::ElementSelected { .. }
            | TrestleEvent::RatingApplied { .. }
            | TrestleEvent::MaintenanceActionRecorded { .. }
    )
}

/// Background debounced snapshot writer.
///
/// Aborted on drop; pending unsaved changes are lost with it, which is why
/// submission takes its own snapshot before sending.
pub struct SnapshotSaver {
    handle: JoinHandle<()>,
}

impl SnapshotSaver {
    /// Spawn the saver, writing at most one snapshot per `quiet` window
    pub fn spawn(shared: Arc<SharedState>, store: SnapshotStore, quiet: Duration) -> Self {
        let mut rx = shared.events().subscribe();
        let handle = tokio::spawn(async move {
            loop {
                // Block until something makes the snapshot stale
                let event = match rx.recv().await {
                    Ok(event) => event,
                    Err(RecvError::Lagged(skipped)) => {
                        debug!(skipped, "Saver lagged behind event bus, treating as dirty");
                        TrestleEvent::NavigationChanged {
                            depth: 0,
                            timestamp: trestle_common::time::now(),
                        }
                    }
                    Err(RecvError::Closed) => break,
                };
                if !is_state_changing(&event) {
                    continue;
                }

                // Coalesce the burst: keep absorbing events until the bus
                // goes quiet. A completed submission cancels the pending
                // write, otherwise the saver would resurrect the snapshot
                // it just cleared.
                let mut cancelled = false;
                loop {
                    match timeout(quiet, rx.recv()).await {
                        Ok(Ok(TrestleEvent::SubmissionCompleted { .. })) => {
                            cancelled = true;
                        }
                        Ok(Ok(_)) | Ok(Err(RecvError::Lagged(_))) => {}
                        Ok(Err(RecvError::Closed)) => break,
                        Err(_elapsed) => break,
                    }
                }
                if cancelled {
                    debug!("Pending snapshot write cancelled by completed submission");
                    continue;
                }

                let snapshot = shared.snapshot().await;
                match store.save(&snapshot).await {
                    Ok(()) => {
                        shared.events().emit_lossy(TrestleEvent::SnapshotSaved {
                            timestamp: trestle_common::time::now(),
                        });
                    }
                    Err(e) => {
                        warn!(error = %e, "Snapshot write failed, persistence degraded");
                        shared.events().emit_lossy(TrestleEvent::PersistenceDegraded {
                            reason: e.to_string(),
                            timestamp: trestle_common::time::now(),
                        });
                    }
                }
            }
        });
        Self { handle }
    }
}

impl Drop for SnapshotSaver {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

/// Write the current state immediately, bypassing the debounce window.
///
/// Used at hard save points (leaving the app, before submission).
pub async fn save_now(shared: &SharedState, store: &SnapshotStore) -> Result<()> {
    let snapshot = shared.snapshot().await;
    store.save(&snapshot).await.map_err(|e| {
        warn!(error = %e, "Immediate snapshot write failed");
        shared.events().emit_lossy(TrestleEvent::PersistenceDegraded {
            reason: e.to_string(),
            timestamp: trestle_common::time::now(),
        });
        crate::error::Error::Persistence(e.to_string())
    })?;
    shared.events().emit_lossy(TrestleEvent::SnapshotSaved {
        timestamp: trestle_common::time::now(),
    });
    Ok(())
}

/// Restore a prior session from the durable store, if one exists.
///
/// Returns whether a session was restored. A missing snapshot is the
/// normal fresh-start case, not an error.
pub async fn restore_session(shared: &SharedState, store: &SnapshotStore) -> Result<bool> {
    match store.load().await {
        Ok(Some(snapshot)) => {
            shared.restore(snapshot).await;
            Ok(true)
        }
        Ok(None) => {
            info!("No prior session snapshot, starting fresh");
            Ok(false)
        }
        Err(e) => {
            warn!(error = %e, "Session restore failed");
            Err(crate::error::Error::Persistence(e.to_string()))
        }
    }
}
