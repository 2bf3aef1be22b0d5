//! Notification Reconciler.
//!
//! Keeps the cached notification list consistent with the backend across
//! optimistic read-state flips. Every load and every mutation bumps a
//! generation counter; a load only applies if no newer load or mutation
//! started while it was in flight.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tracing::{debug, info, warn};

use hearth_shared::models::Notification;
use hearth_shared::types::NotificationId;

use crate::backend::Backend;
use crate::error::ClientError;
use crate::events::{EventBus, UiEvent};

#[derive(Debug, Default)]
struct NotificationState {
    items: Vec<Notification>,
    generation: u64,
}

impl NotificationState {
    fn bump(&mut self) -> u64 {
        self.generation += 1;
        self.generation
    }

    fn unread(&self) -> usize {
        self.items.iter().filter(|n| !n.is_read).count()
    }

    fn set_read(&mut self, id: &NotificationId, is_read: bool) -> Option<bool> {
        let entry = self.items.iter_mut().find(|n| n.id == *id)?;
        let previous = entry.is_read;
        entry.is_read = is_read;
        Some(previous)
    }
}

#[derive(Clone)]
pub struct NotificationReconciler {
    inner: Arc<ReconcilerInner>,
}

struct ReconcilerInner {
    backend: Arc<dyn Backend>,
    events: EventBus,
    state: Mutex<NotificationState>,
}

impl NotificationReconciler {
    pub fn new(backend: Arc<dyn Backend>, events: EventBus) -> Self {
        Self {
            inner: Arc::new(ReconcilerInner {
                backend,
                events,
                state: Mutex::new(NotificationState::default()),
            }),
        }
    }

    /// Replace the list with the backend snapshot. Returns `false` when a
    /// newer load or mutation superseded this one.
    pub async fn load(&self) -> Result<bool, ClientError> {
        let generation = self.state().bump();

        let snapshot = match self.inner.backend.notifications().await {
            Ok(snapshot) => snapshot,
            Err(e) => {
                self.inner.events.emit_error("load_notifications", &e);
                return Err(e);
            }
        };

        {
            let mut state = self.state();
            if state.generation != generation {
                debug!(generation, current = state.generation, "Discarding stale notification load");
                return Ok(false);
            }
            state.items = snapshot;
        }

        self.emit_updated();
        Ok(true)
    }

    /// Flip one entry to read; reverted if the backend call fails.
    ///
    /// A revert only applies while no other load or mutation has touched the
    /// list since the flip. Otherwise the list is reloaded, since the server
    /// may already hold a newer read state for this entry.
    pub async fn mark_read(&self, id: &NotificationId) -> Result<(), ClientError> {
        let generation = {
            let mut state = self.state();
            match state.set_read(id, true) {
                Some(false) => state.bump(),
                // Unknown or already read: nothing to do.
                _ => return Ok(()),
            }
        };
        self.emit_updated();

        let Err(e) = self.inner.backend.mark_notification_read(id).await else {
            return Ok(());
        };
        self.inner.events.emit_error("mark_read", &e);

        let reverted = {
            let mut state = self.state();
            if state.generation == generation {
                state.set_read(id, false);
                state.bump();
                true
            } else {
                false
            }
        };

        if reverted {
            warn!(notification = %id, error = %e, "mark_read failed, reverting");
            self.emit_updated();
        } else {
            warn!(notification = %id, error = %e, "mark_read failed after a newer change, resynchronising");
            if let Err(reload) = self.load().await {
                warn!(error = %reload, "Resync after failed mark_read failed");
            }
        }

        Err(e)
    }

    /// Flip every entry to read with one bulk call.
    ///
    /// On failure the optimistic state is not trusted: the list is reloaded
    /// from the backend. If that reload also fails the pre-operation
    /// snapshot is restored. Either way the original error is returned.
    pub async fn mark_all_read(&self) -> Result<(), ClientError> {
        let snapshot = {
            let mut state = self.state();
            if state.unread() == 0 {
                return Ok(());
            }
            let snapshot = state.items.clone();
            for n in state.items.iter_mut() {
                n.is_read = true;
            }
            state.bump();
            snapshot
        };
        self.emit_updated();

        let Err(e) = self.inner.backend.mark_all_notifications_read().await else {
            return Ok(());
        };

        warn!(error = %e, "mark_all_read failed, resynchronising");
        self.inner.events.emit_error("mark_all_read", &e);

        match self.load().await {
            Ok(_) => info!("Notifications resynchronised after failed mark_all_read"),
            Err(reload) => {
                warn!(error = %reload, "Resync failed, restoring previous state");
                {
                    let mut state = self.state();
                    state.items = snapshot;
                    state.bump();
                }
                self.emit_updated();
            }
        }

        Err(e)
    }

    pub fn notifications(&self) -> Vec<Notification> {
        self.state().items.clone()
    }

    pub fn unread_count(&self) -> usize {
        self.state().unread()
    }

    /// Forget the cached list (sign-out). In-flight loads are orphaned.
    pub fn clear(&self) {
        let mut state = self.state();
        state.items.clear();
        state.bump();
    }

    fn state(&self) -> MutexGuard<'_, NotificationState> {
        self.inner.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn emit_updated(&self) {
        let unread = self.unread_count();
        self.inner.events.emit(UiEvent::NotificationsUpdated { unread });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use crate::testing::{notification, MockBackend};

    fn reconciler() -> (NotificationReconciler, Arc<MockBackend>) {
        let backend = MockBackend::new();
        (
            NotificationReconciler::new(backend.clone(), EventBus::default()),
            backend,
        )
    }

    fn read_flags(r: &NotificationReconciler) -> Vec<bool> {
        r.notifications().iter().map(|n| n.is_read).collect()
    }

    #[tokio::test]
    async fn test_load_replaces_list() {
        let (r, backend) = reconciler();
        *backend.notifications.lock().unwrap() =
            vec![notification("n1", false), notification("n2", true)];

        assert!(r.load().await.unwrap());
        assert_eq!(r.unread_count(), 1);

        backend.notifications.lock().unwrap().truncate(1);
        r.load().await.unwrap();
        assert_eq!(r.notifications().len(), 1);
    }

    #[tokio::test]
    async fn test_mark_read_reverts_on_failure() {
        let (r, backend) = reconciler();
        *backend.notifications.lock().unwrap() =
            vec![notification("n1", false), notification("n2", false)];
        r.load().await.unwrap();

        r.mark_read(&NotificationId("n1".into())).await.unwrap();
        assert_eq!(read_flags(&r), vec![true, false]);

        backend.fail("mark_notification_read");
        assert!(r.mark_read(&NotificationId("n2".into())).await.is_err());
        assert_eq!(read_flags(&r), vec![true, false]);

        // Already read: no backend call.
        r.mark_read(&NotificationId("n1".into())).await.unwrap();
        assert_eq!(backend.calls("mark_notification_read"), 2);
    }

    #[tokio::test]
    async fn test_mark_all_read_failure_resyncs_to_server() {
        let (r, backend) = reconciler();
        *backend.notifications.lock().unwrap() = vec![
            notification("n1", false),
            notification("n2", false),
            notification("n3", false),
        ];
        r.load().await.unwrap();

        // Server applied part of the bulk update before erroring.
        backend.notifications.lock().unwrap()[1].is_read = true;
        backend.fail("mark_all_notifications_read");

        assert!(r.mark_all_read().await.is_err());
        assert_eq!(r.notifications(), *backend.notifications.lock().unwrap());
        assert_eq!(read_flags(&r), vec![false, true, false]);
    }

    #[tokio::test]
    async fn test_failed_resync_restores_snapshot() {
        let (r, backend) = reconciler();
        *backend.notifications.lock().unwrap() =
            vec![notification("n1", false), notification("n2", true)];
        r.load().await.unwrap();

        backend.fail("mark_all_notifications_read");
        backend.fail("notifications");
        assert!(r.mark_all_read().await.is_err());
        assert_eq!(read_flags(&r), vec![false, true]);
    }

    #[tokio::test]
    async fn test_mark_all_read_success() {
        let (r, backend) = reconciler();
        *backend.notifications.lock().unwrap() =
            vec![notification("n1", false), notification("n2", false)];
        r.load().await.unwrap();

        r.mark_all_read().await.unwrap();
        assert_eq!(r.unread_count(), 0);
        // Nothing unread: no second call.
        r.mark_all_read().await.unwrap();
        assert_eq!(backend.calls("mark_all_notifications_read"), 1);
    }

    #[tokio::test]
    async fn test_stale_load_does_not_overwrite_optimistic_flip() {
        let (r, backend) = reconciler();
        *backend.notifications.lock().unwrap() = vec![notification("n1", false)];
        r.load().await.unwrap();

        backend.hold("notifications");
        let slow = {
            let r = r.clone();
            tokio::spawn(async move { r.load().await })
        };
        tokio::time::timeout(Duration::from_secs(2), async {
            while backend.calls("notifications") < 2 {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .unwrap();

        // The parked load will see an unread copy, as if fetched before the flip.
        r.mark_read(&NotificationId("n1".into())).await.unwrap();
        backend.notifications.lock().unwrap()[0].is_read = false;
        backend.release("notifications");

        assert!(!slow.await.unwrap().unwrap());
        assert_eq!(read_flags(&r), vec![true]);
    }

    #[tokio::test]
    async fn test_failed_mark_read_after_mark_all_read_resyncs() {
        let (r, backend) = reconciler();
        *backend.notifications.lock().unwrap() =
            vec![notification("n1", false), notification("n2", false)];
        r.load().await.unwrap();

        backend.hold("n1");
        backend.fail("mark_notification_read");
        let single = {
            let r = r.clone();
            tokio::spawn(async move { r.mark_read(&NotificationId("n1".into())).await })
        };
        tokio::time::timeout(Duration::from_secs(2), async {
            while backend.calls("mark_notification_read") < 1 {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .unwrap();

        r.mark_all_read().await.unwrap();
        backend.release("n1");

        assert!(single.await.unwrap().is_err());
        assert_eq!(read_flags(&r), vec![true, true]);
        assert_eq!(r.notifications(), *backend.notifications.lock().unwrap());
    }
}
