//! Session Store: the authenticated identity for the process lifetime.
//!
//! Created once at startup and handed to every component that needs the
//! current user or the bearer credential. When opened over a [`Database`]
//! the identity is persisted across restarts and cleared on sign-out.

use std::sync::{Arc, Mutex, PoisonError, RwLock};

use tracing::info;

use hearth_shared::models::Identity;
use hearth_shared::types::{Credential, UserId};
use hearth_store::{Database, StoreError};

use crate::error::ClientError;

#[derive(Clone)]
pub struct SessionStore {
    inner: Arc<SessionInner>,
}

struct SessionInner {
    identity: RwLock<Option<Identity>>,
    db: Option<Mutex<Database>>,
}

impl SessionStore {
    /// Restore the persisted identity, if any, from `db`.
    pub fn open(db: Database) -> Result<Self, ClientError> {
        let restored = db.load_session()?;
        if let Some(stored) = &restored {
            info!(
                user = %stored.identity.user_id,
                saved_at = %stored.updated_at,
                "Restored session"
            );
        }

        Ok(Self {
            inner: Arc::new(SessionInner {
                identity: RwLock::new(restored.map(|s| s.identity)),
                db: Some(Mutex::new(db)),
            }),
        })
    }

    /// A session that lives only as long as the process.
    pub fn ephemeral() -> Self {
        Self {
            inner: Arc::new(SessionInner {
                identity: RwLock::new(None),
                db: None,
            }),
        }
    }

    pub fn sign_in(&self, identity: Identity) -> Result<(), ClientError> {
        self.with_db(|db| db.save_session(&identity))?;
        info!(user = %identity.user_id, "Signed in");
        *self.write() = Some(identity);
        Ok(())
    }

    /// Update the cached display name and avatar.
    pub fn update_profile(
        &self,
        display_name: &str,
        avatar_url: Option<&str>,
    ) -> Result<(), ClientError> {
        let mut guard = self.write();
        let identity = guard.as_mut().ok_or(ClientError::Unauthenticated)?;

        self.with_db(|db| db.update_session_profile(display_name, avatar_url).map(|_| ()))?;

        identity.display_name = display_name.to_string();
        identity.avatar_url = avatar_url.map(str::to_string);
        Ok(())
    }

    /// Forget the identity and the persisted row.
    pub fn sign_out(&self) -> Result<(), ClientError> {
        self.with_db(|db| db.clear_session().map(|_| ()))?;
        if let Some(previous) = self.write().take() {
            info!(user = %previous.user_id, "Signed out");
        }
        Ok(())
    }

    pub fn identity(&self) -> Option<Identity> {
        self.read().clone()
    }

    pub fn is_signed_in(&self) -> bool {
        self.read().is_some()
    }

    pub fn user_id(&self) -> Result<UserId, ClientError> {
        self.read()
            .as_ref()
            .map(|i| i.user_id.clone())
            .ok_or(ClientError::Unauthenticated)
    }

    pub fn credential(&self) -> Result<Credential, ClientError> {
        self.read()
            .as_ref()
            .map(|i| i.credential.clone())
            .ok_or(ClientError::Unauthenticated)
    }

    fn with_db<T>(
        &self,
        f: impl FnOnce(&Database) -> Result<T, StoreError>,
    ) -> Result<Option<T>, ClientError> {
        match &self.inner.db {
            Some(db) => {
                let db = db.lock().unwrap_or_else(PoisonError::into_inner);
                Ok(Some(f(&db)?))
            }
            None => Ok(None),
        }
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, Option<Identity>> {
        self.inner.identity.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, Option<Identity>> {
        self.inner.identity.write().unwrap_or_else(PoisonError::into_inner)
    }
}
