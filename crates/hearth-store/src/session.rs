//! Persistence for the signed-in [`Identity`].

use chrono::{DateTime, Utc};
use rusqlite::{params, OptionalExtension};

use hearth_shared::models::Identity;
use hearth_shared::types::{Credential, UserId};

use crate::database::Database;
use crate::error::Result;

/// A persisted identity plus the time it was last written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredSession {
    pub identity: Identity,
    pub updated_at: DateTime<Utc>,
}

impl Database {
    /// Insert or replace the persisted session.
    pub fn save_session(&self, identity: &Identity) -> Result<()> {
        self.conn().execute(
            "INSERT OR REPLACE INTO session
                 (id, user_id, display_name, avatar_url, credential, updated_at)
             VALUES (1, ?1, ?2, ?3, ?4, ?5)",
            params![
                identity.user_id.as_str(),
                identity.display_name,
                identity.avatar_url,
                identity.credential.expose(),
                Utc::now().to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    /// Load the persisted session, if any.
    pub fn load_session(&self) -> Result<Option<StoredSession>> {
        let row = self
            .conn()
            .query_row(
                "SELECT user_id, display_name, avatar_url, credential, updated_at
                 FROM session WHERE id = 1",
                [],
                |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, Option<String>>(2)?,
                        row.get::<_, String>(3)?,
                        row.get::<_, String>(4)?,
                    ))
                },
            )
            .optional()?;

        let Some((user_id, display_name, avatar_url, credential, updated_at)) = row else {
            return Ok(None);
        };

        let updated_at = DateTime::parse_from_rfc3339(&updated_at)?.with_timezone(&Utc);

        Ok(Some(StoredSession {
            identity: Identity {
                user_id: UserId(user_id),
                display_name,
                avatar_url,
                credential: Credential(credential),
            },
            updated_at,
        }))
    }

    /// Update the cached profile fields. Returns `false` when no session exists.
    pub fn update_session_profile(
        &self,
        display_name: &str,
        avatar_url: Option<&str>,
    ) -> Result<bool> {
        let affected = self.conn().execute(
            "UPDATE session SET display_name = ?1, avatar_url = ?2, updated_at = ?3 WHERE id = 1",
            params![display_name, avatar_url, Utc::now().to_rfc3339()],
        )?;
        Ok(affected > 0)
    }

    /// Remove the persisted session. Returns `true` if one existed.
    pub fn clear_session(&self) -> Result<bool> {
        let affected = self.conn().execute("DELETE FROM session WHERE id = 1", [])?;
        Ok(affected > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn identity() -> Identity {
        Identity {
            user_id: UserId::new("u1"),
            display_name: "Aman".into(),
            avatar_url: None,
            credential: Credential::new("tok-1"),
        }
    }

    #[test]
    fn test_session_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("hearth.db");

        Database::open_at(&path).unwrap().save_session(&identity()).unwrap();

        let db = Database::open_at(&path).unwrap();
        let stored = db.load_session().unwrap().expect("session persisted");
        assert_eq!(stored.identity, identity());
    }

    #[test]
    fn test_update_profile_and_clear() {
        let db = Database::open_in_memory().unwrap();
        assert!(!db.update_session_profile("X", None).unwrap());

        db.save_session(&identity()).unwrap();
        assert!(db
            .update_session_profile("Aman K", Some("https://cdn/a.png"))
            .unwrap());

        let stored = db.load_session().unwrap().unwrap();
        assert_eq!(stored.identity.display_name, "Aman K");
        assert_eq!(stored.identity.avatar_url.as_deref(), Some("https://cdn/a.png"));
        assert_eq!(stored.identity.credential, Credential::new("tok-1"));

        assert!(db.clear_session().unwrap());
        assert!(!db.clear_session().unwrap());
        assert_eq!(db.load_session().unwrap(), None);
    }
}
