//! Profile and account settings.

use std::sync::Arc;

use tracing::info;

use hearth_shared::api::{ChangePasswordRequest, UpdateProfileRequest};
use hearth_shared::constants::MIN_PASSWORD_LEN;
use hearth_shared::error::ValidationError;
use hearth_shared::models::Profile;

use crate::backend::Backend;
use crate::error::ClientError;
use crate::events::{EventBus, UiEvent};
use crate::session::SessionStore;

/// Check a profile update before it is sent.
pub fn validate_profile_update(
    name: &str,
    email: &str,
    password: &str,
) -> Result<UpdateProfileRequest, ValidationError> {
    let (name, email, password) = (name.trim(), email.trim(), password.trim());
    if name.is_empty() || email.is_empty() {
        return Err(ValidationError::MissingProfileFields);
    }
    if password.is_empty() {
        return Err(ValidationError::MissingConfirmation);
    }
    Ok(UpdateProfileRequest {
        name: name.to_string(),
        email: email.to_string(),
        password: password.to_string(),
    })
}

/// Check a password change before it is sent. Rules apply in order.
pub fn validate_password_change(
    current: &str,
    new: &str,
    confirm: &str,
) -> Result<ChangePasswordRequest, ValidationError> {
    if current.is_empty() || new.is_empty() || confirm.is_empty() {
        return Err(ValidationError::MissingPasswordFields);
    }
    if new.chars().count() < MIN_PASSWORD_LEN {
        return Err(ValidationError::PasswordTooShort {
            min: MIN_PASSWORD_LEN,
        });
    }
    if new != confirm {
        return Err(ValidationError::PasswordMismatch);
    }
    if current == new {
        return Err(ValidationError::PasswordUnchanged);
    }
    Ok(ChangePasswordRequest {
        old_password: current.to_string(),
        new_password: new.to_string(),
    })
}

#[derive(Clone)]
pub struct ProfileService {
    backend: Arc<dyn Backend>,
    session: SessionStore,
    events: EventBus,
}

impl ProfileService {
    pub fn new(backend: Arc<dyn Backend>, session: SessionStore, events: EventBus) -> Self {
        Self {
            backend,
            session,
            events,
        }
    }

    /// Fetch `/user/me` and refresh the session's cached name and avatar.
    pub async fn refresh(&self) -> Result<Profile, ClientError> {
        let profile = self
            .backend
            .me()
            .await
            .map_err(|e| self.report("load_profile", e))?;

        self.session
            .update_profile(&profile.display_name, profile.avatar_url.as_deref())?;
        self.events.emit(UiEvent::ProfileUpdated);
        Ok(profile)
    }

    pub async fn update(
        &self,
        name: &str,
        email: &str,
        password: &str,
    ) -> Result<Option<Profile>, ClientError> {
        let request = validate_profile_update(name, email, password)
            .map_err(|e| self.report("update_profile", e.into()))?;

        let updated = self
            .backend
            .update_profile(&request)
            .await
            .map_err(|e| self.report("update_profile", e))?;

        let avatar = self.session.identity().and_then(|i| i.avatar_url);
        let avatar = updated
            .as_ref()
            .and_then(|p| p.avatar_url.clone())
            .or(avatar);
        self.session.update_profile(&request.name, avatar.as_deref())?;

        info!("Profile updated");
        self.events.emit(UiEvent::ProfileUpdated);
        Ok(updated)
    }

    pub async fn change_password(
        &self,
        current: &str,
        new: &str,
        confirm: &str,
    ) -> Result<(), ClientError> {
        let request = validate_password_change(current, new, confirm)
            .map_err(|e| self.report("change_password", e.into()))?;

        self.backend
            .change_password(&request)
            .await
            .map_err(|e| self.report("change_password", e))?;

        info!("Password changed");
        Ok(())
    }

    fn report(&self, context: &'static str, e: ClientError) -> ClientError {
        self.events.emit_error(context, &e);
        e
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hearth_shared::models::Identity;
    use hearth_shared::types::{Credential, UserId};

    use crate::testing::MockBackend;

    fn signed_in() -> SessionStore {
        let session = SessionStore::ephemeral();
        session
            .sign_in(Identity {
                user_id: UserId::new("me"),
                display_name: "Old".into(),
                avatar_url: Some("https://cdn/old.png".into()),
                credential: Credential::new("tok"),
            })
            .unwrap();
        session
    }

    fn profile(name: &str, avatar: Option<&str>) -> Profile {
        Profile {
            user_id: UserId::new("me"),
            display_name: name.into(),
            email: Some("me@example.org".into()),
            avatar_url: avatar.map(str::to_string),
        }
    }

    #[test]
    fn test_password_rules_in_order() {
        use ValidationError::*;
        assert_eq!(validate_password_change("", "abcdef", "abcdef"), Err(MissingPasswordFields));
        assert_eq!(
            validate_password_change("old", "abc", "abc"),
            Err(PasswordTooShort { min: 6 })
        );
        assert_eq!(validate_password_change("old", "abcdef", "abcdeg"), Err(PasswordMismatch));
        assert_eq!(validate_password_change("abcdef", "abcdef", "abcdef"), Err(PasswordUnchanged));

        let ok = validate_password_change("old-pass", "new-pass", "new-pass").unwrap();
        assert_eq!(ok.old_password, "old-pass");
    }

    #[test]
    fn test_profile_update_rules() {
        assert_eq!(
            validate_profile_update(" ", "a@b.c", "pw").unwrap_err(),
            ValidationError::MissingProfileFields
        );
        assert_eq!(
            validate_profile_update("Aman", "a@b.c", "  ").unwrap_err(),
            ValidationError::MissingConfirmation
        );
        let req = validate_profile_update(" Aman ", " a@b.c ", "pw").unwrap();
        assert_eq!((req.name.as_str(), req.email.as_str()), ("Aman", "a@b.c"));
    }

    #[tokio::test]
    async fn test_refresh_updates_session_cache() {
        let backend = MockBackend::new();
        *backend.profile.lock().unwrap() = Some(profile("Aman", Some("https://cdn/new.png")));
        let session = signed_in();
        let service = ProfileService::new(backend, session.clone(), EventBus::default());

        service.refresh().await.unwrap();
        let identity = session.identity().unwrap();
        assert_eq!(identity.display_name, "Aman");
        assert_eq!(identity.avatar_url.as_deref(), Some("https://cdn/new.png"));
    }

    #[tokio::test]
    async fn test_update_keeps_avatar_when_not_echoed() {
        let backend = MockBackend::new();
        let session = signed_in();
        let service = ProfileService::new(backend.clone(), session.clone(), EventBus::default());

        assert!(service.update("Aman", "a@b.c", "pw").await.unwrap().is_none());
        let identity = session.identity().unwrap();
        assert_eq!(identity.display_name, "Aman");
        assert_eq!(identity.avatar_url.as_deref(), Some("https://cdn/old.png"));

        assert!(service.update("", "a@b.c", "pw").await.is_err());
        assert_eq!(backend.calls("update_profile"), 1);
    }

    #[tokio::test]
    async fn test_change_password_validates_before_calling() {
        let backend = MockBackend::new();
        let service = ProfileService::new(backend.clone(), signed_in(), EventBus::default());

        assert!(service.change_password("old-pass", "short", "short").await.is_err());
        assert_eq!(backend.calls("change_password"), 0);

        service
            .change_password("old-pass", "new-pass", "new-pass")
            .await
            .unwrap();
        assert_eq!(
            backend.password.lock().unwrap().as_ref().map(|r| r.new_password.clone()),
            Some("new-pass".to_string())
        );
    }
}
