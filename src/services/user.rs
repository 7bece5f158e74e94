//! User service
//!
//! Implements business logic for admin-panel accounts:
//! - First-run setup and config-driven bootstrap of the first admin
//! - Login / logout with database-backed session tokens
//! - Failed-login rate limiting per email
//! - Account management with last-admin protection

use crate::config::BootstrapAdmin;
use crate::db::repositories::{SessionRepository, UserRepository};
use crate::models::{
    CreateUserInput, ListParams, PagedResult, Session, UpdateUserInput, User, UserFilter, UserRole,
};
use crate::services::email::is_valid_email;
use crate::services::password::{check_password_length, hash_password, verify_password};
use crate::services::rate_limiter::RateLimiter;
use anyhow::Context;
use chrono::{Duration, Utc};
use serde::Deserialize;
use std::sync::Arc;
use uuid::Uuid;

/// Default session lifetime in days
pub const DEFAULT_SESSION_DAYS: i64 = 7;

/// Error types for user service operations
#[derive(Debug, thiserror::Error)]
pub enum UserServiceError {
    /// Invalid credentials or disabled account
    #[error("Authentication failed: {0}")]
    AuthenticationError(String),

    /// Too many failed logins for this email
    #[error("Too many failed login attempts, try again later")]
    RateLimited,

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Email already registered: {0}")]
    EmailExists(String),

    #[error("User not found: {0}")]
    NotFound(String),

    /// The change would leave no active admin
    #[error("Cannot remove the last active admin")]
    LastAdmin,

    #[error("You cannot delete your own account")]
    CannotDeleteSelf,

    #[error("Setup has already been completed")]
    SetupCompleted,

    #[error("Internal error: {0}")]
    InternalError(#[from] anyhow::Error),
}

/// Login request body
#[derive(Debug, Clone, Deserialize)]
pub struct LoginInput {
    pub email: String,
    pub password: String,
}

impl LoginInput {
    pub fn new(email: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            password: password.into(),
        }
    }
}

/// User service for accounts and authentication
pub struct UserService {
    user_repo: Arc<dyn UserRepository>,
    session_repo: Arc<dyn SessionRepository>,
    login_limiter: RateLimiter,
    session_days: i64,
}

impl UserService {
    pub fn new(
        user_repo: Arc<dyn UserRepository>,
        session_repo: Arc<dyn SessionRepository>,
    ) -> Self {
        Self::with_session_days(user_repo, session_repo, DEFAULT_SESSION_DAYS)
    }

    pub fn with_session_days(
        user_repo: Arc<dyn UserRepository>,
        session_repo: Arc<dyn SessionRepository>,
        session_days: i64,
    ) -> Self {
        Self {
            user_repo,
            session_repo,
            login_limiter: RateLimiter::for_login(),
            session_days,
        }
    }

    /// Verify credentials and open a session
    ///
    /// # Errors
    /// - `RateLimited` after 5 failures for the email within 15 minutes
    /// - `AuthenticationError` for unknown email, wrong password or a disabled account
    pub async fn login(&self, input: LoginInput) -> Result<(Session, User), UserServiceError> {
        let email = input.email.trim().to_lowercase();
        if self.login_limiter.is_limited(&email).await {
            tracing::warn!("Login rate limit hit for {}", email);
            return Err(UserServiceError::RateLimited);
        }

        let user = match self
            .user_repo
            .get_by_email(&email)
            .await
            .context("Failed to get user by email")?
        {
            Some(user) => user,
            None => return Err(self.login_failed(&email).await),
        };

        let valid = verify_password(&input.password, &user.password_hash)
            .context("Failed to verify password")?;
        if !valid {
            return Err(self.login_failed(&email).await);
        }

        if !user.is_active {
            return Err(UserServiceError::AuthenticationError(
                "This account has been disabled".to_string(),
            ));
        }

        self.login_limiter.clear(&email).await;
        self.user_repo
            .touch_last_login(user.id)
            .await
            .context("Failed to record login time")?;
        let session = self.create_session(user.id).await?;

        tracing::info!("User {} logged in", user.id);
        Ok((session, user))
    }

    async fn login_failed(&self, email: &str) -> UserServiceError {
        self.login_limiter.record(email).await;
        UserServiceError::AuthenticationError("Invalid email or password".to_string())
    }

    /// Close a session. Unknown tokens are ignored.
    pub async fn logout(&self, token: &str) -> Result<(), UserServiceError> {
        self.session_repo
            .delete(token)
            .await
            .context("Failed to delete session")?;
        Ok(())
    }

    /// The active user behind a session token, if the session is still valid.
    /// Expired sessions are deleted on sight.
    pub async fn validate_session(&self, token: &str) -> Result<Option<User>, UserServiceError> {
        let session = match self
            .session_repo
            .get_by_id(token)
            .await
            .context("Failed to get session")?
        {
            Some(session) => session,
            None => return Ok(None),
        };

        if session.is_expired() {
            let _ = self.session_repo.delete(token).await;
            return Ok(None);
        }

        let user = self
            .user_repo
            .get_by_id(session.user_id)
            .await
            .context("Failed to get user")?;
        Ok(user.filter(|u| u.is_active))
    }

    /// True until the first account exists
    pub async fn needs_setup(&self) -> Result<bool, UserServiceError> {
        let count = self.user_repo.count().await.context("Failed to count users")?;
        Ok(count == 0)
    }

    /// Create the first admin and sign them in. Only allowed while no user exists.
    pub async fn setup_first_admin(
        &self,
        input: CreateUserInput,
    ) -> Result<(Session, User), UserServiceError> {
        if !self.needs_setup().await? {
            return Err(UserServiceError::SetupCompleted);
        }
        let user = self
            .create(CreateUserInput {
                role: UserRole::Admin,
                ..input
            })
            .await?;
        let session = self.create_session(user.id).await?;
        tracing::info!("Initial admin {} created", user.email);
        Ok((session, user))
    }

    /// Create the configured admin when the database has no users yet
    pub async fn ensure_bootstrap_admin(
        &self,
        admin: &BootstrapAdmin,
    ) -> Result<Option<User>, UserServiceError> {
        if !self.needs_setup().await? {
            return Ok(None);
        }
        let user = self
            .create(
                CreateUserInput::new(
                    admin.name.clone(),
                    admin.email.clone(),
                    admin.password.clone(),
                )
                .admin(),
            )
            .await?;
        tracing::info!("Bootstrapped admin account {}", user.email);
        Ok(Some(user))
    }

    pub async fn list(
        &self,
        filter: &UserFilter,
        params: &ListParams,
    ) -> Result<PagedResult<User>, UserServiceError> {
        let (items, total) = self
            .user_repo
            .list(filter, params)
            .await
            .context("Failed to list users")?;
        Ok(PagedResult::new(items, total, params))
    }

    pub async fn get(&self, id: i64) -> Result<User, UserServiceError> {
        self.user_repo
            .get_by_id(id)
            .await
            .context("Failed to get user")?
            .ok_or_else(|| UserServiceError::NotFound(format!("User with ID {} not found", id)))
    }

    /// Create an account
    ///
    /// # Errors
    /// - `ValidationError` for an empty name, malformed email or short password
    /// - `EmailExists` if the email is taken
    pub async fn create(&self, input: CreateUserInput) -> Result<User, UserServiceError> {
        let name = validate_name(&input.name)?;
        let email = self.validate_new_email(&input.email, None).await?;
        check_password_length(&input.password).map_err(UserServiceError::ValidationError)?;

        let now = Utc::now();
        let user = User {
            id: 0,
            name,
            email,
            password_hash: hash_password(&input.password)?,
            role: input.role,
            is_active: true,
            last_login_at: None,
            created_at: now,
            updated_at: now,
        };
        let created = self.user_repo.create(&user).await.context("Failed to create user")?;
        tracing::info!("Created {} account {}", created.role, created.id);
        Ok(created)
    }

    /// Update an account. A password change signs the user out everywhere.
    ///
    /// # Errors
    /// - `LastAdmin` when demoting or disabling the only active admin
    pub async fn update(&self, id: i64, input: UpdateUserInput) -> Result<User, UserServiceError> {
        let mut user = self.get(id).await?;
        let was_active_admin = user.is_active && user.is_admin();

        if let Some(name) = input.name {
            user.name = validate_name(&name)?;
        }
        if let Some(email) = input.email {
            user.email = self.validate_new_email(&email, Some(id)).await?;
        }
        if let Some(role) = input.role {
            user.role = role;
        }
        if let Some(is_active) = input.is_active {
            user.is_active = is_active;
        }

        if was_active_admin && !(user.is_active && user.is_admin()) {
            self.ensure_other_admin_exists().await?;
        }

        let password_changed = match input.password {
            Some(password) => {
                check_password_length(&password).map_err(UserServiceError::ValidationError)?;
                user.password_hash = hash_password(&password)?;
                true
            }
            None => false,
        };

        let updated = self.user_repo.update(&user).await.context("Failed to update user")?;
        if password_changed || !updated.is_active {
            self.session_repo
                .delete_by_user(id)
                .await
                .context("Failed to revoke sessions")?;
        }
        Ok(updated)
    }

    /// Delete an account and its sessions
    ///
    /// # Errors
    /// - `CannotDeleteSelf` when `acting_user_id == id`
    /// - `LastAdmin` when deleting the only active admin
    pub async fn delete(&self, id: i64, acting_user_id: i64) -> Result<(), UserServiceError> {
        if id == acting_user_id {
            return Err(UserServiceError::CannotDeleteSelf);
        }
        let user = self.get(id).await?;
        if user.is_active && user.is_admin() {
            self.ensure_other_admin_exists().await?;
        }

        self.user_repo.delete(id).await.context("Failed to delete user")?;
        tracing::info!("Deleted user {}", id);
        Ok(())
    }

    /// Change one's own password. Other sessions are revoked and a fresh
    /// session is returned.
    pub async fn change_password(
        &self,
        user_id: i64,
        current_password: &str,
        new_password: &str,
    ) -> Result<Session, UserServiceError> {
        let mut user = self.get(user_id).await?;
        let valid = verify_password(current_password, &user.password_hash)
            .context("Failed to verify password")?;
        if !valid {
            return Err(UserServiceError::AuthenticationError(
                "Current password is incorrect".to_string(),
            ));
        }
        check_password_length(new_password).map_err(UserServiceError::ValidationError)?;

        user.password_hash = hash_password(new_password)?;
        self.user_repo.update(&user).await.context("Failed to update password")?;
        self.session_repo
            .delete_by_user(user_id)
            .await
            .context("Failed to revoke sessions")?;
        self.create_session(user_id).await
    }

    /// Delete expired sessions and stale rate-limit entries
    pub async fn cleanup_expired_sessions(&self) -> Result<u64, UserServiceError> {
        self.login_limiter.cleanup().await;
        let removed = self
            .session_repo
            .delete_expired()
            .await
            .context("Failed to delete expired sessions")?;
        if removed > 0 {
            tracing::debug!("Removed {} expired sessions", removed);
        }
        Ok(removed)
    }

    /// Session lifetime, for cookie max-age
    pub fn session_duration(&self) -> Duration {
        Duration::days(self.session_days)
    }

    async fn create_session(&self, user_id: i64) -> Result<Session, UserServiceError> {
        let now = Utc::now();
        let session = Session {
            id: Uuid::new_v4().to_string(),
            user_id,
            expires_at: now + self.session_duration(),
            created_at: now,
        };
        Ok(self
            .session_repo
            .create(&session)
            .await
            .context("Failed to create session")?)
    }

    async fn ensure_other_admin_exists(&self) -> Result<(), UserServiceError> {
        let admins = self
            .user_repo
            .count_active_admins()
            .await
            .context("Failed to count admins")?;
        if admins <= 1 {
            return Err(UserServiceError::LastAdmin);
        }
        Ok(())
    }

    async fn validate_new_email(
        &self,
        email: &str,
        exclude_id: Option<i64>,
    ) -> Result<String, UserServiceError> {
        let email = email.trim().to_lowercase();
        if !is_valid_email(&email) {
            return Err(UserServiceError::ValidationError(format!(
                "Invalid email address: {}",
                email
            )));
        }
        if let Some(existing) = self
            .user_repo
            .get_by_email(&email)
            .await
            .context("Failed to check email uniqueness")?
        {
            if Some(existing.id) != exclude_id {
                return Err(UserServiceError::EmailExists(email));
            }
        }
        Ok(email)
    }
}

fn validate_name(name: &str) -> Result<String, UserServiceError> {
    let name = name.trim();
    if name.is_empty() {
        return Err(UserServiceError::ValidationError(
            "Name cannot be empty".to_string(),
        ));
    }
    Ok(name.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repositories::{SqlxSessionRepository, SqlxUserRepository};
    use crate::db::{create_test_pool, migrations};

    async fn setup_test_service() -> UserService {
        let pool = create_test_pool().await.expect("Failed to create test pool");
        migrations::run_migrations(&pool)
            .await
            .expect("Failed to run migrations");
        UserService::new(
            SqlxUserRepository::boxed(pool.clone()),
            SqlxSessionRepository::boxed(pool),
        )
    }

    async fn admin(service: &UserService, email: &str) -> User {
        service
            .create(CreateUserInput::new("Admin", email, "password123").admin())
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_setup_flow() {
        let service = setup_test_service().await;
        assert!(service.needs_setup().await.unwrap());

        let (session, user) = service
            .setup_first_admin(CreateUserInput::new("Owner", "Owner@Example.com", "password123"))
            .await
            .unwrap();
        assert!(user.is_admin());
        assert_eq!(user.email, "owner@example.com");
        assert_eq!(
            service.validate_session(&session.id).await.unwrap().map(|u| u.id),
            Some(user.id)
        );

        assert!(!service.needs_setup().await.unwrap());
        let again = service
            .setup_first_admin(CreateUserInput::new("Other", "other@example.com", "password123"))
            .await;
        assert!(matches!(again, Err(UserServiceError::SetupCompleted)));
    }

    #[tokio::test]
    async fn test_bootstrap_admin_only_when_empty() {
        let service = setup_test_service().await;
        let config = BootstrapAdmin {
            name: "Boot".to_string(),
            email: "boot@example.com".to_string(),
            password: "password123".to_string(),
        };
        let created = service.ensure_bootstrap_admin(&config).await.unwrap();
        assert!(created.unwrap().is_admin());
        assert!(service.ensure_bootstrap_admin(&config).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_login_and_logout() {
        let service = setup_test_service().await;
        let user = admin(&service, "admin@example.com").await;

        let (session, logged_in) = service
            .login(LoginInput::new(" ADMIN@example.com ", "password123"))
            .await
            .unwrap();
        assert_eq!(logged_in.id, user.id);
        assert!(logged_in.last_login_at.is_none());
        assert!(service.get(user.id).await.unwrap().last_login_at.is_some());

        service.logout(&session.id).await.unwrap();
        assert!(service.validate_session(&session.id).await.unwrap().is_none());

        let wrong = service
            .login(LoginInput::new("admin@example.com", "wrong-password"))
            .await;
        assert!(matches!(wrong, Err(UserServiceError::AuthenticationError(_))));
        let unknown = service
            .login(LoginInput::new("ghost@example.com", "password123"))
            .await;
        assert!(matches!(unknown, Err(UserServiceError::AuthenticationError(_))));
    }

    #[tokio::test]
    async fn test_login_rate_limited_after_five_failures() {
        let service = setup_test_service().await;
        admin(&service, "admin@example.com").await;

        for _ in 0..5 {
            let result = service
                .login(LoginInput::new("admin@example.com", "nope-nope"))
                .await;
            assert!(matches!(result, Err(UserServiceError::AuthenticationError(_))));
        }
        let blocked = service
            .login(LoginInput::new("admin@example.com", "password123"))
            .await;
        assert!(matches!(blocked, Err(UserServiceError::RateLimited)));
    }

    #[tokio::test]
    async fn test_disabled_user_cannot_log_in() {
        let service = setup_test_service().await;
        admin(&service, "admin@example.com").await;
        let editor = service
            .create(CreateUserInput::new("Ed", "ed@example.com", "password123"))
            .await
            .unwrap();
        let (session, _) = service
            .login(LoginInput::new("ed@example.com", "password123"))
            .await
            .unwrap();

        service
            .update(
                editor.id,
                UpdateUserInput {
                    is_active: Some(false),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        assert!(service.validate_session(&session.id).await.unwrap().is_none());
        let result = service
            .login(LoginInput::new("ed@example.com", "password123"))
            .await;
        assert!(matches!(result, Err(UserServiceError::AuthenticationError(_))));
    }

    #[tokio::test]
    async fn test_create_validation() {
        let service = setup_test_service().await;
        admin(&service, "taken@example.com").await;

        let cases = [
            CreateUserInput::new("", "a@example.com", "password123"),
            CreateUserInput::new("A", "not-an-email", "password123"),
            CreateUserInput::new("A", "a@example.com", "short"),
        ];
        for input in cases {
            assert!(matches!(
                service.create(input).await,
                Err(UserServiceError::ValidationError(_))
            ));
        }

        let dup = service
            .create(CreateUserInput::new("A", "TAKEN@example.com", "password123"))
            .await;
        assert!(matches!(dup, Err(UserServiceError::EmailExists(_))));
    }

    #[tokio::test]
    async fn test_last_admin_protection() {
        let service = setup_test_service().await;
        let first = admin(&service, "one@example.com").await;
        let editor = service
            .create(CreateUserInput::new("Ed", "ed@example.com", "password123"))
            .await
            .unwrap();

        assert!(matches!(
            service.delete(first.id, editor.id).await,
            Err(UserServiceError::LastAdmin)
        ));
        assert!(matches!(
            service
                .update(
                    first.id,
                    UpdateUserInput {
                        role: Some(UserRole::Editor),
                        ..Default::default()
                    }
                )
                .await,
            Err(UserServiceError::LastAdmin)
        ));
        assert!(matches!(
            service.delete(first.id, first.id).await,
            Err(UserServiceError::CannotDeleteSelf)
        ));

        let second = admin(&service, "two@example.com").await;
        service.delete(first.id, second.id).await.unwrap();
        assert!(matches!(
            service.get(first.id).await,
            Err(UserServiceError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_change_password_revokes_other_sessions() {
        let service = setup_test_service().await;
        let user = admin(&service, "admin@example.com").await;
        let (old_session, _) = service
            .login(LoginInput::new("admin@example.com", "password123"))
            .await
            .unwrap();

        let wrong = service
            .change_password(user.id, "not-it", "new-password-1")
            .await;
        assert!(matches!(wrong, Err(UserServiceError::AuthenticationError(_))));

        let new_session = service
            .change_password(user.id, "password123", "new-password-1")
            .await
            .unwrap();
        assert!(service.validate_session(&old_session.id).await.unwrap().is_none());
        assert!(service.validate_session(&new_session.id).await.unwrap().is_some());

        service
            .login(LoginInput::new("admin@example.com", "new-password-1"))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_expired_sessions_cleaned_up() {
        let pool = create_test_pool().await.unwrap();
        migrations::run_migrations(&pool).await.unwrap();
        let service = UserService::with_session_days(
            SqlxUserRepository::boxed(pool.clone()),
            SqlxSessionRepository::boxed(pool),
            -1,
        );
        admin(&service, "admin@example.com").await;
        let (session, _) = service
            .login(LoginInput::new("admin@example.com", "password123"))
            .await
            .unwrap();

        assert_eq!(service.cleanup_expired_sessions().await.unwrap(), 1);
        assert!(service.validate_session(&session.id).await.unwrap().is_none());
    }
}
