//! User service
//!
//! Accounts and authentication:
//! - Registration with username/password/role validation
//! - Login issuing an opaque session token, logout revoking it
//! - Session validation for the auth middleware
//! - Professor lookup for the availability and booking flows

use crate::db::repositories::{SessionRepository, UserRepository};
use crate::models::{RegisterInput, Session, User, UserRole};
use crate::services::password::{hash_password, verify_password};
use anyhow::Context;
use chrono::{Duration, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use std::str::FromStr;
use std::sync::Arc;
use uuid::Uuid;

/// Default session lifetime in hours
pub const DEFAULT_SESSION_HOURS: i64 = 24;

/// Minimum accepted password length
pub const MIN_PASSWORD_LENGTH: usize = 6;

static USERNAME_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[a-zA-Z0-9_]{3,30}$").expect("username pattern is valid"));

/// Error types for user service operations
#[derive(Debug, thiserror::Error)]
pub enum UserServiceError {
    /// Authentication failed (invalid credentials)
    #[error("Authentication failed: {0}")]
    AuthenticationError(String),

    /// Validation error (invalid input)
    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("User already exists: {0}")]
    UserExists(String),

    /// The id does not name a user with the expected role
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Session expired")]
    SessionExpired,

    #[error("Internal error: {0}")]
    InternalError(#[from] anyhow::Error),
}

/// User service for managing users and authentication
pub struct UserService {
    user_repo: Arc<dyn UserRepository>,
    session_repo: Arc<dyn SessionRepository>,
    session_hours: i64,
}

impl UserService {
    pub fn new(
        user_repo: Arc<dyn UserRepository>,
        session_repo: Arc<dyn SessionRepository>,
    ) -> Self {
        Self::with_session_hours(user_repo, session_repo, DEFAULT_SESSION_HOURS)
    }

    /// Create a user service whose sessions last `session_hours`
    pub fn with_session_hours(
        user_repo: Arc<dyn UserRepository>,
        session_repo: Arc<dyn SessionRepository>,
        session_hours: i64,
    ) -> Self {
        Self {
            user_repo,
            session_repo,
            session_hours,
        }
    }

    /// Register a new user
    ///
    /// # Errors
    ///
    /// - `ValidationError` if any field is malformed; the message lists every
    ///   problem found, separated by "; "
    /// - `UserExists` if the username is taken
    /// - `InternalError` for database errors
    pub async fn register(&self, input: RegisterInput) -> Result<User, UserServiceError> {
        let role = validate_registration(&input)?;

        if self
            .user_repo
            .get_by_username(&input.username)
            .await
            .context("Failed to check username")?
            .is_some()
        {
            return Err(username_taken(&input.username));
        }

        let password_hash = hash_password(&input.password).context("Failed to hash password")?;
        let user = User::new(input.username, password_hash, role);

        // The unique index still catches two registrations racing past the check above
        let created = self
            .user_repo
            .create(&user)
            .await
            .context("Failed to create user")?
            .ok_or_else(|| username_taken(&user.username))?;

        tracing::info!(user_id = created.id, role = %created.role, "User registered");
        Ok(created)
    }

    /// Login with credentials
    ///
    /// Unknown username and wrong password produce the same error.
    pub async fn login(&self, username: &str, password: &str) -> Result<Session, UserServiceError> {
        let invalid = || UserServiceError::AuthenticationError("Invalid credentials".to_string());

        let user = self
            .user_repo
            .get_by_username(username)
            .await
            .context("Failed to get user by username")?
            .ok_or_else(invalid)?;

        let valid = verify_password(password, &user.password_hash)
            .context("Failed to verify password")?;
        if !valid {
            tracing::debug!(user_id = user.id, "Login rejected: wrong password");
            return Err(invalid());
        }

        self.create_session(user.id).await
    }

    /// Logout (invalidate session)
    pub async fn logout(&self, token: &str) -> Result<(), UserServiceError> {
        self.session_repo
            .delete(token)
            .await
            .context("Failed to delete session")?;

        Ok(())
    }

    /// Validate session token and return the associated user
    ///
    /// Returns `None` if the token is unknown or expired. Expired sessions are
    /// removed on sight.
    pub async fn validate_session(&self, token: &str) -> Result<Option<User>, UserServiceError> {
        let session = match self
            .session_repo
            .get_by_id(token)
            .await
            .context("Failed to get session")?
        {
            Some(s) => s,
            None => return Ok(None),
        };

        if session.is_expired() {
            if let Err(e) = self.session_repo.delete(token).await {
                tracing::warn!("Failed to delete expired session: {:#}", e);
            }
            return Ok(None);
        }

        let user = self
            .user_repo
            .get_by_id(session.user_id)
            .await
            .context("Failed to get user")?;

        Ok(user)
    }

    pub async fn get_by_id(&self, id: i64) -> Result<Option<User>, UserServiceError> {
        Ok(self
            .user_repo
            .get_by_id(id)
            .await
            .context("Failed to get user by ID")?)
    }

    pub async fn get_by_username(&self, username: &str) -> Result<Option<User>, UserServiceError> {
        Ok(self
            .user_repo
            .get_by_username(username)
            .await
            .context("Failed to get user by username")?)
    }

    /// Resolve a professor by id.
    ///
    /// # Errors
    ///
    /// `NotFound` when the id is unknown or belongs to a student.
    pub async fn find_professor(&self, id: i64) -> Result<User, UserServiceError> {
        match self.get_by_id(id).await? {
            Some(user) if user.is_professor() => Ok(user),
            _ => Err(UserServiceError::NotFound("Professor not found".to_string())),
        }
    }

    /// All professors, ordered by username
    pub async fn list_professors(&self) -> Result<Vec<User>, UserServiceError> {
        Ok(self
            .user_repo
            .list_by_role(UserRole::Professor)
            .await
            .context("Failed to list professors")?)
    }

    /// Delete all expired sessions, returning how many were removed
    pub async fn cleanup_expired_sessions(&self) -> Result<u64, UserServiceError> {
        Ok(self
            .session_repo
            .delete_expired()
            .await
            .context("Failed to delete expired sessions")?)
    }

    async fn create_session(&self, user_id: i64) -> Result<Session, UserServiceError> {
        let now = Utc::now();
        let session = Session {
            id: Uuid::new_v4().to_string(),
            user_id,
            expires_at: now + Duration::hours(self.session_hours),
            created_at: now,
        };

        Ok(self
            .session_repo
            .create(&session)
            .await
            .context("Failed to create session")?)
    }
}

fn username_taken(username: &str) -> UserServiceError {
    UserServiceError::UserExists(format!("Username '{}' is already taken", username))
}

/// Check registration fields, returning the parsed role.
fn validate_registration(input: &RegisterInput) -> Result<UserRole, UserServiceError> {
    let mut errors = Vec::new();

    if input.username.is_empty() {
        errors.push("Username is required".to_string());
    } else if !USERNAME_RE.is_match(&input.username) {
        errors.push(
            "Username must be 3-30 characters long and contain only letters, numbers, and underscores"
                .to_string(),
        );
    }

    if input.password.is_empty() {
        errors.push("Password is required".to_string());
    } else if input.password.chars().count() < MIN_PASSWORD_LENGTH {
        errors.push(format!(
            "Password must be at least {} characters long",
            MIN_PASSWORD_LENGTH
        ));
    }

    // Roles are matched exactly, unlike `UserRole::from_str`
    let role = match input.role.as_str() {
        "" => {
            errors.push("Role is required".to_string());
            None
        }
        "student" | "professor" => UserRole::from_str(&input.role).ok(),
        _ => {
            errors.push("Role must be either \"student\" or \"professor\"".to_string());
            None
        }
    };

    match role {
        Some(role) if errors.is_empty() => Ok(role),
        _ => Err(UserServiceError::ValidationError(errors.join("; "))),
    }
}
