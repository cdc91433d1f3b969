#![cfg(not(tarpaulin_include))]

//! Admin authentication and per-session state.
//!
//! A single admin account is configured at startup. Logging in creates a
//! random session id stored in the `session` cookie; the session carries the
//! admin's [`Workspace`] (row selections, kanban drag state, imported board)
//! and the progress of any email batch they started.

use crate::app::AppState;
use crate::dashboard::Selection;
use crate::error::{AppError, FieldErrors};
use crate::invitations::ProgressTracker;
use crate::kanban::Board;
use crate::loader::ImportedFeedback;
use crate::validation::{validate_email, validate_required};
use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};
use axum::{
    Extension, Json,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, RwLock};
use std::time::{Duration, SystemTime};
use uuid::Uuid;

pub const SESSION_COOKIE: &str = "session";
const SESSION_DURATION: u64 = 24 * 60 * 60; // 24 hours in seconds

const INVALID_CREDENTIALS: &str = "Invalid credentials. Please try again.";

/// Hash a password using Argon2
///
/// # Arguments
/// * `password` - The plaintext password to hash
///
/// # Returns
/// * `Result<String, AppError>` - The PHC-format hash or an error
pub fn hash_password(password: &str) -> Result<String, AppError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|_| AppError::internal("Password hashing failed"))
}

/// Verify a password against a stored hash
///
/// # Returns
/// * `Result<bool, AppError>` - Whether the password matches
///
/// # Errors
/// * Returns an error if the hash is in an invalid format
pub fn verify_password(password: &str, hash: &str) -> Result<bool, AppError> {
    let parsed_hash =
        PasswordHash::new(hash).map_err(|_| AppError::config("Invalid password hash format"))?;
    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed_hash)
        .is_ok())
}

/// The configured admin account.
#[derive(Debug, Clone)]
pub struct AdminCredentials {
    pub email: String,
    password_hash: String,
}

impl AdminCredentials {
    /// Use an existing Argon2 hash (e.g. from `ADMIN_PASSWORD_HASH`).
    pub fn from_hash(email: impl Into<String>, password_hash: impl Into<String>) -> Result<Self, AppError> {
        let password_hash = password_hash.into();
        PasswordHash::new(&password_hash)
            .map_err(|_| AppError::config("ADMIN_PASSWORD_HASH is not a valid Argon2 hash"))?;
        Ok(Self {
            email: email.into(),
            password_hash,
        })
    }

    /// Hash a plaintext password once at startup.
    pub fn from_password(email: impl Into<String>, password: &str) -> Result<Self, AppError> {
        Ok(Self {
            email: email.into(),
            password_hash: hash_password(password)?,
        })
    }

    /// Check an email/password pair. Emails compare case-insensitively.
    pub fn verify(&self, email: &str, password: &str) -> Result<bool, AppError> {
        let password_ok = verify_password(password, &self.password_hash)?;
        Ok(password_ok && email.trim().eq_ignore_ascii_case(self.email.trim()))
    }
}

/// Login form body.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct LoginForm {
    pub email: String,
    pub password: String,
}

impl LoginForm {
    pub fn validate(&self) -> Result<(), AppError> {
        let mut errors = FieldErrors::new();
        for (field, check) in [
            ("email", validate_email(&self.email)),
            ("password", validate_required(&self.password, "Password")),
        ] {
            if let Some(message) = check.error() {
                errors.insert(field.to_string(), message.to_string());
            }
        }
        if errors.is_empty() {
            Ok(())
        } else {
            Err(AppError::validation(errors))
        }
    }
}

/// Per-session admin state that spans requests.
#[derive(Debug, Default)]
pub struct Workspace {
    pub testers: Selection,
    pub feedback: Selection,
    pub invitations: Selection,
    /// Feedback card being dragged on the persisted board.
    pub kanban_drag: Option<Uuid>,
    /// Board built from the last CSV upload.
    pub import: Option<Board<ImportedFeedback>>,
}

#[derive(Debug)]
struct Session {
    email: String,
    expires_at: SystemTime,
    workspace: Arc<Mutex<Workspace>>,
    progress: Arc<ProgressTracker>,
}

/// A validated session, handed to admin handlers as a request extension.
#[derive(Debug, Clone)]
pub struct AdminSession {
    pub id: String,
    pub email: String,
    workspace: Arc<Mutex<Workspace>>,
    progress: Arc<ProgressTracker>,
}

impl AdminSession {
    /// Run `f` against the session workspace.
    ///
    /// The lock is released when `f` returns, so `f` cannot await.
    pub fn with_workspace<R>(&self, f: impl FnOnce(&mut Workspace) -> R) -> Result<R, AppError> {
        let mut workspace = self
            .workspace
            .lock()
            .map_err(|_| AppError::internal("Session workspace lock poisoned"))?;
        Ok(f(&mut workspace))
    }

    pub fn progress(&self) -> &ProgressTracker {
        &self.progress
    }
}

/// In-memory session table.
#[derive(Debug, Default)]
pub struct SessionStore {
    sessions: RwLock<HashMap<String, Session>>,
}

impl SessionStore {
    /// Create a new 24h session for `email`
    ///
    /// # Returns
    /// * `Result<String, AppError>` - A unique session ID
    pub fn create(&self, email: &str) -> Result<String, AppError> {
        let session_id = Uuid::new_v4().to_string();
        let session = Session {
            email: email.to_string(),
            expires_at: SystemTime::now() + Duration::from_secs(SESSION_DURATION),
            workspace: Arc::default(),
            progress: Arc::default(),
        };

        let mut sessions = self
            .sessions
            .write()
            .map_err(|_| AppError::internal("Session table lock poisoned"))?;
        sessions.retain(|_, s| s.expires_at > SystemTime::now());
        sessions.insert(session_id.clone(), session);
        Ok(session_id)
    }

    /// Look up a session that has not expired.
    pub fn validate(&self, session_id: &str) -> Option<AdminSession> {
        let sessions = self.sessions.read().ok()?;
        let session = sessions.get(session_id)?;
        if session.expires_at <= SystemTime::now() {
            return None;
        }
        Some(AdminSession {
            id: session_id.to_string(),
            email: session.email.clone(),
            workspace: Arc::clone(&session.workspace),
            progress: Arc::clone(&session.progress),
        })
    }

    pub fn remove(&self, session_id: &str) {
        if let Ok(mut sessions) = self.sessions.write() {
            sessions.remove(session_id);
        }
    }
}

#[derive(Debug, Serialize)]
pub struct SessionInfo {
    pub email: String,
}

/// Handle admin login requests
///
/// Validates the form, checks the configured credentials and sets an
/// `HttpOnly` session cookie on success.
///
/// # Returns
/// * `Result<(CookieJar, Json<SessionInfo>), AppError>` - The cookie and the
///   signed-in email, or a validation/authentication error
pub async fn handle_login(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    Json(form): Json<LoginForm>,
) -> Result<(CookieJar, Json<SessionInfo>), AppError> {
    form.validate()?;

    let Some(admin) = &state.admin else {
        log::warn!("Admin login attempted but no admin account is configured");
        return Err(AppError::authentication(INVALID_CREDENTIALS));
    };
    if !admin.verify(&form.email, &form.password)? {
        log::warn!("Failed admin login for {}", form.email.trim());
        return Err(AppError::authentication(INVALID_CREDENTIALS));
    }

    let session_id = state.sessions.create(&admin.email)?;
    let cookie = Cookie::build((SESSION_COOKIE, session_id))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax);
    log::info!("Admin {} signed in", admin.email);
    Ok((
        jar.add(cookie),
        Json(SessionInfo {
            email: admin.email.clone(),
        }),
    ))
}

/// Handle admin logout
///
/// Drops the server-side session and clears the cookie.
pub async fn handle_logout(State(state): State<Arc<AppState>>, jar: CookieJar) -> (CookieJar, StatusCode) {
    if let Some(cookie) = jar.get(SESSION_COOKIE) {
        state.sessions.remove(cookie.value());
    }
    (
        jar.remove(Cookie::build(SESSION_COOKIE).path("/")),
        StatusCode::NO_CONTENT,
    )
}

/// Who is signed in.
pub async fn session_info(Extension(session): Extension<AdminSession>) -> Json<SessionInfo> {
    Json(SessionInfo {
        email: session.email,
    })
}

/// Authentication middleware
///
/// Lets the request through with an [`AdminSession`] extension when the
/// `session` cookie names a live session, otherwise answers `401`.
///
/// # Arguments
/// * `state` - Shared application state holding the session table
/// * `jar` - Cookie jar containing session information
/// * `request` - The incoming request
/// * `next` - Next middleware in the chain
pub async fn require_auth(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    mut request: axum::extract::Request,
    next: axum::middleware::Next,
) -> Response {
    if let Some(session) = jar
        .get(SESSION_COOKIE)
        .and_then(|cookie| state.sessions.validate(cookie.value()))
    {
        request.extensions_mut().insert(session);
        return next.run(request).await;
    }
    AppError::authentication("Please sign in to continue.").into_response()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_and_verify() {
        let hash = hash_password("s3cret!").unwrap();
        assert!(verify_password("s3cret!", &hash).unwrap());
        assert!(!verify_password("wrong", &hash).unwrap());
        assert!(verify_password("s3cret!", "not-a-hash").is_err());
    }

    #[test]
    fn test_admin_credentials() {
        let admin = AdminCredentials::from_password("Admin@Example.com", "pw").unwrap();
        assert!(admin.verify(" admin@example.com ", "pw").unwrap());
        assert!(!admin.verify("other@example.com", "pw").unwrap());
        assert!(!admin.verify("admin@example.com", "nope").unwrap());
        assert!(AdminCredentials::from_hash("a@b.com", "plaintext").is_err());
    }

    #[test]
    fn test_login_form_validation() {
        let err = LoginForm {
            email: "foo@bar".into(),
            password: String::new(),
        }
        .validate()
        .unwrap_err();
        match err {
            AppError::Validation { errors } => {
                assert_eq!(errors["email"], "Please enter a valid email address");
                assert_eq!(errors["password"], "Password is required");
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_sessions_share_workspace() {
        let store = SessionStore::default();
        let id = store.create("admin@example.com").unwrap();

        let first = store.validate(&id).unwrap();
        let tester = Uuid::new_v4();
        first.with_workspace(|ws| ws.testers.toggle(tester)).unwrap();

        let second = store.validate(&id).unwrap();
        assert!(second.with_workspace(|ws| ws.testers.contains(&tester)).unwrap());

        store.remove(&id);
        assert!(store.validate(&id).is_none());
        assert!(store.validate("unknown").is_none());
    }
}
