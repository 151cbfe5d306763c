//! Registration, login, and session handling, plus the request extractor and
//! role gate the rest of the API relies on.
//!
//! Passwords are stored as Argon2 hashes. Session tokens are 32 random bytes,
//! handed to the client hex-encoded and stored server-side only as a SHA-256
//! digest with a 24-hour absolute expiry.

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use axum::{
    async_trait,
    extract::{FromRequestParts, State},
    http::{request::Parts, HeaderMap, StatusCode},
    Json,
};
use lazy_static::lazy_static;
use rand::Rng;
use sha2::{Digest, Sha256};
use std::sync::Arc;

use crate::config::AuthConfig;
use crate::db::{
    DbPool, LoginRequest, LoginResponse, RegisterRequest, User, UserResponse, ROLE_ADMIN,
    ROLE_USER,
};
use crate::AppState;

use super::error::{ApiError, ValidationErrorBuilder};
use super::MessageResponse;

/// Absolute session lifetime.
const SESSION_TTL_HOURS: i64 = 24;

lazy_static! {
    /// Hash verified against when a login names an unknown email, so that the
    /// unknown-email and wrong-password paths cost the same.
    static ref DUMMY_HASH: String =
        hash_password("not-a-real-password").expect("hashing a fixed string cannot fail");
}

/// Hash a password using Argon2
pub fn hash_password(password: &str) -> Result<String, argon2::password_hash::Error> {
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();
    let hash = argon2.hash_password(password.as_bytes(), &salt)?;
    Ok(hash.to_string())
}

/// Verify a password against a hash
pub fn verify_password(password: &str, hash: &str) -> bool {
    let parsed_hash = match PasswordHash::new(hash) {
        Ok(h) => h,
        Err(_) => return false,
    };
    Argon2::default()
        .verify_password(password.as_bytes(), &parsed_hash)
        .is_ok()
}

/// Generate a random session token
fn generate_token() -> String {
    let mut rng = rand::rng();
    let bytes: [u8; 32] = rng.random();
    hex::encode(bytes)
}

/// Hash a token for storage
pub(crate) fn hash_token(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    hex::encode(hasher.finalize())
}

/// Expiry timestamp in SQLite's datetime() format so it compares directly
/// against datetime('now') in queries.
fn session_expiry() -> String {
    (chrono::Utc::now() + chrono::Duration::hours(SESSION_TTL_HOURS))
        .format("%Y-%m-%d %H:%M:%S")
        .to_string()
}

/// Create a session row for a user and return the bearer token.
async fn create_session(pool: &DbPool, user_id: &str) -> Result<String, sqlx::Error> {
    let token = generate_token();
    let session_id = uuid::Uuid::new_v4().to_string();

    sqlx::query(
        "INSERT INTO sessions (id, user_id, token_hash, expires_at, created_at) \
         VALUES (?, ?, ?, ?, ?)",
    )
    .bind(&session_id)
    .bind(user_id)
    .bind(hash_token(&token))
    .bind(session_expiry())
    .bind(chrono::Utc::now().to_rfc3339())
    .execute(pool)
    .await?;

    Ok(token)
}

/// Register endpoint. The role is always `user`; admins exist only through
/// the first-run bootstrap.
pub async fn register(
    State(state): State<Arc<AppState>>,
    Json(request): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<MessageResponse>), ApiError> {
    let mut errors = ValidationErrorBuilder::new();
    if request.name.trim().is_empty() {
        errors.add("name", "Name is required");
    }
    if request.email.trim().is_empty() || !request.email.contains('@') {
        errors.add("email", "A valid email address is required");
    }
    if request.password.is_empty() {
        errors.add("password", "Password is required");
    }
    errors.finish()?;

    let password_hash = hash_password(&request.password)
        .map_err(|e| ApiError::internal(format!("Failed to hash password: {}", e)))?;

    let result = sqlx::query(
        "INSERT INTO users (id, name, email, password_hash, role, created_at) \
         VALUES (?, ?, ?, ?, ?, ?)",
    )
    .bind(uuid::Uuid::new_v4().to_string())
    .bind(request.name.trim())
    .bind(request.email.trim())
    .bind(&password_hash)
    .bind(ROLE_USER)
    .bind(chrono::Utc::now().to_rfc3339())
    .execute(&state.db)
    .await;

    match result {
        Ok(_) => {
            tracing::info!("Registered user {}", request.email.trim());
            Ok((
                StatusCode::CREATED,
                Json(MessageResponse::new("User registered successfully")),
            ))
        }
        Err(sqlx::Error::Database(db_err))
            if db_err.message().contains("UNIQUE constraint failed") =>
        {
            Err(ApiError::conflict("Email already exists"))
        }
        Err(e) => Err(e.into()),
    }
}

/// Login endpoint
pub async fn login(
    State(state): State<Arc<AppState>>,
    Json(request): Json<LoginRequest>,
) -> Result<Json<LoginResponse>, ApiError> {
    let user: Option<User> = sqlx::query_as("SELECT * FROM users WHERE email = ?")
        .bind(request.email.trim())
        .fetch_optional(&state.db)
        .await?;

    // Unknown email and wrong password must be indistinguishable, in both
    // error and latency, so always run one verification.
    let verified = match &user {
        Some(user) => verify_password(&request.password, &user.password_hash),
        None => {
            verify_password(&request.password, &DUMMY_HASH);
            false
        }
    };

    let user = match (user, verified) {
        (Some(user), true) => user,
        _ => return Err(ApiError::unauthorized("Invalid credentials")),
    };

    let token = create_session(&state.db, &user.id).await?;

    Ok(Json(LoginResponse {
        token,
        user: UserResponse::from(user),
    }))
}

/// Return the authenticated caller, or 401 via the extractor.
pub async fn session(user: User) -> Json<UserResponse> {
    Json(UserResponse::from(user))
}

/// Logout endpoint: drops the caller's session row.
pub async fn logout(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Json<MessageResponse>, ApiError> {
    let token =
        extract_token(&headers).ok_or_else(|| ApiError::unauthorized("Not logged in"))?;

    sqlx::query("DELETE FROM sessions WHERE token_hash = ?")
        .bind(hash_token(&token))
        .execute(&state.db)
        .await?;

    Ok(Json(MessageResponse::new("Logged out")))
}

/// Extract the bearer token from request headers
fn extract_token(headers: &HeaderMap) -> Option<String> {
    let auth_header = headers.get("Authorization").and_then(|h| h.to_str().ok())?;
    auth_header
        .strip_prefix("Bearer ")
        .map(|token| token.to_string())
}

/// Resolve a token to its user through an unexpired session.
pub async fn get_current_user(pool: &DbPool, token: &str) -> Result<User, ApiError> {
    let user: Option<User> = sqlx::query_as(
        "SELECT u.* FROM users u \
         JOIN sessions s ON s.user_id = u.id \
         WHERE s.token_hash = ? AND s.expires_at > datetime('now')",
    )
    .bind(hash_token(token))
    .fetch_optional(pool)
    .await?;

    user.ok_or_else(|| ApiError::unauthorized("Not logged in"))
}

/// Extractor for the current authenticated user. Handlers that take a `User`
/// argument reject unauthenticated requests before their body runs.
#[async_trait]
impl FromRequestParts<Arc<AppState>> for User {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let token = extract_token(&parts.headers)
            .ok_or_else(|| ApiError::unauthorized("Not logged in"))?;
        get_current_user(&state.db, &token).await
    }
}

/// Role gate for admin-only operations.
pub fn require_admin(user: &User) -> Result<(), ApiError> {
    if user.is_admin() {
        Ok(())
    } else {
        Err(ApiError::forbidden("This action requires the admin role"))
    }
}

/// Seed one administrator account on first run if none exists.
pub async fn ensure_admin_user(pool: &DbPool, auth: &AuthConfig) -> anyhow::Result<()> {
    let count: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM users WHERE role = ?")
        .bind(ROLE_ADMIN)
        .fetch_one(pool)
        .await?;

    if count.0 > 0 {
        return Ok(());
    }

    let password_hash = hash_password(&auth.admin_password)
        .map_err(|e| anyhow::anyhow!("Failed to hash admin password: {}", e))?;

    sqlx::query(
        "INSERT INTO users (id, name, email, password_hash, role, created_at) \
         VALUES (?, ?, ?, ?, ?, ?)",
    )
    .bind(uuid::Uuid::new_v4().to_string())
    .bind(&auth.admin_name)
    .bind(&auth.admin_email)
    .bind(&password_hash)
    .bind(ROLE_ADMIN)
    .bind(chrono::Utc::now().to_rfc3339())
    .execute(pool)
    .await?;

    tracing::info!("Created default admin account {}", auth.admin_email);
    tracing::info!("Admin password: {}", auth.admin_password);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::db;
    use crate::events::EventBus;

    async fn test_state() -> Arc<AppState> {
        let pool = db::test_pool().await;
        Arc::new(AppState::new(Config::default(), pool, EventBus::default()))
    }

    fn register_request(name: &str, email: &str, password: &str) -> RegisterRequest {
        RegisterRequest {
            name: name.to_string(),
            email: email.to_string(),
            password: password.to_string(),
        }
    }

    #[test]
    fn test_password_hash_round_trip() {
        let hash = hash_password("s3cret-passphrase").unwrap();
        assert_ne!(hash, "s3cret-passphrase");
        assert!(verify_password("s3cret-passphrase", &hash));
        assert!(!verify_password("wrong", &hash));
        assert!(!verify_password("s3cret-passphrase", "not-a-hash"));
    }

    #[test]
    fn test_token_hash_is_stable() {
        let token = generate_token();
        assert_eq!(token.len(), 64);
        assert_eq!(hash_token(&token), hash_token(&token));
        assert_ne!(hash_token(&token), token);
    }

    #[tokio::test]
    async fn test_register_assigns_user_role() {
        let state = test_state().await;
        let (status, _) = register(
            State(state.clone()),
            Json(register_request("Ann", "ann@example.com", "pw")),
        )
        .await
        .unwrap();
        assert_eq!(status, StatusCode::CREATED);

        let user: User = sqlx::query_as("SELECT * FROM users WHERE email = ?")
            .bind("ann@example.com")
            .fetch_one(&state.db)
            .await
            .unwrap();
        assert_eq!(user.role, ROLE_USER);
        assert!(!user.is_admin());
        assert_ne!(user.password_hash, "pw");
    }

    #[tokio::test]
    async fn test_register_duplicate_email_conflicts() {
        let state = test_state().await;
        register(
            State(state.clone()),
            Json(register_request("Ann", "ann@example.com", "pw")),
        )
        .await
        .unwrap();

        let err = register(
            State(state.clone()),
            Json(register_request("Imposter", "ann@example.com", "other")),
        )
        .await
        .unwrap_err();
        assert_eq!(err.status(), StatusCode::CONFLICT);

        // The existing account is untouched
        let user: User = sqlx::query_as("SELECT * FROM users WHERE email = ?")
            .bind("ann@example.com")
            .fetch_one(&state.db)
            .await
            .unwrap();
        assert_eq!(user.name, "Ann");
        assert!(verify_password("pw", &user.password_hash));
    }

    #[tokio::test]
    async fn test_register_rejects_missing_fields() {
        let state = test_state().await;
        let err = register(
            State(state),
            Json(register_request("", "not-an-email", "")),
        )
        .await
        .unwrap_err();
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_login_errors_are_uniform() {
        let state = test_state().await;
        register(
            State(state.clone()),
            Json(register_request("Ann", "ann@example.com", "pw")),
        )
        .await
        .unwrap();

        let unknown = login(
            State(state.clone()),
            Json(LoginRequest {
                email: "ghost@example.com".to_string(),
                password: "pw".to_string(),
            }),
        )
        .await
        .unwrap_err();
        let wrong = login(
            State(state.clone()),
            Json(LoginRequest {
                email: "ann@example.com".to_string(),
                password: "nope".to_string(),
            }),
        )
        .await
        .unwrap_err();

        assert_eq!(unknown.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(wrong.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(unknown.message(), wrong.message());
    }

    #[tokio::test]
    async fn test_login_and_token_lookup() {
        let state = test_state().await;
        register(
            State(state.clone()),
            Json(register_request("Ann", "ann@example.com", "pw")),
        )
        .await
        .unwrap();

        let response = login(
            State(state.clone()),
            Json(LoginRequest {
                email: "ann@example.com".to_string(),
                password: "pw".to_string(),
            }),
        )
        .await
        .unwrap();

        let user = get_current_user(&state.db, &response.token).await.unwrap();
        assert_eq!(user.email, "ann@example.com");

        assert!(get_current_user(&state.db, "bogus-token").await.is_err());
    }

    #[tokio::test]
    async fn test_expired_session_is_rejected() {
        let state = test_state().await;
        register(
            State(state.clone()),
            Json(register_request("Ann", "ann@example.com", "pw")),
        )
        .await
        .unwrap();
        let user: User = sqlx::query_as("SELECT * FROM users WHERE email = ?")
            .bind("ann@example.com")
            .fetch_one(&state.db)
            .await
            .unwrap();

        let token = generate_token();
        sqlx::query(
            "INSERT INTO sessions (id, user_id, token_hash, expires_at, created_at) \
             VALUES (?, ?, ?, ?, ?)",
        )
        .bind(uuid::Uuid::new_v4().to_string())
        .bind(&user.id)
        .bind(hash_token(&token))
        .bind("2020-01-01 00:00:00")
        .bind(chrono::Utc::now().to_rfc3339())
        .execute(&state.db)
        .await
        .unwrap();

        assert!(get_current_user(&state.db, &token).await.is_err());
    }

    #[tokio::test]
    async fn test_logout_invalidates_token() {
        let state = test_state().await;
        register(
            State(state.clone()),
            Json(register_request("Ann", "ann@example.com", "pw")),
        )
        .await
        .unwrap();
        let response = login(
            State(state.clone()),
            Json(LoginRequest {
                email: "ann@example.com".to_string(),
                password: "pw".to_string(),
            }),
        )
        .await
        .unwrap();

        let mut headers = HeaderMap::new();
        headers.insert(
            "Authorization",
            format!("Bearer {}", response.token).parse().unwrap(),
        );
        logout(State(state.clone()), headers).await.unwrap();

        assert!(get_current_user(&state.db, &response.token).await.is_err());
    }

    #[tokio::test]
    async fn test_ensure_admin_user_is_idempotent() {
        let state = test_state().await;
        let auth = state.config.auth.clone();

        ensure_admin_user(&state.db, &auth).await.unwrap();
        ensure_admin_user(&state.db, &auth).await.unwrap();

        let count: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM users WHERE role = 'admin'")
            .fetch_one(&state.db)
            .await
            .unwrap();
        assert_eq!(count.0, 1);

        let admin: User = sqlx::query_as("SELECT * FROM users WHERE role = 'admin'")
            .fetch_one(&state.db)
            .await
            .unwrap();
        assert!(require_admin(&admin).is_ok());
    }

    #[tokio::test]
    async fn test_require_admin_rejects_users() {
        let state = test_state().await;
        register(
            State(state.clone()),
            Json(register_request("Ann", "ann@example.com", "pw")),
        )
        .await
        .unwrap();
        let user: User = sqlx::query_as("SELECT * FROM users WHERE email = ?")
            .bind("ann@example.com")
            .fetch_one(&state.db)
            .await
            .unwrap();

        let err = require_admin(&user).unwrap_err();
        assert_eq!(err.status(), StatusCode::FORBIDDEN);
    }
}
