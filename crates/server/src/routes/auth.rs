use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use axum::{extract::State, http::StatusCode, routing::post, Json, Router};
use chrono::Utc;
use jsonwebtoken::{encode, EncodingKey, Header};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    config::Config,
    db::models::ProfileType,
    error::{AppError, Result},
    AppState,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/signup", post(signup))
        .route("/login", post(login))
}

#[derive(Debug, Deserialize)]
pub struct SignupRequest {
    pub username: String,
    pub email: String,
    pub password: String,
    pub profile_type: Option<ProfileType>,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct AuthResponse {
    pub token: String,
    pub user: UserResponse,
}

#[derive(Debug, Serialize)]
pub struct UserResponse {
    pub id: String,
    pub username: String,
    pub email: String,
    pub profile_type: ProfileType,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String, // user id
    pub username: String,
    pub email: String,
    pub exp: usize,
}

fn hash_password(password: &str) -> Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();
    argon2
        .hash_password(password.as_bytes(), &salt)
        .map(|h| h.to_string())
        .map_err(|_| AppError::Internal("Failed to hash password".to_string()))
}

fn verify_password(password: &str, hash: &str) -> Result<bool> {
    let parsed_hash = PasswordHash::new(hash)
        .map_err(|_| AppError::Internal("Invalid password hash".to_string()))?;
    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed_hash)
        .is_ok())
}

/// A concurrent signup can pass the existence check and still lose the
/// insert on the unique email or username.
fn duplicate_user(err: sqlx::Error) -> AppError {
    match err {
        sqlx::Error::Database(e) if e.is_unique_violation() => {
            AppError::Validation("User already exists".to_string())
        }
        other => other.into(),
    }
}

pub fn create_token(user_id: &str, username: &str, email: &str, config: &Config) -> Result<String> {
    let expiration = chrono::Duration::try_days(config.token_ttl_days)
        .and_then(|ttl| Utc::now().checked_add_signed(ttl))
        .ok_or_else(|| AppError::Internal("Token expiry out of range".to_string()))?
        .timestamp() as usize;

    let claims = Claims {
        sub: user_id.to_string(),
        username: username.to_string(),
        email: email.to_string(),
        exp: expiration,
    };

    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(config.jwt_secret.as_bytes()),
    )
    .map_err(|_| AppError::Internal("Failed to create token".to_string()))
}

async fn signup(
    State(state): State<AppState>,
    Json(body): Json<SignupRequest>,
) -> Result<(StatusCode, Json<AuthResponse>)> {
    let username = body.username.trim().to_string();
    let email = body.email.trim().to_string();

    // Validate input
    if username.is_empty() {
        return Err(AppError::Validation("Username is required".to_string()));
    }
    if email.is_empty() || !email.contains('@') {
        return Err(AppError::Validation("Invalid email address".to_string()));
    }
    if body.password.len() < 8 {
        return Err(AppError::Validation(
            "Password must be at least 8 characters".to_string(),
        ));
    }

    // Check if user already exists
    let existing =
        sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM users WHERE email = ? OR username = ?")
            .bind(&email)
            .bind(&username)
            .fetch_one(&state.db.pool)
            .await?;

    if existing > 0 {
        return Err(AppError::Validation("User already exists".to_string()));
    }

    let password_hash = hash_password(&body.password)?;
    let profile_type = body.profile_type.unwrap_or(ProfileType::Creator);

    let user_id = Uuid::new_v4().to_string();
    let now = Utc::now().to_rfc3339();

    sqlx::query(
        "INSERT INTO users (id, username, email, password_hash, profile_type, created_at, updated_at) VALUES (?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(&user_id)
    .bind(&username)
    .bind(&email)
    .bind(&password_hash)
    .bind(profile_type.as_str())
    .bind(&now)
    .bind(&now)
    .execute(&state.db.pool)
    .await
    .map_err(duplicate_user)?;

    tracing::info!(user_id = %user_id, username = %username, "User signed up");

    let token = create_token(&user_id, &username, &email, &state.config)?;

    Ok((
        StatusCode::CREATED,
        Json(AuthResponse {
            token,
            user: UserResponse {
                id: user_id,
                username,
                email,
                profile_type,
            },
        }),
    ))
}

async fn login(
    State(state): State<AppState>,
    Json(body): Json<LoginRequest>,
) -> Result<Json<AuthResponse>> {
    let user = sqlx::query_as::<_, (String, String, String, String, ProfileType)>(
        "SELECT id, username, email, password_hash, profile_type FROM users WHERE email = ?",
    )
    .bind(body.email.trim())
    .fetch_optional(&state.db.pool)
    .await?
    .ok_or(AppError::Unauthorized)?;

    let (user_id, username, email, password_hash, profile_type) = user;

    if !verify_password(&body.password, &password_hash)? {
        return Err(AppError::Unauthorized);
    }

    let token = create_token(&user_id, &username, &email, &state.config)?;

    Ok(Json(AuthResponse {
        token,
        user: UserResponse {
            id: user_id,
            username,
            email,
            profile_type,
        },
    }))
}

#[cfg(test)]
mod tests {
    use axum::http::StatusCode;
    use serde_json::json;

    use super::*;
    use crate::test_support::{insert_user, send, TestApp};

    #[tokio::test]
    async fn signup_then_login_returns_tokens() {
        let app = TestApp::new().await;

        let (status, body) = send(
            &app.router,
            "POST",
            "/api/auth/signup",
            None,
            Some(json!({
                "username": "maya",
                "email": "maya@example.com",
                "password": "correct-horse",
                "profile_type": "brand",
            })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["user"]["profile_type"], "brand");
        assert!(body["token"].as_str().is_some());

        let (status, body) = send(
            &app.router,
            "POST",
            "/api/auth/login",
            None,
            Some(json!({ "email": "maya@example.com", "password": "correct-horse" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["user"]["username"], "maya");
    }

    #[tokio::test]
    async fn login_rejects_wrong_password() {
        let app = TestApp::new().await;
        app.signup("maya").await;

        let (status, _) = send(
            &app.router,
            "POST",
            "/api/auth/login",
            None,
            Some(json!({ "email": "maya@example.com", "password": "wrong-password" })),
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn signup_rejects_duplicates_and_short_passwords() {
        let app = TestApp::new().await;
        app.signup("maya").await;

        let (status, body) = send(
            &app.router,
            "POST",
            "/api/auth/signup",
            None,
            Some(json!({
                "username": "maya",
                "email": "other@example.com",
                "password": "long-enough",
            })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["message"], "User already exists");

        let (status, _) = send(
            &app.router,
            "POST",
            "/api/auth/signup",
            None,
            Some(json!({ "username": "li", "email": "li@example.com", "password": "short" })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn unique_violations_on_insert_read_as_duplicates() {
        let app = TestApp::new().await;
        let pool = &app.state.db.pool;
        insert_user(pool, "maya").await;

        // Same username, inserted directly as a racing signup would
        let err = sqlx::query(
            "INSERT INTO users (id, username, email, password_hash, created_at, updated_at)
             VALUES ('other-id', 'maya', 'maya2@example.com', 'x', 'now', 'now')",
        )
        .execute(pool)
        .await
        .unwrap_err();

        match duplicate_user(err) {
            AppError::Validation(msg) => assert_eq!(msg, "User already exists"),
            other => panic!("unexpected error: {other:?}"),
        }

        let err = sqlx::query("SELECT * FROM missing_table")
            .execute(pool)
            .await
            .unwrap_err();
        assert!(matches!(duplicate_user(err), AppError::Database(_)));
    }

    #[test]
    fn out_of_range_token_ttl_is_an_error() {
        let mut config = Config::for_tests(String::new());
        config.token_ttl_days = i64::MAX;
        assert!(matches!(
            create_token("id", "maya", "maya@example.com", &config),
            Err(AppError::Internal(_))
        ));

        config.token_ttl_days = 7;
        assert!(create_token("id", "maya", "maya@example.com", &config).is_ok());
    }

    #[tokio::test]
    async fn protected_routes_require_a_valid_token() {
        let app = TestApp::new().await;

        let (status, _) = send(&app.router, "GET", "/api/profile", None, None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        let (status, _) = send(&app.router, "GET", "/api/profile", Some("garbage"), None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }
}
