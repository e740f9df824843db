use argon2::{
    Argon2, PasswordHash, PasswordHasher, PasswordVerifier,
    password_hash::{SaltString, rand_core::OsRng},
};
use axum::{Json, extract::State, http::StatusCode, response::IntoResponse};
use axum_extra::extract::WithRejection;
use tracing::{info, warn};
use uuid::Uuid;

use itemboard_db::NewUser;
use itemboard_db::models::UserRow;
use itemboard_types::api::{LoginRequest, LoginResponse, RefreshRequest, SignupRequest, TokenPair};
use itemboard_types::models::{Role, User};

use crate::error::{ApiError, ApiResult};
use crate::state::{AppState, run_db};
use crate::tokens::{self, TokenKind};

/// POST /api/auth/signup: create an account with the `user` role.
pub async fn signup(
    State(state): State<AppState>,
    WithRejection(Json(req), _): WithRejection<Json<SignupRequest>, ApiError>,
) -> ApiResult<impl IntoResponse> {
    let (Some(email), Some(password), Some(name)) = (
        non_blank(req.email),
        req.password.filter(|p| !p.is_empty()),
        non_blank(req.name),
    ) else {
        return Err(ApiError::bad_request("Missing required fields"));
    };
    let email = email.to_lowercase();

    let user = User {
        id: Uuid::new_v4(),
        email,
        name,
        role: Role::User,
    };

    let new_user = user.clone();
    let created = run_db(&state, "Signup failed", move |db| {
        if db.get_user_by_email(&new_user.email)?.is_some() {
            return Ok(false);
        }
        // Argon2 hashing runs on the blocking pool as well.
        let password_hash = hash_password(&password)?;
        db.create_user(&NewUser {
            id: new_user.id.to_string(),
            email: new_user.email,
            password_hash,
            name: new_user.name,
            role: new_user.role,
        })
    })
    .await?;

    if !created {
        return Err(ApiError::bad_request("User already exists"));
    }

    info!("New account {} ({})", user.email, user.id);
    Ok((StatusCode::CREATED, Json(user)))
}

/// POST /api/auth/login: exchange credentials for an access/refresh pair.
pub async fn login(
    State(state): State<AppState>,
    WithRejection(Json(req), _): WithRejection<Json<LoginRequest>, ApiError>,
) -> ApiResult<Json<LoginResponse>> {
    let (Some(email), Some(password)) = (non_blank(req.email), req.password.filter(|p| !p.is_empty()))
    else {
        return Err(ApiError::bad_request("Email and password required"));
    };
    let email = email.to_lowercase();

    let lookup = email.clone();
    let row = run_db(&state, "Login failed", move |db| {
        let Some(row) = db.get_user_by_email(&lookup)? else {
            return Ok(None);
        };
        Ok(verify_password(&password, &row.password).then_some(row))
    })
    .await?;

    let Some(row) = row else {
        warn!("Failed login for {}", email);
        return Err(ApiError::Unauthorized("Invalid credentials"));
    };

    let user = user_from_row(&row).map_err(ApiError::internal("Login failed"))?;
    let pair = issue_pair(&state, &user).map_err(ApiError::internal("Login failed"))?;

    let user_id = user.id.to_string();
    let refresh = pair.refresh.clone();
    run_db(&state, "Login failed", move |db| {
        db.store_refresh_token(
            &refresh.token,
            &user_id,
            &itemboard_db::format_timestamp(refresh.expires_at),
        )
    })
    .await?;

    info!("{} ({}) logged in", user.email, user.id);
    Ok(Json(LoginResponse {
        access_token: pair.access.token,
        refresh_token: pair.refresh.token,
        user,
    }))
}

/// POST /api/auth/refresh: rotate a refresh token. Each refresh token can be
/// spent exactly once.
pub async fn refresh(
    State(state): State<AppState>,
    WithRejection(Json(req), _): WithRejection<Json<RefreshRequest>, ApiError>,
) -> ApiResult<Json<TokenPair>> {
    let presented = non_blank(req.refresh_token)
        .ok_or(ApiError::Unauthorized("Refresh token required"))?;

    let claims = tokens::verify(&state.config, TokenKind::Refresh, &presented)
        .ok_or(ApiError::Unauthorized("Invalid refresh token"))?;

    let user_id = claims.sub.to_string();
    let row = run_db(&state, "Refresh failed", move |db| db.get_user_by_id(&user_id))
        .await?
        .ok_or(ApiError::Unauthorized("User not found"))?;

    // Claims in the new pair come from the stored account, not the old token.
    let user = user_from_row(&row).map_err(ApiError::internal("Refresh failed"))?;
    let pair = issue_pair(&state, &user).map_err(ApiError::internal("Refresh failed"))?;

    let user_id = user.id.to_string();
    let next = pair.refresh.clone();
    let rotated = run_db(&state, "Refresh failed", move |db| {
        db.rotate_refresh_token(
            &presented,
            &next.token,
            &user_id,
            &itemboard_db::format_timestamp(next.expires_at),
        )
    })
    .await?;

    if !rotated {
        warn!("Rejected spent or unknown refresh token for {}", user.id);
        return Err(ApiError::Unauthorized("Invalid refresh token"));
    }

    Ok(Json(TokenPair {
        access_token: pair.access.token,
        refresh_token: pair.refresh.token,
    }))
}

struct IssuedPair {
    access: tokens::IssuedToken,
    refresh: tokens::IssuedToken,
}

fn issue_pair(state: &AppState, user: &User) -> anyhow::Result<IssuedPair> {
    Ok(IssuedPair {
        access: tokens::issue(&state.config, TokenKind::Access, user.id, &user.email, user.role)?,
        refresh: tokens::issue(&state.config, TokenKind::Refresh, user.id, &user.email, user.role)?,
    })
}

/// Hash a password with Argon2id and a random salt (PHC string format).
pub fn hash_password(password: &str) -> anyhow::Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| anyhow::anyhow!("Password hashing failed: {}", e))?;
    Ok(hash.to_string())
}

/// `false` for a wrong password and for an unparseable stored hash alike.
pub fn verify_password(password: &str, stored_hash: &str) -> bool {
    match PasswordHash::new(stored_hash) {
        Ok(parsed) => Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok(),
        Err(e) => {
            warn!("Stored password hash is unreadable: {}", e);
            false
        }
    }
}

pub fn user_from_row(row: &UserRow) -> anyhow::Result<User> {
    Ok(User {
        id: row.id.parse()?,
        email: row.email.clone(),
        name: row.name.clone(),
        role: row.role.parse()?,
    })
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}
