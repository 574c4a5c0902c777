use axum::{
    extract::{FromRef, State},
    http::StatusCode,
    routing::post,
    Json, Router,
};
use tracing::{info, instrument, warn};

use super::{
    credentials::{check_password_policy, hash_password, normalize_email, verify_password},
    dto::{LoginRequest, RefreshRequest, SessionResponse, SignupRequest},
    tokens::{JwtKeys, TokenKind},
};
use crate::{
    email,
    error::{AppError, AppResult},
    state::AppState,
    users::{
        bmi::BodyProfile,
        handlers::{parse_goal_type, validate_body},
        repo::{NewUser, User},
    },
};

pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/auth/register", post(register))
        .route("/auth/login", post(login))
        .route("/auth/refresh", post(refresh))
}

fn session_for(state: &AppState, user: User) -> AppResult<SessionResponse> {
    let tokens = JwtKeys::from_ref(state)
        .pair(user.id)
        .map_err(|e| AppError::Internal(e.into()))?;
    Ok(SessionResponse {
        success: true,
        tokens,
        user,
    })
}

/// Creates the account with derived BMI and goals, default email
/// preferences, and a welcome email sent in the background.
#[instrument(skip(state, payload))]
pub async fn register(
    State(state): State<AppState>,
    Json(payload): Json<SignupRequest>,
) -> AppResult<(StatusCode, Json<SessionResponse>)> {
    let email = normalize_email(&payload.email)
        .ok_or_else(|| AppError::BadRequest("Invalid email".into()))?;
    check_password_policy(&payload.password).map_err(AppError::BadRequest)?;
    let name = payload.name.trim();
    validate_body(name, payload.height_cm, payload.weight_kg)?;
    let goal_type = parse_goal_type(payload.goal_type.as_deref())?;

    if User::find_by_email(&state.db, &email).await?.is_some() {
        warn!(%email, "signup for existing email");
        return Err(AppError::Conflict("Email already registered".into()));
    }

    let password_hash = hash_password(&payload.password)?;
    let body = BodyProfile::derive(
        payload.height_cm,
        payload.weight_kg,
        goal_type,
        payload.calorie_goal,
        payload.protein_goal,
    );
    let user = User::create(
        &state.db,
        NewUser {
            name,
            email: &email,
            password_hash: &password_hash,
            height_cm: payload.height_cm,
            weight_kg: payload.weight_kg,
            body: &body,
        },
    )
    .await?;

    if let Err(e) = email::repo::ensure_preferences(&state.db, user.id).await {
        warn!(error = %e, user_id = user.id, "default email preferences not created");
    }
    {
        let state = state.clone();
        let user = user.clone();
        tokio::spawn(async move { email::notify::send_welcome(&state, &user).await });
    }

    info!(user_id = user.id, bmi = user.bmi, goal = %user.goal_type, "user registered");
    Ok((StatusCode::CREATED, Json(session_for(&state, user)?)))
}

#[instrument(skip(state, payload))]
pub async fn login(
    State(state): State<AppState>,
    Json(payload): Json<LoginRequest>,
) -> AppResult<Json<SessionResponse>> {
    let invalid = || AppError::Unauthorized("Invalid credentials".into());
    let email = normalize_email(&payload.email).ok_or_else(invalid)?;

    let Some(user) = User::find_by_email(&state.db, &email).await? else {
        warn!(%email, "login for unknown email");
        return Err(invalid());
    };
    if !verify_password(&payload.password, &user.password_hash)? {
        warn!(user_id = user.id, "login with wrong password");
        return Err(invalid());
    }

    info!(user_id = user.id, "user logged in");
    Ok(Json(session_for(&state, user)?))
}

#[instrument(skip(state, payload))]
pub async fn refresh(
    State(state): State<AppState>,
    Json(payload): Json<RefreshRequest>,
) -> AppResult<Json<SessionResponse>> {
    let claims = JwtKeys::from_ref(&state)
        .verify(&payload.refresh_token, TokenKind::Refresh)
        .map_err(|e| AppError::Unauthorized(e.to_string()))?;

    let user = User::find_by_id(&state.db, claims.sub)
        .await?
        .ok_or_else(|| AppError::Unauthorized("User not found".into()))?;
    Ok(Json(session_for(&state, user)?))
}
