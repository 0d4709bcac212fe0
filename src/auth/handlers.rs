use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, patch, post},
    Json, Router,
};
use tracing::instrument;

use crate::{
    auth::{
        dto::{
            AuthResponse, ForgotPasswordRequest, LoginRequest, MeResponse, ResetPasswordRequest,
            SignupRequest,
        },
        extractors::{ApiJson, AuthUser},
    },
    error::AppResult,
    state::AppState,
};

pub const FORGOT_PASSWORD_MESSAGE: &str =
    "If a user with that email exists, a password reset link has been sent.";

pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/signup", post(signup))
        .route("/login", post(login))
        .route("/forgot-password", post(forgot_password))
        .route("/reset-password/:token", patch(reset_password))
        .route("/me", get(me))
}

#[instrument(skip(state, payload))]
pub async fn signup(
    State(state): State<AppState>,
    ApiJson(payload): ApiJson<SignupRequest>,
) -> AppResult<(StatusCode, Json<AuthResponse>)> {
    let token = state.auth.signup(payload).await?;
    Ok((
        StatusCode::CREATED,
        Json(AuthResponse::with_token("User created successfully", token)),
    ))
}

#[instrument(skip(state, payload))]
pub async fn login(
    State(state): State<AppState>,
    ApiJson(payload): ApiJson<LoginRequest>,
) -> AppResult<Json<AuthResponse>> {
    let token = state.auth.login(payload).await?;
    Ok(Json(AuthResponse::with_token("Login successful", token)))
}

#[instrument(skip(state, payload))]
pub async fn forgot_password(
    State(state): State<AppState>,
    ApiJson(payload): ApiJson<ForgotPasswordRequest>,
) -> AppResult<Json<AuthResponse>> {
    state.auth.forgot_password(payload).await?;
    Ok(Json(AuthResponse::message(FORGOT_PASSWORD_MESSAGE)))
}

#[instrument(skip_all)]
pub async fn reset_password(
    State(state): State<AppState>,
    Path(token): Path<String>,
    ApiJson(payload): ApiJson<ResetPasswordRequest>,
) -> AppResult<Json<AuthResponse>> {
    let token = state.auth.reset_password(&token, payload).await?;
    Ok(Json(AuthResponse::with_token(
        "Password successfully reset.",
        token,
    )))
}

#[instrument(skip(state, principal), fields(user_id = %principal.id))]
pub async fn me(
    State(state): State<AppState>,
    AuthUser(principal): AuthUser,
) -> AppResult<Json<MeResponse>> {
    let user = state.auth.current_user(principal.id).await?;
    Ok(Json(MeResponse {
        status: "success",
        user: user.into(),
    }))
}
