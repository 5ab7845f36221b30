use axum::{
    extract::{rejection::JsonRejection, Path, State},
    middleware,
    routing::{get, patch, post},
    Json, Router,
};
use tracing::instrument;

use super::{
    dto::{ChangePasswordRequest, LoginRequest, LoginResponse, PublicAccount, RegisterRequest},
    extractors::AuthUser,
    gate::require_auth,
    services,
};
use crate::{accounts::AccountView, error::AppError, state::AppState};

pub fn public_routes() -> Router<AppState> {
    Router::new()
        .route("/register", post(register))
        .route("/login", post(login))
}

/// Every route here sits behind the bearer-token gate.
pub fn protected_routes(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/change-password/:username", patch(change_password))
        .route("/me", get(get_me))
        .route_layer(middleware::from_fn_with_state(state, require_auth))
}

#[instrument(skip(state, payload))]
pub async fn register(
    State(state): State<AppState>,
    payload: Result<Json<RegisterRequest>, JsonRejection>,
) -> Result<Json<PublicAccount>, AppError> {
    let Json(payload) = payload?;
    let account = services::register(state.accounts.as_ref(), payload).await?;
    Ok(Json(account))
}

#[instrument(skip(state, payload))]
pub async fn login(
    State(state): State<AppState>,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> Result<Json<LoginResponse>, AppError> {
    let Json(payload) = payload?;
    let resp = services::login(state.accounts.as_ref(), &state.jwt, payload).await?;
    Ok(Json(resp))
}

#[instrument(skip(state, actor, payload), fields(actor = %actor.sub))]
pub async fn change_password(
    State(state): State<AppState>,
    AuthUser(actor): AuthUser,
    Path(username): Path<String>,
    payload: Result<Json<ChangePasswordRequest>, JsonRejection>,
) -> Result<Json<AccountView>, AppError> {
    let Json(payload) = payload?;
    let view =
        services::change_password(state.accounts.as_ref(), &actor, &username, payload).await?;
    Ok(Json(view))
}

#[instrument(skip(state, claims), fields(subject = %claims.sub))]
pub async fn get_me(
    State(state): State<AppState>,
    AuthUser(claims): AuthUser,
) -> Result<Json<AccountView>, AppError> {
    let view = services::current_account(state.accounts.as_ref(), &claims).await?;
    Ok(Json(view))
}
