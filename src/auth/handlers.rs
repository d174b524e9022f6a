use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use tracing::{info, instrument};

use crate::{
    auth::{
        dto::{
            AuthResponse, ErrorResponse, LoginRequest, PublicUser, RegisterRequest,
            StatusResponse, TokenResponse,
        },
        extractors::BearerToken,
    },
    error::IdentityError,
    state::AppState,
};

pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/auth/register", post(register))
        .route("/auth/login", post(login))
        .route("/auth/refresh", post(refresh))
}

pub fn me_routes() -> Router<AppState> {
    Router::new().route("/users/me", get(get_me).delete(delete_me))
}

/// An operation failure paired with the status its route maps it to.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    source: IdentityError,
}

impl ApiError {
    fn new(status: StatusCode, source: IdentityError) -> Self {
        Self { status, source }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let error = if self.status.is_server_error() {
            "internal server error".to_string()
        } else {
            self.source.to_string()
        };
        let body = ErrorResponse {
            error,
            code: self.source.code().to_string(),
        };
        (self.status, Json(body)).into_response()
    }
}

fn me_status(e: &IdentityError) -> StatusCode {
    match e {
        IdentityError::NilToken => StatusCode::BAD_REQUEST,
        IdentityError::InvalidToken => StatusCode::UNAUTHORIZED,
        IdentityError::UserDoesNotExist => StatusCode::NOT_FOUND,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn login_status(e: &IdentityError) -> StatusCode {
    match e {
        IdentityError::InvalidArgs => StatusCode::BAD_REQUEST,
        IdentityError::InvalidCredentials => StatusCode::UNAUTHORIZED,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn register_status(e: &IdentityError) -> StatusCode {
    match e {
        IdentityError::InvalidEmail | IdentityError::CreateUserFailed(_) => StatusCode::BAD_REQUEST,
        IdentityError::UserAlreadyExists => StatusCode::CONFLICT,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn delete_status(e: &IdentityError) -> StatusCode {
    match e {
        IdentityError::NilToken => StatusCode::BAD_REQUEST,
        IdentityError::InvalidToken | IdentityError::UserDoesNotExist => StatusCode::UNAUTHORIZED,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn refresh_status(e: &IdentityError) -> StatusCode {
    match e {
        IdentityError::NilToken | IdentityError::InvalidToken => StatusCode::BAD_REQUEST,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

#[instrument(skip(state, payload))]
pub async fn register(
    State(state): State<AppState>,
    Json(payload): Json<RegisterRequest>,
) -> Result<Json<AuthResponse>, ApiError> {
    let ctx = state.request_context();
    let outcome = state
        .service
        .register(&ctx, payload.into())
        .await
        .map_err(|e| ApiError::new(register_status(&e), e))?;
    Ok(Json(outcome.into()))
}

#[instrument(skip(state, payload))]
pub async fn login(
    State(state): State<AppState>,
    Json(payload): Json<LoginRequest>,
) -> Result<Json<AuthResponse>, ApiError> {
    let ctx = state.request_context();
    let outcome = state
        .service
        .login(&ctx, &payload.email, &payload.password)
        .await
        .map_err(|e| ApiError::new(login_status(&e), e))?;

    info!(user_id = %outcome.user.id, "user logged in");
    Ok(Json(outcome.into()))
}

#[instrument(skip(state, token))]
pub async fn refresh(
    State(state): State<AppState>,
    BearerToken(token): BearerToken,
) -> Result<Json<TokenResponse>, ApiError> {
    let ctx = state.request_context();
    let token = state
        .service
        .refresh(&ctx, &token)
        .await
        .map_err(|e| ApiError::new(refresh_status(&e), e))?;
    Ok(Json(TokenResponse { token }))
}

#[instrument(skip(state, token))]
pub async fn get_me(
    State(state): State<AppState>,
    BearerToken(token): BearerToken,
) -> Result<Json<PublicUser>, ApiError> {
    let ctx = state.request_context();
    let user = state
        .service
        .get_user_by_token(&ctx, &token)
        .await
        .map_err(|e| ApiError::new(me_status(&e), e))?;
    Ok(Json(user.into()))
}

#[instrument(skip(state, token))]
pub async fn delete_me(
    State(state): State<AppState>,
    BearerToken(token): BearerToken,
) -> Result<Json<StatusResponse>, ApiError> {
    let ctx = state.request_context();
    let status = state
        .service
        .delete(&ctx, &token)
        .await
        .map_err(|e| ApiError::new(delete_status(&e), e))?;
    Ok(Json(status.into()))
}
