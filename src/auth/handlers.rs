use axum::{
    extract::State,
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use tracing::instrument;

use crate::{
    auth::{
        dto::{ApiResponse, AuthData, Status},
        extractors::{AuthUser, SubmittedFields},
        repo_types::User,
        services::AuthService,
    },
    error::AuthError,
    state::AppState,
};

pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/register", post(register))
        .route("/login", post(login))
}

pub fn protected_routes() -> Router<AppState> {
    Router::new()
        .route("/logout", post(logout))
        .route("/user", get(current_user))
}

#[instrument(skip(svc, input))]
pub async fn register(
    State(svc): State<AuthService>,
    SubmittedFields(input): SubmittedFields,
) -> Result<(StatusCode, Json<ApiResponse<AuthData>>), AuthError> {
    let session = svc.register(&input).await?;
    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::success(
            "User is created successfully.",
            AuthData {
                token: session.token,
                user: session.user,
            },
        )),
    ))
}

#[instrument(skip(svc, input))]
pub async fn login(
    State(svc): State<AuthService>,
    SubmittedFields(input): SubmittedFields,
) -> Result<Json<ApiResponse<AuthData>>, AuthError> {
    let session = svc.login(&input).await?;
    Ok(Json(ApiResponse::success(
        "User is logged in successfully.",
        AuthData {
            token: session.token,
            user: session.user,
        },
    )))
}

#[instrument(skip_all)]
pub async fn logout(
    State(svc): State<AuthService>,
    AuthUser(user): AuthUser,
) -> Result<Json<ApiResponse<()>>, AuthError> {
    svc.logout(&user).await?;
    Ok(Json(ApiResponse::<()>::message(
        Status::Success,
        "User is logged out successfully",
    )))
}

#[instrument(skip_all)]
pub async fn current_user(AuthUser(user): AuthUser) -> Json<User> {
    Json(user)
}
