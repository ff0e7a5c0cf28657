use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use uuid::Uuid;

use crate::auth::CurrentUser;
use crate::entities::user;
use crate::error::AppError;
use crate::state::AppState;
use crate::users::{self, PublicProfile, RegisterUser};

/// Register a new account
#[utoipa::path(
    post,
    path = "/users",
    request_body = RegisterUser,
    responses(
        (status = 201, description = "Account created", body = user::Model),
        (status = 409, description = "User name or email already registered"),
        (status = 422, description = "Invalid registration")
    ),
    tag = "users"
)]
pub async fn register_user(
    State(state): State<AppState>,
    Json(input): Json<RegisterUser>,
) -> Result<(StatusCode, Json<user::Model>), AppError> {
    let created = users::register(&state.db, input).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

/// The authenticated caller's account
#[utoipa::path(
    get,
    path = "/users/me",
    responses(
        (status = 200, description = "Current user", body = user::Model),
        (status = 401, description = "Missing or unknown x-user-id")
    ),
    security(("user_id" = [])),
    tag = "users"
)]
pub async fn current_user(CurrentUser(user): CurrentUser) -> Json<user::Model> {
    Json(user)
}

/// Public profile of a user
#[utoipa::path(
    get,
    path = "/users/{id}",
    params(("id" = Uuid, Path, description = "User id")),
    responses(
        (status = 200, description = "Profile", body = PublicProfile),
        (status = 404, description = "No such user")
    ),
    tag = "users"
)]
pub async fn get_user(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<PublicProfile>, AppError> {
    let found = users::get_user(&state.db, id).await?;
    Ok(Json(found.into()))
}

/// Delete an account with no projects, pledges or messages
#[utoipa::path(
    delete,
    path = "/users/{id}",
    params(("id" = Uuid, Path, description = "User id")),
    responses(
        (status = 204, description = "Deleted"),
        (status = 403, description = "Not your account"),
        (status = 409, description = "Account still has dependent records")
    ),
    security(("user_id" = [])),
    tag = "users"
)]
pub async fn delete_user(
    State(state): State<AppState>,
    CurrentUser(caller): CurrentUser,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    users::delete_user(&state.db, &caller, id).await?;
    Ok(StatusCode::NO_CONTENT)
}
