use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use uuid::Uuid;

use crate::auth::CurrentUser;
use crate::catalog::{self, RewardInput, RewardOption};
use crate::entities::reward;
use crate::error::AppError;
use crate::projects;
use crate::state::AppState;

/// Reward tiers of a project, in display order
#[utoipa::path(
    get,
    path = "/projects/{id}/rewards",
    params(("id" = Uuid, Path, description = "Project id")),
    responses(
        (status = 200, description = "Rewards with remaining quantities", body = [RewardOption]),
        (status = 404, description = "No such project")
    ),
    tag = "rewards"
)]
pub async fn list_rewards(
    State(state): State<AppState>,
    Path(project_id): Path<Uuid>,
) -> Result<Json<Vec<RewardOption>>, AppError> {
    let project = projects::find_project(&state.db, project_id).await?;
    let rewards = catalog::list_rewards(&state.db, project.id).await?;
    Ok(Json(rewards.into_iter().map(RewardOption::from).collect()))
}

/// Add a reward tier to a project you own
#[utoipa::path(
    post,
    path = "/projects/{id}/rewards",
    params(("id" = Uuid, Path, description = "Project id")),
    request_body = RewardInput,
    responses(
        (status = 201, description = "Reward created", body = reward::Model),
        (status = 403, description = "Not the project's creator"),
        (status = 422, description = "Invalid reward")
    ),
    security(("user_id" = [])),
    tag = "rewards"
)]
pub async fn create_reward(
    State(state): State<AppState>,
    CurrentUser(caller): CurrentUser,
    Path(project_id): Path<Uuid>,
    Json(input): Json<RewardInput>,
) -> Result<(StatusCode, Json<reward::Model>), AppError> {
    let created = catalog::create_reward(&state.db, &caller, project_id, input).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

/// A single reward tier
#[utoipa::path(
    get,
    path = "/rewards/{id}",
    params(("id" = Uuid, Path, description = "Reward id")),
    responses(
        (status = 200, description = "Reward", body = RewardOption),
        (status = 404, description = "No such reward")
    ),
    tag = "rewards"
)]
pub async fn get_reward(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<RewardOption>, AppError> {
    let found = catalog::get_reward(&state.db, id)
        .await?
        .ok_or_else(|| AppError::NotFound("reward not found".to_string()))?;
    Ok(Json(found.into()))
}

/// Edit a reward tier
#[utoipa::path(
    put,
    path = "/rewards/{id}",
    params(("id" = Uuid, Path, description = "Reward id")),
    request_body = RewardInput,
    responses(
        (status = 200, description = "Reward updated", body = reward::Model),
        (status = 403, description = "Not the project's creator"),
        (status = 409, description = "Quantity below units already claimed")
    ),
    security(("user_id" = [])),
    tag = "rewards"
)]
pub async fn update_reward(
    State(state): State<AppState>,
    CurrentUser(caller): CurrentUser,
    Path(id): Path<Uuid>,
    Json(input): Json<RewardInput>,
) -> Result<Json<reward::Model>, AppError> {
    Ok(Json(catalog::update_reward(&state.db, &caller, id, input).await?))
}

/// Delete an unclaimed reward tier
#[utoipa::path(
    delete,
    path = "/rewards/{id}",
    params(("id" = Uuid, Path, description = "Reward id")),
    responses(
        (status = 204, description = "Deleted"),
        (status = 403, description = "Not the project's creator"),
        (status = 409, description = "Reward already claimed")
    ),
    security(("user_id" = [])),
    tag = "rewards"
)]
pub async fn delete_reward(
    State(state): State<AppState>,
    CurrentUser(caller): CurrentUser,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    catalog::delete_reward(&state.db, &caller, id).await?;
    Ok(StatusCode::NO_CONTENT)
}
