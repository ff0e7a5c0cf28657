use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use uuid::Uuid;

use crate::auth::CurrentUser;
use crate::dashboard::{self, BackedPledge, CreatorProject, PostUpdate};
use crate::entities::project_update;
use crate::error::AppError;
use crate::state::AppState;

/// The caller's pledges with project, reward and transaction
#[utoipa::path(
    get,
    path = "/dashboard/backer",
    responses((status = 200, description = "Backed pledges", body = [BackedPledge])),
    security(("user_id" = [])),
    tag = "dashboard"
)]
pub async fn backer(
    State(state): State<AppState>,
    caller: CurrentUser,
) -> Result<Json<Vec<BackedPledge>>, AppError> {
    Ok(Json(dashboard::backer_dashboard(&state.db, caller.id()).await?))
}

/// The caller's projects with pledge activity and updates
#[utoipa::path(
    get,
    path = "/dashboard/creator",
    responses((status = 200, description = "Owned projects", body = [CreatorProject])),
    security(("user_id" = [])),
    tag = "dashboard"
)]
pub async fn creator(
    State(state): State<AppState>,
    caller: CurrentUser,
) -> Result<Json<Vec<CreatorProject>>, AppError> {
    Ok(Json(dashboard::creator_dashboard(&state.db, caller.id()).await?))
}

/// Post an update to backers of a project you created
#[utoipa::path(
    post,
    path = "/projects/{id}/updates",
    params(("id" = Uuid, Path, description = "Project id")),
    request_body = PostUpdate,
    responses(
        (status = 201, description = "Update posted", body = project_update::Model),
        (status = 403, description = "Not the project's creator"),
        (status = 404, description = "No such project")
    ),
    security(("user_id" = [])),
    tag = "dashboard"
)]
pub async fn post_update(
    State(state): State<AppState>,
    CurrentUser(caller): CurrentUser,
    Path(project_id): Path<Uuid>,
    Json(input): Json<PostUpdate>,
) -> Result<(StatusCode, Json<project_update::Model>), AppError> {
    let update = dashboard::post_update(&state.db, &caller, project_id, input).await?;
    Ok((StatusCode::CREATED, Json(update)))
}
