use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use uuid::Uuid;

use crate::auth::CurrentUser;
use crate::entities::project;
use crate::error::AppError;
use crate::projects::{self, ProjectDetails, ProjectInput, ProjectQuery, ProjectSummary, StatusChange};
use crate::state::AppState;

/// List projects with optional filters and sorting
#[utoipa::path(
    get,
    path = "/projects",
    params(ProjectQuery),
    responses(
        (status = 200, description = "Matching projects", body = [ProjectSummary])
    ),
    tag = "projects"
)]
pub async fn list_projects(
    State(state): State<AppState>,
    Query(query): Query<ProjectQuery>,
) -> Result<Json<Vec<ProjectSummary>>, AppError> {
    Ok(Json(projects::list_projects(&state.db, &query).await?))
}

/// Distinct project categories
#[utoipa::path(
    get,
    path = "/projects/categories",
    responses((status = 200, description = "Categories in use", body = [String])),
    tag = "projects"
)]
pub async fn list_categories(State(state): State<AppState>) -> Result<Json<Vec<String>>, AppError> {
    Ok(Json(projects::list_categories(&state.db).await?))
}

/// Project details with creator, backer count, rewards and updates
#[utoipa::path(
    get,
    path = "/projects/{id}",
    params(("id" = Uuid, Path, description = "Project id")),
    responses(
        (status = 200, description = "Project details", body = ProjectDetails),
        (status = 404, description = "No such project")
    ),
    tag = "projects"
)]
pub async fn get_project(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ProjectDetails>, AppError> {
    Ok(Json(projects::project_details(&state.db, id).await?))
}

/// Create a project; it starts pending approval
#[utoipa::path(
    post,
    path = "/projects",
    request_body = ProjectInput,
    responses(
        (status = 201, description = "Project created", body = project::Model),
        (status = 403, description = "Only creators and admins create projects"),
        (status = 422, description = "Invalid project")
    ),
    security(("user_id" = [])),
    tag = "projects"
)]
pub async fn create_project(
    State(state): State<AppState>,
    CurrentUser(caller): CurrentUser,
    Json(input): Json<ProjectInput>,
) -> Result<(StatusCode, Json<project::Model>), AppError> {
    let created = projects::create_project(&state.db, &caller, input).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

/// Edit a project you own
#[utoipa::path(
    put,
    path = "/projects/{id}",
    params(("id" = Uuid, Path, description = "Project id")),
    request_body = ProjectInput,
    responses(
        (status = 200, description = "Project updated", body = project::Model),
        (status = 403, description = "Not the project's creator"),
        (status = 404, description = "No such project")
    ),
    security(("user_id" = [])),
    tag = "projects"
)]
pub async fn update_project(
    State(state): State<AppState>,
    CurrentUser(caller): CurrentUser,
    Path(id): Path<Uuid>,
    Json(input): Json<ProjectInput>,
) -> Result<Json<project::Model>, AppError> {
    Ok(Json(projects::update_project(&state.db, &caller, id, input).await?))
}

/// Delete a project with its rewards, pledges and updates
#[utoipa::path(
    delete,
    path = "/projects/{id}",
    params(("id" = Uuid, Path, description = "Project id")),
    responses(
        (status = 204, description = "Deleted"),
        (status = 403, description = "Not the project's creator"),
        (status = 404, description = "No such project")
    ),
    security(("user_id" = [])),
    tag = "projects"
)]
pub async fn delete_project(
    State(state): State<AppState>,
    CurrentUser(caller): CurrentUser,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    projects::delete_project(&state.db, &caller, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Approve, complete or cancel a project (admins only)
#[utoipa::path(
    put,
    path = "/projects/{id}/status",
    params(("id" = Uuid, Path, description = "Project id")),
    request_body = StatusChange,
    responses(
        (status = 200, description = "Status changed", body = project::Model),
        (status = 403, description = "Caller is not an admin")
    ),
    security(("user_id" = [])),
    tag = "projects"
)]
pub async fn change_status(
    State(state): State<AppState>,
    CurrentUser(caller): CurrentUser,
    Path(id): Path<Uuid>,
    Json(change): Json<StatusChange>,
) -> Result<Json<project::Model>, AppError> {
    Ok(Json(
        projects::change_status(&state.db, &caller, id, change.status).await?,
    ))
}
