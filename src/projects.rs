//! Project listing, details and lifecycle.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::sea_query::{Condition, Expr};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, ModelTrait, QueryFilter,
    QueryOrder, QuerySelect, Select, Set,
};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

use crate::catalog::{self, RewardOption};
use crate::entities::{
    pledge, project, project_update, user, Pledge, Project, ProjectStatus, ProjectUpdate, User,
    UserRole,
};
use crate::error::AppError;
use crate::money;
use crate::users::{self, UserSummary};

const TITLE_MAX_LEN: usize = 150;
const CATEGORY_MAX_LEN: usize = 50;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, ToSchema)]
pub enum FundingStatus {
    Funded,
    Unfunded,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    /// Most pledges first.
    Popular,
    /// Newest first.
    Recent,
    #[default]
    Title,
}

#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ProjectQuery {
    /// Exact category match
    pub category: Option<String>,
    /// `Funded` or `Unfunded`
    pub funding_status: Option<FundingStatus>,
    /// Substring of the title or description
    pub search: Option<String>,
    /// `popular`, `recent` or `title` (default)
    #[serde(default)]
    pub sort: SortOrder,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ProjectSummary {
    #[serde(flatten)]
    pub project: project::Model,
    pub pledge_count: i64,
    pub funded: bool,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ProjectDetails {
    #[serde(flatten)]
    pub project: project::Model,
    pub creator: UserSummary,
    pub backer_count: i64,
    pub pledge_count: i64,
    pub rewards: Vec<RewardOption>,
    pub updates: Vec<project_update::Model>,
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct ProjectInput {
    pub title: String,
    pub description: String,
    pub category: String,
    #[schema(value_type = String, example = "5000.00")]
    pub funding_goal: Decimal,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    #[serde(default)]
    pub media_urls: Vec<String>,
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct StatusChange {
    pub status: ProjectStatus,
}

pub async fn find_project(db: &DatabaseConnection, project_id: Uuid) -> Result<project::Model, AppError> {
    Project::find_by_id(project_id)
        .one(db)
        .await?
        .ok_or_else(|| AppError::NotFound("project not found".to_string()))
}

/// Owners and admins may change a project and its rewards.
pub fn ensure_can_manage(caller: &user::Model, project: &project::Model) -> Result<(), AppError> {
    if caller.id == project.creator_id || caller.role == UserRole::Admin {
        Ok(())
    } else {
        Err(AppError::Forbidden(
            "only the project's creator can change it".to_string(),
        ))
    }
}

fn filtered(query: &ProjectQuery) -> Select<Project> {
    let mut select = Project::find();

    if let Some(category) = query.category.as_deref().filter(|c| !c.trim().is_empty()) {
        select = select.filter(project::Column::Category.eq(category.trim()));
    }
    if let Some(search) = query.search.as_deref().filter(|s| !s.trim().is_empty()) {
        let search = search.trim();
        select = select.filter(
            Condition::any()
                .add(project::Column::Title.contains(search))
                .add(project::Column::Description.contains(search)),
        );
    }
    match query.funding_status {
        Some(FundingStatus::Funded) => {
            select = select.filter(
                Expr::col(project::Column::CurrentFundingCents)
                    .gte(Expr::col(project::Column::FundingGoalCents)),
            )
        }
        Some(FundingStatus::Unfunded) => {
            select = select.filter(
                Expr::col(project::Column::CurrentFundingCents)
                    .lt(Expr::col(project::Column::FundingGoalCents)),
            )
        }
        None => {}
    }

    match query.sort {
        SortOrder::Recent => select.order_by_desc(project::Column::DateCreated),
        SortOrder::Popular | SortOrder::Title => select.order_by_asc(project::Column::Title),
    }
}

async fn pledge_counts(db: &DatabaseConnection) -> Result<HashMap<Uuid, i64>, AppError> {
    let rows: Vec<(Uuid, i64)> = Pledge::find()
        .select_only()
        .column(pledge::Column::ProjectId)
        .column_as(pledge::Column::Id.count(), "pledge_count")
        .group_by(pledge::Column::ProjectId)
        .into_tuple()
        .all(db)
        .await?;
    Ok(rows.into_iter().collect())
}

#[tracing::instrument(skip(db))]
pub async fn list_projects(
    db: &DatabaseConnection,
    query: &ProjectQuery,
) -> Result<Vec<ProjectSummary>, AppError> {
    let projects = filtered(query).all(db).await?;
    let counts = pledge_counts(db).await?;

    let mut summaries: Vec<ProjectSummary> = projects
        .into_iter()
        .map(|project| ProjectSummary {
            pledge_count: counts.get(&project.id).copied().unwrap_or(0),
            funded: project.is_funded(),
            project,
        })
        .collect();

    if query.sort == SortOrder::Popular {
        // stable, so equal counts keep title order
        summaries.sort_by(|a, b| b.pledge_count.cmp(&a.pledge_count));
    }
    Ok(summaries)
}

pub async fn list_categories(db: &DatabaseConnection) -> Result<Vec<String>, AppError> {
    let categories: Vec<String> = Project::find()
        .select_only()
        .column(project::Column::Category)
        .distinct()
        .order_by_asc(project::Column::Category)
        .into_tuple()
        .all(db)
        .await?;
    Ok(categories)
}

#[tracing::instrument(skip(db))]
pub async fn project_details(
    db: &DatabaseConnection,
    project_id: Uuid,
) -> Result<ProjectDetails, AppError> {
    let project = find_project(db, project_id).await?;
    let creator = User::find_by_id(project.creator_id)
        .one(db)
        .await?
        .ok_or_else(|| AppError::InternalError(format!("creator of {} is missing", project.id)))?;

    let backers: Vec<Uuid> = Pledge::find()
        .select_only()
        .column(pledge::Column::BackerId)
        .filter(pledge::Column::ProjectId.eq(project.id))
        .into_tuple()
        .all(db)
        .await?;
    let pledge_count = backers.len() as i64;
    let mut distinct = backers;
    distinct.sort();
    distinct.dedup();

    let rewards = catalog::list_rewards(db, project.id)
        .await?
        .into_iter()
        .map(RewardOption::from)
        .collect();
    let updates = project
        .find_related(ProjectUpdate)
        .order_by_desc(project_update::Column::DatePosted)
        .all(db)
        .await?;

    Ok(ProjectDetails {
        creator: UserSummary::from(creator),
        backer_count: distinct.len() as i64,
        pledge_count,
        rewards,
        updates,
        project,
    })
}

struct ValidProject {
    title: String,
    description: String,
    category: String,
    funding_goal_cents: i64,
    start_date: DateTime<Utc>,
    end_date: DateTime<Utc>,
    media_urls: String,
}

fn validate(input: ProjectInput) -> Result<ValidProject, AppError> {
    let title = input.title.trim().to_string();
    if title.is_empty() || title.chars().count() > TITLE_MAX_LEN {
        return Err(AppError::InvalidRequest(format!(
            "title must be between 1 and {} characters",
            TITLE_MAX_LEN
        )));
    }
    let category = input.category.trim().to_string();
    if category.is_empty() || category.chars().count() > CATEGORY_MAX_LEN {
        return Err(AppError::InvalidRequest(format!(
            "category must be between 1 and {} characters",
            CATEGORY_MAX_LEN
        )));
    }
    if input.description.trim().is_empty() {
        return Err(AppError::InvalidRequest("description is required".to_string()));
    }
    let funding_goal_cents = money::to_minor_units(input.funding_goal)
        .map_err(|e| AppError::InvalidRequest(format!("funding_goal: {}", e)))?;
    if input.end_date <= input.start_date {
        return Err(AppError::InvalidRequest(
            "end_date must be after start_date".to_string(),
        ));
    }
    let media_urls = input
        .media_urls
        .iter()
        .map(|u| u.trim())
        .filter(|u| !u.is_empty())
        .collect::<Vec<_>>()
        .join("\n");

    Ok(ValidProject {
        title,
        description: input.description,
        category,
        funding_goal_cents,
        start_date: input.start_date,
        end_date: input.end_date,
        media_urls,
    })
}

/// New projects wait for an admin to approve them.
#[tracing::instrument(skip(db, caller, input), fields(caller = %caller.id))]
pub async fn create_project(
    db: &DatabaseConnection,
    caller: &user::Model,
    input: ProjectInput,
) -> Result<project::Model, AppError> {
    users::require_role(caller, &[UserRole::Creator, UserRole::Admin])?;
    let valid = validate(input)?;
    let now = Utc::now();

    let created = project::ActiveModel {
        id: Set(Uuid::new_v4()),
        creator_id: Set(caller.id),
        title: Set(valid.title),
        description: Set(valid.description),
        category: Set(valid.category),
        funding_goal_cents: Set(valid.funding_goal_cents),
        current_funding_cents: Set(0),
        start_date: Set(valid.start_date),
        end_date: Set(valid.end_date),
        status: Set(ProjectStatus::PendingApproval),
        media_urls: Set(valid.media_urls),
        date_created: Set(now),
        last_updated: Set(now),
    }
    .insert(db)
    .await?;

    tracing::info!(project_id = %created.id, "Project created");
    Ok(created)
}

#[tracing::instrument(skip(db, caller, input), fields(caller = %caller.id))]
pub async fn update_project(
    db: &DatabaseConnection,
    caller: &user::Model,
    project_id: Uuid,
    input: ProjectInput,
) -> Result<project::Model, AppError> {
    let existing = find_project(db, project_id).await?;
    ensure_can_manage(caller, &existing)?;
    let valid = validate(input)?;

    let mut active: project::ActiveModel = existing.into();
    active.title = Set(valid.title);
    active.description = Set(valid.description);
    active.category = Set(valid.category);
    active.funding_goal_cents = Set(valid.funding_goal_cents);
    active.start_date = Set(valid.start_date);
    active.end_date = Set(valid.end_date);
    active.media_urls = Set(valid.media_urls);
    active.last_updated = Set(Utc::now());
    Ok(active.update(db).await?)
}

/// Removes a project together with its rewards, pledges and updates.
#[tracing::instrument(skip(db, caller), fields(caller = %caller.id))]
pub async fn delete_project(
    db: &DatabaseConnection,
    caller: &user::Model,
    project_id: Uuid,
) -> Result<(), AppError> {
    let existing = find_project(db, project_id).await?;
    ensure_can_manage(caller, &existing)?;
    existing.delete(db).await?;
    tracing::info!("Project deleted");
    Ok(())
}

#[tracing::instrument(skip(db, caller), fields(caller = %caller.id))]
pub async fn change_status(
    db: &DatabaseConnection,
    caller: &user::Model,
    project_id: Uuid,
    status: ProjectStatus,
) -> Result<project::Model, AppError> {
    users::require_role(caller, &[UserRole::Admin])?;
    let existing = find_project(db, project_id).await?;
    let previous = existing.status;

    let mut active: project::ActiveModel = existing.into();
    active.status = Set(status);
    active.last_updated = Set(Utc::now());
    let updated = active.update(db).await?;

    tracing::info!(?previous, ?status, "Project status changed");
    Ok(updated)
}
