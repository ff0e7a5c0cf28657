//! Read-only views for backers and creators, plus creator updates.

use std::collections::{HashMap, HashSet};

use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder, Set,
};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::entities::{
    pledge, project, project_update, reward, transaction, user, Pledge, Project, ProjectUpdate,
    Reward, Transaction,
};
use crate::error::AppError;
use crate::projects;

const UPDATE_MAX_LEN: usize = 10_000;

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct BackedPledge {
    pub pledge: pledge::Model,
    pub project_title: String,
    pub reward_title: Option<String>,
    pub transaction: Option<transaction::Model>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct CreatorProject {
    pub project: project::Model,
    pub pledge_count: i64,
    pub backer_count: i64,
    pub updates: Vec<project_update::Model>,
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct PostUpdate {
    pub content: String,
}

/// The caller's pledges, newest first.
#[tracing::instrument(skip(db))]
pub async fn backer_dashboard(
    db: &DatabaseConnection,
    backer_id: Uuid,
) -> Result<Vec<BackedPledge>, AppError> {
    let pledges = Pledge::find()
        .filter(pledge::Column::BackerId.eq(backer_id))
        .order_by_desc(pledge::Column::PledgeDate)
        .find_also_related(Transaction)
        .all(db)
        .await?;

    let project_ids: Vec<Uuid> = pledges.iter().map(|(p, _)| p.project_id).collect();
    let reward_ids: Vec<Uuid> = pledges.iter().filter_map(|(p, _)| p.reward_id).collect();

    let (projects, rewards) = futures::try_join!(
        Project::find()
            .filter(project::Column::Id.is_in(project_ids))
            .all(db),
        Reward::find()
            .filter(reward::Column::Id.is_in(reward_ids))
            .all(db),
    )?;
    let titles: HashMap<Uuid, String> = projects.into_iter().map(|p| (p.id, p.title)).collect();
    let reward_titles: HashMap<Uuid, String> =
        rewards.into_iter().map(|r| (r.id, r.title)).collect();

    Ok(pledges
        .into_iter()
        .map(|(pledge, transaction)| BackedPledge {
            project_title: titles.get(&pledge.project_id).cloned().unwrap_or_default(),
            reward_title: pledge.reward_id.and_then(|id| reward_titles.get(&id).cloned()),
            transaction,
            pledge,
        })
        .collect())
}

/// The caller's projects with pledge activity and posted updates.
#[tracing::instrument(skip(db))]
pub async fn creator_dashboard(
    db: &DatabaseConnection,
    creator_id: Uuid,
) -> Result<Vec<CreatorProject>, AppError> {
    let owned = Project::find()
        .filter(project::Column::CreatorId.eq(creator_id))
        .order_by_desc(project::Column::DateCreated)
        .all(db)
        .await?;
    let ids: Vec<Uuid> = owned.iter().map(|p| p.id).collect();

    let mut pledges_by_project: HashMap<Uuid, Vec<pledge::Model>> = HashMap::new();
    for pledge in Pledge::find()
        .filter(pledge::Column::ProjectId.is_in(ids.clone()))
        .all(db)
        .await?
    {
        pledges_by_project.entry(pledge.project_id).or_default().push(pledge);
    }

    let mut updates_by_project: HashMap<Uuid, Vec<project_update::Model>> = HashMap::new();
    for update in ProjectUpdate::find()
        .filter(project_update::Column::ProjectId.is_in(ids))
        .order_by_desc(project_update::Column::DatePosted)
        .all(db)
        .await?
    {
        updates_by_project.entry(update.project_id).or_default().push(update);
    }

    Ok(owned
        .into_iter()
        .map(|project| {
            let pledges = pledges_by_project.remove(&project.id).unwrap_or_default();
            let backers: HashSet<Uuid> = pledges.iter().map(|p| p.backer_id).collect();
            CreatorProject {
                pledge_count: pledges.len() as i64,
                backer_count: backers.len() as i64,
                updates: updates_by_project.remove(&project.id).unwrap_or_default(),
                project,
            }
        })
        .collect())
}

#[tracing::instrument(skip(db, caller, input), fields(caller = %caller.id))]
pub async fn post_update(
    db: &DatabaseConnection,
    caller: &user::Model,
    project_id: Uuid,
    input: PostUpdate,
) -> Result<project_update::Model, AppError> {
    let project = projects::find_project(db, project_id).await?;
    if project.creator_id != caller.id {
        return Err(AppError::Forbidden(
            "only the project's creator can post updates".to_string(),
        ));
    }
    let content = input.content.trim();
    if content.is_empty() || content.chars().count() > UPDATE_MAX_LEN {
        return Err(AppError::InvalidRequest(format!(
            "content must be between 1 and {} characters",
            UPDATE_MAX_LEN
        )));
    }

    let update = project_update::ActiveModel {
        id: Set(Uuid::new_v4()),
        project_id: Set(project.id),
        content: Set(content.to_string()),
        date_posted: Set(Utc::now()),
    }
    .insert(db)
    .await?;

    tracing::info!(update_id = %update.id, "Project update posted");
    Ok(update)
}
