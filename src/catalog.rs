//! Reward tiers of a project: lookups used by pledge intake, and management
//! for the project's owner.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, DbErr, EntityTrait,
    ModelTrait, PaginatorTrait, QueryFilter, QueryOrder, Set,
};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::entities::{pledge, project, reward, user, Pledge, Project, Reward};
use crate::error::AppError;
use crate::money;
use crate::projects;

const TITLE_MAX_LEN: usize = 100;

/// A project's rewards in the order they were added.
pub async fn list_rewards<C>(db: &C, project_id: Uuid) -> Result<Vec<reward::Model>, DbErr>
where
    C: ConnectionTrait,
{
    Reward::find()
        .filter(reward::Column::ProjectId.eq(project_id))
        .order_by_asc(reward::Column::Position)
        .order_by_asc(reward::Column::CreatedAt)
        .all(db)
        .await
}

pub async fn get_reward<C>(db: &C, reward_id: Uuid) -> Result<Option<reward::Model>, DbErr>
where
    C: ConnectionTrait,
{
    Reward::find_by_id(reward_id).one(db).await
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct RewardInput {
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    /// Minimum pledge for this tier.
    #[schema(value_type = String, example = "25.00")]
    pub pledge_amount: Decimal,
    /// Omit for an unlimited tier.
    #[serde(default)]
    pub quantity_available: Option<i32>,
    #[serde(default)]
    pub estimated_delivery: Option<DateTime<Utc>>,
}

/// A reward as shown on the pledge form.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct RewardOption {
    #[serde(flatten)]
    pub reward: reward::Model,
    /// `null` for unlimited tiers.
    pub remaining: Option<i32>,
    pub available: bool,
}

impl From<reward::Model> for RewardOption {
    fn from(reward: reward::Model) -> Self {
        Self {
            remaining: reward.remaining(),
            available: reward.is_available(),
            reward,
        }
    }
}

struct ValidReward {
    title: String,
    description: Option<String>,
    pledge_amount_cents: i64,
    quantity_available: Option<i32>,
    estimated_delivery: Option<DateTime<Utc>>,
}

fn validate(input: RewardInput) -> Result<ValidReward, AppError> {
    let title = input.title.trim().to_string();
    if title.is_empty() || title.chars().count() > TITLE_MAX_LEN {
        return Err(AppError::InvalidRequest(format!(
            "title must be between 1 and {} characters",
            TITLE_MAX_LEN
        )));
    }
    let pledge_amount_cents = money::to_minor_units(input.pledge_amount)
        .map_err(|e| AppError::InvalidRequest(format!("pledge_amount: {}", e)))?;
    if matches!(input.quantity_available, Some(q) if q < 0) {
        return Err(AppError::InvalidRequest(
            "quantity_available cannot be negative".to_string(),
        ));
    }
    Ok(ValidReward {
        title,
        description: input.description.filter(|d| !d.trim().is_empty()),
        pledge_amount_cents,
        quantity_available: input.quantity_available,
        estimated_delivery: input.estimated_delivery,
    })
}

#[tracing::instrument(skip(db, caller, input), fields(caller = %caller.id))]
pub async fn create_reward(
    db: &DatabaseConnection,
    caller: &user::Model,
    project_id: Uuid,
    input: RewardInput,
) -> Result<reward::Model, AppError> {
    let project = projects::find_project(db, project_id).await?;
    projects::ensure_can_manage(caller, &project)?;
    let valid = validate(input)?;

    let position = Reward::find()
        .filter(reward::Column::ProjectId.eq(project.id))
        .count(db)
        .await?;

    let created = reward::ActiveModel {
        id: Set(Uuid::new_v4()),
        project_id: Set(project.id),
        title: Set(valid.title),
        description: Set(valid.description),
        pledge_amount_cents: Set(valid.pledge_amount_cents),
        quantity_available: Set(valid.quantity_available),
        quantity_claimed: Set(0),
        estimated_delivery: Set(valid.estimated_delivery),
        position: Set(i32::try_from(position).unwrap_or(i32::MAX)),
        created_at: Set(Utc::now()),
    }
    .insert(db)
    .await?;

    tracing::info!(reward_id = %created.id, "Reward created");
    Ok(created)
}

#[tracing::instrument(skip(db, caller, input), fields(caller = %caller.id))]
pub async fn update_reward(
    db: &DatabaseConnection,
    caller: &user::Model,
    reward_id: Uuid,
    input: RewardInput,
) -> Result<reward::Model, AppError> {
    let (existing, project) = reward_with_project(db, reward_id).await?;
    projects::ensure_can_manage(caller, &project)?;
    let valid = validate(input)?;

    // conditional on the stored claim count; a concurrent claim turns this into a no-op
    let mut update = Reward::update_many()
        .col_expr(reward::Column::Title, Expr::value(valid.title))
        .col_expr(reward::Column::Description, Expr::value(valid.description))
        .col_expr(
            reward::Column::PledgeAmountCents,
            Expr::value(valid.pledge_amount_cents),
        )
        .col_expr(
            reward::Column::QuantityAvailable,
            Expr::value(valid.quantity_available),
        )
        .col_expr(
            reward::Column::EstimatedDelivery,
            Expr::value(valid.estimated_delivery),
        )
        .filter(reward::Column::Id.eq(existing.id));
    if let Some(available) = valid.quantity_available {
        update = update.filter(reward::Column::QuantityClaimed.lte(available));
    }
    let result = update.exec(db).await?;

    let updated = get_reward(db, existing.id)
        .await?
        .ok_or_else(|| AppError::NotFound("reward not found".to_string()))?;
    if result.rows_affected == 0 {
        return Err(AppError::Conflict(format!(
            "{} units are already claimed",
            updated.quantity_claimed
        )));
    }
    Ok(updated)
}

/// Deletes a reward nobody has claimed yet.
#[tracing::instrument(skip(db, caller), fields(caller = %caller.id))]
pub async fn delete_reward(
    db: &DatabaseConnection,
    caller: &user::Model,
    reward_id: Uuid,
) -> Result<(), AppError> {
    let (existing, project) = reward_with_project(db, reward_id).await?;
    projects::ensure_can_manage(caller, &project)?;

    let pledged = Pledge::find()
        .filter(pledge::Column::RewardId.eq(existing.id))
        .count(db)
        .await?;
    if existing.quantity_claimed > 0 || pledged > 0 {
        return Err(AppError::Conflict(
            "reward has already been claimed by backers".to_string(),
        ));
    }

    existing.delete(db).await?;
    tracing::info!("Reward deleted");
    Ok(())
}

async fn reward_with_project(
    db: &DatabaseConnection,
    reward_id: Uuid,
) -> Result<(reward::Model, project::Model), AppError> {
    let reward = get_reward(db, reward_id)
        .await?
        .ok_or_else(|| AppError::NotFound("reward not found".to_string()))?;
    let project = Project::find_by_id(reward.project_id)
        .one(db)
        .await?
        .ok_or_else(|| AppError::NotFound("project not found".to_string()))?;
    Ok((reward, project))
}
