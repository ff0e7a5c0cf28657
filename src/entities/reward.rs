use sea_orm::entity::prelude::*;
use chrono::{DateTime, Utc};
use serde::Serialize;
use utoipa::ToSchema;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, ToSchema)]
#[sea_orm(table_name = "rewards")]
#[schema(as = Reward)]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub project_id: Uuid,
    pub title: String,
    #[sea_orm(column_type = "Text", nullable)]
    pub description: Option<String>,
    /// Minimum pledge, in minor units, that qualifies for this tier.
    pub pledge_amount_cents: i64,
    /// `None` means unlimited.
    pub quantity_available: Option<i32>,
    pub quantity_claimed: i32,
    pub estimated_delivery: Option<DateTime<Utc>>,
    pub position: i32,
    pub created_at: DateTime<Utc>,
}

impl Model {
    /// Units still claimable, or `None` when the tier is unlimited.
    pub fn remaining(&self) -> Option<i32> {
        self.quantity_available
            .map(|available| (available - self.quantity_claimed).max(0))
    }

    pub fn is_available(&self) -> bool {
        self.remaining().map_or(true, |left| left > 0)
    }
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::project::Entity",
        from = "Column::ProjectId",
        to = "super::project::Column::Id",
        on_delete = "Cascade"
    )]
    Project,
    #[sea_orm(has_many = "super::pledge::Entity")]
    Pledge,
}

impl Related<super::project::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Project.def()
    }
}

impl Related<super::pledge::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Pledge.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
