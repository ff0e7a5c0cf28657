use sea_orm_migration::prelude::*;

use super::m20241217_000001_create_users_table::Users;
use super::m20241217_000002_create_projects_table::Projects;
use super::m20241217_000003_create_rewards_table::Rewards;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Pledges::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Pledges::Id).uuid().not_null().primary_key())
                    .col(ColumnDef::new(Pledges::ProjectId).uuid().not_null())
                    .col(ColumnDef::new(Pledges::BackerId).uuid().not_null())
                    .col(ColumnDef::new(Pledges::RewardId).uuid().null())
                    .col(
                        ColumnDef::new(Pledges::AmountCents)
                            .big_integer()
                            .not_null()
                            .check(Expr::col(Pledges::AmountCents).gt(0)),
                    )
                    .col(
                        ColumnDef::new(Pledges::PledgeDate)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .col(
                        ColumnDef::new(Pledges::IsAnonymous)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    // One pledge per settled payment intent
                    .col(
                        ColumnDef::new(Pledges::PaymentIntentId)
                            .string_len(255)
                            .not_null()
                            .unique_key(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_pledges_project")
                            .from(Pledges::Table, Pledges::ProjectId)
                            .to(Projects::Table, Projects::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_pledges_backer")
                            .from(Pledges::Table, Pledges::BackerId)
                            .to(Users::Table, Users::Id)
                            .on_delete(ForeignKeyAction::Restrict),
                    )
                    // NO ACTION is checked at statement end, so a project delete
                    // can cascade through both rewards and pledges.
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_pledges_reward")
                            .from(Pledges::Table, Pledges::RewardId)
                            .to(Rewards::Table, Rewards::Id)
                            .on_delete(ForeignKeyAction::NoAction),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_pledges_project")
                    .table(Pledges::Table)
                    .col(Pledges::ProjectId)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_pledges_backer")
                    .table(Pledges::Table)
                    .col(Pledges::BackerId)
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Pledges::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
pub enum Pledges {
    Table,
    Id,
    ProjectId,
    BackerId,
    RewardId,
    AmountCents,
    PledgeDate,
    IsAnonymous,
    PaymentIntentId,
}
