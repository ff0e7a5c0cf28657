use sea_orm_migration::prelude::*;

use super::m20241217_000002_create_projects_table::Projects;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Rewards::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Rewards::Id).uuid().not_null().primary_key())
                    .col(ColumnDef::new(Rewards::ProjectId).uuid().not_null())
                    .col(ColumnDef::new(Rewards::Title).string_len(100).not_null())
                    .col(ColumnDef::new(Rewards::Description).text().null())
                    .col(
                        ColumnDef::new(Rewards::PledgeAmountCents)
                            .big_integer()
                            .not_null()
                            .check(Expr::col(Rewards::PledgeAmountCents).gt(0)),
                    )
                    // NULL means unlimited
                    .col(
                        ColumnDef::new(Rewards::QuantityAvailable)
                            .integer()
                            .null()
                            .check(Expr::col(Rewards::QuantityAvailable).gte(0)),
                    )
                    .col(
                        ColumnDef::new(Rewards::QuantityClaimed)
                            .integer()
                            .not_null()
                            .default(0)
                            .check(Expr::col(Rewards::QuantityClaimed).gte(0)),
                    )
                    .col(ColumnDef::new(Rewards::EstimatedDelivery).timestamp_with_time_zone().null())
                    .col(ColumnDef::new(Rewards::Position).integer().not_null().default(0))
                    .col(
                        ColumnDef::new(Rewards::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    // a bounded tier never hands out more units than it has
                    .check(
                        Expr::col(Rewards::QuantityAvailable).is_null().or(
                            Expr::col(Rewards::QuantityClaimed)
                                .lte(Expr::col(Rewards::QuantityAvailable)),
                        ),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_rewards_project")
                            .from(Rewards::Table, Rewards::ProjectId)
                            .to(Projects::Table, Projects::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_rewards_project")
                    .table(Rewards::Table)
                    .col(Rewards::ProjectId)
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Rewards::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
pub enum Rewards {
    Table,
    Id,
    ProjectId,
    Title,
    Description,
    PledgeAmountCents,
    QuantityAvailable,
    QuantityClaimed,
    EstimatedDelivery,
    Position,
    CreatedAt,
}
