use sea_orm_migration::prelude::*;

use super::m20241217_000001_create_users_table::Users;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Projects::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Projects::Id).uuid().not_null().primary_key())
                    .col(ColumnDef::new(Projects::CreatorId).uuid().not_null())
                    .col(ColumnDef::new(Projects::Title).string_len(150).not_null())
                    .col(ColumnDef::new(Projects::Description).text().not_null())
                    .col(ColumnDef::new(Projects::Category).string_len(50).not_null())
                    .col(
                        ColumnDef::new(Projects::FundingGoalCents)
                            .big_integer()
                            .not_null()
                            .check(Expr::col(Projects::FundingGoalCents).gt(0)),
                    )
                    .col(
                        ColumnDef::new(Projects::CurrentFundingCents)
                            .big_integer()
                            .not_null()
                            .default(0),
                    )
                    .col(ColumnDef::new(Projects::StartDate).timestamp_with_time_zone().not_null())
                    .col(ColumnDef::new(Projects::EndDate).timestamp_with_time_zone().not_null())
                    .col(ColumnDef::new(Projects::Status).string_len(20).not_null())
                    .col(ColumnDef::new(Projects::MediaUrls).text().not_null().default(""))
                    .col(
                        ColumnDef::new(Projects::DateCreated)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .col(
                        ColumnDef::new(Projects::LastUpdated)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_projects_creator")
                            .from(Projects::Table, Projects::CreatorId)
                            .to(Users::Table, Users::Id)
                            .on_delete(ForeignKeyAction::Restrict),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_projects_creator")
                    .table(Projects::Table)
                    .col(Projects::CreatorId)
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Projects::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
pub enum Projects {
    Table,
    Id,
    CreatorId,
    Title,
    Description,
    Category,
    FundingGoalCents,
    CurrentFundingCents,
    StartDate,
    EndDate,
    Status,
    MediaUrls,
    DateCreated,
    LastUpdated,
}
