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
                    .table(ProjectUpdates::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(ProjectUpdates::Id).uuid().not_null().primary_key())
                    .col(ColumnDef::new(ProjectUpdates::ProjectId).uuid().not_null())
                    .col(ColumnDef::new(ProjectUpdates::Content).text().not_null())
                    .col(
                        ColumnDef::new(ProjectUpdates::DatePosted)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_project_updates_project")
                            .from(ProjectUpdates::Table, ProjectUpdates::ProjectId)
                            .to(Projects::Table, Projects::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(ProjectUpdates::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum ProjectUpdates {
    Table,
    Id,
    ProjectId,
    Content,
    DatePosted,
}
