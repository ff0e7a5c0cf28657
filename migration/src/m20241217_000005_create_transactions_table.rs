use sea_orm_migration::prelude::*;

use super::m20241217_000004_create_pledges_table::Pledges;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Transactions::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Transactions::Id).uuid().not_null().primary_key())
                    .col(
                        ColumnDef::new(Transactions::PledgeId)
                            .uuid()
                            .not_null()
                            .unique_key(),
                    )
                    .col(
                        ColumnDef::new(Transactions::GatewayTransactionId)
                            .string_len(100)
                            .not_null()
                            .unique_key(),
                    )
                    .col(ColumnDef::new(Transactions::PaymentMethod).string_len(20).not_null())
                    .col(
                        ColumnDef::new(Transactions::AmountCents)
                            .big_integer()
                            .not_null()
                            .check(Expr::col(Transactions::AmountCents).gt(0)),
                    )
                    .col(ColumnDef::new(Transactions::Currency).string_len(3).not_null())
                    .col(
                        ColumnDef::new(Transactions::TransactionDate)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    // Pending, Completed, Failed
                    .col(ColumnDef::new(Transactions::Status).string_len(20).not_null())
                    .col(ColumnDef::new(Transactions::FailureReason).text().null())
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_transactions_pledge")
                            .from(Transactions::Table, Transactions::PledgeId)
                            .to(Pledges::Table, Pledges::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Transactions::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
pub enum Transactions {
    Table,
    Id,
    PledgeId,
    GatewayTransactionId,
    PaymentMethod,
    AmountCents,
    Currency,
    TransactionDate,
    Status,
    FailureReason,
}
