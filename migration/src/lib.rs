pub use sea_orm_migration::prelude::*;

mod m20241217_000001_create_users_table;
mod m20241217_000002_create_projects_table;
mod m20241217_000003_create_rewards_table;
mod m20241217_000004_create_pledges_table;
mod m20241217_000005_create_transactions_table;
mod m20241217_000006_create_messages_table;
mod m20241217_000007_create_project_updates_table;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20241217_000001_create_users_table::Migration),
            Box::new(m20241217_000002_create_projects_table::Migration),
            Box::new(m20241217_000003_create_rewards_table::Migration),
            Box::new(m20241217_000004_create_pledges_table::Migration),
            Box::new(m20241217_000005_create_transactions_table::Migration),
            Box::new(m20241217_000006_create_messages_table::Migration),
            Box::new(m20241217_000007_create_project_updates_table::Migration),
        ]
    }
}
