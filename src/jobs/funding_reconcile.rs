//! Recomputes each project's cached funding total from its completed
//! transactions.
//!
//! The pledge ledger keeps `current_funding_cents` in step on every
//! finalize; this job repairs drift left by manual edits or refunds recorded
//! directly against the transactions table.

use std::time::Instant;

use sea_orm::{ConnectionTrait, DatabaseConnection, DbErr, Statement};

const COMPLETED_TOTAL: &str = "COALESCE((
        SELECT CAST(SUM(t.amount_cents) AS BIGINT)
        FROM pledges p
        INNER JOIN transactions t ON t.pledge_id = p.id
        WHERE p.project_id = projects.id AND t.status = 'Completed'
    ), 0)";

/// Number of projects whose total was corrected.
#[tracing::instrument(skip(db))]
pub async fn run_funding_reconcile(db: &DatabaseConnection) -> Result<u64, DbErr> {
    let started = Instant::now();
    let sql = format!(
        "UPDATE projects SET current_funding_cents = {total} WHERE current_funding_cents <> {total}",
        total = COMPLETED_TOTAL
    );
    let result = db
        .execute(Statement::from_string(db.get_database_backend(), sql))
        .await?;

    let corrected = result.rows_affected();
    if corrected > 0 {
        tracing::warn!(corrected, "Corrected drifted project funding totals");
    } else {
        tracing::info!("Project funding totals are consistent");
    }
    tracing::debug!("Funding reconcile took {:?}", started.elapsed());
    Ok(corrected)
}
