//! Durable recording of settled pledges.
//!
//! [`finalize`] runs every statement on one database transaction: replay
//! check, reward claim, pledge insert, transaction insert and the project's
//! funding total. Either all of it commits or none of it does.

use chrono::Utc;
use sea_orm::sea_query::{Condition, Expr};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, DatabaseTransaction, EntityTrait,
    ModelTrait, QueryFilter, Set, TransactionTrait,
};
use serde::Serialize;
use utoipa::ToSchema;
use uuid::Uuid;

use super::{storage_error, PledgeError};
use crate::entities::{pledge, project, reward, transaction, Pledge, Project, Reward, TransactionStatus};
use crate::gateway::VerifiedPayment;

#[cfg(test)]
thread_local! {
    static FAIL_AFTER_PLEDGE_INSERT: std::cell::Cell<bool> = const { std::cell::Cell::new(false) };
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FinalizePledge {
    pub project_id: Uuid,
    pub backer_id: Uuid,
    pub amount_cents: i64,
    pub reward_id: Option<Uuid>,
    pub payment_intent_id: String,
    pub is_anonymous: bool,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct FinalizedPledge {
    pub pledge: pledge::Model,
    pub transaction: transaction::Model,
    /// `true` when the intent had already been recorded and nothing was written.
    pub replayed: bool,
}

/// Records a pledge for a payment the gateway has verified.
#[tracing::instrument(
    skip(db, request, payment),
    fields(project_id = %request.project_id, intent_id = %request.payment_intent_id)
)]
pub async fn finalize(
    db: &DatabaseConnection,
    request: &FinalizePledge,
    payment: &VerifiedPayment,
) -> Result<FinalizedPledge, PledgeError> {
    check_preconditions(request, payment)?;

    let txn = db.begin().await?;
    match apply(&txn, request, payment).await {
        Ok(finalized) => {
            txn.commit().await.map_err(storage_error)?;
            if !finalized.replayed {
                tracing::info!(
                    pledge_id = %finalized.pledge.id,
                    amount_cents = finalized.pledge.amount_cents,
                    "Pledge finalized"
                );
            }
            Ok(finalized)
        }
        Err(err) => {
            if let Err(rollback_err) = txn.rollback().await {
                tracing::error!(error = %rollback_err, "Failed to roll back pledge transaction");
            }
            // the gateway already holds the money; leave enough to refund or reconcile it
            tracing::error!(
                error = %err,
                intent_id = %payment.intent_id(),
                gateway_transaction_id = %payment.gateway_transaction_id(),
                amount_cents = payment.amount_minor(),
                backer_id = %request.backer_id,
                "Captured payment was not recorded as a pledge"
            );
            Err(err)
        }
    }
}

fn check_preconditions(request: &FinalizePledge, payment: &VerifiedPayment) -> Result<(), PledgeError> {
    if request.amount_cents <= 0 {
        return Err(PledgeError::Validation(
            "amount must be greater than zero".to_string(),
        ));
    }
    if payment.intent_id() != request.payment_intent_id {
        return Err(PledgeError::PaymentNotVerified(
            "verified payment belongs to a different intent".to_string(),
        ));
    }
    if payment.amount_minor() != request.amount_cents {
        return Err(PledgeError::PaymentNotVerified(
            "verified amount does not match the pledge amount".to_string(),
        ));
    }
    let tags = payment.metadata();
    if tags.project_id != request.project_id
        || tags.reward_id != request.reward_id
        || tags.user_id != request.backer_id
    {
        return Err(PledgeError::PaymentNotVerified(
            "verified payment was made for a different pledge".to_string(),
        ));
    }
    if payment.gateway_transaction_id().trim().is_empty() {
        return Err(PledgeError::PaymentNotVerified(
            "gateway did not report a transaction id".to_string(),
        ));
    }
    Ok(())
}

async fn apply(
    txn: &DatabaseTransaction,
    request: &FinalizePledge,
    payment: &VerifiedPayment,
) -> Result<FinalizedPledge, PledgeError> {
    if let Some(existing) = Pledge::find()
        .filter(pledge::Column::PaymentIntentId.eq(request.payment_intent_id.as_str()))
        .one(txn)
        .await?
    {
        let transaction = existing
            .find_related(transaction::Entity)
            .one(txn)
            .await?
            .ok_or(PledgeError::NotFound("transaction"))?;
        tracing::info!(pledge_id = %existing.id, "Payment intent already recorded");
        return Ok(FinalizedPledge {
            pledge: existing,
            transaction,
            replayed: true,
        });
    }

    if Project::find_by_id(request.project_id).one(txn).await?.is_none() {
        return Err(PledgeError::NotFound("project"));
    }

    if let Some(reward_id) = request.reward_id {
        claim_reward(txn, request.project_id, reward_id, request.amount_cents).await?;
    }

    let now = Utc::now();
    let pledge = pledge::ActiveModel {
        id: Set(Uuid::new_v4()),
        project_id: Set(request.project_id),
        backer_id: Set(request.backer_id),
        reward_id: Set(request.reward_id),
        amount_cents: Set(request.amount_cents),
        pledge_date: Set(now),
        is_anonymous: Set(request.is_anonymous),
        payment_intent_id: Set(request.payment_intent_id.clone()),
    }
    .insert(txn)
    .await
    .map_err(storage_error)?;

    #[cfg(test)]
    if FAIL_AFTER_PLEDGE_INSERT.with(|flag| flag.get()) {
        return Err(PledgeError::Database(sea_orm::DbErr::Custom(
            "injected failure after pledge insert".to_string(),
        )));
    }

    let transaction = transaction::ActiveModel {
        id: Set(Uuid::new_v4()),
        pledge_id: Set(pledge.id),
        gateway_transaction_id: Set(payment.gateway_transaction_id().to_string()),
        payment_method: Set(payment.payment_method().to_string()),
        amount_cents: Set(request.amount_cents),
        currency: Set(payment.currency().to_string()),
        transaction_date: Set(now),
        status: Set(TransactionStatus::Completed),
        failure_reason: Set(None),
    }
    .insert(txn)
    .await
    .map_err(storage_error)?;

    let funded = Project::update_many()
        .col_expr(
            project::Column::CurrentFundingCents,
            Expr::col(project::Column::CurrentFundingCents).add(request.amount_cents),
        )
        .filter(project::Column::Id.eq(request.project_id))
        .exec(txn)
        .await
        .map_err(storage_error)?;
    if funded.rows_affected == 0 {
        return Err(PledgeError::NotFound("project"));
    }

    Ok(FinalizedPledge {
        pledge,
        transaction,
        replayed: false,
    })
}

/// Claims one unit of the reward with a compare-and-swap update. A bounded
/// reward that is already fully claimed leaves the row untouched.
async fn claim_reward(
    txn: &DatabaseTransaction,
    project_id: Uuid,
    reward_id: Uuid,
    amount_cents: i64,
) -> Result<(), PledgeError> {
    let reward = Reward::find_by_id(reward_id)
        .one(txn)
        .await?
        .ok_or(PledgeError::NotFound("reward"))?;
    if reward.project_id != project_id {
        return Err(PledgeError::Validation(
            "reward does not belong to this project".to_string(),
        ));
    }
    if amount_cents < reward.pledge_amount_cents {
        return Err(PledgeError::Validation(
            "pledge amount is below the reward threshold".to_string(),
        ));
    }

    let claimed = Reward::update_many()
        .col_expr(
            reward::Column::QuantityClaimed,
            Expr::col(reward::Column::QuantityClaimed).add(1),
        )
        .filter(reward::Column::Id.eq(reward_id))
        .filter(reward::Column::ProjectId.eq(project_id))
        .filter(
            Condition::any()
                .add(reward::Column::QuantityAvailable.is_null())
                .add(
                    Expr::col(reward::Column::QuantityClaimed)
                        .lt(Expr::col(reward::Column::QuantityAvailable)),
                ),
        )
        .exec(txn)
        .await
        .map_err(storage_error)?;

    if claimed.rows_affected == 0 {
        return Err(PledgeError::ConcurrencyConflict(format!(
            "reward '{}' is sold out",
            reward.title
        )));
    }
    Ok(())
}
