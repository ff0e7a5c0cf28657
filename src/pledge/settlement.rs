use sea_orm::DatabaseConnection;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use super::ledger::{self, FinalizePledge, FinalizedPledge};
use super::{PledgeError, PledgeState};
use crate::gateway::{self, GatewayError, PaymentGateway, PaymentVerification};

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct ConfirmPledge {
    pub payment_intent_id: String,
    #[serde(default)]
    pub is_anonymous: bool,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ConfirmedPledge {
    pub state: PledgeState,
    #[serde(flatten)]
    pub finalized: FinalizedPledge,
}

/// Confirms a pledge from its payment intent.
///
/// The intent is re-read from the gateway; project, reward and amount are
/// taken from the verified intent rather than from the client. An intent the
/// gateway reports as canceled or declined abandons the pledge.
#[tracing::instrument(skip(db, gateway, request), fields(intent_id = %request.payment_intent_id))]
pub async fn confirm_pledge(
    db: &DatabaseConnection,
    gateway: &dyn PaymentGateway,
    currency: &str,
    backer_id: Uuid,
    request: &ConfirmPledge,
) -> Result<ConfirmedPledge, PledgeError> {
    let intent_id = request.payment_intent_id.trim();
    if intent_id.is_empty() {
        return Err(PledgeError::Validation(
            "payment_intent_id is required".to_string(),
        ));
    }

    let mut state = PledgeState::AwaitingPayment;
    let verification = match gateway::verify_payment(gateway, intent_id).await {
        Ok(verification) => verification,
        Err(GatewayError::IntentNotFound(_)) => return Err(PledgeError::NotFound("payment intent")),
        Err(e) => return Err(e.into()),
    };

    let payment = match verification {
        PaymentVerification::Verified(payment) => payment,
        PaymentVerification::Unverified { status } => {
            return Err(PledgeError::PaymentNotVerified(format!(
                "payment intent is {}",
                status
            )))
        }
        PaymentVerification::Failed { reason } => {
            state = state.transition(PledgeState::Abandoned)?;
            tracing::info!(?state, %reason, "Pledge abandoned");
            return Err(PledgeError::PaymentNotVerified(reason));
        }
    };

    let tags = payment.metadata();
    if tags.user_id != backer_id {
        return Err(PledgeError::Validation(
            "payment intent was not created for this user".to_string(),
        ));
    }
    if !payment.currency().eq_ignore_ascii_case(currency) {
        return Err(PledgeError::Validation(format!(
            "payment was made in {}, pledges are taken in {}",
            payment.currency(),
            currency
        )));
    }

    let finalize = FinalizePledge {
        project_id: tags.project_id,
        backer_id,
        amount_cents: payment.amount_minor(),
        reward_id: tags.reward_id,
        payment_intent_id: payment.intent_id().to_string(),
        is_anonymous: request.is_anonymous,
    };
    let finalized = ledger::finalize(db, &finalize, &payment).await?;

    Ok(ConfirmedPledge {
        state: state.transition(PledgeState::Finalized)?,
        finalized,
    })
}
