//! Staging and payment authorization. Nothing here writes to the database;
//! a staged pledge lives on the client until the payment is confirmed.

use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::{ConnectionTrait, EntityTrait};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use super::PledgeError;
use crate::catalog;
use crate::entities::{project, reward, Project, ProjectStatus};
use crate::gateway::{IntentMetadata, IntentRequest, PaymentGateway};
use crate::money;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub enum PledgeState {
    Draft,
    AwaitingPayment,
    Finalized,
    Abandoned,
}

impl PledgeState {
    pub fn can_transition_to(self, next: PledgeState) -> bool {
        use PledgeState::*;
        matches!(
            (self, next),
            (Draft, AwaitingPayment)
                | (AwaitingPayment, Finalized)
                | (Draft, Abandoned)
                | (AwaitingPayment, Abandoned)
        )
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, PledgeState::Finalized | PledgeState::Abandoned)
    }

    pub fn transition(self, next: PledgeState) -> Result<PledgeState, PledgeError> {
        if self.can_transition_to(next) {
            Ok(next)
        } else {
            Err(PledgeError::IllegalTransition {
                from: self,
                to: next,
            })
        }
    }
}

/// What the backer picked on the pledge form.
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct PledgeSelection {
    pub project_id: Uuid,
    /// Decimal amount in the pledge currency, at most two fractional digits.
    #[schema(value_type = String, example = "50.00")]
    pub amount: Decimal,
    #[serde(default)]
    pub reward_id: Option<Uuid>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct StagedPledge {
    pub project_id: Uuid,
    pub project_title: String,
    pub reward_id: Option<Uuid>,
    pub reward_title: Option<String>,
    #[schema(value_type = String, example = "50.00")]
    pub amount: Decimal,
    pub amount_cents: i64,
    pub state: PledgeState,
}

impl StagedPledge {
    pub fn advance(&mut self, next: PledgeState) -> Result<(), PledgeError> {
        self.state = self.state.transition(next)?;
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct PaymentAuthorization {
    pub payment_intent_id: String,
    pub client_secret: String,
    pub pledge: StagedPledge,
}

/// Validates a pledge selection against the current project and reward rows.
#[tracing::instrument(skip(db, selection), fields(project_id = %selection.project_id))]
pub async fn stage<C>(db: &C, selection: &PledgeSelection) -> Result<StagedPledge, PledgeError>
where
    C: ConnectionTrait,
{
    let amount_cents = money::to_minor_units(selection.amount)?;

    let project = Project::find_by_id(selection.project_id)
        .one(db)
        .await?
        .ok_or(PledgeError::NotFound("project"))?;
    ensure_accepts_pledges(&project)?;

    let reward = match selection.reward_id {
        Some(reward_id) => {
            let reward = catalog::get_reward(db, reward_id)
                .await?
                .ok_or(PledgeError::NotFound("reward"))?;
            ensure_reward_fits(&project, &reward, amount_cents)?;
            Some(reward)
        }
        None => None,
    };

    Ok(StagedPledge {
        project_id: project.id,
        project_title: project.title,
        reward_id: reward.as_ref().map(|r| r.id),
        reward_title: reward.map(|r| r.title),
        amount: money::from_minor_units(amount_cents),
        amount_cents,
        state: PledgeState::Draft,
    })
}

/// Re-stages `selection` and opens a payment intent for it on behalf of
/// `backer_id`. The staged pledge comes back in `AwaitingPayment`.
#[tracing::instrument(skip(db, gateway, selection), fields(project_id = %selection.project_id))]
pub async fn create_payment_authorization<C>(
    db: &C,
    gateway: &dyn PaymentGateway,
    currency: &str,
    selection: &PledgeSelection,
    backer_id: Uuid,
) -> Result<PaymentAuthorization, PledgeError>
where
    C: ConnectionTrait,
{
    let mut pledge = stage(db, selection).await?;

    let request = IntentRequest {
        amount_minor: pledge.amount_cents,
        currency: currency.to_string(),
        metadata: IntentMetadata {
            project_id: pledge.project_id,
            reward_id: pledge.reward_id,
            user_id: backer_id,
        },
        idempotency_key: Uuid::new_v4().to_string(),
    };
    let intent = gateway.create_intent(&request).await?;
    pledge.advance(PledgeState::AwaitingPayment)?;

    tracing::info!(intent_id = %intent.id, amount_cents = pledge.amount_cents, "Payment authorization created");
    Ok(PaymentAuthorization {
        payment_intent_id: intent.id,
        client_secret: intent.client_secret,
        pledge,
    })
}

pub(crate) fn ensure_accepts_pledges(project: &project::Model) -> Result<(), PledgeError> {
    if project.status != ProjectStatus::Active {
        return Err(PledgeError::Validation(
            "project is not accepting pledges".to_string(),
        ));
    }
    let now = Utc::now();
    if project.start_date > now {
        return Err(PledgeError::Validation(
            "project funding period has not started".to_string(),
        ));
    }
    if project.end_date <= now {
        return Err(PledgeError::Validation(
            "project funding period has ended".to_string(),
        ));
    }
    Ok(())
}

pub(crate) fn ensure_reward_fits(
    project: &project::Model,
    reward: &reward::Model,
    amount_cents: i64,
) -> Result<(), PledgeError> {
    if reward.project_id != project.id {
        return Err(PledgeError::Validation(
            "reward does not belong to this project".to_string(),
        ));
    }
    if amount_cents < reward.pledge_amount_cents {
        return Err(PledgeError::Validation(format!(
            "pledge amount must be at least {} for this reward",
            money::from_minor_units(reward.pledge_amount_cents)
        )));
    }
    if !reward.is_available() {
        return Err(PledgeError::Validation(
            "reward is no longer available".to_string(),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn project(status: ProjectStatus) -> project::Model {
        let now = Utc::now();
        project::Model {
            id: Uuid::new_v4(),
            creator_id: Uuid::new_v4(),
            title: "Solar Lantern".to_string(),
            description: "Light for everyone".to_string(),
            category: "Technology".to_string(),
            funding_goal_cents: 100_000,
            current_funding_cents: 0,
            start_date: now - Duration::days(1),
            end_date: now + Duration::days(30),
            status,
            media_urls: String::new(),
            date_created: now,
            last_updated: now,
        }
    }

    fn reward(project_id: Uuid, threshold: i64, available: Option<i32>, claimed: i32) -> reward::Model {
        reward::Model {
            id: Uuid::new_v4(),
            project_id,
            title: "Early bird".to_string(),
            description: None,
            pledge_amount_cents: threshold,
            quantity_available: available,
            quantity_claimed: claimed,
            estimated_delivery: None,
            position: 0,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn only_forward_transitions_are_legal() {
        use PledgeState::*;
        assert!(Draft.can_transition_to(AwaitingPayment));
        assert!(AwaitingPayment.can_transition_to(Finalized));
        assert!(AwaitingPayment.can_transition_to(Abandoned));
        assert!(Draft.can_transition_to(Abandoned));

        assert!(!Draft.can_transition_to(Finalized));
        assert!(!Finalized.can_transition_to(Abandoned));
        assert!(!Abandoned.can_transition_to(Draft));
        assert!(matches!(
            Finalized.transition(AwaitingPayment),
            Err(PledgeError::IllegalTransition { .. })
        ));
        assert!(Finalized.is_terminal() && Abandoned.is_terminal());
    }

    #[test]
    fn inactive_or_ended_projects_reject_pledges() {
        assert!(ensure_accepts_pledges(&project(ProjectStatus::Active)).is_ok());
        assert!(ensure_accepts_pledges(&project(ProjectStatus::PendingApproval)).is_err());

        let mut ended = project(ProjectStatus::Active);
        ended.end_date = Utc::now() - Duration::hours(1);
        assert!(matches!(
            ensure_accepts_pledges(&ended),
            Err(PledgeError::Validation(_))
        ));
    }

    #[test]
    fn projects_not_yet_started_reject_pledges() {
        let mut upcoming = project(ProjectStatus::Active);
        upcoming.start_date = Utc::now() + Duration::days(2);
        assert!(matches!(
            ensure_accepts_pledges(&upcoming),
            Err(PledgeError::Validation(msg)) if msg.contains("not started")
        ));
    }

    #[test]
    fn reward_threshold_and_availability_are_enforced() {
        let p = project(ProjectStatus::Active);
        assert!(ensure_reward_fits(&p, &reward(p.id, 2500, Some(1), 0), 5000).is_ok());
        assert!(ensure_reward_fits(&p, &reward(p.id, 2500, None, 40), 2500).is_ok());
        assert!(ensure_reward_fits(&p, &reward(p.id, 2500, Some(1), 0), 2499).is_err());
        assert!(ensure_reward_fits(&p, &reward(p.id, 2500, Some(1), 1), 5000).is_err());
        assert!(ensure_reward_fits(&p, &reward(Uuid::new_v4(), 100, None, 0), 5000).is_err());
    }
}
