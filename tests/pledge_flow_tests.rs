mod common;

use std::str::FromStr;

use rust_decimal::Decimal;
use sea_orm::{EntityTrait, PaginatorTrait};

use common::{create_project, create_reward, create_user, test_db, FakeGateway};
use crowdfund::entities::{Pledge, Project, ProjectStatus, Reward, Transaction, TransactionStatus, UserRole};
use crowdfund::gateway::PaymentGateway;
use crowdfund::pledge::intake::{self, PledgeSelection};
use crowdfund::pledge::settlement::{self, ConfirmPledge};
use crowdfund::pledge::{PledgeError, PledgeState};

fn dec(s: &str) -> Decimal {
    Decimal::from_str(s).unwrap()
}

fn confirm(intent_id: &str) -> ConfirmPledge {
    ConfirmPledge {
        payment_intent_id: intent_id.to_string(),
        is_anonymous: false,
    }
}

#[tokio::test]
async fn stage_rejects_non_positive_amounts() {
    let db = test_db().await;
    let creator = create_user(&db, "maker", UserRole::Creator).await;
    let project = create_project(&db, creator.id, "Kiln", ProjectStatus::Active).await;

    for amount in ["0", "-10.00"] {
        let selection = PledgeSelection {
            project_id: project.id,
            amount: dec(amount),
            reward_id: None,
        };
        let result = intake::stage(&db, &selection).await;
        assert!(
            matches!(result, Err(PledgeError::Validation(_))),
            "amount {} should be rejected, got {:?}",
            amount,
            result
        );
    }
}

#[tokio::test]
async fn stage_checks_project_and_reward() {
    let db = test_db().await;
    let creator = create_user(&db, "maker", UserRole::Creator).await;
    let pending = create_project(&db, creator.id, "Pending", ProjectStatus::PendingApproval).await;
    let active = create_project(&db, creator.id, "Active", ProjectStatus::Active).await;
    let other = create_project(&db, creator.id, "Other", ProjectStatus::Active).await;
    let foreign_reward = create_reward(&db, other.id, "Mug", 1_000, None).await;
    let tier = create_reward(&db, active.id, "Poster", 2_500, Some(3)).await;

    let not_active = intake::stage(
        &db,
        &PledgeSelection { project_id: pending.id, amount: dec("10"), reward_id: None },
    )
    .await;
    assert!(matches!(not_active, Err(PledgeError::Validation(_))));

    let wrong_project = intake::stage(
        &db,
        &PledgeSelection { project_id: active.id, amount: dec("50"), reward_id: Some(foreign_reward.id) },
    )
    .await;
    assert!(matches!(wrong_project, Err(PledgeError::Validation(_))));

    let below_threshold = intake::stage(
        &db,
        &PledgeSelection { project_id: active.id, amount: dec("24.99"), reward_id: Some(tier.id) },
    )
    .await;
    assert!(matches!(below_threshold, Err(PledgeError::Validation(_))));

    let missing = intake::stage(
        &db,
        &PledgeSelection { project_id: uuid::Uuid::new_v4(), amount: dec("10"), reward_id: None },
    )
    .await;
    assert!(matches!(missing, Err(PledgeError::NotFound("project"))));

    let staged = intake::stage(
        &db,
        &PledgeSelection { project_id: active.id, amount: dec("25"), reward_id: Some(tier.id) },
    )
    .await
    .unwrap();
    assert_eq!(staged.state, PledgeState::Draft);
    assert_eq!(staged.amount_cents, 2_500);
    assert_eq!(staged.reward_title.as_deref(), Some("Poster"));

    // staging writes nothing
    assert_eq!(Pledge::find().count(&db).await.unwrap(), 0);
}

#[tokio::test]
async fn confirmed_pledge_records_completed_transaction() {
    let db = test_db().await;
    let gateway = FakeGateway::new();
    let creator = create_user(&db, "maker", UserRole::Creator).await;
    let backer = create_user(&db, "fan", UserRole::Backer).await;
    let project = create_project(&db, creator.id, "Kiln", ProjectStatus::Active).await;
    let tier = create_reward(&db, project.id, "Early bird", 2_500, Some(1)).await;

    let selection = PledgeSelection {
        project_id: project.id,
        amount: dec("50.00"),
        reward_id: Some(tier.id),
    };
    let auth = intake::create_payment_authorization(&db, gateway.as_ref(), "usd", &selection, backer.id)
        .await
        .unwrap();
    assert_eq!(auth.pledge.state, PledgeState::AwaitingPayment);
    assert!(!auth.client_secret.is_empty());

    gateway.succeed(&auth.payment_intent_id);
    let confirmed = settlement::confirm_pledge(&db, gateway.as_ref(), "usd", backer.id, &confirm(&auth.payment_intent_id))
        .await
        .unwrap();

    assert_eq!(confirmed.state, PledgeState::Finalized);
    assert!(!confirmed.finalized.replayed);
    let pledge = &confirmed.finalized.pledge;
    assert_eq!(pledge.amount_cents, 5_000);
    assert_eq!(pledge.reward_id, Some(tier.id));
    assert_eq!(pledge.backer_id, backer.id);

    let transaction = Transaction::find().one(&db).await.unwrap().unwrap();
    assert_eq!(transaction.pledge_id, pledge.id);
    assert_eq!(transaction.status, TransactionStatus::Completed);
    assert!(!transaction.gateway_transaction_id.is_empty());
    assert_eq!(transaction.currency, "usd");

    let project = Project::find_by_id(project.id).one(&db).await.unwrap().unwrap();
    assert_eq!(project.current_funding_cents, 5_000);
    let tier = Reward::find_by_id(tier.id).one(&db).await.unwrap().unwrap();
    assert_eq!(tier.quantity_claimed, 1);
}

#[tokio::test]
async fn second_pledge_fails_once_single_unit_reward_is_claimed() {
    let db = test_db().await;
    let gateway = FakeGateway::new();
    let creator = create_user(&db, "maker", UserRole::Creator).await;
    let first_backer = create_user(&db, "first", UserRole::Backer).await;
    let second_backer = create_user(&db, "second", UserRole::Backer).await;
    let project = create_project(&db, creator.id, "Kiln", ProjectStatus::Active).await;
    let tier = create_reward(&db, project.id, "Only one", 2_500, Some(1)).await;

    let selection = PledgeSelection {
        project_id: project.id,
        amount: dec("50.00"),
        reward_id: Some(tier.id),
    };

    // Both backers get an intent before either pays.
    let first = intake::create_payment_authorization(&db, gateway.as_ref(), "usd", &selection, first_backer.id)
        .await
        .unwrap();
    let second = intake::create_payment_authorization(&db, gateway.as_ref(), "usd", &selection, second_backer.id)
        .await
        .unwrap();

    gateway.succeed(&first.payment_intent_id);
    settlement::confirm_pledge(&db, gateway.as_ref(), "usd", first_backer.id, &confirm(&first.payment_intent_id))
        .await
        .unwrap();

    // Staging now sees the tier as sold out.
    let restaged = intake::stage(&db, &selection).await;
    assert!(matches!(restaged, Err(PledgeError::Validation(_))));

    // And the already-paid second intent loses at the claim.
    gateway.succeed(&second.payment_intent_id);
    let result = settlement::confirm_pledge(&db, gateway.as_ref(), "usd", second_backer.id, &confirm(&second.payment_intent_id)).await;
    assert!(matches!(result, Err(PledgeError::ConcurrencyConflict(_))), "got {:?}", result);

    assert_eq!(Pledge::find().count(&db).await.unwrap(), 1);
    let tier = Reward::find_by_id(tier.id).one(&db).await.unwrap().unwrap();
    assert_eq!(tier.quantity_claimed, 1);
}

#[tokio::test]
async fn concurrent_confirmations_never_oversell_a_reward() {
    const UNITS: i32 = 3;

    let db = test_db().await;
    let gateway = FakeGateway::new();
    let creator = create_user(&db, "maker", UserRole::Creator).await;
    let project = create_project(&db, creator.id, "Kiln", ProjectStatus::Active).await;
    let tier = create_reward(&db, project.id, "Limited", 1_000, Some(UNITS)).await;

    let selection = PledgeSelection {
        project_id: project.id,
        amount: dec("10"),
        reward_id: Some(tier.id),
    };

    let mut paid = Vec::new();
    for i in 0..=UNITS {
        let backer = create_user(&db, &format!("backer{}", i), UserRole::Backer).await;
        let auth = intake::create_payment_authorization(&db, gateway.as_ref(), "usd", &selection, backer.id)
            .await
            .unwrap();
        gateway.succeed(&auth.payment_intent_id);
        paid.push((backer.id, auth.payment_intent_id));
    }

    let handles: Vec<_> = paid
        .into_iter()
        .map(|(backer_id, intent_id)| {
            let db = db.clone();
            let gateway = gateway.clone();
            tokio::spawn(async move {
                settlement::confirm_pledge(&db, gateway.as_ref(), "usd", backer_id, &confirm(&intent_id)).await
            })
        })
        .collect();

    let mut succeeded = 0;
    let mut conflicts = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(_) => succeeded += 1,
            Err(PledgeError::ConcurrencyConflict(_)) => conflicts += 1,
            Err(other) => panic!("unexpected error: {:?}", other),
        }
    }

    assert_eq!(succeeded, UNITS);
    assert_eq!(conflicts, 1);
    let tier = Reward::find_by_id(tier.id).one(&db).await.unwrap().unwrap();
    assert_eq!(tier.quantity_claimed, UNITS);
    let project = Project::find_by_id(project.id).one(&db).await.unwrap().unwrap();
    assert_eq!(project.current_funding_cents, 1_000 * i64::from(UNITS));
}

#[tokio::test]
async fn confirming_the_same_intent_twice_is_a_replay() {
    let db = test_db().await;
    let gateway = FakeGateway::new();
    let creator = create_user(&db, "maker", UserRole::Creator).await;
    let backer = create_user(&db, "fan", UserRole::Backer).await;
    let project = create_project(&db, creator.id, "Kiln", ProjectStatus::Active).await;

    let selection = PledgeSelection {
        project_id: project.id,
        amount: dec("15"),
        reward_id: None,
    };
    let auth = intake::create_payment_authorization(&db, gateway.as_ref(), "usd", &selection, backer.id)
        .await
        .unwrap();
    gateway.succeed(&auth.payment_intent_id);

    let first = settlement::confirm_pledge(&db, gateway.as_ref(), "usd", backer.id, &confirm(&auth.payment_intent_id))
        .await
        .unwrap();
    let second = settlement::confirm_pledge(&db, gateway.as_ref(), "usd", backer.id, &confirm(&auth.payment_intent_id))
        .await
        .unwrap();

    assert!(second.finalized.replayed);
    assert_eq!(first.finalized.pledge.id, second.finalized.pledge.id);
    assert_eq!(Pledge::find().count(&db).await.unwrap(), 1);
    let project = Project::find_by_id(project.id).one(&db).await.unwrap().unwrap();
    assert_eq!(project.current_funding_cents, 1_500);
}

#[tokio::test]
async fn unpaid_or_declined_intents_are_not_recorded() {
    let db = test_db().await;
    let gateway = FakeGateway::new();
    let creator = create_user(&db, "maker", UserRole::Creator).await;
    let backer = create_user(&db, "fan", UserRole::Backer).await;
    let project = create_project(&db, creator.id, "Kiln", ProjectStatus::Active).await;
    let selection = PledgeSelection {
        project_id: project.id,
        amount: dec("20"),
        reward_id: None,
    };

    let unpaid = intake::create_payment_authorization(&db, gateway.as_ref(), "usd", &selection, backer.id)
        .await
        .unwrap();
    let result = settlement::confirm_pledge(&db, gateway.as_ref(), "usd", backer.id, &confirm(&unpaid.payment_intent_id)).await;
    assert!(matches!(result, Err(PledgeError::PaymentNotVerified(_))));

    gateway.decline(&unpaid.payment_intent_id, "Your card was declined.");
    let result = settlement::confirm_pledge(&db, gateway.as_ref(), "usd", backer.id, &confirm(&unpaid.payment_intent_id)).await;
    match result {
        Err(PledgeError::PaymentNotVerified(reason)) => assert_eq!(reason, "Your card was declined."),
        other => panic!("expected declined payment, got {:?}", other),
    }

    let unknown = settlement::confirm_pledge(&db, gateway.as_ref(), "usd", backer.id, &confirm("pi_missing")).await;
    assert!(matches!(unknown, Err(PledgeError::NotFound(_))));

    assert_eq!(Pledge::find().count(&db).await.unwrap(), 0);
}

#[tokio::test]
async fn another_users_intent_cannot_be_claimed() {
    let db = test_db().await;
    let gateway = FakeGateway::new();
    let creator = create_user(&db, "maker", UserRole::Creator).await;
    let payer = create_user(&db, "payer", UserRole::Backer).await;
    let thief = create_user(&db, "thief", UserRole::Backer).await;
    let project = create_project(&db, creator.id, "Kiln", ProjectStatus::Active).await;
    let selection = PledgeSelection {
        project_id: project.id,
        amount: dec("20"),
        reward_id: None,
    };

    let auth = intake::create_payment_authorization(&db, gateway.as_ref(), "usd", &selection, payer.id)
        .await
        .unwrap();
    gateway.succeed(&auth.payment_intent_id);

    let result = settlement::confirm_pledge(&db, gateway.as_ref(), "usd", thief.id, &confirm(&auth.payment_intent_id)).await;
    assert!(matches!(result, Err(PledgeError::Validation(_))));
    assert_eq!(Pledge::find().count(&db).await.unwrap(), 0);
}

#[tokio::test]
async fn gateway_failure_surfaces_as_gateway_error() {
    let db = test_db().await;
    let gateway = FakeGateway::new();
    *gateway.fail_create.lock().unwrap() = true;
    let creator = create_user(&db, "maker", UserRole::Creator).await;
    let backer = create_user(&db, "fan", UserRole::Backer).await;
    let project = create_project(&db, creator.id, "Kiln", ProjectStatus::Active).await;

    let selection = PledgeSelection {
        project_id: project.id,
        amount: dec("20"),
        reward_id: None,
    };
    let result = intake::create_payment_authorization(&db, gateway.as_ref(), "usd", &selection, backer.id).await;
    assert!(matches!(result, Err(PledgeError::Gateway(_))));
    // the trait object is what the server holds
    let _: &dyn PaymentGateway = gateway.as_ref();
}
