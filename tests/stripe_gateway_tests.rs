//! Stripe adapter against a wiremock server: request shape, response
//! decoding and which failures are retried.

use std::time::Duration;

use serde_json::json;
use url::Url;
use uuid::Uuid;
use wiremock::matchers::{body_string_contains, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use crowdfund::config::GatewayConfig;
use crowdfund::gateway::{
    GatewayError, IntentMetadata, IntentRequest, IntentStatus, PaymentGateway, StripeGateway,
};

fn gateway(server: &MockServer, retry_budget: Duration) -> StripeGateway {
    let config = GatewayConfig {
        api_base: Url::parse(&server.uri()).expect("mock server url"),
        secret_key: "sk_test_abc".to_string(),
        publishable_key: "pk_test_abc".to_string(),
        currency: "usd".to_string(),
        timeout: Duration::from_secs(5),
        retry_max_elapsed: retry_budget,
    };
    StripeGateway::new(&config).expect("gateway build")
}

fn intent_body(id: &str, status: &str) -> serde_json::Value {
    json!({
        "id": id,
        "object": "payment_intent",
        "amount": 5000,
        "currency": "usd",
        "status": status,
        "client_secret": format!("{}_secret_xyz", id),
        "metadata": {},
        "payment_method_types": ["card"]
    })
}

#[tokio::test]
async fn create_intent_sends_form_and_idempotency_key() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/payment_intents"))
        .and(header("Authorization", "Bearer sk_test_abc"))
        .and(header("Idempotency-Key", "key-1"))
        .and(body_string_contains("amount=5000"))
        .and(body_string_contains("currency=usd"))
        .and(body_string_contains("automatic_payment_methods%5Benabled%5D=true"))
        .and(body_string_contains("metadata%5BuserId%5D="))
        .respond_with(ResponseTemplate::new(200).set_body_json(intent_body(
            "pi_123",
            "requires_payment_method",
        )))
        .expect(1)
        .mount(&server)
        .await;

    let request = IntentRequest {
        amount_minor: 5000,
        currency: "usd".to_string(),
        metadata: IntentMetadata {
            project_id: Uuid::new_v4(),
            reward_id: None,
            user_id: Uuid::new_v4(),
        },
        idempotency_key: "key-1".to_string(),
    };
    let created = gateway(&server, Duration::from_secs(2))
        .create_intent(&request)
        .await
        .expect("intent created");
    assert_eq!(created.id, "pi_123");
    assert_eq!(created.client_secret, "pi_123_secret_xyz");
}

#[tokio::test]
async fn retrieve_intent_reads_expanded_charge() {
    let server = MockServer::start().await;
    let mut body = intent_body("pi_456", "succeeded");
    body["latest_charge"] = json!({ "id": "ch_789", "object": "charge" });
    body["metadata"] = json!({ "userId": "abc" });

    Mock::given(method("GET"))
        .and(path("/v1/payment_intents/pi_456"))
        .respond_with(ResponseTemplate::new(200).set_body_json(body))
        .mount(&server)
        .await;

    let snapshot = gateway(&server, Duration::from_secs(2))
        .retrieve_intent("pi_456")
        .await
        .expect("intent retrieved");
    assert_eq!(snapshot.status, IntentStatus::Succeeded);
    assert_eq!(snapshot.amount_minor, 5000);
    assert_eq!(snapshot.latest_charge.as_deref(), Some("ch_789"));
    assert_eq!(snapshot.metadata.get("userId").map(String::as_str), Some("abc"));
}

#[tokio::test]
async fn unknown_intent_is_not_found() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/v1/payment_intents/pi_missing"))
        .respond_with(ResponseTemplate::new(404).set_body_json(json!({
            "error": { "message": "No such payment_intent: 'pi_missing'", "code": "resource_missing" }
        })))
        .expect(1)
        .mount(&server)
        .await;

    let result = gateway(&server, Duration::from_secs(2))
        .retrieve_intent("pi_missing")
        .await;
    assert!(matches!(result, Err(GatewayError::IntentNotFound(id)) if id == "pi_missing"));
}

#[tokio::test]
async fn malformed_intent_id_never_reaches_the_network() {
    let server = MockServer::start().await;

    let result = gateway(&server, Duration::from_secs(2))
        .retrieve_intent("../v1/charges")
        .await;
    assert!(matches!(result, Err(GatewayError::IntentNotFound(_))));
    assert!(server.received_requests().await.unwrap_or_default().is_empty());
}

#[tokio::test]
async fn server_errors_are_retried() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/v1/payment_intents/pi_flaky"))
        .respond_with(ResponseTemplate::new(500))
        .up_to_n_times(1)
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v1/payment_intents/pi_flaky"))
        .respond_with(ResponseTemplate::new(200).set_body_json(intent_body("pi_flaky", "processing")))
        .expect(1)
        .mount(&server)
        .await;

    let snapshot = gateway(&server, Duration::from_secs(10))
        .retrieve_intent("pi_flaky")
        .await
        .expect("retried to success");
    assert_eq!(snapshot.status, IntentStatus::Processing);
}

#[tokio::test]
async fn client_errors_are_not_retried() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/payment_intents"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "error": { "message": "Amount must be at least 50 cents", "code": "amount_too_small" }
        })))
        .expect(1)
        .mount(&server)
        .await;

    let request = IntentRequest {
        amount_minor: 10,
        currency: "usd".to_string(),
        metadata: IntentMetadata {
            project_id: Uuid::new_v4(),
            reward_id: None,
            user_id: Uuid::new_v4(),
        },
        idempotency_key: Uuid::new_v4().to_string(),
    };
    let result = gateway(&server, Duration::from_secs(10))
        .create_intent(&request)
        .await;
    match result {
        Err(GatewayError::Api { status, message, .. }) => {
            assert_eq!(status, 400);
            assert_eq!(message, "Amount must be at least 50 cents (amount_too_small)");
        }
        other => panic!("expected an API error, got {:?}", other),
    }
}
