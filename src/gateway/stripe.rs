//! Stripe PaymentIntents over plain HTTPS.
//!
//! Requests are form-encoded and authenticated with the secret key as a
//! bearer token. Transport failures, `429` and `5xx` answers are retried with
//! exponential backoff inside the configured time budget; any other error
//! status is returned straight away.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use backoff::future::retry_notify;
use backoff::Error as BackoffError;
use backoff::ExponentialBackoff;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::Deserialize;
use url::Url;

use super::{
    CreatedIntent, GatewayError, IntentRequest, IntentSnapshot, IntentStatus, PaymentGateway,
};
use crate::config::GatewayConfig;

const PAYMENT_INTENTS_PATH: &str = "v1/payment_intents";

#[derive(Debug, Clone)]
pub struct StripeGateway {
    client: Client,
    api_base: Url,
    retry_max_elapsed: Duration,
}

#[derive(Debug, Deserialize)]
struct StripePaymentIntent {
    id: String,
    amount: i64,
    currency: String,
    status: IntentStatus,
    client_secret: Option<String>,
    #[serde(default)]
    metadata: HashMap<String, String>,
    /// Either a charge id or, when expanded, the charge object.
    #[serde(default)]
    latest_charge: Option<serde_json::Value>,
    #[serde(default)]
    payment_method_types: Vec<String>,
    #[serde(default)]
    last_payment_error: Option<StripeErrorDetail>,
}

#[derive(Debug, Deserialize)]
struct StripeErrorEnvelope {
    error: StripeErrorDetail,
}

#[derive(Debug, Deserialize)]
struct StripeErrorDetail {
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    code: Option<String>,
}

impl From<StripePaymentIntent> for IntentSnapshot {
    fn from(intent: StripePaymentIntent) -> Self {
        let latest_charge = match intent.latest_charge {
            Some(serde_json::Value::String(id)) => Some(id),
            Some(serde_json::Value::Object(charge)) => charge
                .get("id")
                .and_then(|id| id.as_str())
                .map(str::to_string),
            _ => None,
        };
        IntentSnapshot {
            id: intent.id,
            status: intent.status,
            amount_minor: intent.amount,
            currency: intent.currency,
            metadata: intent.metadata,
            latest_charge,
            payment_method_types: intent.payment_method_types,
            last_payment_error: intent.last_payment_error.and_then(|e| e.message),
        }
    }
}

impl StripeGateway {
    pub fn new(config: &GatewayConfig) -> Result<Self, GatewayError> {
        if config.secret_key.trim().is_empty() {
            return Err(GatewayError::Config("secret key is empty".to_string()));
        }

        let mut headers = HeaderMap::new();
        let mut auth = HeaderValue::from_str(&format!("Bearer {}", config.secret_key))
            .map_err(|_| GatewayError::Config("secret key has invalid characters".to_string()))?;
        auth.set_sensitive(true);
        headers.insert(AUTHORIZATION, auth);

        let client = Client::builder()
            .timeout(config.timeout)
            .default_headers(headers)
            .build()
            .map_err(|e| GatewayError::Config(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            api_base: config.api_base.clone(),
            retry_max_elapsed: config.retry_max_elapsed,
        })
    }

    fn endpoint(&self, path: &str) -> Result<Url, GatewayError> {
        self.api_base
            .join(path)
            .map_err(|e| GatewayError::Config(format!("invalid gateway url for {}: {}", path, e)))
    }

    /// Sends the request built by `build`, retrying transient failures.
    async fn send<F>(&self, endpoint: &Url, build: F) -> Result<Response, GatewayError>
    where
        F: Fn() -> RequestBuilder,
    {
        let backoff = ExponentialBackoff {
            max_elapsed_time: Some(self.retry_max_elapsed),
            ..ExponentialBackoff::default()
        };
        let endpoint_str = endpoint.path().to_string();

        retry_notify(
            backoff,
            || async {
                match build().send().await {
                    Ok(resp) => {
                        let status = resp.status();
                        if status.is_success() {
                            Ok(resp)
                        } else if status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error() {
                            tracing::debug!("Retrying on status: {}", status);
                            Err(BackoffError::transient(
                                api_error(&endpoint_str, status, resp).await,
                            ))
                        } else {
                            Err(BackoffError::permanent(
                                api_error(&endpoint_str, status, resp).await,
                            ))
                        }
                    }
                    Err(err) => {
                        let transient = err.is_timeout() || err.is_connect() || err.is_request();
                        let err = GatewayError::Http {
                            endpoint: endpoint_str.clone(),
                            source: err,
                        };
                        if transient {
                            Err(BackoffError::transient(err))
                        } else {
                            Err(BackoffError::permanent(err))
                        }
                    }
                }
            },
            retry_notify_handler,
        )
        .await
    }
}

fn retry_notify_handler(err: GatewayError, duration: Duration) {
    tracing::warn!(
        "Gateway request failed: {}. Retrying in {:.1}s...",
        err,
        duration.as_secs_f32()
    );
}

async fn api_error(endpoint: &str, status: StatusCode, resp: Response) -> GatewayError {
    let body = resp.text().await.unwrap_or_default();
    let message = serde_json::from_str::<StripeErrorEnvelope>(&body)
        .ok()
        .and_then(|envelope| {
            let code = envelope.error.code;
            envelope.error.message.map(|msg| match code {
                Some(code) => format!("{} ({})", msg, code),
                None => msg,
            })
        })
        .unwrap_or(body);
    GatewayError::Api {
        endpoint: endpoint.to_string(),
        status: status.as_u16(),
        message,
    }
}

async fn decode_intent(endpoint: &Url, resp: Response) -> Result<StripePaymentIntent, GatewayError> {
    resp.json::<StripePaymentIntent>()
        .await
        .map_err(|e| GatewayError::Decode {
            endpoint: endpoint.path().to_string(),
            reason: e.to_string(),
        })
}

/// Intent ids come from clients; only Stripe's id alphabet may reach the URL.
fn is_valid_intent_id(id: &str) -> bool {
    !id.is_empty()
        && id.len() <= 255
        && id.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
}

#[async_trait]
impl PaymentGateway for StripeGateway {
    #[tracing::instrument(skip(self, request), fields(amount_minor = request.amount_minor, currency = %request.currency))]
    async fn create_intent(&self, request: &IntentRequest) -> Result<CreatedIntent, GatewayError> {
        let endpoint = self.endpoint(PAYMENT_INTENTS_PATH)?;

        let mut form: Vec<(String, String)> = vec![
            ("amount".to_string(), request.amount_minor.to_string()),
            ("currency".to_string(), request.currency.clone()),
            (
                "automatic_payment_methods[enabled]".to_string(),
                "true".to_string(),
            ),
        ];
        for (key, value) in request.metadata.to_map() {
            form.push((format!("metadata[{}]", key), value));
        }

        let resp = self
            .send(&endpoint, || {
                self.client
                    .post(endpoint.clone())
                    .header("Idempotency-Key", request.idempotency_key.as_str())
                    .form(&form)
            })
            .await?;

        let intent = decode_intent(&endpoint, resp).await?;
        let client_secret = intent.client_secret.ok_or_else(|| GatewayError::Decode {
            endpoint: endpoint.path().to_string(),
            reason: "payment intent has no client secret".to_string(),
        })?;

        tracing::info!(intent_id = %intent.id, "Created payment intent");
        Ok(CreatedIntent {
            id: intent.id,
            client_secret,
        })
    }

    #[tracing::instrument(skip(self))]
    async fn retrieve_intent(&self, intent_id: &str) -> Result<IntentSnapshot, GatewayError> {
        if !is_valid_intent_id(intent_id) {
            return Err(GatewayError::IntentNotFound(intent_id.to_string()));
        }
        let endpoint = self.endpoint(&format!("{}/{}", PAYMENT_INTENTS_PATH, intent_id))?;

        let resp = match self.send(&endpoint, || self.client.get(endpoint.clone())).await {
            Ok(resp) => resp,
            Err(GatewayError::Api { status: 404, .. }) => {
                return Err(GatewayError::IntentNotFound(intent_id.to_string()))
            }
            Err(e) => return Err(e),
        };

        Ok(decode_intent(&endpoint, resp).await?.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn intent_ids_are_restricted_to_the_stripe_alphabet() {
        assert!(is_valid_intent_id("pi_3MtwBwLkdIwHu7ix28a3tqPa"));
        assert!(!is_valid_intent_id(""));
        assert!(!is_valid_intent_id("../customers"));
        assert!(!is_valid_intent_id("pi_1?expand=all"));
    }

    #[test]
    fn expanded_charge_objects_yield_their_id() {
        let intent: StripePaymentIntent = serde_json::from_value(serde_json::json!({
            "id": "pi_1",
            "amount": 2500,
            "currency": "usd",
            "status": "succeeded",
            "client_secret": "pi_1_secret_x",
            "latest_charge": { "id": "ch_9", "object": "charge" },
            "payment_method_types": ["card"]
        }))
        .unwrap();
        let snapshot = IntentSnapshot::from(intent);
        assert_eq!(snapshot.latest_charge.as_deref(), Some("ch_9"));
        assert_eq!(snapshot.status, IntentStatus::Succeeded);
        assert!(snapshot.metadata.is_empty());
    }

    #[test]
    fn empty_secret_key_is_rejected() {
        let config = GatewayConfig {
            api_base: Url::parse("https://api.stripe.com").unwrap(),
            secret_key: "  ".to_string(),
            publishable_key: "pk_test".to_string(),
            currency: "usd".to_string(),
            timeout: Duration::from_secs(5),
            retry_max_elapsed: Duration::from_secs(1),
        };
        assert!(matches!(
            StripeGateway::new(&config),
            Err(GatewayError::Config(_))
        ));
    }
}
