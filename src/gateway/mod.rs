//! # Payment gateway
//!
//! The pledge workflow talks to the payment processor only through
//! [`PaymentGateway`]. Two calls are needed: creating a payment intent for a
//! staged pledge, and reading an intent back so the server can decide for
//! itself whether it was paid.
//!
//! A client-supplied intent id is never taken as proof of payment.
//! [`verify_payment`] re-reads the intent and classifies it into a
//! [`PaymentVerification`]; only the `Verified` arm carries a
//! [`VerifiedPayment`], and the pledge ledger refuses to run without one.

pub mod stripe;

use std::collections::HashMap;
use std::fmt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub use stripe::StripeGateway;

const META_PROJECT_ID: &str = "projectId";
const META_REWARD_ID: &str = "rewardId";
const META_USER_ID: &str = "userId";

/// Longest payment method label the transactions table accepts.
const PAYMENT_METHOD_MAX_LEN: usize = 20;

#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    #[error("request to {endpoint} failed: {source}")]
    Http {
        endpoint: String,
        source: reqwest::Error,
    },
    #[error("{endpoint} returned {status}: {message}")]
    Api {
        endpoint: String,
        status: u16,
        message: String,
    },
    #[error("payment intent {0} not found")]
    IntentNotFound(String),
    #[error("unexpected response from {endpoint}: {reason}")]
    Decode { endpoint: String, reason: String },
    #[error("gateway client misconfigured: {0}")]
    Config(String),
}

/// Reconciliation tags attached to every intent the service creates.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IntentMetadata {
    pub project_id: Uuid,
    pub reward_id: Option<Uuid>,
    pub user_id: Uuid,
}

impl IntentMetadata {
    pub fn to_map(&self) -> HashMap<String, String> {
        let mut map = HashMap::new();
        map.insert(META_PROJECT_ID.to_string(), self.project_id.to_string());
        map.insert(
            META_REWARD_ID.to_string(),
            self.reward_id.map(|id| id.to_string()).unwrap_or_default(),
        );
        map.insert(META_USER_ID.to_string(), self.user_id.to_string());
        map
    }

    /// Reads the tags back; `None` if the intent was not created by this service.
    pub fn from_map(map: &HashMap<String, String>) -> Option<Self> {
        let project_id = map.get(META_PROJECT_ID)?.parse().ok()?;
        let user_id = map.get(META_USER_ID)?.parse().ok()?;
        let reward_id = match map.get(META_REWARD_ID).map(|s| s.trim()) {
            None | Some("") => None,
            Some(raw) => Some(raw.parse().ok()?),
        };
        Some(Self {
            project_id,
            reward_id,
            user_id,
        })
    }
}

#[derive(Debug, Clone)]
pub struct IntentRequest {
    pub amount_minor: i64,
    pub currency: String,
    pub metadata: IntentMetadata,
    /// Sent with the create call so retried requests never create two intents.
    pub idempotency_key: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreatedIntent {
    pub id: String,
    pub client_secret: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IntentStatus {
    RequiresPaymentMethod,
    RequiresConfirmation,
    RequiresAction,
    Processing,
    RequiresCapture,
    Canceled,
    Succeeded,
    #[serde(other)]
    Unknown,
}

impl fmt::Display for IntentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            IntentStatus::RequiresPaymentMethod => "requires_payment_method",
            IntentStatus::RequiresConfirmation => "requires_confirmation",
            IntentStatus::RequiresAction => "requires_action",
            IntentStatus::Processing => "processing",
            IntentStatus::RequiresCapture => "requires_capture",
            IntentStatus::Canceled => "canceled",
            IntentStatus::Succeeded => "succeeded",
            IntentStatus::Unknown => "unknown",
        };
        f.write_str(label)
    }
}

/// The gateway's current view of an intent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IntentSnapshot {
    pub id: String,
    pub status: IntentStatus,
    pub amount_minor: i64,
    pub currency: String,
    pub metadata: HashMap<String, String>,
    /// Settlement id (a charge id for Stripe), once the intent has succeeded.
    pub latest_charge: Option<String>,
    pub payment_method_types: Vec<String>,
    pub last_payment_error: Option<String>,
}

#[async_trait]
pub trait PaymentGateway: Send + Sync {
    async fn create_intent(&self, request: &IntentRequest) -> Result<CreatedIntent, GatewayError>;

    async fn retrieve_intent(&self, intent_id: &str) -> Result<IntentSnapshot, GatewayError>;
}

/// A payment the gateway confirmed as settled. Only [`verify_payment`] and
/// [`classify`] build these.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifiedPayment {
    pub(crate) intent_id: String,
    pub(crate) gateway_transaction_id: String,
    pub(crate) amount_minor: i64,
    pub(crate) currency: String,
    pub(crate) payment_method: String,
    pub(crate) metadata: IntentMetadata,
}

impl VerifiedPayment {
    pub fn intent_id(&self) -> &str {
        &self.intent_id
    }

    pub fn gateway_transaction_id(&self) -> &str {
        &self.gateway_transaction_id
    }

    pub fn amount_minor(&self) -> i64 {
        self.amount_minor
    }

    pub fn currency(&self) -> &str {
        &self.currency
    }

    pub fn payment_method(&self) -> &str {
        &self.payment_method
    }

    pub fn metadata(&self) -> &IntentMetadata {
        &self.metadata
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PaymentVerification {
    /// The intent exists but has not settled yet.
    Unverified { status: IntentStatus },
    Verified(VerifiedPayment),
    /// The intent can no longer settle.
    Failed { reason: String },
}

/// Re-reads `intent_id` from the gateway and classifies it.
#[tracing::instrument(skip(gateway))]
pub async fn verify_payment(
    gateway: &dyn PaymentGateway,
    intent_id: &str,
) -> Result<PaymentVerification, GatewayError> {
    let snapshot = gateway.retrieve_intent(intent_id).await?;
    let verification = classify(snapshot);
    match &verification {
        PaymentVerification::Verified(payment) => {
            tracing::info!(amount_minor = payment.amount_minor, "payment intent verified")
        }
        PaymentVerification::Unverified { status } => {
            tracing::info!(%status, "payment intent not settled yet")
        }
        PaymentVerification::Failed { reason } => {
            tracing::warn!(%reason, "payment intent failed")
        }
    }
    Ok(verification)
}

pub fn classify(snapshot: IntentSnapshot) -> PaymentVerification {
    match snapshot.status {
        IntentStatus::Succeeded => {
            let Some(metadata) = IntentMetadata::from_map(&snapshot.metadata) else {
                return PaymentVerification::Failed {
                    reason: "payment intent was not created for a pledge".to_string(),
                };
            };
            if snapshot.amount_minor <= 0 {
                return PaymentVerification::Failed {
                    reason: "payment intent has no positive amount".to_string(),
                };
            }
            let gateway_transaction_id = snapshot
                .latest_charge
                .filter(|charge| !charge.trim().is_empty())
                .unwrap_or_else(|| snapshot.id.clone());
            let payment_method = snapshot
                .payment_method_types
                .into_iter()
                .find(|method| !method.trim().is_empty())
                .unwrap_or_else(|| "card".to_string())
                .chars()
                .take(PAYMENT_METHOD_MAX_LEN)
                .collect();
            PaymentVerification::Verified(VerifiedPayment {
                intent_id: snapshot.id,
                gateway_transaction_id,
                amount_minor: snapshot.amount_minor,
                currency: snapshot.currency.to_ascii_lowercase(),
                payment_method,
                metadata,
            })
        }
        IntentStatus::Canceled => PaymentVerification::Failed {
            reason: snapshot
                .last_payment_error
                .unwrap_or_else(|| "payment was canceled".to_string()),
        },
        IntentStatus::RequiresPaymentMethod if snapshot.last_payment_error.is_some() => {
            PaymentVerification::Failed {
                reason: snapshot.last_payment_error.unwrap_or_default(),
            }
        }
        status => PaymentVerification::Unverified { status },
    }
}
