#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use chrono::{Duration, Utc};
use http_body_util::BodyExt;
use migration::{Migrator, MigratorTrait};
use sea_orm::{ActiveModelTrait, ConnectOptions, Database, DatabaseConnection, Set};
use serde_json::Value;
use tower::ServiceExt;
use uuid::Uuid;

use crowdfund::entities::{project, reward, user, ProjectStatus, UserRole};
use crowdfund::gateway::{
    CreatedIntent, GatewayError, IntentRequest, IntentSnapshot, IntentStatus, PaymentGateway,
};
use crowdfund::{create_app, AppState};

/// Fresh in-memory database with the schema applied. One connection, so the
/// database lives exactly as long as the pool.
pub async fn test_db() -> DatabaseConnection {
    let mut opts = ConnectOptions::new("sqlite::memory:");
    opts.max_connections(1)
        .min_connections(1)
        .sqlx_logging(false);
    let db = Database::connect(opts).await.expect("connect sqlite");
    Migrator::up(&db, None).await.expect("run migrations");
    db
}

/// In-process gateway whose intents are settled by the test.
#[derive(Default)]
pub struct FakeGateway {
    intents: Mutex<HashMap<String, IntentSnapshot>>,
    created: AtomicUsize,
    pub fail_create: Mutex<bool>,
}

impl FakeGateway {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn create_calls(&self) -> usize {
        self.created.load(Ordering::SeqCst)
    }

    fn update(&self, intent_id: &str, f: impl FnOnce(&mut IntentSnapshot)) {
        let mut intents = self.intents.lock().unwrap();
        let snapshot = intents.get_mut(intent_id).expect("unknown intent");
        f(snapshot);
    }

    pub fn succeed(&self, intent_id: &str) {
        self.update(intent_id, |s| {
            s.status = IntentStatus::Succeeded;
            s.latest_charge = Some(format!("ch_{}", s.id));
        });
    }

    pub fn decline(&self, intent_id: &str, reason: &str) {
        self.update(intent_id, |s| {
            s.status = IntentStatus::RequiresPaymentMethod;
            s.last_payment_error = Some(reason.to_string());
        });
    }

    /// Registers an intent directly, as if created outside this service.
    pub fn insert(&self, snapshot: IntentSnapshot) {
        self.intents
            .lock()
            .unwrap()
            .insert(snapshot.id.clone(), snapshot);
    }
}

#[async_trait]
impl PaymentGateway for FakeGateway {
    async fn create_intent(&self, request: &IntentRequest) -> Result<CreatedIntent, GatewayError> {
        if *self.fail_create.lock().unwrap() {
            return Err(GatewayError::Api {
                endpoint: "/v1/payment_intents".to_string(),
                status: 503,
                message: "gateway unavailable".to_string(),
            });
        }
        let n = self.created.fetch_add(1, Ordering::SeqCst) + 1;
        let id = format!("pi_test_{}", n);
        self.insert(IntentSnapshot {
            id: id.clone(),
            status: IntentStatus::RequiresPaymentMethod,
            amount_minor: request.amount_minor,
            currency: request.currency.clone(),
            metadata: request.metadata.to_map(),
            latest_charge: None,
            payment_method_types: vec!["card".to_string()],
            last_payment_error: None,
        });
        Ok(CreatedIntent {
            client_secret: format!("{}_secret", id),
            id,
        })
    }

    async fn retrieve_intent(&self, intent_id: &str) -> Result<IntentSnapshot, GatewayError> {
        self.intents
            .lock()
            .unwrap()
            .get(intent_id)
            .cloned()
            .ok_or_else(|| GatewayError::IntentNotFound(intent_id.to_string()))
    }
}

pub fn app_state(db: DatabaseConnection, gateway: Arc<FakeGateway>) -> AppState {
    AppState {
        db,
        gateway,
        currency: "usd".to_string(),
        publishable_key: "pk_test_123".to_string(),
        rate_limit: None,
    }
}

pub fn test_app(db: DatabaseConnection, gateway: Arc<FakeGateway>) -> Router {
    create_app(app_state(db, gateway))
}

pub async fn create_user(db: &DatabaseConnection, name: &str, role: UserRole) -> user::Model {
    user::ActiveModel {
        id: Set(Uuid::new_v4()),
        user_name: Set(name.to_string()),
        email: Set(format!("{}@example.com", name)),
        role: Set(role),
        profile_picture_url: Set(None),
        bio: Set(None),
        date_joined: Set(Utc::now()),
        is_active: Set(true),
    }
    .insert(db)
    .await
    .expect("insert user")
}

pub async fn create_project(
    db: &DatabaseConnection,
    creator_id: Uuid,
    title: &str,
    status: ProjectStatus,
) -> project::Model {
    let now = Utc::now();
    project::ActiveModel {
        id: Set(Uuid::new_v4()),
        creator_id: Set(creator_id),
        title: Set(title.to_string()),
        description: Set(format!("{} description", title)),
        category: Set("Technology".to_string()),
        funding_goal_cents: Set(100_000),
        current_funding_cents: Set(0),
        start_date: Set(now - Duration::days(1)),
        end_date: Set(now + Duration::days(30)),
        status: Set(status),
        media_urls: Set(String::new()),
        date_created: Set(now),
        last_updated: Set(now),
    }
    .insert(db)
    .await
    .expect("insert project")
}

pub async fn create_reward(
    db: &DatabaseConnection,
    project_id: Uuid,
    title: &str,
    threshold_cents: i64,
    available: Option<i32>,
) -> reward::Model {
    reward::ActiveModel {
        id: Set(Uuid::new_v4()),
        project_id: Set(project_id),
        title: Set(title.to_string()),
        description: Set(None),
        pledge_amount_cents: Set(threshold_cents),
        quantity_available: Set(available),
        quantity_claimed: Set(0),
        estimated_delivery: Set(None),
        position: Set(0),
        created_at: Set(Utc::now()),
    }
    .insert(db)
    .await
    .expect("insert reward")
}

/// Sends a JSON request as `user` (if any) and returns status and parsed body.
pub async fn send(
    app: &Router,
    method: &str,
    uri: &str,
    user: Option<Uuid>,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(id) = user {
        builder = builder.header("x-user-id", id.to_string());
    }
    let request = match body {
        Some(json) => builder
            .header("content-type", "application/json")
            .body(Body::from(json.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let json = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or_else(|_| {
            Value::String(String::from_utf8_lossy(&bytes).into_owned())
        })
    };
    (status, json)
}
