pub mod auth;
pub mod catalog;
pub mod config;
pub mod dashboard;
pub mod db;
pub mod entities;
pub mod error;
pub mod gateway;
pub mod jobs;
pub mod messaging;
pub mod money;
pub mod pledge;
pub mod projects;
pub mod routes;
pub mod state;
pub mod users;

use std::sync::Arc;

use axum::{extract::State, http::StatusCode, response::IntoResponse, routing::get, Router};
use tower_governor::{governor::GovernorConfigBuilder, key_extractor::SmartIpKeyExtractor, GovernorLayer};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use utoipa::openapi::security::{ApiKey, ApiKeyValue, SecurityScheme};
use utoipa::{Modify, OpenApi};
use utoipa_swagger_ui::SwaggerUi;

pub use error::AppError;
pub use state::AppState;

/// Health check; also confirms the database answers
#[utoipa::path(
    get,
    path = "/health",
    responses(
        (status = 200, description = "Service is healthy", body = String),
        (status = 503, description = "Database unreachable", body = String)
    )
)]
pub async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    match state.db.ping().await {
        Ok(()) => (StatusCode::OK, "Service is healthy"),
        Err(e) => {
            tracing::error!("Health check failed to reach the database: {}", e);
            (StatusCode::SERVICE_UNAVAILABLE, "Database unavailable")
        }
    }
}

struct UserIdHeader;

impl Modify for UserIdHeader {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "user_id",
            SecurityScheme::ApiKey(ApiKey::Header(ApiKeyValue::new(auth::USER_ID_HEADER))),
        );
    }
}

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Crowdfund API",
        version = "0.1.0",
        description = "Projects, reward tiers, verified pledges and backer messaging"
    ),
    paths(
        health_check,
        routes::users::register_user,
        routes::users::current_user,
        routes::users::get_user,
        routes::users::delete_user,
        routes::projects::list_projects,
        routes::projects::list_categories,
        routes::projects::get_project,
        routes::projects::create_project,
        routes::projects::update_project,
        routes::projects::delete_project,
        routes::projects::change_status,
        routes::rewards::list_rewards,
        routes::rewards::create_reward,
        routes::rewards::get_reward,
        routes::rewards::update_reward,
        routes::rewards::delete_reward,
        routes::pledges::pledge_form,
        routes::pledges::stage_pledge,
        routes::pledges::create_payment_intent,
        routes::pledges::confirm_pledge,
        routes::messages::inbox,
        routes::messages::outbox,
        routes::messages::recipients,
        routes::messages::send_message,
        routes::messages::read_message,
        routes::dashboard::backer,
        routes::dashboard::creator,
        routes::dashboard::post_update
    ),
    modifiers(&UserIdHeader),
    tags(
        (name = "users", description = "Accounts and profiles"),
        (name = "projects", description = "Project listing and lifecycle"),
        (name = "rewards", description = "Reward tiers"),
        (name = "pledges", description = "Pledge staging, payment and confirmation"),
        (name = "messages", description = "Direct messages"),
        (name = "dashboard", description = "Backer and creator dashboards")
    )
)]
pub struct ApiDoc;

/// Create the application with all routes and middleware
pub fn create_app(state: AppState) -> Router {
    let mut api_routes = Router::new()
        .route("/health", get(health_check))
        .merge(routes::router());

    // Rate limiting is optional so tests and trusted deployments can turn it off
    if let Some(limits) = state.rate_limit {
        match GovernorConfigBuilder::default()
            .key_extractor(SmartIpKeyExtractor)
            .period(limits.period)
            .burst_size(limits.burst_size)
            .finish()
        {
            Some(config) => {
                api_routes = api_routes.layer(GovernorLayer {
                    config: Arc::new(config),
                });
            }
            None => tracing::warn!(?limits, "Invalid rate limit settings; rate limiting disabled"),
        }
    }

    let docs_router = SwaggerUi::new("/docs").url("/api-doc/openapi.json", ApiDoc::openapi());

    Router::new()
        .merge(api_routes)
        .merge(docs_router)
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state)
}
