use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use tracing_subscriber::EnvFilter;

use crowdfund::config::AppConfig;
use crowdfund::gateway::StripeGateway;
use crowdfund::{create_app, db, users, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = AppConfig::from_env()?;

    let db_conn = db::connect(&config.database_url)
        .await
        .context("failed to connect to database")?;
    db::migrate(&db_conn)
        .await
        .context("failed to apply migrations")?;

    match &config.admin {
        Some(admin) => {
            users::ensure_admin(&db_conn, &admin.user_name, &admin.email)
                .await
                .context("failed to ensure the admin account")?;
        }
        None => tracing::warn!(
            "ADMIN_USER_NAME/ADMIN_EMAIL not set; projects cannot be approved until an admin exists"
        ),
    }

    let gateway = StripeGateway::new(&config.gateway)?;

    let state = AppState {
        db: db_conn,
        gateway: Arc::new(gateway),
        currency: config.gateway.currency.clone(),
        publishable_key: config.gateway.publishable_key.clone(),
        rate_limit: config.rate_limit,
    };

    let app = create_app(state);
    let listener = tokio::net::TcpListener::bind(config.bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", config.bind_addr))?;
    tracing::info!("Server running on http://{}", config.bind_addr);

    // ConnectInfo lets the rate limiter fall back to the peer address
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;
    Ok(())
}
