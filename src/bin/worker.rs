use std::env;

use tokio::time::interval;
use tracing::{error, info, Level};
use tracing_subscriber::FmtSubscriber;

use crowdfund::config::WorkerConfig;
use crowdfund::db;
use crowdfund::jobs::run_funding_reconcile;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let subscriber = FmtSubscriber::builder()
        .with_max_level(Level::INFO)
        .finish();
    let _ = tracing::subscriber::set_global_default(subscriber);

    let config = WorkerConfig::from_env()?;

    // Command-line flags
    let run_once = env::args().any(|a| a == "--reconcile-funding");

    let db_conn = db::connect(&config.database_url).await?;
    db::migrate(&db_conn).await?;

    if run_once {
        let corrected = run_funding_reconcile(&db_conn).await?;
        info!(corrected, "funding reconcile finished");
        return Ok(());
    }

    info!(
        "Worker starting; reconciling funding every {} seconds",
        config.reconcile_interval.as_secs()
    );

    let mut ticker = interval(config.reconcile_interval);
    loop {
        ticker.tick().await;
        if let Err(e) = run_funding_reconcile(&db_conn).await {
            error!(?e, "funding reconcile failed");
        }
    }
}
