use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;

use cadence_core::clock::SystemClock;
use cadence_engine::{LifecycleController, Notifier, NullNotifier, WebhookNotifier};
use cadence_server::ServerConfig;
use cadence_store::Database;
use cadence_telemetry::TelemetryConfig;

/// Activity lifecycle service for the CRM backend.
#[derive(Debug, Parser)]
#[command(name = "cadence", version)]
struct Args {
    /// Port to listen on.
    #[arg(long, default_value_t = 9280)]
    port: u16,

    /// Path to the activities database. Defaults to ~/.cadence/database/activities.db.
    #[arg(long)]
    db_path: Option<PathBuf>,

    /// Webhook endpoint for assignment and escalation notifications.
    #[arg(long, env = "CADENCE_WEBHOOK_URL")]
    webhook_url: Option<String>,
}

#[tokio::main]
async fn main() {
    let args = Args::parse();

    let _telemetry = cadence_telemetry::init_telemetry(TelemetryConfig::default());

    tracing::info!("starting cadence server");

    let db_path = args.db_path.unwrap_or_else(|| {
        let dir = home_dir().join(".cadence").join("database");
        std::fs::create_dir_all(&dir).expect("failed to create database directory");
        dir.join("activities.db")
    });
    let db = Database::open(&db_path).expect("failed to open database");
    tracing::info!(path = %db_path.display(), "database opened");

    let notifier: Arc<dyn Notifier> = match args.webhook_url {
        Some(url) => Arc::new(WebhookNotifier::new(url).expect("invalid webhook configuration")),
        None => Arc::new(NullNotifier),
    };

    let controller = Arc::new(LifecycleController::new(
        db,
        notifier,
        Arc::new(SystemClock),
    ));

    let config = ServerConfig {
        port: args.port,
        ..Default::default()
    };
    let port = config.port;
    let _handle = cadence_server::start(config, controller)
        .await
        .expect("failed to start server");

    tracing::info!(port = port, "cadence server ready");

    tokio::signal::ctrl_c()
        .await
        .expect("failed to listen for ctrl+c");

    tracing::info!("shutting down");
}

fn home_dir() -> PathBuf {
    std::env::var("HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("/tmp"))
}
