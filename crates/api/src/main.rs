//! API server entry point.

use std::sync::Arc;
use std::time::Duration;

use api::config::Config;
use metrics_exporter_prometheus::PrometheusHandle;
use notification::{
    AfricasTalkingGateway, Channels, DispatcherConfig, EmailConfig, EmailTransport,
    LoggingEmailTransport, LoggingSmsGateway, NotificationDispatcher, SmsConfig, SmsGateway,
    SmtpMailer,
};
use sqlx::postgres::PgPoolOptions;
use store::{Database, InMemoryDatabase, PgDatabase};
use tokio::signal;
use tokio::task::JoinHandle;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// How long in-flight notifications may run after the server stops.
const NOTIFICATION_DRAIN_TIMEOUT: Duration = Duration::from_secs(10);

/// Waits for a shutdown signal (SIGINT or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install SIGINT handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("received SIGINT, starting graceful shutdown");
        }
        () = terminate => {
            tracing::info!("received SIGTERM, starting graceful shutdown");
        }
    }
}

/// Builds the SMS and email channels, falling back to logging sinks when a
/// channel is not configured.
fn notification_channels() -> Channels {
    let sms: Arc<dyn SmsGateway> = match SmsConfig::from_env().expect("invalid SMS configuration")
    {
        Some(config) => {
            tracing::info!(env = %config.env, "sms notifications via Africa's Talking");
            Arc::new(AfricasTalkingGateway::new(config).expect("failed to build SMS gateway"))
        }
        None => {
            tracing::warn!("SMS_BASE_URL not set, sms notifications will only be logged");
            Arc::new(LoggingSmsGateway)
        }
    };

    let (email, admin_email): (Arc<dyn EmailTransport>, String) =
        match EmailConfig::from_env().expect("invalid SMTP configuration") {
            Some(config) => {
                tracing::info!(host = %config.smtp_host, port = config.smtp_port, "order emails via SMTP");
                let mailer = SmtpMailer::new(&config).expect("failed to build SMTP transport");
                (Arc::new(mailer), config.admin_email)
            }
            None => {
                tracing::warn!("SMTP_HOST not set, order emails will only be logged");
                let admin = std::env::var("ADMIN_EMAIL")
                    .unwrap_or_else(|_| "admin@localhost.localdomain".to_string());
                (Arc::new(LoggingEmailTransport), admin)
            }
        };

    Channels::new(sms, email, admin_email)
}

async fn serve<D: Database>(db: D, config: &Config, metrics_handle: PrometheusHandle) {
    let dispatcher_config = DispatcherConfig::from_env().expect("invalid notification configuration");
    let (dispatcher, worker): (NotificationDispatcher, JoinHandle<()>) =
        NotificationDispatcher::spawn(notification_channels(), dispatcher_config);

    let state = api::create_state(db, Arc::new(dispatcher), config.order);
    let app = api::create_app(state, metrics_handle);

    let addr = config.addr();
    tracing::info!(%addr, "starting API server");

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .expect("failed to bind address");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("server error");

    // The router and its dispatcher are gone; let queued notifications finish.
    if tokio::time::timeout(NOTIFICATION_DRAIN_TIMEOUT, worker).await.is_err() {
        tracing::warn!("pending notifications abandoned at shutdown");
    }
}

#[tokio::main]
async fn main() {
    let config = Config::from_env();

    // 1. Initialize tracing
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level)))
        .with(tracing_subscriber::fmt::layer())
        .init();

    // 2. Install Prometheus metrics recorder
    let metrics_handle = metrics_exporter_prometheus::PrometheusBuilder::new()
        .install_recorder()
        .expect("failed to install Prometheus recorder");

    // 3. Pick the store and serve
    match &config.database_url {
        Some(url) => {
            let pool = PgPoolOptions::new()
                .max_connections(config.database_max_connections)
                .connect(url)
                .await
                .expect("failed to connect to PostgreSQL");
            let db = PgDatabase::new(pool);
            db.run_migrations().await.expect("failed to run migrations");
            tracing::info!("using PostgreSQL store");
            serve(db, &config, metrics_handle).await;
        }
        None => {
            tracing::warn!("DATABASE_URL not set, using the in-memory store; data is not persisted");
            serve(InMemoryDatabase::new(), &config, metrics_handle).await;
        }
    }

    tracing::info!("server shut down gracefully");
}
