use std::sync::Arc;

use axum::Router;
use dotenvy::dotenv;
use sqlx::postgres::PgPoolOptions;
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

use eventhub_server::config::{Config, StoreBackend};
use eventhub_server::mail::{LogMailer, Mailer, SmtpMailer};
use eventhub_server::routes::create_routes;
use eventhub_server::store::{MemoryStore, PgStore, Store};
use eventhub_server::AppState;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,eventhub_server=debug")),
        )
        .init();

    let config = Config::from_env();
    tracing::debug!(?config, "Configuration loaded");

    let store: Arc<dyn Store> = match config.store_backend {
        StoreBackend::Postgres => {
            let pool = PgPoolOptions::new()
                .max_connections(config.database_max_connections)
                .connect(&config.database_url)
                .await?;
            tracing::info!("Successfully connected to database");

            let store = PgStore::new(pool);
            store.migrate().await?;
            tracing::info!("Migrations run successfully");
            Arc::new(store)
        }
        StoreBackend::Memory => {
            tracing::warn!("Using in-memory store; data is lost on restart");
            Arc::new(MemoryStore::new())
        }
    };

    let mailer: Arc<dyn Mailer> = match config.mail.smtp_host.as_deref() {
        Some(host) => Arc::new(SmtpMailer::new(host, &config.mail)?),
        None => {
            tracing::warn!("SMTP_HOST not set; outgoing mail will only be logged");
            Arc::new(LogMailer)
        }
    };
    tracing::info!(
        store = store.backend_tag(),
        mailer = mailer.transport_tag(),
        "Backends ready"
    );

    let addr = config.http_addr;
    let app: Router = create_routes(AppState::new(store, mailer, config));

    tracing::info!("🚀 Server running at http://{}", addr);
    let listener = TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
