use std::sync::Arc;

use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

use ride_hub::adapters::auth::{JwtConfig, JwtSessionValidator};
use ride_hub::adapters::events::InMemoryEventBus;
use ride_hub::adapters::http::{self, AppState};
use ride_hub::adapters::websocket::{RideHub, RideLifecycleBridge};
use ride_hub::config::AppConfig;
use ride_hub::ports::{EventPublisher, RideNotifier};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::load()?;
    config.validate()?;

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.server.log_level))?;
    if config.is_production() {
        tracing_subscriber::fmt().json().with_env_filter(filter).init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        environment = ?config.server.environment,
        "Ride hub starting"
    );

    let mut jwt = JwtConfig::new(config.auth.jwt_secret.clone());
    if let Some(issuer) = &config.auth.issuer {
        jwt = jwt.with_issuer(issuer.clone());
    }
    if let Some(audience) = &config.auth.audience {
        jwt = jwt.with_audience(audience.clone());
    }
    let validator = Arc::new(JwtSessionValidator::new(jwt));

    let hub = Arc::new(RideHub::new(
        validator,
        &config.hub,
        config.auth.handshake_timeout(),
    ));

    // Ride-lifecycle events ingested from the booking services drive the active-ride set
    let bus = Arc::new(InMemoryEventBus::without_history());
    let notifier: Arc<dyn RideNotifier> = hub.clone();
    RideLifecycleBridge::new_shared(notifier).register(bus.as_ref());

    if config.auth.service_token.is_none() {
        tracing::warn!("No service token configured; ride-event ingest is disabled");
    }
    let publisher: Arc<dyn EventPublisher> = bus;
    let state = AppState {
        hub: Arc::clone(&hub),
        publisher,
        service_token: config.auth.service_token.clone(),
    };
    let app = http::router(state, &config.server.cors_origins_list());

    let addr = config.server.socket_addr()?;
    let listener = TcpListener::bind(addr).await?;
    tracing::info!(%addr, "Listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Ride hub stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
    }
}
