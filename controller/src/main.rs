//! Marketplace controller binary.

use anyhow::Context;
use concourse_controller::server::{AppState, build_router};
use concourse_controller::{BusConsumer, Config, Controller, Outbox};
use concourse_core::EventBus;
use concourse_redpanda::RedpandaEventBus;
use concourse_runtime::{RetryPolicy, metrics};
use concourse_web::BroadcastHub;
use std::sync::Arc;
use tokio::signal;
use tokio::sync::broadcast;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "concourse_controller=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting marketplace controller");

    let config = Config::from_env().context("Failed to load configuration")?;
    info!(
        brokers = %config.bus.brokers,
        topic = %config.bus.topic,
        "Configuration loaded"
    );

    let metrics = match metrics::install() {
        Ok(handle) => Some(handle),
        Err(e) => {
            warn!(error = %e, "Metrics disabled");
            None
        }
    };

    let bus: Arc<dyn EventBus> = Arc::new(
        RedpandaEventBus::builder()
            .brokers(&config.bus.brokers)
            .consumer_group(&config.bus.consumer_group)
            .build()
            .context("Failed to create bus client")?,
    );

    let hub = BroadcastHub::new(config.server.viewer_buffer);
    let (outbox, outbound) = Outbox::channel();
    let controller = Controller::new(hub, outbox, config.timings);

    let forwarder = outbound.spawn_forwarder(Arc::clone(&bus), config.bus.topic.clone());

    let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
    let consumer = BusConsumer::new(
        controller.clone(),
        Arc::clone(&bus),
        config.bus.topic.clone(),
        RetryPolicy::forever(config.bus.reconnect_initial, config.bus.reconnect_max),
        shutdown_rx,
    )
    .spawn();

    let app = build_router(AppState::new(controller, metrics));
    let addr = config.listen_addr();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;
    info!(address = %addr, "Server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("HTTP server failed")?;

    let _ = shutdown_tx.send(());
    if let Err(e) = consumer.await {
        warn!(error = %e, "Bus consumer task failed");
    }
    forwarder.abort();

    info!("Controller stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            info!("Received Ctrl+C signal, shutting down gracefully...");
        },
        () = terminate => {
            info!("Received SIGTERM signal, shutting down gracefully...");
        },
    }
}
