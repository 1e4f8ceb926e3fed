use std::sync::Arc;

use anyhow::Result;
use tokio::net::TcpListener;
use tokio::signal;
use tokio::sync::broadcast;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use hr_notification_service::config::Settings;
use hr_notification_service::delivery::{
    create_stores, DeliveryEngine, DisabledTransport, MailTransport, SmtpMailTransport,
};
use hr_notification_service::notification::NotificationService;
use hr_notification_service::postgres::PostgresPool;
use hr_notification_service::recipient::RecipientResolver;
use hr_notification_service::server::{create_app, AppState};
use hr_notification_service::tasks::QueueProcessorTask;
use hr_notification_service::template::TemplateEngine;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    init_tracing();

    // Load configuration
    let settings = Settings::new()?;
    tracing::info!("Configuration loaded");

    // Database is optional; without it the in-memory stores are used
    let postgres_pool = match settings.database.url() {
        Some(_) => {
            let pool = PostgresPool::new(&settings.database).await?;
            if settings.database.run_migrations {
                pool.run_migrations().await?;
            }
            Some(pool)
        }
        None => None,
    };

    let stores = create_stores(postgres_pool.as_ref());
    let transport = create_transport(&settings);

    let delivery = DeliveryEngine::new(
        stores.email_logs.clone(),
        transport,
        settings.queue.delivery_config(),
    );
    if delivery.is_transport_configured() {
        match delivery.verify_transport().await {
            Ok(()) => tracing::info!("SMTP connection verified"),
            Err(e) => tracing::warn!(error = %e, "SMTP verification failed, will retry on send"),
        }
    }

    let templates = Arc::new(TemplateEngine::new(
        stores.templates.clone(),
        settings.app.layout(),
    ));
    let service = NotificationService::new(
        RecipientResolver::new(stores.directory.clone()),
        templates,
        delivery.clone(),
    );

    let (shutdown_tx, _) = broadcast::channel::<()>(1);

    // Start queue processor in background
    let queue_task = QueueProcessorTask::new(&settings.queue, delivery, shutdown_tx.subscribe());
    let queue_handle = tokio::spawn(async move {
        queue_task.run().await;
    });

    // Create application state and Axum app
    let state = AppState::new(settings.clone(), service, postgres_pool.clone());
    tracing::info!(backend = state.delivery.backend_type(), "Application state initialized");
    let app = create_app(state);

    // Start server
    let addr = settings.server_addr();
    let listener = TcpListener::bind(&addr).await?;
    tracing::info!("Server listening on {}", addr);

    // Run server with graceful shutdown
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal_handler(shutdown_tx))
        .await?;

    // Wait for background tasks to finish
    tracing::info!("Waiting for background tasks to finish...");
    let _ = queue_handle.await;

    if let Some(pool) = postgres_pool {
        pool.close().await;
    }

    tracing::info!("Server shutdown complete");
    Ok(())
}

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let json = std::env::var("LOG_FORMAT")
        .map(|f| f.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    let registry = tracing_subscriber::registry().with(env_filter);
    if json {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}

fn create_transport(settings: &Settings) -> Arc<dyn MailTransport> {
    let Some(config) = settings.smtp.transport_config() else {
        tracing::warn!("SMTP host not configured, email delivery is disabled");
        return Arc::new(DisabledTransport);
    };

    match SmtpMailTransport::new(&config) {
        Ok(transport) => {
            tracing::info!(
                host = %config.host,
                port = config.port,
                from = %config.from_address,
                "SMTP transport configured"
            );
            Arc::new(transport)
        }
        Err(e) => {
            tracing::error!(error = %e, "Invalid SMTP configuration, email delivery is disabled");
            Arc::new(DisabledTransport)
        }
    }
}

async fn shutdown_signal_handler(shutdown_tx: broadcast::Sender<()>) {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C, initiating graceful shutdown");
        }
        _ = terminate => {
            tracing::info!("Received terminate signal, initiating graceful shutdown");
        }
    }

    // Stop background tasks
    let _ = shutdown_tx.send(());
}
