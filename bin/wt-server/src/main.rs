//! Worktime Server
//!
//! Production entry point:
//! - REST APIs: auth, users, attendances, uploads
//! - Profile-change consumer on the message channel
//!
//! Configuration comes from `WT_CONFIG` (default `config/worktime.toml`) and
//! `WT_*` environment overrides; see `wt-config`. `RUST_LOG` sets the log level.

use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::Duration;
use mongodb::bson::doc;
use tokio::{net::TcpListener, signal, sync::broadcast};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{error, info};

use wt_config::{AppConfig, QueueBackend};
use wt_platform::api::{platform_router, PlatformServices};
use wt_platform::domain::WorkCalendar;
use wt_platform::repository::{
    AttendanceRepository, MongoAttendanceRepository, MongoUserRepository, UserRepository,
};
use wt_platform::service::{
    Argon2Config, AttendanceService, AuthService, Clock, LocalDiskBlobStore, PasswordService,
    ProfileChangeHandler, ProfileChangeNotifier, ReportService, SystemClock, TokenConfig,
    TokenService, UserService,
};
use wt_queue::{
    ConsumerRunner, InMemoryQueue, QueueConsumer, QueuePublisher, RabbitMqChannel,
    RabbitMqTopology,
};

/// Channel handles plus whatever must be closed on shutdown
struct Channel {
    publisher: Arc<dyn QueuePublisher>,
    consumer: Arc<dyn QueueConsumer>,
    rabbit: Option<RabbitMqChannel>,
}

async fn open_channel(config: &AppConfig) -> Result<Channel> {
    let queue = &config.queue;
    match queue.backend {
        QueueBackend::Rabbitmq => {
            let topology = RabbitMqTopology {
                queue: queue.profile_topic.clone(),
                exchange: queue.profile_exchange.clone(),
                exchange_type: queue.profile_exchange_type.clone(),
                consumer_tag: queue.profile_consumer_tag.clone(),
                prefetch: 1,
            };
            let channel = RabbitMqChannel::connect(&queue.uri, topology)
                .await
                .context("failed to connect to RabbitMQ")?;
            let publisher: Arc<dyn QueuePublisher> = Arc::new(channel.publisher());
            let consumer: Arc<dyn QueueConsumer> = Arc::new(
                channel
                    .consumer()
                    .await
                    .context("failed to start RabbitMQ consumer")?,
            );
            Ok(Channel {
                publisher,
                consumer,
                rabbit: Some(channel),
            })
        }
        QueueBackend::Memory => {
            info!(topic = %queue.profile_topic, "Using in-memory message channel");
            let memory = Arc::new(InMemoryQueue::new(queue.profile_topic.clone()));
            Ok(Channel {
                publisher: memory.clone(),
                consumer: memory,
                rabbit: None,
            })
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let config = AppConfig::load().context("failed to load configuration")?;
    wt_common::init_tracing(config.logging.format);

    info!("Starting Worktime Server");

    // Connect to MongoDB
    info!("Connecting to MongoDB: {}/{}", config.mongo.url, config.mongo.database);
    let mongo_client = mongodb::Client::with_uri_str(&config.mongo.url)
        .await
        .context("invalid MongoDB URL")?;
    let db = mongo_client.database(&config.mongo.database);
    db.run_command(doc! { "ping": 1 })
        .await
        .context("MongoDB is unreachable")?;

    let user_repo: Arc<dyn UserRepository> = Arc::new(MongoUserRepository::new(&db));
    let attendance_repo: Arc<dyn AttendanceRepository> =
        Arc::new(MongoAttendanceRepository::new(&db));
    user_repo.ensure_indexes().await?;
    attendance_repo.ensure_indexes().await?;
    info!("Repositories initialized");

    let channel = open_channel(&config).await?;

    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let calendar = WorkCalendar::from_offset_minutes(config.attendance.utc_offset_minutes)
        .context("attendance.utc_offset_minutes is out of range")?;

    let access_ttl = Duration::try_seconds(config.jwt.access_ttl_secs)
        .context("jwt.access_ttl_secs is out of range")?;
    let refresh_ttl = Duration::try_seconds(config.jwt.refresh_ttl_secs)
        .context("jwt.refresh_ttl_secs is out of range")?;
    let token_service = Arc::new(TokenService::new(
        TokenConfig {
            access_secret: config.jwt.access_secret.clone(),
            refresh_secret: config.jwt.refresh_secret.clone(),
            access_ttl,
            refresh_ttl,
        },
        clock.clone(),
    ));
    let password_service = Arc::new(PasswordService::new(Argon2Config::default())?);
    let auth_service = Arc::new(AuthService::new(
        user_repo.clone(),
        token_service.clone(),
        password_service,
        clock.clone(),
    ));
    let notifier = Arc::new(ProfileChangeNotifier::new(channel.publisher.clone(), clock.clone()));
    let user_service = Arc::new(UserService::new(user_repo, notifier, clock.clone()));
    let attendance_service = Arc::new(AttendanceService::new(attendance_repo, calendar, clock.clone()));
    let report_service = Arc::new(ReportService::new(attendance_service.clone()));
    let blob_store = Arc::new(LocalDiskBlobStore::new(config.uploads.dir.clone(), clock));
    info!("Services initialized");

    // Profile-change consumer
    let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
    let handler = Arc::new(ProfileChangeHandler::default());
    let consumer_task = tokio::spawn(
        ConsumerRunner::new(channel.consumer.clone(), handler).run(shutdown_rx),
    );

    let app = platform_router(PlatformServices {
        token_service,
        auth_service,
        user_service,
        attendance_service,
        report_service,
        blob_store,
    })
    .layer(TraceLayer::new_for_http())
    .layer(CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any));

    let api_addr = config.http.bind_address();
    let listener = TcpListener::bind(&api_addr)
        .await
        .with_context(|| format!("failed to bind {}", api_addr))?;
    info!("API server listening on http://{}", api_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    info!("Shutdown signal received...");

    // The consumer may already have stopped if the channel closed
    let _ = shutdown_tx.send(());
    let consumer_result = consumer_task.await.context("consumer task panicked")?;

    if let Some(rabbit) = channel.rabbit {
        if let Err(e) = rabbit.close().await {
            error!(error = %e, "Failed to close RabbitMQ connection");
        }
    }

    let settled = consumer_result.context("profile consumer failed")?;
    info!(settled, "Worktime Server shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "Failed to install Ctrl+C handler");
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
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
