//! Server entrypoint: wire adapters to the rules engine and serve.

use std::sync::Arc;

use axum::http::{HeaderValue, Method};
use axum::routing::get;
use axum::Router;
use sqlx::postgres::PgPoolOptions;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

use typeclash::adapters::postgres::{PgProblemRepository, PgRoomRepository};
use typeclash::adapters::redis::{RedisEventBus, RedisGameStore, RedisOtpService};
use typeclash::adapters::websocket::{self, ConnectionRegistry, WsState};
use typeclash::application::{FanoutBridge, GameManager};
use typeclash::config::AppConfig;
use typeclash::ports::OtpService;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::load()?;
    config.validate()?;

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&config.server.log_level)),
        )
        .init();

    let pool = PgPoolOptions::new()
        .max_connections(config.database.max_connections)
        .connect(&config.database.url)
        .await?;

    let redis_client = redis::Client::open(config.redis.url.as_str())?;
    let redis_conn = tokio::time::timeout(
        config.redis.timeout(),
        redis_client.get_multiplexed_tokio_connection(),
    )
    .await??;

    let registry = ConnectionRegistry::new_shared(&config.game);
    let store = Arc::new(RedisGameStore::new(redis_conn.clone(), &config.game));
    let bus = Arc::new(RedisEventBus::new(redis_client, redis_conn.clone()));
    let otp: Arc<dyn OtpService> = Arc::new(RedisOtpService::new(redis_conn));
    let rooms = Arc::new(PgRoomRepository::new(pool.clone()));
    let problems = Arc::new(PgProblemRepository::new(pool));

    let manager = Arc::new(GameManager::new(
        store.clone(),
        rooms,
        problems,
        bus.clone(),
        registry.clone(),
        config.game.clone(),
    ));

    let bridge = FanoutBridge::new(store, bus, registry.clone());
    tokio::spawn(async move {
        if let Err(err) = bridge.run().await {
            tracing::error!(error = %err, "fan-out bridge failed");
        }
    });

    let origins = config
        .server
        .cors_origins_list()
        .iter()
        .map(|o| o.parse::<HeaderValue>())
        .collect::<Result<Vec<_>, _>>()?;
    let cors = CorsLayer::new()
        .allow_methods([Method::GET])
        .allow_origin(AllowOrigin::list(origins));

    let app = Router::new()
        .route("/healthz", get(|| async { "ok" }))
        .merge(websocket::router(WsState {
            registry,
            manager,
            otp,
        }))
        .layer(TraceLayer::new_for_http())
        .layer(cors);

    let addr = config.server.socket_addr()?;
    tracing::info!(%addr, "listening");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c().await.ok();
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    tracing::info!("shutdown signal received");
}
