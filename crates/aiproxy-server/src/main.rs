use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use axum::http::{header, HeaderName, Method};
use tower_http::{
    cors::{Any, CorsLayer},
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::{DefaultMakeSpan, TraceLayer},
};
use tracing::info;

use aiproxy_api::{build_router, middleware::SERVICE_HEADER, AppState};
use aiproxy_core::memory::{MemoryCache, MemoryConversationStore};
use aiproxy_core::repositories::{CacheStore, ConversationStore};
use aiproxy_core::{AuditWriter, ConversationEngine, EngineConfig};
use aiproxy_infrastructure::{
    create_pool, create_redis_pool, run_migrations, HttpCompletionBackend, PgConversationStore,
    RedisCache,
};
use aiproxy_security::{CredentialVerifier, IssuerRegistry, ServiceCredentials};
use aiproxy_shared::config::{AppConfig, CacheBackend, StoreBackend};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = AppConfig::load().context("Failed to load configuration")?;
    let _log_guard = aiproxy_shared::telemetry::init_telemetry(&config.log)?;

    info!("{} starting in {} mode...", config.app.name, config.app.env);

    // Cache
    let cache: Arc<dyn CacheStore> = match config.engine.cache_backend {
        CacheBackend::Redis => {
            let pool = create_redis_pool(&config.redis)?;
            info!("Redis pool ready ({} connections max)", config.redis.max_connections);
            Arc::new(RedisCache::new(pool))
        }
        CacheBackend::Memory => {
            info!("Using in-process cache");
            Arc::new(MemoryCache::new())
        }
    };

    // Conversation store
    let store: Arc<dyn ConversationStore> = match config.engine.store_backend {
        StoreBackend::Postgres => {
            let pool = create_pool(&config.database)
                .await
                .context("Failed to connect to database")?;
            run_migrations(&pool).await.context("Failed to run migrations")?;
            info!("Database connection established, migrations applied");
            Arc::new(PgConversationStore::new(pool))
        }
        StoreBackend::Memory => {
            info!("Using in-process conversation store");
            Arc::new(MemoryConversationStore::new())
        }
    };

    // Engine
    let backend = Arc::new(HttpCompletionBackend::new(&config.openai)?);
    let audit = AuditWriter::spawn(store, config.engine.audit_workers);
    let engine = Arc::new(ConversationEngine::new(
        cache,
        backend,
        audit,
        EngineConfig::from_app_config(&config),
    ));

    // Verifier
    let services = ServiceCredentials::from_services(&config.services);
    info!("{} backend service credential(s) loaded", services.len());
    let verifier = Arc::new(CredentialVerifier::new(
        IssuerRegistry::from_config(&config),
        services,
    ));

    let app = build_router(AppState::new(verifier, engine))
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(
            TraceLayer::new_for_http().make_span_with(DefaultMakeSpan::default().include_headers(false)),
        )
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
                .allow_headers([
                    header::CONTENT_TYPE,
                    header::AUTHORIZATION,
                    HeaderName::from_static(SERVICE_HEADER),
                ]),
        );

    let host: std::net::IpAddr = config.app.host.parse()?;
    let addr = SocketAddr::from((host, config.app.port));
    info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
