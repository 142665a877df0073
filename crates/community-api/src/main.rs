//! 커뮤니티 인증 API 서버.
//!
//! 설정을 로드하고 PostgreSQL, Redis에 연결한 뒤 Axum 서버를 시작합니다.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::{http::StatusCode, middleware, routing::get, Router};
use metrics_exporter_prometheus::PrometheusHandle;
use secrecy::ExposeSecret;
use tokio_util::sync::CancellationToken;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;
use tracing::{debug, error, info, warn};

use community_api::auth::CredentialCodec;
use community_api::metrics::setup_metrics_recorder;
use community_api::middleware::metrics_layer;
use community_api::openapi::swagger_ui_router;
use community_api::routes::create_api_router;
use community_api::state::AppState;
use community_core::{init_logging, AppConfig, LogConfig};
use community_data::{CacheStore, Database, MemoryCache, PgIdentityStore, RedisCache};

/// CORS 레이어 생성.
///
/// `CORS_ORIGINS` 환경변수(쉼표 구분)가 설정되어 있으면 해당 origin만 허용하고
/// 쿠키 전송을 허용합니다. 설정되지 않으면 모든 origin을 허용합니다.
fn cors_layer() -> CorsLayer {
    let origins: Vec<_> = std::env::var("CORS_ORIGINS")
        .unwrap_or_default()
        .split(',')
        .filter_map(|s| s.trim().parse().ok())
        .collect();

    let layer = CorsLayer::new()
        .allow_methods([
            axum::http::Method::GET,
            axum::http::Method::POST,
            axum::http::Method::PUT,
            axum::http::Method::DELETE,
            axum::http::Method::OPTIONS,
        ])
        .allow_headers([
            axum::http::header::CONTENT_TYPE,
            axum::http::header::ACCEPT,
        ])
        .max_age(Duration::from_secs(3600));

    if origins.is_empty() {
        warn!("CORS_ORIGINS not set, allowing any origin without credentials (development mode)");
        layer.allow_origin(AllowOrigin::any())
    } else {
        info!("CORS configured with {} allowed origins", origins.len());
        layer
            .allow_origin(AllowOrigin::list(origins))
            .allow_credentials(true)
    }
}

/// /metrics 엔드포인트 핸들러.
async fn metrics_handler(
    axum::extract::State(handle): axum::extract::State<PrometheusHandle>,
) -> String {
    handle.render()
}

/// 전체 라우터 생성.
fn create_router(
    state: Arc<AppState>,
    metrics_handle: PrometheusHandle,
    request_timeout: Duration,
) -> Router {
    let metrics_router = Router::new()
        .route("/metrics", get(metrics_handler))
        .with_state(metrics_handle);

    let api_router = create_api_router(state.clone()).with_state(state);

    Router::new()
        .merge(metrics_router)
        .merge(api_router)
        .merge(swagger_ui_router())
        .layer(middleware::from_fn(metrics_layer))
        .layer(TraceLayer::new_for_http())
        .layer(TimeoutLayer::with_status_code(
            StatusCode::REQUEST_TIMEOUT,
            request_timeout,
        ))
        .layer(cors_layer())
}

/// 프로세스 로컬 캐시의 만료 항목 정리 주기.
const MEMORY_PURGE_INTERVAL: Duration = Duration::from_secs(60);

/// 캐시 저장소 연결.
///
/// Redis에 연결하지 못하면 프로세스 로컬 캐시로 대체합니다. 이 경우 세션은
/// 인스턴스 간에 공유되지 않으며, 만료 항목 정리 태스크가 함께 시작됩니다.
async fn connect_cache(
    url: &str,
    shutdown_token: CancellationToken,
) -> (Arc<dyn CacheStore>, &'static str) {
    match RedisCache::connect(url).await {
        Ok(redis) => {
            info!("Redis cache connected");
            (Arc::new(redis), "redis")
        }
        Err(e) => {
            warn!(error = %e, "Redis unavailable, falling back to in-process cache");
            let cache = MemoryCache::new();
            tokio::spawn(purge_expired_entries(cache.clone(), shutdown_token));
            (Arc::new(cache), "memory")
        }
    }
}

/// 종료될 때까지 주기적으로 만료 항목을 제거합니다.
async fn purge_expired_entries(cache: MemoryCache, shutdown_token: CancellationToken) {
    let mut interval = tokio::time::interval(MEMORY_PURGE_INTERVAL);
    loop {
        tokio::select! {
            _ = shutdown_token.cancelled() => break,
            _ = interval.tick() => {
                let purged = cache.purge_expired().await;
                if purged > 0 {
                    debug!(purged, "Expired cache entries removed");
                }
            }
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // .env 파일 로드 (있는 경우)
    let _ = dotenvy::dotenv();

    let config = AppConfig::load_default()?;
    init_logging(LogConfig::from_settings(&config.logging).with_env_overrides())?;

    let metrics_handle = setup_metrics_recorder()?;

    let codec = CredentialCodec::new(config.auth.jwt_secret.expose_secret())?;

    let database = Database::connect(&config.database).await?;
    database.migrate().await?;
    let store = PgIdentityStore::new(database, config.database.query_timeout());

    let shutdown_token = CancellationToken::new();
    let (cache, cache_backend) = connect_cache(&config.redis.url, shutdown_token.clone()).await;

    let state = Arc::new(
        AppState::new(
            codec,
            cache,
            Arc::new(store),
            config.redis.op_timeout(),
        )
        .with_cache_backend(cache_backend)
        .with_secure_cookies(config.auth.secure_cookies)
        .with_trust_forwarded_for(config.auth.trust_forwarded_for),
    );

    info!(
        cache_backend,
        secure_cookies = config.auth.secure_cookies,
        trust_forwarded_for = config.auth.trust_forwarded_for,
        "Authentication services initialized"
    );

    let app = create_router(
        state,
        metrics_handle,
        Duration::from_secs(config.server.request_timeout_secs),
    );

    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port).parse()?;
    info!(%addr, "API server listening");
    info!("Swagger UI available at http://{}/swagger-ui", addr);
    info!("Metrics available at http://{}/metrics", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal(shutdown_token.clone()))
    .await?;

    // 백그라운드 태스크 종료
    shutdown_token.cancel();
    info!("Server stopped gracefully");
    Ok(())
}

/// Graceful shutdown 시그널 대기.
///
/// Ctrl+C 또는 SIGTERM 시그널을 수신하면 종료 토큰을 취소합니다.
async fn shutdown_signal(shutdown_token: CancellationToken) {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
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
        _ = ctrl_c => {
            warn!("Received Ctrl+C, initiating graceful shutdown...");
        }
        _ = terminate => {
            warn!("Received SIGTERM, initiating graceful shutdown...");
        }
    }

    shutdown_token.cancel();
}
