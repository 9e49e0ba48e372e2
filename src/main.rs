use anyhow::anyhow;
use axum::http::{HeaderName, HeaderValue};
use axum::Router;
use std::net::SocketAddr;
use tower::ServiceBuilder;
use tower_http::compression::CompressionLayer;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use campustrack::config::{AdminSeedConfig, AppConfig};
use campustrack::infra::{cache::RedisCache, db::Db, oracle::MatchOracle};
use campustrack::{http, AppState};

const MAX_BODY_BYTES: usize = 1024 * 1024;
const REQUEST_ID_HEADER: HeaderName = HeaderName::from_static("x-request-id");

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::from_default_env())
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = AppConfig::from_env()?;

    let db = Db::connect_lazy(&config)?;
    let cache = RedisCache::open(&config.redis_url)?;
    let oracle = MatchOracle::new(&config)?;
    if !oracle.is_configured() {
        tracing::warn!("ORACLE_API_KEY not set; match requests will fail with 503");
    }

    let state = AppState {
        db,
        cache,
        oracle,
        paseto_access_key: config.paseto_access_key,
        paseto_refresh_key: config.paseto_refresh_key,
        access_ttl_minutes: config.access_ttl_minutes,
        refresh_ttl_days: config.refresh_ttl_days,
        campus_email_domain: config.campus_email_domain.clone(),
        auth_ip_rate_limit_per_hour: config.auth_ip_rate_limit_per_hour,
    };

    match config.app_mode.as_str() {
        "api" => {
            let app = with_service_layers(http::router(state), &config)?;
            let listener = tokio::net::TcpListener::bind(&config.http_addr).await?;
            tracing::info!("listening on {}", config.http_addr);

            // ConnectInfo feeds the per-IP limiter on the credential endpoints.
            let app = app.into_make_service_with_connect_info::<SocketAddr>();

            axum::serve(listener, app)
                .with_graceful_shutdown(shutdown_signal())
                .await?;
        }
        "migrate" => {
            state.db.migrate().await?;
            tracing::info!("migrations applied");
        }
        "seed-admin" => {
            let seed = AdminSeedConfig::from_env()?;
            let provisioned = state
                .auth_service()
                .provision_admin(&seed.name, &seed.email, seed.password)
                .await?;
            tracing::info!(user_id = %provisioned.user.id, email = %provisioned.user.email, "admin provisioned");
            if let Some(password) = provisioned.generated_password {
                // Shown once; only the hash is stored.
                println!("generated admin password: {}", password);
            }
        }
        other => return Err(anyhow!("unknown APP_MODE: {}", other)),
    }

    Ok(())
}

fn with_service_layers(router: Router, config: &AppConfig) -> anyhow::Result<Router> {
    let cors = match config.cors_allow_origin.as_deref() {
        Some(origin) => {
            let origin = HeaderValue::from_str(origin)
                .map_err(|err| anyhow!("invalid CORS_ALLOW_ORIGIN: {}", err))?;
            CorsLayer::new().allow_origin(AllowOrigin::exact(origin))
        }
        None => CorsLayer::new().allow_origin(Any),
    }
    .allow_methods(Any)
    .allow_headers(Any);

    Ok(router.layer(
        ServiceBuilder::new()
            .layer(SetRequestIdLayer::new(REQUEST_ID_HEADER, MakeRequestUuid))
            .layer(TraceLayer::new_for_http())
            .layer(PropagateRequestIdLayer::new(REQUEST_ID_HEADER))
            .layer(CompressionLayer::new())
            .layer(RequestBodyLimitLayer::new(MAX_BODY_BYTES))
            .layer(cors),
    ))
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %err, "failed to install Ctrl+C handler");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(err) => {
                tracing::error!(error = %err, "failed to install SIGTERM handler");
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("shutdown signal received");
}
