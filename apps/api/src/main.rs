mod auth;
mod config;
mod db;
mod errors;
mod extract;
mod models;
mod notifications;
mod object_store;
mod plants;
mod rate_limit;
mod routes;
mod state;
mod stats;
mod store;
mod uploads;
mod validation;

#[cfg(test)]
mod test_support;

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use aws_config::Region;
use aws_sdk_s3::config::Credentials;
use mockable::{Clock, DefaultClock};
use tokio_util::sync::CancellationToken;
use tower_http::{
    cors::{AllowOrigin, Any, CorsLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::auth::JwtIdentityVerifier;
use crate::config::Config;
use crate::db::create_pool;
use crate::notifications::repository::NotificationRepository;
use crate::object_store::S3ObjectStore;
use crate::plants::repository::PlantRepository;
use crate::rate_limit::{run_eviction_loop, RateLimiter};
use crate::routes::build_router;
use crate::state::AppState;
use crate::stats::StatsCache;
use crate::store::PgStore;
use crate::uploads::cleanup::run_cleanup_loop;
use crate::uploads::manager::UploadManager;

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::from_env()?;

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!(
                "{}={}",
                env!("CARGO_PKG_NAME").replace('-', "_"),
                &config.rust_log
            ))
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting plants API v{}", env!("CARGO_PKG_VERSION"));

    let pool = create_pool(&config.database_url, config.request_timeout).await?;
    let store = Arc::new(PgStore::new(pool));

    let s3 = build_s3_client(&config).await;
    let objects = Arc::new(S3ObjectStore::new(
        s3,
        config.s3_bucket.clone(),
        config.presign_expiry,
    ));
    info!(bucket = %config.s3_bucket, "S3 client initialized");

    let mut verifier = JwtIdentityVerifier::new(config.jwt_secret.as_bytes());
    if let Some(issuer) = &config.jwt_issuer {
        verifier = verifier.with_issuer(issuer);
    }
    if let Some(audience) = &config.jwt_audience {
        verifier = verifier.with_audience(audience);
    }

    let clock: Arc<dyn Clock> = Arc::new(DefaultClock);
    let plants = PlantRepository::new(
        store.clone(),
        clock.clone(),
        config.limits.max_plants_per_user,
    );
    let notifications = NotificationRepository::new(store.clone(), plants.clone(), clock.clone());
    let uploads = UploadManager::new(
        store.clone(),
        store.clone(),
        objects.clone(),
        clock.clone(),
        config.limits.clone(),
    );
    let stats = Arc::new(StatsCache::new(
        plants.clone(),
        notifications.clone(),
        clock,
        config.stats_ttl,
    ));
    let rate_limiter = Arc::new(RateLimiter::new());

    let shutdown = CancellationToken::new();
    let orphan_threshold = chrono::Duration::from_std(config.orphan_threshold)
        .context("ORPHAN_THRESHOLD_SECS is out of range")?;
    let cleanup = tokio::spawn(run_cleanup_loop(
        uploads.clone(),
        config.cleanup_interval,
        orphan_threshold,
        config.cleanup_budget,
        shutdown.clone(),
    ));
    let eviction = tokio::spawn(run_eviction_loop(rate_limiter.clone(), shutdown.clone()));

    let state = AppState {
        plants,
        uploads,
        notifications,
        stats,
        objects,
        identity: Arc::new(verifier),
        rate_limiter,
    };

    let app = build_router(state)
        .layer(TimeoutLayer::new(config.request_timeout))
        .layer(TraceLayer::new_for_http())
        .layer(cors_layer(&config.cors_origins));

    let addr: SocketAddr = format!("0.0.0.0:{}", config.port).parse()?;
    info!("Listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    let signal = shutdown.clone();
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("failed to listen for shutdown signal: {e}");
        }
        info!("Shutting down");
        signal.cancel();
    })
    .await?;

    shutdown.cancel();
    let _ = tokio::join!(cleanup, eviction);
    Ok(())
}

/// Constructs an S3 client for MinIO (custom endpoint) or AWS.
async fn build_s3_client(config: &Config) -> aws_sdk_s3::Client {
    let credentials = Credentials::new(
        &config.aws_access_key_id,
        &config.aws_secret_access_key,
        None,
        None,
        "plants-static",
    );

    let mut loader = aws_config::defaults(aws_config::BehaviorVersion::latest())
        .region(Region::new(config.s3_region.clone()))
        .credentials_provider(credentials);
    if let Some(endpoint) = &config.s3_endpoint {
        loader = loader.endpoint_url(endpoint);
    }
    let shared = loader.load().await;

    let s3_config = aws_sdk_s3::config::Builder::from(&shared)
        .force_path_style(config.s3_endpoint.is_some())
        .build();
    aws_sdk_s3::Client::from_conf(s3_config)
}

/// Permissive when no origins are configured.
fn cors_layer(origins: &[String]) -> CorsLayer {
    let layer = CorsLayer::new().allow_methods(Any).allow_headers(Any);
    if origins.is_empty() {
        return layer.allow_origin(Any);
    }
    let allowed: Vec<_> = origins
        .iter()
        .filter_map(|origin| match origin.parse() {
            Ok(value) => Some(value),
            Err(_) => {
                warn!(%origin, "ignoring invalid CORS origin");
                None
            }
        })
        .collect();
    layer.allow_origin(AllowOrigin::list(allowed))
}
