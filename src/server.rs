use crate::catalog::{Catalog, SnowflakeSource};
use crate::config::Config;
use crate::error::ApiError;
use crate::generation::{OpenAiClient, OpenAiConfig};
use crate::generator::Generator;
use crate::handlers::{
    add_style, generate_image, generate_text, get_state, new_session, post_action, regenerate_text,
    remove_style, reset_styles, show_page, AppState, SharedState,
};
use crate::health::{health_check, metrics, readiness_check};
use crate::metrics::MetricsCollector;
use crate::middleware::logging_middleware;
use crate::session::SessionStore;
use crate::throttle::ThrottleGate;
use axum::routing::{get, post};
use axum::{middleware, Router};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

/// Build the router around already constructed application state.
pub fn create_app(state: SharedState) -> Router {
    Router::new()
        .route("/", get(new_session))
        .route("/sessions/:id", get(show_page))
        .route("/sessions/:id/state", get(get_state))
        .route("/sessions/:id/actions", post(post_action))
        .route("/sessions/:id/text", post(generate_text))
        .route("/sessions/:id/text/regenerate", post(regenerate_text))
        .route("/sessions/:id/image", post(generate_image))
        .route("/sessions/:id/styles", post(add_style))
        .route("/sessions/:id/styles/remove", post(remove_style))
        .route("/sessions/:id/styles/reset", post(reset_styles))
        // Health and readiness endpoints
        .route("/health", get(health_check))
        .route("/ready", get(readiness_check))
        .route("/metrics", get(metrics))
        .with_state(state)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CorsLayer::permissive())
                .layer(middleware::from_fn(logging_middleware)),
        )
}

pub struct Server {
    app: Router,
    bind_addr: SocketAddr,
    sessions: SessionStore,
    session_ttl: Duration,
    cleanup_interval: Duration,
}

impl Server {
    /// Wire the OpenAI and Snowflake clients from configuration.
    pub fn new(config: Config) -> Result<Self, ApiError> {
        let openai = OpenAiConfig::new(config.openai_api_key.clone())
            .with_base_url(config.openai_base_url.clone())
            .with_completion_model(config.completion_model.clone())
            .with_image_size(config.image_size.clone())
            .with_timeout(config.upstream_timeout());
        let client = OpenAiClient::new(openai).map_err(|e| ApiError::ConfigurationError(e.to_string()))?;

        let source = SnowflakeSource::new(config.snowflake_config())?;
        let catalog = Catalog::new(Arc::new(source), config.topics_table.clone(), config.styles_table.clone());

        let generator = Generator::new(
            Arc::new(client),
            catalog,
            ThrottleGate::new(config.request_limit),
            MetricsCollector::new(),
        );
        let state: SharedState = Arc::new(AppState::new(generator));
        let sessions = state.sessions.clone();

        Ok(Self {
            app: create_app(state),
            bind_addr: config.bind_addr,
            sessions,
            session_ttl: config.session_ttl(),
            cleanup_interval: config.cleanup_interval(),
        })
    }

    pub async fn run(self) -> Result<(), Box<dyn std::error::Error>> {
        let listener = tokio::net::TcpListener::bind(self.bind_addr).await?;

        tracing::info!("postgen server listening on {}", self.bind_addr);
        tracing::info!("Health check available at /health");
        tracing::info!("Readiness check available at /ready");

        let sweeper = tokio::spawn(sweep_sessions(self.sessions, self.session_ttl, self.cleanup_interval));

        // Run server with graceful shutdown
        axum::serve(listener, self.app.into_make_service_with_connect_info::<SocketAddr>())
            .with_graceful_shutdown(shutdown_signal())
            .await?;

        sweeper.abort();
        Ok(())
    }
}

/// Periodically drop sessions idle for longer than `ttl`.
pub async fn sweep_sessions(sessions: SessionStore, ttl: Duration, every: Duration) {
    let mut interval = tokio::time::interval(every);
    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    loop {
        interval.tick().await;
        let removed = sessions.cleanup_expired(ttl).await;
        if removed > 0 {
            let remaining = sessions.len().await;
            tracing::info!(removed, remaining, "Expired idle sessions");
        }
    }
}


async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install signal handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C, initiating graceful shutdown");
        },
        _ = terminate => {
            tracing::info!("Received terminate signal, initiating graceful shutdown");
        },
    }
}
