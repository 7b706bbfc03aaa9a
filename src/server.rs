use crate::admission::SummarizePipeline;
use crate::auth::TokenAuth;
use crate::collaborators::Collaborators;
use crate::config::Config;
use crate::config_validator::ConfigValidator;
use crate::error::{Error, Result};
use crate::handlers::{health_check, summarize, AppState, SharedState};
use crate::ledger::{InMemoryHistory, InMemoryLedger};
use crate::middleware::logging_middleware;
use crate::rate_limiter::{RateLimitStore, RateLimiter, InMemoryStore, SystemClock};
use crate::redis::RedisStore;
use crate::sanitize::TranscriptSanitizer;
use crate::summarizer::GeminiSummarizer;
use crate::transcript::SupadataClient;
use axum::routing::get;
use axum::{middleware, Router};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

fn summarize_routes() -> Router<SharedState> {
    Router::new().route("/summarize", get(health_check).post(summarize))
}

/// Build the HTTP router around an already-assembled state.
pub fn create_app(state: SharedState) -> Router {
    Router::new()
        .merge(summarize_routes())
        .nest("/api", summarize_routes())
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
    addr: SocketAddr,
    limiter: RateLimiter,
    sweep_interval: Duration,
}

impl Server {
    /// Wire the default collaborators and store from configuration.
    pub async fn from_config(config: &Config) -> Result<Self> {
        ConfigValidator::validate(config)?;
        let addr = config
            .bind_socket_addr()
            .map_err(|e| Error::Config(format!("invalid bind address: {}", e)))?;

        let store: Arc<dyn RateLimitStore> = match &config.redis_url {
            Some(url) => Arc::new(RedisStore::connect(url).await?),
            None => Arc::new(InMemoryStore::new()),
        };
        let limiter = RateLimiter::new(store, Arc::new(SystemClock));

        if config.supadata_api_key.is_empty() {
            tracing::warn!("SUPADATA_API_KEY is not configured; transcript fetches will fail");
        }
        if config.gemini_api_key.is_empty() {
            tracing::warn!("GEMINI_API_KEY is not configured; analyses will fail");
        }

        let auth = TokenAuth::parse(&config.auth_tokens)?;
        let ledger = InMemoryLedger::with_starting_credits(auth.user_ids(), config.starting_credits);
        let collaborators = Collaborators {
            auth: Arc::new(auth),
            ledger: Arc::new(ledger),
            transcripts: Arc::new(SupadataClient::new(
                config.supadata_base_url.as_str(),
                config.supadata_api_key.as_str(),
                config.transcript_timeout(),
            )?),
            summarizer: Arc::new(GeminiSummarizer::new(
                config.gemini_api_key.as_str(),
                config.gemini_model.as_str(),
                Duration::from_secs(60),
            )?),
            history: Arc::new(InMemoryHistory::new()),
        };

        let pipeline = SummarizePipeline::new(
            collaborators,
            limiter.clone(),
            TranscriptSanitizer::new(&config.sanitizer_config())?,
            config.pipeline_settings(),
        );
        let state = Arc::new(AppState::new(pipeline, config.route_limits()));

        Ok(Self {
            app: create_app(state),
            addr,
            limiter,
            sweep_interval: config.sweep_interval(),
        })
    }

    pub async fn run(self) -> Result<()> {
        let listener = tokio::net::TcpListener::bind(self.addr)
            .await
            .map_err(|e| Error::Config(format!("failed to bind {}: {}", self.addr, e)))?;

        let sweeper = self.limiter.spawn_sweeper(self.sweep_interval);

        tracing::info!("verdict-gate listening on {}", self.addr);
        tracing::info!("Rate limit backend: {}", self.limiter.backend());
        tracing::info!("Health check available at GET /summarize");

        // Run server with graceful shutdown
        let served = axum::serve(listener, self.app)
            .with_graceful_shutdown(shutdown_signal())
            .await
            .map_err(|e| Error::Internal(format!("server error: {}", e)));

        sweeper.abort();
        served
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("failed to install Ctrl+C handler: {}", e);
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
                tracing::error!("failed to install signal handler: {}", e);
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
