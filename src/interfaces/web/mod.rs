pub(crate) mod auth;
mod error;
mod handlers;
mod router;

use anyhow::{Context, Result};
use async_trait::async_trait;
use axum::{
    Extension,
    extract::State,
    response::sse::{Event, KeepAlive, Sse},
};
use std::convert::Infallible;
use tokio_stream::Stream;
use tokio_stream::StreamExt;
use tokio_stream::wrappers::BroadcastStream;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use crate::core::error::{DeckError, DeckResult};
use crate::core::execution::ExecutionRunner;
use crate::core::ingest::KnowledgeIngestor;
use crate::core::lifecycle::LifecycleComponent;
use crate::core::scheduler::AgentScheduler;
use crate::core::store::Store;
use auth::Caller;

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) store: Store,
    pub(crate) runner: ExecutionRunner,
    pub(crate) ingestor: KnowledgeIngestor,
    pub(crate) scheduler: AgentScheduler,
    pub(crate) log_tx: tokio::sync::broadcast::Sender<String>,
    /// Identity for token-less requests; only honored on a loopback bind.
    pub(crate) dev_user: Option<String>,
    pub(crate) loopback: bool,
}

pub struct ApiServerConfig {
    pub store: Store,
    pub runner: ExecutionRunner,
    pub ingestor: KnowledgeIngestor,
    pub scheduler: AgentScheduler,
    pub log_tx: tokio::sync::broadcast::Sender<String>,
    pub host: String,
    pub port: u16,
    pub dev_user: Option<String>,
    pub cors_origins: Vec<String>,
}

pub struct ApiServer {
    state: AppState,
    host: String,
    port: u16,
    cors_origins: Vec<String>,
    stop: CancellationToken,
}

impl ApiServer {
    pub fn new(config: ApiServerConfig) -> Self {
        let loopback = matches!(config.host.as_str(), "127.0.0.1" | "::1" | "localhost");
        Self {
            state: AppState {
                store: config.store,
                runner: config.runner,
                ingestor: config.ingestor,
                scheduler: config.scheduler,
                log_tx: config.log_tx,
                dev_user: config.dev_user,
                loopback,
            },
            host: config.host,
            port: config.port,
            cors_origins: config.cors_origins,
            stop: CancellationToken::new(),
        }
    }
}

// --- SSE streams (used by router) ---

/// Server logs span every owner, so only the loopback dev user may tail them.
async fn sse_logs_endpoint(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
) -> DeckResult<Sse<impl Stream<Item = Result<Event, Infallible>>>> {
    let local_operator =
        state.loopback && state.dev_user.as_deref() == Some(caller.user_id.as_str());
    if !local_operator {
        return Err(DeckError::Unauthorized(
            "Server logs are only available to the local dev user".to_string(),
        ));
    }
    let receiver = state.log_tx.subscribe();
    let stream = BroadcastStream::new(receiver).map(|msg| match msg {
        Ok(log) => Ok(Event::default().data(log)),
        Err(_) => Ok(Event::default().data("Log stream lagged")),
    });

    Ok(Sse::new(stream).keep_alive(KeepAlive::default()))
}

async fn sse_executions_endpoint(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let receiver = state.runner.subscribe();
    let stream = BroadcastStream::new(receiver).filter_map(move |msg| match msg {
        Ok(event) if event.owner_id() == caller.user_id => {
            let payload = serde_json::to_string(&event).ok()?;
            Some(Ok(Event::default().event("execution").data(payload)))
        }
        Ok(_) => None,
        Err(_) => Some(Ok(Event::default().event("lagged").data("{}"))),
    });

    Sse::new(stream).keep_alive(KeepAlive::default())
}

// --- Lifecycle ---

#[async_trait]
impl LifecycleComponent for ApiServer {
    async fn on_init(&mut self) -> Result<()> {
        info!("API server initializing...");
        if self.state.dev_user.is_some() && !self.state.loopback {
            info!(
                "dev_user is ignored on non-loopback host {}; bearer tokens are required",
                self.host
            );
        }
        Ok(())
    }

    async fn on_start(&mut self) -> Result<()> {
        let addr = format!("{}:{}", self.host, self.port);
        let listener = tokio::net::TcpListener::bind(&addr)
            .await
            .with_context(|| format!("failed to bind {}", addr))?;
        let app = router::build_api_router(self.state.clone(), &self.cors_origins);
        let stop = self.stop.clone();

        info!("API server running at http://{addr}");
        tokio::spawn(async move {
            if let Err(e) = axum::serve(listener, app)
                .with_graceful_shutdown(stop.cancelled_owned())
                .await
            {
                error!("API server crashed: {}", e);
            }
        });
        Ok(())
    }

    async fn on_shutdown(&mut self) -> Result<()> {
        info!("API server shutting down...");
        self.stop.cancel();
        Ok(())
    }
}

#[cfg(test)]
pub(crate) async fn test_state(dev_user: Option<&str>, loopback: bool) -> AppState {
    use crate::core::config::{ExecutionConfig, IngestionConfig, IngestionProfile};
    use crate::core::execution::SimulatedBackend;
    use std::sync::Arc;

    let store = crate::core::store::test_store();
    store
        .insert_user("user-1", "Ada", "ada@example.com")
        .await
        .unwrap();
    store
        .insert_user("user-2", "Grace", "grace@example.com")
        .await
        .unwrap();
    let backend = Arc::new(SimulatedBackend::new(&ExecutionConfig {
        min_delay_ms: 10,
        max_delay_ms: 20,
        success_rate: 1.0,
        max_concurrent: 4,
    }));
    let runner = ExecutionRunner::new(store.clone(), backend, 4);
    let profile = IngestionProfile {
        min_delay_ms: 10,
        max_delay_ms: 20,
        min_chunks: 10,
        max_chunks: 59,
    };
    let ingestor = KnowledgeIngestor::new(
        store.clone(),
        IngestionConfig {
            register: profile.clone(),
            upload: profile,
        },
    );
    let jobs = tokio_cron_scheduler::JobScheduler::new().await.unwrap();
    let scheduler = AgentScheduler::new(jobs, runner.clone(), store.clone(), true);
    let (log_tx, _) = tokio::sync::broadcast::channel(8);
    AppState {
        store,
        runner,
        ingestor,
        scheduler,
        log_tx,
        dev_user: dev_user.map(str::to_string),
        loopback,
    }
}
