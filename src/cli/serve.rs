use anyhow::Result;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::info;

use super::ServeArgs;
use crate::core::config::AppConfig;
use crate::core::execution::{ExecutionRunner, SimulatedBackend};
use crate::core::ingest::KnowledgeIngestor;
use crate::core::lifecycle::LifecycleManager;
use crate::core::scheduler::AgentScheduler;
use crate::core::store::Store;
use crate::core::terminal::{self, print_link, print_status, print_warn};
use crate::interfaces::web::{ApiServer, ApiServerConfig};
use crate::logging::init_tracing;

fn apply_overrides(config: &mut AppConfig, args: &ServeArgs) {
    if let Some(host) = &args.host {
        config.server.host = host.clone();
    }
    if let Some(port) = args.port {
        config.server.port = port;
    }
    if args.seed_demo {
        config.seed_demo = true;
    }
}

pub async fn run_server(args: ServeArgs) -> Result<()> {
    let mut config = AppConfig::load(args.config.as_deref()).await?;
    apply_overrides(&mut config, &args);

    let (log_tx, _) = tokio::sync::broadcast::channel::<String>(500);
    init_tracing(&config.logging.level, log_tx.clone(), false);
    terminal::print_banner();

    let db_path = config.database_path();
    let store = Store::open(&db_path).await?;
    info!("Database ready at {}", db_path.display());
    if config.seed_demo && store.seed_demo().await? {
        info!("Seeded demo dataset into empty database");
    }
    if !store.has_any_users().await? {
        print_warn("No users yet. Create one with: agentdeck user add <name> <email>");
    }

    let mut lifecycle = LifecycleManager::new().await?;
    let backend = Arc::new(SimulatedBackend::new(&config.execution));
    let runner = ExecutionRunner::new(store.clone(), backend, config.execution.max_concurrent);
    let ingestor = KnowledgeIngestor::new(store.clone(), config.ingestion.clone());
    let scheduler = AgentScheduler::new(
        lifecycle.scheduler.clone(),
        runner.clone(),
        store.clone(),
        config.scheduler.enabled,
    );
    let api = ApiServer::new(ApiServerConfig {
        store: store.clone(),
        runner: runner.clone(),
        ingestor: ingestor.clone(),
        scheduler: scheduler.clone(),
        log_tx,
        host: config.server.host.clone(),
        port: config.server.port,
        dev_user: config.server.dev_user.clone(),
        cors_origins: config.server.cors_origins.clone(),
    });

    // Recovery runs in attach order: stale executions before schedules come back.
    lifecycle.attach(Arc::new(Mutex::new(runner)));
    lifecycle.attach(Arc::new(Mutex::new(ingestor)));
    lifecycle.attach(Arc::new(Mutex::new(scheduler)));
    lifecycle.attach(Arc::new(Mutex::new(api)));
    lifecycle.start().await?;

    let base = format!("http://{}:{}", config.server.host, config.server.port);
    print_link("API", &format!("{}/api", base));
    print_link("Live logs", &format!("{}/api/logs", base));
    print_status(
        "Execution pool",
        &format!("{} worker(s)", config.execution.max_concurrent),
    );
    if let Some(dev_user) = config.server.dev_user.as_deref().filter(|_| config.is_loopback()) {
        print_status("Dev user", dev_user);
    }

    tokio::signal::ctrl_c().await?;
    info!("Shutting down agentdeck...");
    lifecycle.shutdown().await?;
    terminal::print_goodbye();
    Ok(())
}
