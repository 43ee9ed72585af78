use anyhow::Result;
use chrono::Local;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio_cron_scheduler::{Job, JobScheduler};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::core::execution::ExecutionRunner;
use crate::core::lifecycle::LifecycleComponent;
use crate::core::schedule::{self, SchedulePreset};
use crate::core::store::Store;
use crate::core::store::types::{AgentRecord, AgentStatus};

/// Keeps one cron job per active agent with a recognized schedule.
#[derive(Clone)]
pub struct AgentScheduler {
    scheduler: JobScheduler,
    jobs: Arc<Mutex<HashMap<String, Uuid>>>,
    runner: ExecutionRunner,
    store: Store,
    enabled: bool,
}

impl AgentScheduler {
    pub fn new(scheduler: JobScheduler, runner: ExecutionRunner, store: Store, enabled: bool) -> Self {
        Self {
            scheduler,
            jobs: Arc::new(Mutex::new(HashMap::new())),
            runner,
            store,
            enabled,
        }
    }

    /// Bring the job for `agent` in line with its current status and schedule.
    ///
    /// The job map stays locked from removal through re-insertion, so
    /// concurrent syncs of one agent cannot leave an untracked job firing.
    pub async fn sync(&self, agent: &AgentRecord) -> Result<()> {
        let mut jobs = self.jobs.lock().await;
        self.remove_job(&mut jobs, &agent.id).await?;
        if !self.enabled || agent.status != AgentStatus::Active {
            return Ok(());
        }
        let Some(preset) = SchedulePreset::parse(&agent.schedule) else {
            debug!(
                "Agent [{}] schedule '{}' is not a recognized preset",
                agent.name, agent.schedule
            );
            return Ok(());
        };

        let runner = self.runner.clone();
        let store = self.store.clone();
        let owner_id = agent.owner_id.clone();
        let agent_id = agent.id.clone();
        let job = Job::new_async_tz(preset.cron_expression(), Local, move |_uuid, mut _l| {
            let runner = runner.clone();
            let store = store.clone();
            let owner_id = owner_id.clone();
            let agent_id = agent_id.clone();
            Box::pin(async move {
                fire(&runner, &store, &owner_id, &agent_id).await;
            })
        })?;
        let job_id = self.scheduler.add(job).await?;
        jobs.insert(agent.id.clone(), job_id);
        info!(
            "Agent [{}] scheduled: {}",
            agent.name,
            preset.label()
        );
        Ok(())
    }

    pub async fn unschedule(&self, agent_id: &str) -> Result<()> {
        let mut jobs = self.jobs.lock().await;
        self.remove_job(&mut jobs, agent_id).await
    }

    async fn remove_job(&self, jobs: &mut HashMap<String, Uuid>, agent_id: &str) -> Result<()> {
        if let Some(job_id) = jobs.remove(agent_id) {
            self.scheduler.remove(&job_id).await?;
            debug!("Removed cron job {} for agent {}", job_id, agent_id);
        }
        Ok(())
    }

    /// Register every active agent. Individual failures are logged and skipped.
    pub async fn restore(&self) -> Result<usize> {
        let agents = self.store.list_active_agents().await?;
        for agent in &agents {
            if let Err(e) = self.sync(agent).await {
                error!("Failed to schedule agent [{}]: {}", agent.name, e);
            }
        }
        let scheduled = self.scheduled_count().await;
        info!("Restored {} agent schedule(s)", scheduled);
        Ok(scheduled)
    }

    pub async fn scheduled_count(&self) -> usize {
        self.jobs.lock().await.len()
    }
}

/// One scheduled tick: start an execution and move `nextRun` forward.
async fn fire(runner: &ExecutionRunner, store: &Store, owner_id: &str, agent_id: &str) {
    let agent = match store.get_agent(owner_id, agent_id).await {
        Ok(Some(agent)) if agent.status == AgentStatus::Active => agent,
        Ok(_) => {
            debug!("Skipping scheduled run for inactive agent {}", agent_id);
            return;
        }
        Err(e) => {
            error!("Scheduled run for agent {} failed to load: {}", agent_id, e);
            return;
        }
    };
    let next_run = schedule::next_run(&agent.schedule);
    match runner.start_for(agent).await {
        Ok(Some(_)) => {}
        Ok(None) => {
            debug!("Agent {} was archived before its scheduled run started", agent_id);
            return;
        }
        Err(e) => error!("Scheduled run for agent {} failed to start: {}", agent_id, e),
    }
    if let Err(e) = store.set_agent_next_run(agent_id, next_run).await {
        warn!("Failed to refresh next run for agent {}: {}", agent_id, e);
    }
}

#[async_trait::async_trait]
impl LifecycleComponent for AgentScheduler {
    async fn on_recover(&mut self) -> Result<()> {
        if self.enabled {
            self.restore().await?;
        } else {
            info!("Agent scheduler disabled by configuration");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::execution::SimulatedBackend;
    use crate::core::config::ExecutionConfig;
    use crate::core::store::{AgentPatch, sample_agent, test_store};

    async fn scheduler(enabled: bool) -> (Store, AgentScheduler) {
        let store = test_store();
        let backend = Arc::new(SimulatedBackend::new(&ExecutionConfig {
            min_delay_ms: 0,
            max_delay_ms: 0,
            success_rate: 1.0,
            max_concurrent: 2,
        }));
        let runner = ExecutionRunner::new(store.clone(), backend, 2);
        let jobs = JobScheduler::new().await.unwrap();
        (store.clone(), AgentScheduler::new(jobs, runner, store, enabled))
    }

    #[tokio::test]
    async fn only_active_preset_agents_are_scheduled() {
        let (store, scheduler) = scheduler(true).await;
        let active = store.create_agent("user-1", sample_agent("Daily")).await.unwrap();
        scheduler.sync(&active).await.unwrap();
        assert_eq!(scheduler.scheduled_count().await, 1);

        let mut custom = sample_agent("Custom");
        custom.schedule = "0 2 * * *".into();
        let custom = store.create_agent("user-1", custom).await.unwrap();
        scheduler.sync(&custom).await.unwrap();
        assert_eq!(scheduler.scheduled_count().await, 1);

        let paused = store
            .update_agent(
                "user-1",
                &active.id,
                AgentPatch {
                    status: Some(AgentStatus::Inactive),
                    ..Default::default()
                },
            )
            .await
            .unwrap()
            .unwrap();
        scheduler.sync(&paused).await.unwrap();
        assert_eq!(scheduler.scheduled_count().await, 0);
    }

    #[tokio::test]
    async fn resync_replaces_existing_job() {
        let (store, scheduler) = scheduler(true).await;
        let agent = store.create_agent("user-1", sample_agent("Daily")).await.unwrap();
        scheduler.sync(&agent).await.unwrap();
        scheduler.sync(&agent).await.unwrap();
        assert_eq!(scheduler.scheduled_count().await, 1);
        scheduler.unschedule(&agent.id).await.unwrap();
        assert_eq!(scheduler.scheduled_count().await, 0);
    }

    #[tokio::test]
    async fn concurrent_syncs_track_a_single_job() {
        let (store, scheduler) = scheduler(true).await;
        let agent = store.create_agent("user-1", sample_agent("Daily")).await.unwrap();
        let (a, b) = tokio::join!(scheduler.sync(&agent), scheduler.sync(&agent));
        a.unwrap();
        b.unwrap();

        assert_eq!(scheduler.scheduled_count().await, 1);
        scheduler.unschedule(&agent.id).await.unwrap();
        assert_eq!(scheduler.scheduled_count().await, 0);
    }

    #[tokio::test]
    async fn disabled_scheduler_registers_nothing() {
        let (store, scheduler) = scheduler(false).await;
        store.create_agent("user-1", sample_agent("Daily")).await.unwrap();
        assert_eq!(scheduler.restore().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn restore_covers_all_owners() {
        let (store, scheduler) = scheduler(true).await;
        store.create_agent("user-1", sample_agent("A")).await.unwrap();
        store.create_agent("user-2", sample_agent("B")).await.unwrap();
        assert_eq!(scheduler.restore().await.unwrap(), 2);
    }

    #[tokio::test]
    async fn firing_starts_a_run_and_refreshes_next_run() {
        let (store, scheduler) = scheduler(true).await;
        let mut new = sample_agent("Moderator");
        new.schedule = "*/15 * * * *".into();
        let agent = store.create_agent("user-1", new).await.unwrap();
        store.set_agent_next_run(&agent.id, None).await.unwrap();

        fire(&scheduler.runner, &store, "user-1", &agent.id).await;

        let records = store
            .list_executions_for_agent("user-1", &agent.id)
            .await
            .unwrap();
        assert_eq!(records.len(), 1);
        let agent = store.get_agent("user-1", &agent.id).await.unwrap().unwrap();
        assert!(agent.next_run.unwrap() > chrono::Utc::now());
    }

    #[tokio::test]
    async fn firing_skips_archived_agents() {
        let (store, scheduler) = scheduler(true).await;
        let agent = store.create_agent("user-1", sample_agent("Gone")).await.unwrap();
        store.archive_agent("user-1", &agent.id).await.unwrap();
        fire(&scheduler.runner, &store, "user-1", &agent.id).await;
        assert!(store.list_executions("user-1", 10).await.unwrap().is_empty());
    }
}
