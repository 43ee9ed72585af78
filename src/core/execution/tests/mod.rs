mod state_machine;

use async_trait::async_trait;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use crate::core::execution::{ExecutionBackend, ExecutionRunner};
use crate::core::store::types::{AgentRecord, ExecutionRecord};
use crate::core::store::{Completion, Store, sample_agent, test_store};

/// Returns a fixed completion after a short delay.
pub(super) struct FixedBackend {
    pub completion: Completion,
    pub delay: Duration,
}

#[async_trait]
impl ExecutionBackend for FixedBackend {
    async fn execute(&self, _agent: &AgentRecord) -> Completion {
        tokio::time::sleep(self.delay).await;
        self.completion.clone()
    }
}

/// Never finishes on its own.
pub(super) struct StuckBackend;

#[async_trait]
impl ExecutionBackend for StuckBackend {
    async fn execute(&self, _agent: &AgentRecord) -> Completion {
        std::future::pending().await
    }
}

/// Records the highest number of overlapping calls.
#[derive(Default)]
pub(super) struct CountingBackend {
    pub active: AtomicUsize,
    pub peak: AtomicUsize,
}

#[async_trait]
impl ExecutionBackend for CountingBackend {
    async fn execute(&self, _agent: &AgentRecord) -> Completion {
        let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(30)).await;
        self.active.fetch_sub(1, Ordering::SeqCst);
        Completion::Succeeded(serde_json::json!({"tasksCompleted": 1}))
    }
}

pub(super) fn succeeding() -> Arc<dyn ExecutionBackend> {
    Arc::new(FixedBackend {
        completion: Completion::Succeeded(serde_json::json!({
            "tasksCompleted": 2,
            "dataProcessed": "512 records",
            "result": "Agent workflow executed successfully"
        })),
        delay: Duration::from_millis(20),
    })
}

pub(super) fn failing() -> Arc<dyn ExecutionBackend> {
    Arc::new(FixedBackend {
        completion: Completion::Failed("Simulated execution error".into()),
        delay: Duration::from_millis(20),
    })
}

pub(super) async fn runner_with(
    backend: Arc<dyn ExecutionBackend>,
    max_concurrent: usize,
) -> (Store, ExecutionRunner, AgentRecord) {
    let store = test_store();
    let agent = store
        .create_agent("user-1", sample_agent("Daily Report Generator"))
        .await
        .unwrap();
    let runner = ExecutionRunner::new(store.clone(), backend, max_concurrent);
    (store, runner, agent)
}

pub(super) async fn wait_for_terminal(store: &Store, owner: &str, id: &str) -> ExecutionRecord {
    for _ in 0..300 {
        let record = store.get_execution(owner, id).await.unwrap().unwrap();
        if record.status.is_terminal() {
            return record;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("execution {} never reached a terminal state", id);
}
