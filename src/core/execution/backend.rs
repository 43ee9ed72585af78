use async_trait::async_trait;
use rand::Rng;
use std::time::Duration;

use crate::core::config::ExecutionConfig;
use crate::core::store::Completion;
use crate::core::store::types::AgentRecord;

pub const SIMULATED_ERROR: &str = "Simulated execution error";
pub const SIMULATED_RESULT: &str = "Agent workflow executed successfully";

/// Performs the work of one execution. Implementations must not touch the
/// store; the runner owns the record.
#[async_trait]
pub trait ExecutionBackend: Send + Sync {
    async fn execute(&self, agent: &AgentRecord) -> Completion;
}

/// Stand-in for real model calls: sleeps, then draws pass/fail once.
pub struct SimulatedBackend {
    min_delay: Duration,
    max_delay: Duration,
    success_rate: f64,
}

impl SimulatedBackend {
    pub fn new(config: &ExecutionConfig) -> Self {
        let (min_delay, max_delay) = config.delay_range();
        Self {
            min_delay,
            max_delay,
            success_rate: config.success_rate,
        }
    }

    fn draw(&self) -> (Duration, Completion) {
        let mut rng = rand::thread_rng();
        let delay_ms = rng.gen_range(self.min_delay.as_millis()..=self.max_delay.as_millis());
        let delay = Duration::from_millis(delay_ms as u64);
        if rng.gen_bool(self.success_rate) {
            let output = serde_json::json!({
                "tasksCompleted": rng.gen_range(1..=5),
                "dataProcessed": format!("{} records", rng.gen_range(100..=1099)),
                "result": SIMULATED_RESULT,
            });
            (delay, Completion::Succeeded(output))
        } else {
            (delay, Completion::Failed(SIMULATED_ERROR.to_string()))
        }
    }
}

#[async_trait]
impl ExecutionBackend for SimulatedBackend {
    async fn execute(&self, agent: &AgentRecord) -> Completion {
        // ThreadRng is not Send, so every draw happens before the await.
        let (delay, completion) = self.draw();
        tracing::debug!(
            "Simulating agent [{}] for {} ms",
            agent.name,
            delay.as_millis()
        );
        tokio::time::sleep(delay).await;
        completion
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn backend(success_rate: f64) -> SimulatedBackend {
        SimulatedBackend::new(&ExecutionConfig {
            min_delay_ms: 0,
            max_delay_ms: 0,
            success_rate,
            max_concurrent: 1,
        })
    }

    #[test]
    fn success_output_stays_in_range() {
        let backend = backend(1.0);
        for _ in 0..200 {
            let (delay, completion) = backend.draw();
            assert_eq!(delay, Duration::ZERO);
            let Completion::Succeeded(output) = completion else {
                panic!("success_rate 1.0 must always succeed");
            };
            let tasks = output["tasksCompleted"].as_u64().unwrap();
            assert!((1..=5).contains(&tasks));
            let processed = output["dataProcessed"].as_str().unwrap();
            let count: u32 = processed.strip_suffix(" records").unwrap().parse().unwrap();
            assert!((100..=1099).contains(&count));
            assert_eq!(output["result"], SIMULATED_RESULT);
        }
    }

    #[test]
    fn zero_success_rate_always_fails() {
        let backend = backend(0.0);
        for _ in 0..50 {
            let (_, completion) = backend.draw();
            assert!(matches!(completion, Completion::Failed(ref e) if e == SIMULATED_ERROR));
        }
    }

    #[test]
    fn delay_is_drawn_from_configured_range() {
        let backend = SimulatedBackend::new(&ExecutionConfig {
            min_delay_ms: 2000,
            max_delay_ms: 7000,
            success_rate: 0.9,
            max_concurrent: 1,
        });
        for _ in 0..200 {
            let (delay, _) = backend.draw();
            assert!(delay >= Duration::from_millis(2000));
            assert!(delay <= Duration::from_millis(7000));
        }
    }
}
