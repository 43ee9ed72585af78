use crate::core::store::types::ExecutionStatus;
use crate::core::store::{Completion, now_millis, sample_agent, test_store};

#[test]
fn running_moves_only_to_terminal_states() {
    assert!(ExecutionStatus::Running.can_transition_to(ExecutionStatus::Completed));
    assert!(ExecutionStatus::Running.can_transition_to(ExecutionStatus::Failed));
    assert!(!ExecutionStatus::Running.can_transition_to(ExecutionStatus::Running));
}

#[test]
fn terminal_states_are_absorbing() {
    for from in [ExecutionStatus::Completed, ExecutionStatus::Failed] {
        for to in [
            ExecutionStatus::Running,
            ExecutionStatus::Completed,
            ExecutionStatus::Failed,
        ] {
            assert!(
                !from.can_transition_to(to),
                "expected transition {:?} -> {:?} to be rejected",
                from,
                to
            );
        }
    }
}

#[tokio::test]
async fn competing_completions_apply_once() {
    let store = test_store();
    let agent = store.create_agent("user-1", sample_agent("A")).await.unwrap();
    let record = store.create_execution(&agent).await.unwrap().unwrap();

    let a = {
        let store = store.clone();
        let id = record.id.clone();
        tokio::spawn(async move {
            store
                .complete_execution(&id, Completion::Succeeded(serde_json::json!({})), now_millis())
                .await
                .unwrap()
                .is_some()
        })
    };
    let b = {
        let store = store.clone();
        let id = record.id.clone();
        tokio::spawn(async move {
            store
                .complete_execution(&id, Completion::Failed("canceled".into()), now_millis())
                .await
                .unwrap()
                .is_some()
        })
    };
    let (a, b) = (a.await.unwrap(), b.await.unwrap());
    assert!(a ^ b, "exactly one completion must win");

    let stored = store.get_execution("user-1", &record.id).await.unwrap().unwrap();
    assert_eq!(stored.logs.len(), 3);
    assert!(stored.output.is_some() != stored.error.is_some());
}
