//! Scenario D (request/response human-in-the-loop interrupt) and Scenario E
//! (checkpoint + resume), plus the "Restore(Save(state)) == state" and
//! "CheckpointStore.Load(Save(c)) == c" round-trip laws that back them.

mod common;

use common::{AppendExecutor, ApprovalGateExecutor, ApprovalRequest, ApprovalResponse, CounterExecutor, SinkExecutor, TextPayload};
use futures::StreamExt;
use std::sync::Arc;
use workflow_checkpoint::{CheckpointStore, InMemoryCheckpointStore};
use workflow_core::{Executor, RunOutcome, WorkflowBuilder, WorkflowEvent};

#[tokio::test]
async fn scenario_d_request_info_pauses_until_a_response_is_injected() {
    let workflow = WorkflowBuilder::new()
        .register_payload::<TextPayload>()
        .add_executor(Arc::new(ApprovalGateExecutor::new("gate")))
        .set_start_executor("gate")
        .build()
        .unwrap();

    let mut handle = workflow.run("run-d", TextPayload::new("ship it"));

    let mut request_id = None;
    while let Some(event) = handle.next().await {
        if let WorkflowEvent::RequestInfo { request_id: id, response_type, .. } = event {
            assert_eq!(response_type, "support_approval_response");
            request_id = Some(id);
            break;
        }
    }
    let request_id = request_id.expect("gate must emit a RequestInfo event before pausing");

    handle.send_response(&request_id, ApprovalResponse { approved: true }).unwrap();

    let mut outputs = Vec::new();
    while let Some(event) = handle.next().await {
        if let WorkflowEvent::WorkflowOutput { value } = event {
            outputs.push(value);
        }
    }
    assert!(matches!(handle.join().await.unwrap(), RunOutcome::Completed));
    assert_eq!(outputs.len(), 1);
    assert_eq!(outputs[0]["approved"], true);
}

#[tokio::test]
async fn an_already_answered_request_cannot_be_answered_twice() {
    let workflow = WorkflowBuilder::new()
        .register_payload::<TextPayload>()
        .add_executor(Arc::new(ApprovalGateExecutor::new("gate")))
        .set_start_executor("gate")
        .build()
        .unwrap();

    let mut handle = workflow.run("run-d-dup", TextPayload::new("ship it"));
    let mut request_id = None;
    while let Some(event) = handle.next().await {
        if let WorkflowEvent::RequestInfo { request_id: id, .. } = event {
            request_id = Some(id);
            break;
        }
    }
    let request_id = request_id.unwrap();

    assert!(handle.send_response(&request_id, ApprovalResponse { approved: true }).is_ok());
    assert!(handle.send_response(&request_id, ApprovalResponse { approved: false }).is_err());

    while handle.next().await.is_some() {}
    handle.join().await;
}

/// A checkpoint taken while a `RequestInfo` is outstanding must survive
/// resume: the prompt's own payload type is stored separately from the
/// expected response type (spec §3 `RequestInfoEntry`), so restoring a
/// checkpoint doesn't drop the pending request and silently let the run
/// complete without ever awaiting the human response (spec §8 checkpoint-
/// resume-equivalence invariant).
#[tokio::test]
async fn checkpointing_while_a_request_info_is_outstanding_survives_resume() {
    let store: Arc<dyn CheckpointStore> = Arc::new(InMemoryCheckpointStore::new());

    let build = || {
        WorkflowBuilder::new()
            .register_payload::<TextPayload>()
            .register_payload::<ApprovalRequest>()
            .register_payload::<ApprovalResponse>()
            .add_executor(Arc::new(ApprovalGateExecutor::new("gate")))
            .set_start_executor("gate")
            .with_checkpointing(Arc::clone(&store))
            .build()
            .unwrap()
    };

    let workflow = build();
    let mut handle = workflow.run("run-d-checkpoint", TextPayload::new("ship it"));

    let mut request_id = None;
    while let Some(event) = handle.next().await {
        if let WorkflowEvent::RequestInfo { request_id: id, .. } = event {
            request_id = Some(id);
            break;
        }
    }
    let request_id = request_id.expect("gate must emit a RequestInfo event before pausing");
    handle.cancel();
    while handle.next().await.is_some() {}
    handle.join().await;

    // Resume a fresh workflow instance from the latest checkpoint: the
    // pending request must have survived the round trip so the response
    // can still be routed to `gate`'s response_handler.
    let checkpoint_ids = store.list("run-d-checkpoint").await.unwrap();
    let latest = checkpoint_ids.last().expect("a checkpoint should have been recorded while the request was pending");

    let resumable = build();
    let mut resumed = resumable.resume("run-d-checkpoint", Some(latest.as_str())).await.unwrap();
    resumed.send_response(&request_id, ApprovalResponse { approved: true }).unwrap();

    let mut outputs = Vec::new();
    while let Some(event) = resumed.next().await {
        if let WorkflowEvent::WorkflowOutput { value } = event {
            outputs.push(value);
        }
    }
    assert!(matches!(resumed.join().await.unwrap(), RunOutcome::Completed));
    assert_eq!(outputs.len(), 1);
    assert_eq!(outputs[0]["approved"], true);
}

#[tokio::test]
async fn scenario_e_resuming_from_an_earlier_checkpoint_replays_to_the_same_output() {
    let store: Arc<dyn CheckpointStore> = Arc::new(InMemoryCheckpointStore::new());

    let build = || {
        WorkflowBuilder::new()
            .register_payload::<TextPayload>()
            .add_executor(Arc::new(AppendExecutor::new("a", "-a")))
            .add_executor(Arc::new(CounterExecutor::new("b")))
            .add_executor(Arc::new(SinkExecutor::new("c")))
            .add_edge("a", "b")
            .add_edge("b", "c")
            .set_start_executor("a")
            .with_checkpointing(Arc::clone(&store))
            .build()
            .unwrap()
    };

    let workflow = build();
    let handle = workflow.run("run-e", TextPayload::new("x"));
    let (first_outputs, first_outcome) = drain(handle).await;
    assert!(matches!(first_outcome, RunOutcome::Completed));
    assert_eq!(first_outputs.len(), 1);
    assert_eq!(first_outputs[0]["value"], "x-a");

    // Resume from the earliest recorded checkpoint under the same run id and
    // confirm it replays to the same terminal output rather than diverging.
    let checkpoint_ids = store.list("run-e").await.unwrap();
    let earliest = checkpoint_ids.first().expect("at least one checkpoint should have been recorded");

    let resumable = build();
    let handle = resumable.resume("run-e", Some(earliest.as_str())).await.unwrap();
    let (resumed_outputs, resumed_outcome) = drain(handle).await;
    assert!(matches!(resumed_outcome, RunOutcome::Completed));
    assert_eq!(resumed_outputs.len(), 1);
    assert_eq!(resumed_outputs[0]["value"], "x-a");
}

#[tokio::test]
async fn checkpoint_store_load_of_save_returns_the_same_checkpoint() {
    let store = InMemoryCheckpointStore::new();
    let checkpoint = workflow_checkpoint::WorkflowCheckpoint::new("run-roundtrip", 4);
    let id = store.save(checkpoint.clone()).await.unwrap();

    let loaded = store.load("run-roundtrip", Some(&id)).await.unwrap();
    assert_eq!(loaded, checkpoint);
}

#[test]
fn executor_restore_of_save_reproduces_the_same_counter_state() {
    let bytes = 7u64.to_le_bytes().to_vec();

    let executor = CounterExecutor::new("b");
    executor.restore_state(&bytes).unwrap();
    assert_eq!(executor.count(), 7);
    assert_eq!(executor.save_state().unwrap(), bytes);
}

async fn drain(mut handle: workflow_core::RunHandle) -> (Vec<serde_json::Value>, RunOutcome) {
    let mut outputs = Vec::new();
    while let Some(event) = handle.next().await {
        if let WorkflowEvent::WorkflowOutput { value } = event {
            outputs.push(value);
        }
    }
    let outcome = handle.join().await.expect("run already awaited");
    (outputs, outcome)
}
