//! Scenario A (simple pipeline), Scenario B (fan-out/fan-in), Scenario C
//! (switch/case), plus the routing invariants that don't need a human-in-
//! the-loop or checkpointing: FanIn's all-arrived policy, SwitchCase's
//! exactly-one-delivery guarantee, and the "a message is never delivered in
//! the superstep that produced it" ordering law.

mod common;

use common::{AppendExecutor, FanInSinkExecutor, RelayExecutor, SinkExecutor, TextPayload};
use futures::StreamExt;
use std::sync::Arc;
use workflow_core::{condition, RunOutcome, WorkflowBuilder, WorkflowEvent};

async fn collect_outputs(mut handle: workflow_core::RunHandle) -> (Vec<serde_json::Value>, usize, RunOutcome) {
    let mut outputs = Vec::new();
    let mut superstep_starts = 0;
    while let Some(event) = handle.next().await {
        match event {
            WorkflowEvent::WorkflowOutput { value } => outputs.push(value),
            WorkflowEvent::SuperStepStarted { .. } => superstep_starts += 1,
            _ => {}
        }
    }
    let outcome = handle.join().await.expect("run already awaited");
    (outputs, superstep_starts, outcome)
}

#[tokio::test]
async fn scenario_a_simple_pipeline_runs_start_to_finish() {
    let workflow = WorkflowBuilder::new()
        .register_payload::<TextPayload>()
        .add_executor(Arc::new(AppendExecutor::new("a", "-a")))
        .add_executor(Arc::new(AppendExecutor::new("b", "-b")))
        .add_executor(Arc::new(SinkExecutor::new("c")))
        .add_edge("a", "b")
        .add_edge("b", "c")
        .set_start_executor("a")
        .build()
        .unwrap();

    let handle = workflow.run("run-a", TextPayload::new("x"));
    let (outputs, superstep_starts, outcome) = collect_outputs(handle).await;

    assert_eq!(outputs.len(), 1);
    assert_eq!(outputs[0]["value"], "x-a-b");
    assert!(matches!(outcome, RunOutcome::Completed));
    // One superstep per hop (a, then b, then c) and no more: a message
    // produced during a superstep is never delivered within that same
    // superstep (spec §5 ordering guarantee).
    assert_eq!(superstep_starts, 3);
}

#[tokio::test]
async fn scenario_b_fan_out_then_fan_in_aggregates_every_branch() {
    let workflow = WorkflowBuilder::new()
        .register_payload::<TextPayload>()
        .add_executor(Arc::new(AppendExecutor::new("start", "")))
        .add_executor(Arc::new(AppendExecutor::new("b1", "-b1")))
        .add_executor(Arc::new(AppendExecutor::new("b2", "-b2")))
        .add_executor(Arc::new(FanInSinkExecutor::new("sink")))
        .add_fan_out("start", ["b1", "b2"])
        .add_fan_in::<TextPayload, _, _>(["b1", "b2"], "sink")
        .set_start_executor("start")
        .build()
        .unwrap();

    let handle = workflow.run("run-b", TextPayload::new("x"));
    let (outputs, _starts, outcome) = collect_outputs(handle).await;

    assert!(matches!(outcome, RunOutcome::Completed));
    assert_eq!(outputs.len(), 1);
    let items = outputs[0]["items"].as_array().unwrap();
    assert_eq!(items.len(), 2);
    let values: Vec<&str> = items.iter().map(|v| v["value"].as_str().unwrap()).collect();
    assert!(values.contains(&"x-b1"));
    assert!(values.contains(&"x-b2"));
}

#[tokio::test]
async fn fan_in_never_fires_until_every_declared_source_has_contributed() {
    // b2's branch is always dropped, so "sink" can never see a contribution
    // from every declared source; the run must exhaust max_iterations
    // rather than ever produce output (spec §3's "all-arrived policy").
    let workflow = WorkflowBuilder::new()
        .register_payload::<TextPayload>()
        .add_executor(Arc::new(AppendExecutor::new("start", "")))
        .add_executor(Arc::new(AppendExecutor::new("b1", "-b1")))
        .add_executor(Arc::new(AppendExecutor::new("b2", "-b2")))
        .add_executor(Arc::new(FanInSinkExecutor::new("sink")))
        .add_fan_out_with_conditions(
            "start",
            vec![("b1".to_string(), None), ("b2".to_string(), Some(condition(|_| false)))],
        )
        .add_fan_in::<TextPayload, _, _>(["b1", "b2"], "sink")
        .set_start_executor("start")
        .with_max_iterations(5)
        .build()
        .unwrap();

    let handle = workflow.run("run-b-stuck", TextPayload::new("x"));
    let (outputs, _starts, outcome) = collect_outputs(handle).await;

    assert!(outputs.is_empty());
    match outcome {
        RunOutcome::Failed(message) => assert!(message.contains("max_iterations")),
        other => panic!("expected Failed(MaxIterationsExceeded), got a different outcome ({})", describe(&other)),
    }
}

#[tokio::test]
async fn scenario_c_switch_case_delivers_to_exactly_one_branch() {
    let workflow = WorkflowBuilder::new()
        .register_payload::<TextPayload>()
        .add_executor(Arc::new(AppendExecutor::new("router", "")))
        .add_executor(Arc::new(SinkExecutor::new("even_sink")))
        .add_executor(Arc::new(SinkExecutor::new("odd_sink")))
        .add_switch_case(
            "router",
            vec![(condition(|msg| msg.downcast::<TextPayload>().map(|t| t.value == "even").unwrap_or(false)), "even_sink".to_string())],
            "odd_sink",
        )
        .set_start_executor("router")
        .build()
        .unwrap();

    let even_handle = workflow.run("run-c-even", TextPayload::new("even"));
    let (even_outputs, _, even_outcome) = collect_outputs(even_handle).await;
    assert!(matches!(even_outcome, RunOutcome::Completed));
    assert_eq!(even_outputs.len(), 1);
    assert_eq!(even_outputs[0]["from"], "even_sink");

    let odd_handle = workflow.run("run-c-odd", TextPayload::new("odd"));
    let (odd_outputs, _, odd_outcome) = collect_outputs(odd_handle).await;
    assert!(matches!(odd_outcome, RunOutcome::Completed));
    assert_eq!(odd_outputs.len(), 1);
    assert_eq!(odd_outputs[0]["from"], "odd_sink");
}

#[tokio::test]
async fn a_self_loop_sharing_a_source_with_a_starved_fan_in_hits_the_iteration_cap() {
    // "p" has both a Single self-edge and is one of two declared FanIn
    // sources; since routing a message applies every edge group whose
    // sources match (spec §4.3), a single send_message from "p" both
    // re-triggers "p" forever and perpetually buffers into a FanIn group
    // whose other source ("q") is structurally reachable (so the graph
    // validates) but never actually contributes.
    let workflow = WorkflowBuilder::new()
        .register_payload::<TextPayload>()
        .add_executor(Arc::new(RelayExecutor::new("p")))
        .add_executor(Arc::new(RelayExecutor::new("q")))
        .add_executor(Arc::new(FanInSinkExecutor::new("sink")))
        .add_edge("p", "p")
        .add_conditional_edge("p", "q", condition(|_| false))
        .add_fan_in::<TextPayload, _, _>(["p", "q"], "sink")
        .set_start_executor("p")
        .with_max_iterations(3)
        .build()
        .unwrap();

    let handle = workflow.run("run-perpetual", TextPayload::new("x"));
    let (outputs, _starts, outcome) = collect_outputs(handle).await;

    assert!(outputs.is_empty());
    match outcome {
        RunOutcome::Failed(message) => assert!(message.contains("max_iterations")),
        other => panic!("expected Failed(MaxIterationsExceeded), got a different outcome ({})", describe(&other)),
    }
}

fn describe(outcome: &RunOutcome) -> &'static str {
    match outcome {
        RunOutcome::Completed => "Completed",
        RunOutcome::Failed(_) => "Failed",
        RunOutcome::Cancelled => "Cancelled",
    }
}
