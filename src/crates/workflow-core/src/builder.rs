//! [`WorkflowBuilder`]: the only path to a [`crate::workflow::Workflow`]
//! (spec §4.5). Fluent, `&mut self`-returning API, grounded in the
//! teacher's `StateGraph` builder (`builder.rs`) — register executors and
//! edges, then `build()` runs the validator exactly once.

use crate::edge::{EdgeCondition, EdgeGroup, FanInBatch, FanOutTarget, SwitchCaseBranch};
use crate::error::{Result, WorkflowError};
use crate::executor::Executor;
use crate::message::Payload;
use crate::observer::Observer;
use crate::registry::PayloadRegistry;
use crate::workflow::{RunnerConfig, Workflow};
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;
use workflow_checkpoint::CheckpointStore;

/// Default superstep cap (spec §4.4, §6).
pub const DEFAULT_MAX_ITERATIONS: u64 = 100;

#[derive(Default)]
pub struct WorkflowBuilder {
    start_executor_id: Option<String>,
    executors: HashMap<String, Arc<dyn Executor>>,
    duplicate_executor_ids: Vec<String>,
    edge_groups: Vec<EdgeGroup>,
    checkpoint_store: Option<Arc<dyn CheckpointStore>>,
    max_iterations: Option<u64>,
    observer: Option<Arc<dyn Observer>>,
    payload_registry: PayloadRegistry,
}

impl WorkflowBuilder {
    pub fn new() -> Self {
        let mut builder = Self::default();
        builder.payload_registry.register::<FanInBatch>();
        builder
    }

    /// Makes `T` reconstructible from a checkpoint's JSON (spec §4.9
    /// resume). Required for every concrete `Payload` type that can appear
    /// in `pending_messages` or a `RequestInfo` prompt/response; `add_fan_in`
    /// registers its own element type automatically.
    pub fn register_payload<T: Payload>(mut self) -> Self {
        self.payload_registry.register::<T>();
        self
    }

    /// Registers an executor by its own `id()`. Not named explicitly in
    /// spec §4.5's API list but implied by `Workflow`'s `executors:
    /// map<id,Executor>` field — every id an edge references must resolve
    /// to something registered here.
    pub fn add_executor(mut self, executor: Arc<dyn Executor>) -> Self {
        let id = executor.id().to_string();
        if self.executors.insert(id.clone(), executor).is_some() {
            self.duplicate_executor_ids.push(id);
        }
        self
    }

    pub fn set_start_executor(mut self, id: impl Into<String>) -> Self {
        self.start_executor_id = Some(id.into());
        self
    }

    /// `AddEdge(src, dst, condition?)` — a single edge (spec §4.5).
    pub fn add_edge(mut self, source: impl Into<String>, target: impl Into<String>) -> Self {
        self.edge_groups.push(EdgeGroup::Single {
            source: source.into(),
            target: target.into(),
            condition: None,
        });
        self
    }

    pub fn add_conditional_edge(
        mut self,
        source: impl Into<String>,
        target: impl Into<String>,
        condition: EdgeCondition,
    ) -> Self {
        self.edge_groups.push(EdgeGroup::Single {
            source: source.into(),
            target: target.into(),
            condition: Some(condition),
        });
        self
    }

    /// `AddFanOut(src, dsts)` — one source, N unconditional targets.
    pub fn add_fan_out<I, S>(mut self, source: impl Into<String>, targets: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.edge_groups.push(EdgeGroup::FanOut {
            source: source.into(),
            targets: targets
                .into_iter()
                .map(|t| FanOutTarget {
                    target: t.into(),
                    condition: None,
                })
                .collect(),
        });
        self
    }

    /// Variant of `add_fan_out` letting each target carry its own
    /// condition (spec §4.3: "each target independently evaluated").
    pub fn add_fan_out_with_conditions(
        mut self,
        source: impl Into<String>,
        targets: Vec<(String, Option<EdgeCondition>)>,
    ) -> Self {
        self.edge_groups.push(EdgeGroup::FanOut {
            source: source.into(),
            targets: targets
                .into_iter()
                .map(|(target, condition)| FanOutTarget { target, condition })
                .collect(),
        });
        self
    }

    /// `AddFanIn(srcs, dst)` — `T` is the declared element type of the
    /// target's `List<T>` input (see `EdgeGroup::FanIn`'s docs). Registers
    /// `T` with the payload registry so a checkpointed batch can be
    /// rehydrated on resume.
    pub fn add_fan_in<T, I, S>(mut self, sources: I, target: impl Into<String>) -> Self
    where
        T: Payload,
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.payload_registry.register::<T>();
        self.edge_groups.push(EdgeGroup::FanIn {
            sources: sources.into_iter().map(Into::into).collect(),
            target: target.into(),
            item_type: T::payload_type(),
        });
        self
    }

    /// `AddSwitchCase(src, cases, default)` — ordered `(condition, target)`
    /// pairs plus a mandatory default (spec §4.5 rule 6).
    pub fn add_switch_case(
        mut self,
        source: impl Into<String>,
        cases: Vec<(EdgeCondition, String)>,
        default: impl Into<String>,
    ) -> Self {
        self.edge_groups.push(EdgeGroup::SwitchCase {
            source: source.into(),
            cases: cases
                .into_iter()
                .map(|(condition, target)| SwitchCaseBranch { condition, target })
                .collect(),
            default: default.into(),
        });
        self
    }

    pub fn with_checkpointing(mut self, store: Arc<dyn CheckpointStore>) -> Self {
        self.checkpoint_store = Some(store);
        self
    }

    pub fn with_max_iterations(mut self, max_iterations: u64) -> Self {
        self.max_iterations = Some(max_iterations);
        self
    }

    pub fn with_observer(mut self, observer: Arc<dyn Observer>) -> Self {
        self.observer = Some(observer);
        self
    }

    /// Runs the validator (spec §4.5) and, on success, produces an
    /// immutable [`Workflow`].
    pub fn build(self) -> Result<Workflow> {
        if let Some(id) = self.duplicate_executor_ids.first() {
            return Err(WorkflowError::DuplicateExecutor(id.clone()));
        }

        let start_executor_id = self.start_executor_id.clone().ok_or(WorkflowError::MissingStartExecutor)?;
        if !self.executors.contains_key(&start_executor_id) {
            return Err(WorkflowError::UnknownStartExecutor(start_executor_id));
        }

        self.validate_edge_targets()?;
        self.validate_no_duplicate_edges()?;
        self.validate_reachability(&start_executor_id)?;
        self.validate_type_compatibility()?;
        self.validate_fan_in_targets()?;
        self.validate_switch_cases()?;

        Ok(Workflow::new(
            start_executor_id,
            self.executors,
            self.edge_groups,
            RunnerConfig {
                max_iterations: self.max_iterations.unwrap_or(DEFAULT_MAX_ITERATIONS),
                checkpoint_store: self.checkpoint_store,
                observer: self.observer,
                payload_registry: Arc::new(self.payload_registry),
            },
        ))
    }

    fn validate_edge_targets(&self) -> Result<()> {
        for group in &self.edge_groups {
            for id in group.sources().into_iter().chain(group.targets()) {
                if !self.executors.contains_key(id) {
                    return Err(WorkflowError::UnknownExecutor(id.to_string()));
                }
            }
        }
        Ok(())
    }

    /// Rule 4: no two edge groups share an identical `(source, target,
    /// kind)` triple.
    fn validate_no_duplicate_edges(&self) -> Result<()> {
        let mut seen: HashSet<(String, String, &'static str)> = HashSet::new();
        for group in &self.edge_groups {
            for (source, target) in group.flattened_pairs() {
                let key = (source.clone(), target.clone(), group.kind());
                if !seen.insert(key) {
                    return Err(WorkflowError::EdgeDuplication {
                        source,
                        target,
                        kind: group.kind().to_string(),
                    });
                }
            }
        }
        Ok(())
    }

    /// Rule 2: every non-start executor must be reachable via BFS from the
    /// start executor.
    fn validate_reachability(&self, start_executor_id: &str) -> Result<()> {
        let mut adjacency: HashMap<&str, Vec<&str>> = HashMap::new();
        for group in &self.edge_groups {
            for source in group.sources() {
                adjacency.entry(source).or_default().extend(group.targets());
            }
        }

        let mut visited: HashSet<&str> = HashSet::new();
        let mut queue = VecDeque::new();
        visited.insert(start_executor_id);
        queue.push_back(start_executor_id);

        while let Some(node) = queue.pop_front() {
            if let Some(neighbors) = adjacency.get(node) {
                for &neighbor in neighbors {
                    if visited.insert(neighbor) {
                        queue.push_back(neighbor);
                    }
                }
            }
        }

        let unreachable: Vec<String> = self
            .executors
            .keys()
            .filter(|id| !visited.contains(id.as_str()))
            .cloned()
            .collect();

        if unreachable.is_empty() {
            Ok(())
        } else {
            Err(WorkflowError::GraphConnectivity(unreachable))
        }
    }

    /// Rule 3: a group's source output types must include at least one
    /// type assignable (here: tag-equal) to the target's declared input.
    fn validate_type_compatibility(&self) -> Result<()> {
        for group in &self.edge_groups {
            if let EdgeGroup::FanIn { .. } = group {
                // Checked separately by validate_fan_in_targets, which
                // compares against the declared item_type rather than the
                // FanInBatch marker type every source nominally "outputs".
                continue;
            }
            for source_id in group.sources() {
                let source = self
                    .executors
                    .get(source_id)
                    .ok_or_else(|| WorkflowError::UnknownExecutor(source_id.to_string()))?;
                let output_types = source.output_types();
                for target_id in group.targets() {
                    let target = self
                        .executors
                        .get(target_id)
                        .ok_or_else(|| WorkflowError::UnknownExecutor(target_id.to_string()))?;
                    let input_types = target.input_types();
                    let compatible = output_types.iter().any(|t| input_types.contains(t));
                    if !compatible {
                        return Err(WorkflowError::TypeCompatibility {
                            source: source_id.to_string(),
                            target: target_id.to_string(),
                            output_types: output_types.iter().map(|t| t.to_string()).collect(),
                            input_types: input_types.iter().map(|t| t.to_string()).collect(),
                        });
                    }
                }
            }
        }
        Ok(())
    }

    /// Rule 5: FanIn targets must declare `FanInBatch` as an input type,
    /// and every declared source's output types must include the group's
    /// `item_type`.
    fn validate_fan_in_targets(&self) -> Result<()> {
        for group in &self.edge_groups {
            let EdgeGroup::FanIn { sources, target, item_type } = group else {
                continue;
            };
            if sources.is_empty() {
                return Err(WorkflowError::EmptyFanInSources(target.clone()));
            }
            let target_executor = self
                .executors
                .get(target)
                .ok_or_else(|| WorkflowError::UnknownExecutor(target.clone()))?;
            if !target_executor.input_types().contains(&FanInBatch::payload_type()) {
                return Err(WorkflowError::FanInTargetNotList { target: target.clone() });
            }
            for source_id in sources {
                let source = self
                    .executors
                    .get(source_id)
                    .ok_or_else(|| WorkflowError::UnknownExecutor(source_id.clone()))?;
                if !source.output_types().contains(item_type) {
                    return Err(WorkflowError::TypeCompatibility {
                        source: source_id.clone(),
                        target: target.clone(),
                        output_types: source.output_types().iter().map(|t| t.to_string()).collect(),
                        input_types: vec![item_type.to_string()],
                    });
                }
            }
        }
        Ok(())
    }

    /// Rule 6: SwitchCase must declare at least one case (Default is
    /// structurally mandatory via `EdgeGroup::SwitchCase::default`).
    fn validate_switch_cases(&self) -> Result<()> {
        for group in &self.edge_groups {
            if let EdgeGroup::SwitchCase { source, cases, .. } = group {
                if cases.is_empty() {
                    return Err(WorkflowError::EmptySwitchCases(source.clone()));
                }
            }
        }
        Ok(())
    }
}
