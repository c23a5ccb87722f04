//! [`EdgeGroup`] routing policies and the [`EdgeRunner`] that evaluates them
//! (spec §3 "EdgeGroup variants", §4.3).

use crate::context::RunnerContext;
use crate::message::{Message, PayloadType};
use dashmap::DashMap;
use std::sync::Arc;

/// A boolean predicate over an in-flight message, used by `Single`'s
/// optional condition, `FanOut`'s per-target conditions, and `SwitchCase`'s
/// ordered case conditions (spec §3).
pub type EdgeCondition = Arc<dyn Fn(&Message) -> bool + Send + Sync>;

pub fn condition<F>(f: F) -> EdgeCondition
where
    F: Fn(&Message) -> bool + Send + Sync + 'static,
{
    Arc::new(f)
}

#[derive(Debug, Clone)]
pub struct FanOutTarget {
    pub target: String,
    pub condition: Option<EdgeCondition>,
}

#[derive(Clone)]
pub struct SwitchCaseBranch {
    pub condition: EdgeCondition,
    pub target: String,
}

impl std::fmt::Debug for SwitchCaseBranch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SwitchCaseBranch")
            .field("target", &self.target)
            .finish()
    }
}

impl std::fmt::Debug for FanOutTarget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FanOutTarget")
            .field("target", &self.target)
            .field("conditional", &self.condition.is_some())
            .finish()
    }
}

/// A routing policy connecting one or more source executors to one or more
/// target executors (spec §3 `EdgeGroup`).
#[derive(Clone)]
pub enum EdgeGroup {
    /// One source, one target, optional condition. Conditional single
    /// edges with a failing condition drop the message silently — this is
    /// how skip-branches are expressed (spec §4.3).
    Single {
        source: String,
        target: String,
        condition: Option<EdgeCondition>,
    },
    /// One source, N targets, each evaluated independently. Zero passing
    /// targets drops the message (spec §4.3).
    FanOut { source: String, targets: Vec<FanOutTarget> },
    /// N sources, one target. Fires once per full round of contributions
    /// from every declared source ("all-arrived policy", spec §3).
    /// `item_type` is the declared element type `T` of the target's
    /// `List<T>` input — needed explicitly here because the type-erased
    /// router can't infer it structurally (spec §4.5 validation rule 5).
    FanIn {
        sources: Vec<String>,
        target: String,
        item_type: PayloadType,
    },
    /// One source, ordered cases plus a mandatory default. Exactly one
    /// delivery per input (spec §3).
    SwitchCase {
        source: String,
        cases: Vec<SwitchCaseBranch>,
        default: String,
    },
}

impl std::fmt::Debug for EdgeGroup {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EdgeGroup::Single { source, target, condition } => f
                .debug_struct("Single")
                .field("source", source)
                .field("target", target)
                .field("conditional", &condition.is_some())
                .finish(),
            EdgeGroup::FanOut { source, targets } => f
                .debug_struct("FanOut")
                .field("source", source)
                .field("targets", targets)
                .finish(),
            EdgeGroup::FanIn { sources, target, item_type } => f
                .debug_struct("FanIn")
                .field("sources", sources)
                .field("target", target)
                .field("item_type", item_type)
                .finish(),
            EdgeGroup::SwitchCase { source, cases, default } => f
                .debug_struct("SwitchCase")
                .field("source", source)
                .field("cases", cases)
                .field("default", default)
                .finish(),
        }
    }
}

impl EdgeGroup {
    pub fn kind(&self) -> &'static str {
        match self {
            EdgeGroup::Single { .. } => "single",
            EdgeGroup::FanOut { .. } => "fan_out",
            EdgeGroup::FanIn { .. } => "fan_in",
            EdgeGroup::SwitchCase { .. } => "switch_case",
        }
    }

    /// All source executor ids this group listens on.
    pub fn sources(&self) -> Vec<&str> {
        match self {
            EdgeGroup::Single { source, .. }
            | EdgeGroup::FanOut { source, .. }
            | EdgeGroup::SwitchCase { source, .. } => vec![source.as_str()],
            EdgeGroup::FanIn { sources, .. } => sources.iter().map(String::as_str).collect(),
        }
    }

    /// All target executor ids this group may deliver to.
    pub fn targets(&self) -> Vec<&str> {
        match self {
            EdgeGroup::Single { target, .. } => vec![target.as_str()],
            EdgeGroup::FanOut { targets, .. } => targets.iter().map(|t| t.target.as_str()).collect(),
            EdgeGroup::FanIn { target, .. } => vec![target.as_str()],
            EdgeGroup::SwitchCase { cases, default, .. } => {
                let mut targets: Vec<&str> = cases.iter().map(|c| c.target.as_str()).collect();
                targets.push(default.as_str());
                targets
            }
        }
    }

    /// Individual `(source, target, kind)` triples, the unit
    /// `EdgeDuplicationError` dedup operates on (spec §3).
    pub fn flattened_pairs(&self) -> Vec<(String, String)> {
        self.sources()
            .into_iter()
            .flat_map(|s| self.targets().into_iter().map(move |t| (s.to_string(), t.to_string())))
            .collect()
    }
}

/// A fan-in group's accumulating per-source buffer. Spec §3 leaves "more
/// messages arriving for a source that already contributed" as an open
/// question; this port buffers each source as a list and flattens all
/// contributions (in declared source order) into the aggregate on fire,
/// rather than dropping extras — see DESIGN.md.
#[derive(Default)]
struct FanInBuffer {
    per_source: DashMap<String, Vec<Message>>,
}

/// The `List<T>` payload a `FanIn` group delivers to its target. Items are
/// stored as JSON because the concrete `T` isn't known to the type-erased
/// router; the target handler deserializes `items` back into its declared
/// element type.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct FanInBatch {
    pub items: Vec<serde_json::Value>,
    pub item_type: PayloadType,
}

impl crate::message::Payload for FanInBatch {
    const TYPE_TAG: &'static str = "__workflow_core_fan_in_batch__";
}

/// Evaluates [`EdgeGroup`] routing policies for messages emitted from a
/// source executor and delivers the results into a [`RunnerContext`]'s
/// inbox (spec §4.3).
pub struct EdgeRunner {
    groups: Vec<EdgeGroup>,
    fan_in_buffers: DashMap<usize, FanInBuffer>,
}

impl EdgeRunner {
    pub fn new(groups: Vec<EdgeGroup>) -> Self {
        Self {
            groups,
            fan_in_buffers: DashMap::new(),
        }
    }

    pub fn groups(&self) -> &[EdgeGroup] {
        &self.groups
    }

    /// Returns true iff at least one edge group would accept a message
    /// from `source` addressed directly to `target` (spec §4.6
    /// `SendMessage`'s "explicit target bypasses routing and delivers
    /// directly iff an edge to that target exists").
    pub fn has_direct_edge(&self, source: &str, target: &str) -> bool {
        self.groups
            .iter()
            .any(|g| g.sources().contains(&source) && g.targets().contains(&target))
    }

    /// Routes `message` through every edge group sourced at
    /// `message.source_executor_id`, delivering to `runner_ctx`'s inbox.
    pub fn route(&self, message: Message, runner_ctx: &RunnerContext) {
        for (index, group) in self.groups.iter().enumerate() {
            if !group.sources().contains(&message.source_executor_id.as_str()) {
                continue;
            }
            self.route_one(index, group, &message, runner_ctx);
        }
    }

    /// Delivers `message` directly to `target`, bypassing policy
    /// evaluation, provided some edge group connects the two (spec §4.6).
    pub fn route_direct(&self, message: Message, target: &str, runner_ctx: &RunnerContext) {
        if self.has_direct_edge(&message.source_executor_id, target) {
            runner_ctx.enqueue(message.retarget(target));
        }
    }

    fn route_one(&self, group_index: usize, group: &EdgeGroup, message: &Message, runner_ctx: &RunnerContext) {
        match group {
            EdgeGroup::Single { target, condition, .. } => {
                if condition.as_ref().map(|c| c(message)).unwrap_or(true) {
                    runner_ctx.enqueue(message.retarget(target));
                }
            }
            EdgeGroup::FanOut { targets, .. } => {
                for fan_target in targets {
                    let passes = fan_target.condition.as_ref().map(|c| c(message)).unwrap_or(true);
                    if passes {
                        runner_ctx.enqueue(message.retarget(&fan_target.target));
                    }
                }
            }
            EdgeGroup::SwitchCase { cases, default, .. } => {
                let winner = cases
                    .iter()
                    .find(|case| (case.condition)(message))
                    .map(|case| case.target.as_str())
                    .unwrap_or(default.as_str());
                runner_ctx.enqueue(message.retarget(winner));
            }
            EdgeGroup::FanIn { sources, target, item_type } => {
                self.buffer_fan_in(group_index, sources, target, item_type, message, runner_ctx);
            }
        }
    }

    fn buffer_fan_in(
        &self,
        group_index: usize,
        sources: &[String],
        target: &str,
        item_type: &PayloadType,
        message: &Message,
        runner_ctx: &RunnerContext,
    ) {
        let buffer = self.fan_in_buffers.entry(group_index).or_default();
        buffer
            .per_source
            .entry(message.source_executor_id.clone())
            .or_default()
            .push(message.clone());

        let all_arrived = sources.iter().all(|s| buffer.per_source.contains_key(s));
        if !all_arrived {
            return;
        }

        let mut items = Vec::new();
        for source in sources {
            if let Some((_, contributions)) = buffer.per_source.remove(source) {
                for contribution in contributions {
                    items.push(contribution.payload.to_json());
                }
            }
        }

        let batch = FanInBatch {
            items,
            item_type: item_type.clone(),
        };
        let aggregated = Message::new(
            sources.first().cloned().unwrap_or_default(),
            batch,
            message.trace_ctx.clone(),
        )
        .with_target(target);
        runner_ctx.enqueue(aggregated);
    }
}
