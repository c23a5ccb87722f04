//! Renders a built [`Workflow`] as DOT, Mermaid, or ASCII text (SPEC_FULL
//! §10's recovery of the teacher's `visualization` module). Purely
//! descriptive — walks `executor_ids()` and `edge_groups()`, never touches
//! a run's in-flight state.

use crate::edge::EdgeGroup;
use crate::workflow::Workflow;

/// Output format for [`visualize`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VisualizationFormat {
    Dot,
    Mermaid,
    Ascii,
}

#[derive(Debug, Clone)]
pub struct VisualizationOptions {
    pub format: VisualizationFormat,
    pub title: Option<String>,
}

impl Default for VisualizationOptions {
    fn default() -> Self {
        Self {
            format: VisualizationFormat::Dot,
            title: None,
        }
    }
}

impl VisualizationOptions {
    pub fn dot() -> Self {
        Self { format: VisualizationFormat::Dot, ..Default::default() }
    }

    pub fn mermaid() -> Self {
        Self { format: VisualizationFormat::Mermaid, ..Default::default() }
    }

    pub fn ascii() -> Self {
        Self { format: VisualizationFormat::Ascii, ..Default::default() }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }
}

/// Renders `workflow`'s executors and edge groups in the requested format.
pub fn visualize(workflow: &Workflow, options: &VisualizationOptions) -> String {
    match options.format {
        VisualizationFormat::Dot => visualize_dot(workflow, options),
        VisualizationFormat::Mermaid => visualize_mermaid(workflow, options),
        VisualizationFormat::Ascii => visualize_ascii(workflow),
    }
}

/// One rendered edge: `(source, target, label)`. `SwitchCase`'s default arm
/// renders with label `"default"`; `FanIn` renders one edge per declared
/// source with label `"fan_in"`.
fn rendered_edges(groups: &[EdgeGroup]) -> Vec<(String, String, Option<&'static str>)> {
    let mut edges = Vec::new();
    for group in groups {
        match group {
            EdgeGroup::Single { source, target, condition } => {
                edges.push((source.clone(), target.clone(), condition.as_ref().map(|_| "conditional")));
            }
            EdgeGroup::FanOut { source, targets } => {
                for fan_target in targets {
                    edges.push((
                        source.clone(),
                        fan_target.target.clone(),
                        fan_target.condition.as_ref().map(|_| "conditional"),
                    ));
                }
            }
            EdgeGroup::FanIn { sources, target, .. } => {
                for source in sources {
                    edges.push((source.clone(), target.clone(), Some("fan_in")));
                }
            }
            EdgeGroup::SwitchCase { source, cases, default } => {
                for case in cases {
                    edges.push((source.clone(), case.target.clone(), Some("case")));
                }
                edges.push((source.clone(), default.clone(), Some("default")));
            }
        }
    }
    edges
}

fn visualize_dot(workflow: &Workflow, options: &VisualizationOptions) -> String {
    let mut output = String::new();
    output.push_str("digraph G {\n");
    output.push_str("    rankdir=TB;\n");
    output.push_str("    node [shape=box, style=rounded];\n");

    if let Some(title) = &options.title {
        output.push_str("    labelloc=\"t\";\n");
        output.push_str(&format!("    label=\"{}\";\n", escape_dot(title)));
    }

    for id in workflow.executor_ids() {
        let color = if id == workflow.start_executor_id() {
            ", fillcolor=lightgreen, style=\"rounded,filled\""
        } else {
            ""
        };
        output.push_str(&format!("    \"{}\" [label=\"{}\"{}];\n", escape_dot(id), escape_dot(id), color));
    }

    for (source, target, label) in rendered_edges(workflow.edge_groups()) {
        match label {
            Some(label) => output.push_str(&format!(
                "    \"{}\" -> \"{}\" [label=\"{}\", style=dashed];\n",
                escape_dot(&source),
                escape_dot(&target),
                escape_dot(label)
            )),
            None => output.push_str(&format!("    \"{}\" -> \"{}\";\n", escape_dot(&source), escape_dot(&target))),
        }
    }

    output.push_str("}\n");
    output
}

fn visualize_mermaid(workflow: &Workflow, options: &VisualizationOptions) -> String {
    let mut output = String::new();
    output.push_str("graph TD\n");

    if let Some(title) = &options.title {
        output.push_str(&format!("    title[\"{}\"]\n", escape_mermaid(title)));
    }

    for id in workflow.executor_ids() {
        if id == workflow.start_executor_id() {
            output.push_str(&format!("    {}((\"{}\"))\n", sanitize_id(id), escape_mermaid(id)));
            output.push_str(&format!("    style {} fill:#90EE90,stroke:#228B22,stroke-width:3px\n", sanitize_id(id)));
        } else {
            output.push_str(&format!("    {}[\"{}\"]\n", sanitize_id(id), escape_mermaid(id)));
        }
    }

    for (source, target, label) in rendered_edges(workflow.edge_groups()) {
        match label {
            Some(label) => output.push_str(&format!(
                "    {} -.\"{}\"..-> {}\n",
                sanitize_id(&source),
                escape_mermaid(label),
                sanitize_id(&target)
            )),
            None => output.push_str(&format!("    {} --> {}\n", sanitize_id(&source), sanitize_id(&target))),
        }
    }

    output
}

fn visualize_ascii(workflow: &Workflow) -> String {
    let mut output = String::new();
    output.push_str("Workflow Structure:\n");
    output.push_str("===================\n\n");
    output.push_str(&format!("START -> {}\n", workflow.start_executor_id()));

    for id in workflow.executor_ids() {
        output.push_str(&format!("\n[{}]\n", id));
        for (source, target, label) in rendered_edges(workflow.edge_groups()) {
            if source == id {
                match label {
                    Some(label) => output.push_str(&format!("  -> {} [{}]\n", target, label)),
                    None => output.push_str(&format!("  -> {}\n", target)),
                }
            }
        }
    }

    output
}

fn escape_dot(s: &str) -> String {
    s.replace('\\', "\\\\").replace('"', "\\\"").replace('\n', "\\n")
}

fn escape_mermaid(s: &str) -> String {
    s.replace('"', "&quot;").replace('<', "&lt;").replace('>', "&gt;")
}

fn sanitize_id(s: &str) -> String {
    s.replace("__", "").replace(['-', '.', '/'], "_")
}
