//! [`FunctionTool`]: wraps a plain async closure as a
//! [`workflow_core::ToolDescriptor`], grounded in the teacher's
//! `Tool::new(name, description, schema, closure)` pattern (see
//! `langgraph-core/tests/integration_tests.rs`'s calculator/history tools) —
//! most tools are a name, a schema, and a function, not a hand-written
//! struct + trait impl.

use async_trait::async_trait;
use futures::future::BoxFuture;
use serde_json::Value;
use std::fmt;
use std::sync::Arc;
use workflow_core::{ToolDescriptor, ToolError};

type Handler = Arc<dyn Fn(Value) -> BoxFuture<'static, Result<Value, ToolError>> + Send + Sync>;

#[derive(Clone)]
pub struct FunctionTool {
    name: String,
    schema: Value,
    handler: Handler,
}

impl fmt::Debug for FunctionTool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FunctionTool").field("name", &self.name).finish_non_exhaustive()
    }
}

impl FunctionTool {
    pub fn new<F>(name: impl Into<String>, schema: Value, handler: F) -> Self
    where
        F: Fn(Value) -> BoxFuture<'static, Result<Value, ToolError>> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            schema,
            handler: Arc::new(handler),
        }
    }

    /// Wraps `self` in an `Arc` for handing straight to
    /// `AgentExecutor::with_tool`.
    pub fn into_descriptor(self) -> Arc<dyn ToolDescriptor> {
        Arc::new(self)
    }
}

#[async_trait]
impl ToolDescriptor for FunctionTool {
    fn name(&self) -> &str {
        &self.name
    }

    fn schema(&self) -> Value {
        self.schema.clone()
    }

    async fn invoke(&self, arguments: Value) -> Result<Value, ToolError> {
        (self.handler)(arguments).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn invokes_the_wrapped_closure() {
        let tool = FunctionTool::new("double", json!({"type": "object"}), |args| {
            Box::pin(async move {
                let x = args["x"].as_f64().unwrap_or(0.0);
                Ok(json!({ "result": x * 2.0 }))
            })
        });

        let result = tool.invoke(json!({"x": 21})).await.unwrap();
        assert_eq!(result["result"], 42.0);
        assert_eq!(tool.name(), "double");
    }
}
