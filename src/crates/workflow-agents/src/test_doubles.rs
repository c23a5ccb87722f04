//! Deterministic [`ChatClient`] test doubles, grounded in the teacher's own
//! test-double pattern for `ChatClient`-shaped traits (`react.rs`'s mock LLM
//! functions keyed off an `AtomicUsize` call counter). These are the
//! fixtures the ReAct-loop tests in this crate use in place of a real
//! OpenAI/Azure client, which remains an integration left to the calling
//! application (spec §1).

use async_trait::async_trait;
use serde_json::Value;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use workflow_core::{ChatClient, ChatClientError, ChatCompletion, ChatMessage};

/// Always answers with a fixed assistant message, ignoring the conversation
/// entirely. Useful for Scenario-style tests that only care that an
/// `AgentExecutor` round-trips a response without tool calls.
#[derive(Debug, Clone)]
pub struct EchoChatClient {
    response: String,
}

impl EchoChatClient {
    pub fn new(response: impl Into<String>) -> Self {
        Self { response: response.into() }
    }

    /// Echoes back the content of the last message in the conversation
    /// instead of a fixed string.
    pub fn echoing_last_message() -> Self {
        Self { response: String::new() }
    }
}

#[async_trait]
impl ChatClient for EchoChatClient {
    async fn complete(&self, messages: &[ChatMessage], _tool_schemas: &[Value]) -> Result<ChatCompletion, ChatClientError> {
        let content = if self.response.is_empty() {
            messages.last().map(|m| m.content.clone()).unwrap_or_default()
        } else {
            self.response.clone()
        };
        Ok(ChatCompletion { message: ChatMessage::assistant(content) })
    }
}

/// Replays a fixed sequence of [`ChatMessage`] responses, one per call,
/// tracking `call_count` so a test can assert exactly how many model
/// round-trips a tool loop made (mirrors the teacher's `call_count:
/// Arc<AtomicUsize>` mock-LLM pattern in `agents/react.rs`'s tests).
pub struct ScriptedChatClient {
    script: Mutex<Vec<ChatMessage>>,
    call_count: AtomicUsize,
}

impl ScriptedChatClient {
    pub fn new(script: Vec<ChatMessage>) -> Self {
        Self {
            script: Mutex::new(script),
            call_count: AtomicUsize::new(0),
        }
    }

    pub fn call_count(&self) -> usize {
        self.call_count.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ChatClient for ScriptedChatClient {
    async fn complete(&self, _messages: &[ChatMessage], _tool_schemas: &[Value]) -> Result<ChatCompletion, ChatClientError> {
        let index = self.call_count.fetch_add(1, Ordering::SeqCst);
        let script = self.script.lock().unwrap();
        match script.get(index) {
            Some(message) => Ok(ChatCompletion { message: message.clone() }),
            None => Err(ChatClientError(format!(
                "scripted chat client exhausted its script after {} call(s)",
                index + 1
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn echo_returns_fixed_response() {
        let client = EchoChatClient::new("hello there");
        let completion = client.complete(&[ChatMessage::user("hi")], &[]).await.unwrap();
        assert_eq!(completion.message.content, "hello there");
    }

    #[tokio::test]
    async fn echo_echoes_last_message_when_configured() {
        let client = EchoChatClient::echoing_last_message();
        let completion = client.complete(&[ChatMessage::user("ping")], &[]).await.unwrap();
        assert_eq!(completion.message.content, "ping");
    }

    #[tokio::test]
    async fn scripted_replays_in_order_then_errors() {
        let client = ScriptedChatClient::new(vec![
            ChatMessage::assistant("first"),
            ChatMessage::assistant("second"),
        ]);
        assert_eq!(client.complete(&[], &[]).await.unwrap().message.content, "first");
        assert_eq!(client.complete(&[], &[]).await.unwrap().message.content, "second");
        assert!(client.complete(&[], &[]).await.is_err());
        assert_eq!(client.call_count(), 3);
    }
}
