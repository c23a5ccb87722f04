//! Typed, type-erased message envelopes (spec §3 `Message`).
//!
//! Concrete Rust payload types implement [`Payload`]; the runtime only ever
//! holds them behind [`AnyPayload`], a type-erased object-safe view used for
//! in-process dispatch and downcast. This is the systems-language
//! realization of spec §9's "dynamic typing → explicit dispatch": instead of
//! inspecting a handler's parameter annotation at runtime, each concrete
//! type supplies a stable string tag ([`PayloadType`]) up front.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::any::Any;
use std::fmt;
use std::sync::Arc;
use uuid::Uuid;

/// Stable, process-restart-safe type tag for a payload.
///
/// Deliberately not `std::any::TypeId`: a `TypeId` is not guaranteed stable
/// across compilations and cannot be written into a checkpoint that a later
/// process run must be able to read back (spec §3 concretization note).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PayloadType(String);

impl PayloadType {
    pub fn new(tag: impl Into<String>) -> Self {
        Self(tag.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PayloadType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for PayloadType {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

/// A concrete message payload type.
///
/// `TYPE_TAG` must be unique within a workflow graph; edge and handler
/// dispatch compare these tags, not Rust types, so two distinct Rust types
/// sharing a tag would be indistinguishable to the router.
pub trait Payload:
    Any + Send + Sync + fmt::Debug + Clone + Serialize + DeserializeOwned + 'static
{
    const TYPE_TAG: &'static str;

    fn payload_type() -> PayloadType {
        PayloadType::new(Self::TYPE_TAG)
    }
}

/// Object-safe, type-erased view over a [`Payload`], used for in-process
/// delivery. All [`Payload`] implementors get this for free via the blanket
/// impl below.
pub trait AnyPayload: Any + Send + Sync + fmt::Debug {
    fn payload_type(&self) -> PayloadType;
    /// Serializes the payload to JSON, used only at the checkpoint boundary
    /// (spec §3: live delivery stays type-erased in-process; only the
    /// checkpoint format needs a JSON-able representation).
    fn to_json(&self) -> serde_json::Value;
    fn as_any(&self) -> &dyn Any;
}

impl<T: Payload> AnyPayload for T {
    fn payload_type(&self) -> PayloadType {
        T::payload_type()
    }

    fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or(serde_json::Value::Null)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Downcasts an erased payload back to its concrete type. Returns `None`
/// when `payload_type()` lied about the underlying Rust type, which would
/// indicate a bug in message construction rather than a normal runtime
/// condition.
pub fn downcast_payload<T: Payload>(payload: &Arc<dyn AnyPayload>) -> Option<T> {
    payload.as_any().downcast_ref::<T>().cloned()
}

/// Causal context attached to a message so the event stream can attribute
/// an output to the chain of messages that produced it, without pulling in
/// a full distributed tracing format (spec §3, out of scope per §1).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TraceContext {
    pub run_id: String,
    pub superstep_index: u64,
    pub parent_message_id: Option<Uuid>,
}

impl TraceContext {
    pub fn root(run_id: impl Into<String>) -> Self {
        Self {
            run_id: run_id.into(),
            superstep_index: 0,
            parent_message_id: None,
        }
    }

    pub fn child_at(&self, superstep_index: u64, parent_message_id: Uuid) -> Self {
        Self {
            run_id: self.run_id.clone(),
            superstep_index,
            parent_message_id: Some(parent_message_id),
        }
    }
}

/// Immutable, typed, type-erased message passed between executors (spec §3).
#[derive(Clone)]
pub struct Message {
    pub id: Uuid,
    pub source_executor_id: String,
    pub target_executor_id: Option<String>,
    pub payload: Arc<dyn AnyPayload>,
    pub payload_type: PayloadType,
    pub trace_ctx: TraceContext,
}

impl fmt::Debug for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Message")
            .field("id", &self.id)
            .field("source_executor_id", &self.source_executor_id)
            .field("target_executor_id", &self.target_executor_id)
            .field("payload_type", &self.payload_type)
            .finish()
    }
}

impl Message {
    pub fn new(source_executor_id: impl Into<String>, payload: impl Payload, trace_ctx: TraceContext) -> Self {
        let payload_type = payload.payload_type();
        Self {
            id: Uuid::new_v4(),
            source_executor_id: source_executor_id.into(),
            target_executor_id: None,
            payload: Arc::new(payload),
            payload_type,
            trace_ctx,
        }
    }

    pub fn with_target(mut self, target: impl Into<String>) -> Self {
        self.target_executor_id = Some(target.into());
        self
    }

    /// Returns a copy of this message addressed to `target`, reusing the
    /// same payload `Arc` (payloads are immutable, so fan-out never clones
    /// the underlying value).
    pub fn retarget(&self, target: impl Into<String>) -> Self {
        Self {
            id: self.id,
            source_executor_id: self.source_executor_id.clone(),
            target_executor_id: Some(target.into()),
            payload: Arc::clone(&self.payload),
            payload_type: self.payload_type.clone(),
            trace_ctx: self.trace_ctx.clone(),
        }
    }

    pub fn downcast<T: Payload>(&self) -> Option<T> {
        downcast_payload::<T>(&self.payload)
    }
}
