//! [`PayloadRegistry`]: maps a [`PayloadType`] tag back to a concrete
//! Rust deserializer.
//!
//! Spec §9 treats resume as replaying a dynamically-typed host's message
//! table; a statically-typed port can't reconstruct `Arc<dyn AnyPayload>`
//! from a checkpoint's JSON bytes without *something* that knows which
//! concrete type a tag corresponds to. This registry is that something —
//! every concrete [`Payload`] type used anywhere in a graph must be
//! registered on the builder so `Workflow::resume` can rehydrate pending
//! messages and request-info entries.

use crate::message::{AnyPayload, Payload, PayloadType};
use std::collections::HashMap;
use std::sync::Arc;

type Deserializer = Arc<dyn Fn(serde_json::Value) -> serde_json::Result<Arc<dyn AnyPayload>> + Send + Sync>;

#[derive(Clone, Default)]
pub struct PayloadRegistry {
    deserializers: HashMap<PayloadType, Deserializer>,
}

impl PayloadRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<T: Payload>(&mut self) {
        self.deserializers.insert(
            T::payload_type(),
            Arc::new(|json| {
                let value: T = serde_json::from_value(json)?;
                Ok(Arc::new(value) as Arc<dyn AnyPayload>)
            }),
        );
    }

    pub fn deserialize(
        &self,
        payload_type: &PayloadType,
        json: serde_json::Value,
    ) -> Option<Arc<dyn AnyPayload>> {
        let codec = self.deserializers.get(payload_type)?;
        codec(json).ok()
    }

    pub fn contains(&self, payload_type: &PayloadType) -> bool {
        self.deserializers.contains_key(payload_type)
    }
}

impl std::fmt::Debug for PayloadRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PayloadRegistry")
            .field("registered_types", &self.deserializers.len())
            .finish()
    }
}
