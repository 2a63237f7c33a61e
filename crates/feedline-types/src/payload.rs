use serde_json::Value;

use crate::request::SourceKind;

/// Opaque provider response. Consumed by the transformer, never persisted.
#[derive(Debug, Clone, PartialEq)]
pub struct RawPayload {
    source: SourceKind,
    body: Value,
}

impl RawPayload {
    #[must_use]
    pub fn new(source: SourceKind, body: Value) -> Self {
        Self { source, body }
    }

    #[must_use]
    pub fn source(&self) -> SourceKind {
        self.source
    }

    #[must_use]
    pub fn body(&self) -> &Value {
        &self.body
    }

    #[must_use]
    pub fn into_body(self) -> Value {
        self.body
    }
}
