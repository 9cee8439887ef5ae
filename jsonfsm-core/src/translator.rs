//! Physical event to trigger name lookup.

use crate::descriptor::Trigger;
use std::collections::HashMap;

/// Maps `(eventSourceId, eventPayload)` to a trigger name.
///
/// Built once while compiling and read-only afterwards.
#[derive(Debug, Clone, Default)]
pub struct EventTranslator {
    mapping: HashMap<String, String>,
}

impl EventTranslator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a translator covering every trigger.
    pub fn from_triggers<'t>(triggers: impl IntoIterator<Item = &'t Trigger>) -> Self {
        let mut translator = Self::new();
        for t in triggers {
            translator.add(t.event_source_id, &t.event_payload, &t.name);
        }
        translator
    }

    pub fn add(&mut self, event_source_id: u32, event_payload: &str, trigger_name: &str) {
        self.mapping
            .insert(key(event_source_id, event_payload), trigger_name.to_string());
    }

    pub fn lookup(&self, event_source_id: u32, event_payload: &str) -> Option<&str> {
        self.mapping
            .get(&key(event_source_id, event_payload))
            .map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.mapping.len()
    }

    pub fn is_empty(&self) -> bool {
        self.mapping.is_empty()
    }
}

// The source id is all digits, so the first '_' always ends it.
fn key(event_source_id: u32, event_payload: &str) -> String {
    format!("{}_{}", event_source_id, event_payload)
}
