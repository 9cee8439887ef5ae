//! Machine description types.
//!
//! Machines are described in JSON:
//!
//! ```json
//! {
//!   "initialState": "Start",
//!   "finalStates": ["Stop"],
//!   "triggers": [
//!     {"name": "move", "eventSourceId": 1, "eventPayload": "move ya"}
//!   ],
//!   "states": [
//!     {
//!       "name": "Start",
//!       "onExit": [{"deviceId": 10, "commandString": "Exiting 'Start' ..."}],
//!       "transitions": [{"triggerName": "move", "targetState": "Stop"}]
//!     },
//!     {
//!       "name": "Stop",
//!       "onEntry": [{"deviceId": 10, "commandString": "Entering 'Stop' ..."}]
//!     }
//!   ]
//! }
//! ```
//!
//! The raw types mirror the document one to one and accept missing fields so
//! the validator can report them by path. [`MachineDescriptor`] is the typed,
//! validated form.

use crate::error::ValidationError;
use crate::validator::Validator;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Raw trigger entry.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct TriggerRaw {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub event_source_id: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub event_payload: Option<String>,
}

/// Raw behavior or effect entry.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct BehaviorRaw {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub device_id: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub command_string: Option<String>,
}

/// Raw transition entry.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct TransitionRaw {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trigger_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_state: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub effects: Option<Vec<BehaviorRaw>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ignore: Option<bool>,
}

impl TransitionRaw {
    /// Returns true if the transition is explicitly marked as ignored.
    pub fn is_ignored(&self) -> bool {
        self.ignore == Some(true)
    }
}

/// Raw state entry.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct StateRaw {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub on_entry: Option<Vec<BehaviorRaw>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub on_exit: Option<Vec<BehaviorRaw>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transitions: Option<Vec<TransitionRaw>>,
}

/// Raw machine description as parsed from JSON.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct MachineDescriptorRaw {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub initial_state: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub final_states: Option<Vec<Option<String>>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub triggers: Option<Vec<TriggerRaw>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub states: Option<Vec<StateRaw>>,
}

impl MachineDescriptorRaw {
    /// Parses JSON text without validating its contents.
    pub fn parse(json: &str) -> Result<Self, ValidationError> {
        if json.trim().is_empty() {
            return Err(ValidationError::Blank);
        }
        Ok(serde_json::from_str(json)?)
    }

    /// Converts an already parsed JSON document without validating its contents.
    pub fn from_value(json: &serde_json::Value) -> Result<Self, ValidationError> {
        Ok(serde_json::from_value(json.clone())?)
    }
}

/// Named event bound to one `(eventSourceId, eventPayload)` identity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Trigger {
    pub name: String,
    pub event_source_id: u32,
    pub event_payload: String,
}

/// A single device command reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Behavior {
    pub device_id: u32,
    pub command_string: String,
}

/// What a state does when one of its triggers fires.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reaction {
    /// The trigger is accepted and dropped: no state change, no behaviors.
    Ignore,
    /// The trigger moves the machine to `target_state`, running `effects` on the way.
    Permit {
        target_state: String,
        effects: Vec<Behavior>,
    },
}

/// A transition out of a state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transition {
    pub trigger_name: String,
    pub reaction: Reaction,
}

impl Transition {
    /// Returns the target state, or `None` for ignore rules.
    pub fn target_state(&self) -> Option<&str> {
        match &self.reaction {
            Reaction::Ignore => None,
            Reaction::Permit { target_state, .. } => Some(target_state),
        }
    }

    /// Returns the effects run while traversing the transition.
    pub fn effects(&self) -> &[Behavior] {
        match &self.reaction {
            Reaction::Ignore => &[],
            Reaction::Permit { effects, .. } => effects,
        }
    }
}

/// A state with its entry/exit behaviors and outgoing transitions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct State {
    pub name: String,
    pub on_entry: Vec<Behavior>,
    pub on_exit: Vec<Behavior>,
    pub transitions: Vec<Transition>,
}

impl State {
    /// Iterates over every behavior and effect declared by this state.
    pub fn behaviors(&self) -> impl Iterator<Item = &Behavior> {
        self.on_entry
            .iter()
            .chain(self.on_exit.iter())
            .chain(self.transitions.iter().flat_map(|t| t.effects().iter()))
    }
}

/// Validated machine description.
///
/// Only obtainable through validation, so every name it refers to exists.
#[derive(Debug, Clone)]
pub struct MachineDescriptor {
    initial_state: String,
    final_states: Vec<String>,
    triggers: Vec<Trigger>,
    states: Vec<State>,
    raw: MachineDescriptorRaw,
    checksum: String,
}

impl MachineDescriptor {
    /// Parses and validates a machine description from JSON text.
    pub fn from_json(json: &str) -> Result<Self, ValidationError> {
        Self::from_raw(MachineDescriptorRaw::parse(json)?)
    }

    /// Parses and validates a machine description from a JSON document.
    pub fn from_value(json: &serde_json::Value) -> Result<Self, ValidationError> {
        Self::from_raw(MachineDescriptorRaw::from_value(json)?)
    }

    /// Validates a raw description and builds the typed form.
    pub fn from_raw(raw: MachineDescriptorRaw) -> Result<Self, ValidationError> {
        let validated = Validator::new(&raw).run()?;

        let json_bytes = serde_json::to_vec(&raw)?;
        let checksum = format!("{:08x}", crc32c::crc32c(&json_bytes));

        Ok(Self {
            initial_state: validated.initial_state,
            final_states: validated.final_states,
            triggers: validated.triggers,
            states: validated.states,
            raw,
            checksum,
        })
    }

    /// State the machine starts in.
    pub fn initial_state(&self) -> &str {
        &self.initial_state
    }

    /// States reported as final. May be empty.
    pub fn final_states(&self) -> &[String] {
        &self.final_states
    }

    /// All triggers in declaration order.
    pub fn triggers(&self) -> &[Trigger] {
        &self.triggers
    }

    /// All states in declaration order.
    pub fn states(&self) -> &[State] {
        &self.states
    }

    /// The raw description as parsed.
    pub fn raw(&self) -> &MachineDescriptorRaw {
        &self.raw
    }

    /// CRC32C of the canonical JSON form, as 8 hex digits.
    pub fn checksum(&self) -> &str {
        &self.checksum
    }

    /// Looks up a state by name.
    pub fn state(&self, name: &str) -> Option<&State> {
        self.states.iter().find(|s| s.name == name)
    }

    /// Looks up a trigger by name.
    pub fn trigger(&self, name: &str) -> Option<&Trigger> {
        self.triggers.iter().find(|t| t.name == name)
    }

    /// Device ids referenced by any behavior or effect.
    ///
    /// Effects of ignored transitions never run but still name their device,
    /// so a compiler must be supplied for it.
    pub fn required_devices(&self) -> BTreeSet<u32> {
        let mut devices: BTreeSet<u32> = self
            .states
            .iter()
            .flat_map(State::behaviors)
            .map(|b| b.device_id)
            .collect();
        devices.extend(self.ignored_effect_devices());
        devices
    }

    fn ignored_effect_devices(&self) -> impl Iterator<Item = u32> + '_ {
        self.raw
            .states
            .iter()
            .flatten()
            .flat_map(|s| s.transitions.iter().flatten())
            .filter(|t| t.is_ignored())
            .flat_map(|t| t.effects.iter().flatten())
            .filter_map(|b| b.device_id)
            .filter_map(|id| u32::try_from(id).ok())
            .filter(|&id| id > 0)
    }

    /// Event source ids named by any trigger.
    pub fn accepted_event_sources(&self) -> BTreeSet<u32> {
        self.triggers.iter().map(|t| t.event_source_id).collect()
    }

    /// Returns true if the named state is final.
    pub fn is_final(&self, state: &str) -> bool {
        self.final_states.iter().any(|s| s == state)
    }

    /// Returns the raw description as JSON.
    pub fn to_json(&self) -> Result<serde_json::Value, serde_json::Error> {
        serde_json::to_value(&self.raw)
    }
}
