//! Semantic validation of a raw machine description.
//!
//! Transitions refer to triggers and states by name, possibly before those are
//! declared, so validation runs as ordered passes. Each pass fills a lookup set
//! the next one consumes:
//!
//! 1. triggers: field checks, collects trigger names, uniqueness
//! 2. states: names and entry/exit behaviors, collects state names, uniqueness
//! 3. transitions: needs both name sets
//! 4. options: `initialState` and `finalStates`, needs the state names
//!
//! The first failing check aborts validation with a [`Violation`] naming the
//! offending field by path.

use crate::descriptor::{
    Behavior, BehaviorRaw, MachineDescriptorRaw, Reaction, State, StateRaw, Transition,
    TransitionRaw, Trigger,
};
use crate::error::{Expectation, ValidationError, Violation};
use std::collections::{HashMap, HashSet};
use std::fmt;

const IGNORE_HINT: &str = "alternatively add 'transition.ignore = true'";

/// Validates a raw description without building the typed form.
pub fn validate(raw: &MachineDescriptorRaw) -> Result<(), ValidationError> {
    Validator::new(raw).run().map(|_| ())
}

/// Output of a successful validation run.
#[derive(Debug, Clone)]
pub struct Validated {
    pub initial_state: String,
    pub final_states: Vec<String>,
    pub triggers: Vec<Trigger>,
    pub states: Vec<State>,
}

/// Dotted/indexed path of a field, e.g. `states[1].onEntry[0].deviceId`.
#[derive(Debug, Clone)]
struct FieldPath(String);

impl FieldPath {
    fn root(name: &str) -> Self {
        Self(name.to_string())
    }

    fn index(&self, i: usize) -> Self {
        Self(format!("{}[{}]", self.0, i))
    }

    fn field(&self, name: &str) -> Self {
        Self(format!("{}.{}", self.0, name))
    }

    fn violation(&self, expectation: Expectation) -> Violation {
        Violation::new(self.0.clone(), expectation)
    }
}

impl fmt::Display for FieldPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

fn present<'v, T>(value: &'v Option<T>, path: &FieldPath) -> Result<&'v T, Violation> {
    value
        .as_ref()
        .ok_or_else(|| path.violation(Expectation::NotNull))
}

fn non_blank<'v>(value: &'v Option<String>, path: &FieldPath) -> Result<&'v str, Violation> {
    let s = present(value, path)?;
    if s.trim().is_empty() {
        return Err(path.violation(Expectation::NotBlank).with_value(s));
    }
    Ok(s)
}

fn non_empty<'v, T>(value: &'v Option<Vec<T>>, path: &FieldPath) -> Result<&'v [T], Violation> {
    let list = present(value, path)?;
    if list.is_empty() {
        return Err(path.violation(Expectation::NotEmpty));
    }
    Ok(list)
}

fn positive_id(value: Option<i64>, path: &FieldPath) -> Result<u32, Violation> {
    let id = value.ok_or_else(|| path.violation(Expectation::NotNull))?;
    if id <= 0 {
        return Err(path.violation(Expectation::GreaterThan(0)).with_value(id));
    }
    u32::try_from(id).map_err(|_| {
        path.violation(Expectation::AtMost(i64::from(u32::MAX)))
            .with_value(id)
    })
}

/// Returns the index of the first entry whose key was already seen, along
/// with the index of the earlier entry.
fn first_duplicate<K, I>(keys: I) -> Option<(usize, usize)>
where
    K: Eq + std::hash::Hash,
    I: IntoIterator<Item = K>,
{
    let mut seen: HashMap<K, usize> = HashMap::new();
    for (i, key) in keys.into_iter().enumerate() {
        if let Some(&first) = seen.get(&key) {
            return Some((i, first));
        }
        seen.insert(key, i);
    }
    None
}

/// Runs the validation passes over one raw description.
pub struct Validator<'a> {
    raw: &'a MachineDescriptorRaw,
    known_trigger_names: HashSet<&'a str>,
    known_state_names: HashSet<&'a str>,
}

impl<'a> Validator<'a> {
    pub fn new(raw: &'a MachineDescriptorRaw) -> Self {
        Self {
            raw,
            known_trigger_names: HashSet::new(),
            known_state_names: HashSet::new(),
        }
    }

    /// Runs all passes in order and returns the typed description parts.
    pub fn run(mut self) -> Result<Validated, ValidationError> {
        let triggers = self.validate_triggers()?;

        // Transitions need every trigger name and every state name, so the
        // states pass only collects names and behaviors.
        let mut states = self.validate_states()?;
        self.validate_transitions(&mut states)?;

        let initial_state = self.validate_initial_state()?;
        let final_states = self.validate_final_states()?;

        Ok(Validated {
            initial_state,
            final_states,
            triggers,
            states,
        })
    }

    fn validate_triggers(&mut self) -> Result<Vec<Trigger>, Violation> {
        let raw = self.raw;
        let root = FieldPath::root("triggers");
        let raw_triggers = non_empty(&raw.triggers, &root)?;

        let mut triggers = Vec::with_capacity(raw_triggers.len());
        for (i, t) in raw_triggers.iter().enumerate() {
            let path = root.index(i);
            let name = non_blank(&t.name, &path.field("name"))?;
            let event_source_id = positive_id(t.event_source_id, &path.field("eventSourceId"))?;
            let event_payload = non_blank(&t.event_payload, &path.field("eventPayload"))?;

            self.known_trigger_names.insert(name);
            triggers.push(Trigger {
                name: name.to_string(),
                event_source_id,
                event_payload: event_payload.to_string(),
            });
        }

        if let Some((dup, first)) = first_duplicate(triggers.iter().map(|t| t.name.as_str())) {
            return Err(root
                .index(dup)
                .field("name")
                .violation(Expectation::Unique)
                .with_value(&triggers[dup].name)
                .with_hint(format!("same as {}", root.index(first).field("name"))));
        }

        if let Some((dup, first)) = first_duplicate(
            triggers
                .iter()
                .map(|t| (t.event_source_id, t.event_payload.as_str())),
        ) {
            let t = &triggers[dup];
            return Err(root
                .index(dup)
                .field("(eventSourceId/eventPayload)")
                .violation(Expectation::Unique)
                .with_value(format!("({}/{})", t.event_source_id, t.event_payload))
                .with_hint(format!("same event as {}", root.index(first))));
        }

        Ok(triggers)
    }

    fn validate_states(&mut self) -> Result<Vec<State>, Violation> {
        let raw = self.raw;
        let root = FieldPath::root("states");
        let raw_states = non_empty(&raw.states, &root)?;

        let mut states = Vec::with_capacity(raw_states.len());
        for (i, s) in raw_states.iter().enumerate() {
            let path = root.index(i);
            let name = non_blank(&s.name, &path.field("name"))?;
            let on_entry = behavior_list(&s.on_entry, &path.field("onEntry"))?;
            let on_exit = behavior_list(&s.on_exit, &path.field("onExit"))?;

            self.known_state_names.insert(name);
            states.push(State {
                name: name.to_string(),
                on_entry,
                on_exit,
                transitions: Vec::new(),
            });
        }

        if let Some((dup, first)) = first_duplicate(states.iter().map(|s| s.name.as_str())) {
            return Err(root
                .index(dup)
                .field("name")
                .violation(Expectation::Unique)
                .with_value(&states[dup].name)
                .with_hint(format!("same as {}", root.index(first).field("name"))));
        }

        Ok(states)
    }

    fn validate_transitions(&self, states: &mut [State]) -> Result<(), Violation> {
        let root = FieldPath::root("states");
        let raw_states: &[StateRaw] = self.raw.states.as_deref().unwrap_or_default();

        for (i, (raw_state, state)) in raw_states.iter().zip(states.iter_mut()).enumerate() {
            let Some(raw_transitions) = &raw_state.transitions else {
                continue;
            };
            let path = root.index(i).field("transitions");

            let mut transitions = Vec::with_capacity(raw_transitions.len());
            for (k, t) in raw_transitions.iter().enumerate() {
                transitions.push(self.validate_transition(t, &path.index(k))?);
            }

            if let Some((dup, first)) =
                first_duplicate(transitions.iter().map(|t| t.trigger_name.as_str()))
            {
                return Err(path
                    .index(dup)
                    .field("triggerName")
                    .violation(Expectation::Unique)
                    .with_value(&transitions[dup].trigger_name)
                    .with_hint(format!("same as {}", path.index(first).field("triggerName"))));
            }

            state.transitions = transitions;
        }

        Ok(())
    }

    fn validate_transition(
        &self,
        t: &TransitionRaw,
        path: &FieldPath,
    ) -> Result<Transition, Violation> {
        let trigger_path = path.field("triggerName");
        let trigger_name = non_blank(&t.trigger_name, &trigger_path)?;
        if !self.known_trigger_names.contains(trigger_name) {
            return Err(trigger_path
                .violation(Expectation::KnownTriggerName)
                .with_value(trigger_name));
        }

        // With ignore set, targetState and effects are not applied and not checked.
        if t.is_ignored() {
            return Ok(Transition {
                trigger_name: trigger_name.to_string(),
                reaction: Reaction::Ignore,
            });
        }

        let target_path = path.field("targetState");
        if t.target_state.is_none() {
            return Err(target_path
                .violation(Expectation::NotNull)
                .with_hint(IGNORE_HINT));
        }
        let target_state = non_blank(&t.target_state, &target_path)?;
        if !self.known_state_names.contains(target_state) {
            return Err(target_path
                .violation(Expectation::ContainedInStates)
                .with_value(target_state));
        }

        let effects = behavior_list(&t.effects, &path.field("effects"))?;

        Ok(Transition {
            trigger_name: trigger_name.to_string(),
            reaction: Reaction::Permit {
                target_state: target_state.to_string(),
                effects,
            },
        })
    }

    fn validate_initial_state(&self) -> Result<String, Violation> {
        let path = FieldPath::root("initialState");
        let initial = non_blank(&self.raw.initial_state, &path)?;
        if !self.known_state_names.contains(initial) {
            return Err(path
                .violation(Expectation::ContainedInStates)
                .with_value(initial));
        }
        Ok(initial.to_string())
    }

    fn validate_final_states(&self) -> Result<Vec<String>, Violation> {
        let root = FieldPath::root("finalStates");
        let Some(entries) = &self.raw.final_states else {
            return Ok(Vec::new());
        };

        let mut final_states = Vec::with_capacity(entries.len());
        for (i, entry) in entries.iter().enumerate() {
            let path = root.index(i);
            let name = non_blank(entry, &path)?;
            if !self.known_state_names.contains(name) {
                return Err(path
                    .violation(Expectation::ContainedInStates)
                    .with_value(name));
            }
            final_states.push(name.to_string());
        }
        Ok(final_states)
    }
}

fn behavior_list(
    value: &Option<Vec<BehaviorRaw>>,
    path: &FieldPath,
) -> Result<Vec<Behavior>, Violation> {
    let Some(list) = value else {
        return Ok(Vec::new());
    };
    list.iter()
        .enumerate()
        .map(|(i, b)| complete_behavior(b, &path.index(i)))
        .collect()
}

fn complete_behavior(b: &BehaviorRaw, path: &FieldPath) -> Result<Behavior, Violation> {
    let device_id = positive_id(b.device_id, &path.field("deviceId"))?;
    let command_string = non_blank(&b.command_string, &path.field("commandString"))?;
    Ok(Behavior {
        device_id,
        command_string: command_string.to_string(),
    })
}
