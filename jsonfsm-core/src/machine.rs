//! Runtime state machine - event injection and behavior execution.

use crate::table::{Rule, StateId, TransitionTable};
use crate::translator::EventTranslator;
use serde::Serialize;
use std::collections::{BTreeSet, HashSet};
use std::sync::Arc;

/// Everything a compilation produces. Shared read-only between instances.
#[derive(Debug)]
pub(crate) struct Program {
    pub(crate) table: TransitionTable,
    pub(crate) translator: EventTranslator,
    pub(crate) triggers: HashSet<String>,
    pub(crate) initial: StateId,
    pub(crate) final_states: HashSet<StateId>,
    pub(crate) controlled_device_ids: BTreeSet<u32>,
    pub(crate) handled_event_source_ids: BTreeSet<u32>,
    pub(crate) checksum: String,
}

/// What an injected event did.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum InjectOutcome {
    /// No trigger is bound to the event.
    UnknownEvent,
    /// The current state has no rule for the trigger.
    Unhandled { trigger: String },
    /// The current state ignores the trigger.
    Ignored { trigger: String },
    /// A transition was taken.
    Transitioned {
        trigger: String,
        from: String,
        to: String,
        failed_behaviors: usize,
    },
}

impl InjectOutcome {
    /// Returns true if a transition was taken.
    pub fn transitioned(&self) -> bool {
        matches!(self, InjectOutcome::Transitioned { .. })
    }
}

/// A compiled, runnable state machine instance.
///
/// The current state is the only mutable part. Callers that share one instance
/// across threads must serialize calls to [`StateMachine::inject`].
#[derive(Debug)]
pub struct StateMachine {
    program: Arc<Program>,
    current: StateId,
}

impl StateMachine {
    pub(crate) fn new(program: Program) -> Self {
        let current = program.initial;
        Self {
            program: Arc::new(program),
            current,
        }
    }

    /// Injects an event. Returns true if the machine is in a final state afterwards.
    ///
    /// Exit behaviors of the current state, the transition's effects and the
    /// target's entry behaviors run in that order. Failing behaviors are logged
    /// and skipped; unknown or unhandled events leave the state unchanged.
    pub fn inject(&mut self, event_source_id: u32, event_payload: &str) -> bool {
        self.fire(event_source_id, event_payload);
        self.is_current_state_final()
    }

    /// Injects an event and reports what it did.
    pub fn fire(&mut self, event_source_id: u32, event_payload: &str) -> InjectOutcome {
        let program = Arc::clone(&self.program);
        match program.translator.lookup(event_source_id, event_payload) {
            Some(trigger) => self.apply(trigger),
            None => {
                tracing::info!(
                    "Ignoring unknown event '{}:{}'",
                    event_source_id,
                    event_payload
                );
                InjectOutcome::UnknownEvent
            }
        }
    }

    /// Fires a trigger by name, bypassing event translation.
    pub fn fire_trigger(&mut self, trigger: &str) -> InjectOutcome {
        if !self.program.triggers.contains(trigger) {
            tracing::info!("Ignoring unknown trigger '{}'", trigger);
            return InjectOutcome::UnknownEvent;
        }
        self.apply(trigger)
    }

    fn apply(&mut self, trigger: &str) -> InjectOutcome {
        let program = &self.program;
        let current = program.table.state(self.current);

        match current.rule(trigger) {
            None => {
                tracing::debug!(
                    "No rule for trigger '{}' in state '{}'",
                    trigger,
                    current.name()
                );
                InjectOutcome::Unhandled {
                    trigger: trigger.to_string(),
                }
            }
            Some(Rule::Ignore) => {
                tracing::debug!("State '{}' ignores trigger '{}'", current.name(), trigger);
                InjectOutcome::Ignored {
                    trigger: trigger.to_string(),
                }
            }
            Some(Rule::Permit { target, effect }) => {
                let next = program.table.state(*target);

                let mut failed = current.on_exit().run();
                if let Some(effect) = effect {
                    failed += effect.run();
                }
                failed += next.on_entry().run();

                tracing::debug!(
                    "Transition '{}' -> '{}' on trigger '{}' ({} failed behaviors)",
                    current.name(),
                    next.name(),
                    trigger,
                    failed
                );

                let outcome = InjectOutcome::Transitioned {
                    trigger: trigger.to_string(),
                    from: current.name().to_string(),
                    to: next.name().to_string(),
                    failed_behaviors: failed,
                };
                self.current = *target;
                outcome
            }
        }
    }

    /// Name of the current state.
    pub fn current_state(&self) -> &str {
        self.program.table.state(self.current).name()
    }

    /// Returns true if the current state is listed as final.
    pub fn is_current_state_final(&self) -> bool {
        self.program.final_states.contains(&self.current)
    }

    /// Device ids used by this machine's behaviors and effects.
    pub fn controlled_device_ids(&self) -> &BTreeSet<u32> {
        &self.program.controlled_device_ids
    }

    /// Event source ids this machine has triggers for.
    pub fn handled_event_source_ids(&self) -> &BTreeSet<u32> {
        &self.program.handled_event_source_ids
    }

    /// Name of the initial state.
    pub fn initial_state(&self) -> &str {
        self.program.table.state(self.program.initial).name()
    }

    /// Names of the final states, sorted.
    pub fn final_states(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self
            .program
            .final_states
            .iter()
            .map(|id| self.program.table.state(*id).name())
            .collect();
        names.sort_unstable();
        names
    }

    /// Names of all states in declaration order.
    pub fn states(&self) -> impl Iterator<Item = &str> {
        self.program.table.states().map(|s| s.name())
    }

    /// Triggers the current state has a rule for, sorted.
    pub fn triggers_in_current_state(&self) -> Vec<&str> {
        self.program.table.state(self.current).triggers()
    }

    /// Checksum of the description this machine was compiled from.
    pub fn checksum(&self) -> &str {
        &self.program.checksum
    }

    /// Returns to the initial state without running any behaviors.
    pub fn reset(&mut self) {
        self.current = self.program.initial;
    }

    /// Creates another instance in the initial state sharing the compiled commands.
    pub fn spawn(&self) -> StateMachine {
        StateMachine {
            program: Arc::clone(&self.program),
            current: self.program.initial,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler::parse_and_compile;
    use crate::device::DeviceCompilers;
    use crate::test_support::{counting, exec_log, recording, ExecLog};
    use proptest::prelude::*;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn ring() -> StateMachine {
        let json = json!({
            "initialState": "One",
            "finalStates": ["Three"],
            "triggers": [{"name": "move", "eventSourceId": 1, "eventPayload": "move ya"}],
            "states": [
                {"name": "One", "transitions": [{"triggerName": "move", "targetState": "Two"}]},
                {"name": "Two", "transitions": [{"triggerName": "move", "targetState": "Three"}]},
                {"name": "Three", "transitions": [{"triggerName": "move", "targetState": "One"}]}
            ]
        });
        parse_and_compile(&json.to_string())
            .unwrap()
            .compile(&DeviceCompilers::new())
            .unwrap()
    }

    fn logged(json: serde_json::Value, log: &ExecLog) -> StateMachine {
        let compiler = parse_and_compile(&json.to_string()).unwrap();
        let mut compilers = DeviceCompilers::new();
        for id in compiler.required_devices() {
            compilers.insert(*id, recording("", log));
        }
        compiler.compile(&compilers).unwrap()
    }

    #[test]
    fn test_exit_effect_entry_order() {
        let log = exec_log();
        let mut machine = logged(
            json!({
                "initialState": "Start",
                "finalStates": ["Stop"],
                "triggers": [{"name": "move", "eventSourceId": 1, "eventPayload": "move ya"}],
                "states": [
                    {
                        "name": "Start",
                        "onEntry": [{"deviceId": 10, "commandString": "X"}],
                        "onExit": [
                            {"deviceId": 10, "commandString": "A"},
                            {"deviceId": 11, "commandString": "B"}
                        ],
                        "transitions": [{
                            "triggerName": "move",
                            "targetState": "Stop",
                            "effects": [{"deviceId": 12, "commandString": "E"}]
                        }]
                    },
                    {
                        "name": "Stop",
                        "onEntry": [
                            {"deviceId": 11, "commandString": "C"},
                            {"deviceId": 10, "commandString": "D"}
                        ],
                        "onExit": [{"deviceId": 10, "commandString": "Y"}]
                    }
                ]
            }),
            &log,
        );

        assert!(log.lock().is_empty());
        assert!(machine.inject(1, "move ya"));
        assert_eq!(*log.lock(), vec!["A", "B", "E", "C", "D"]);
        assert_eq!(machine.current_state(), "Stop");
    }

    #[test]
    fn test_self_transition_runs_exit_and_entry() {
        let log = exec_log();
        let mut machine = logged(
            json!({
                "initialState": "Loop",
                "finalStates": [],
                "triggers": [{"name": "again", "eventSourceId": 1, "eventPayload": "move ya"}],
                "states": [{
                    "name": "Loop",
                    "onEntry": [{"deviceId": 10, "commandString": "Entering"}],
                    "onExit": [{"deviceId": 10, "commandString": "Leaving"}],
                    "transitions": [{
                        "triggerName": "again",
                        "targetState": "Loop",
                        "effects": [{"deviceId": 10, "commandString": "Looping"}]
                    }]
                }]
            }),
            &log,
        );

        let outcome = machine.fire(1, "move ya");
        assert_eq!(
            outcome,
            InjectOutcome::Transitioned {
                trigger: "again".into(),
                from: "Loop".into(),
                to: "Loop".into(),
                failed_behaviors: 0,
            }
        );
        assert_eq!(*log.lock(), vec!["Leaving", "Looping", "Entering"]);
        assert!(!machine.is_current_state_final());
    }

    #[test]
    fn test_final_state_detection_on_ring() {
        let mut machine = ring();
        let mut finals = Vec::new();
        let mut states = Vec::new();
        for _ in 0..4 {
            finals.push(machine.inject(1, "move ya"));
            states.push(machine.current_state().to_string());
        }
        assert_eq!(finals, vec![false, true, false, false]);
        assert_eq!(states, vec!["Two", "Three", "One", "Two"]);
    }

    #[test]
    fn test_unknown_events_change_nothing() {
        let mut machine = ring();
        assert!(!machine.inject(1, "move ya"));

        assert_eq!(machine.fire(2, "move ya"), InjectOutcome::UnknownEvent);
        assert_eq!(machine.fire(1, "move me"), InjectOutcome::UnknownEvent);
        assert_eq!(machine.current_state(), "Two");

        assert!(machine.inject(1, "move ya"));
        assert!(machine.inject(2, "move ya"));
        assert!(machine.inject(1, "move me"));
        assert_eq!(machine.current_state(), "Three");
    }

    #[test]
    fn test_unhandled_and_ignored_triggers() {
        let log = exec_log();
        let mut machine = logged(
            json!({
                "initialState": "Start",
                "finalStates": ["Stop"],
                "triggers": [
                    {"name": "move", "eventSourceId": 1, "eventPayload": "move ya"},
                    {"name": "hush", "eventSourceId": 1, "eventPayload": "hush"},
                    {"name": "noop", "eventSourceId": 2, "eventPayload": "noop"}
                ],
                "states": [
                    {
                        "name": "Start",
                        "onExit": [{"deviceId": 10, "commandString": "Exit 'Start'"}],
                        "transitions": [
                            {"triggerName": "move", "targetState": "Stop"},
                            {
                                "triggerName": "hush",
                                "ignore": true,
                                "targetState": "Stop",
                                "effects": [{"deviceId": 10, "commandString": "never"}]
                            }
                        ]
                    },
                    {"name": "Stop"}
                ]
            }),
            &log,
        );

        assert_eq!(
            machine.fire(1, "hush"),
            InjectOutcome::Ignored {
                trigger: "hush".into()
            }
        );
        assert_eq!(
            machine.fire(2, "noop"),
            InjectOutcome::Unhandled {
                trigger: "noop".into()
            }
        );
        assert_eq!(machine.current_state(), "Start");
        assert!(log.lock().is_empty());
        assert_eq!(machine.triggers_in_current_state(), vec!["hush", "move"]);

        assert!(machine.inject(1, "move ya"));
        assert_eq!(*log.lock(), vec!["Exit 'Start'"]);
        assert!(machine.triggers_in_current_state().is_empty());
    }

    #[test]
    fn test_failing_behaviors_do_not_stop_the_rest() {
        let json = json!({
            "initialState": "Start",
            "finalStates": ["Stop"],
            "triggers": [{"name": "move", "eventSourceId": 1, "eventPayload": "move ya"}],
            "states": [
                {
                    "name": "Start",
                    "onExit": [
                        {"deviceId": 10, "commandString": "ok 1"},
                        {"deviceId": 10, "commandString": "fail 2"}
                    ],
                    "transitions": [{
                        "triggerName": "move",
                        "targetState": "Stop",
                        "effects": [{"deviceId": 10, "commandString": "ok 3"}]
                    }]
                },
                {
                    "name": "Stop",
                    "onEntry": [
                        {"deviceId": 10, "commandString": "fail 4"},
                        {"deviceId": 10, "commandString": "ok 5"},
                        {"deviceId": 10, "commandString": "ok 6"}
                    ]
                }
            ]
        });
        let executed = Arc::new(AtomicUsize::new(0));
        let mut compilers = DeviceCompilers::new();
        compilers.insert(10, counting(Some("fail"), &executed));
        let mut machine = parse_and_compile(&json.to_string())
            .unwrap()
            .compile(&compilers)
            .unwrap();

        let outcome = machine.fire(1, "move ya");
        assert_eq!(executed.load(Ordering::SeqCst), 6);
        assert!(matches!(
            outcome,
            InjectOutcome::Transitioned {
                failed_behaviors: 2,
                ..
            }
        ));
        assert!(machine.is_current_state_final());
    }

    #[test]
    fn test_panicking_behavior_is_contained() {
        let json = json!({
            "initialState": "Start",
            "finalStates": ["Stop"],
            "triggers": [{"name": "move", "eventSourceId": 1, "eventPayload": "move ya"}],
            "states": [
                {
                    "name": "Start",
                    "onExit": [{"deviceId": 10, "commandString": "panic"}],
                    "transitions": [{"triggerName": "move", "targetState": "Stop"}]
                },
                {"name": "Stop", "onEntry": [{"deviceId": 11, "commandString": "after"}]}
            ]
        });
        let log = exec_log();
        let mut compilers = DeviceCompilers::new();
        compilers.insert(
            10,
            Box::new(|_: &str| -> Result<Arc<dyn crate::device::DeviceCommand>, crate::error::DeviceError> {
                Ok(Arc::new(|| -> Result<(), crate::error::DeviceError> { panic!("Booom!") }))
            }),
        );
        compilers.insert(11, recording("", &log));
        let mut machine = parse_and_compile(&json.to_string())
            .unwrap()
            .compile(&compilers)
            .unwrap();

        assert!(machine.inject(1, "move ya"));
        assert_eq!(*log.lock(), vec!["after"]);
    }

    #[test]
    fn test_independent_compilations() {
        let json = json!({
            "initialState": "Start",
            "finalStates": ["Stop"],
            "triggers": [{"name": "move", "eventSourceId": 1, "eventPayload": "move ya"}],
            "states": [
                {
                    "name": "Start",
                    "onExit": [{"deviceId": 1, "commandString": "Cmd1"}],
                    "transitions": [{"triggerName": "move", "targetState": "Stop"}]
                },
                {"name": "Stop", "onEntry": [{"deviceId": 2, "commandString": "Cmd2"}]}
            ]
        });
        let log = exec_log();
        let a = logged(json.clone(), &log);
        let mut b = logged(json, &log);

        assert_eq!(a.controlled_device_ids(), b.controlled_device_ids());
        assert_eq!(a.handled_event_source_ids(), b.handled_event_source_ids());
        assert_eq!(
            a.controlled_device_ids().iter().copied().collect::<Vec<_>>(),
            vec![1, 2]
        );

        assert!(b.inject(1, "move ya"));
        assert_eq!(a.current_state(), "Start");
        assert_eq!(b.current_state(), "Stop");
    }

    #[test]
    fn test_spawn_and_reset() {
        let mut machine = ring();
        machine.inject(1, "move ya");
        machine.inject(1, "move ya");
        assert_eq!(machine.current_state(), "Three");

        let mut other = machine.spawn();
        assert_eq!(other.current_state(), "One");
        assert_eq!(other.checksum(), machine.checksum());
        other.inject(1, "move ya");
        assert_eq!(other.current_state(), "Two");
        assert_eq!(machine.current_state(), "Three");

        machine.reset();
        assert_eq!(machine.current_state(), "One");
        assert!(!machine.is_current_state_final());
    }

    #[test]
    fn test_fire_trigger_by_name() {
        let mut machine = ring();
        assert!(machine.fire_trigger("move").transitioned());
        assert_eq!(machine.current_state(), "Two");
        assert_eq!(machine.fire_trigger("jump"), InjectOutcome::UnknownEvent);
        assert_eq!(machine.current_state(), "Two");
    }

    #[test]
    fn test_introspection() {
        let machine = ring();
        assert_eq!(machine.initial_state(), "One");
        assert_eq!(machine.final_states(), vec!["Three"]);
        assert_eq!(machine.states().collect::<Vec<_>>(), vec!["One", "Two", "Three"]);
        assert_eq!(
            machine
                .handled_event_source_ids()
                .iter()
                .copied()
                .collect::<Vec<_>>(),
            vec![1]
        );
        assert!(machine.controlled_device_ids().is_empty());
    }

    #[test]
    fn test_outcome_serialization() {
        let outcome = InjectOutcome::Transitioned {
            trigger: "move".into(),
            from: "Start".into(),
            to: "Stop".into(),
            failed_behaviors: 0,
        };
        let value = serde_json::to_value(&outcome).unwrap();
        assert_eq!(value["outcome"], "transitioned");
        assert_eq!(value["to"], "Stop");

        let value = serde_json::to_value(InjectOutcome::UnknownEvent).unwrap();
        assert_eq!(value, json!({"outcome": "unknown_event"}));
    }

    #[test]
    fn test_machine_is_send() {
        fn assert_send<T: Send>() {}
        assert_send::<StateMachine>();
    }

    proptest! {
        #[test]
        fn prop_ring_position_follows_injection_count(n in 0usize..50) {
            let mut machine = ring();
            let mut last_final = false;
            for _ in 0..n {
                last_final = machine.inject(1, "move ya");
            }
            let expected = ["One", "Two", "Three"][n % 3];
            prop_assert_eq!(machine.current_state(), expected);
            prop_assert_eq!(last_final, n > 0 && n % 3 == 2);
        }
    }
}
