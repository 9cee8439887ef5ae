//! Compiled transition table.
//!
//! States live in an arena indexed by [`StateId`]; each state maps trigger
//! names to a [`Rule`]. The table is immutable once built.

use crate::command::CommandChain;
use std::collections::HashMap;

/// Index of a state in the table's arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StateId(pub(crate) usize);

/// How a state reacts to one trigger.
#[derive(Debug)]
pub enum Rule {
    /// Accept the trigger without changing state or running behaviors.
    Ignore,
    /// Move to `target`, running `effect` between exit and entry behaviors.
    Permit {
        target: StateId,
        effect: Option<CommandChain>,
    },
}

/// A state with its compiled behaviors and rules.
#[derive(Debug)]
pub struct CompiledState {
    pub(crate) name: String,
    pub(crate) on_entry: CommandChain,
    pub(crate) on_exit: CommandChain,
    pub(crate) rules: HashMap<String, Rule>,
}

impl CompiledState {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn on_entry(&self) -> &CommandChain {
        &self.on_entry
    }

    pub fn on_exit(&self) -> &CommandChain {
        &self.on_exit
    }

    /// Looks up the rule for a trigger.
    pub fn rule(&self, trigger: &str) -> Option<&Rule> {
        self.rules.get(trigger)
    }

    /// Trigger names this state has a rule for, sorted.
    pub fn triggers(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.rules.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

/// Arena of compiled states, indexed by id and by name.
#[derive(Debug, Default)]
pub struct TransitionTable {
    states: Vec<CompiledState>,
    index: HashMap<String, StateId>,
}

impl TransitionTable {
    /// Creates a table with one empty slot per state name, in order.
    pub(crate) fn with_states<'n>(names: impl IntoIterator<Item = &'n str>) -> Self {
        let mut table = Self::default();
        for name in names {
            let id = StateId(table.states.len());
            table.states.push(CompiledState {
                name: name.to_string(),
                on_entry: CommandChain::default(),
                on_exit: CommandChain::default(),
                rules: HashMap::new(),
            });
            table.index.insert(name.to_string(), id);
        }
        table
    }

    pub(crate) fn state_mut(&mut self, id: StateId) -> &mut CompiledState {
        &mut self.states[id.0]
    }

    pub fn id_of(&self, name: &str) -> Option<StateId> {
        self.index.get(name).copied()
    }

    pub fn state(&self, id: StateId) -> &CompiledState {
        &self.states[id.0]
    }

    /// Looks up the rule for `trigger` in state `id`.
    pub fn lookup(&self, id: StateId, trigger: &str) -> Option<&Rule> {
        self.state(id).rule(trigger)
    }

    pub fn states(&self) -> impl Iterator<Item = &CompiledState> {
        self.states.iter()
    }

    pub fn len(&self) -> usize {
        self.states.len()
    }

    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }
}
