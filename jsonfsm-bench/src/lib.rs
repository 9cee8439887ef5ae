//! Machine descriptions shared by the benchmarks.

use serde_json::{json, Value};

/// A ring of `n` states, each moving to the next on trigger `next` (source 1,
/// payload `next`). Every state has one entry and one exit behavior on device 1.
pub fn ring(n: usize) -> Value {
    let states: Vec<Value> = (0..n)
        .map(|i| {
            json!({
                "name": format!("state_{}", i),
                "onEntry": [{"deviceId": 1, "commandString": format!("enter {}", i)}],
                "onExit": [{"deviceId": 1, "commandString": format!("exit {}", i)}],
                "transitions": [{
                    "triggerName": "next",
                    "targetState": format!("state_{}", (i + 1) % n),
                    "effects": [{"deviceId": 2, "commandString": "tick"}]
                }]
            })
        })
        .collect();

    json!({
        "initialState": "state_0",
        "finalStates": [format!("state_{}", n - 1)],
        "triggers": [{"name": "next", "eventSourceId": 1, "eventPayload": "next"}],
        "states": states
    })
}

/// A single state reacting to `n` distinct triggers with self-transitions.
pub fn wide(n: usize) -> Value {
    let triggers: Vec<Value> = (0..n)
        .map(|i| {
            json!({
                "name": format!("t{}", i),
                "eventSourceId": 1 + i % 8,
                "eventPayload": format!("p{}", i)
            })
        })
        .collect();
    let transitions: Vec<Value> = (0..n)
        .map(|i| json!({"triggerName": format!("t{}", i), "targetState": "Only"}))
        .collect();

    json!({
        "initialState": "Only",
        "finalStates": [],
        "triggers": triggers,
        "states": [{"name": "Only", "transitions": transitions}]
    })
}
