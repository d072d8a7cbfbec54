use std::collections::HashMap;

use crate::graph::control::ControlKey;
use crate::value::Value;

/// Name and control bindings visible while generating one node.
///
/// A binding always holds the most recent value: reads after a write see
/// the written value, not the slot.
#[derive(Debug, Default)]
pub struct Scope {
    vars: HashMap<String, Value>,
    controls: HashMap<ControlKey, Binding>,
}

#[derive(Debug, Clone)]
pub struct Binding {
    pub value: Value,
    /// Whether this node has written the control yet.
    pub written: bool,
}

impl Scope {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn var(&self, name: &str) -> Option<&Value> {
        self.vars.get(name)
    }

    pub fn set_var(&mut self, name: &str, value: Value) {
        self.vars.insert(name.to_string(), value);
    }

    pub fn control(&self, key: &ControlKey) -> Option<&Binding> {
        self.controls.get(key)
    }

    /// Cache a value loaded from the control's slot.
    pub fn cache_control(&mut self, key: &ControlKey, value: Value) {
        self.controls.insert(
            key.clone(),
            Binding {
                value,
                written: false,
            },
        );
    }

    pub fn write_control(&mut self, key: &ControlKey, value: Value) {
        self.controls.insert(
            key.clone(),
            Binding {
                value,
                written: true,
            },
        );
    }
}
