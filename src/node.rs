//! Node definitions and evaluation rules.
//!
//! Nodes are the fundamental units of computation in the circuit graph. Each
//! node records the values driven into its input slots, evaluates a pending
//! output from them, and commits that output only through propagation.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::types::Id;
use crate::value::LogicValue;

/// The kind of a node, selecting its evaluation rule.
///
/// The gate set is closed, so kinds are tagged variants rather than trait
/// objects; `Custom` covers editor-defined types with no evaluation rule,
/// which simply hold their value.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum NodeKind {
    /// True iff every input is true
    And,
    /// True if any input is true, unknown if any input is unknown
    Or,
    /// Negated And fold: true as soon as one input is false
    Nand,
    /// Negated Or fold
    Nor,
    /// Single-input inverter; unknown stays unknown
    Not,
    /// Single-slot pass-through; also backs freeports and integrated-circuit
    /// boundary nodes
    Buffer,
    /// Externally driven stimulus source; has no input slots
    Input,
    /// Observation sink; one input, no outputs
    Output,
    /// Unrecognized type; holds its value unchanged
    Custom(String),
}

/// One entry in a node's fan-out: the downstream node and the input slot on
/// it that this node drives.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutputRef {
    /// Downstream node id
    pub node: Id,
    /// Input slot key on the downstream node
    pub slot: Id,
}

impl OutputRef {
    /// Creates a new fan-out entry.
    pub fn new(node: impl Into<Id>, slot: impl Into<Id>) -> Self {
        Self {
            node: node.into(),
            slot: slot.into(),
        }
    }
}

/// A single unit of computation in the circuit graph.
///
/// Input slots are keyed by the id of the upstream driver, not by position,
/// so rewiring never shifts slot indices. `value` is only ever changed by the
/// propagation engine committing `new_value`; `eval` is a pure function of
/// the recorded inputs.
#[derive(Clone, Debug)]
pub struct CircuitNode {
    id: Id,
    kind: NodeKind,
    input_values: HashMap<Id, LogicValue>,
    value: LogicValue,
    new_value: LogicValue,
    outputs: Vec<OutputRef>,
}

impl CircuitNode {
    /// Creates a new node of the given kind, starting at `Unknown`.
    pub fn new(id: impl Into<Id>, kind: NodeKind) -> Self {
        Self {
            id: id.into(),
            kind,
            input_values: HashMap::new(),
            value: LogicValue::Unknown,
            new_value: LogicValue::Unknown,
            outputs: Vec::new(),
        }
    }

    /// Returns the node's id.
    pub fn id(&self) -> &Id {
        &self.id
    }

    /// Returns the node's kind.
    pub fn kind(&self) -> &NodeKind {
        &self.kind
    }

    /// Returns the current committed value.
    pub fn value(&self) -> LogicValue {
        self.value
    }

    /// Returns the pending value computed from the current inputs.
    pub fn new_value(&self) -> LogicValue {
        self.new_value
    }

    /// Returns the fan-out list.
    pub fn outputs(&self) -> &[OutputRef] {
        &self.outputs
    }

    /// Returns the number of recorded input slots.
    pub fn input_count(&self) -> usize {
        self.input_values.len()
    }

    /// Appends a fan-out entry.
    pub fn add_output(&mut self, output: OutputRef) {
        self.outputs.push(output);
    }

    /// Removes every fan-out entry pointing at `node`.
    pub fn remove_outputs_to(&mut self, node: &Id) {
        self.outputs.retain(|o| &o.node != node);
    }

    /// Records an incoming value at slot `source` and recomputes the pending
    /// value. Last write per slot wins; calling this repeatedly within one
    /// tick is safe.
    ///
    /// A `Buffer` has exactly one logical driver even though the slot key may
    /// change across rewiring, so it always replaces its single slot instead
    /// of accumulating per-source entries.
    pub fn update(&mut self, value: LogicValue, source: &Id) {
        if matches!(self.kind, NodeKind::Buffer) {
            self.input_values.clear();
        }
        self.input_values.insert(source.clone(), value);
        self.new_value = self.eval();
    }

    /// Drops the input slot keyed by `source` and recomputes the pending
    /// value. Used when a wire is disconnected.
    pub fn remove_input(&mut self, source: &Id) {
        self.input_values.remove(source);
        self.new_value = self.eval();
    }

    /// Number of input slots currently equal to `compare`.
    pub fn value_count(&self, compare: LogicValue) -> usize {
        self.input_values.values().filter(|v| **v == compare).count()
    }

    /// Evaluates the node's output from its recorded inputs.
    ///
    /// Pure: reads `input_values` (and, for value-holding kinds, the current
    /// committed value) and never mutates anything.
    pub fn eval(&self) -> LogicValue {
        match &self.kind {
            NodeKind::And => {
                // Universal fold: every input must be True; Unknown is not
                // True, so And degrades to False in its presence.
                if self.value_count(LogicValue::True) == self.input_values.len() {
                    LogicValue::True
                } else {
                    LogicValue::False
                }
            }
            NodeKind::Or => self.or_fold(),
            NodeKind::Nand => {
                // Short-circuits on the first False sighting.
                if self.value_count(LogicValue::False) > 0 {
                    LogicValue::True
                } else {
                    LogicValue::False
                }
            }
            NodeKind::Nor => self.or_fold().invert(),
            NodeKind::Not => self.single_input().invert(),
            NodeKind::Buffer | NodeKind::Output => self.single_input(),
            NodeKind::Input | NodeKind::Custom(_) => self.value,
        }
    }

    fn or_fold(&self) -> LogicValue {
        if self.value_count(LogicValue::True) > 0 {
            LogicValue::True
        } else if self.value_count(LogicValue::Unknown) > 0 {
            LogicValue::Unknown
        } else {
            LogicValue::False
        }
    }

    fn single_input(&self) -> LogicValue {
        self.input_values
            .values()
            .next()
            .copied()
            .unwrap_or(LogicValue::Unknown)
    }

    /// Sets the pending value directly. Only meaningful for `Input` kinds,
    /// whose value is driven externally rather than evaluated.
    pub(crate) fn set_pending(&mut self, value: LogicValue) {
        self.new_value = value;
    }

    /// Commits the pending value. Returns `true` if the committed value
    /// actually changed — the fixed-point termination signal.
    pub(crate) fn commit(&mut self) -> bool {
        if self.new_value == self.value {
            return false;
        }
        self.value = self.new_value;
        true
    }

    /// Forces both committed and pending value back to `Unknown`, blanking
    /// every recorded input slot (keys survive; the wiring is unchanged).
    pub(crate) fn force_unknown(&mut self) {
        self.value = LogicValue::Unknown;
        self.new_value = LogicValue::Unknown;
        for slot in self.input_values.values_mut() {
            *slot = LogicValue::Unknown;
        }
    }
}
