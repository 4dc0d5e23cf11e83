//! The live circuit graph.
//!
//! A [`Circuit`] owns every node in one simulation scope, the wiring between
//! them, the per-node change-listener registry, and the mirrored values of
//! the ports the editor observes. There is no ambient singleton: sessions
//! create a `Circuit` and hand it to the propagation engine by reference.

use std::collections::HashMap;

use thiserror::Error;

use crate::node::{CircuitNode, NodeKind, OutputRef};
use crate::types::Id;
use crate::value::LogicValue;

/// Errors raised by graph mutation entry points.
#[derive(Error, Debug)]
pub enum CircuitError {
    #[error("no node with id {0}")]
    NodeNotFound(Id),

    #[error("node {0} is not an input node and cannot be driven externally")]
    NotAnInput(Id),
}

/// Callback invoked when a node's committed value actually changes.
pub type ChangeListener = Box<dyn FnMut(&Id, LogicValue) + Send>;

/// An owned aggregate of nodes, wiring, listeners, and port mirrors.
#[derive(Default)]
pub struct Circuit {
    nodes: HashMap<Id, CircuitNode>,
    /// Listeners per node, optionally tagged with a removal key
    listeners: HashMap<Id, Vec<(Option<Id>, ChangeListener)>>,
    /// port id -> owning node id
    port_bindings: HashMap<Id, Id>,
    /// node id -> ports mirroring its value
    node_ports: HashMap<Id, Vec<Id>>,
    /// port id -> last mirrored value
    port_values: HashMap<Id, LogicValue>,
}

impl Circuit {
    /// Creates an empty circuit.
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a node into the arena.
    pub fn add_node(&mut self, node: CircuitNode) {
        self.nodes.insert(node.id().clone(), node);
    }

    /// Creates and inserts a node of the given kind.
    pub fn add(&mut self, id: impl Into<Id>, kind: NodeKind) -> Id {
        let id = id.into();
        self.add_node(CircuitNode::new(id.clone(), kind));
        id
    }

    /// Removes a node along with its wiring, listeners, and port mirrors.
    pub fn remove_node(&mut self, id: &Id) -> Option<CircuitNode> {
        let removed = self.nodes.remove(id)?;
        for node in self.nodes.values_mut() {
            node.remove_outputs_to(id);
        }
        self.listeners.remove(id);
        if let Some(ports) = self.node_ports.remove(id) {
            for port in ports {
                self.port_bindings.remove(&port);
                self.port_values.remove(&port);
            }
        }
        Some(removed)
    }

    /// Returns a node by id.
    pub fn node(&self, id: &Id) -> Option<&CircuitNode> {
        self.nodes.get(id)
    }

    /// Returns a node's committed value.
    pub fn value(&self, id: &Id) -> Option<LogicValue> {
        self.nodes.get(id).map(|n| n.value())
    }

    /// Returns the number of nodes.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Returns true if the circuit has no nodes.
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Iterates over all node ids.
    pub fn node_ids(&self) -> impl Iterator<Item = &Id> {
        self.nodes.keys()
    }

    /// Wires `source`'s output into `target`, keying the input slot by
    /// `slot` (conventionally the driving port's id).
    ///
    /// The source's current value is delivered into the new slot immediately
    /// so a following drain seeded with `target` settles correctly.
    pub fn connect_slot(&mut self, source: &Id, target: &Id, slot: &Id) -> Result<(), CircuitError> {
        if !self.nodes.contains_key(target) {
            return Err(CircuitError::NodeNotFound(target.clone()));
        }
        let value = {
            let src = self
                .nodes
                .get_mut(source)
                .ok_or_else(|| CircuitError::NodeNotFound(source.clone()))?;
            src.add_output(OutputRef::new(target.clone(), slot.clone()));
            src.value()
        };
        if let Some(dst) = self.nodes.get_mut(target) {
            dst.update(value, slot);
        }
        Ok(())
    }

    /// Wires `source` into `target` using the source's own id as slot key.
    pub fn connect(&mut self, source: &Id, target: &Id) -> Result<(), CircuitError> {
        self.connect_slot(source, target, &source.clone())
    }

    /// Removes all wiring from `source` to `target` and drops the associated
    /// input slots on the target.
    pub fn disconnect(&mut self, source: &Id, target: &Id) -> Result<(), CircuitError> {
        let slots: Vec<Id> = {
            let src = self
                .nodes
                .get_mut(source)
                .ok_or_else(|| CircuitError::NodeNotFound(source.clone()))?;
            let slots = src
                .outputs()
                .iter()
                .filter(|o| &o.node == target)
                .map(|o| o.slot.clone())
                .collect();
            src.remove_outputs_to(target);
            slots
        };
        if let Some(dst) = self.nodes.get_mut(target) {
            for slot in &slots {
                dst.remove_input(slot);
            }
        }
        Ok(())
    }

    /// Binds a port to a node so the port mirrors the node's value for
    /// observation.
    pub fn bind_port(&mut self, port: impl Into<Id>, node: &Id) {
        let port = port.into();
        let value = self.value(node).unwrap_or(LogicValue::Unknown);
        self.port_bindings.insert(port.clone(), node.clone());
        self.node_ports.entry(node.clone()).or_default().push(port.clone());
        self.port_values.insert(port, value);
    }

    /// Returns the node a port is bound to.
    pub fn port_node(&self, port: &Id) -> Option<&Id> {
        self.port_bindings.get(port)
    }

    /// Returns a port's mirrored value.
    pub fn port_value(&self, port: &Id) -> Option<LogicValue> {
        self.port_values.get(port).copied()
    }

    /// Subscribes a listener to a node's `change` events. Anonymous
    /// listeners live as long as the node.
    pub fn on_change(&mut self, node: &Id, listener: ChangeListener) {
        self.listeners
            .entry(node.clone())
            .or_default()
            .push((None, listener));
    }

    /// Subscribes a listener under a removal key, replacing any listener
    /// previously registered on this node under the same key.
    pub fn on_change_keyed(&mut self, node: &Id, key: impl Into<Id>, listener: ChangeListener) {
        let key = key.into();
        let entries = self.listeners.entry(node.clone()).or_default();
        entries.retain(|(k, _)| k.as_ref() != Some(&key));
        entries.push((Some(key), listener));
    }

    /// Removes the listener registered on a node under `key`.
    pub fn remove_listener(&mut self, node: &Id, key: &Id) -> bool {
        let Some(entries) = self.listeners.get_mut(node) else {
            return false;
        };
        let before = entries.len();
        entries.retain(|(k, _)| k.as_ref() != Some(key));
        before != entries.len()
    }

    /// Number of listeners subscribed to a node.
    pub fn listener_count(&self, node: &Id) -> usize {
        self.listeners.get(node).map_or(0, Vec::len)
    }

    /// Drives an externally settable node to `value`, scheduling it for the
    /// next drain. Only `Input` nodes accept external stimulus.
    pub fn set_value(&mut self, id: &Id, value: LogicValue) -> Result<(), CircuitError> {
        let node = self
            .nodes
            .get_mut(id)
            .ok_or_else(|| CircuitError::NodeNotFound(id.clone()))?;
        if !matches!(node.kind(), NodeKind::Input) {
            return Err(CircuitError::NotAnInput(id.clone()));
        }
        node.set_pending(value);
        Ok(())
    }

    /// Commits a node's pending value and forwards it along the fan-out.
    ///
    /// Returns the directly downstream node ids when the value changed — the
    /// engine's next frontier — or an empty list when the node was already
    /// stable (the fixed-point termination signal). The change event fires
    /// synchronously, after the commit and before the fan-out delivery.
    pub fn propagate_node(&mut self, id: &Id) -> Vec<Id> {
        let Some(node) = self.nodes.get_mut(id) else {
            tracing::warn!(node = %id, "propagate on missing node ignored");
            return Vec::new();
        };
        if !node.commit() {
            return Vec::new();
        }
        let value = node.value();
        let outputs: Vec<OutputRef> = node.outputs().to_vec();

        self.mirror_ports(id, value);
        self.fire_change(id, value);

        let mut frontier = Vec::with_capacity(outputs.len());
        for out in outputs {
            match self.nodes.get_mut(&out.node) {
                Some(downstream) => downstream.update(value, &out.slot),
                None => {
                    tracing::warn!(node = %out.node, "fan-out to missing node dropped");
                    continue;
                }
            }
            frontier.push(out.node);
        }
        frontier
    }

    /// Forces every node back to `Unknown`, firing change events, and
    /// returns all node ids so the caller can reseed a full drain.
    pub fn reset(&mut self) -> Vec<Id> {
        let ids: Vec<Id> = self.nodes.keys().cloned().collect();
        for id in &ids {
            if let Some(node) = self.nodes.get_mut(id) {
                node.force_unknown();
            }
            self.mirror_ports(id, LogicValue::Unknown);
            self.fire_change(id, LogicValue::Unknown);
        }
        ids
    }

    fn mirror_ports(&mut self, node: &Id, value: LogicValue) {
        if let Some(ports) = self.node_ports.get(node) {
            for port in ports {
                self.port_values.insert(port.clone(), value);
            }
        }
    }

    fn fire_change(&mut self, node: &Id, value: LogicValue) {
        if let Some(callbacks) = self.listeners.get_mut(node) {
            for (_, callback) in callbacks.iter_mut() {
                callback(node, value);
            }
        }
    }
}

impl std::fmt::Debug for Circuit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Circuit")
            .field("nodes", &self.nodes.len())
            .field("ports", &self.port_bindings.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn ids(a: &str) -> Id {
        a.to_string()
    }

    #[test]
    fn test_connect_delivers_current_value() {
        let mut circuit = Circuit::new();
        let a = circuit.add("a", NodeKind::Input);
        let b = circuit.add("b", NodeKind::Buffer);

        circuit.set_value(&a, LogicValue::True).unwrap();
        circuit.propagate_node(&a);
        circuit.connect(&a, &b).unwrap();

        // The buffer's pending value reflects the already-committed input.
        assert_eq!(circuit.node(&b).unwrap().new_value(), LogicValue::True);
    }

    #[test]
    fn test_set_value_rejects_non_input() {
        let mut circuit = Circuit::new();
        let g = circuit.add("g", NodeKind::And);
        let err = circuit.set_value(&g, LogicValue::True).unwrap_err();
        assert!(matches!(err, CircuitError::NotAnInput(_)));

        let missing = circuit.set_value(&ids("zz"), LogicValue::True).unwrap_err();
        assert!(matches!(missing, CircuitError::NodeNotFound(_)));
    }

    #[test]
    fn test_propagate_is_idempotent() {
        let mut circuit = Circuit::new();
        let a = circuit.add("a", NodeKind::Input);
        let fired = Arc::new(AtomicUsize::new(0));
        let counter = fired.clone();
        circuit.on_change(&a, Box::new(move |_, _| {
            counter.fetch_add(1, Ordering::SeqCst);
        }));

        circuit.set_value(&a, LogicValue::True).unwrap();
        circuit.propagate_node(&a);
        // No new input: the second call must not fire a second change event.
        let frontier = circuit.propagate_node(&a);

        assert!(frontier.is_empty());
        assert_eq!(fired.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_propagate_returns_frontier() {
        let mut circuit = Circuit::new();
        let a = circuit.add("a", NodeKind::Input);
        let b = circuit.add("b", NodeKind::Buffer);
        let c = circuit.add("c", NodeKind::Buffer);
        circuit.connect(&a, &b).unwrap();
        circuit.connect(&a, &c).unwrap();

        circuit.set_value(&a, LogicValue::True).unwrap();
        let frontier = circuit.propagate_node(&a);
        assert_eq!(frontier, vec![b.clone(), c.clone()]);
        assert_eq!(circuit.node(&b).unwrap().new_value(), LogicValue::True);
    }

    #[test]
    fn test_port_mirror() {
        let mut circuit = Circuit::new();
        let a = circuit.add("a", NodeKind::Input);
        circuit.bind_port("p1", &a);
        assert_eq!(circuit.port_value(&ids("p1")), Some(LogicValue::Unknown));

        circuit.set_value(&a, LogicValue::True).unwrap();
        circuit.propagate_node(&a);
        assert_eq!(circuit.port_value(&ids("p1")), Some(LogicValue::True));
    }

    #[test]
    fn test_reset_forces_unknown_and_fires() {
        let mut circuit = Circuit::new();
        let a = circuit.add("a", NodeKind::Input);
        let fired = Arc::new(AtomicUsize::new(0));
        let counter = fired.clone();
        circuit.on_change(&a, Box::new(move |_, _| {
            counter.fetch_add(1, Ordering::SeqCst);
        }));

        circuit.set_value(&a, LogicValue::True).unwrap();
        circuit.propagate_node(&a);

        let seeds = circuit.reset();
        assert_eq!(seeds.len(), 1);
        assert_eq!(circuit.value(&a), Some(LogicValue::Unknown));
        // One change from the commit, one from the reset.
        assert_eq!(fired.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_keyed_listener_removal() {
        let mut circuit = Circuit::new();
        let a = circuit.add("a", NodeKind::Input);
        let fired = Arc::new(AtomicUsize::new(0));

        let counter = fired.clone();
        circuit.on_change_keyed(&a, "obs", Box::new(move |_, _| {
            counter.fetch_add(1, Ordering::SeqCst);
        }));
        // Re-registering under the same key replaces, never stacks.
        let counter = fired.clone();
        circuit.on_change_keyed(&a, "obs", Box::new(move |_, _| {
            counter.fetch_add(1, Ordering::SeqCst);
        }));
        assert_eq!(circuit.listener_count(&a), 1);

        assert!(circuit.remove_listener(&a, &ids("obs")));
        assert_eq!(circuit.listener_count(&a), 0);

        circuit.set_value(&a, LogicValue::True).unwrap();
        circuit.propagate_node(&a);
        assert_eq!(fired.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_disconnect_drops_slot() {
        let mut circuit = Circuit::new();
        let a = circuit.add("a", NodeKind::Input);
        let g = circuit.add("g", NodeKind::Or);
        circuit.connect(&a, &g).unwrap();

        circuit.set_value(&a, LogicValue::True).unwrap();
        circuit.propagate_node(&a);
        assert_eq!(circuit.node(&g).unwrap().new_value(), LogicValue::True);

        circuit.disconnect(&a, &g).unwrap();
        assert_eq!(circuit.node(&g).unwrap().input_count(), 0);
        assert!(circuit.node(&a).unwrap().outputs().is_empty());
    }

    #[test]
    fn test_remove_node_cleans_wiring() {
        let mut circuit = Circuit::new();
        let a = circuit.add("a", NodeKind::Input);
        let b = circuit.add("b", NodeKind::Buffer);
        circuit.connect(&a, &b).unwrap();
        circuit.bind_port("p", &b);

        circuit.remove_node(&b);
        assert!(circuit.node(&a).unwrap().outputs().is_empty());
        assert_eq!(circuit.port_value(&ids("p")), None);
    }
}
