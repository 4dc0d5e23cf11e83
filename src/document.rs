//! The serialized circuit document model.
//!
//! A [`Document`] is the interchange shape shared with the editor and file
//! layer: flat id-keyed maps of items, connections, ports, and groups, with
//! composites carrying a nested [`IntegratedCircuit`] of the same shape. The
//! module validates documents atomically (load-or-fail) and compiles them
//! into a live [`Circuit`].

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::circuit::Circuit;
use crate::registry::NodeRegistry;
use crate::types::Id;
use crate::value::LogicValue;

/// Canonical item type names understood by the default registry.
pub mod kinds {
    pub const AND: &str = "And";
    pub const OR: &str = "Or";
    pub const NAND: &str = "Nand";
    pub const NOR: &str = "Nor";
    pub const NOT: &str = "Not";
    pub const BUFFER: &str = "Buffer";
    pub const INPUT_NODE: &str = "InputNode";
    pub const OUTPUT_NODE: &str = "OutputNode";
    pub const FREEPORT: &str = "Freeport";
}

/// Errors raised by document validation.
///
/// All of these are structural: the referenced entity does not resolve, so
/// the document is rejected before any node is created.
#[derive(Error, Debug)]
pub enum DocumentError {
    #[error("connection {connection} references missing port {port}")]
    DanglingConnection { connection: Id, port: Id },

    #[error("port {port} references missing item {item}")]
    DanglingPort { port: Id, item: Id },

    #[error("item {item} references missing port {port}")]
    DanglingPortRef { item: Id, port: Id },

    #[error("boundary port {port} of composite {item} has no internal node binding")]
    UnboundBoundaryPort { port: Id, item: Id },

    #[error("boundary port {port} references missing internal node {node}")]
    DanglingBoundaryNode { port: Id, node: Id },

    #[error("integrated circuit snapshot on item {item} is not parseable: {source}")]
    BadSnapshot {
        item: Id,
        source: serde_json::Error,
    },

    #[error("id {0} is defined in more than one scope of the document")]
    DuplicateId(Id),
}

/// Which side of an element a port represents.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Polarity {
    Input,
    Output,
}

/// Spatial orientation of a port. Rendering metadata only; the simulation
/// never consults it.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Orientation {
    #[default]
    Left,
    Top,
    Right,
    Bottom,
}

/// A boundary attachment point between an item and the wiring layer.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Port {
    pub id: Id,
    /// Owning element id
    pub element_id: Id,
    #[serde(rename = "type")]
    pub polarity: Polarity,
    #[serde(default)]
    pub orientation: Orientation,
    /// Mirror of the driven node's value, for observation
    #[serde(default)]
    pub value: LogicValue,
    /// Synthetic mid-wire junction port created when a wire is split
    #[serde(default)]
    pub is_freeport: bool,
    /// For composite boundary ports: the internal node this port attaches
    /// to. Ordinary ports attach to their owning item's node.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub node_id: Option<Id>,
}

impl Port {
    /// Creates an ordinary port on an element.
    pub fn new(id: impl Into<Id>, element_id: impl Into<Id>, polarity: Polarity) -> Self {
        Self {
            id: id.into(),
            element_id: element_id.into(),
            polarity,
            orientation: Orientation::default(),
            value: LogicValue::Unknown,
            is_freeport: false,
            node_id: None,
        }
    }

    /// Sets the rendering orientation.
    pub fn with_orientation(mut self, orientation: Orientation) -> Self {
        self.orientation = orientation;
        self
    }

    /// Marks this as a freeport.
    pub fn freeport(mut self) -> Self {
        self.is_freeport = true;
        self
    }
}

/// A placed element: one real node, a freeport, or a folded composite.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Item {
    pub id: Id,
    /// Type name resolved through the node registry
    #[serde(rename = "type")]
    pub kind: String,
    /// Ports owned by this item
    #[serde(default)]
    pub port_ids: Vec<Id>,
    /// Present iff this item is a folded composite
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub integrated_circuit: Option<IntegratedCircuit>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group_id: Option<Id>,
    /// Free-form attributes consumed by node factories
    #[serde(default)]
    pub properties: HashMap<String, String>,
}

impl Item {
    /// Creates a new item of the given type.
    pub fn new(id: impl Into<Id>, kind: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            kind: kind.into(),
            port_ids: Vec::new(),
            integrated_circuit: None,
            group_id: None,
            properties: HashMap::new(),
        }
    }

    /// Adds a port reference.
    pub fn with_port(mut self, port_id: impl Into<Id>) -> Self {
        self.port_ids.push(port_id.into());
        self
    }

    /// Adds a factory attribute.
    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }

    /// Returns true if this item wraps a folded subcircuit.
    pub fn is_composite(&self) -> bool {
        self.integrated_circuit.is_some()
    }
}

/// A directed edge between two port ids.
///
/// `connection_chain_id` groups the physical wire segments (through zero or
/// more freeports) that make up one logical wire; all segments of a chain
/// observe the same propagated value.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Connection {
    pub id: Id,
    /// Source port id
    pub source: Id,
    /// Target port id
    pub target: Id,
    pub connection_chain_id: Id,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group_id: Option<Id>,
}

impl Connection {
    /// Creates a connection that is its own chain.
    pub fn new(id: impl Into<Id>, source: impl Into<Id>, target: impl Into<Id>) -> Self {
        let id = id.into();
        Self {
            id: id.clone(),
            source: source.into(),
            target: target.into(),
            connection_chain_id: id,
            group_id: None,
        }
    }

    /// Assigns the chain this segment belongs to.
    pub fn in_chain(mut self, chain: impl Into<Id>) -> Self {
        self.connection_chain_id = chain.into();
        self
    }
}

/// A named selection of items and connections.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Group {
    pub id: Id,
    #[serde(default)]
    pub item_ids: Vec<Id>,
    #[serde(default)]
    pub connection_ids: Vec<Id>,
}

/// A folded subcircuit stored on a composite item.
///
/// `serialized_state` is a pristine JSON snapshot of the originating
/// document, kept so the composite can be reopened for editing without
/// reverse-engineering the folded, retyped representation.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IntegratedCircuit {
    #[serde(flatten)]
    pub circuit: Document,
    pub serialized_state: String,
}

/// A full circuit document: flat id-keyed maps of every entity.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Document {
    #[serde(default)]
    pub items: HashMap<Id, Item>,
    #[serde(default)]
    pub connections: HashMap<Id, Connection>,
    #[serde(default)]
    pub ports: HashMap<Id, Port>,
    #[serde(default)]
    pub groups: HashMap<Id, Group>,
}

impl Document {
    /// Creates an empty document.
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts an item.
    pub fn add_item(&mut self, item: Item) {
        self.items.insert(item.id.clone(), item);
    }

    /// Inserts a port.
    pub fn add_port(&mut self, port: Port) {
        self.ports.insert(port.id.clone(), port);
    }

    /// Inserts a connection.
    pub fn add_connection(&mut self, connection: Connection) {
        self.connections.insert(connection.id.clone(), connection);
    }

    /// Inserts a group.
    pub fn add_group(&mut self, group: Group) {
        self.groups.insert(group.id.clone(), group);
    }

    /// Merges another document fragment into this one.
    pub fn merge(&mut self, fragment: Document) {
        self.items.extend(fragment.items);
        self.connections.extend(fragment.connections);
        self.ports.extend(fragment.ports);
        self.groups.extend(fragment.groups);
    }

    /// Collects every id appearing anywhere in this document, including all
    /// nested integrated circuits. Uses an explicit worklist so arbitrarily
    /// deep composites cannot overflow the stack.
    pub fn all_ids(&self) -> Vec<Id> {
        let mut ids = Vec::new();
        let mut work: Vec<&Document> = vec![self];
        while let Some(level) = work.pop() {
            ids.extend(level.ports.keys().cloned());
            ids.extend(level.items.keys().cloned());
            ids.extend(level.connections.keys().cloned());
            ids.extend(level.connections.values().map(|c| c.connection_chain_id.clone()));
            ids.extend(level.groups.keys().cloned());
            for item in level.items.values() {
                if let Some(ic) = &item.integrated_circuit {
                    work.push(&ic.circuit);
                }
            }
        }
        ids
    }

    /// Validates every reference in the document, recursing into nested
    /// integrated circuits, and enforces id uniqueness across all scopes —
    /// an id reused between an outer level and a nested circuit would let
    /// one node silently shadow another at compile time.
    ///
    /// Called before compilation so a structurally corrupt document is
    /// rejected whole, never partially loaded.
    pub fn validate(&self) -> Result<(), DocumentError> {
        let mut seen: HashSet<&Id> = HashSet::new();
        let mut work: Vec<&Document> = vec![self];
        while let Some(level) = work.pop() {
            level.validate_level()?;
            for id in level
                .items
                .keys()
                .chain(level.ports.keys())
                .chain(level.connections.keys())
                .chain(level.groups.keys())
            {
                if !seen.insert(id) {
                    return Err(DocumentError::DuplicateId(id.clone()));
                }
            }
            for item in level.items.values() {
                if let Some(ic) = &item.integrated_circuit {
                    serde_json::from_str::<Document>(&ic.serialized_state).map_err(|source| {
                        DocumentError::BadSnapshot {
                            item: item.id.clone(),
                            source,
                        }
                    })?;
                    work.push(&ic.circuit);
                }
            }
        }
        Ok(())
    }

    fn validate_level(&self) -> Result<(), DocumentError> {
        for connection in self.connections.values() {
            for endpoint in [&connection.source, &connection.target] {
                if !self.ports.contains_key(endpoint) {
                    return Err(DocumentError::DanglingConnection {
                        connection: connection.id.clone(),
                        port: endpoint.clone(),
                    });
                }
            }
        }
        for port in self.ports.values() {
            let Some(item) = self.items.get(&port.element_id) else {
                return Err(DocumentError::DanglingPort {
                    port: port.id.clone(),
                    item: port.element_id.clone(),
                });
            };
            if let Some(ic) = &item.integrated_circuit {
                let Some(node) = &port.node_id else {
                    return Err(DocumentError::UnboundBoundaryPort {
                        port: port.id.clone(),
                        item: item.id.clone(),
                    });
                };
                if !ic.circuit.items.contains_key(node) {
                    return Err(DocumentError::DanglingBoundaryNode {
                        port: port.id.clone(),
                        node: node.clone(),
                    });
                }
            }
        }
        for item in self.items.values() {
            for port_id in &item.port_ids {
                if !self.ports.contains_key(port_id) {
                    return Err(DocumentError::DanglingPortRef {
                        item: item.id.clone(),
                        port: port_id.clone(),
                    });
                }
            }
        }
        Ok(())
    }

    /// Compiles the document into a live [`Circuit`].
    ///
    /// Validation runs first; on success one node is created per
    /// non-composite item (composites contribute their internal nodes), every
    /// port is bound to its node for value mirroring, and every connection is
    /// wired with the source port id as the input slot key. Wiring order is
    /// sorted by connection id so fan-out ordering, and therefore change
    /// event ordering, is reproducible across runs.
    pub fn compile(&self, registry: &NodeRegistry) -> Result<Circuit, DocumentError> {
        self.validate()?;

        let mut circuit = Circuit::new();
        // port id -> driven node id, across all nesting levels
        let mut port_nodes: HashMap<Id, Id> = HashMap::new();

        let mut work: Vec<&Document> = vec![self];
        while let Some(level) = work.pop() {
            let mut item_ids: Vec<&Id> = level.items.keys().collect();
            item_ids.sort();
            for id in item_ids {
                let item = &level.items[id];
                if let Some(ic) = &item.integrated_circuit {
                    work.push(&ic.circuit);
                } else {
                    circuit.add_node(registry.create_or_fallback(
                        &item.kind,
                        item.id.clone(),
                        &item.properties,
                    ));
                }
            }
            for port in level.ports.values() {
                let node = port
                    .node_id
                    .clone()
                    .unwrap_or_else(|| port.element_id.clone());
                port_nodes.insert(port.id.clone(), node);
            }
        }

        // Bind after all levels are collected so boundary ports resolve to
        // nodes created from a nested level.
        for (port, node) in &port_nodes {
            circuit.bind_port(port.clone(), node);
        }

        let mut work: Vec<&Document> = vec![self];
        while let Some(level) = work.pop() {
            let mut connection_ids: Vec<&Id> = level.connections.keys().collect();
            connection_ids.sort();
            for id in connection_ids {
                let connection = &level.connections[id];
                let source = &port_nodes[&connection.source];
                let target = &port_nodes[&connection.target];
                if let Err(err) = circuit.connect_slot(source, target, &connection.source) {
                    // Validation makes this unreachable for well-formed
                    // registries; surface it rather than corrupting wiring.
                    tracing::warn!(connection = %connection.id, %err, "skipping unwirable connection");
                }
            }
            for item in level.items.values() {
                if let Some(ic) = &item.integrated_circuit {
                    work.push(&ic.circuit);
                }
            }
        }

        Ok(circuit)
    }
}
