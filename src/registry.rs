//! Node factory registry for document compilation.
//!
//! The registry maps item type names to node constructors, letting editors
//! register custom kinds and letting compilation stay data-driven. Unknown
//! type names fall back to a value-holding node rather than failing, so a
//! malformed intermediate circuit never stops the session from responding.

use std::collections::HashMap;
use std::sync::Arc;

use crate::document::kinds;
use crate::node::{CircuitNode, NodeKind};
use crate::types::Id;
use crate::value::LogicValue;

/// Type alias for node factory functions.
pub type NodeFactory =
    Arc<dyn Fn(Id, &HashMap<String, String>) -> CircuitNode + Send + Sync>;

/// A registry of node factories keyed by item type name.
#[derive(Default)]
pub struct NodeRegistry {
    factories: HashMap<String, NodeFactory>,
}

impl NodeRegistry {
    /// Creates a new empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a factory under the given type name.
    pub fn register<F>(&mut self, name: impl Into<String>, factory: F)
    where
        F: Fn(Id, &HashMap<String, String>) -> CircuitNode + Send + Sync + 'static,
    {
        self.factories.insert(name.into(), Arc::new(factory));
    }

    /// Creates a node by type name, or `None` if the name is unregistered.
    pub fn create(
        &self,
        type_name: &str,
        id: Id,
        attrs: &HashMap<String, String>,
    ) -> Option<CircuitNode> {
        self.factories.get(type_name).map(|f| f(id, attrs))
    }

    /// Creates a node by type name, falling back to a value-holding node for
    /// unregistered names.
    pub fn create_or_fallback(
        &self,
        type_name: &str,
        id: Id,
        attrs: &HashMap<String, String>,
    ) -> CircuitNode {
        match self.create(type_name, id.clone(), attrs) {
            Some(node) => node,
            None => {
                tracing::warn!(kind = type_name, node = %id, "unknown node type; value will hold");
                CircuitNode::new(id, NodeKind::Custom(type_name.to_string()))
            }
        }
    }

    /// Returns true if a type name is registered.
    pub fn contains(&self, type_name: &str) -> bool {
        self.factories.contains_key(type_name)
    }

    /// Returns the number of registered types.
    pub fn len(&self) -> usize {
        self.factories.len()
    }

    /// Returns true if no types are registered.
    pub fn is_empty(&self) -> bool {
        self.factories.is_empty()
    }

    /// Returns an iterator over registered type names.
    pub fn type_names(&self) -> impl Iterator<Item = &String> {
        self.factories.keys()
    }

    /// Unregisters a type name.
    pub fn unregister(&mut self, type_name: &str) -> bool {
        self.factories.remove(type_name).is_some()
    }
}

impl std::fmt::Debug for NodeRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NodeRegistry")
            .field("registered_types", &self.factories.keys().collect::<Vec<_>>())
            .finish()
    }
}

fn gate(kind: NodeKind) -> impl Fn(Id, &HashMap<String, String>) -> CircuitNode {
    move |id, _attrs| CircuitNode::new(id, kind.clone())
}

/// Creates a registry with the built-in gate set.
///
/// `Freeport` compiles to a pass-through `Buffer` node; `InputNode` honors a
/// `value` attribute (`"0"`/`"1"`) as its initial stimulus.
pub fn create_default_registry() -> NodeRegistry {
    let mut registry = NodeRegistry::new();

    registry.register(kinds::AND, gate(NodeKind::And));
    registry.register(kinds::OR, gate(NodeKind::Or));
    registry.register(kinds::NAND, gate(NodeKind::Nand));
    registry.register(kinds::NOR, gate(NodeKind::Nor));
    registry.register(kinds::NOT, gate(NodeKind::Not));
    registry.register(kinds::BUFFER, gate(NodeKind::Buffer));
    registry.register(kinds::FREEPORT, gate(NodeKind::Buffer));
    registry.register(kinds::OUTPUT_NODE, gate(NodeKind::Output));

    registry.register(kinds::INPUT_NODE, |id, attrs| {
        let mut node = CircuitNode::new(id, NodeKind::Input);
        match attrs.get("value").map(String::as_str) {
            Some("1") => node.set_pending(LogicValue::True),
            Some("0") => node.set_pending(LogicValue::False),
            _ => {}
        }
        node
    });

    registry
}
