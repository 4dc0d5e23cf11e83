//! Integrated-circuit composition.
//!
//! [`fold`] packs a source document into a single reusable composite item
//! with boundary buffer ports; [`instantiate`] deep-copies a composite
//! fragment and remaps every identity through a single append-only
//! translation table, so any number of instances of the same subcircuit can
//! coexist in one document without sharing a single id.

use std::collections::{HashMap, HashSet};

use thiserror::Error;

use crate::document::{
    kinds, Document, IntegratedCircuit, Item, Orientation, Polarity, Port,
};
use crate::types::Id;

/// Errors raised at the composer boundary.
///
/// Both variants are detected before anything is inserted into the hosting
/// document, so a failed fold or instantiation never leaves a partial graph.
#[derive(Error, Debug)]
pub enum ComposerError {
    #[error("no translation recorded for id {0}; fragment is structurally corrupt")]
    MissingTranslation(Id),

    #[error("duplicate identity {0} encountered during remapping")]
    IdentityCollision(Id),

    #[error("snapshot serialization failed: {0}")]
    Snapshot(#[from] serde_json::Error),
}

/// Deterministic generator of fresh ids.
///
/// Fresh ids are a monotonic counter checked against a taken-set, which is
/// seeded with every id of the hosting document so a freshly minted id can
/// never collide with an existing one.
#[derive(Debug, Default)]
pub struct IdFactory {
    next: u64,
    taken: HashSet<Id>,
}

impl IdFactory {
    /// Creates a factory with an empty taken-set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a factory reserving every id already present in `host`,
    /// including ids inside nested integrated circuits.
    pub fn for_document(host: &Document) -> Self {
        let mut factory = Self::new();
        factory.reserve(host.all_ids());
        factory
    }

    /// Marks ids as taken.
    pub fn reserve(&mut self, ids: impl IntoIterator<Item = Id>) {
        self.taken.extend(ids);
    }

    /// Mints a fresh id distinct from every reserved or previously minted id.
    pub fn fresh(&mut self) -> Id {
        loop {
            let candidate = format!("e{}", self.next);
            self.next += 1;
            if self.taken.insert(candidate.clone()) {
                return candidate;
            }
        }
    }
}

/// Append-only id translation table for one remap operation.
#[derive(Debug, Default)]
pub struct IdTranslation {
    map: HashMap<Id, Id>,
    targets: HashSet<Id>,
}

impl IdTranslation {
    /// Creates an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns true if `old` already has a translation.
    pub fn contains(&self, old: &Id) -> bool {
        self.map.contains_key(old)
    }

    /// Records `old -> fresh`.
    ///
    /// Recording the same source id twice means the id appears in two scopes
    /// of the fragment at once; recording the same target twice means the
    /// fresh-id supply violated injectivity. Both are identity collisions.
    pub fn record(&mut self, old: Id, fresh: Id) -> Result<(), ComposerError> {
        if self.map.contains_key(&old) {
            return Err(ComposerError::IdentityCollision(old));
        }
        if !self.targets.insert(fresh.clone()) {
            return Err(ComposerError::IdentityCollision(fresh));
        }
        self.map.insert(old, fresh);
        Ok(())
    }

    /// Translates an id, failing on ids that were never collected — the
    /// signature of a dangling reference in the fragment.
    pub fn translate(&self, old: &Id) -> Result<Id, ComposerError> {
        self.map
            .get(old)
            .cloned()
            .ok_or_else(|| ComposerError::MissingTranslation(old.clone()))
    }

    /// Number of recorded translations.
    pub fn len(&self) -> usize {
        self.map.len()
    }

    /// Returns true if nothing has been recorded.
    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }
}

/// Folds a source document into a composite item fragment.
///
/// The returned fragment holds exactly one item — the composite, typed
/// `kind_name`, carrying the deep-copied circuit and a pristine JSON snapshot
/// of `source` — plus its synthesized boundary ports. Input nodes of the
/// source are retyped to buffers and exposed through left-oriented,
/// outward-facing output ports; output nodes mirror that with right-oriented
/// input ports.
pub fn fold(
    source: &Document,
    kind_name: &str,
    ids: &mut IdFactory,
) -> Result<Document, ComposerError> {
    let serialized_state = serde_json::to_string(source)?;
    let mut folded = source.clone();

    let composite_id = ids.fresh();
    let mut composite = Item::new(composite_id.clone(), kind_name);
    let mut boundary_ports: HashMap<Id, Port> = HashMap::new();

    let mut item_ids: Vec<Id> = folded.items.keys().cloned().collect();
    item_ids.sort();
    for item_id in item_ids {
        let Some(item) = folded.items.get_mut(&item_id) else {
            continue;
        };
        let (polarity, orientation) = match item.kind.as_str() {
            kinds::INPUT_NODE => (Polarity::Output, Orientation::Left),
            kinds::OUTPUT_NODE => (Polarity::Input, Orientation::Right),
            _ => continue,
        };
        item.kind = kinds::BUFFER.to_string();

        let port_id = ids.fresh();
        let mut port = Port::new(port_id.clone(), composite_id.clone(), polarity)
            .with_orientation(orientation);
        port.node_id = Some(item_id);
        composite.port_ids.push(port_id.clone());
        boundary_ports.insert(port_id, port);
    }

    tracing::debug!(
        composite = %composite_id,
        boundary_ports = composite.port_ids.len(),
        "folded document into composite"
    );

    composite.integrated_circuit = Some(IntegratedCircuit {
        circuit: folded,
        serialized_state,
    });

    let mut fragment = Document::new();
    fragment.add_item(composite);
    fragment.ports = boundary_ports;
    Ok(fragment)
}

/// Deep-copies a composite fragment with every id replaced by a fresh one.
///
/// A single translation table spans all nesting levels, so an id reused
/// across levels of the fragment is caught as a collision, and translations
/// are applied in a fixed order per level: ports, items, item port
/// back-references, connections (endpoints and chain), groups, then group
/// back-references. Ids are collected and applied with explicit worklists;
/// nesting depth never grows the call stack.
///
/// On success the caller merges the returned document into the host; on any
/// error the host was never touched.
pub fn instantiate(fragment: &Document, ids: &mut IdFactory) -> Result<Document, ComposerError> {
    let mut table = IdTranslation::new();
    collect_ids(fragment, &mut table, ids)?;

    let mut copy = fragment.clone();
    let mut work: Vec<&mut Document> = vec![&mut copy];
    while let Some(level) = work.pop() {
        remap_level(level, &table)?;
        for item in level.items.values_mut() {
            if let Some(ic) = item.integrated_circuit.as_mut() {
                work.push(&mut ic.circuit);
            }
        }
    }

    tracing::debug!(translated = table.len(), "instantiated composite fragment");
    Ok(copy)
}

/// Assigns one fresh id per port, item, connection, chain, and group across
/// every nesting level of the fragment.
fn collect_ids(
    fragment: &Document,
    table: &mut IdTranslation,
    ids: &mut IdFactory,
) -> Result<(), ComposerError> {
    let mut work: Vec<&Document> = vec![fragment];
    while let Some(level) = work.pop() {
        for id in level.ports.keys() {
            table.record(id.clone(), ids.fresh())?;
        }
        for id in level.items.keys() {
            table.record(id.clone(), ids.fresh())?;
        }
        for connection in level.connections.values() {
            // A chain id conventionally equals its first segment's id, so
            // both records are guarded rather than treated as collisions.
            if !table.contains(&connection.id) {
                table.record(connection.id.clone(), ids.fresh())?;
            }
            if !table.contains(&connection.connection_chain_id) {
                table.record(connection.connection_chain_id.clone(), ids.fresh())?;
            }
        }
        for id in level.groups.keys() {
            table.record(id.clone(), ids.fresh())?;
        }
        for item in level.items.values() {
            if let Some(ic) = &item.integrated_circuit {
                work.push(&ic.circuit);
            }
        }
    }
    Ok(())
}

/// Applies the translation table to one nesting level.
fn remap_level(level: &mut Document, table: &IdTranslation) -> Result<(), ComposerError> {
    // Ports
    let ports = std::mem::take(&mut level.ports);
    for (_, mut port) in ports {
        port.id = table.translate(&port.id)?;
        port.element_id = table.translate(&port.element_id)?;
        if let Some(node) = &port.node_id {
            port.node_id = Some(table.translate(node)?);
        }
        level.ports.insert(port.id.clone(), port);
    }

    // Items
    let items = std::mem::take(&mut level.items);
    for (_, mut item) in items {
        item.id = table.translate(&item.id)?;
        level.items.insert(item.id.clone(), item);
    }

    // Item -> port back-references
    for item in level.items.values_mut() {
        for port_id in item.port_ids.iter_mut() {
            *port_id = table.translate(port_id)?;
        }
    }

    // Connections: endpoints and chain
    let connections = std::mem::take(&mut level.connections);
    for (_, mut connection) in connections {
        connection.id = table.translate(&connection.id)?;
        connection.source = table.translate(&connection.source)?;
        connection.target = table.translate(&connection.target)?;
        connection.connection_chain_id = table.translate(&connection.connection_chain_id)?;
        level.connections.insert(connection.id.clone(), connection);
    }

    // Groups
    let groups = std::mem::take(&mut level.groups);
    for (_, mut group) in groups {
        group.id = table.translate(&group.id)?;
        level.groups.insert(group.id.clone(), group);
    }

    // Group back-references
    for item in level.items.values_mut() {
        if let Some(group) = &item.group_id {
            item.group_id = Some(table.translate(group)?);
        }
    }
    for connection in level.connections.values_mut() {
        if let Some(group) = &connection.group_id {
            connection.group_id = Some(table.translate(group)?);
        }
    }
    for group in level.groups.values_mut() {
        for id in group.item_ids.iter_mut().chain(group.connection_ids.iter_mut()) {
            *id = table.translate(id)?;
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::Connection;

    fn latch_document() -> Document {
        let mut doc = Document::new();
        doc.add_item(Item::new("in_r", kinds::INPUT_NODE).with_port("p_r"));
        doc.add_item(Item::new("in_s", kinds::INPUT_NODE).with_port("p_s"));
        doc.add_item(
            Item::new("nor1", kinds::NOR)
                .with_port("p_nor1_a")
                .with_port("p_nor1_out"),
        );
        doc.add_item(Item::new("out_q", kinds::OUTPUT_NODE).with_port("p_q"));
        doc.add_port(Port::new("p_r", "in_r", Polarity::Output));
        doc.add_port(Port::new("p_s", "in_s", Polarity::Output));
        doc.add_port(Port::new("p_nor1_a", "nor1", Polarity::Input));
        doc.add_port(Port::new("p_nor1_out", "nor1", Polarity::Output));
        doc.add_port(Port::new("p_q", "out_q", Polarity::Input));
        doc.add_connection(Connection::new("c_r", "p_r", "p_nor1_a"));
        doc.add_connection(Connection::new("c_q", "p_nor1_out", "p_q"));
        doc
    }

    #[test]
    fn test_id_factory_skips_taken() {
        let mut ids = IdFactory::new();
        ids.reserve(["e0".to_string(), "e1".to_string()]);
        assert_eq!(ids.fresh(), "e2");
        assert_eq!(ids.fresh(), "e3");
    }

    #[test]
    fn test_translation_collisions() {
        let mut table = IdTranslation::new();
        table.record("a".into(), "x".into()).unwrap();

        let dup_source = table.record("a".into(), "y".into()).unwrap_err();
        assert!(matches!(dup_source, ComposerError::IdentityCollision(id) if id == "a"));

        let dup_target = table.record("b".into(), "x".into()).unwrap_err();
        assert!(matches!(dup_target, ComposerError::IdentityCollision(id) if id == "x"));
    }

    #[test]
    fn test_fold_retypes_and_exposes_boundary() {
        let source = latch_document();
        let mut ids = IdFactory::for_document(&source);
        let fragment = fold(&source, "Latch", &mut ids).unwrap();

        assert_eq!(fragment.items.len(), 1);
        let composite = fragment.items.values().next().unwrap();
        assert!(composite.is_composite());
        // Two inputs and one output expose three boundary ports.
        assert_eq!(composite.port_ids.len(), 3);
        assert_eq!(fragment.ports.len(), 3);

        let ic = composite.integrated_circuit.as_ref().unwrap();
        assert_eq!(ic.circuit.items["in_r"].kind, kinds::BUFFER);
        assert_eq!(ic.circuit.items["out_q"].kind, kinds::BUFFER);
        assert_eq!(ic.circuit.items["nor1"].kind, kinds::NOR);

        // The snapshot is the pristine source, not the retyped copy.
        let snapshot: Document = serde_json::from_str(&ic.serialized_state).unwrap();
        assert_eq!(snapshot.items["in_r"].kind, kinds::INPUT_NODE);

        // Boundary ports face outward with the conventional orientations.
        for port in fragment.ports.values() {
            let internal = port.node_id.as_ref().unwrap();
            match ic.circuit.items[internal].kind.as_str() {
                kinds::BUFFER => {}
                other => panic!("boundary attached to non-buffer {other}"),
            }
        }
    }

    #[test]
    fn test_instantiate_is_injective() {
        let source = latch_document();
        let mut ids = IdFactory::for_document(&source);
        let fragment = fold(&source, "Latch", &mut ids).unwrap();

        let source_ids: HashSet<Id> = fragment.all_ids().into_iter().collect();
        let instance = instantiate(&fragment, &mut ids).unwrap();
        let instance_ids: Vec<Id> = instance.all_ids();
        let instance_set: HashSet<Id> = instance_ids.iter().cloned().collect();

        // N distinct ids in, N distinct ids out.
        assert_eq!(instance_set.len(), source_ids.len());
        // No overlap with the source fragment.
        assert!(instance_set.is_disjoint(&source_ids));
    }

    #[test]
    fn test_sibling_instances_disjoint() {
        let source = latch_document();
        let mut ids = IdFactory::for_document(&source);
        let fragment = fold(&source, "Latch", &mut ids).unwrap();

        let a = instantiate(&fragment, &mut ids).unwrap();
        let b = instantiate(&fragment, &mut ids).unwrap();
        let a_ids: HashSet<Id> = a.all_ids().into_iter().collect();
        let b_ids: HashSet<Id> = b.all_ids().into_iter().collect();
        assert!(a_ids.is_disjoint(&b_ids));
    }

    #[test]
    fn test_instantiate_rejects_dangling_reference() {
        let source = latch_document();
        let mut ids = IdFactory::for_document(&source);
        let mut fragment = fold(&source, "Latch", &mut ids).unwrap();

        // A connection endpoint nothing in the fragment defines.
        fragment.add_connection(Connection::new("c_bad", "p_ghost", "p_ghost2"));
        let err = instantiate(&fragment, &mut ids).unwrap_err();
        assert!(matches!(err, ComposerError::MissingTranslation(_)));
    }

    #[test]
    fn test_nested_composite_remap_spans_levels() {
        let source = latch_document();
        let mut ids = IdFactory::for_document(&source);
        let inner_fragment = fold(&source, "Latch", &mut ids).unwrap();

        // Fold the fragment again: a composite containing a composite.
        let outer_fragment = fold(&inner_fragment, "DoubleLatch", &mut ids).unwrap();
        let instance = instantiate(&outer_fragment, &mut ids).unwrap();

        let fragment_ids: HashSet<Id> = outer_fragment.all_ids().into_iter().collect();
        let instance_ids: HashSet<Id> = instance.all_ids().into_iter().collect();
        assert!(instance_ids.is_disjoint(&fragment_ids));
        assert_eq!(instance_ids.len(), fragment_ids.len());
    }
}
