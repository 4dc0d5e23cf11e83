//! # Circuitflow Simulation Engine
//!
//! A tri-state digital logic circuit simulation engine: the dataflow core of
//! an interactive circuit editor, without any of the editor itself.
//!
//! ## Design Principles
//!
//! - **Graph-Driven**: The circuit is a directed dataflow graph of logic
//!   nodes owned by an explicit [`Circuit`] aggregate — no ambient state.
//! - **Fixed-Point Propagation**: A FIFO work queue drives the graph to
//!   quiescence after each stimulus; feedback loops (latches) settle
//!   naturally, and pathological oscillators are cut off by a pop bound.
//! - **Tri-State Values**: Every node and wire carries a [`LogicValue`] of
//!   `True`, `False`, or `Unknown`; indeterminate state propagates as a
//!   genuine value.
//! - **Collision-Free Composition**: Subcircuits fold into reusable
//!   integrated-circuit items and instantiate with deep identity remapping,
//!   so no id ever leaks between two live scopes.
//!
//! ## Quick Start
//!
//! ```rust
//! use circuitflow::{LogicValue, NodeKind, SimConfig, Simulation};
//!
//! let mut sim = Simulation::new(SimConfig::default());
//! let a = sim.circuit_mut().add("a", NodeKind::Input);
//! let b = sim.circuit_mut().add("b", NodeKind::Input);
//! let gate = sim.circuit_mut().add("and", NodeKind::And);
//! sim.circuit_mut().connect(&a, &gate).unwrap();
//! sim.circuit_mut().connect(&b, &gate).unwrap();
//!
//! sim.step(&a, LogicValue::True).unwrap();
//! sim.step(&b, LogicValue::True).unwrap();
//! assert_eq!(sim.circuit().value(&gate), Some(LogicValue::True));
//! ```
//!
//! ## Documents and Composition
//!
//! Serialized circuits use flat id-keyed maps of items, connections, ports,
//! and groups (see [`document`]); [`composer::fold`] packs a document into a
//! composite item and [`composer::instantiate`] stamps out independent
//! copies with fresh identities.

pub mod circuit;
pub mod composer;
pub mod config;
pub mod document;
pub mod engine;
pub mod node;
pub mod registry;
pub mod simulation;
pub mod types;
pub mod value;
pub mod wave;

// Re-export commonly used types
pub use circuit::{ChangeListener, Circuit, CircuitError};
pub use composer::{fold, instantiate, ComposerError, IdFactory, IdTranslation};
pub use config::{ClockConfig, ConfigError, ConfigResult, SimConfig};
pub use document::{
    Connection, Document, DocumentError, Group, IntegratedCircuit, Item, Orientation, Polarity,
    Port,
};
pub use engine::{DrainReport, EngineStats, PropagationEngine, PropagationError};
pub use node::{CircuitNode, NodeKind, OutputRef};
pub use registry::{create_default_registry, NodeFactory, NodeRegistry};
pub use simulation::{Simulation, SimulationError};
pub use types::{Id, Point, Tick};
pub use value::LogicValue;
pub use wave::{BinaryWavePulse, ClockPulse, Oscilloscope};

/// Initialize the tracing subscriber for logging.
///
/// Call this at the start of your program to enable logging.
///
/// # Example
///
/// ```rust,ignore
/// circuitflow::init_logging("info");
/// ```
pub fn init_logging(level: &str) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .init();
}
