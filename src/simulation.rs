//! Top-level simulation session.
//!
//! A [`Simulation`] owns one circuit, its propagation engine, the installed
//! clocks, and the oscilloscope, and exposes the entry points the editor
//! layer calls: external stimulus (`set_value`), the manual `step`, the
//! periodic `tick`, waveform attachment, and a full `reset`.

use std::collections::HashMap;

use thiserror::Error;

use crate::circuit::{Circuit, CircuitError};
use crate::config::SimConfig;
use crate::document::{Document, DocumentError};
use crate::engine::{DrainReport, PropagationEngine, PropagationError};
use crate::registry::NodeRegistry;
use crate::types::{Id, Point, Tick};
use crate::value::LogicValue;
use crate::wave::{ClockPulse, Oscilloscope};

/// Errors surfaced by session entry points.
#[derive(Error, Debug)]
pub enum SimulationError {
    #[error(transparent)]
    Circuit(#[from] CircuitError),

    #[error(transparent)]
    Propagation(#[from] PropagationError),

    #[error(transparent)]
    Document(#[from] DocumentError),
}

/// One simulation session: circuit, engine, clocks, and oscilloscope.
///
/// Single-threaded and synchronous: every entry point runs its drain to
/// completion before returning, so stimulus can never re-enter a drain in
/// progress.
pub struct Simulation {
    circuit: Circuit,
    engine: PropagationEngine,
    clocks: HashMap<Id, ClockPulse>,
    oscilloscope: Oscilloscope,
    ticks: Tick,
}

impl Default for Simulation {
    fn default() -> Self {
        Self::new(SimConfig::default())
    }
}

impl Simulation {
    /// Creates an empty session with the given configuration.
    pub fn new(config: SimConfig) -> Self {
        Self {
            circuit: Circuit::new(),
            engine: PropagationEngine::new().with_max_pops(config.max_pops),
            clocks: HashMap::new(),
            oscilloscope: Oscilloscope::new(config.wave_window),
            ticks: 0,
        }
    }

    /// Builds a session from a serialized document.
    ///
    /// The document is validated and compiled atomically, configured clocks
    /// are installed, and one full drain settles initial values before the
    /// session is returned.
    pub fn from_document(
        document: &Document,
        registry: &NodeRegistry,
        config: SimConfig,
    ) -> Result<Self, SimulationError> {
        let circuit = document.compile(registry)?;
        let mut session = Self {
            circuit,
            engine: PropagationEngine::new().with_max_pops(config.max_pops),
            clocks: HashMap::new(),
            oscilloscope: Oscilloscope::new(config.wave_window),
            ticks: 0,
        };
        for clock in &config.clocks {
            session.add_clock(&clock.node, clock.period)?;
        }
        let seeds: Vec<Id> = session.circuit.node_ids().cloned().collect();
        session.engine.drain(&mut session.circuit, seeds)?;
        Ok(session)
    }

    /// Returns the live circuit.
    pub fn circuit(&self) -> &Circuit {
        &self.circuit
    }

    /// Returns the live circuit mutably, for structural edits.
    pub fn circuit_mut(&mut self) -> &mut Circuit {
        &mut self.circuit
    }

    /// Returns the number of global ticks elapsed.
    pub fn ticks(&self) -> Tick {
        self.ticks
    }

    /// Drives an input node and drains to the fixed point — the editor's
    /// manual step control.
    pub fn step(&mut self, id: &Id, value: LogicValue) -> Result<DrainReport, SimulationError> {
        self.circuit.set_value(id, value)?;
        let report = self.engine.drain(&mut self.circuit, [id.clone()])?;
        Ok(report)
    }

    /// Alias of [`step`](Self::step) matching the stimulus entry point name.
    pub fn set_value(
        &mut self,
        id: &Id,
        value: LogicValue,
    ) -> Result<DrainReport, SimulationError> {
        self.step(id, value)
    }

    /// Installs a clock driving the given input node.
    pub fn add_clock(&mut self, node: &Id, period: Tick) -> Result<(), SimulationError> {
        // Fail now rather than on the first tick.
        self.circuit
            .node(node)
            .ok_or_else(|| CircuitError::NodeNotFound(node.clone()))?;
        self.clocks.insert(node.clone(), ClockPulse::new(period));
        Ok(())
    }

    /// Removes the clock on a node.
    pub fn remove_clock(&mut self, node: &Id) -> bool {
        self.clocks.remove(node).is_some()
    }

    /// Advances the session one global tick.
    ///
    /// Clocks that flip seed one drain; waveform recorders then either keep
    /// the edge they captured during the drain or extend their constant run.
    pub fn tick(&mut self) -> Result<DrainReport, SimulationError> {
        self.ticks += 1;

        let mut seeds: Vec<Id> = Vec::new();
        let mut clock_nodes: Vec<Id> = self.clocks.keys().cloned().collect();
        clock_nodes.sort();
        for node in clock_nodes {
            if self.circuit.node(&node).is_none() {
                tracing::warn!(node = %node, "clock target no longer exists; dropping clock");
                self.clocks.remove(&node);
                continue;
            }
            let Some(clock) = self.clocks.get_mut(&node) else {
                continue;
            };
            if let Some(value) = clock.tick() {
                self.circuit.set_value(&node, value)?;
                seeds.push(node);
            }
        }

        let report = if seeds.is_empty() {
            DrainReport::default()
        } else {
            self.engine.drain(&mut self.circuit, seeds)?
        };

        self.oscilloscope.advance();
        Ok(report)
    }

    /// Attaches a waveform recorder to a port.
    pub fn attach_wave(&mut self, port: &Id) -> Result<(), SimulationError> {
        self.oscilloscope.attach(&mut self.circuit, port)?;
        Ok(())
    }

    /// Detaches the recorder on a port.
    pub fn detach_wave(&mut self, port: &Id) -> bool {
        self.oscilloscope.detach(&mut self.circuit, port)
    }

    /// Snapshot of a port's recorded waveform.
    pub fn wave_segments(&self, port: &Id) -> Option<Vec<Point>> {
        self.oscilloscope.segments(port)
    }

    /// Returns the oscilloscope.
    pub fn oscilloscope(&self) -> &Oscilloscope {
        &self.oscilloscope
    }

    /// Forces every node back to `Unknown` and re-drains the whole circuit.
    pub fn reset(&mut self) -> Result<DrainReport, SimulationError> {
        let seeds = self.circuit.reset();
        self.oscilloscope.clear();
        let report = self.engine.drain(&mut self.circuit, seeds)?;
        Ok(report)
    }

    /// Exports session statistics as JSON.
    pub fn export_stats(&self) -> serde_json::Value {
        serde_json::json!({
            "ticks": self.ticks,
            "nodes": self.circuit.len(),
            "clocks": self.clocks.len(),
            "waves": self.oscilloscope.len(),
            "engine": self.engine.export_stats(),
        })
    }
}

impl std::fmt::Debug for Simulation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Simulation")
            .field("ticks", &self.ticks)
            .field("circuit", &self.circuit)
            .field("clocks", &self.clocks.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::NodeKind;

    #[test]
    fn test_step_drains_to_fixed_point() {
        let mut sim = Simulation::default();
        let x = sim.circuit_mut().add("x", NodeKind::Input);
        let n = sim.circuit_mut().add("n", NodeKind::Not);
        sim.circuit_mut().connect(&x, &n).unwrap();

        sim.step(&x, LogicValue::True).unwrap();
        assert_eq!(sim.circuit().value(&n), Some(LogicValue::False));
    }

    #[test]
    fn test_clock_drives_input() {
        let mut sim = Simulation::default();
        let clk = sim.circuit_mut().add("clk", NodeKind::Input);
        sim.add_clock(&clk, 2).unwrap();

        let mut changes = 0;
        for _ in 0..6 {
            sim.tick().unwrap();
            if sim.circuit().value(&clk) != Some(LogicValue::Unknown) {
                changes += 1;
            }
        }
        assert_eq!(sim.ticks(), 6);
        // Flipped at ticks 2, 4, 6; value is definite from tick 2 onward.
        assert_eq!(changes, 5);
        assert_eq!(sim.circuit().value(&clk), Some(LogicValue::True));
    }

    #[test]
    fn test_tick_drops_clock_on_removed_node() {
        let mut sim = Simulation::default();
        let clk = sim.circuit_mut().add("clk", NodeKind::Input);
        sim.add_clock(&clk, 1).unwrap();
        sim.circuit_mut().remove_node(&clk);

        // Ticking must not error; the orphaned clock is discarded.
        sim.tick().unwrap();
        assert_eq!(sim.export_stats()["clocks"], 0);
        sim.tick().unwrap();
    }

    #[test]
    fn test_add_clock_missing_node() {
        let mut sim = Simulation::default();
        let err = sim.add_clock(&"ghost".to_string(), 2).unwrap_err();
        assert!(matches!(
            err,
            SimulationError::Circuit(CircuitError::NodeNotFound(_))
        ));
    }

    #[test]
    fn test_reset_clears_state() {
        let mut sim = Simulation::default();
        let x = sim.circuit_mut().add("x", NodeKind::Input);
        sim.step(&x, LogicValue::True).unwrap();
        assert_eq!(sim.circuit().value(&x), Some(LogicValue::True));

        sim.reset().unwrap();
        assert_eq!(sim.circuit().value(&x), Some(LogicValue::Unknown));
    }

    #[test]
    fn test_export_stats_shape() {
        let mut sim = Simulation::default();
        let x = sim.circuit_mut().add("x", NodeKind::Input);
        sim.step(&x, LogicValue::True).unwrap();
        sim.tick().unwrap();

        let stats = sim.export_stats();
        assert_eq!(stats["ticks"], 1);
        assert_eq!(stats["nodes"], 1);
        assert_eq!(stats["engine"]["drains"], 1);
    }
}
