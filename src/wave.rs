//! Clock stimulus and waveform capture.
//!
//! [`ClockPulse`] flips a driven input node on a fixed cadence;
//! [`BinaryWavePulse`] records a port's value over time as a bounded
//! polyline; [`Oscilloscope`] owns the recorders and wires them into a
//! circuit's change events.

use std::collections::HashMap;
use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::circuit::{Circuit, CircuitError};
use crate::types::{Id, Point, Tick};
use crate::value::LogicValue;

/// Vertical level of a high (true) signal, screen convention.
const LEVEL_HIGH: u64 = 0;
/// Vertical level of a low or indeterminate signal.
const LEVEL_LOW: u64 = 1;

fn level(value: LogicValue) -> u64 {
    if value == LogicValue::True {
        LEVEL_HIGH
    } else {
        LEVEL_LOW
    }
}

/// A two-state modular clock driving one input node.
///
/// Each global tick increments the counter; whenever it reaches a multiple
/// of the period the clock flips and reports the new value, otherwise it is
/// inert for that tick.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ClockPulse {
    period: Tick,
    ticks: Tick,
    value: LogicValue,
}

impl ClockPulse {
    /// Creates a clock with the given period (ticks per half-cycle),
    /// starting low.
    pub fn new(period: Tick) -> Self {
        Self {
            period,
            ticks: 0,
            value: LogicValue::False,
        }
    }

    /// Returns the period.
    pub fn period(&self) -> Tick {
        self.period
    }

    /// Returns the clock's current level.
    pub fn value(&self) -> LogicValue {
        self.value
    }

    /// Advances one tick. Returns the new level when the clock flips.
    pub fn tick(&mut self) -> Option<LogicValue> {
        self.ticks += 1;
        if self.period > 0 && self.ticks % self.period == 0 {
            self.value = self.value.invert();
            Some(self.value)
        } else {
            None
        }
    }
}

/// A bounded polyline recorder for one port's value over time.
///
/// Horizontal offsets advance one unit per constant tick; transitions append
/// a vertical edge at the current offset. History is a sliding window, not
/// an unbounded log.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct BinaryWavePulse {
    segments: Vec<Point>,
    offset: Tick,
    last_value: LogicValue,
    /// Set when a transition was recorded since the last advance
    #[serde(skip)]
    touched: bool,
}

impl BinaryWavePulse {
    /// Creates a recorder seeded with the port's current value.
    pub fn new(value: LogicValue) -> Self {
        let mut wave = Self {
            segments: Vec::new(),
            offset: 0,
            last_value: value,
            touched: false,
        };
        wave.initialize(value);
        wave
    }

    /// Seeds the first segment at the current offset.
    pub fn initialize(&mut self, value: LogicValue) {
        self.last_value = value;
        self.segments.push(Point::new(self.offset, level(value)));
    }

    /// Appends a point, replacing the last one when both coordinates match
    /// so redundant constant runs never grow the list.
    pub fn add_segment(&mut self, point: Point) {
        match self.segments.last_mut() {
            Some(last) if *last == point => *last = point,
            _ => self.segments.push(point),
        }
    }

    /// Records a level transition at the current offset.
    pub fn draw_pulse_change(&mut self, value: LogicValue) {
        self.add_segment(Point::new(self.offset, level(value)));
        self.last_value = value;
        self.touched = true;
    }

    /// Extends the last segment horizontally by one unit — the steady-state
    /// case for a tick with no transition.
    pub fn draw_pulse_constant(&mut self) {
        self.offset += 1;
        let y = level(self.last_value);
        let run = self.segments.len() >= 2 && {
            let a = self.segments[self.segments.len() - 2];
            let b = self.segments[self.segments.len() - 1];
            a.y == y && b.y == y
        };
        if run {
            if let Some(last) = self.segments.last_mut() {
                last.x = self.offset;
                return;
            }
        }
        self.segments.push(Point::new(self.offset, y));
    }

    /// Drops leading segments until the recorded width fits `max_width`,
    /// preserving the temporal order and values of the retained suffix.
    pub fn truncate_segments(&mut self, max_width: Tick) {
        while self.segments.len() > 1 {
            let first = self.segments[0].x;
            let last = self.segments[self.segments.len() - 1].x;
            if last - first <= max_width {
                break;
            }
            self.segments.remove(0);
        }
    }

    /// Empties the history and re-seeds with the logical opposite of the
    /// last known signal so the cleared wave keeps a correct baseline.
    pub fn clear(&mut self) {
        let opposite = self.last_value.invert();
        self.segments.clear();
        self.initialize(opposite);
    }

    /// Returns the recorded polyline.
    pub fn segments(&self) -> &[Point] {
        &self.segments
    }

    /// Returns the recorded width in tick units.
    pub fn width(&self) -> Tick {
        match (self.segments.first(), self.segments.last()) {
            (Some(first), Some(last)) => last.x - first.x,
            _ => 0,
        }
    }

    /// Number of level transitions in the recorded window.
    pub fn transition_count(&self) -> usize {
        self.segments.windows(2).filter(|w| w[0].y != w[1].y).count()
    }

    fn advance(&mut self) {
        if self.touched {
            self.touched = false;
        } else {
            self.draw_pulse_constant();
        }
    }
}

/// Owns waveform recorders keyed by port and wires them into circuit
/// change events.
///
/// Recorders are shared with the circuit's listener registry through
/// `Arc<Mutex<_>>`; the listener holds a weak reference only, and detaching
/// both unsubscribes it and drops the strong reference.
pub struct Oscilloscope {
    max_width: Tick,
    waves: HashMap<Id, Arc<Mutex<BinaryWavePulse>>>,
}

/// Default visible window width in tick units.
pub const DEFAULT_WAVE_WINDOW: Tick = 300;

impl Default for Oscilloscope {
    fn default() -> Self {
        Self::new(DEFAULT_WAVE_WINDOW)
    }
}

impl Oscilloscope {
    /// Creates an oscilloscope with the given visible window width.
    pub fn new(max_width: Tick) -> Self {
        Self {
            max_width,
            waves: HashMap::new(),
        }
    }

    /// Returns the visible window width.
    pub fn max_width(&self) -> Tick {
        self.max_width
    }

    /// Starts recording a port, subscribing to its node's change events.
    pub fn attach(&mut self, circuit: &mut Circuit, port: &Id) -> Result<(), CircuitError> {
        let node = circuit
            .port_node(port)
            .cloned()
            .ok_or_else(|| CircuitError::NodeNotFound(port.clone()))?;
        let initial = circuit.port_value(port).unwrap_or(LogicValue::Unknown);

        let wave = Arc::new(Mutex::new(BinaryWavePulse::new(initial)));
        let weak: Weak<Mutex<BinaryWavePulse>> = Arc::downgrade(&wave);
        // Keyed by port so detach can unsubscribe instead of leaving a dead
        // weak reference behind.
        circuit.on_change_keyed(
            &node,
            port.clone(),
            Box::new(move |_, value| {
                if let Some(wave) = weak.upgrade() {
                    wave.lock().draw_pulse_change(value);
                }
            }),
        );
        self.waves.insert(port.clone(), wave);
        Ok(())
    }

    /// Stops recording a port and unsubscribes its change listener.
    pub fn detach(&mut self, circuit: &mut Circuit, port: &Id) -> bool {
        if let Some(node) = circuit.port_node(port).cloned() {
            circuit.remove_listener(&node, port);
        }
        self.waves.remove(port).is_some()
    }

    /// Returns true if a port is being recorded.
    pub fn is_attached(&self, port: &Id) -> bool {
        self.waves.contains_key(port)
    }

    /// Number of attached recorders.
    pub fn len(&self) -> usize {
        self.waves.len()
    }

    /// Returns true if nothing is attached.
    pub fn is_empty(&self) -> bool {
        self.waves.is_empty()
    }

    /// Snapshot of a port's recorded polyline.
    pub fn segments(&self, port: &Id) -> Option<Vec<Point>> {
        self.waves.get(port).map(|w| w.lock().segments().to_vec())
    }

    /// Number of transitions recorded for a port.
    pub fn transition_count(&self, port: &Id) -> Option<usize> {
        self.waves.get(port).map(|w| w.lock().transition_count())
    }

    /// Advances every recorder by one tick: waves that saw a transition this
    /// tick keep their edge, all others extend their constant run. The
    /// sliding window is enforced afterwards.
    pub fn advance(&mut self) {
        for wave in self.waves.values() {
            let mut wave = wave.lock();
            wave.advance();
            wave.truncate_segments(self.max_width);
        }
    }

    /// Clears every recorder, preserving correct baselines.
    pub fn clear(&mut self) {
        for wave in self.waves.values() {
            wave.lock().clear();
        }
    }
}

impl std::fmt::Debug for Oscilloscope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Oscilloscope")
            .field("max_width", &self.max_width)
            .field("waves", &self.waves.len())
            .finish()
    }
}
