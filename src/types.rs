//! Core type definitions for the circuit simulation engine.
//!
//! This module defines the fundamental identity and measurement types used
//! throughout the engine.

use serde::{Deserialize, Serialize};

/// Stable identity of a node, port, connection, item, or group.
///
/// Identities are opaque strings, unique within one circuit scope. They are
/// assigned once at creation (or by the composer's remapping pass) and never
/// change afterwards.
pub type Id = String;

/// Discrete simulation time unit.
///
/// Clocks and waveform capture advance in whole ticks; one tick corresponds
/// to one call of the session's `tick()` entry point.
pub type Tick = u64;

/// A point on a waveform polyline.
///
/// `x` is the horizontal offset in tick units; `y` is the vertical level
/// (0 = high/true, 1 = low, screen convention). The engine treats points as
/// opaque geometry; only the recorder's consumers interpret the axes.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Point {
    /// Horizontal offset in tick units
    pub x: Tick,
    /// Vertical level
    pub y: u64,
}

impl Point {
    /// Creates a new point.
    pub fn new(x: Tick, y: u64) -> Self {
        Self { x, y }
    }
}
