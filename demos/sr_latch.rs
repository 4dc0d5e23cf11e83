//! SR latch example.
//!
//! Builds the classic cross-wired NOR latch, drives its set/reset inputs
//! through a pulse sequence to show the memory property, then attaches a
//! clock and a waveform recorder to show capture over ticks.

use circuitflow::{init_logging, LogicValue, NodeKind, Simulation};

const WAVE_TICKS: u64 = 12;
const CLOCK_PERIOD: u64 = 2;

fn show(label: &str, sim: &Simulation, q: &String, qn: &String) {
    println!(
        "{label:<24} Q={}  Q'={}",
        sim.circuit().value(q).unwrap_or(LogicValue::Unknown),
        sim.circuit().value(qn).unwrap_or(LogicValue::Unknown),
    );
}

fn main() {
    init_logging("info");

    println!("==== SR latch example ====\n");

    // Cross-wired NOR latch: R and S drive two NOR gates feeding each other.
    let mut sim = Simulation::default();
    let r = sim.circuit_mut().add("r", NodeKind::Input);
    let s = sim.circuit_mut().add("s", NodeKind::Input);
    let q = sim.circuit_mut().add("q", NodeKind::Nor);
    let qn = sim.circuit_mut().add("qn", NodeKind::Nor);
    sim.circuit_mut().connect(&r, &q).unwrap();
    sim.circuit_mut().connect(&qn, &q).unwrap();
    sim.circuit_mut().connect(&s, &qn).unwrap();
    sim.circuit_mut().connect(&q, &qn).unwrap();

    sim.step(&r, LogicValue::True).unwrap();
    sim.step(&s, LogicValue::False).unwrap();
    show("reset pulse:", &sim, &q, &qn);

    sim.step(&r, LogicValue::False).unwrap();
    show("release (holds):", &sim, &q, &qn);

    sim.step(&s, LogicValue::True).unwrap();
    sim.step(&s, LogicValue::False).unwrap();
    show("set pulse (flips):", &sim, &q, &qn);

    // A clocked input recorded by the oscilloscope.
    println!("\n==== Clock capture ====\n");
    let clk = sim.circuit_mut().add("clk", NodeKind::Input);
    sim.circuit_mut().bind_port("p_clk".to_string(), &clk);
    sim.add_clock(&clk, CLOCK_PERIOD).unwrap();
    sim.attach_wave(&"p_clk".to_string()).unwrap();

    for _ in 0..WAVE_TICKS {
        sim.tick().unwrap();
    }

    let segments = sim.wave_segments(&"p_clk".to_string()).unwrap_or_default();
    println!("clock waveform over {WAVE_TICKS} ticks (y=0 is high):");
    for point in &segments {
        println!("  x={:>3}  y={}", point.x, point.y);
    }
    println!(
        "transitions: {}",
        sim.oscilloscope()
            .transition_count(&"p_clk".to_string())
            .unwrap_or(0)
    );

    let stats = sim.export_stats();
    println!("\nticks: {}", stats["ticks"]);
    println!("drains: {}", stats["engine"]["drains"]);
    println!("queue pops: {}", stats["engine"]["pops"]);
}
