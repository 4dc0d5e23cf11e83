//! Performance benchmarks for the circuitflow engine.
//!
//! Run with: `cargo bench`
//! Or for specific bench: `cargo bench --bench propagation_bench`

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};

use circuitflow::{
    create_default_registry, fold, instantiate, Connection, Document, Id, IdFactory, Item,
    LogicValue, NodeKind, Polarity, Port, SimConfig, Simulation,
};

// ============================================================================
// Circuit builders
// ============================================================================

/// A linear chain: input -> buffer -> buffer -> ... -> buffer.
fn build_chain(length: usize) -> (Simulation, Id) {
    let mut sim = Simulation::default();
    let head = sim.circuit_mut().add("n0", NodeKind::Input);
    let mut prev = head.clone();
    for i in 1..length {
        let next = sim.circuit_mut().add(format!("n{i}"), NodeKind::Buffer);
        sim.circuit_mut().connect(&prev, &next).unwrap();
        prev = next;
    }
    (sim, head)
}

/// A flat fan-out: one input driving `width` buffers into a single And join.
fn build_fanout(width: usize) -> (Simulation, Id) {
    let mut sim = Simulation::default();
    let head = sim.circuit_mut().add("src", NodeKind::Input);
    let join = sim.circuit_mut().add("join", NodeKind::And);
    for i in 0..width {
        let buf = sim.circuit_mut().add(format!("b{i}"), NodeKind::Buffer);
        sim.circuit_mut().connect(&head, &buf).unwrap();
        sim.circuit_mut().connect(&buf, &join).unwrap();
    }
    (sim, head)
}

/// A document of `gates` Not gates wired in a line behind one input.
fn build_document(gates: usize) -> Document {
    let mut doc = Document::new();
    doc.add_item(Item::new("in0", "InputNode").with_port("p_in0"));
    doc.add_port(Port::new("p_in0", "in0", Polarity::Output));
    let mut prev_out = "p_in0".to_string();
    for i in 0..gates {
        let item = format!("g{i}");
        let p_in = format!("p_{item}_in");
        let p_out = format!("p_{item}_out");
        doc.add_item(Item::new(&item, "Not").with_port(&p_in).with_port(&p_out));
        doc.add_port(Port::new(&p_in, &item, Polarity::Input));
        doc.add_port(Port::new(&p_out, &item, Polarity::Output));
        doc.add_connection(Connection::new(format!("c{i}"), &prev_out, &p_in));
        prev_out = p_out;
    }
    doc
}

// ============================================================================
// Drain Benchmarks
// ============================================================================

fn bench_chain_drain(c: &mut Criterion) {
    let mut group = c.benchmark_group("chain_drain");

    for length in [10, 100, 1000].iter() {
        group.throughput(Throughput::Elements(*length as u64));
        group.bench_with_input(BenchmarkId::new("length", length), length, |b, &length| {
            b.iter_batched(
                || build_chain(length),
                |(mut sim, head)| {
                    black_box(sim.step(&head, LogicValue::True).unwrap());
                },
                criterion::BatchSize::SmallInput,
            );
        });
    }

    group.finish();
}

fn bench_fanout_drain(c: &mut Criterion) {
    let mut group = c.benchmark_group("fanout_drain");

    for width in [10, 100, 1000].iter() {
        group.throughput(Throughput::Elements(*width as u64));
        group.bench_with_input(BenchmarkId::new("width", width), width, |b, &width| {
            b.iter_batched(
                || build_fanout(width),
                |(mut sim, head)| {
                    black_box(sim.step(&head, LogicValue::True).unwrap());
                },
                criterion::BatchSize::SmallInput,
            );
        });
    }

    group.finish();
}

fn bench_tick_throughput(c: &mut Criterion) {
    let mut group = c.benchmark_group("tick_throughput");

    for ticks in [100, 1000, 10000].iter() {
        group.throughput(Throughput::Elements(*ticks as u64));
        group.bench_with_input(BenchmarkId::new("ticks", ticks), ticks, |b, &ticks| {
            b.iter_batched(
                || {
                    let (mut sim, head) = build_chain(10);
                    sim.add_clock(&head, 2).unwrap();
                    sim
                },
                |mut sim| {
                    for _ in 0..ticks {
                        sim.tick().unwrap();
                    }
                    black_box(sim.ticks());
                },
                criterion::BatchSize::SmallInput,
            );
        });
    }

    group.finish();
}

// ============================================================================
// Document Benchmarks
// ============================================================================

fn bench_document_compile(c: &mut Criterion) {
    let mut group = c.benchmark_group("document_compile");
    let registry = create_default_registry();

    for gates in [10, 100, 1000].iter() {
        group.throughput(Throughput::Elements(*gates as u64));
        group.bench_with_input(BenchmarkId::new("gates", gates), gates, |b, &gates| {
            let doc = build_document(gates);
            b.iter(|| {
                black_box(doc.compile(&registry).unwrap());
            });
        });
    }

    group.finish();
}

fn bench_instantiate(c: &mut Criterion) {
    let mut group = c.benchmark_group("instantiate");

    for gates in [10, 100].iter() {
        group.throughput(Throughput::Elements(*gates as u64));
        group.bench_with_input(BenchmarkId::new("gates", gates), gates, |b, &gates| {
            let source = build_document(gates);
            b.iter_batched(
                || {
                    let mut ids = IdFactory::for_document(&source);
                    let fragment = fold(&source, "Composite", &mut ids).unwrap();
                    (fragment, ids)
                },
                |(fragment, mut ids)| {
                    black_box(instantiate(&fragment, &mut ids).unwrap());
                },
                criterion::BatchSize::SmallInput,
            );
        });
    }

    group.finish();
}

fn bench_session_from_document(c: &mut Criterion) {
    let mut group = c.benchmark_group("session_from_document");
    let registry = create_default_registry();

    for gates in [10, 100].iter() {
        group.throughput(Throughput::Elements(*gates as u64));
        group.bench_with_input(BenchmarkId::new("gates", gates), gates, |b, &gates| {
            let doc = build_document(gates);
            b.iter(|| {
                black_box(
                    Simulation::from_document(&doc, &registry, SimConfig::default()).unwrap(),
                );
            });
        });
    }

    group.finish();
}

// ============================================================================
// Criterion Groups
// ============================================================================

criterion_group!(
    benches,
    bench_chain_drain,
    bench_fanout_drain,
    bench_tick_throughput,
    bench_document_compile,
    bench_instantiate,
    bench_session_from_document,
);

criterion_main!(benches);
