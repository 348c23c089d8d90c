//! # Handoff Benchmark
//!
//! Cost of one camera rendezvous (request, release, wake) against the cost
//! of the physics step it interrupts.
//!
//! Run with: `cargo bench --package simview_core`

#![allow(missing_docs)]

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use simview_core::{
    BallisticOracle, HandoffSemaphore, PhysicsOracle, SensorKind, SimulationModel, SimulationState,
};

/// Uncontended release then acquire on one thread.
fn bench_uncontended(c: &mut Criterion) {
    let sem = HandoffSemaphore::new();
    c.bench_function("handoff_uncontended", |b| {
        b.iter(|| {
            sem.release();
            sem.acquire();
        });
    });
}

/// Full round trip: requester signals, responder releases, requester wakes.
fn bench_round_trip(c: &mut Criterion) {
    let request = Arc::new(HandoffSemaphore::new());
    let done = Arc::new(HandoffSemaphore::new());
    let stop = Arc::new(AtomicBool::new(false));

    let responder = {
        let request = Arc::clone(&request);
        let done = Arc::clone(&done);
        let stop = Arc::clone(&stop);
        thread::spawn(move || loop {
            request.acquire();
            if stop.load(Ordering::Acquire) {
                break;
            }
            done.release();
        })
    };

    c.bench_function("handoff_round_trip", |b| {
        b.iter(|| {
            request.release();
            done.acquire();
        });
    });

    stop.store(true, Ordering::Release);
    request.release();
    let _ = responder.join();
}

/// One reference physics step over a small rig.
fn bench_ballistic_step(c: &mut Criterion) {
    let mut builder = SimulationModel::builder("rig");
    for i in 0..32 {
        builder = builder
            .body(format!("b{i}"), [f64::from(i), 0.0, 1.0], 0.1, [1.0; 4])
            .sensor(format!("p{i}"), SensorKind::BodyPosition(i as usize));
    }
    let Ok(model) = builder.build() else {
        return;
    };
    let mut state = SimulationState::new(&model);
    let mut oracle = BallisticOracle::new();

    c.bench_function("ballistic_step_32", |b| {
        b.iter(|| {
            oracle.step(&model, &mut state);
            black_box(state.time)
        });
    });
}

criterion_group!(benches, bench_uncontended, bench_round_trip, bench_ballistic_step);
criterion_main!(benches);
