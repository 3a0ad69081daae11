//! Benchmarks for Canopy Tree Topology
//!
//! Measures performance of:
//! - Rank rotation and its inverse
//! - Full position construction
//! - Walking every participant's children (one gather's worth of routing)

use canopy_topology::{physical_id, relative_rank, RankTopology, SlotId};
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};

/// Benchmark relative rank rotation
fn bench_rotation(c: &mut Criterion) {
    let mut group = c.benchmark_group("rotation");

    for &size in &[2usize, 16, 1024, 1 << 20] {
        group.throughput(Throughput::Elements(1));
        group.bench_with_input(BenchmarkId::from_parameter(size), &size, |b, &n| {
            b.iter(|| {
                let rel = relative_rank(black_box(n / 3), black_box(n / 2), n);
                physical_id(rel, black_box(n / 2), n)
            })
        });
    }
    group.finish();
}

/// Benchmark constructing a validated tree position
fn bench_position(c: &mut Criterion) {
    let mut group = c.benchmark_group("position");

    for &size in &[4usize, 1024, 1 << 20] {
        group.throughput(Throughput::Elements(1));
        group.bench_with_input(BenchmarkId::from_parameter(size), &size, |b, &n| {
            b.iter(|| {
                let node = RankTopology::new(black_box(n - 1), black_box(1), n).unwrap();
                (node.role(), node.expected_child_count(), node.upward_slot())
            })
        });
    }
    group.finish();
}

/// Benchmark routing every participant of a cluster once
fn bench_cluster_routing(c: &mut Criterion) {
    let mut group = c.benchmark_group("cluster_routing");

    for &size in &[64usize, 4096] {
        group.throughput(Throughput::Elements(size as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), &size, |b, &n| {
            b.iter(|| {
                let mut slot_b = 0usize;
                for id in 0..n {
                    let node = RankTopology::new(id, 0, n).unwrap();
                    for child in node.children() {
                        if SlotId::for_child(child) == SlotId::B {
                            slot_b += 1;
                        }
                    }
                }
                black_box(slot_b)
            })
        });
    }
    group.finish();
}

criterion_group!(benches, bench_rotation, bench_position, bench_cluster_routing);
criterion_main!(benches);
