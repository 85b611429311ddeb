use std::sync::atomic::AtomicBool;
use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use netcachelib::config::{EvictionPolicy, TopologyKind};
use netcachelib::simulator::Experiment;
use netcachelib::util::{ccf_descriptor, TEN_SOURCE_ALLOCATION};

/// Times whole replications of the ten source CCF setup under each eviction policy
pub fn criterion_benchmark(c: &mut Criterion) {
    let mut group = c.benchmark_group("Replication");

    for topology in [TopologyKind::Scale, TopologyKind::Line] {
        for policy in [EvictionPolicy::LeastRecentlyUsed, EvictionPolicy::FirstInFirstOut, EvictionPolicy::LeastFrequentlyUsed] {
            let mut descriptor = ccf_descriptor(&TEN_SOURCE_ALLOCATION, 100_000, 0.01, 20_000, 80_000);
            descriptor.topology.name = topology;
            descriptor.cache_policy.name = policy;
            // Topology, catalog and config are built once, only the replication itself is timed
            let experiment = Experiment::new(0, &descriptor).unwrap();
            let cancel = AtomicBool::new(false);
            group.bench_with_input(BenchmarkId::new(format!("{topology:?}"), format!("{policy:?}")), &experiment, |bench, experiment| {
                bench.iter(|| {
                    experiment.run_replication(0, &cancel).unwrap();
                });
            });
        }
    }
}

criterion_group!(
    name = benches;
    config = Criterion::default().significance_level(0.1).sample_size(10);
    targets = criterion_benchmark
);
criterion_main!(benches);
