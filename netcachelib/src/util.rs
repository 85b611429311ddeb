use crate::config::{
    CachePlacementDescriptor, CachePlacementKind, ContentPlacementDescriptor, ExperimentDescriptor, MetricKind,
    TopologyDescriptor, TopologyKind, WorkloadDescriptor, WorkloadKind,
};

/// CCF allocation vector measured over ten sources, used by the benchmarks and the CCF scenario
pub const TEN_SOURCE_ALLOCATION: [f64; 10] = [0.130905, 0.110228, 0.110894, 0.137875, 0.0552108, 0.0842742, 0.0973745, 0.0630391, 0.0576518, 0.152547];

/// Builds a seeded experiment on a star of `sources` sources with uniform content placement,
/// uniform cache allocation, LRU and LCE
///
/// The workload is a Zipf(0.8) STATIONARY one; warm-up and measured lengths are picked by the
/// caller. Fields can be changed freely afterwards, the descriptor is only validated when run
pub fn descriptor(sources: usize, n_contents: usize, network_cache: f64, n_warmup: u64, n_measured: u64) -> ExperimentDescriptor {
    ExperimentDescriptor {
        topology: TopologyDescriptor { name: TopologyKind::Scale, n: sources, delay: None, access_delay: None },
        workload: WorkloadDescriptor {
            name: WorkloadKind::Stationary,
            n_contents,
            n_warmup,
            n_measured,
            alpha: Some(0.8),
            rate: 1.0,
            is_random: false,
            seed: Some(1),
            std_dev: None,
            trace_file: None,
        },
        cache_placement: CachePlacementDescriptor { name: CachePlacementKind::Uniform, network_cache, cache_allocation: None },
        content_placement: ContentPlacementDescriptor::default(),
        cache_policy: Default::default(),
        strategy: Default::default(),
        n_replications: 1,
        metrics: MetricKind::all(),
        desc: None,
    }
}

/// As [`descriptor`], with CCF allocation following the given vector
pub fn ccf_descriptor(allocation: &[f64], n_contents: usize, network_cache: f64, n_warmup: u64, n_measured: u64) -> ExperimentDescriptor {
    let mut descriptor = descriptor(allocation.len(), n_contents, network_cache, n_warmup, n_measured);
    descriptor.cache_placement = CachePlacementDescriptor {
        name: CachePlacementKind::Ccf,
        network_cache,
        cache_allocation: Some(allocation.to_vec()),
    };
    descriptor
}
