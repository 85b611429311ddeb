use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};
use serde::Serialize;
use crate::allocation::AllocationVector;
use crate::cache::{CacheTrait, GenericCache};
use crate::config::{EvictionPolicy, ExperimentConfig, ExperimentDescriptor, MetaStrategy, MetricKind};
use crate::content::Catalog;
use crate::error::{RunContext, SimError, SimResult};
use crate::metrics::{average_reports, MetricsCollector, MetricsReport, RequestOutcome};
use crate::strategy::StrategyExecutor;
use crate::topology::Topology;
use crate::workload::{Phase, Request, Workload};

/// One replication in progress: the cache state of every source, fed one request at a time
///
/// The simulation supports calling `run` multiple times; requests keep being counted and the
/// caches keep their state across calls
pub struct Simulation<'a> {
    topology: &'a Topology,
    catalog: &'a Catalog,
    caches: Vec<GenericCache>,
    executor: StrategyExecutor,
    collector: MetricsCollector,
    context: RunContext,
    processed: u64,
    simulation_time: Duration,
}

impl<'a> Simulation<'a> {
    /// Creates a simulation with one empty cache per source
    ///
    /// # Arguments
    ///
    /// * `capacities`: The physical cache size of every source, in source order
    /// * `context`: Where this simulation sits in the queue, attached to any invariant violation
    pub fn new(
        topology: &'a Topology,
        catalog: &'a Catalog,
        capacities: &[usize],
        policy: EvictionPolicy,
        strategy: MetaStrategy,
        metrics: &[MetricKind],
        context: RunContext,
    ) -> SimResult<Self> {
        if capacities.len() != topology.source_count() {
            return Err(SimError::invariant(
                context,
                format!("{} cache capacities for {} sources", capacities.len(), topology.source_count()),
            ));
        }
        let total: usize = capacities.iter().sum();
        if total > catalog.len() {
            return Err(SimError::invariant(context, format!("caches hold {total} objects, more than the catalog of {}", catalog.len())));
        }
        Ok(Self {
            topology,
            catalog,
            caches: capacities.iter().map(|capacity| GenericCache::with_policy(policy, *capacity)).collect(),
            executor: StrategyExecutor::new(strategy),
            collector: MetricsCollector::new(metrics, topology),
            context,
            processed: 0,
            simulation_time: Duration::new(0, 0),
        })
    }

    /// Routes a single request and records it if it belongs to the measured phase
    pub fn process(&mut self, request: Request, phase: Phase) -> SimResult<RequestOutcome> {
        let outcome = self
            .executor
            .process(request, self.topology, self.catalog, &mut self.caches)
            .map_err(|e| e.in_context(self.context.with_request(self.processed)))?;
        self.collector.record(&outcome, phase);
        self.processed += 1;
        Ok(outcome)
    }

    /// Processes every request of a workload in order, returning how many were processed
    pub fn run<I: IntoIterator<Item = (Request, Phase)>>(&mut self, workload: I) -> SimResult<u64> {
        self.run_until_cancelled(workload, &AtomicBool::new(false))
    }

    /// As `run`, but checks the flag before every request and stops early once it's set
    ///
    /// A request is never abandoned half way, so the caches and metrics stay consistent
    pub fn run_until_cancelled<I: IntoIterator<Item = (Request, Phase)>>(&mut self, workload: I, cancel: &AtomicBool) -> SimResult<u64> {
        let start = Instant::now();
        let before = self.processed;
        let mut result = Ok(());
        for (request, phase) in workload {
            if cancel.load(Ordering::Relaxed) {
                info!("Simulation ({}) cancelled after {} requests", self.context, self.processed);
                break;
            }
            if let Err(e) = self.process(request, phase) {
                result = Err(e);
                break;
            }
        }
        self.simulation_time += start.elapsed();
        result.map(|_| self.processed - before)
    }

    pub fn caches(&self) -> &[GenericCache] {
        &self.caches
    }

    pub fn collector(&self) -> &MetricsCollector {
        &self.collector
    }

    /// Total number of requests processed, warm-up included
    pub fn processed(&self) -> u64 {
        self.processed
    }

    /// Gets the wall-clock time spent processing requests
    pub fn get_execution_time(&self) -> &Duration {
        &self.simulation_time
    }

    /// Empties every cache and the metrics, ready for a fresh replication
    pub fn reset(&mut self) {
        self.caches.iter_mut().for_each(|cache| cache.clear());
        self.collector.reset();
        self.processed = 0;
    }

    /// Reduces the measured requests to the configured metrics
    pub fn finalise(&self) -> MetricsReport {
        self.collector.finalise()
    }
}

/// The result of a single replication
#[derive(Debug, Clone, Serialize)]
pub struct ReplicationResult {
    pub seed: u64,
    pub allocation: Vec<f64>,
    pub capacities: Vec<usize>,
    pub requests: u64,
    pub cancelled: bool,
    pub metrics: MetricsReport,
}

/// The result of every replication of an experiment, and their average
#[derive(Debug, Clone, Serialize)]
pub struct ExperimentResult {
    pub metrics: MetricsReport,
    pub replications: Vec<ReplicationResult>,
    #[serde(skip)]
    pub simulation_time: Duration,
}

/// One entry of the queue's output, keyed by the descriptor that produced it
#[derive(Debug, Clone, Serialize)]
pub struct ExperimentOutcome {
    pub experiment: ExperimentDescriptor,
    #[serde(flatten)]
    pub status: ExperimentStatus,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ExperimentStatus {
    Results(ExperimentResult),
    Error(String),
}

impl ExperimentOutcome {
    pub fn result(&self) -> Option<&ExperimentResult> {
        match &self.status {
            ExperimentStatus::Results(result) => Some(result),
            ExperimentStatus::Error(_) => None,
        }
    }
}

/// A validated experiment with its topology and catalog built, ready to run replications
///
/// The topology and catalog don't depend on the seed so they're shared by all replications; the
/// workload and the cache sizes (which follow the workload's popularity) are rebuilt for each
pub struct Experiment {
    index: usize,
    config: ExperimentConfig,
    topology: Topology,
    catalog: Catalog,
    base_seed: u64,
}

impl Experiment {
    /// Validates the descriptor and builds everything shared by the replications
    ///
    /// Any failure here is a configuration error: nothing has been simulated yet
    pub fn new(index: usize, descriptor: &ExperimentDescriptor) -> SimResult<Self> {
        let config = descriptor.validate()?;
        let topology = Topology::new(&config.topology)?;
        let catalog = Catalog::assign(config.workload.n_contents, topology.source_count(), &config.content_placement)?;
        let base_seed = match config.workload.seed {
            Some(seed) => seed,
            None => {
                let seed: u64 = rand::random();
                info!("Experiment {index} has no seed, drew {seed}");
                seed
            }
        };
        Ok(Self { index, config, topology, catalog, base_seed })
    }

    pub fn config(&self) -> &ExperimentConfig {
        &self.config
    }

    pub fn topology(&self) -> &Topology {
        &self.topology
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    /// Replication `r` is seeded with the base seed plus `r`
    pub fn replication_seed(&self, replication: usize) -> u64 {
        self.base_seed.wrapping_add(replication as u64)
    }

    /// Builds the workload of a replication and sizes the caches to its popularity
    pub fn prepare(&self, replication: usize) -> SimResult<(Workload, AllocationVector, Vec<usize>)> {
        let workload = Workload::new(&self.config.workload, self.replication_seed(replication))?;
        let allocation = AllocationVector::for_mode(&self.config.cache_placement.mode, &self.catalog, workload.popularity())?;
        let capacities = allocation
            .capacities(self.config.cache_placement.budget, self.catalog.len())
            .map_err(|e| e.in_context(RunContext::experiment(self.index).with_replication(replication)))?;
        debug!("Experiment {} replication {replication} capacities {capacities:?}", self.index);
        Ok((workload, allocation, capacities))
    }

    /// Runs one replication from empty caches, stopping early if `cancel` is set
    pub fn run_replication(&self, replication: usize, cancel: &AtomicBool) -> SimResult<(ReplicationResult, Duration)> {
        let (workload, allocation, capacities) = self.prepare(replication)?;
        let seed = workload.seed();
        let expected = workload.len() as u64;
        let context = RunContext::experiment(self.index).with_replication(replication);
        let mut simulation = Simulation::new(
            &self.topology,
            &self.catalog,
            &capacities,
            self.config.eviction_policy,
            self.config.strategy,
            &self.config.metrics,
            context,
        )?;
        let requests = simulation.run_until_cancelled(workload, cancel)?;
        let result = ReplicationResult {
            seed,
            allocation: allocation.fractions().to_vec(),
            capacities,
            requests,
            cancelled: requests < expected,
            metrics: simulation.finalise(),
        };
        Ok((result, *simulation.get_execution_time()))
    }

    /// Runs every replication in turn and averages their metrics
    pub fn run(&self, cancel: &AtomicBool) -> SimResult<ExperimentResult> {
        let mut replications = Vec::with_capacity(self.config.n_replications);
        let mut simulation_time = Duration::new(0, 0);
        for replication in 0..self.config.n_replications {
            let (result, time) = self.run_replication(replication, cancel)?;
            info!(
                "Experiment {} replication {replication}: {} requests in {:.3}s, hit ratio {:.4}",
                self.index,
                result.requests,
                time.as_secs_f64(),
                result.metrics.get(&MetricKind::CacheHitRatio).map(|m| m.mean()).unwrap_or(f64::NAN)
            );
            simulation_time += time;
            let cancelled = result.cancelled;
            replications.push(result);
            if cancelled {
                break;
            }
        }
        let reports: Vec<MetricsReport> = replications.iter().map(|r| r.metrics.clone()).collect();
        Ok(ExperimentResult { metrics: average_reports(&reports), replications, simulation_time })
    }
}

/// Validates and runs a single experiment through all of its replications
pub fn run_experiment(index: usize, descriptor: &ExperimentDescriptor) -> SimResult<ExperimentResult> {
    info!("Starting experiment {index}{}", descriptor.desc.as_ref().map(|d| format!(" ({d})")).unwrap_or_default());
    Experiment::new(index, descriptor)?.run(&AtomicBool::new(false))
}

/// Runs a queue of experiments in order
///
/// A configuration error only fails its own experiment, which is recorded in the output; an
/// invariant violation means the engine itself is broken, so the whole queue stops
pub fn run_queue(descriptors: &[ExperimentDescriptor]) -> SimResult<Vec<ExperimentOutcome>> {
    let mut outcomes = Vec::with_capacity(descriptors.len());
    for (index, descriptor) in descriptors.iter().enumerate() {
        let status = match run_experiment(index, descriptor) {
            Ok(result) => ExperimentStatus::Results(result),
            Err(e) if e.is_fatal() => return Err(e.in_context(RunContext::experiment(index))),
            Err(e) => {
                warn!("Experiment {index} skipped: {e}");
                ExperimentStatus::Error(e.to_string())
            }
        };
        outcomes.push(ExperimentOutcome { experiment: descriptor.clone(), status });
    }
    Ok(outcomes)
}
