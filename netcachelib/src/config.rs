use std::collections::BTreeMap;
use std::io::Read;
use std::path::PathBuf;
use serde::{Deserialize, Serialize};
use crate::error::{SimError, SimResult};

/// Reads a queue of experiment descriptors from JSON. A lone descriptor is treated as a queue of one
pub fn read_descriptors<R: Read>(reader: R) -> SimResult<Vec<ExperimentDescriptor>> {
    // Going through a Value keeps serde's field-level error messages, which an untagged enum loses
    let value: serde_json::Value = serde_json::from_reader(reader)?;
    Ok(match value {
        serde_json::Value::Array(_) => serde_json::from_value(value)?,
        _ => vec![serde_json::from_value(value)?],
    })
}

/// A declarative description of one experiment, as handed over by the configuration layer
///
/// Nothing here is validated; see [`ExperimentDescriptor::validate`] for the typed form
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExperimentDescriptor {
    pub topology: TopologyDescriptor,
    pub workload: WorkloadDescriptor,
    pub cache_placement: CachePlacementDescriptor,
    #[serde(default)]
    pub content_placement: ContentPlacementDescriptor,
    #[serde(default)]
    pub cache_policy: CachePolicyDescriptor,
    #[serde(default)]
    pub strategy: StrategyDescriptor,
    #[serde(default = "default_replications")]
    pub n_replications: usize,
    #[serde(default = "MetricKind::all")]
    pub metrics: Vec<MetricKind>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub desc: Option<String>,
}

fn default_replications() -> usize {
    1
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TopologyDescriptor {
    #[serde(default)]
    pub name: TopologyKind,
    pub n: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delay: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub access_delay: Option<f64>,
}

/// Shape of the network: a star around the root, or a single path through every source
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum TopologyKind {
    #[default]
    #[serde(rename = "SCALE", alias = "scale", alias = "STAR", alias = "star")]
    Scale,
    #[serde(rename = "LINE", alias = "line", alias = "PATH", alias = "path")]
    Line,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkloadDescriptor {
    #[serde(default)]
    pub name: WorkloadKind,
    pub n_contents: usize,
    #[serde(default)]
    pub n_warmup: u64,
    pub n_measured: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alpha: Option<f64>,
    #[serde(default = "default_rate")]
    pub rate: f64,
    #[serde(default)]
    pub is_random: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub std_dev: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trace_file: Option<PathBuf>,
}

fn default_rate() -> f64 {
    1.0
}

#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum WorkloadKind {
    #[default]
    #[serde(rename = "STATIONARY", alias = "stationary")]
    Stationary,
    #[serde(rename = "NORMAL", alias = "normal")]
    Normal,
    #[serde(rename = "TRACE", alias = "trace", alias = "TRACE_DRIVEN")]
    Trace,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CachePlacementDescriptor {
    #[serde(default)]
    pub name: CachePlacementKind,
    pub network_cache: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cache_allocation: Option<Vec<f64>>,
}

#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum CachePlacementKind {
    #[default]
    #[serde(rename = "UNIFORM", alias = "uniform")]
    Uniform,
    #[serde(rename = "CCF", alias = "ccf")]
    Ccf,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ContentPlacementDescriptor {
    #[serde(default)]
    pub name: ContentPlacementKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alpha: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_weights: Option<SourceWeights>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub n: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mean: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub std_dev: Option<f64>,
}

/// Source weights arrive either as a dense vector or as a sparse `{"source index": weight}` map
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SourceWeights {
    Dense(Vec<f64>),
    Sparse(BTreeMap<String, f64>),
}

#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ContentPlacementKind {
    #[default]
    #[serde(rename = "UNIFORM", alias = "uniform")]
    Uniform,
    #[serde(rename = "WEIGHTED", alias = "weighted")]
    Weighted,
    #[serde(rename = "ZIPF", alias = "zipf")]
    Zipf,
    #[serde(rename = "NORMAL", alias = "normal")]
    Normal,
    #[serde(rename = "DATA_TO_CCF", alias = "data_to_ccf")]
    DataToCcf,
}

#[derive(Debug, Copy, Clone, Default, Serialize, Deserialize)]
pub struct CachePolicyDescriptor {
    #[serde(default)]
    pub name: EvictionPolicy,
}

/// The eviction policy used by every cache node. Defaults to LRU
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum EvictionPolicy {
    #[default]
    #[serde(rename = "LRU", alias = "lru")]
    LeastRecentlyUsed,
    #[serde(rename = "FIFO", alias = "fifo")]
    FirstInFirstOut,
    #[serde(rename = "LFU", alias = "lfu", alias = "IN_CACHE_LFU")]
    LeastFrequentlyUsed,
}

#[derive(Debug, Copy, Clone, Default, Serialize, Deserialize)]
pub struct StrategyDescriptor {
    #[serde(default)]
    pub name: MetaStrategy,
}

/// Where a fetched object is copied on its way back to the receiver. Defaults to LCE
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum MetaStrategy {
    #[default]
    #[serde(rename = "LCE", alias = "lce")]
    LeaveCopyEverywhere,
    #[serde(rename = "LCD", alias = "lcd")]
    LeaveCopyDown,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum MetricKind {
    #[serde(rename = "CACHE_HIT_RATIO")]
    CacheHitRatio,
    #[serde(rename = "LATENCY")]
    Latency,
    #[serde(rename = "PATH_STRETCH")]
    PathStretch,
    #[serde(rename = "LINK_LOAD")]
    LinkLoad,
}

impl MetricKind {
    pub fn all() -> Vec<MetricKind> {
        vec![MetricKind::CacheHitRatio, MetricKind::Latency, MetricKind::PathStretch, MetricKind::LinkLoad]
    }
}

/// Validated topology parameters
#[derive(Debug, Clone, PartialEq)]
pub struct TopologyConfig {
    pub kind: TopologyKind,
    pub n: usize,
    pub delay: f64,
    pub access_delay: f64,
}

/// How content ranks map to request probabilities
#[derive(Debug, Clone, PartialEq)]
pub enum PopularityModel {
    Zipf { alpha: f64 },
    Normal { std_dev: f64 },
    Trace { path: PathBuf },
}

/// Validated workload parameters
#[derive(Debug, Clone, PartialEq)]
pub struct WorkloadConfig {
    pub popularity: PopularityModel,
    pub n_contents: usize,
    pub n_warmup: u64,
    pub n_measured: u64,
    pub rate: f64,
    pub is_random: bool,
    pub seed: Option<u64>,
}

impl WorkloadConfig {
    /// Warm-up and measured requests together, checked not to overflow during validation
    pub fn total_requests(&self) -> u64 {
        self.n_warmup.saturating_add(self.n_measured)
    }
}

/// Where each content item's authoritative copy lives
#[derive(Debug, Clone, PartialEq)]
pub enum ContentPlacement {
    Uniform,
    /// Dense per-source weights, zero for sources the descriptor didn't mention
    Weighted(Vec<f64>),
    Zipf { alpha: f64 },
    Normal { mean: f64, std_dev: f64 },
    /// Weights supplied verbatim, they also drive the CCF allocation
    DataToCcf(Vec<f64>),
}

/// How the network-wide budget is split across sources
#[derive(Debug, Clone, PartialEq)]
pub enum AllocationMode {
    Uniform,
    /// CCF, optionally with an explicit allocation vector that bypasses the popularity mass
    Ccf { explicit: Option<Vec<f64>> },
}

#[derive(Debug, Clone, PartialEq)]
pub struct CachePlacementConfig {
    /// Network-wide cache budget as a fraction of the catalog size
    pub budget: f64,
    pub mode: AllocationMode,
}

/// A fully validated experiment, ready to be built into simulations
#[derive(Debug, Clone, PartialEq)]
pub struct ExperimentConfig {
    pub topology: TopologyConfig,
    pub workload: WorkloadConfig,
    pub cache_placement: CachePlacementConfig,
    pub content_placement: ContentPlacement,
    pub eviction_policy: EvictionPolicy,
    pub strategy: MetaStrategy,
    pub n_replications: usize,
    pub metrics: Vec<MetricKind>,
}

impl ExperimentDescriptor {
    /// Checks every section of the descriptor, producing the typed configuration
    ///
    /// All checks here happen before the first request is processed, so any failure is a
    /// configuration error which only affects this experiment
    pub fn validate(&self) -> SimResult<ExperimentConfig> {
        let topology = self.topology.validate()?;
        let workload = self.workload.validate()?;
        let cache_placement = self.cache_placement.validate(topology.n)?;
        let content_placement = self.content_placement.validate(topology.n)?;
        if self.n_replications == 0 {
            return Err(SimError::config("n_replications must be at least 1"));
        }
        if self.metrics.is_empty() {
            return Err(SimError::config("at least one metric must be collected"));
        }
        let mut metrics = self.metrics.clone();
        metrics.sort();
        metrics.dedup();
        Ok(ExperimentConfig {
            topology,
            workload,
            cache_placement,
            content_placement,
            eviction_policy: self.cache_policy.name,
            strategy: self.strategy.name,
            n_replications: self.n_replications,
            metrics,
        })
    }
}

fn check_positive(name: &str, value: f64) -> SimResult<f64> {
    if value.is_finite() && value > 0.0 {
        Ok(value)
    } else {
        Err(SimError::config(format!("{name} must be a finite positive number, got {value}")))
    }
}

impl TopologyDescriptor {
    pub fn validate(&self) -> SimResult<TopologyConfig> {
        if self.n < 1 {
            return Err(SimError::config("topology.n must be at least 1"));
        }
        let delay = check_positive("topology.delay", self.delay.unwrap_or(1.0))?;
        let access_delay = check_positive("topology.access_delay", self.access_delay.unwrap_or(delay))?;
        Ok(TopologyConfig { kind: self.name, n: self.n, delay, access_delay })
    }
}

impl WorkloadDescriptor {
    pub fn validate(&self) -> SimResult<WorkloadConfig> {
        if self.n_contents == 0 {
            return Err(SimError::config("workload.n_contents must be at least 1"));
        }
        if self.n_contents > u32::MAX as usize {
            return Err(SimError::config(format!("workload.n_contents can't exceed {}", u32::MAX)));
        }
        if self.n_measured == 0 {
            return Err(SimError::config("workload.n_measured must be at least 1"));
        }
        if self.n_warmup.checked_add(self.n_measured).is_none() {
            return Err(SimError::config(format!(
                "workload.n_warmup ({}) plus workload.n_measured ({}) overflows the request count",
                self.n_warmup, self.n_measured
            )));
        }
        let rate = check_positive("workload.rate", self.rate)?;
        let popularity = match self.name {
            WorkloadKind::Stationary => {
                let alpha = self.alpha.ok_or_else(|| SimError::config("workload.alpha is required for STATIONARY"))?;
                if !alpha.is_finite() || alpha < 0.0 {
                    return Err(SimError::config(format!("workload.alpha must be non-negative, got {alpha}")));
                }
                PopularityModel::Zipf { alpha }
            }
            WorkloadKind::Normal => {
                let std_dev = check_positive("workload.std_dev", self.std_dev.unwrap_or(self.n_contents as f64 / 4.0))?;
                PopularityModel::Normal { std_dev }
            }
            WorkloadKind::Trace => {
                let path = self.trace_file.clone().ok_or_else(|| SimError::config("workload.trace_file is required for TRACE"))?;
                PopularityModel::Trace { path }
            }
        };
        Ok(WorkloadConfig {
            popularity,
            n_contents: self.n_contents,
            n_warmup: self.n_warmup,
            n_measured: self.n_measured,
            rate,
            is_random: self.is_random,
            seed: self.seed,
        })
    }
}

impl CachePlacementDescriptor {
    pub fn validate(&self, sources: usize) -> SimResult<CachePlacementConfig> {
        let budget = self.network_cache;
        if !budget.is_finite() || !(0.0..=1.0).contains(&budget) {
            return Err(SimError::config(format!("cache_placement.network_cache must be within [0, 1], got {budget}")));
        }
        let mode = match self.name {
            CachePlacementKind::Uniform => AllocationMode::Uniform,
            CachePlacementKind::Ccf => {
                let explicit = match &self.cache_allocation {
                    Some(vector) => Some(check_weight_vector("cache_placement.cache_allocation", vector, sources)?),
                    None => None,
                };
                AllocationMode::Ccf { explicit }
            }
        };
        Ok(CachePlacementConfig { budget, mode })
    }
}

impl ContentPlacementDescriptor {
    pub fn validate(&self, sources: usize) -> SimResult<ContentPlacement> {
        if let Some(n) = self.n {
            if n != sources {
                return Err(SimError::config(format!("content_placement.n is {n} but the topology has {sources} sources")));
            }
        }
        Ok(match self.name {
            ContentPlacementKind::Uniform => ContentPlacement::Uniform,
            ContentPlacementKind::Weighted => {
                let weights = match &self.source_weights {
                    Some(SourceWeights::Dense(vector)) => check_weight_vector("content_placement.source_weights", vector, sources)?,
                    Some(SourceWeights::Sparse(map)) => densify(map, sources)?,
                    None => return Err(SimError::config("content_placement.source_weights is required for WEIGHTED")),
                };
                ContentPlacement::Weighted(weights)
            }
            ContentPlacementKind::Zipf => {
                let alpha = self.alpha.unwrap_or(1.0);
                if !alpha.is_finite() || alpha < 0.0 {
                    return Err(SimError::config(format!("content_placement.alpha must be non-negative, got {alpha}")));
                }
                ContentPlacement::Zipf { alpha }
            }
            ContentPlacementKind::Normal => {
                let mean = self.mean.unwrap_or((sources as f64 - 1.0) / 2.0);
                if !mean.is_finite() {
                    return Err(SimError::config("content_placement.mean must be finite"));
                }
                let std_dev = check_positive("content_placement.std_dev", self.std_dev.unwrap_or(sources as f64 / 4.0))?;
                ContentPlacement::Normal { mean, std_dev }
            }
            ContentPlacementKind::DataToCcf => match &self.source_weights {
                Some(SourceWeights::Dense(vector)) => {
                    ContentPlacement::DataToCcf(check_weight_vector("content_placement.source_weights", vector, sources)?)
                }
                Some(SourceWeights::Sparse(_)) => {
                    return Err(SimError::config("DATA_TO_CCF needs source_weights as a vector with one entry per source"))
                }
                None => return Err(SimError::config("content_placement.source_weights is required for DATA_TO_CCF")),
            },
        })
    }
}

/// Checks a per-source weight vector: right length, finite non-negative entries, positive sum
pub fn check_weight_vector(name: &str, vector: &[f64], sources: usize) -> SimResult<Vec<f64>> {
    if vector.len() != sources {
        return Err(SimError::config(format!("{name} has {} entries but the topology has {sources} sources", vector.len())));
    }
    if let Some(bad) = vector.iter().find(|w| !w.is_finite() || **w < 0.0) {
        return Err(SimError::config(format!("{name} contains an invalid weight {bad}")));
    }
    if vector.iter().sum::<f64>() <= 0.0 {
        return Err(SimError::config(format!("{name} sums to zero and can't be normalised")));
    }
    Ok(vector.to_vec())
}

fn densify(map: &BTreeMap<String, f64>, sources: usize) -> SimResult<Vec<f64>> {
    let mut dense = vec![0.0; sources];
    for (key, weight) in map {
        let index: usize = key
            .trim()
            .parse()
            .map_err(|_| SimError::config(format!("source weight key {key:?} is not a source index")))?;
        let slot = dense
            .get_mut(index)
            .ok_or_else(|| SimError::config(format!("source weight key {index} is out of range for {sources} sources")))?;
        *slot = *weight;
    }
    check_weight_vector("content_placement.source_weights", &dense, sources)
}
