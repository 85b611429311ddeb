use std::collections::BTreeMap;
use serde::{Deserialize, Serialize};
use crate::config::MetricKind;
use crate::topology::{EdgeId, Topology};
use crate::workload::{Phase, Request};

/// Who ended up serving a request
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ServedBy {
    /// The cache on the given source's node
    Cache(usize),
    /// The authoritative store of the given source
    Source(usize),
}

/// Everything the executor learnt while processing one request
#[derive(Debug, Clone, PartialEq)]
pub struct RequestOutcome {
    pub request: Request,
    pub served_by: ServedBy,
    /// Hops from the receiver to the serving node
    pub hops: usize,
    /// Hops from the receiver to the first cache on the path
    pub shortest_hops: usize,
    /// Cumulative edge delay from the receiver to the serving node
    pub latency: f64,
    /// Edges traversed, each exactly once
    pub edges: Vec<EdgeId>,
}

impl RequestOutcome {
    pub fn is_cache_hit(&self) -> bool {
        matches!(self.served_by, ServedBy::Cache(_))
    }

    pub fn path_stretch(&self) -> f64 {
        self.hops as f64 / self.shortest_hops.max(1) as f64
    }
}

/// Running counters for the measured phase of one replication
#[derive(Debug, Clone, Default)]
pub struct MetricsAccumulator {
    pub requests: u64,
    pub hits: u64,
    pub misses: u64,
    pub node_hits: Vec<u64>,
    pub latencies: Vec<f64>,
    pub total_stretch: f64,
    pub max_stretch: f64,
    pub link_load: Vec<u64>,
    pub first_time: Option<f64>,
    pub last_time: f64,
}

impl MetricsAccumulator {
    fn new(sources: usize, edges: usize) -> Self {
        Self {
            node_hits: vec![0; sources],
            link_load: vec![0; edges],
            ..Self::default()
        }
    }

    fn record(&mut self, outcome: &RequestOutcome) {
        self.requests += 1;
        match outcome.served_by {
            ServedBy::Cache(source) => {
                self.hits += 1;
                self.node_hits[source] += 1;
            }
            ServedBy::Source(_) => self.misses += 1,
        }
        self.latencies.push(outcome.latency);
        let stretch = outcome.path_stretch();
        self.total_stretch += stretch;
        self.max_stretch = self.max_stretch.max(stretch);
        for edge in &outcome.edges {
            self.link_load[*edge] += 1;
        }
        self.first_time.get_or_insert(outcome.request.time);
        self.last_time = outcome.request.time;
    }
}

/// Collects the selected metrics over the measured phase
///
/// Warm-up outcomes are dropped on arrival, so the accumulator only ever sees measured requests
#[derive(Debug, Clone)]
pub struct MetricsCollector {
    metrics: Vec<MetricKind>,
    accumulator: MetricsAccumulator,
    source_labels: Vec<String>,
    edge_labels: Vec<String>,
}

impl MetricsCollector {
    pub fn new(metrics: &[MetricKind], topology: &Topology) -> Self {
        let sources = topology.source_count();
        let edges = topology.edges().len();
        Self {
            metrics: metrics.to_vec(),
            accumulator: MetricsAccumulator::new(sources, edges),
            source_labels: (0..sources).map(|s| topology.node_label(topology.source_node(s))).collect(),
            edge_labels: (0..edges).map(|e| topology.edge_label(e)).collect(),
        }
    }

    pub fn record(&mut self, outcome: &RequestOutcome, phase: Phase) {
        if phase == Phase::Measured {
            self.accumulator.record(outcome);
        }
    }

    pub fn accumulator(&self) -> &MetricsAccumulator {
        &self.accumulator
    }

    /// Clears every counter, ready for the next replication
    pub fn reset(&mut self) {
        self.accumulator = MetricsAccumulator::new(self.source_labels.len(), self.edge_labels.len());
    }

    /// Reduces the counters to the reported values. Only the selected metrics are present
    pub fn finalise(&self) -> MetricsReport {
        let acc = &self.accumulator;
        self.metrics
            .iter()
            .map(|kind| {
                let summary = match kind {
                    MetricKind::CacheHitRatio => MetricSummary::HitRatio(self.hit_ratio()),
                    MetricKind::Latency => MetricSummary::Latency(LatencySummary::from_samples(&acc.latencies)),
                    MetricKind::PathStretch => MetricSummary::PathStretch(StretchSummary {
                        mean: ratio(acc.total_stretch, acc.requests as f64),
                        max: acc.max_stretch,
                    }),
                    MetricKind::LinkLoad => MetricSummary::LinkLoad(self.link_load()),
                };
                (*kind, summary)
            })
            .collect()
    }

    fn hit_ratio(&self) -> HitRatioSummary {
        let acc = &self.accumulator;
        let requests = acc.requests as f64;
        HitRatioSummary {
            mean: ratio(acc.hits as f64, requests),
            server_hit_ratio: ratio(acc.misses as f64, requests),
            per_node: self
                .source_labels
                .iter()
                .zip(&acc.node_hits)
                .map(|(label, hits)| (label.clone(), ratio(*hits as f64, requests)))
                .collect(),
        }
    }

    fn link_load(&self) -> LinkLoadSummary {
        let acc = &self.accumulator;
        let duration = acc.first_time.map_or(0.0, |first| acc.last_time - first);
        // A single measured request has no duration, report raw counts instead of dividing by zero
        let scale = if duration > 0.0 { duration } else { 1.0 };
        let rates: Vec<f64> = acc.link_load.iter().map(|count| *count as f64 / scale).collect();
        LinkLoadSummary {
            mean: ratio(rates.iter().sum(), rates.len() as f64),
            max: rates.iter().cloned().fold(0.0, f64::max),
            per_link: self
                .edge_labels
                .iter()
                .zip(&acc.link_load)
                .map(|(label, count)| (label.clone(), *count as f64))
                .collect(),
        }
    }
}

fn ratio(numerator: f64, denominator: f64) -> f64 {
    if denominator > 0.0 {
        numerator / denominator
    } else {
        0.0
    }
}

/// Finalised metrics of one replication, keyed by metric name
pub type MetricsReport = BTreeMap<MetricKind, MetricSummary>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub struct HitRatioSummary {
    pub mean: f64,
    pub server_hit_ratio: f64,
    pub per_node: BTreeMap<String, f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub struct LatencySummary {
    pub mean: f64,
    pub p50: f64,
    pub p90: f64,
    pub p99: f64,
    pub max: f64,
}

impl LatencySummary {
    fn from_samples(samples: &[f64]) -> Self {
        let mut sorted = samples.to_vec();
        sorted.sort_by(|a, b| a.total_cmp(b));
        Self {
            mean: ratio(sorted.iter().sum(), sorted.len() as f64),
            p50: percentile(&sorted, 50.0),
            p90: percentile(&sorted, 90.0),
            p99: percentile(&sorted, 99.0),
            max: sorted.last().copied().unwrap_or(0.0),
        }
    }
}

/// Nearest-rank percentile of sorted samples
fn percentile(sorted: &[f64], p: f64) -> f64 {
    if sorted.is_empty() {
        return 0.0;
    }
    let rank = ((p / 100.0) * sorted.len() as f64).ceil() as usize;
    sorted[rank.clamp(1, sorted.len()) - 1]
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub struct StretchSummary {
    pub mean: f64,
    pub max: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub struct LinkLoadSummary {
    /// Mean requests per unit of time over all links
    pub mean: f64,
    /// Busiest link, requests per unit of time
    pub max: f64,
    /// Requests carried by each link during the measured phase
    pub per_link: BTreeMap<String, f64>,
}

/// The aggregated value of one metric
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum MetricSummary {
    HitRatio(HitRatioSummary),
    Latency(LatencySummary),
    PathStretch(StretchSummary),
    LinkLoad(LinkLoadSummary),
}

impl MetricSummary {
    /// The headline number of the metric
    pub fn mean(&self) -> f64 {
        match self {
            MetricSummary::HitRatio(s) => s.mean,
            MetricSummary::Latency(s) => s.mean,
            MetricSummary::PathStretch(s) => s.mean,
            MetricSummary::LinkLoad(s) => s.mean,
        }
    }
}

/// Averages every value of several replications' reports, field by field
///
/// All reports must come from the same experiment, so they share keys and metric kinds
pub fn average_reports(reports: &[MetricsReport]) -> MetricsReport {
    let Some(first) = reports.first() else {
        return MetricsReport::new();
    };
    first
        .keys()
        .map(|kind| {
            let summaries: Vec<&MetricSummary> = reports.iter().filter_map(|r| r.get(kind)).collect();
            (*kind, average_summaries(&summaries))
        })
        .collect()
}

fn mean_of<'a, T: 'a>(items: &[&'a T], field: impl Fn(&'a T) -> f64) -> f64 {
    ratio(items.iter().map(|item| field(*item)).sum(), items.len() as f64)
}

fn mean_map<'a, T: 'a>(items: &[&'a T], field: impl Fn(&'a T) -> &'a BTreeMap<String, f64>) -> BTreeMap<String, f64> {
    let mut sums: BTreeMap<String, f64> = BTreeMap::new();
    for item in items {
        for (key, value) in field(*item) {
            *sums.entry(key.clone()).or_default() += value;
        }
    }
    sums.into_iter().map(|(key, sum)| (key, ratio(sum, items.len() as f64))).collect()
}

fn average_summaries(summaries: &[&MetricSummary]) -> MetricSummary {
    macro_rules! collect_variant {
        ($variant:ident) => {
            summaries
                .iter()
                .filter_map(|s| match s {
                    MetricSummary::$variant(inner) => Some(inner),
                    _ => None,
                })
                .collect::<Vec<_>>()
        };
    }
    match summaries[0] {
        MetricSummary::HitRatio(_) => {
            let items = collect_variant!(HitRatio);
            MetricSummary::HitRatio(HitRatioSummary {
                mean: mean_of(&items, |s| s.mean),
                server_hit_ratio: mean_of(&items, |s| s.server_hit_ratio),
                per_node: mean_map(&items, |s| &s.per_node),
            })
        }
        MetricSummary::Latency(_) => {
            let items = collect_variant!(Latency);
            MetricSummary::Latency(LatencySummary {
                mean: mean_of(&items, |s| s.mean),
                p50: mean_of(&items, |s| s.p50),
                p90: mean_of(&items, |s| s.p90),
                p99: mean_of(&items, |s| s.p99),
                max: mean_of(&items, |s| s.max),
            })
        }
        MetricSummary::PathStretch(_) => {
            let items = collect_variant!(PathStretch);
            MetricSummary::PathStretch(StretchSummary { mean: mean_of(&items, |s| s.mean), max: mean_of(&items, |s| s.max) })
        }
        MetricSummary::LinkLoad(_) => {
            let items = collect_variant!(LinkLoad);
            MetricSummary::LinkLoad(LinkLoadSummary {
                mean: mean_of(&items, |s| s.mean),
                max: mean_of(&items, |s| s.max),
                per_link: mean_map(&items, |s| &s.per_link),
            })
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::config::{TopologyConfig, TopologyKind};

    fn topology() -> Topology {
        Topology::new(&TopologyConfig { kind: TopologyKind::Scale, n: 2, delay: 1.0, access_delay: 1.0 }).unwrap()
    }

    fn outcome(time: f64, served_by: ServedBy, source_edge: EdgeId) -> RequestOutcome {
        RequestOutcome {
            request: Request { time, content: 0 },
            served_by,
            hops: 2,
            shortest_hops: 2,
            latency: 2.0,
            edges: vec![0, source_edge],
        }
    }

    #[test]
    fn ignores_warm_up() {
        let mut collector = MetricsCollector::new(&MetricKind::all(), &topology());
        collector.record(&outcome(1.0, ServedBy::Cache(0), 1), Phase::WarmUp);
        assert_eq!(collector.accumulator().requests, 0);
        collector.record(&outcome(2.0, ServedBy::Source(1), 2), Phase::Measured);
        assert_eq!(collector.accumulator().requests, 1);
        assert_eq!(collector.accumulator().link_load, vec![1, 0, 1]);
    }

    #[test]
    fn finalises_ratios_and_loads() {
        let mut collector = MetricsCollector::new(&MetricKind::all(), &topology());
        collector.record(&outcome(1.0, ServedBy::Cache(0), 1), Phase::Measured);
        collector.record(&outcome(2.0, ServedBy::Cache(0), 1), Phase::Measured);
        collector.record(&outcome(3.0, ServedBy::Source(1), 2), Phase::Measured);
        collector.record(&outcome(5.0, ServedBy::Cache(1), 2), Phase::Measured);
        let report = collector.finalise();
        let MetricSummary::HitRatio(hits) = &report[&MetricKind::CacheHitRatio] else { panic!("wrong summary") };
        assert_eq!(hits.mean, 0.75);
        assert_eq!(hits.server_hit_ratio, 0.25);
        assert_eq!(hits.per_node["source_0"], 0.5);
        let MetricSummary::LinkLoad(load) = &report[&MetricKind::LinkLoad] else { panic!("wrong summary") };
        assert_eq!(load.per_link["receiver-root"], 4.0);
        assert_eq!(load.per_link["root-source_1"], 2.0);
        // Four time units of measurement
        assert_eq!(load.max, 1.0);
        assert_eq!(report[&MetricKind::PathStretch].mean(), 1.0);

        collector.reset();
        assert_eq!(collector.accumulator().requests, 0);
        assert_eq!(collector.accumulator().node_hits, vec![0, 0]);
    }

    #[test]
    fn nearest_rank_percentiles() {
        let samples: Vec<f64> = (1..=100).map(|v| v as f64).collect();
        let summary = LatencySummary::from_samples(&samples);
        assert_eq!(summary.p50, 50.0);
        assert_eq!(summary.p90, 90.0);
        assert_eq!(summary.p99, 99.0);
        assert_eq!(summary.max, 100.0);
        assert_eq!(summary.mean, 50.5);
    }

    #[test]
    fn only_selected_metrics_are_reported() {
        let collector = MetricsCollector::new(&[MetricKind::Latency], &topology());
        let report = collector.finalise();
        assert_eq!(report.keys().copied().collect::<Vec<_>>(), vec![MetricKind::Latency]);
        // Nothing was measured, values degrade to zero rather than NaN
        assert_eq!(report[&MetricKind::Latency].mean(), 0.0);
    }

    #[test]
    fn averages_replications() {
        let mut a = MetricsCollector::new(&[MetricKind::CacheHitRatio], &topology());
        let mut b = a.clone();
        a.record(&outcome(1.0, ServedBy::Cache(0), 1), Phase::Measured);
        b.record(&outcome(1.0, ServedBy::Source(0), 1), Phase::Measured);
        let averaged = average_reports(&[a.finalise(), b.finalise()]);
        let MetricSummary::HitRatio(hits) = &averaged[&MetricKind::CacheHitRatio] else { panic!("wrong summary") };
        assert_eq!(hits.mean, 0.5);
        assert_eq!(hits.per_node["source_0"], 0.5);
    }
}
