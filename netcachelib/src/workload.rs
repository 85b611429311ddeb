use tracing::debug;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use crate::config::{PopularityModel, WorkloadConfig};
use crate::content::ContentId;
use crate::distributions::{gaussian_pmf, zipf_pmf, DiscreteDist};
use crate::error::{SimError, SimResult};
use crate::io::read_trace;

/// One content request. Immutable once emitted, consumed exactly once
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Request {
    pub time: f64,
    pub content: ContentId,
}

/// Warm-up requests only bring the caches to steady state; only measured requests are recorded
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Phase {
    WarmUp,
    Measured,
}

enum RequestSource {
    /// i.i.d. draws of a popularity rank, mapped to a content id through `ranking`
    Sampled { ranks: DiscreteDist, ranking: Vec<ContentId> },
    /// Content ids replayed in trace order
    Trace { ids: Vec<ContentId> },
}

/// A lazy, finite sequence of time-stamped requests: `n_warmup` warm-up requests followed by
/// `n_measured` measured ones
///
/// Arrivals form a Poisson process of the configured rate. The whole sequence is a pure function of
/// the configuration and the seed, so two workloads built alike yield identical requests
pub struct Workload {
    source: RequestSource,
    popularity: Vec<f64>,
    rng: StdRng,
    rate: f64,
    n_warmup: u64,
    total: u64,
    emitted: u64,
    time: f64,
    seed: u64,
}

impl Workload {
    pub fn new(config: &WorkloadConfig, seed: u64) -> SimResult<Self> {
        if config.n_contents == 0 {
            return Err(SimError::config("workload needs at least one content item"));
        }
        if !(config.rate.is_finite() && config.rate > 0.0) {
            return Err(SimError::config(format!("request rate must be positive, got {}", config.rate)));
        }
        let mut rng = StdRng::seed_from_u64(seed);
        let total = config.total_requests();
        let (source, popularity) = match &config.popularity {
            PopularityModel::Zipf { alpha } => Self::sampled(zipf_pmf(config.n_contents, *alpha), config, &mut rng)?,
            PopularityModel::Normal { std_dev } => Self::sampled(gaussian_pmf(config.n_contents, 0.0, *std_dev), config, &mut rng)?,
            PopularityModel::Trace { path } => {
                let ids = read_trace(path, config.n_contents, total)?;
                if (ids.len() as u64) < total {
                    return Err(SimError::config(format!(
                        "trace {} holds {} requests but {total} are needed",
                        path.display(),
                        ids.len()
                    )));
                }
                let mut popularity = vec![0.0; config.n_contents];
                for id in &ids {
                    popularity[*id as usize] += 1.0 / total as f64;
                }
                (RequestSource::Trace { ids }, popularity)
            }
        };
        debug!("Workload of {total} requests ({} warm-up) seeded with {seed}", config.n_warmup);
        Ok(Self {
            source,
            popularity,
            rng,
            rate: config.rate,
            n_warmup: config.n_warmup,
            total,
            emitted: 0,
            time: 0.0,
            seed,
        })
    }

    fn sampled(rank_pmf: Vec<f64>, config: &WorkloadConfig, rng: &mut StdRng) -> SimResult<(RequestSource, Vec<f64>)> {
        let mut ranking: Vec<ContentId> = (0..config.n_contents as ContentId).collect();
        if config.is_random {
            ranking.shuffle(rng);
        }
        let mut popularity = vec![0.0; config.n_contents];
        for (rank, content) in ranking.iter().enumerate() {
            popularity[*content as usize] = rank_pmf[rank];
        }
        let ranks = DiscreteDist::new(&rank_pmf)?;
        Ok((RequestSource::Sampled { ranks, ranking }, popularity))
    }

    /// Request probability of every content id, indexed by id
    pub fn popularity(&self) -> &[f64] {
        &self.popularity
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    /// Number of requests still to be emitted
    pub fn remaining(&self) -> u64 {
        self.total - self.emitted
    }
}

impl Iterator for Workload {
    type Item = (Request, Phase);

    fn next(&mut self) -> Option<Self::Item> {
        if self.emitted >= self.total {
            return None;
        }
        let content = match &self.source {
            RequestSource::Sampled { ranks, ranking } => ranking[ranks.sample(&mut self.rng)],
            RequestSource::Trace { ids } => ids[self.emitted as usize],
        };
        // Exponential inter-arrival time by inverse transform, 1 - u is in (0, 1]
        let u: f64 = self.rng.gen();
        self.time += -(1.0 - u).ln() / self.rate;
        let phase = if self.emitted < self.n_warmup { Phase::WarmUp } else { Phase::Measured };
        self.emitted += 1;
        Some((Request { time: self.time, content }, phase))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.remaining() as usize;
        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for Workload {}
