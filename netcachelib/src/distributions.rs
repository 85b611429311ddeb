use rand::Rng;
use crate::error::{SimError, SimResult};

/// Scales a weight vector so it sums to one
///
/// Fails if any weight is negative or not finite, or if the weights sum to zero
pub fn normalise(weights: &[f64]) -> SimResult<Vec<f64>> {
    if weights.iter().any(|w| !w.is_finite() || *w < 0.0) {
        return Err(SimError::config("weights must be finite and non-negative"));
    }
    let total: f64 = weights.iter().sum();
    if total <= 0.0 || !total.is_finite() {
        return Err(SimError::config("weights sum to zero and can't be normalised"));
    }
    Ok(weights.iter().map(|w| w / total).collect())
}

/// Zipf mass over ranks `1..=n`: `p(r) ∝ 1 / r^alpha`. Index 0 holds rank 1
pub fn zipf_pmf(n: usize, alpha: f64) -> Vec<f64> {
    let weights: Vec<f64> = (1..=n).map(|rank| 1.0 / (rank as f64).powf(alpha)).collect();
    let total: f64 = weights.iter().sum();
    weights.into_iter().map(|w| w / total).collect()
}

/// Gaussian density sampled at `0..n`, truncated to that range and renormalised
///
/// Falls back to a uniform mass if every point underflows to zero, which can only happen when the
/// mean is very far outside the range relative to the deviation
pub fn gaussian_pmf(n: usize, mean: f64, std_dev: f64) -> Vec<f64> {
    let weights: Vec<f64> = (0..n)
        .map(|i| {
            let z = (i as f64 - mean) / std_dev;
            (-0.5 * z * z).exp()
        })
        .collect();
    let total: f64 = weights.iter().sum();
    if total > 0.0 {
        weights.into_iter().map(|w| w / total).collect()
    } else {
        vec![1.0 / n as f64; n]
    }
}

/// Splits `total` units across `weights` in proportion, using largest-remainder rounding so that
/// the quotas always sum to `total` exactly
///
/// Ties on the remainder go to the lowest index. Weights must already be validated
pub fn apportion(weights: &[f64], total: usize) -> Vec<usize> {
    let sum: f64 = weights.iter().sum();
    let exact: Vec<f64> = weights.iter().map(|w| w / sum * total as f64).collect();
    let mut quotas: Vec<usize> = exact.iter().map(|e| e.floor() as usize).collect();
    let assigned: usize = quotas.iter().sum();
    let mut order: Vec<usize> = (0..weights.len()).filter(|i| weights[*i] > 0.0).collect();
    order.sort_by(|a, b| {
        let ra = exact[*a] - exact[*a].floor();
        let rb = exact[*b] - exact[*b].floor();
        rb.total_cmp(&ra).then(a.cmp(b))
    });
    // Float error in the floors can leave the residual off by one in either direction
    if assigned <= total {
        for index in order.iter().cycle().take(total - assigned) {
            quotas[*index] += 1;
        }
    } else {
        let mut excess = assigned - total;
        for index in order.iter().rev() {
            if excess == 0 {
                break;
            }
            if quotas[*index] > 0 {
                quotas[*index] -= 1;
                excess -= 1;
            }
        }
    }
    quotas
}

/// A discrete distribution over `0..n` sampled by inverse transform on the cumulative mass
#[derive(Debug, Clone)]
pub struct DiscreteDist {
    pmf: Vec<f64>,
    cdf: Vec<f64>,
}

impl DiscreteDist {
    pub fn new(weights: &[f64]) -> SimResult<Self> {
        if weights.is_empty() {
            return Err(SimError::config("a distribution needs at least one outcome"));
        }
        let pmf = normalise(weights)?;
        let mut running = 0.0;
        let mut cdf: Vec<f64> = pmf
            .iter()
            .map(|p| {
                running += p;
                running
            })
            .collect();
        // Guard against the running sum landing just under 1, which would let trailing zero-mass
        // outcomes be drawn
        let last_positive = pmf.iter().rposition(|p| *p > 0.0).unwrap_or(pmf.len() - 1);
        cdf[last_positive..].iter_mut().for_each(|c| *c = 1.0);
        Ok(Self { pmf, cdf })
    }

    pub fn len(&self) -> usize {
        self.pmf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pmf.is_empty()
    }

    pub fn pmf(&self) -> &[f64] {
        &self.pmf
    }

    /// Draws one outcome. Zero-mass outcomes are never returned
    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> usize {
        let u: f64 = rng.gen();
        // First index whose cumulative mass exceeds u
        self.cdf.partition_point(|c| *c <= u).min(self.cdf.len() - 1)
    }
}
