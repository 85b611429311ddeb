use crate::config::ContentPlacement;
use crate::distributions::{apportion, gaussian_pmf, normalise, zipf_pmf};
use crate::error::{SimError, SimResult};

pub type ContentId = u32;

/// Assignment of every content item to the one source holding its authoritative copy
///
/// Ownership is fixed for the lifetime of the experiment
#[derive(Debug, Clone)]
pub struct Catalog {
    owners: Vec<usize>,
    items_per_source: Vec<usize>,
    /// Normalised placement mass, only for weight-driven placements
    weights: Option<Vec<f64>>,
    /// Whether the weights were supplied verbatim and should also drive cache allocation
    verbatim: bool,
}

impl Catalog {
    /// Places `n_contents` items on `sources` source nodes
    pub fn assign(n_contents: usize, sources: usize, placement: &ContentPlacement) -> SimResult<Self> {
        if n_contents == 0 {
            return Err(SimError::config("the catalog needs at least one content item"));
        }
        if sources == 0 {
            return Err(SimError::config("content can't be placed without sources"));
        }
        let (weights, verbatim) = match placement {
            ContentPlacement::Uniform => {
                let owners: Vec<usize> = (0..n_contents).map(|content| content % sources).collect();
                return Ok(Self::from_owners(owners, sources, None, false));
            }
            ContentPlacement::Weighted(weights) => (normalise(weights)?, false),
            ContentPlacement::Zipf { alpha } => (zipf_pmf(sources, *alpha), false),
            ContentPlacement::Normal { mean, std_dev } => (gaussian_pmf(sources, *mean, *std_dev), false),
            ContentPlacement::DataToCcf(weights) => {
                if weights.len() != sources {
                    return Err(SimError::config(format!(
                        "DATA_TO_CCF weights have {} entries but there are {sources} sources",
                        weights.len()
                    )));
                }
                (normalise(weights)?, true)
            }
        };
        if weights.len() != sources {
            return Err(SimError::config(format!("{} source weights given for {sources} sources", weights.len())));
        }
        let quotas = apportion(&weights, n_contents);
        let owners = interleave(&quotas);
        Ok(Self::from_owners(owners, sources, Some(weights), verbatim))
    }

    fn from_owners(owners: Vec<usize>, sources: usize, weights: Option<Vec<f64>>, verbatim: bool) -> Self {
        let mut items_per_source = vec![0; sources];
        for owner in &owners {
            items_per_source[*owner] += 1;
        }
        Self { owners, items_per_source, weights, verbatim }
    }

    /// Number of content items in the catalog
    pub fn len(&self) -> usize {
        self.owners.len()
    }

    pub fn is_empty(&self) -> bool {
        self.owners.is_empty()
    }

    pub fn source_count(&self) -> usize {
        self.items_per_source.len()
    }

    /// The source owning a content item, or `None` if the id is outside the catalog
    pub fn owner(&self, content: ContentId) -> Option<usize> {
        self.owners.get(content as usize).copied()
    }

    pub fn items_per_source(&self) -> &[usize] {
        &self.items_per_source
    }

    /// Probability mass the placement gave a source. `None` for placements that aren't weight driven
    pub fn weight(&self, source: usize) -> Option<f64> {
        self.weights.as_ref().and_then(|w| w.get(source).copied())
    }

    /// The weight vector supplied verbatim by the descriptor (DATA_TO_CCF placements only)
    pub fn verbatim_weights(&self) -> Option<&[f64]> {
        if self.verbatim {
            self.weights.as_deref()
        } else {
            None
        }
    }

    /// Sums the per-content request probabilities by owning source
    pub fn popularity_mass(&self, pmf: &[f64]) -> Vec<f64> {
        let mut mass = vec![0.0; self.source_count()];
        for (owner, p) in self.owners.iter().zip(pmf) {
            mass[*owner] += p;
        }
        mass
    }
}

/// Lays the quotas out over content ids so each source's items are spread evenly across the id
/// range rather than in one block
///
/// Source `i`'s `j`th item is due at `(j + 0.5) / quota_i`; ids are handed out in due order, ties to
/// the lower source index
fn interleave(quotas: &[usize]) -> Vec<usize> {
    let total: usize = quotas.iter().sum();
    let mut due: Vec<(f64, usize)> = Vec::with_capacity(total);
    for (source, quota) in quotas.iter().enumerate() {
        due.extend((0..*quota).map(|j| ((j as f64 + 0.5) / *quota as f64, source)));
    }
    due.sort_by(|a, b| a.0.total_cmp(&b.0).then(a.1.cmp(&b.1)));
    due.into_iter().map(|(_, source)| source).collect()
}
