use tracing::{debug, warn};
use crate::config::AllocationMode;
use crate::content::Catalog;
use crate::distributions::normalise;
use crate::error::{RunContext, SimError, SimResult};

/// Tolerance on the sum of a normalised allocation vector
pub const ALLOCATION_TOLERANCE: f64 = 1e-9;

/// Explicit allocation vectors further than this from summing to one are still accepted, but
/// almost certainly point at a typo in the descriptor
const DRIFT_WARNING: f64 = 1e-3;

/// The share of the network-wide cache budget given to each source. Sums to one
#[derive(Debug, Clone, PartialEq)]
pub struct AllocationVector {
    fractions: Vec<f64>,
}

impl AllocationVector {
    /// Flat baseline, every source gets `1/n`
    pub fn uniform(sources: usize) -> SimResult<Self> {
        if sources == 0 {
            return Err(SimError::config("can't allocate cache across zero sources"));
        }
        Self::checked(vec![1.0 / sources as f64; sources])
    }

    /// CCF: cache in proportion to the request mass each source is expected to serve
    pub fn proportional(mass: &[f64]) -> SimResult<Self> {
        if mass.is_empty() {
            return Err(SimError::config("can't allocate cache across zero sources"));
        }
        Self::checked(normalise(mass)?)
    }

    /// Picks the allocation for an experiment
    ///
    /// For CCF the mass comes from, in order: the explicit vector in the descriptor, the weights of a
    /// DATA_TO_CCF placement, or the popularity mass of each source's items under `pmf`
    pub fn for_mode(mode: &AllocationMode, catalog: &Catalog, pmf: &[f64]) -> SimResult<Self> {
        let sources = catalog.source_count();
        match mode {
            AllocationMode::Uniform => Self::uniform(sources),
            AllocationMode::Ccf { explicit: Some(vector) } => {
                if vector.len() != sources {
                    return Err(SimError::config(format!(
                        "cache allocation has {} entries but there are {sources} sources",
                        vector.len()
                    )));
                }
                let sum: f64 = vector.iter().sum();
                if (sum - 1.0).abs() > DRIFT_WARNING {
                    warn!("Cache allocation sums to {sum}, normalising");
                }
                Self::proportional(vector)
            }
            AllocationMode::Ccf { explicit: None } => match catalog.verbatim_weights() {
                Some(weights) => Self::proportional(weights),
                None => Self::proportional(&catalog.popularity_mass(pmf)),
            },
        }
    }

    fn checked(fractions: Vec<f64>) -> SimResult<Self> {
        let sum: f64 = fractions.iter().sum();
        if (sum - 1.0).abs() > ALLOCATION_TOLERANCE {
            return Err(SimError::invariant(RunContext::default(), format!("allocation vector sums to {sum} after normalisation")));
        }
        Ok(Self { fractions })
    }

    pub fn fractions(&self) -> &[f64] {
        &self.fractions
    }

    pub fn len(&self) -> usize {
        self.fractions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fractions.is_empty()
    }

    /// Index of the largest fraction, ties to the lowest index
    fn heaviest(&self) -> usize {
        let mut best = 0;
        for (index, fraction) in self.fractions.iter().enumerate() {
            if *fraction > self.fractions[best] {
                best = index;
            }
        }
        best
    }

    /// Converts the fractions into whole-object cache sizes
    ///
    /// The budget is `floor(budget * n_contents)` objects. Each source gets
    /// `round(fraction * budget * n_contents)`, or the floor of it when rounding would overspend the
    /// budget. Whatever is left of the budget after that goes to the source with the largest
    /// fraction, so the sizes always add up to the budget exactly
    pub fn capacities(&self, budget: f64, n_contents: usize) -> SimResult<Vec<usize>> {
        if !budget.is_finite() || !(0.0..=1.0).contains(&budget) {
            return Err(SimError::config(format!("cache budget must be within [0, 1], got {budget}")));
        }
        let exact = budget * n_contents as f64;
        // Absorb float noise such as 0.001 * 1e5 landing a hair under 100
        let total = ((exact + ALLOCATION_TOLERANCE * exact.max(1.0)).floor() as usize).min(n_contents);
        let raw: Vec<f64> = self.fractions.iter().map(|f| f * exact).collect();
        let mut capacities: Vec<usize> = raw.iter().map(|r| r.round() as usize).collect();
        if capacities.iter().sum::<usize>() > total {
            capacities = raw.iter().map(|r| r.floor() as usize).collect();
            debug!("Rounded capacities overspent the budget of {total}, flooring them");
        }
        let assigned: usize = capacities.iter().sum();
        if assigned < total {
            let heaviest = self.heaviest();
            capacities[heaviest] += total - assigned;
            debug!("Gave the residual {} of the budget of {total} to source {heaviest}", total - assigned);
        }
        let spent: usize = capacities.iter().sum();
        if spent > total {
            return Err(SimError::invariant(RunContext::default(), format!("capacities sum to {spent}, over the budget of {total}")));
        }
        Ok(capacities)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::config::ContentPlacement;

    #[test]
    fn uniform_is_flat() {
        let allocation = AllocationVector::uniform(4).unwrap();
        assert_eq!(allocation.fractions(), &[0.25; 4]);
        assert_eq!(allocation.capacities(1.0, 100).unwrap(), vec![25; 4]);
    }

    #[test]
    fn overspend_floors_and_tops_up_heaviest() {
        // Three sources at 1/3 of 5 objects round to 2 each, 6 > 5
        let allocation = AllocationVector::uniform(3).unwrap();
        assert_eq!(allocation.capacities(0.5, 10).unwrap(), vec![3, 1, 1]);

        let allocation = AllocationVector::proportional(&[0.25, 0.25, 0.5]).unwrap();
        // 0.5, 0.5, 1.0 round to 1, 1, 1 = 3 > 2
        assert_eq!(allocation.capacities(0.2, 10).unwrap(), vec![0, 0, 2]);
    }

    #[test]
    fn underspend_tops_up_heaviest() {
        // 10 / 3 rounds to 3 each, one object short of the budget
        let allocation = AllocationVector::uniform(3).unwrap();
        assert_eq!(allocation.capacities(1.0, 10).unwrap(), vec![4, 3, 3]);

        // 1, 4.5, 4.5 either overspends and floors to 9, or rounds down to 9; both top up the first tie
        let allocation = AllocationVector::proportional(&[2.0, 9.0, 9.0]).unwrap();
        assert_eq!(allocation.capacities(1.0, 10).unwrap(), vec![1, 5, 4]);
    }

    #[test]
    fn zero_budget_disables_every_cache() {
        let allocation = AllocationVector::proportional(&[3.0, 1.0]).unwrap();
        assert_eq!(allocation.capacities(0.0, 1000).unwrap(), vec![0, 0]);
    }

    #[test]
    fn rejects_out_of_range_budget() {
        let allocation = AllocationVector::uniform(2).unwrap();
        assert!(matches!(allocation.capacities(1.5, 10), Err(SimError::Configuration(_))));
        assert!(matches!(allocation.capacities(-0.1, 10), Err(SimError::Configuration(_))));
    }

    #[test]
    fn ccf_without_explicit_vector_follows_popularity() {
        let catalog = Catalog::assign(4, 2, &ContentPlacement::Uniform).unwrap();
        let allocation = AllocationVector::for_mode(&AllocationMode::Ccf { explicit: None }, &catalog, &[0.4, 0.3, 0.2, 0.1]).unwrap();
        assert!((allocation.fractions()[0] - 0.6).abs() < 1e-12);
        assert!((allocation.fractions()[1] - 0.4).abs() < 1e-12);
    }

    #[test]
    fn ccf_prefers_data_to_ccf_weights() {
        let catalog = Catalog::assign(4, 2, &ContentPlacement::DataToCcf(vec![1.0, 3.0])).unwrap();
        let allocation = AllocationVector::for_mode(&AllocationMode::Ccf { explicit: None }, &catalog, &[0.25; 4]).unwrap();
        assert_eq!(allocation.fractions(), &[0.25, 0.75]);
    }
}
