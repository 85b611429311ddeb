use proptest::prelude::*;
use crate::allocation::AllocationVector;
use crate::cache::{CacheTrait, GenericCache};
use crate::config::{ContentPlacement, EvictionPolicy, PopularityModel, WorkloadConfig};
use crate::content::Catalog;
use crate::workload::{Request, Workload};

fn weights() -> impl Strategy<Value = Vec<f64>> {
    prop::collection::vec(0.0f64..10.0, 1..20).prop_filter("needs some mass", |w| w.iter().sum::<f64>() > 1e-6)
}

fn placement(sources: usize) -> impl Strategy<Value = ContentPlacement> {
    prop_oneof![
        Just(ContentPlacement::Uniform),
        prop::collection::vec(0.0f64..5.0, sources)
            .prop_filter("needs some mass", |w| w.iter().sum::<f64>() > 1e-6)
            .prop_map(ContentPlacement::Weighted),
        (0.0f64..2.0).prop_map(|alpha| ContentPlacement::Zipf { alpha }),
        (0.5f64..4.0).prop_map(move |std_dev| ContentPlacement::Normal { mean: 0.0, std_dev }),
        prop::collection::vec(0.01f64..1.0, sources).prop_map(ContentPlacement::DataToCcf),
    ]
}

fn policy() -> impl Strategy<Value = EvictionPolicy> {
    prop_oneof![
        Just(EvictionPolicy::LeastRecentlyUsed),
        Just(EvictionPolicy::FirstInFirstOut),
        Just(EvictionPolicy::LeastFrequentlyUsed),
    ]
}

proptest! {
    #[test]
    fn allocation_sums_to_one_and_never_overspends(weights in weights(), budget in 0.0f64..=1.0, n_contents in 1usize..100_000) {
        let allocation = AllocationVector::proportional(&weights).unwrap();
        prop_assert!((allocation.fractions().iter().sum::<f64>() - 1.0).abs() <= 1e-9);
        let capacities = allocation.capacities(budget, n_contents).unwrap();
        prop_assert_eq!(capacities.len(), weights.len());
        prop_assert!(capacities.iter().sum::<usize>() <= n_contents);
        prop_assert!(capacities.iter().sum::<usize>() as f64 <= budget * n_contents as f64 + 1e-6);
    }

    #[test]
    fn every_item_is_placed_exactly_once((sources, placement) in (1usize..12).prop_flat_map(|s| (Just(s), placement(s))), n_contents in 1usize..5_000) {
        let catalog = Catalog::assign(n_contents, sources, &placement).unwrap();
        prop_assert_eq!(catalog.items_per_source().iter().sum::<usize>(), n_contents);
        prop_assert!((0..n_contents as u32).all(|id| catalog.owner(id).map_or(false, |s| s < sources)));
        prop_assert_eq!(catalog.owner(n_contents as u32), None);
    }

    #[test]
    fn workload_is_reproducible(seed in any::<u64>(), alpha in 0.0f64..2.0, is_random in any::<bool>(), n_contents in 1usize..500) {
        let config = WorkloadConfig {
            popularity: PopularityModel::Zipf { alpha },
            n_contents,
            n_warmup: 20,
            n_measured: 80,
            rate: 1.0,
            is_random,
            seed: Some(seed),
        };
        let a: Vec<Request> = Workload::new(&config, seed).unwrap().map(|(r, _)| r).collect();
        let b: Vec<Request> = Workload::new(&config, seed).unwrap().map(|(r, _)| r).collect();
        prop_assert_eq!(a.len(), 100);
        prop_assert!(a.iter().all(|r| (r.content as usize) < n_contents));
        prop_assert_eq!(a, b);
    }

    #[test]
    fn cache_never_exceeds_capacity(policy in policy(), capacity in 0usize..16, requests in prop::collection::vec(0u32..40, 0..300)) {
        let mut cache = GenericCache::with_policy(policy, capacity);
        for content in requests {
            if !cache.lookup(content) {
                cache.insert(content);
            }
            prop_assert!(cache.len() <= capacity);
            prop_assert_eq!(cache.contains(content), capacity > 0);
        }
        let mut resident = cache.resident();
        prop_assert_eq!(resident.len(), cache.len());
        resident.sort();
        resident.dedup();
        prop_assert_eq!(resident.len(), cache.len());
    }
}
