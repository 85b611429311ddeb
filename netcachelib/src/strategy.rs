use tracing::trace;
use crate::cache::{CacheTrait, GenericCache};
use crate::config::MetaStrategy;
use crate::content::Catalog;
use crate::error::{RunContext, SimError, SimResult};
use crate::metrics::{RequestOutcome, ServedBy};
use crate::topology::Topology;
use crate::workload::Request;

/// Routes requests through the cache hierarchy and applies the meta-strategy on the way back
///
/// Each request goes through the same states:
///
/// * route down: walk from the receiver towards the content's source, probing every cache in order
/// * hit: the first cache holding the content serves it, routing stops
/// * miss at source: no cache on the path held it, the source's store always can
/// * return and insert: walk back towards the receiver, copying the content into caches as the
///   meta-strategy dictates
///
/// Requests are processed strictly one at a time; all cache mutations of a request are done before
/// the next one starts
#[derive(Debug, Copy, Clone)]
pub struct StrategyExecutor {
    strategy: MetaStrategy,
}

impl StrategyExecutor {
    pub fn new(strategy: MetaStrategy) -> Self {
        Self { strategy }
    }

    pub fn strategy(&self) -> MetaStrategy {
        self.strategy
    }

    /// Processes one request against the caches, one per source, returning what happened
    ///
    /// A content id outside the catalog is an invariant violation: the workload generator should
    /// never produce one
    pub fn process(&self, request: Request, topology: &Topology, catalog: &Catalog, caches: &mut [GenericCache]) -> SimResult<RequestOutcome> {
        let content = request.content;
        let source = catalog.owner(content).ok_or_else(|| {
            SimError::invariant(RunContext::default(), format!("content {content} is outside the catalog of {} items", catalog.len()))
        })?;
        let path = topology.path(source);

        // Route down. `probed` collects (hop, cache) for every cache that missed
        let mut probed: Vec<(usize, usize)> = Vec::with_capacity(path.hops());
        let mut served = None;
        for (hop, node) in path.nodes.iter().enumerate().skip(1) {
            let Some(cache) = topology.source_of(*node) else {
                continue;
            };
            if caches[cache].lookup(content) {
                served = Some((hop, ServedBy::Cache(cache)));
                break;
            }
            probed.push((hop, cache));
        }
        let shortest_hops = probed.first().map(|(hop, _)| *hop).or(served.map(|(hop, _)| hop)).unwrap_or(path.hops());
        let (hops, served_by) = served.unwrap_or((path.hops(), ServedBy::Source(source)));

        // Return and insert, nearest the serving node first
        match self.strategy {
            MetaStrategy::LeaveCopyEverywhere => {
                for (_, cache) in probed.iter().rev() {
                    let outcome = caches[*cache].insert(content);
                    trace!("LCE copy of {content} into source_{cache}: {outcome:?}");
                }
            }
            MetaStrategy::LeaveCopyDown => {
                if let Some((_, cache)) = probed.last() {
                    let outcome = caches[*cache].insert(content);
                    trace!("LCD copy of {content} into source_{cache}: {outcome:?}");
                }
            }
        }

        Ok(RequestOutcome {
            request,
            served_by,
            hops,
            shortest_hops,
            latency: path.cumulative_delay[hops],
            edges: path.edges[..hops].to_vec(),
        })
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::config::{ContentPlacement, EvictionPolicy, TopologyConfig, TopologyKind};

    fn line(n: usize) -> Topology {
        Topology::new(&TopologyConfig { kind: TopologyKind::Line, n, delay: 1.0, access_delay: 1.0 }).unwrap()
    }

    fn caches(capacities: &[usize]) -> Vec<GenericCache> {
        capacities.iter().map(|c| GenericCache::with_policy(EvictionPolicy::LeastRecentlyUsed, *c)).collect()
    }

    fn request(content: u32) -> Request {
        Request { time: 0.0, content }
    }

    #[test]
    fn lce_copies_into_every_cache_on_the_path() {
        let topology = line(3);
        // Content 2 lives on source 2, at the end of the line
        let catalog = Catalog::assign(3, 3, &ContentPlacement::Uniform).unwrap();
        let mut caches = caches(&[1, 1, 1]);
        let executor = StrategyExecutor::new(MetaStrategy::LeaveCopyEverywhere);

        let miss = executor.process(request(2), &topology, &catalog, &mut caches).unwrap();
        assert_eq!(miss.served_by, ServedBy::Source(2));
        assert_eq!(miss.hops, 4);
        assert_eq!(miss.shortest_hops, 2);
        assert_eq!(miss.latency, 4.0);
        assert_eq!(miss.edges, vec![0, 1, 2, 3]);
        assert!(caches.iter().all(|c| c.contains(2)));

        let hit = executor.process(request(2), &topology, &catalog, &mut caches).unwrap();
        assert_eq!(hit.served_by, ServedBy::Cache(0));
        assert_eq!(hit.hops, 2);
        assert_eq!(hit.path_stretch(), 1.0);
        assert_eq!(hit.edges, vec![0, 1]);
    }

    #[test]
    fn lcd_copies_one_level_down() {
        let topology = line(3);
        let catalog = Catalog::assign(3, 3, &ContentPlacement::Uniform).unwrap();
        let mut caches = caches(&[1, 1, 1]);
        let executor = StrategyExecutor::new(MetaStrategy::LeaveCopyDown);

        executor.process(request(2), &topology, &catalog, &mut caches).unwrap();
        assert_eq!(caches.iter().map(|c| c.contains(2)).collect::<Vec<_>>(), vec![false, false, true]);
        let second = executor.process(request(2), &topology, &catalog, &mut caches).unwrap();
        assert_eq!(second.served_by, ServedBy::Cache(2));
        assert_eq!(second.path_stretch(), 2.0);
        assert_eq!(caches.iter().map(|c| c.contains(2)).collect::<Vec<_>>(), vec![false, true, true]);
    }

    #[test]
    fn zero_capacity_source_always_misses() {
        let topology = Topology::new(&TopologyConfig { kind: TopologyKind::Scale, n: 2, delay: 1.0, access_delay: 1.0 }).unwrap();
        let catalog = Catalog::assign(4, 2, &ContentPlacement::Uniform).unwrap();
        let mut caches = caches(&[0, 2]);
        let executor = StrategyExecutor::new(MetaStrategy::LeaveCopyEverywhere);
        for _ in 0..3 {
            let outcome = executor.process(request(0), &topology, &catalog, &mut caches).unwrap();
            assert_eq!(outcome.served_by, ServedBy::Source(0));
        }
        assert!(caches[0].is_empty());
    }

    #[test]
    fn out_of_catalog_request_is_an_invariant_violation() {
        let topology = line(1);
        let catalog = Catalog::assign(3, 1, &ContentPlacement::Uniform).unwrap();
        let mut caches = caches(&[1]);
        let executor = StrategyExecutor::new(MetaStrategy::LeaveCopyEverywhere);
        let result = executor.process(request(3), &topology, &catalog, &mut caches);
        assert!(matches!(result, Err(SimError::InvariantViolation { .. })));
    }
}
