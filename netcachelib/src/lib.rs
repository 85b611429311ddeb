//! # NetcacheLib
//!
//! Netcachelib is a library for simulating content caching across a network of sources
//!
//! Given an experiment descriptor it builds a topology of one receiver, one root and a set of
//! content sources, places the content catalog on the sources, splits a network-wide cache budget
//! across them (uniformly or in proportion to content popularity, the CCF allocation), then routes
//! a synthetic request workload through the caches and reports hit ratio, latency, path stretch
//! and link load
//!
//! Every replication is single threaded and deterministic given its seed

/// Contains the allocation of the network-wide cache budget across the sources
pub mod allocation;

/// Contains the implementation of the cache node, and a utility enum for the existing cache types
pub mod cache;

/// Contains definitions for the JSON experiment descriptor and its validated, typed form
pub mod config;

/// Contains the assignment of content items to their authoritative sources
pub mod content;

/// Contains the discrete distributions shared by content placement and the workload
pub mod distributions;

/// Contains the error type used across the library
pub mod error;

/// Contains trace file reading
pub mod io;

/// Contains the metrics collector and the finalised metric summaries
pub mod metrics;

/// Contains the provided replacement policies, with a trait for implementing custom replacement
/// policies
pub mod replacement_policies;

/// Contains the experiment runner: replications, and the queue of experiments
pub mod simulator;

/// Contains the caching meta-strategies applied to each request
pub mod strategy;

/// Contains the receiver, root and source graph, with the path to every source
pub mod topology;

/// Contains the request workload generator
pub mod workload;

#[cfg(test)]
mod test;

/// Contains utilities for running tests and benchmarks.
pub mod util;
