//! Allocation metrics.
//!
//! Lock-free counters and latency histograms shared by pools, sequence
//! counters and generators, rendered in Prometheus exposition format.

pub mod histogram;
pub mod registry;

pub use histogram::Histogram;
pub use registry::{GeneratorMetrics, MetricsRegistry, PoolMetrics, SequenceMetrics};
