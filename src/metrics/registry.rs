//! Counters for pool consumption, seed issuance and code generation.

use std::fmt::Write;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use dashmap::DashMap;

use super::Histogram;
use crate::contracts::ReferenceKind;

/// Shared registry handed to pools, counters and generators.
#[derive(Default)]
pub struct MetricsRegistry {
    pub pool: Arc<PoolMetrics>,
    pub sequence: Arc<SequenceMetrics>,
    pub generator: Arc<GeneratorMetrics>,
}

impl MetricsRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Formats every metric in Prometheus exposition format.
    pub fn format_prometheus(&self) -> String {
        let mut output = String::with_capacity(4096);
        output.push_str(&self.pool.format_prometheus());
        output.push_str(&self.sequence.format_prometheus());
        output.push_str(&self.generator.format_prometheus());
        output
    }
}

fn write_counter(output: &mut String, name: &str, help: &str, value: u64) {
    let _ = writeln!(output, "# HELP {name} {help}");
    let _ = writeln!(output, "# TYPE {name} counter");
    let _ = writeln!(output, "{name} {value}");
    output.push('\n');
}

#[derive(Default)]
pub struct PoolMetrics {
    pub loaded_total: AtomicU64,
    pub deleted_total: AtomicU64,
    pub purged_total: AtomicU64,
    pub unavailable_total: AtomicU64,
    /// Candidates found already assigned once their row lock was acquired.
    pub candidate_conflicts_total: AtomicU64,
    /// Successful consumptions per kind.
    pub consumed: DashMap<ReferenceKind, u64>,
    pub consume_latency_us: Histogram,
}

impl PoolMetrics {
    #[inline]
    pub fn record_loaded(&self, count: usize) {
        self.loaded_total.fetch_add(count as u64, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_consumed(&self, kind: ReferenceKind) {
        *self.consumed.entry(kind).or_insert(0) += 1;
    }

    #[inline]
    pub fn record_deleted(&self, count: usize) {
        self.deleted_total.fetch_add(count as u64, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_purged(&self, count: usize) {
        self.purged_total.fetch_add(count as u64, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_unavailable(&self) {
        self.unavailable_total.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_candidate_conflict(&self) {
        self.candidate_conflicts_total
            .fetch_add(1, Ordering::Relaxed);
    }

    pub fn consumed(&self, kind: ReferenceKind) -> u64 {
        self.consumed.get(&kind).map(|v| *v).unwrap_or(0)
    }

    pub fn format_prometheus(&self) -> String {
        let mut output = String::with_capacity(2048);

        write_counter(
            &mut output,
            "refnum_pool_loaded_total",
            "Reference numbers inserted by pool loads",
            self.loaded_total.load(Ordering::Relaxed),
        );

        let _ = writeln!(
            output,
            "# HELP refnum_pool_consumed_total Reference numbers assigned, by kind"
        );
        let _ = writeln!(output, "# TYPE refnum_pool_consumed_total counter");
        for kind in ReferenceKind::ALL {
            let _ = writeln!(
                output,
                "refnum_pool_consumed_total{{kind=\"{kind}\"}} {}",
                self.consumed(kind)
            );
        }
        output.push('\n');

        write_counter(
            &mut output,
            "refnum_pool_deleted_total",
            "Unassigned reference numbers deleted",
            self.deleted_total.load(Ordering::Relaxed),
        );
        write_counter(
            &mut output,
            "refnum_pool_purged_total",
            "Reference numbers removed by purges",
            self.purged_total.load(Ordering::Relaxed),
        );
        write_counter(
            &mut output,
            "refnum_pool_unavailable_total",
            "Consume calls that found the pool empty",
            self.unavailable_total.load(Ordering::Relaxed),
        );
        write_counter(
            &mut output,
            "refnum_pool_candidate_conflicts_total",
            "Consume candidates lost to a concurrent consumer",
            self.candidate_conflicts_total.load(Ordering::Relaxed),
        );

        output.push_str(&self.consume_latency_us.format_prometheus(
            "refnum_pool_consume_latency_us",
            "Histogram of consume latencies in microseconds",
        ));
        output.push('\n');

        output
    }
}

#[derive(Default)]
pub struct SequenceMetrics {
    pub seeds_issued_total: AtomicU64,
    /// Counter creations that lost to a concurrent creator and fell back to increment.
    pub create_races_total: AtomicU64,
}

impl SequenceMetrics {
    #[inline]
    pub fn record_issued(&self) {
        self.seeds_issued_total.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_create_race(&self) {
        self.create_races_total.fetch_add(1, Ordering::Relaxed);
    }

    pub fn format_prometheus(&self) -> String {
        let mut output = String::with_capacity(512);
        write_counter(
            &mut output,
            "refnum_sequence_seeds_issued_total",
            "Seeds handed out by sequence counters",
            self.seeds_issued_total.load(Ordering::Relaxed),
        );
        write_counter(
            &mut output,
            "refnum_sequence_create_races_total",
            "Counter creations retried as increments",
            self.create_races_total.load(Ordering::Relaxed),
        );
        output
    }
}

#[derive(Default)]
pub struct GeneratorMetrics {
    pub generated_total: AtomicU64,
    pub collisions_total: AtomicU64,
    pub failures_total: AtomicU64,
    pub generate_latency_us: Histogram,
}

impl GeneratorMetrics {
    #[inline]
    pub fn record_generated(&self) {
        self.generated_total.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_collision(&self) {
        self.collisions_total.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_failure(&self) {
        self.failures_total.fetch_add(1, Ordering::Relaxed);
    }

    pub fn format_prometheus(&self) -> String {
        let mut output = String::with_capacity(1024);
        write_counter(
            &mut output,
            "refnum_generator_generated_total",
            "Codes minted and reserved",
            self.generated_total.load(Ordering::Relaxed),
        );
        write_counter(
            &mut output,
            "refnum_generator_collisions_total",
            "Candidate codes that collided with an issued number",
            self.collisions_total.load(Ordering::Relaxed),
        );
        write_counter(
            &mut output,
            "refnum_generator_failures_total",
            "Generate calls that exhausted their attempts",
            self.failures_total.load(Ordering::Relaxed),
        );
        output.push_str(&self.generate_latency_us.format_prometheus(
            "refnum_generator_latency_us",
            "Histogram of generate latencies in microseconds",
        ));
        output
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn consumed_counts_are_per_kind() {
        let metrics = PoolMetrics::default();
        metrics.record_consumed(ReferenceKind::Policy);
        metrics.record_consumed(ReferenceKind::Policy);
        metrics.record_consumed(ReferenceKind::Claim);

        assert_eq!(metrics.consumed(ReferenceKind::Policy), 2);
        assert_eq!(metrics.consumed(ReferenceKind::Claim), 1);
        assert_eq!(metrics.consumed(ReferenceKind::Invoice), 0);
    }

    #[test]
    fn registry_renders_all_sections() {
        let registry = MetricsRegistry::new();
        registry.pool.record_loaded(3);
        registry.pool.record_consumed(ReferenceKind::CreditNote);
        registry.sequence.record_issued();
        registry.generator.record_collision();

        let output = registry.format_prometheus();
        assert!(output.contains("refnum_pool_loaded_total 3"));
        assert!(output.contains("refnum_pool_consumed_total{kind=\"credit_note\"} 1"));
        assert!(output.contains("refnum_pool_consumed_total{kind=\"policy\"} 0"));
        assert!(output.contains("refnum_sequence_seeds_issued_total 1"));
        assert!(output.contains("refnum_generator_collisions_total 1"));
        assert!(output.contains("# TYPE refnum_generator_latency_us histogram"));
    }
}
