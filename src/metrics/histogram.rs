//! Lock-free latency histogram for allocation calls.
//!
//! Buckets span a single uncontended RocksDB transaction up to a full lock
//! timeout, and render in Prometheus' cumulative-bucket format.

use std::fmt::Write;
use std::sync::atomic::{AtomicU64, Ordering};

/// Upper bucket bounds in microseconds.
pub const LATENCY_BUCKETS_US: [u64; 12] = [
    50,        // 50μs
    100,       // 100μs
    250,       // 250μs
    500,       // 500μs
    1_000,     // 1ms
    2_500,     // 2.5ms
    5_000,     // 5ms
    10_000,    // 10ms
    50_000,    // 50ms
    100_000,   // 100ms
    500_000,   // 500ms
    1_000_000, // 1s
];

/// Thread-safe histogram of operation latencies.
///
/// ```
/// use refnum::metrics::Histogram;
///
/// let histogram = Histogram::new();
/// histogram.observe(150);
///
/// let (sum, count, _) = histogram.snapshot();
/// assert_eq!((sum, count), (150, 1));
/// ```
pub struct Histogram {
    sum: AtomicU64,
    count: AtomicU64,
    /// Cumulative: bucket `i` counts every observation `<= LATENCY_BUCKETS_US[i]`.
    buckets: [AtomicU64; LATENCY_BUCKETS_US.len()],
}

impl Default for Histogram {
    fn default() -> Self {
        Self::new()
    }
}

impl Histogram {
    pub fn new() -> Self {
        Self {
            sum: AtomicU64::new(0),
            count: AtomicU64::new(0),
            buckets: std::array::from_fn(|_| AtomicU64::new(0)),
        }
    }

    /// Records one observation in microseconds.
    #[inline]
    pub fn observe(&self, value_us: u64) {
        self.sum.fetch_add(value_us, Ordering::Relaxed);
        self.count.fetch_add(1, Ordering::Relaxed);

        for (bucket, &bound) in self.buckets.iter().zip(LATENCY_BUCKETS_US.iter()) {
            if value_us <= bound {
                bucket.fetch_add(1, Ordering::Relaxed);
            }
        }
    }

    /// Records the time elapsed since `start`.
    #[inline]
    pub fn observe_since(&self, start: std::time::Instant) {
        self.observe(start.elapsed().as_micros().min(u64::MAX as u128) as u64);
    }

    /// Returns `(sum, count, cumulative_buckets)`.
    pub fn snapshot(&self) -> (u64, u64, [u64; LATENCY_BUCKETS_US.len()]) {
        let buckets = std::array::from_fn(|i| self.buckets[i].load(Ordering::Relaxed));
        (
            self.sum.load(Ordering::Relaxed),
            self.count.load(Ordering::Relaxed),
            buckets,
        )
    }

    #[inline]
    pub fn count(&self) -> u64 {
        self.count.load(Ordering::Relaxed)
    }

    /// Renders the histogram in Prometheus exposition format.
    pub fn format_prometheus(&self, name: &str, help: &str) -> String {
        let (sum, count, buckets) = self.snapshot();
        let mut output = String::with_capacity(1024);

        let _ = writeln!(output, "# HELP {name} {help}");
        let _ = writeln!(output, "# TYPE {name} histogram");
        for (bound, value) in LATENCY_BUCKETS_US.iter().zip(buckets.iter()) {
            let _ = writeln!(output, "{name}_bucket{{le=\"{bound}\"}} {value}");
        }
        let _ = writeln!(output, "{name}_bucket{{le=\"+Inf\"}} {count}");
        let _ = writeln!(output, "{name}_sum {sum}");
        let _ = writeln!(output, "{name}_count {count}");

        output
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn buckets_are_cumulative() {
        let h = Histogram::new();
        h.observe(40);
        h.observe(90);
        h.observe(2_000_000);

        let (sum, count, buckets) = h.snapshot();
        assert_eq!(sum, 2_000_130);
        assert_eq!(count, 3);
        assert_eq!(buckets[0], 1); // <= 50
        assert_eq!(buckets[1], 2); // <= 100
        assert_eq!(buckets[11], 2); // <= 1s, the slow one only lands in +Inf
    }

    #[test]
    fn prometheus_output_has_inf_bucket() {
        let h = Histogram::new();
        h.observe(300);

        let output = h.format_prometheus("refnum_consume_latency_us", "Consume latency");
        assert!(output.contains("# TYPE refnum_consume_latency_us histogram"));
        assert!(output.contains("refnum_consume_latency_us_bucket{le=\"250\"} 0"));
        assert!(output.contains("refnum_consume_latency_us_bucket{le=\"500\"} 1"));
        assert!(output.contains("refnum_consume_latency_us_bucket{le=\"+Inf\"} 1"));
        assert!(output.contains("refnum_consume_latency_us_count 1"));
    }

    #[test]
    fn concurrent_observations_are_counted() {
        use std::sync::Arc;
        use std::thread;

        let h = Arc::new(Histogram::new());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let h = Arc::clone(&h);
                thread::spawn(move || {
                    for i in 0..500 {
                        h.observe(i);
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(h.count(), 4_000);
    }
}
