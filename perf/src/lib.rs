pub mod harness;

use std::hint::black_box;
use std::time::Instant;
use tachyon_ring::BoundedQueue;

pub use harness::{
    HarnessError, RunResult, mode_name, run_blocking_pair, run_once, run_single_thread,
    run_spsc, run_variant, variant_name,
};
pub use tachyon_config::{QueueVariant, RunMode};

// ─── Statistics ─────────────────────────────────────────────────────────────

/// Order statistics over ns/op samples. Percentiles are nearest-rank.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct Stats {
    pub min: u64,
    pub p50: u64,
    pub p90: u64,
    pub p99: u64,
    pub max: u64,
    pub mean: f64,
    pub count: usize,
}

impl Stats {
    /// Sorts `samples` in place. `None` when there are no samples.
    pub fn from_samples(samples: &mut [u64]) -> Option<Self> {
        samples.sort_unstable();
        let (&min, &max) = (samples.first()?, samples.last()?);
        let count = samples.len();
        let rank = |pct: u64| {
            let r = (count as u64 * pct).div_ceil(100) as usize;
            samples[r.clamp(1, count) - 1]
        };
        let total: u128 = samples.iter().map(|&x| x as u128).sum();
        Some(Self {
            min,
            p50: rank(50),
            p90: rank(90),
            p99: rank(99),
            max,
            mean: total as f64 / count as f64,
            count,
        })
    }
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct BenchResult {
    pub name: String,
    pub unit: String,
    pub stats: Stats,
}

// ─── Measurement ────────────────────────────────────────────────────────────

/// Per-op latency of a `try_push` + `try_pop` pair on `queue`.
///
/// Each of the `batches` samples times `batch_size` pairs and records the
/// rounded ns per pair, so the clock read is amortized over calls that take
/// only a few nanoseconds. One untimed batch runs first.
pub fn measure_pair_latency<Q: BoundedQueue<u64>>(
    name: &str,
    queue: &mut Q,
    batches: usize,
    batch_size: usize,
) -> Option<BenchResult> {
    let batch_size = batch_size.max(1);
    let mut pair = |i: u64| {
        let _ = queue.try_push(black_box(i));
        black_box(queue.try_pop());
    };
    (0..batch_size as u64).for_each(&mut pair);

    let mut samples: Vec<u64> = (0..batches)
        .map(|_| {
            let start = Instant::now();
            (0..batch_size as u64).for_each(&mut pair);
            let nanos = start.elapsed().as_nanos();
            (nanos.div_ceil(batch_size as u128) as u64).max(1)
        })
        .collect();

    Some(BenchResult {
        name: name.to_string(),
        unit: "ns/op".to_string(),
        stats: Stats::from_samples(&mut samples)?,
    })
}

/// Folds the ns/op of several timed runs into one result.
pub fn summarize_runs(name: &str, runs: &[RunResult]) -> Option<BenchResult> {
    let mut samples: Vec<u64> = runs
        .iter()
        .map(|r| (r.ns_per_op.round() as u64).max(1))
        .collect();
    Some(BenchResult {
        name: name.to_string(),
        unit: "ns/op".to_string(),
        stats: Stats::from_samples(&mut samples)?,
    })
}

// ─── Display ────────────────────────────────────────────────────────────────

pub fn format_count(n: u64) -> String {
    if n >= 1_000_000 {
        format!("{:.2}M", n as f64 / 1_000_000.0)
    } else if n >= 1_000 {
        format!("{:.1}K", n as f64 / 1_000.0)
    } else {
        format!("{}", n)
    }
}

pub fn print_run(name: &str, r: &RunResult) {
    println!("  {name}");
    println!("    Total time: {:.6}s", r.seconds);
    println!("    Ops/sec:    {}", format_count(r.ops_per_sec as u64));
    println!("    ns/op:      {:.2}", r.ns_per_op);
}

pub fn print_result_row(r: &BenchResult) {
    println!(
        "  {:<40} {:>8} {:>8} {:>8} {:>8} {:>8}  {}",
        r.name, r.stats.min, r.stats.p50, r.stats.p90, r.stats.p99, r.stats.max, r.unit,
    );
}

pub fn print_table_header() {
    println!(
        "  {:<40} {:>8} {:>8} {:>8} {:>8} {:>8}  unit",
        "Benchmark", "min", "p50", "p90", "p99", "max",
    );
    println!("  {}", "─".repeat(90));
}

pub fn section_header(title: &str) {
    println!("\n{}", "─".repeat(90));
    println!("  {title}");
    println!("{}\n", "─".repeat(90));
}

#[cfg(test)]
mod tests {
    use super::*;
    use tachyon_ring::{FixedRing, SpscQueue};

    #[test]
    fn stats_of_known_samples() {
        let s = Stats::from_samples(&mut [5, 1, 4, 2, 3]).unwrap();
        assert_eq!((s.min, s.p50, s.max), (1, 3, 5));
        assert_eq!(s.count, 5);
        assert!((s.mean - 3.0).abs() < f64::EPSILON);
    }

    #[test]
    fn nearest_rank_percentiles() {
        let mut samples: Vec<u64> = (1..=100).rev().collect();
        let s = Stats::from_samples(&mut samples).unwrap();
        assert_eq!((s.p50, s.p90, s.p99), (50, 90, 99));
    }

    #[test]
    fn single_sample_is_every_percentile() {
        let s = Stats::from_samples(&mut [42]).unwrap();
        assert_eq!((s.min, s.p50, s.p99, s.max), (42, 42, 42, 42));
    }

    #[test]
    fn no_samples_no_stats() {
        assert!(Stats::from_samples(&mut []).is_none());
    }

    #[test]
    fn summarize_empty_is_none() {
        assert!(summarize_runs("x", &[]).is_none());
    }

    #[test]
    fn summarize_rounds_ns_per_op() {
        let runs = [
            RunResult {
                seconds: 1.0,
                ops_per_sec: 1e8,
                ns_per_op: 9.6,
            },
            RunResult {
                seconds: 1.0,
                ops_per_sec: 1e8,
                ns_per_op: 0.2,
            },
        ];
        let r = summarize_runs("spsc", &runs).unwrap();
        assert_eq!(r.stats.min, 1);
        assert_eq!(r.stats.max, 10);
    }

    #[test]
    fn pair_latency_leaves_queue_empty() {
        let mut q = FixedRing::<u64>::with_capacity(4).unwrap();
        let r = measure_pair_latency("fixed", &mut q, 20, 100).unwrap();
        assert_eq!(r.stats.count, 20);
        assert!(r.stats.min >= 1);
        assert!(q.is_empty());

        let mut q = SpscQueue::<u64>::with_capacity(4).unwrap();
        assert!(measure_pair_latency("spsc", &mut q, 0, 100).is_none());
        assert!(q.is_empty());
    }

    #[test]
    fn counts_are_abbreviated() {
        assert_eq!(format_count(999), "999");
        assert_eq!(format_count(1_500), "1.5K");
        assert_eq!(format_count(2_000_000), "2.00M");
    }
}
