//! Shared reporting for the `benches/` targets.
//!
//! Each bench prints one `<TAG> mode=... bench=...` line with percentile
//! summaries next to criterion's own output, so runs in private and
//! process-shared mode can be compared from logs alone.

use std::sync::Once;
use std::time::Duration;

use rtpi_core::PiFlags;

/// `RTPI_BENCH_PSHARED=1` benches process-shared objects.
pub const PSHARED_ENV: &str = "RTPI_BENCH_PSHARED";

#[derive(Default)]
pub struct BenchStats {
    samples_ns_per_op: Vec<f64>,
    total_iters: u64,
    total_ns: u128,
}

impl BenchStats {
    pub fn record(&mut self, iters: u64, dur: Duration) {
        let ns = dur.as_nanos();
        self.total_iters = self.total_iters.saturating_add(iters);
        self.total_ns = self.total_ns.saturating_add(ns);
        self.samples_ns_per_op.push(ns as f64 / iters.max(1) as f64);
    }

    pub fn report(&self, tag: &str, bench_label: &str) {
        let mut samples = self.samples_ns_per_op.clone();
        if samples.is_empty() {
            return;
        }
        samples.sort_by(f64::total_cmp);

        let p50 = percentile_sorted(&samples, 0.50);
        let p95 = percentile_sorted(&samples, 0.95);
        let p99 = percentile_sorted(&samples, 0.99);
        let mean = samples.iter().sum::<f64>() / samples.len() as f64;
        let throughput_ops_s = if self.total_ns == 0 {
            0.0
        } else {
            (self.total_iters as f64) / (self.total_ns as f64 / 1e9)
        };

        println!(
            "{tag} mode={} bench={bench_label} samples={} p50_ns_op={p50:.3} p95_ns_op={p95:.3} p99_ns_op={p99:.3} mean_ns_op={mean:.3} throughput_ops_s={throughput_ops_s:.3}",
            mode_label(),
            samples.len(),
        );
    }
}

pub fn percentile_sorted(sorted: &[f64], p: f64) -> f64 {
    debug_assert!((0.0..=1.0).contains(&p));
    if sorted.is_empty() {
        return 0.0;
    }
    let idx = ((sorted.len() - 1) as f64 * p).round() as usize;
    sorted[idx.min(sorted.len() - 1)]
}

/// Object flags selected by the environment.
pub fn bench_flags() -> PiFlags {
    match std::env::var(PSHARED_ENV).ok().as_deref() {
        Some("1") => PiFlags::PSHARED,
        _ => PiFlags::empty(),
    }
}

pub fn mode_label() -> &'static str {
    if bench_flags().is_pshared() {
        "pshared"
    } else {
        "private"
    }
}

pub fn print_env_metadata_once(tag: &str) {
    static ONCE: Once = Once::new();
    ONCE.call_once(|| {
        let raw = std::env::var(PSHARED_ENV).unwrap_or_else(|_| "<unset>".to_string());
        println!(
            "{tag}_META rtpi_bench_pshared_env={raw} pi_futex_supported={}",
            rtpi_core::pi_futex_supported()
        );
    });
}
