use std::cmp::Ordering;
use std::collections::BTreeMap;

use crate::probe::ProbeRun;
use crate::transport::{DnssecVerdict, OutcomeCounts, ResolverAddress};

/// Latency summary over the successful queries of one resolver (ms)
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LatencyStats {
	pub avg_ms: f64,
	pub median_ms: f64,
	pub p90_ms: f64,
	pub p95_ms: f64,
	pub stdev_ms: f64,
}

/// Summary of one resolver's probe run
#[derive(Debug, Clone)]
pub struct ResolverStats {
	pub resolver: ResolverAddress,
	/// Fraction of timed queries that succeeded, 0.0 when none were issued
	pub success_rate: f64,
	pub successes: usize,
	pub attempts: usize,
	/// `None` when no query succeeded; such resolvers sort after all others
	pub latency: Option<LatencyStats>,
	pub failures: OutcomeCounts,
	pub dnssec: DnssecVerdict,
}

impl ResolverStats {
	pub fn avg_ms(&self) -> Option<f64> {
		self.latency.map(|l| l.avg_ms)
	}
}

/// Final state of one resolver after the scheduler is done with it
#[derive(Debug, Clone)]
pub enum ResolverOutcome {
	Completed(ResolverStats),
	/// The probe hit an unexpected error; this is not a 0% success rate
	Failed(String),
}

/// A resolver whose probe could not be completed
#[derive(Debug, Clone)]
pub struct FailedResolver {
	pub resolver: ResolverAddress,
	pub reason: String,
}

/// Ranked results of a benchmark run
#[derive(Debug, Clone)]
pub struct RankedReport {
	pub threshold: f64,
	/// Success rate at or above the threshold, fastest first
	pub reliable: Vec<ResolverStats>,
	/// Success rate below the threshold, fastest first
	pub unreliable: Vec<ResolverStats>,
	pub failed: Vec<FailedResolver>,
}

impl RankedReport {
	/// The fastest reliable resolver, if any resolver was reliable.
	pub fn recommendation(&self) -> Option<&ResolverStats> {
		self.reliable.first()
	}
}

/// Calculate the arithmetic mean of a slice of values.
pub fn mean(values: &[f64]) -> Option<f64> {
	if values.is_empty() {
		return None;
	}
	let sum: f64 = values.iter().sum();
	Some(sum / values.len() as f64)
}

/// Median of a sorted slice; the mean of the two middle values when the
/// length is even.
pub fn median(sorted_values: &[f64]) -> Option<f64> {
	let n = sorted_values.len();
	if n == 0 {
		return None;
	}
	if n % 2 == 1 {
		Some(sorted_values[n / 2])
	} else {
		Some((sorted_values[n / 2 - 1] + sorted_values[n / 2]) / 2.0)
	}
}

/// Sample standard deviation (n - 1 denominator); 0.0 for a single value.
pub fn stddev(values: &[f64]) -> Option<f64> {
	let avg = mean(values)?;
	if values.len() == 1 {
		return Some(0.0);
	}
	let variance = values.iter()
		.map(|v| (v - avg).powi(2))
		.sum::<f64>() / (values.len() - 1) as f64;
	Some(variance.sqrt())
}

/// Pick the p-quantile (0.0..=1.0) from a sorted slice.
///
/// Index is `floor(n * p)` clamped to `n - 1`, so small samples lean
/// towards their largest value.
pub fn percentile(sorted_values: &[f64], p: f64) -> Option<f64> {
	let n = sorted_values.len();
	if n == 0 {
		return None;
	}
	let index = ((n as f64 * p).floor() as usize).min(n - 1);
	Some(sorted_values[index])
}

/// Reduce a finished probe run to its summary statistics.
pub fn summarize(run: &ProbeRun) -> ResolverStats {
	let successes = run.times_ms.len();
	let attempts = successes + run.failures.total();
	let success_rate = if attempts > 0 {
		successes as f64 / attempts as f64
	} else {
		0.0
	};

	let latency = latency_stats(&run.times_ms);

	ResolverStats {
		resolver: run.resolver,
		success_rate,
		successes,
		attempts,
		latency,
		failures: run.failures,
		dnssec: run.dnssec,
	}
}

fn latency_stats(times_ms: &[f64]) -> Option<LatencyStats> {
	let mut sorted = times_ms.to_vec();
	sorted.sort_by(|a, b| a.total_cmp(b));

	Some(LatencyStats {
		avg_ms: mean(&sorted)?,
		median_ms: median(&sorted)?,
		p90_ms: percentile(&sorted, 0.90)?,
		p95_ms: percentile(&sorted, 0.95)?,
		stdev_ms: stddev(&sorted)?,
	})
}

/// Order by average latency, resolvers without any success last.
pub fn compare_by_latency(a: &ResolverStats, b: &ResolverStats) -> Ordering {
	match (a.avg_ms(), b.avg_ms()) {
		(Some(x), Some(y)) => x.total_cmp(&y),
		(Some(_), None) => Ordering::Less,
		(None, Some(_)) => Ordering::Greater,
		(None, None) => Ordering::Equal,
	}
}

/// Split resolvers on the reliability threshold and rank each group by
/// ascending average latency.
///
/// The sort is stable, so equal averages keep the input order.
pub fn rank_resolvers(
	results: BTreeMap<ResolverAddress, ResolverOutcome>,
	threshold: f64,
) -> RankedReport {
	let mut reliable = Vec::new();
	let mut unreliable = Vec::new();
	let mut failed = Vec::new();

	for (resolver, outcome) in results {
		match outcome {
			ResolverOutcome::Completed(stats) if stats.success_rate >= threshold => reliable.push(stats),
			ResolverOutcome::Completed(stats) => unreliable.push(stats),
			ResolverOutcome::Failed(reason) => failed.push(FailedResolver { resolver, reason }),
		}
	}

	reliable.sort_by(compare_by_latency);
	unreliable.sort_by(compare_by_latency);

	RankedReport { threshold, reliable, unreliable, failed }
}
