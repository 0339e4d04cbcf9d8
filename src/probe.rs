use std::sync::Arc;

use tracing::debug;

use crate::dns::{QueryExecutor, UdpExecutor};
use crate::error::ProbeError;
use crate::stats::{summarize, ResolverStats};
use crate::transport::{BenchmarkConfig, DnssecVerdict, OutcomeCounts, QueryOutcome, ResolverAddress};

/// Raw measurements collected while probing one resolver
#[derive(Debug, Clone)]
pub struct ProbeRun {
	pub resolver: ResolverAddress,
	/// Latencies of successful queries, in the order they were issued
	pub times_ms: Vec<f64>,
	pub failures: OutcomeCounts,
	pub dnssec: DnssecVerdict,
}

impl ProbeRun {
	pub fn new(resolver: ResolverAddress) -> Self {
		Self {
			resolver,
			times_ms: Vec::new(),
			failures: OutcomeCounts::default(),
			dnssec: DnssecVerdict::Unknown,
		}
	}

	pub fn record(&mut self, outcome: QueryOutcome) {
		match outcome {
			QueryOutcome::Success { elapsed_ms } => self.times_ms.push(elapsed_ms),
			QueryOutcome::Failure(kind) => self.failures.record(kind),
		}
	}
}

/// Probe a single resolver: optional DNSSEC check, untimed warm-up
/// queries against the first domain, then `queries_per_domain` timed
/// queries for every domain in order.
///
/// Queries are issued one at a time so the resolver only ever sees a
/// single outstanding request from us.
pub async fn run_probe<E: QueryExecutor>(
	executor: &mut E,
	resolver: ResolverAddress,
	domains: &[String],
	config: &BenchmarkConfig,
) -> ProbeRun {
	let mut run = ProbeRun::new(resolver);

	if config.check_dnssec {
		run.dnssec = executor.probe_dnssec().await;
	}

	if let Some(first) = domains.first() {
		for _ in 0..config.warmup_queries {
			// Warm-up outcomes are discarded
			let _ = executor.execute(first).await;
		}
	}

	for domain in domains {
		for _ in 0..config.queries_per_domain {
			let outcome = executor.execute(domain).await;
			run.record(outcome);
		}
	}

	debug!(
		%resolver,
		successes = run.times_ms.len(),
		failures = run.failures.total(),
		"probe finished",
	);
	run
}

/// The unit of work the scheduler runs per resolver: open a resolution
/// context bound to the resolver, probe it, and summarize the run.
pub async fn probe_resolver(
	resolver: ResolverAddress,
	domains: Arc<[String]>,
	config: Arc<BenchmarkConfig>,
) -> Result<ResolverStats, ProbeError> {
	let mut executor = UdpExecutor::connect(resolver, config.timeout, config.lifetime).await?;
	let run = run_probe(&mut executor, resolver, &domains, &config).await;
	Ok(summarize(&run))
}
