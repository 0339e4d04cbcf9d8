use std::collections::{BTreeMap, HashSet};
use std::future::Future;
use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{info, warn};

use crate::error::{BenchError, ProbeError};
use crate::probe::probe_resolver;
use crate::stats::{ResolverOutcome, ResolverStats};
use crate::transport::{BenchmarkConfig, ResolverAddress};

/// Receives one notification per finished resolver.
pub trait ProgressSink {
	fn resolver_done(&mut self, completed: usize, total: usize, resolver: &ResolverAddress);
}

impl<F> ProgressSink for F
where
	F: FnMut(usize, usize, &ResolverAddress),
{
	fn resolver_done(&mut self, completed: usize, total: usize, resolver: &ResolverAddress) {
		self(completed, total, resolver)
	}
}

/// Run `probe` once per resolver on at most `worker_count` concurrent
/// workers and collect the results.
///
/// Each worker reports back over a channel; only this function writes the
/// result map, once per resolver. A worker that errors or panics is
/// recorded as [`ResolverOutcome::Failed`] and the rest keep going. When
/// `shutdown` resolves, nothing new is dispatched, in-flight workers are
/// abandoned and [`BenchError::Interrupted`] is returned.
pub async fn run_all<F, Fut, P, S>(
	resolvers: &[ResolverAddress],
	worker_count: usize,
	probe: F,
	progress: &mut P,
	shutdown: S,
) -> Result<BTreeMap<ResolverAddress, ResolverOutcome>, BenchError>
where
	F: Fn(ResolverAddress) -> Fut,
	Fut: Future<Output = Result<ResolverStats, ProbeError>> + Send + 'static,
	P: ProgressSink + ?Sized,
	S: Future<Output = ()>,
{
	// One worker per resolver, so duplicates would race for the same key
	let mut seen = HashSet::new();
	let mut queue = resolvers.iter()
		.copied()
		.filter(|r| seen.insert(*r))
		.collect::<Vec<_>>()
		.into_iter();
	let total = queue.len();

	// Never more senders than workers in flight
	let pool = worker_count.min(total).max(1);
	let (tx, mut rx) = mpsc::channel(pool);
	let dispatch = |resolver: ResolverAddress| {
		let worker = tokio::spawn(probe(resolver));
		let tx = tx.clone();
		tokio::spawn(async move {
			let outcome = match worker.await {
				Ok(Ok(stats)) => ResolverOutcome::Completed(stats),
				Ok(Err(e)) => ResolverOutcome::Failed(e.to_string()),
				Err(e) => ResolverOutcome::Failed(format!("worker aborted: {}", e)),
			};
			// The receiver is gone only after an interrupt
			let _ = tx.send((resolver, outcome)).await;
		});
	};

	let mut in_flight = 0usize;
	for resolver in queue.by_ref().take(pool) {
		dispatch(resolver);
		in_flight += 1;
	}

	let mut results = BTreeMap::new();
	let mut completed = 0usize;
	tokio::pin!(shutdown);

	while in_flight > 0 {
		tokio::select! {
			biased;
			_ = &mut shutdown => {
				warn!(completed, total, "interrupted, abandoning running probes");
				return Err(BenchError::Interrupted { completed, total });
			}
			Some((resolver, outcome)) = rx.recv() => {
				in_flight -= 1;
				if let ResolverOutcome::Failed(reason) = &outcome {
					warn!(%resolver, %reason, "resolver probe failed");
				}
				// Resolvers are unique, so each key is written exactly once
				results.insert(resolver, outcome);
				completed += 1;
				info!(%resolver, completed, total, "finished testing resolver");
				progress.resolver_done(completed, total, &resolver);

				if let Some(next) = queue.next() {
					dispatch(next);
					in_flight += 1;
				}
			}
		}
	}

	Ok(results)
}

/// Benchmark every resolver against `domains` with real DNS queries.
pub async fn run_benchmark<P, S>(
	resolvers: &[ResolverAddress],
	domains: &[String],
	config: &BenchmarkConfig,
	progress: &mut P,
	shutdown: S,
) -> Result<BTreeMap<ResolverAddress, ResolverOutcome>, BenchError>
where
	P: ProgressSink + ?Sized,
	S: Future<Output = ()>,
{
	config.validate()?;
	if resolvers.is_empty() {
		return Err(BenchError::NoResolvers);
	}

	let domains: Arc<[String]> = domains.into();
	let shared = Arc::new(config.clone());
	run_all(
		resolvers,
		config.worker_count,
		|resolver| probe_resolver(resolver, domains.clone(), shared.clone()),
		progress,
		shutdown,
	).await
}

#[cfg(test)]
mod tests {
	use super::*;
	use std::future::pending;
	use std::net::Ipv4Addr;
	use std::sync::atomic::{AtomicUsize, Ordering};
	use std::time::Duration;

	use crate::probe::ProbeRun;
	use crate::stats::summarize;

	fn resolvers(n: u8) -> Vec<ResolverAddress> {
		(1..=n).map(|i| ResolverAddress::new(Ipv4Addr::new(10, 0, 0, i))).collect()
	}

	fn stats_for(resolver: ResolverAddress) -> ResolverStats {
		let mut run = ProbeRun::new(resolver);
		run.times_ms.push(f64::from(resolver.ip().octets()[3]));
		summarize(&run)
	}

	#[tokio::test]
	async fn test_all_resolvers_complete_with_small_pool() {
		let active = Arc::new(AtomicUsize::new(0));
		let peak = Arc::new(AtomicUsize::new(0));
		let list = resolvers(12);
		let mut events = Vec::new();

		let results = run_all(
			&list,
			3,
			|resolver| {
				let active = active.clone();
				let peak = peak.clone();
				async move {
					let now = active.fetch_add(1, Ordering::SeqCst) + 1;
					peak.fetch_max(now, Ordering::SeqCst);
					// Reverse the finishing order relative to submission
					let delay = 40 - u64::from(resolver.ip().octets()[3]) * 3;
					tokio::time::sleep(Duration::from_millis(delay)).await;
					active.fetch_sub(1, Ordering::SeqCst);
					Ok(stats_for(resolver))
				}
			},
			&mut |done: usize, total: usize, _: &ResolverAddress| events.push((done, total)),
			pending(),
		).await.unwrap();

		assert_eq!(results.len(), 12);
		for r in &list {
			assert!(matches!(results.get(r), Some(ResolverOutcome::Completed(_))));
		}
		assert!(peak.load(Ordering::SeqCst) <= 3);
		let expected: Vec<(usize, usize)> = (1..=12).map(|i| (i, 12)).collect();
		assert_eq!(events, expected);
	}

	#[tokio::test]
	async fn test_failures_do_not_stop_other_workers() {
		let list = resolvers(4);
		let mut count = 0;
		let results = run_all(
			&list,
			2,
			|resolver| async move {
				match resolver.ip().octets()[3] {
					2 => Err(ProbeError::Socket {
						resolver,
						source: std::io::Error::new(std::io::ErrorKind::Other, "out of sockets"),
					}),
					3 => panic!("probe blew up"),
					_ => Ok(stats_for(resolver)),
				}
			},
			&mut |_: usize, _: usize, _: &ResolverAddress| count += 1,
			pending(),
		).await.unwrap();

		assert_eq!(count, 4);
		assert!(matches!(results[&list[0]], ResolverOutcome::Completed(_)));
		assert!(matches!(&results[&list[1]], ResolverOutcome::Failed(reason) if reason.contains("out of sockets")));
		assert!(matches!(results[&list[2]], ResolverOutcome::Failed(_)));
		assert!(matches!(results[&list[3]], ResolverOutcome::Completed(_)));
	}

	#[tokio::test]
	async fn test_huge_worker_count_is_capped() {
		let config = BenchmarkConfig { worker_count: usize::MAX, ..Default::default() };
		assert!(config.validate().is_ok());
		let list = resolvers(3);

		let results = run_all(
			&list,
			config.worker_count,
			|resolver| async move { Ok(stats_for(resolver)) },
			&mut |_: usize, _: usize, _: &ResolverAddress| {},
			pending(),
		).await.unwrap();

		assert_eq!(results.len(), 3);
	}

	#[tokio::test]
	async fn test_duplicates_probed_once() {
		let calls = Arc::new(AtomicUsize::new(0));
		let mut list = resolvers(2);
		list.push(list[0]);
		let mut last_total = 0;

		let results = run_all(
			&list,
			4,
			|resolver| {
				calls.fetch_add(1, Ordering::SeqCst);
				async move { Ok(stats_for(resolver)) }
			},
			&mut |_: usize, total: usize, _: &ResolverAddress| last_total = total,
			pending(),
		).await.unwrap();

		assert_eq!(results.len(), 2);
		assert_eq!(calls.load(Ordering::SeqCst), 2);
		assert_eq!(last_total, 2);
	}

	#[tokio::test]
	async fn test_interrupt_stops_dispatch() {
		let started = Arc::new(AtomicUsize::new(0));
		let list = resolvers(6);

		let result = run_all(
			&list,
			2,
			|resolver| {
				started.fetch_add(1, Ordering::SeqCst);
				async move {
					tokio::time::sleep(Duration::from_secs(30)).await;
					Ok(stats_for(resolver))
				}
			},
			&mut |_: usize, _: usize, _: &ResolverAddress| {},
			tokio::time::sleep(Duration::from_millis(20)),
		).await;

		assert!(matches!(result, Err(BenchError::Interrupted { completed: 0, total: 6 })));
		assert_eq!(started.load(Ordering::SeqCst), 2);
	}

	#[tokio::test]
	async fn test_benchmark_rejects_empty_resolver_list() {
		let result = run_benchmark(
			&[],
			&["example.com".to_string()],
			&BenchmarkConfig::default(),
			&mut |_: usize, _: usize, _: &ResolverAddress| {},
			pending(),
		).await;
		assert!(matches!(result, Err(BenchError::NoResolvers)));
	}

	#[tokio::test]
	async fn test_benchmark_rejects_bad_threshold() {
		let config = BenchmarkConfig { reliability_threshold: -0.1, ..Default::default() };
		let result = run_benchmark(
			&resolvers(1),
			&["example.com".to_string()],
			&config,
			&mut |_: usize, _: usize, _: &ResolverAddress| {},
			pending(),
		).await;
		assert!(matches!(result, Err(BenchError::InvalidThreshold(_))));
	}

	#[tokio::test]
	async fn test_benchmark_without_domains_sends_nothing() {
		// No domains means no queries are sent at all
		let config = BenchmarkConfig { warmup_queries: 5, ..Default::default() };
		let local: Vec<ResolverAddress> = (1..=3)
			.map(|i| ResolverAddress::new(Ipv4Addr::new(127, 0, 0, i)))
			.collect();
		let results = run_benchmark(
			&local,
			&[],
			&config,
			&mut |_: usize, _: usize, _: &ResolverAddress| {},
			pending(),
		).await.unwrap();

		assert_eq!(results.len(), 3);
		for outcome in results.values() {
			match outcome {
				ResolverOutcome::Completed(stats) => {
					assert_eq!(stats.attempts, 0);
					assert_eq!(stats.success_rate, 0.0);
				}
				ResolverOutcome::Failed(reason) => panic!("unexpected failure: {}", reason),
			}
		}
	}
}
