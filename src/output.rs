use std::fs::File;
use std::io::BufWriter;

use anyhow::{anyhow, Result};
use comfy_table::{presets::UTF8_FULL, Cell, Color, ContentArrangement, Table};
use indicatif::{ProgressBar, ProgressStyle};
use serde::Serialize;

use crate::stats::{RankedReport, ResolverStats};
use crate::transport::{BenchmarkConfig, DnssecVerdict, ResolverAddress};

/// One resolver's results as written to JSON or CSV
#[derive(Debug, Serialize)]
pub struct StatsRecord {
	pub server: ResolverAddress,
	pub reliable: bool,
	pub success_rate: f64,
	pub avg_ms: Option<f64>,
	pub median_ms: Option<f64>,
	pub p90_ms: Option<f64>,
	pub p95_ms: Option<f64>,
	pub stdev_ms: Option<f64>,
	pub timeout: usize,
	pub no_answer: usize,
	pub nx_domain: usize,
	pub no_nameservers: usize,
	pub other: usize,
	pub dnssec: DnssecVerdict,
}

impl StatsRecord {
	fn new(stats: &ResolverStats, reliable: bool) -> Self {
		let latency = stats.latency;
		Self {
			server: stats.resolver,
			reliable,
			success_rate: stats.success_rate,
			avg_ms: latency.map(|l| l.avg_ms),
			median_ms: latency.map(|l| l.median_ms),
			p90_ms: latency.map(|l| l.p90_ms),
			p95_ms: latency.map(|l| l.p95_ms),
			stdev_ms: latency.map(|l| l.stdev_ms),
			timeout: stats.failures.timeout,
			no_answer: stats.failures.no_answer,
			nx_domain: stats.failures.nx_domain,
			no_nameservers: stats.failures.no_nameservers,
			other: stats.failures.other,
			dnssec: stats.dnssec,
		}
	}
}

/// Flatten a report into records, reliable resolvers first.
pub fn records(report: &RankedReport) -> Vec<StatsRecord> {
	let reliable = report.reliable.iter().map(|s| StatsRecord::new(s, true));
	let unreliable = report.unreliable.iter().map(|s| StatsRecord::new(s, false));
	reliable.chain(unreliable).collect()
}

/// Print a summary of the benchmark configuration before running.
pub fn print_config_summary(
	resolvers: &[ResolverAddress],
	domain_count: usize,
	config: &BenchmarkConfig,
) {
	let total_queries = resolvers.len() * domain_count * config.queries_per_domain as usize;
	println!("DNS Speed Test Configuration");
	println!("============================");
	println!("Resolvers:      {}", resolvers.len());
	println!("Domains:        {}", domain_count);
	println!("Queries/domain: {}", config.queries_per_domain);
	println!("Warm-up:        {}", config.warmup_queries);
	println!("Workers:        {}", config.worker_count);
	println!("Timeout:        {:.2} s", config.timeout.as_secs_f64());
	println!("Lifetime:       {:.2} s", config.lifetime.as_secs_f64());
	println!("Threshold:      {:.0}%", config.reliability_threshold * 100.0);
	if config.check_dnssec {
		println!("DNSSEC check:   enabled");
	}
	println!("Timed queries:  {}", total_queries);
	println!();
}

/// Progress bar on stderr counting finished resolvers.
pub fn progress_bar(total: usize) -> ProgressBar {
	let pb = ProgressBar::new(total as u64);
	if let Ok(style) = ProgressStyle::default_bar()
		.template("{spinner:.green} [{elapsed_precise}] [{wide_bar:.cyan/blue}] {pos}/{len} {msg}")
	{
		pb.set_style(style.progress_chars("█▉▊▋▌▍▎▏  "));
	}
	pb
}

fn latency_color(ms: f64) -> Color {
	if ms < 50.0 {
		Color::Green
	} else if ms < 150.0 {
		Color::Yellow
	} else {
		Color::Red
	}
}

fn success_color(rate: f64) -> Color {
	if rate >= 1.0 {
		Color::Green
	} else if rate >= 0.9 {
		Color::Yellow
	} else {
		Color::Red
	}
}

fn colored(text: String, color: Color, use_color: bool) -> Cell {
	let cell = Cell::new(text);
	if use_color { cell.fg(color) } else { cell }
}

fn results_table(stats: &[ResolverStats], show_dnssec: bool, use_color: bool) -> Table {
	let mut table = Table::new();
	table.load_preset(UTF8_FULL);
	table.set_content_arrangement(ContentArrangement::Dynamic);

	let mut header = vec![
		"Rank", "Resolver", "Success",
		"Avg (ms)", "Median (ms)", "p90 (ms)", "p95 (ms)", "Std Dev",
	];
	if show_dnssec {
		header.push("DNSSEC");
	}
	header.extend(["Timeouts", "Other errors"]);
	table.set_header(header);

	for (i, s) in stats.iter().enumerate() {
		let mut row = vec![
			Cell::new(i + 1),
			Cell::new(s.resolver),
			colored(
				format!("{:.0}% ({}/{})", s.success_rate * 100.0, s.successes, s.attempts),
				success_color(s.success_rate),
				use_color,
			),
		];
		match s.latency {
			Some(l) => {
				for ms in [l.avg_ms, l.median_ms, l.p90_ms, l.p95_ms] {
					row.push(colored(format!("{:.2}", ms), latency_color(ms), use_color));
				}
				row.push(Cell::new(format!("{:.2}", l.stdev_ms)));
			}
			None => {
				for _ in 0..4 {
					row.push(colored("Failed".to_string(), Color::Red, use_color));
				}
				row.push(Cell::new("N/A"));
			}
		}
		if show_dnssec {
			let color = match s.dnssec {
				DnssecVerdict::Supported => Color::Green,
				DnssecVerdict::Unsupported => Color::Red,
				DnssecVerdict::Unknown => Color::Reset,
			};
			row.push(colored(s.dnssec.to_string(), color, use_color));
		}
		row.push(Cell::new(s.failures.timeout));
		row.push(Cell::new(s.failures.total() - s.failures.timeout));
		table.add_row(row);
	}
	table
}

/// Print ranked tables and the recommendation.
pub fn print_report(report: &RankedReport, show_dnssec: bool, use_color: bool) {
	println!("\nDNS Speed Test Results");
	println!("======================\n");

	if report.reliable.is_empty() {
		println!("No resolver reached the {:.0}% success threshold.", report.threshold * 100.0);
	} else {
		println!("Reliable resolvers (success >= {:.0}%):", report.threshold * 100.0);
		println!("{}", results_table(&report.reliable, show_dnssec, use_color));
	}

	if !report.unreliable.is_empty() {
		println!("\nUnreliable resolvers (success < {:.0}%):", report.threshold * 100.0);
		println!("{}", results_table(&report.unreliable, show_dnssec, use_color));
	}

	if !report.failed.is_empty() {
		println!("\nResolvers that could not be tested:");
		for f in &report.failed {
			println!("  {}: {}", f.resolver, f.reason);
		}
	}

	println!("\nRecommendation");
	println!("==============");
	println!("{}", recommendation_line(report, show_dnssec));
}

/// Single-line verdict for the fastest reliable resolver.
pub fn recommendation_line(report: &RankedReport, show_dnssec: bool) -> String {
	let Some(best) = report.recommendation() else {
		return "No reliable resolver found.".to_string();
	};
	let mut line = format!("Fastest reliable resolver: {}", best.resolver);
	if let Some(l) = best.latency {
		line.push_str(&format!(" (avg {:.2} ms, p90 {:.2} ms)", l.avg_ms, l.p90_ms));
	}
	if show_dnssec && best.dnssec == DnssecVerdict::Supported {
		line.push_str(" (supports DNSSEC)");
	}
	line
}

/// Write results to a CSV file.
pub fn write_csv(path: &str, report: &RankedReport) -> Result<()> {
	let mut writer = csv::Writer::from_path(path)
		.map_err(|e| anyhow!("failed to create '{}': {}", path, e))?;
	for record in records(report) {
		writer.serialize(record)?;
	}
	writer.flush()?;
	println!("\nResults written to: {}", path);
	Ok(())
}

/// Write results to a JSON file.
pub fn write_json(path: &str, report: &RankedReport) -> Result<()> {
	let file = File::create(path)
		.map_err(|e| anyhow!("failed to create '{}': {}", path, e))?;
	serde_json::to_writer_pretty(BufWriter::new(file), &records(report))?;
	println!("\nResults written to: {}", path);
	Ok(())
}

#[cfg(test)]
mod tests {
	use super::*;
	use std::collections::BTreeMap;

	use crate::probe::ProbeRun;
	use crate::stats::{rank_resolvers, summarize, ResolverOutcome};
	use crate::transport::FailureKind;

	fn report() -> RankedReport {
		let mut fast = ProbeRun::new("1.1.1.1".parse().unwrap());
		fast.times_ms = vec![10.0, 20.0];
		fast.dnssec = DnssecVerdict::Supported;
		let mut dead = ProbeRun::new("9.9.9.9".parse().unwrap());
		dead.failures.record(FailureKind::Timeout);
		dead.failures.record(FailureKind::NoNameservers);

		let mut results = BTreeMap::new();
		for run in [fast, dead] {
			results.insert(run.resolver, ResolverOutcome::Completed(summarize(&run)));
		}
		rank_resolvers(results, 0.95)
	}

	#[test]
	fn test_records_order_and_fields() {
		let records = records(&report());
		assert_eq!(records.len(), 2);
		assert!(records[0].reliable);
		assert_eq!(records[0].avg_ms, Some(15.0));
		assert!(!records[1].reliable);
		assert_eq!(records[1].avg_ms, None);
		assert_eq!(records[1].timeout, 1);
		assert_eq!(records[1].no_nameservers, 1);
	}

	#[test]
	fn test_json_uses_null_for_undefined_latency() {
		let json = serde_json::to_value(records(&report())).unwrap();
		assert_eq!(json[0]["server"], "1.1.1.1");
		assert_eq!(json[0]["dnssec"], "supported");
		assert!(json[1]["avg_ms"].is_null());
	}

	#[test]
	fn test_csv_leaves_undefined_latency_empty() {
		let mut writer = csv::Writer::from_writer(Vec::new());
		for record in records(&report()) {
			writer.serialize(record).unwrap();
		}
		let text = String::from_utf8(writer.into_inner().unwrap()).unwrap();
		let lines: Vec<&str> = text.lines().collect();
		assert!(lines[0].starts_with("server,reliable,success_rate,avg_ms"));
		assert!(lines[2].starts_with("9.9.9.9,false,0.0,,"));
	}

	#[test]
	fn test_recommendation_line() {
		let line = recommendation_line(&report(), true);
		assert!(line.contains("1.1.1.1"));
		assert!(line.contains("avg 15.00 ms"));
		assert!(line.contains("supports DNSSEC"));
	}

	#[test]
	fn test_no_reliable_resolver() {
		let report = rank_resolvers(BTreeMap::new(), 0.95);
		assert_eq!(recommendation_line(&report, false), "No reliable resolver found.");
	}

	#[test]
	fn test_table_without_color() {
		let report = report();
		let table = results_table(&report.unreliable, false, false).to_string();
		assert!(table.contains("9.9.9.9"));
		assert!(table.contains("Failed"));
		assert!(!table.contains("DNSSEC"));
	}
}
