mod bench;
mod cli;
mod dns;
mod domains;
mod error;
mod output;
mod probe;
mod resolver;
mod stats;
mod transport;

use anyhow::bail;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use crate::cli::{Cli, OutputFormat};
use crate::error::BenchError;
use crate::transport::{seconds, BenchmarkConfig, ResolverAddress};

fn init_logging(verbose: u8) {
	let level = match verbose {
		0 => "warn",
		1 => "info",
		_ => "debug",
	};
	let filter = EnvFilter::try_from_default_env()
		.unwrap_or_else(|_| EnvFilter::new(level));
	tracing_subscriber::fmt()
		.with_env_filter(filter)
		.with_writer(std::io::stderr)
		.with_target(false)
		.init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
	let cli = Cli::parse();
	init_logging(cli.verbose);

	// Machine-readable formats need somewhere to go
	if cli.output_format != OutputFormat::Table && cli.output_file.is_none() {
		bail!("--output-file is required for {:?} output", cli.output_format);
	}

	// Collect resolvers from all sources
	let mut resolvers = Vec::new();
	for r in &cli.resolvers {
		resolvers.push(resolver::parse_resolver(r)?);
	}
	if let Some(path) = &cli.servers {
		resolvers.extend(resolver::read_resolver_file(path)?);
	}
	if cli.system_resolvers {
		resolvers.extend(resolver::system_resolvers());
	}
	let no_source = cli.resolvers.is_empty() && cli.servers.is_none() && !cli.system_resolvers;
	if no_source {
		resolvers = resolver::default_resolvers();
	}
	let resolvers = resolver::dedup(resolvers);
	if resolvers.is_empty() {
		return Err(BenchError::NoResolvers.into());
	}

	let domains = match &cli.domains {
		Some(path) => domains::read_domain_file(path)?,
		None => domains::default_domains(),
	};
	if domains.is_empty() {
		return Err(BenchError::NoDomains.into());
	}

	let config = BenchmarkConfig {
		queries_per_domain: cli.queries,
		warmup_queries: cli.warmup_queries,
		worker_count: cli.workers,
		timeout: seconds("timeout", cli.timeout)?,
		lifetime: seconds("lifetime", cli.lifetime)?,
		check_dnssec: cli.dnssec,
		reliability_threshold: cli.threshold,
	};
	config.validate()?;

	output::print_config_summary(&resolvers, domains.len(), &config);

	let bar = output::progress_bar(resolvers.len());
	let mut progress = |completed: usize, total: usize, resolver: &ResolverAddress| {
		bar.set_length(total as u64);
		bar.set_position(completed as u64);
		bar.set_message(format!("finished {}", resolver));
	};
	let shutdown = async {
		if let Err(e) = tokio::signal::ctrl_c().await {
			tracing::warn!("cannot listen for Ctrl-C: {}", e);
			std::future::pending::<()>().await;
		}
	};
	let results = bench::run_benchmark(&resolvers, &domains, &config, &mut progress, shutdown).await;
	bar.finish_and_clear();

	let results = match results {
		Ok(results) => results,
		Err(e @ BenchError::Interrupted { .. }) => {
			eprintln!("Test {}; no results reported.", e);
			std::process::exit(130);
		}
		Err(e) => return Err(e.into()),
	};

	let report = stats::rank_resolvers(results, config.reliability_threshold);

	match (cli.output_format, &cli.output_file) {
		(OutputFormat::Table, _) => {
			output::print_report(&report, config.check_dnssec, !cli.no_color);
		}
		(OutputFormat::Json, Some(path)) => output::write_json(path, &report)?,
		(OutputFormat::Csv, Some(path)) => output::write_csv(path, &report)?,
		(format, None) => bail!("--output-file is required for {:?} output", format),
	}

	if !matches!(cli.output_format, OutputFormat::Table) {
		println!("{}", output::recommendation_line(&report, config.check_dnssec));
	}

	Ok(())
}
