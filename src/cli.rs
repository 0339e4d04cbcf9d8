use clap::{ArgAction, Parser, ValueEnum};

/// Output format for the results
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
	Table,
	Json,
	Csv,
}

/// DNS resolver speed test (IPv4 A records only)
#[derive(Parser, Debug)]
#[command(name = "dns-speed-test")]
#[command(about = "Rank IPv4 DNS resolvers by latency and reliability")]
pub struct Cli {
	/// DNS resolver address (repeatable, e.g. 1.1.1.1)
	#[arg(short = 'r', long = "resolver")]
	pub resolvers: Vec<String>,

	/// File containing resolver addresses (one per line)
	#[arg(short = 'f', long = "servers")]
	pub servers: Option<String>,

	/// Include IPv4 resolvers from the system configuration
	#[arg(long = "system-resolvers")]
	pub system_resolvers: bool,

	/// File containing domains to query (one per line)
	#[arg(long = "domains")]
	pub domains: Option<String>,

	/// Number of timed queries per domain
	#[arg(short = 'q', long = "queries", default_value = "3")]
	pub queries: u32,

	/// Number of untimed warm-up queries before testing
	#[arg(long = "warmup-queries", default_value = "1")]
	pub warmup_queries: u32,

	/// Number of resolvers tested concurrently
	#[arg(short = 'w', long = "workers", default_value = "10")]
	pub workers: usize,

	/// Per-attempt query timeout in seconds
	#[arg(short = 't', long = "timeout", default_value = "2.0")]
	pub timeout: f64,

	/// Total time budget for one query, retries included, in seconds
	#[arg(short = 'l', long = "lifetime", default_value = "2.0")]
	pub lifetime: f64,

	/// Check whether resolvers validate DNSSEC
	#[arg(long = "dnssec")]
	pub dnssec: bool,

	/// Minimum success rate (0-1) for a resolver to be recommended
	#[arg(long = "threshold", default_value = "0.95")]
	pub threshold: f64,

	/// Output format
	#[arg(long = "output-format", value_enum, default_value = "table")]
	pub output_format: OutputFormat,

	/// File to write JSON or CSV results to
	#[arg(short = 'o', long = "output-file")]
	pub output_file: Option<String>,

	/// Disable colorized output
	#[arg(long = "no-color")]
	pub no_color: bool,

	/// Increase log verbosity (-v info, -vv debug)
	#[arg(short = 'v', long = "verbose", action = ArgAction::Count)]
	pub verbose: u8,
}
