use std::fmt;
use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4};
use std::str::FromStr;
use std::time::Duration;

use serde::{Serialize, Serializer};

use crate::error::{BenchError, InvalidAddress};

pub const DNS_PORT: u16 = 53;
pub const DEFAULT_WORKERS: usize = 10;
pub const DEFAULT_THRESHOLD: f64 = 0.95;

/// Address of a single DNS resolver under test.
///
/// Parsed from a dotted-quad IPv4 string; queries always go to port 53.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ResolverAddress {
	ip: Ipv4Addr,
	port: u16,
}

impl ResolverAddress {
	pub fn new(ip: Ipv4Addr) -> Self {
		Self { ip, port: DNS_PORT }
	}

	#[cfg(test)]
	pub fn with_port(mut self, port: u16) -> Self {
		self.port = port;
		self
	}

	#[cfg(test)]
	pub fn ip(&self) -> Ipv4Addr {
		self.ip
	}

	pub fn socket_addr(&self) -> SocketAddr {
		SocketAddr::V4(SocketAddrV4::new(self.ip, self.port))
	}
}

impl FromStr for ResolverAddress {
	type Err = InvalidAddress;

	/// Accepts exactly four dot-separated decimal octets, each 0-255.
	fn from_str(s: &str) -> Result<Self, Self::Err> {
		let invalid = || InvalidAddress(s.to_string());
		let mut octets = [0u8; 4];
		let mut parts = s.trim().split('.');
		for octet in octets.iter_mut() {
			let part = parts.next().ok_or_else(invalid)?;
			if part.is_empty() || !part.bytes().all(|b| b.is_ascii_digit()) {
				return Err(invalid());
			}
			*octet = part.parse().map_err(|_| invalid())?;
		}
		if parts.next().is_some() {
			return Err(invalid());
		}
		Ok(Self::new(Ipv4Addr::from(octets)))
	}
}

impl fmt::Display for ResolverAddress {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		if self.port == DNS_PORT {
			write!(f, "{}", self.ip)
		} else {
			write!(f, "{}:{}", self.ip, self.port)
		}
	}
}

impl Serialize for ResolverAddress {
	fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
		serializer.collect_str(self)
	}
}

/// Classified failure of one query attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailureKind {
	Timeout,
	NoAnswer,
	NxDomain,
	NoNameservers,
	Other,
}

impl FailureKind {
	pub const ALL: [FailureKind; 5] = [
		FailureKind::Timeout,
		FailureKind::NoAnswer,
		FailureKind::NxDomain,
		FailureKind::NoNameservers,
		FailureKind::Other,
	];

	pub fn label(self) -> &'static str {
		match self {
			FailureKind::Timeout => "Timeout",
			FailureKind::NoAnswer => "NoAnswer",
			FailureKind::NxDomain => "NXDOMAIN",
			FailureKind::NoNameservers => "NoNameservers",
			FailureKind::Other => "Other",
		}
	}
}

/// Result of a single A-record query
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum QueryOutcome {
	Success { elapsed_ms: f64 },
	Failure(FailureKind),
}

/// Per-kind failure counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OutcomeCounts {
	pub timeout: usize,
	pub no_answer: usize,
	pub nx_domain: usize,
	pub no_nameservers: usize,
	pub other: usize,
}

impl OutcomeCounts {
	pub fn record(&mut self, kind: FailureKind) {
		*self.slot(kind) += 1;
	}

	pub fn get(&self, kind: FailureKind) -> usize {
		match kind {
			FailureKind::Timeout => self.timeout,
			FailureKind::NoAnswer => self.no_answer,
			FailureKind::NxDomain => self.nx_domain,
			FailureKind::NoNameservers => self.no_nameservers,
			FailureKind::Other => self.other,
		}
	}

	pub fn total(&self) -> usize {
		FailureKind::ALL.iter().map(|&k| self.get(k)).sum()
	}

	fn slot(&mut self, kind: FailureKind) -> &mut usize {
		match kind {
			FailureKind::Timeout => &mut self.timeout,
			FailureKind::NoAnswer => &mut self.no_answer,
			FailureKind::NxDomain => &mut self.nx_domain,
			FailureKind::NoNameservers => &mut self.no_nameservers,
			FailureKind::Other => &mut self.other,
		}
	}
}

/// Outcome of the DNSSEC capability probe.
///
/// `Unknown` means the probe was not run. A probe that fails on both
/// transports reports `Unsupported`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DnssecVerdict {
	Supported,
	Unsupported,
	#[default]
	Unknown,
}

impl fmt::Display for DnssecVerdict {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		let s = match self {
			DnssecVerdict::Supported => "Yes",
			DnssecVerdict::Unsupported => "No",
			DnssecVerdict::Unknown => "N/A",
		};
		f.write_str(s)
	}
}

/// Benchmark configuration
#[derive(Debug, Clone)]
pub struct BenchmarkConfig {
	pub queries_per_domain: u32,
	pub warmup_queries: u32,
	pub worker_count: usize,
	/// Budget for one network round-trip
	pub timeout: Duration,
	/// Budget for a whole resolution attempt, retries included
	pub lifetime: Duration,
	pub check_dnssec: bool,
	pub reliability_threshold: f64,
}

impl Default for BenchmarkConfig {
	fn default() -> Self {
		Self {
			queries_per_domain: 3,
			warmup_queries: 1,
			worker_count: DEFAULT_WORKERS,
			timeout: Duration::from_secs(2),
			lifetime: Duration::from_secs(2),
			check_dnssec: false,
			reliability_threshold: DEFAULT_THRESHOLD,
		}
	}
}

impl BenchmarkConfig {
	/// Reject configurations that cannot produce a meaningful run.
	pub fn validate(&self) -> Result<(), BenchError> {
		let t = self.reliability_threshold;
		if !(0.0..=1.0).contains(&t) {
			return Err(BenchError::InvalidThreshold(t));
		}
		if self.worker_count == 0 {
			return Err(BenchError::NoWorkers);
		}
		if self.timeout.is_zero() {
			return Err(BenchError::InvalidDuration { name: "timeout", value: 0.0 });
		}
		if self.lifetime.is_zero() {
			return Err(BenchError::InvalidDuration { name: "lifetime", value: 0.0 });
		}
		Ok(())
	}
}

/// Convert a user-supplied number of seconds into a Duration.
pub fn seconds(name: &'static str, value: f64) -> Result<Duration, BenchError> {
	let invalid = || BenchError::InvalidDuration { name, value };
	if !value.is_finite() || value <= 0.0 {
		return Err(invalid());
	}
	Duration::try_from_secs_f64(value).map_err(|_| invalid())
}
