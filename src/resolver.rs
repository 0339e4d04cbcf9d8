use std::collections::HashSet;
use std::net::IpAddr;

use anyhow::{anyhow, Result};
use tracing::{debug, warn};

use crate::transport::ResolverAddress;

/// Parse a resolver address given on the command line.
pub fn parse_resolver(input: &str) -> Result<ResolverAddress> {
	Ok(input.trim().parse()?)
}

/// Read resolver addresses from a file, one per line.
///
/// Blank lines and lines starting with '#' are skipped, as are lines that
/// are not valid IPv4 addresses (with a warning).
pub fn read_resolver_file(path: &str) -> Result<Vec<ResolverAddress>> {
	let content = std::fs::read_to_string(path)
		.map_err(|e| anyhow!("failed to read resolver file '{}': {}", path, e))?;
	Ok(parse_resolver_lines(&content, path))
}

fn parse_resolver_lines(content: &str, source: &str) -> Vec<ResolverAddress> {
	let mut resolvers = Vec::new();
	for line in content.lines() {
		let trimmed = line.trim();
		if trimmed.is_empty() || trimmed.starts_with('#') {
			continue;
		}
		match trimmed.parse() {
			Ok(resolver) => resolvers.push(resolver),
			Err(e) => warn!("skipping line from {}: {}", source, e),
		}
	}
	resolvers
}

/// IPv4 nameservers from the host's resolver configuration.
///
/// Returns an empty vec if the configuration cannot be read.
pub fn system_resolvers() -> Vec<ResolverAddress> {
	let (config, _opts) = match hickory_resolver::system_conf::read_system_conf() {
		Ok(conf) => conf,
		Err(e) => {
			warn!("cannot read system resolver configuration: {}", e);
			return Vec::new();
		}
	};
	let mut resolvers = Vec::new();
	for ns in config.name_servers() {
		match ns.socket_addr.ip() {
			IpAddr::V4(ip) => resolvers.push(ResolverAddress::new(ip)),
			IpAddr::V6(ip) => debug!("ignoring IPv6 system resolver {}", ip),
		}
	}
	// The system config lists each address once per protocol
	dedup(resolvers)
}

/// Return the built-in list of public resolvers.
pub fn default_resolvers() -> Vec<ResolverAddress> {
	[
		"8.8.8.8",
		"1.1.1.1",
		"208.67.222.222",
		"9.9.9.9",
		"8.26.56.26",
		"77.88.8.8",
		"1.2.4.8",
		"223.5.5.5",
		"180.76.76.76",
		"114.114.114.114",
	].iter().filter_map(|s| s.parse().ok()).collect()
}

/// Remove repeated addresses, keeping the first occurrence.
pub fn dedup(resolvers: Vec<ResolverAddress>) -> Vec<ResolverAddress> {
	let mut seen = HashSet::new();
	resolvers.into_iter().filter(|r| seen.insert(*r)).collect()
}
