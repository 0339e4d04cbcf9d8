use thiserror::Error;

use crate::transport::ResolverAddress;

/// Errors that stop a benchmark run as a whole.
#[derive(Error, Debug)]
pub enum BenchError {
	#[error("reliability threshold must be between 0 and 1, got {0}")]
	InvalidThreshold(f64),
	#[error("worker count must be at least 1")]
	NoWorkers,
	#[error("{name} must be a positive number of seconds, got {value}")]
	InvalidDuration { name: &'static str, value: f64 },
	#[error("no valid DNS resolvers to test")]
	NoResolvers,
	#[error("no domains to test")]
	NoDomains,
	#[error("interrupted after {completed}/{total} resolvers")]
	Interrupted { completed: usize, total: usize },
}

/// A resolver string that is not a dotted-quad IPv4 address.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("invalid IPv4 address '{0}'")]
pub struct InvalidAddress(pub String);

/// Unexpected failure while probing one resolver.
///
/// These are outside the per-query outcome taxonomy; the scheduler records
/// them against the resolver and carries on with the rest.
#[derive(Error, Debug)]
pub enum ProbeError {
	#[error("cannot open a socket for resolver {resolver}: {source}")]
	Socket {
		resolver: ResolverAddress,
		#[source]
		source: std::io::Error,
	},
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_interrupted_message() {
		let err = BenchError::Interrupted { completed: 3, total: 10 };
		assert_eq!(err.to_string(), "interrupted after 3/10 resolvers");
	}

	#[test]
	fn test_socket_error_names_resolver() {
		let err = ProbeError::Socket {
			resolver: "9.9.9.9".parse().unwrap(),
			source: std::io::Error::new(std::io::ErrorKind::Other, "too many open files"),
		};
		let msg = err.to_string();
		assert!(msg.contains("9.9.9.9"));
		assert!(msg.contains("too many open files"));
	}
}
