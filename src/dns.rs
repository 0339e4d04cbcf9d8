use std::future::Future;
use std::io;
use std::net::SocketAddr;
use std::time::{Duration, Instant};

use anyhow::{anyhow, Result};
use hickory_proto::op::{Edns, Message, MessageType, Query, ResponseCode};
use hickory_proto::rr::{Name, RecordType};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpStream, UdpSocket};
use tracing::{debug, trace, warn};

use crate::error::ProbeError;
use crate::transport::{DnssecVerdict, FailureKind, QueryOutcome, ResolverAddress};

/// DNSSEC-signed zone used for the capability probe
pub const DNSSEC_PROBE_DOMAIN: &str = "internic.net";

/// DNS response information extracted from a parsed message
#[derive(Debug)]
pub struct DnsResponse {
	pub rcode: ResponseCode,
	/// True if the answer section contains A records
	pub has_a_records: bool,
	pub truncated: bool,
	/// The AD (authenticated data) header flag
	pub authentic_data: bool,
}

impl DnsResponse {
	/// Map a response onto the outcome taxonomy; `None` means success.
	pub fn failure_kind(&self) -> Option<FailureKind> {
		match self.rcode {
			ResponseCode::NoError if self.has_a_records => None,
			ResponseCode::NoError => Some(FailureKind::NoAnswer),
			ResponseCode::NXDomain => Some(FailureKind::NxDomain),
			ResponseCode::ServFail
			| ResponseCode::Refused
			| ResponseCode::NotImp
			| ResponseCode::FormErr => Some(FailureKind::NoNameservers),
			_ => Some(FailureKind::Other),
		}
	}
}

/// A serialized query together with what its reply must echo back.
#[derive(Debug, Clone)]
pub struct OutgoingQuery {
	pub bytes: Vec<u8>,
	pub txid: u16,
	pub name: Name,
}

/// Build an A query message for the given domain.
///
/// When dnssec is true, the DO (DNSSEC OK) bit is set via EDNS.
pub fn build_query(domain: &str, txid: u16, dnssec: bool) -> Result<OutgoingQuery> {
	let name = Name::from_ascii(domain)
		.map_err(|e| anyhow!("invalid domain name '{}': {}", domain, e))?;

	let mut message = Message::new();
	message.set_id(txid);
	message.set_recursion_desired(true);
	message.add_query(Query::query(name.clone(), RecordType::A));

	if dnssec {
		let edns = message.extensions_mut().get_or_insert_with(Edns::new);
		edns.set_dnssec_ok(true);
	}

	let bytes = message.to_vec()
		.map_err(|e| anyhow!("failed to serialize DNS query: {}", e))?;
	Ok(OutgoingQuery { bytes, txid, name })
}

/// Label-wise, ASCII case-insensitive name comparison.
fn same_name(a: &Name, b: &Name) -> bool {
	a.num_labels() == b.num_labels()
		&& a.iter().zip(b.iter()).all(|(x, y)| x.eq_ignore_ascii_case(y))
}

/// Parse a DNS response, validating the transaction ID and that it
/// answers the question that was asked.
pub fn parse_response(bytes: &[u8], expected: &OutgoingQuery) -> Result<DnsResponse> {
	let message = Message::from_vec(bytes)
		.map_err(|e| anyhow!("failed to parse DNS response: {}", e))?;

	if message.id() != expected.txid {
		return Err(anyhow!(
			"txid mismatch: expected {}, got {}",
			expected.txid, message.id()
		));
	}

	if message.message_type() != MessageType::Response {
		return Err(anyhow!("received a query instead of a response"));
	}

	let answers_question = message.queries().first().is_some_and(|q| {
		q.query_type() == RecordType::A && same_name(q.name(), &expected.name)
	});
	if !answers_question {
		return Err(anyhow!("reply does not answer the A question for {}", expected.name));
	}

	let has_a_records = message.answers().iter()
		.any(|r| r.record_type() == RecordType::A);

	Ok(DnsResponse {
		rcode: message.response_code(),
		has_a_records,
		truncated: message.truncated(),
		authentic_data: message.authentic_data(),
	})
}

/// Issues queries against exactly one resolver.
pub trait QueryExecutor {
	/// Resolve the A record of `domain`, classifying the outcome.
	fn execute(&mut self, domain: &str) -> impl Future<Output = QueryOutcome> + Send;

	/// Check whether the resolver sets the AD flag for a signed zone.
	fn probe_dnssec(&mut self) -> impl Future<Output = DnssecVerdict> + Send;
}

/// Query executor speaking plain DNS over a UDP socket connected to the
/// resolver, with TCP used for truncated replies and the DNSSEC fallback.
pub struct UdpExecutor {
	resolver: ResolverAddress,
	socket: UdpSocket,
	timeout: Duration,
	lifetime: Duration,
}

impl UdpExecutor {
	/// Open the resolution context for one resolver.
	pub async fn connect(
		resolver: ResolverAddress,
		timeout: Duration,
		lifetime: Duration,
	) -> Result<Self, ProbeError> {
		let socket_err = |source| ProbeError::Socket { resolver, source };
		let socket = UdpSocket::bind("0.0.0.0:0").await.map_err(socket_err)?;
		socket.connect(resolver.socket_addr()).await.map_err(socket_err)?;
		Ok(Self { resolver, socket, timeout, lifetime })
	}

	/// Send `query` and wait for its reply until `deadline`, retrying
	/// unanswered attempts while time remains.
	async fn exchange(
		&self,
		query: &OutgoingQuery,
		deadline: Instant,
	) -> Result<DnsResponse, FailureKind> {
		loop {
			let remaining = deadline.saturating_duration_since(Instant::now());
			if remaining.is_zero() {
				return Err(FailureKind::Timeout);
			}
			if let Err(e) = self.socket.send(&query.bytes).await {
				debug!(resolver = %self.resolver, error = %e, "send failed");
				return Err(FailureKind::NoNameservers);
			}
			match self.await_reply(query, self.timeout.min(remaining)).await {
				Ok(Some(response)) if response.truncated => {
					trace!(resolver = %self.resolver, "truncated reply, retrying over TCP");
					return tcp_exchange(self.resolver.socket_addr(), query, deadline).await;
				}
				Ok(Some(response)) => return Ok(response),
				Ok(None) => continue,
				Err(e) => {
					debug!(resolver = %self.resolver, error = %e, "receive failed");
					return Err(FailureKind::NoNameservers);
				}
			}
		}
	}

	/// Wait up to `budget` for the reply matching `query`.
	///
	/// Stale, mismatched or malformed datagrams are skipped. `Ok(None)`
	/// means the budget ran out.
	async fn await_reply(
		&self,
		query: &OutgoingQuery,
		budget: Duration,
	) -> io::Result<Option<DnsResponse>> {
		let deadline = Instant::now() + budget;
		// 4096 bytes covers EDNS-extended responses
		let mut buf = vec![0u8; 4096];
		loop {
			let remaining = deadline.saturating_duration_since(Instant::now());
			if remaining.is_zero() {
				return Ok(None);
			}
			match tokio::time::timeout(remaining, self.socket.recv(&mut buf)).await {
				Err(_) => return Ok(None),
				Ok(Err(e)) => return Err(e),
				Ok(Ok(len)) => match parse_response(&buf[..len], query) {
					Ok(response) => return Ok(Some(response)),
					Err(e) => trace!(resolver = %self.resolver, error = %e, "ignoring datagram"),
				},
			}
		}
	}
}

impl QueryExecutor for UdpExecutor {
	async fn execute(&mut self, domain: &str) -> QueryOutcome {
		let query = match build_query(domain, rand::random(), false) {
			Ok(query) => query,
			Err(e) => {
				debug!(resolver = %self.resolver, error = %e, "cannot build query");
				return QueryOutcome::Failure(FailureKind::Other);
			}
		};

		let start = Instant::now();
		let result = self.exchange(&query, start + self.lifetime).await;
		let elapsed = start.elapsed();

		match result.map(|response| response.failure_kind()) {
			Ok(None) => QueryOutcome::Success {
				elapsed_ms: elapsed.as_secs_f64() * 1000.0,
			},
			Ok(Some(kind)) | Err(kind) => {
				debug!(resolver = %self.resolver, domain, outcome = kind.label(), "query failed");
				QueryOutcome::Failure(kind)
			}
		}
	}

	async fn probe_dnssec(&mut self) -> DnssecVerdict {
		let query = match build_query(DNSSEC_PROBE_DOMAIN, rand::random(), true) {
			Ok(query) => query,
			Err(e) => {
				warn!(resolver = %self.resolver, error = %e, "DNSSEC check failed");
				return DnssecVerdict::Unsupported;
			}
		};

		let udp = match self.socket.send(&query.bytes).await {
			Ok(_) => self.await_reply(&query, self.timeout).await,
			Err(e) => Err(e),
		};
		let response = match udp {
			Ok(Some(response)) if !response.truncated => Ok(response),
			_ => {
				let deadline = Instant::now() + self.timeout;
				tcp_exchange(self.resolver.socket_addr(), &query, deadline).await
			}
		};

		match response {
			Ok(response) if response.authentic_data => DnssecVerdict::Supported,
			Ok(_) => DnssecVerdict::Unsupported,
			Err(kind) => {
				warn!(
					resolver = %self.resolver,
					reason = kind.label(),
					"DNSSEC check failed over UDP and TCP, assuming no support",
				);
				DnssecVerdict::Unsupported
			}
		}
	}
}

/// One query over TCP with two-byte length framing, bounded by `deadline`.
async fn tcp_exchange(
	addr: SocketAddr,
	query: &OutgoingQuery,
	deadline: Instant,
) -> Result<DnsResponse, FailureKind> {
	let remaining = deadline.saturating_duration_since(Instant::now());
	let exchange = async {
		let len = u16::try_from(query.bytes.len())
			.map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "query too large"))?;
		let mut stream = TcpStream::connect(addr).await?;
		stream.write_all(&len.to_be_bytes()).await?;
		stream.write_all(&query.bytes).await?;

		let mut len_buf = [0u8; 2];
		stream.read_exact(&mut len_buf).await?;
		let mut buf = vec![0u8; u16::from_be_bytes(len_buf) as usize];
		stream.read_exact(&mut buf).await?;
		Ok::<_, io::Error>(buf)
	};

	match tokio::time::timeout(remaining, exchange).await {
		Err(_) => Err(FailureKind::Timeout),
		Ok(Err(e)) => {
			debug!(%addr, error = %e, "TCP exchange failed");
			Err(FailureKind::NoNameservers)
		}
		Ok(Ok(buf)) => parse_response(&buf, query).map_err(|e| {
			debug!(%addr, error = %e, "bad TCP reply");
			FailureKind::Other
		}),
	}
}
