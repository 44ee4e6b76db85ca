//! UDP broadcast discovery
//!
//! A fixed-size datagram is broadcast to the discovery port. Every
//! coordinator that hears it answers with a small XML document:
//!
//! ```text
//! <hudson><url>https://ci.example.com/</url><swarm>secret</swarm></hudson>
//! ```
//!
//! Responses are collected for a fixed window and one valid responder is
//! picked uniformly at random, so a broadcast storm does not always land on
//! the fastest coordinator.

use std::net::SocketAddr;
use std::time::Duration;

use async_trait::async_trait;
use rand::Rng;
use reqwest::Url;
use tokio::net::UdpSocket;
use tokio::time::Instant;

use sl_core::error::ProtocolError;
use sl_core::Candidate;

use crate::xml::element_text;

/// Size of the discovery datagram
pub const DISCOVERY_DATAGRAM_LEN: usize = 128;

/// Largest response we read
const MAX_RESPONSE_LEN: usize = 8192;

/// Consecutive receive failures before the window is abandoned
const MAX_RECEIVE_ERRORS: u32 = 5;

/// Pause after a receive failure
const RECEIVE_ERROR_PAUSE: Duration = Duration::from_millis(50);

/// Where discovery responses are read from
#[async_trait]
pub trait ResponseSource: Send + Sync {
    async fn recv_from(&self, buf: &mut [u8]) -> std::io::Result<(usize, SocketAddr)>;
}

#[async_trait]
impl ResponseSource for UdpSocket {
    async fn recv_from(&self, buf: &mut [u8]) -> std::io::Result<(usize, SocketAddr)> {
        UdpSocket::recv_from(self, buf).await
    }
}

/// Broadcast for coordinators and pick one of the responders.
///
/// With `pinned` set, responders only have to supply the secret.
pub async fn discover(
    address: &str,
    port: u16,
    window: Duration,
    pinned: Option<&Url>,
) -> Result<Candidate, ProtocolError> {
    let target = format!("{}:{}", address, port);
    let socket = UdpSocket::bind(("0.0.0.0", 0)).await?;
    socket.set_broadcast(true)?;

    tracing::info!("Broadcasting discovery request to {}", target);
    socket
        .send_to(&[0u8; DISCOVERY_DATAGRAM_LEN], target.as_str())
        .await?;

    let (responses, candidates) =
        collect_responses(&socket, Instant::now() + window, pinned).await;

    if responses == 0 {
        return Err(ProtocolError::NoResponse { address: target });
    }

    tracing::debug!(
        "{} of {} discovery responses usable",
        candidates.len(),
        responses
    );
    choose_candidate(candidates, &mut rand::thread_rng()).ok_or_else(|| ProtocolError::Malformed {
        operation: "discovery",
        reason: format!("none of the {} responses were usable", responses),
    })
}

/// Read responses until `deadline`. Returns how many arrived and the usable
/// ones. Gives up early if the source keeps failing.
pub async fn collect_responses<S: ResponseSource + ?Sized>(
    source: &S,
    deadline: Instant,
    pinned: Option<&Url>,
) -> (usize, Vec<Candidate>) {
    let mut buf = vec![0u8; MAX_RESPONSE_LEN];
    let mut responses = 0usize;
    let mut receive_errors = 0u32;
    let mut candidates = Vec::new();

    loop {
        let remaining = deadline.saturating_duration_since(Instant::now());
        if remaining.is_zero() {
            break;
        }

        let (len, from) = match tokio::time::timeout(remaining, source.recv_from(&mut buf)).await
        {
            Err(_) => break,
            Ok(Ok(received)) => received,
            Ok(Err(e)) => {
                receive_errors += 1;
                if receive_errors >= MAX_RECEIVE_ERRORS {
                    tracing::warn!("Discovery receive keeps failing, giving up: {}", e);
                    break;
                }
                tracing::debug!("Discovery receive failed: {}", e);
                tokio::time::sleep(RECEIVE_ERROR_PAUSE.min(remaining)).await;
                continue;
            }
        };
        receive_errors = 0;

        responses += 1;
        match parse_broadcast_response(&buf[..len], pinned) {
            Ok(candidate) => {
                tracing::info!("Coordinator at {} answered from {}", candidate, from);
                candidates.push(candidate);
            }
            Err(reason) => {
                tracing::warn!("Ignoring discovery response from {}: {}", from, reason);
            }
        }
    }

    (responses, candidates)
}

/// Turn one broadcast response into a candidate, or explain why not
pub fn parse_broadcast_response(payload: &[u8], pinned: Option<&Url>) -> Result<Candidate, String> {
    let text = std::str::from_utf8(payload).map_err(|_| "response is not UTF-8".to_string())?;

    let secret = element_text(text, "swarm")
        .map_err(|e| format!("malformed XML: {}", e))?
        .ok_or_else(|| "responder does not support swarm nodes".to_string())?;
    if secret.is_empty() {
        return Err("responder sent a blank secret".to_string());
    }

    let url = match pinned {
        Some(url) => url.clone(),
        None => {
            let raw = element_text(text, "url")
                .map_err(|e| format!("malformed XML: {}", e))?
                .unwrap_or_default();
            if raw.is_empty() {
                return Err("responder did not advertise its URL".to_string());
            }
            let url = Url::parse(&raw).map_err(|e| format!("invalid URL '{}': {}", raw, e))?;
            if url.scheme() != "http" && url.scheme() != "https" {
                return Err(format!("invalid URL '{}': not http(s)", raw));
            }
            url
        }
    };

    Ok(Candidate::new(url, secret))
}

/// Pick one candidate uniformly at random
pub fn choose_candidate<R: Rng>(
    mut candidates: Vec<Candidate>,
    rng: &mut R,
) -> Option<Candidate> {
    if candidates.is_empty() {
        return None;
    }
    let index = rng.gen_range(0..candidates.len());
    Some(candidates.swap_remove(index))
}
