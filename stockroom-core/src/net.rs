//! Connector abstraction and reconnect backoff.
//!
//! Dialing goes through the [`Connect`] trait so production code runs
//! over `tokio::net::TcpStream` while simulation tests swap in
//! `turmoil::net::TcpStream` without touching the call sites.

use std::future::Future;
use std::io;
use std::pin::Pin;
use std::time::Duration;

use rand::Rng;
use tokio::io::{AsyncRead, AsyncWrite};

use crate::ids::ReplicaId;

/// Parse a `name=host:port` replica argument, as both binaries take
/// them on the command line.
///
/// # Errors
/// Returns a description of the expected format on malformed input.
pub fn parse_replica_addr(spec: &str) -> Result<(ReplicaId, String), String> {
    let (name, addr) = spec
        .split_once('=')
        .ok_or_else(|| format!("expected name=host:port, got {spec:?}"))?;
    if name.is_empty() || addr.is_empty() {
        return Err(format!("expected name=host:port, got {spec:?}"));
    }
    Ok((ReplicaId::from(name), addr.to_owned()))
}

/// Connects to a replica by address. Implementations do a single dial
/// attempt; retry and backoff are the caller's job.
pub trait Connect: Clone + Send + 'static {
    type Stream: AsyncRead + AsyncWrite + Send + Unpin + 'static;
    type Error: std::error::Error + Send + Sync + 'static;
    type Future: Future<Output = Result<Self::Stream, Self::Error>> + Send;

    fn connect(&mut self, addr: &str) -> Self::Future;
}

/// Plain TCP connector for production use.
#[derive(Clone, Copy, Debug, Default)]
pub struct TcpConnector;

impl Connect for TcpConnector {
    type Stream = tokio::net::TcpStream;
    type Error = io::Error;
    type Future = Pin<Box<dyn Future<Output = io::Result<Self::Stream>> + Send>>;

    fn connect(&mut self, addr: &str) -> Self::Future {
        let addr = addr.to_owned();
        Box::pin(async move { tokio::net::TcpStream::connect(addr).await })
    }
}

/// Configuration for exponential backoff with jitter.
#[derive(Debug, Clone)]
pub struct BackoffConfig {
    /// Initial backoff duration
    pub initial: Duration,
    /// Maximum backoff duration
    pub max: Duration,
    /// Multiplier for each retry (typically 2.0)
    pub multiplier: f64,
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self {
            initial: Duration::from_millis(50),
            max: Duration::from_secs(5),
            multiplier: 2.0,
        }
    }
}

impl BackoffConfig {
    /// Backoff duration for a given retry count, jittered to 50-150% so
    /// that peers reconnecting at the same moment spread out.
    #[must_use]
    pub fn duration(&self, retries: u32, rng: &mut impl Rng) -> Duration {
        let base = self.initial.as_secs_f64() * self.multiplier.powi(retries.cast_signed());
        let capped = base.min(self.max.as_secs_f64());
        let jitter_factor = rng.random_range(0.5..1.5);
        Duration::from_secs_f64(capped * jitter_factor)
    }
}

#[cfg(test)]
mod tests {
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    use super::*;

    #[test]
    fn backoff_is_capped() {
        let config = BackoffConfig::default();
        let mut rng = StdRng::seed_from_u64(7);
        let d = config.duration(30, &mut rng);
        assert!(d <= config.max.mul_f64(1.5));
    }

    #[test]
    fn backoff_grows_with_retries() {
        let config = BackoffConfig {
            initial: Duration::from_millis(10),
            max: Duration::from_secs(60),
            multiplier: 2.0,
        };
        // Strip jitter by comparing against generous bounds.
        let mut rng = StdRng::seed_from_u64(7);
        let early = config.duration(0, &mut rng);
        let late = config.duration(8, &mut rng);
        assert!(late > early * 10);
    }
}
