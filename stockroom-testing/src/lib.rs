//! Turmoil harness for whole-cluster simulation tests.
//!
//! Runs the real server and client stacks over turmoil's simulated
//! network: same engine, same replica actor, same backend, only the
//! sockets are swapped via [`Connect`].

#![warn(clippy::pedantic)]

use std::collections::BTreeMap;
use std::future::Future;
use std::io;
use std::net::Ipv4Addr;
use std::pin::Pin;

use stockroom_client::api::StockClient;
use stockroom_client::backend::Backend;
use stockroom_client::elector::ElectorConfig;
use stockroom_core::{ClientId, Connect, ReplicaId};
use stockroom_server::config::ReplicaConfig;
use stockroom_server::node::start_node;
use stockroom_server::serve::serve_connection;

/// Every replica listens here; turmoil DNS tells them apart by name.
pub const PORT: u16 = 4700;

/// Initialize tracing for tests. Call at the start of each test and
/// hold the returned guard. Uses `RUST_LOG` for filtering.
pub fn init_tracing() -> impl Sized {
    use tracing::Dispatch;
    use tracing_subscriber::{EnvFilter, fmt};

    let subscriber = fmt::Subscriber::builder()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_test_writer()
        .finish();

    // Thread-local so parallel tests don't fight over a global default.
    let dispatch = Dispatch::new(subscriber);
    tracing::dispatcher::set_default(&dispatch)
}

/// Connector over turmoil's simulated TCP.
#[derive(Clone, Copy, Debug, Default)]
pub struct TurmoilConnector;

impl Connect for TurmoilConnector {
    type Stream = turmoil::net::TcpStream;
    type Error = io::Error;
    type Future = Pin<Box<dyn Future<Output = io::Result<Self::Stream>> + Send>>;

    fn connect(&mut self, addr: &str) -> Self::Future {
        let (host, port) = split_addr(addr);
        Box::pin(async move { turmoil::net::TcpStream::connect((host.as_str(), port)).await })
    }
}

fn split_addr(addr: &str) -> (String, u16) {
    match addr.rsplit_once(':') {
        Some((host, port)) => (host.to_owned(), port.parse().unwrap_or(PORT)),
        None => (addr.to_owned(), PORT),
    }
}

/// `name -> name:4700` for every replica in the cluster.
#[must_use]
pub fn replica_addrs(cluster: &[&str]) -> BTreeMap<ReplicaId, String> {
    cluster
        .iter()
        .map(|name| (ReplicaId::from(*name), format!("{name}:{PORT}")))
        .collect()
}

/// Register a replica host with the simulation.
pub fn start_replica(
    sim: &mut turmoil::Sim<'_>,
    name: &'static str,
    cluster: &'static [&'static str],
) {
    sim.host(name, move || async move {
        let peers: BTreeMap<ReplicaId, String> = cluster
            .iter()
            .filter(|peer| **peer != name)
            .map(|peer| (ReplicaId::from(*peer), format!("{peer}:{PORT}")))
            .collect();
        let config = ReplicaConfig::new(ReplicaId::from(name), format!("0.0.0.0:{PORT}"), peers);

        let listener = turmoil::net::TcpListener::bind((Ipv4Addr::UNSPECIFIED, PORT)).await?;
        let node = start_node(config, &TurmoilConnector);

        loop {
            let (stream, _) = listener.accept().await?;
            let replica = node.replica.clone();
            let engine = node.engine.clone();
            tokio::spawn(async move {
                let _ = serve_connection(stream, replica, engine).await;
            });
        }
    });
}

/// Build a client talking to `cluster`. Must run inside a simulation
/// client context.
#[must_use]
pub fn connect_client(cluster: &[&str]) -> StockClient {
    let id = ClientId::random();
    let backend = Backend::spawn(
        id,
        replica_addrs(cluster),
        &TurmoilConnector,
        &ElectorConfig::default(),
    );
    StockClient::new(id, backend)
}
