//! Stockroom replica server binary.

use clap::Parser;
use tokio::net::TcpListener;
use tracing::{debug, error, info};

use stockroom_core::net::parse_replica_addr;
use stockroom_core::{ReplicaId, TcpConnector};
use stockroom_server::config::ReplicaConfig;
use stockroom_server::node::{Node, start_node};
use stockroom_server::serve::serve_connection;

/// Run a stockroom replica.
#[derive(Parser, Debug)]
#[command(name = "stockroom-server")]
#[command(about = "Run a stockroom replica")]
struct Args {
    /// Name of this replica. Clients rank replicas lexicographically by
    /// name when electing a leader.
    #[arg(short, long)]
    name: String,

    /// Bind address for client and peer connections.
    #[arg(short, long, default_value = "0.0.0.0:4700")]
    listen: String,

    /// Another replica, as name=host:port. Repeat for each peer.
    #[arg(short, long = "peer", value_name = "NAME=ADDR", value_parser = parse_replica_addr)]
    peers: Vec<(ReplicaId, String)>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();
    let config = ReplicaConfig::new(ReplicaId::from(args.name.as_str()), args.listen, args.peers);

    let listener = TcpListener::bind(&config.listen).await?;
    info!(name = %config.name, listen = %config.listen, peers = config.peers.len(), "replica listening");

    let Node {
        replica,
        engine,
        mut replica_task,
        ..
    } = start_node(config, &TcpConnector);

    loop {
        tokio::select! {
            accepted = listener.accept() => {
                let (stream, addr) = accepted?;
                debug!(%addr, "incoming connection");
                let replica = replica.clone();
                let engine = engine.clone();
                tokio::spawn(async move {
                    if let Err(error) = serve_connection(stream, replica, engine).await {
                        debug!(%error, "connection closed with error");
                    }
                });
            }
            result = &mut replica_task => {
                // The replica only stops early when its consensus engine
                // died. Exit so clients fail over to the other replicas.
                match result {
                    Ok(Ok(())) => info!("replica stopped"),
                    Ok(Err(e)) => error!(error = %e, "replica lost its consensus engine"),
                    Err(e) => error!(error = %e, "replica task panicked"),
                }
                return Err("replica stopped".into());
            }
        }
    }
}
