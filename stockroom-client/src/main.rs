//! Stockroom client REPL binary.

use clap::Parser;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tracing::info;

use stockroom_client::api::StockClient;
use stockroom_client::backend::Backend;
use stockroom_client::elector::ElectorConfig;
use stockroom_client::repl::Repl;
use stockroom_core::net::parse_replica_addr;
use stockroom_core::{ClientId, ReplicaId, TcpConnector};

/// Interactive stockroom client.
#[derive(Parser, Debug)]
#[command(name = "stockroom")]
#[command(about = "Interactive client for a stockroom cluster")]
struct Args {
    /// A replica, as name=host:port. Repeat for each replica.
    #[arg(
        short,
        long = "server",
        value_name = "NAME=ADDR",
        value_parser = parse_replica_addr,
        required = true
    )]
    servers: Vec<(ReplicaId, String)>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .init();

    let args = Args::parse();
    let id = ClientId::random();
    info!(client = %id, servers = args.servers.len(), "starting backend");

    let backend = Backend::spawn(
        id,
        args.servers.into_iter().collect(),
        &TcpConnector,
        &ElectorConfig::default(),
    );
    let mut repl = Repl::new(StockClient::new(id, backend));

    let mut stdout = tokio::io::stdout();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        stdout.write_all(b"stockroom> ").await?;
        stdout.flush().await?;
        let Some(line) = lines.next_line().await? else {
            break;
        };
        match repl.execute(&line).await {
            Ok(output) => {
                if !output.is_empty() {
                    stdout.write_all(output.as_bytes()).await?;
                    stdout.write_all(b"\n").await?;
                }
            }
            Err(e) if e == "exit" => break,
            Err(e) => {
                stdout.write_all(b"error: ").await?;
                stdout.write_all(e.as_bytes()).await?;
                stdout.write_all(b"\n").await?;
            }
        }
    }

    Ok(())
}
