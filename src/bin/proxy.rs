use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;

use shardkv::config::{self, ProxyConfig, ServerConfig};
use shardkv::proxy::{Proxy, ProxyHandler};
use shardkv::{server, Error};

const ADDR: &str = "127.0.0.1:7000";

#[derive(Parser, Debug)]
struct Args {
    /// Address to listen on
    #[arg(short, long, env = "SHARDKV_LISTEN", default_value = ADDR)]
    listen: String,

    /// Storage nodes in ring order, repeated or comma separated
    #[arg(
        short,
        long = "node",
        value_delimiter = ',',
        required_unless_present = "nodes_file"
    )]
    nodes: Vec<String>,

    /// File listing the storage nodes, one per line
    #[arg(short = 'f', long, env = "SHARDKV_NODES", conflicts_with = "nodes")]
    nodes_file: Option<PathBuf>,

    /// Serve reads from the next node when a key's owner is unreachable
    #[arg(short, long)]
    quorum: bool,
}

#[tokio::main]
async fn main() -> Result<(), Error> {
    let args = Args::parse();

    let nodes = match args.nodes_file {
        Some(path) => config::load_node_list(path)?,
        None => args.nodes,
    };

    let proxy = Proxy::new(
        nodes,
        ProxyConfig {
            quorum: args.quorum,
            ..Default::default()
        },
    )?;

    server::run(ServerConfig::new(args.listen), ProxyHandler::new(Arc::new(proxy))).await
}
