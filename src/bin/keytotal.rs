use clap::{CommandFactory, Parser};
use std::path::PathBuf;

use shardkv::config::{self, ProxyConfig};
use shardkv::proxy::Proxy;
use shardkv::Error;

/// Prints the number of keys stored on one node of a cluster.
#[derive(Parser, Debug)]
struct Args {
    /// File listing the storage nodes, one per line or as a JSON array
    #[arg(env = "SHARDKV_NODES")]
    nodes_file: PathBuf,

    /// Position of the node in the list, starting at zero
    index: usize,
}

#[tokio::main]
async fn main() -> Result<(), Error> {
    let args = Args::parse();
    let _ = tracing_subscriber::fmt().with_writer(std::io::stderr).try_init();

    let nodes = config::load_node_list(&args.nodes_file)?;
    if args.index >= nodes.len() {
        Args::command()
            .error(
                clap::error::ErrorKind::InvalidValue,
                format!("index {} is out of range, the cluster has {} nodes", args.index, nodes.len()),
            )
            .exit();
    }

    let proxy = Proxy::new(nodes, ProxyConfig::default())?;

    println!("{}", proxy.key_total(args.index).await);

    Ok(())
}
