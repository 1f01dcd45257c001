use clap::Parser;
use std::time::Duration;

use shardkv::config::{Backpressure, ConnectionConfig, ServerConfig};
use shardkv::engine::Engine;
use shardkv::replication::{self, Replicator};
use shardkv::store::Store;
use shardkv::{server, Error};

const ADDR: &str = "127.0.0.1:7001";

#[derive(Parser, Debug)]
struct Args {
    /// Address to listen on
    #[arg(short, long, env = "SHARDKV_LISTEN", default_value = ADDR)]
    listen: String,

    /// Node that receives a copy of every write
    #[arg(short, long, env = "SHARDKV_REPLICA")]
    replica: Option<String>,

    /// Seconds a client may stay silent before it is disconnected
    #[arg(long, default_value_t = 60)]
    idle_timeout: u64,

    /// What the replication link does when the replica stops draining its socket
    #[arg(long, value_enum, default_value_t = Backpressure::Wait)]
    backpressure: Backpressure,

    /// Writes buffered for the replica before new ones are dropped
    #[arg(long, default_value_t = replication::QUEUE_CAPACITY)]
    replication_queue: usize,
}

#[tokio::main]
async fn main() -> Result<(), Error> {
    let args = Args::parse();

    let replicator = match args.replica {
        Some(addr) => {
            let config = ConnectionConfig {
                backpressure: args.backpressure,
                ..Default::default()
            };
            Replicator::spawn(addr, config, args.replication_queue)
        }
        None => Replicator::disabled(),
    };

    let config = ServerConfig {
        idle_timeout: Duration::from_secs(args.idle_timeout),
        ..ServerConfig::new(args.listen)
    };

    server::run(config, Engine::new(Store::memory(), replicator)).await
}
