pub mod codec;
pub mod commands;
pub mod config;
pub mod connection;
pub mod engine;
pub mod frame;
pub mod key;
pub mod message;
pub mod pack;
pub mod pool;
pub mod proxy;
pub mod record;
pub mod replication;
pub mod ring;
pub mod server;
pub mod store;

pub type Error = Box<dyn std::error::Error + Send + Sync>;
pub type Result<T> = std::result::Result<T, Error>;
