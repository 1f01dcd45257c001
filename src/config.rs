use std::collections::HashMap;
use std::fs;
use std::path::Path;
use std::time::Duration;

use clap::ValueEnum;

use crate::Error;

/// What a node connection does when the kernel accepts only part of a frame.
#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum Backpressure {
    /// Pause before tearing the connection down, giving the peer time to drain.
    Wait,
    /// Tear the connection down immediately.
    Drop,
}

/// Liveness and I/O policy of a single node connection.
#[derive(Clone, Debug)]
pub struct ConnectionConfig {
    /// A connected socket unused for longer than this is closed before the next request.
    pub idle_timeout: Duration,
    /// Minimum time between two connection attempts while disconnected.
    pub retry_interval: Duration,
    pub connect_timeout: Duration,
    /// Bound on a single socket read.
    pub read_timeout: Duration,
    /// Reads performed while waiting for a complete reply before giving up.
    pub read_attempts: usize,
    pub read_buffer_size: usize,
    /// Fire-and-forget sends allowed before a NOP round trip is forced.
    pub nop_after: usize,
    pub backpressure: Backpressure,
    pub backpressure_pause: Duration,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        ConnectionConfig {
            idle_timeout: Duration::from_secs(60),
            retry_interval: Duration::from_secs(5),
            connect_timeout: Duration::from_secs(5),
            read_timeout: Duration::from_secs(60),
            read_attempts: 5,
            read_buffer_size: 40960,
            nop_after: 1000,
            backpressure: Backpressure::Wait,
            backpressure_pause: Duration::from_secs(2),
        }
    }
}

#[derive(Clone, Debug, Default)]
pub struct ProxyConfig {
    /// Retry read-only operations on the next ring node when the owner is unreachable.
    pub quorum: bool,
    pub connection: ConnectionConfig,
}

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub addr: String,
    /// A client that sends nothing for this long is disconnected.
    pub idle_timeout: Duration,
}

impl ServerConfig {
    pub fn new(addr: impl Into<String>) -> ServerConfig {
        ServerConfig {
            addr: addr.into(),
            idle_timeout: Duration::from_secs(60),
        }
    }
}

/// Reads an ordered node list.
///
/// The file is either a JSON array of `host:port` strings or plain text with one address per
/// line, where blank lines and `#` comments are skipped.
pub fn load_node_list(path: impl AsRef<Path>) -> Result<Vec<String>, Error> {
    let path = path.as_ref();
    let contents = fs::read_to_string(path)
        .map_err(|e| format!("read node list {}: {e}", path.display()))?;

    let nodes = if contents.trim_start().starts_with('[') {
        serde_json::from_str::<Vec<String>>(&contents)
            .map_err(|e| format!("parse node list {}: {e}", path.display()))?
    } else {
        parse_node_list(&contents)
    };
    if nodes.is_empty() {
        return Err(format!("node list {} is empty", path.display()).into());
    }

    Ok(nodes)
}

/// Reads named rings from a JSON object mapping each ring name to its node list.
pub fn load_ring_map(path: impl AsRef<Path>) -> Result<HashMap<String, Vec<String>>, Error> {
    let path = path.as_ref();
    let contents = fs::read_to_string(path)
        .map_err(|e| format!("read ring map {}: {e}", path.display()))?;

    let rings = serde_json::from_str(&contents)
        .map_err(|e| format!("parse ring map {}: {e}", path.display()))?;

    Ok(rings)
}

pub fn parse_node_list(contents: &str) -> Vec<String> {
    contents
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(String::from)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn temp_file(contents: &str) -> PathBuf {
        let path = std::env::temp_dir().join(format!("shardkv-{}.conf", uuid::Uuid::new_v4()));
        fs::write(&path, contents).unwrap();
        path
    }

    #[test]
    fn node_list_skips_blanks_and_comments() {
        let nodes = parse_node_list("# cluster\n127.0.0.1:7001\n\n  127.0.0.1:7002  \n#127.0.0.1:7003\n");

        assert_eq!(nodes, vec!["127.0.0.1:7001", "127.0.0.1:7002"]);
    }

    #[test]
    fn missing_node_list() {
        let err = load_node_list("/nonexistent/shardkv/nodes.txt").unwrap_err();

        assert!(err.to_string().contains("read node list"));
    }

    #[test]
    fn node_list_from_text_file() {
        let path = temp_file("127.0.0.1:7001\n# spare\n127.0.0.1:7002\n");

        assert_eq!(
            load_node_list(&path).unwrap(),
            vec!["127.0.0.1:7001", "127.0.0.1:7002"]
        );
        fs::remove_file(path).unwrap();
    }

    #[test]
    fn node_list_from_json_file() {
        let path = temp_file(r#"  ["127.0.0.1:7001", "127.0.0.1:7002", "127.0.0.1:7003"]"#);

        assert_eq!(
            load_node_list(&path).unwrap(),
            vec!["127.0.0.1:7001", "127.0.0.1:7002", "127.0.0.1:7003"]
        );
        fs::remove_file(path).unwrap();
    }

    #[test]
    fn empty_json_node_list() {
        let path = temp_file("[]");

        assert!(load_node_list(&path).unwrap_err().to_string().contains("is empty"));
        fs::remove_file(path).unwrap();
    }

    #[test]
    fn malformed_json_node_list() {
        let path = temp_file(r#"["127.0.0.1:7001","#);

        assert!(load_node_list(&path).unwrap_err().to_string().contains("parse node list"));
        fs::remove_file(path).unwrap();
    }

    #[test]
    fn ring_map_from_json_file() {
        let path = temp_file(r#"{"users": ["127.0.0.1:7001", "127.0.0.1:7002"], "events": ["127.0.0.1:7101"]}"#);

        let rings = load_ring_map(&path).unwrap();
        fs::remove_file(path).unwrap();

        assert_eq!(rings.len(), 2);
        assert_eq!(rings["users"], vec!["127.0.0.1:7001", "127.0.0.1:7002"]);
        assert_eq!(rings["events"], vec!["127.0.0.1:7101"]);
    }

    #[test]
    fn ring_map_must_be_an_object() {
        let path = temp_file(r#"["127.0.0.1:7001"]"#);

        assert!(load_ring_map(&path).unwrap_err().to_string().contains("parse ring map"));
        fs::remove_file(path).unwrap();
    }

    #[test]
    fn defaults() {
        let config = ConnectionConfig::default();

        assert_eq!(config.idle_timeout, Duration::from_secs(60));
        assert_eq!(config.retry_interval, Duration::from_secs(5));
        assert_eq!(config.read_attempts, 5);
        assert!(!ProxyConfig::default().quorum);
    }
}
