use bytes::Bytes;
use std::collections::HashMap;
use std::future::Future;
use std::path::Path;
use std::sync::Arc;
use thiserror::Error as ThisError;
use tokio::sync::{Mutex, MutexGuard};
use tracing::{debug, warn};

use crate::commands::CommandError;
use crate::config::{self, ProxyConfig};
use crate::connection::Connection;
use crate::key;
use crate::message::{Code, Message};
use crate::pack::Pack;
use crate::record::{Pair, ZRecord};
use crate::ring::{Partitioner, Ring};
use crate::server::Handler;
use crate::Error;

#[derive(Debug, ThisError, PartialEq)]
pub enum ProxyError {
    #[error("proxy needs at least one node")]
    Empty,
    #[error("partitioner has {slots} slots for {nodes} nodes")]
    SlotMismatch { nodes: usize, slots: usize },
    #[error("message key carries no primary key")]
    MissingKey,
}

/// Routes logical operations to the node owning each key.
///
/// Every node has one [`Connection`] behind its own lock, held for a whole request/response pair.
/// Writes go to the owner only. Reads fall back to the next node on the ring when the owner is
/// unreachable and `quorum` is enabled; the fallback node may not hold the data.
pub struct Proxy<P: Partitioner = Ring> {
    nodes: Vec<Mutex<Connection>>,
    partitioner: P,
    quorum: bool,
}

impl Proxy<Ring> {
    pub fn new<S: Into<String>>(
        addrs: impl IntoIterator<Item = S>,
        config: ProxyConfig,
    ) -> Result<Proxy<Ring>, ProxyError> {
        let addrs: Vec<String> = addrs.into_iter().map(Into::into).collect();
        let ring = Ring::new(addrs.len());

        Proxy::with_partitioner(addrs, ring, config)
    }
}

impl<P: Partitioner> Proxy<P> {
    pub fn with_partitioner(
        addrs: Vec<String>,
        partitioner: P,
        config: ProxyConfig,
    ) -> Result<Proxy<P>, ProxyError> {
        if addrs.is_empty() {
            return Err(ProxyError::Empty);
        }
        if partitioner.len() != addrs.len() {
            return Err(ProxyError::SlotMismatch {
                nodes: addrs.len(),
                slots: partitioner.len(),
            });
        }

        let nodes = addrs
            .into_iter()
            .map(|addr| Mutex::new(Connection::new(addr, config.connection.clone())))
            .collect();

        Ok(Proxy {
            nodes,
            partitioner,
            quorum: config.quorum,
        })
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Index of the node owning the primary key `key`.
    ///
    /// Only the stored part of an oversized key is hashed, so a relayed request lands on the same
    /// node as a direct one.
    pub fn owner_of(&self, key: &[u8]) -> usize {
        self.partitioner.get(key::route_key(key))
    }

    async fn writer(&self, key: &[u8]) -> MutexGuard<'_, Connection> {
        self.nodes[self.owner_of(key)].lock().await
    }

    /// The connection a read for `key` should use, if any.
    async fn reader(&self, key: &[u8]) -> Option<MutexGuard<'_, Connection>> {
        let index = self.owner_of(key);
        let mut conn = self.nodes[index].lock().await;

        if conn.keep_alive().await {
            return Some(conn);
        }
        drop(conn);

        if !self.quorum {
            return None;
        }

        let next = self.partitioner.next(index);
        debug!(owner = index, fallback = next, "owner unreachable, reading from next node");

        Some(self.nodes[next].lock().await)
    }

    pub async fn set(&self, key: &[u8], subkey: Option<&[u8]>, value: impl Pack, sync: bool) {
        self.writer(key).await.set(key, subkey, value, sync).await
    }

    pub async fn set_if_more(&self, key: &[u8], subkey: Option<&[u8]>, value: i64, sync: bool) -> i64 {
        self.writer(key)
            .await
            .set_if_more(key, subkey, value, sync)
            .await
    }

    pub async fn bit_and(&self, key: &[u8], subkey: Option<&[u8]>, value: i64, sync: bool) -> i64 {
        self.writer(key).await.bit_and(key, subkey, value, sync).await
    }

    pub async fn bit_and_not(&self, key: &[u8], subkey: Option<&[u8]>, value: i64, sync: bool) -> i64 {
        self.writer(key)
            .await
            .bit_and_not(key, subkey, value, sync)
            .await
    }

    pub async fn bit_or(&self, key: &[u8], subkey: Option<&[u8]>, value: i64, sync: bool) -> i64 {
        self.writer(key).await.bit_or(key, subkey, value, sync).await
    }

    pub async fn bit_xor(&self, key: &[u8], subkey: Option<&[u8]>, value: i64, sync: bool) -> i64 {
        self.writer(key).await.bit_xor(key, subkey, value, sync).await
    }

    pub async fn set_nx(&self, key: &[u8], subkey: Option<&[u8]>, value: impl Pack, sync: bool) -> bool {
        self.writer(key).await.set_nx(key, subkey, value, sync).await
    }

    pub async fn del(&self, key: &[u8], subkey: Option<&[u8]>, sync: bool) -> bool {
        self.writer(key).await.del(key, subkey, sync).await
    }

    pub async fn inc(&self, key: &[u8], subkey: Option<&[u8]>, value: i64, sync: bool) -> i64 {
        self.writer(key).await.inc(key, subkey, value, sync).await
    }

    pub async fn dec(&self, key: &[u8], subkey: Option<&[u8]>, value: i64, sync: bool) -> i64 {
        self.writer(key).await.dec(key, subkey, value, sync).await
    }

    pub async fn seq_add(&self, seq: &[u8], value: impl Pack, sync: bool) {
        self.writer(seq).await.seq_add(seq, value, sync).await
    }

    pub async fn hkill(&self, key: &[u8], sync: bool) {
        self.writer(key).await.hkill(key, sync).await
    }

    pub async fn seq_kill(&self, seq: &[u8], sync: bool) {
        self.writer(seq).await.seq_kill(seq, sync).await
    }

    pub async fn zkill(&self, key: &[u8], sync: bool) {
        self.writer(key).await.zkill(key, sync).await
    }

    pub async fn get(&self, key: &[u8], subkey: Option<&[u8]>) -> Option<Bytes> {
        self.reader(key).await?.get(key, subkey).await
    }

    pub async fn get_int(&self, key: &[u8], subkey: Option<&[u8]>) -> i64 {
        match self.reader(key).await {
            Some(mut conn) => conn.get_int(key, subkey).await,
            None => 0,
        }
    }

    pub async fn has(&self, key: &[u8], subkey: Option<&[u8]>) -> bool {
        match self.reader(key).await {
            Some(mut conn) => conn.has(key, subkey).await,
            None => false,
        }
    }

    pub async fn hkeys_all(&self, key: &[u8]) -> Vec<Bytes> {
        match self.reader(key).await {
            Some(mut conn) => conn.hkeys_all(key).await,
            None => Vec::new(),
        }
    }

    pub async fn hall(&self, key: &[u8]) -> Vec<Pair> {
        match self.reader(key).await {
            Some(mut conn) => conn.hall(key).await,
            None => Vec::new(),
        }
    }

    pub async fn hkeys(&self, key: &[u8], limit: i64, offset: i64) -> Vec<Bytes> {
        match self.reader(key).await {
            Some(mut conn) => conn.hkeys(key, limit, offset).await,
            None => Vec::new(),
        }
    }

    pub async fn hkeys_rand(&self, key: &[u8], limit: i64) -> Vec<Bytes> {
        match self.reader(key).await {
            Some(mut conn) => conn.hkeys_rand(key, limit).await,
            None => Vec::new(),
        }
    }

    pub async fn hsize(&self, key: &[u8]) -> i64 {
        match self.reader(key).await {
            Some(mut conn) => conn.hsize(key).await,
            None => 0,
        }
    }

    pub async fn seq_range(&self, seq: &[u8], limit: i64, offset: i64) -> Vec<Bytes> {
        match self.reader(seq).await {
            Some(mut conn) => conn.seq_range(seq, limit, offset).await,
            None => Vec::new(),
        }
    }

    pub async fn seq_size(&self, seq: &[u8]) -> i64 {
        match self.reader(seq).await {
            Some(mut conn) => conn.seq_size(seq).await,
            None => 0,
        }
    }

    pub async fn zrange(&self, key: &[u8], limit: i64, offset: i64, min: i64, max: i64) -> Vec<ZRecord> {
        match self.reader(key).await {
            Some(mut conn) => conn.zrange(key, limit, offset, min, max).await,
            None => Vec::new(),
        }
    }

    pub async fn zrange_size(&self, key: &[u8], min: i64, max: i64) -> i64 {
        match self.reader(key).await {
            Some(mut conn) => conn.zrange_size(key, min, max).await,
            None => 0,
        }
    }

    /// Key count of node `index`. Not routed by key.
    pub async fn key_total(&self, index: usize) -> i64 {
        let Some(node) = self.nodes.get(index) else {
            warn!(index, nodes = self.nodes.len(), "no such node");
            return 0;
        };

        node.lock().await.key_total().await
    }

    /// Whether every node answers a NOP. Stops at the first node that does not.
    pub async fn status(&self) -> bool {
        for (index, node) in self.nodes.iter().enumerate() {
            let mut conn = node.lock().await;

            if !(conn.nop().await && conn.keep_alive().await) {
                debug!(index, addr = conn.addr(), "node is down");
                return false;
            }
        }

        true
    }

    /// Passes a pre-built message to the node owning its composite key.
    ///
    /// Requests that get no reply are sent fire-and-forget and yield `None`. Otherwise the node's
    /// reply is relayed; a node that gave none yields an empty reply carrying the request key.
    /// NOPs are answered by the proxy itself.
    pub async fn relay(&self, msg: &Message) -> Result<Option<Message>, ProxyError> {
        if msg.code == Code::CNop as i32 {
            return Ok(Some(Message::with_value(Bytes::from_static(&[1]))));
        }

        let primary = key::primary(&msg.key).ok_or(ProxyError::MissingKey)?;
        let mut conn = self.writer(primary).await;

        let expects_reply = Code::try_from(msg.code).map_or(true, |code| code.expects_reply(msg.sync));
        if !expects_reply {
            conn.forward(msg).await;
            return Ok(None);
        }

        let reply = conn
            .round_trip(msg)
            .await
            .unwrap_or_else(|| Message::new(Code::Resp).key(msg.key.clone()));

        Ok(Some(reply))
    }
}

/// Serves the command protocol by relaying every request through a [`Proxy`].
#[derive(Clone)]
pub struct ProxyHandler {
    proxy: Arc<Proxy>,
}

impl ProxyHandler {
    pub fn new(proxy: Arc<Proxy>) -> ProxyHandler {
        ProxyHandler { proxy }
    }
}

impl Handler for ProxyHandler {
    fn handle(&self, frame: Bytes) -> impl Future<Output = Result<Option<Bytes>, Error>> + Send {
        let proxy = self.proxy.clone();

        async move {
            let msg = Message::from_bytes(frame).map_err(CommandError::Decode)?;
            let reply = proxy.relay(&msg).await?;

            Ok(reply.map(|reply| reply.to_bytes()))
        }
    }
}

/// Independent rings looked up by name.
#[derive(Default)]
pub struct MultiProxy {
    rings: HashMap<String, Proxy>,
}

impl MultiProxy {
    pub fn from_map(
        rings: HashMap<String, Vec<String>>,
        config: ProxyConfig,
    ) -> Result<MultiProxy, ProxyError> {
        let rings = rings
            .into_iter()
            .map(|(name, addrs)| Proxy::new(addrs, config.clone()).map(|proxy| (name, proxy)))
            .collect::<Result<_, ProxyError>>()?;

        Ok(MultiProxy { rings })
    }

    /// Loads the rings from a JSON file, see [`config::load_ring_map`].
    pub fn from_file(path: impl AsRef<Path>, config: ProxyConfig) -> Result<MultiProxy, Error> {
        let rings = config::load_ring_map(path)?;

        Ok(MultiProxy::from_map(rings, config)?)
    }

    pub fn get(&self, name: &str) -> Option<&Proxy> {
        self.rings.get(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.rings.keys().map(String::as_str)
    }
}
