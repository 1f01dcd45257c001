use bytes::Bytes;
use itertools::Itertools;
use std::time::{SystemTime, UNIX_EPOCH};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time::{sleep, timeout, Instant};
use tracing::{debug, trace, warn};

use crate::config::{Backpressure, ConnectionConfig};
use crate::frame::{self, FrameDecoder};
use crate::key::composite;
use crate::message::{Code, Message};
use crate::pack::{bytes_to_int, Pack};
use crate::record::{Pair, ZRecord};

/// Page size used when walking a whole hash.
const HKEYS_PAGE: i64 = 100;

/// A persistent connection to one storage node.
///
/// The connection dials lazily, reaps itself when idle and reconnects at a bounded rate. Every
/// method takes `&mut self`, so a request and its reply can never interleave with another caller's
/// request: sharing a connection means wrapping it in a lock and holding the guard for the whole
/// call.
///
/// Network failures are never reported as errors. They close the socket and surface as the
/// zero value of the call (`None`, `false`, `0` or an empty list); the next call reconnects.
pub struct Connection {
    addr: String,
    config: ConnectionConfig,
    stream: Option<TcpStream>,
    last_activity: Instant,
    last_attempt: Option<Instant>,
    // Fire-and-forget frames written since the last read.
    unanswered: usize,
    decoder: FrameDecoder,
    // Data is read from the socket into this buffer and then fed to the decoder.
    buffer: Vec<u8>,
}

impl Connection {
    pub fn new(addr: impl Into<String>, config: ConnectionConfig) -> Connection {
        Connection {
            addr: addr.into(),
            buffer: vec![0; config.read_buffer_size.max(1)],
            config,
            stream: None,
            last_activity: Instant::now(),
            last_attempt: None,
            unanswered: 0,
            decoder: FrameDecoder::new(),
        }
    }

    pub fn addr(&self) -> &str {
        &self.addr
    }

    pub fn is_connected(&self) -> bool {
        self.stream.is_some()
    }

    /// Applies the liveness policy and reports whether a usable socket exists afterwards.
    ///
    /// An idle socket is closed; a missing one is redialed unless the last attempt was too recent.
    pub async fn keep_alive(&mut self) -> bool {
        if self.stream.is_some() && self.last_activity.elapsed() > self.config.idle_timeout {
            trace!(addr = %self.addr, "closing idle connection");
            self.close();
        }

        let may_retry = self
            .last_attempt
            .map_or(true, |at| at.elapsed() > self.config.retry_interval);

        if self.stream.is_none() && may_retry {
            self.connect().await;
        }

        self.stream.is_some()
    }

    async fn connect(&mut self) {
        trace!(addr = %self.addr, "connecting");

        let now = Instant::now();
        self.last_attempt = Some(now);
        self.last_activity = now;
        self.unanswered = 0;
        self.decoder.reset();

        match timeout(self.config.connect_timeout, TcpStream::connect(&self.addr)).await {
            Ok(Ok(stream)) => {
                let _ = stream.set_nodelay(true);
                self.stream = Some(stream);
            }
            Ok(Err(e)) => debug!(addr = %self.addr, error = %e, "connect failed"),
            Err(_) => debug!(addr = %self.addr, "connect timed out"),
        }
    }

    pub fn close(&mut self) {
        if self.stream.take().is_some() {
            trace!(addr = %self.addr, "connection closed");
        }
        self.unanswered = 0;
        self.decoder.reset();
    }

    /// Writes one message, forcing a NOP round trip first if too many writes went unanswered.
    async fn send(&mut self, msg: &Message) -> bool {
        if self.unanswered >= self.config.nop_after {
            self.nop().await;
        }

        self.write(msg).await
    }

    async fn write(&mut self, msg: &Message) -> bool {
        let frame = frame::encode(&msg.to_bytes());

        // One retry, over a fresh connection if the retry interval allows one.
        for _ in 0..2 {
            if !self.keep_alive().await {
                continue;
            }

            let Some(stream) = self.stream.as_mut() else {
                continue;
            };

            match stream.write(&frame).await {
                Ok(n) if n == frame.len() => {
                    self.last_activity = Instant::now();
                    self.unanswered += 1;
                    return true;
                }
                Ok(n) => {
                    warn!(addr = %self.addr, written = n, len = frame.len(), "output buffer full");
                    if self.config.backpressure == Backpressure::Wait {
                        sleep(self.config.backpressure_pause).await;
                    }
                }
                Err(e) => debug!(addr = %self.addr, error = %e, "write failed"),
            }

            self.close();
        }

        false
    }

    /// Waits for the reply to the request just written.
    ///
    /// Only the last complete frame of a read is used; with one request in flight there is never
    /// more than one. Gives up after a bounded number of reads.
    pub async fn read(&mut self) -> Option<Message> {
        self.unanswered = 0;

        let stream = self.stream.as_mut()?;

        for _ in 0..self.config.read_attempts {
            let n = match timeout(self.config.read_timeout, stream.read(&mut self.buffer)).await {
                Ok(Ok(0)) => {
                    debug!(addr = %self.addr, "connection closed by peer");
                    break;
                }
                Ok(Ok(n)) => n,
                Ok(Err(e)) => {
                    debug!(addr = %self.addr, error = %e, "read failed");
                    break;
                }
                Err(_) => {
                    debug!(addr = %self.addr, "read timed out");
                    break;
                }
            };

            let payload = match self.decoder.feed(&self.buffer[..n]) {
                Ok(mut frames) => frames.pop(),
                Err(e) => {
                    debug!(addr = %self.addr, error = %e, "malformed frame");
                    break;
                }
            };
            let Some(payload) = payload else {
                continue;
            };

            match Message::from_bytes(payload) {
                Ok(msg) => {
                    self.last_activity = Instant::now();
                    return Some(msg);
                }
                Err(e) => {
                    debug!(addr = %self.addr, error = %e, "malformed reply");
                    break;
                }
            }
        }

        self.close();
        None
    }

    /// Sends `msg` and, when `sync` is set, waits for the reply.
    async fn exchange(&mut self, msg: Message, sync: bool) -> Option<Message> {
        self.send(&msg).await;

        if sync {
            self.read().await
        } else {
            None
        }
    }

    async fn call(&mut self, msg: Message) -> Option<Message> {
        self.exchange(msg, true).await
    }

    /// Round trip that keeps the connection honest: bounds unread replies and detects dead peers.
    pub async fn nop(&mut self) -> bool {
        self.unanswered = 0;

        self.write(&Message::new(Code::CNop)).await && self.read().await.is_some()
    }

    /// Sends a pre-built message without waiting for a reply.
    pub async fn forward(&mut self, msg: &Message) -> bool {
        self.send(msg).await
    }

    /// Sends a pre-built message and waits for its reply.
    pub async fn round_trip(&mut self, msg: &Message) -> Option<Message> {
        self.send(msg).await;
        self.read().await
    }

    pub async fn send_raw(
        &mut self,
        code: Code,
        key: &[u8],
        subkey: Option<&[u8]>,
        value: Bytes,
    ) -> bool {
        let msg = Message::new(code)
            .key(composite(key, subkey))
            .value(value);

        self.send(&msg).await
    }

    pub async fn call_raw(
        &mut self,
        code: Code,
        key: &[u8],
        subkey: Option<&[u8]>,
        value: Bytes,
    ) -> Option<Message> {
        let msg = Message::new(code)
            .key(composite(key, subkey))
            .value(value);

        self.call(msg).await
    }

    /// Ships one replication entry. The key is passed through as is; an empty value means delete.
    pub async fn log(&mut self, key: Bytes, value: Option<Bytes>, counter: i32) -> bool {
        let msg = Message::new(Code::Log)
            .key(key)
            .value(value.unwrap_or_default())
            .counter(counter);

        self.send(&msg).await
    }

    pub async fn set(&mut self, key: &[u8], subkey: Option<&[u8]>, value: impl Pack, sync: bool) {
        let msg = Message::new(Code::CSet)
            .key(composite(key, subkey))
            .value(value.pack())
            .sync(sync);

        self.exchange(msg, sync).await;
    }

    /// Stores `value` if it is greater than the current integer. Returns the resulting integer
    /// when `sync` is set, otherwise 0.
    pub async fn set_if_more(
        &mut self,
        key: &[u8],
        subkey: Option<&[u8]>,
        value: i64,
        sync: bool,
    ) -> i64 {
        self.integer_op(Code::CSetIfMore, key, subkey, value, sync)
            .await
    }

    pub async fn bit_and(&mut self, key: &[u8], subkey: Option<&[u8]>, value: i64, sync: bool) -> i64 {
        self.integer_op(Code::CBitAnd, key, subkey, value, sync).await
    }

    pub async fn bit_and_not(
        &mut self,
        key: &[u8],
        subkey: Option<&[u8]>,
        value: i64,
        sync: bool,
    ) -> i64 {
        self.integer_op(Code::CBitAndNot, key, subkey, value, sync)
            .await
    }

    pub async fn bit_or(&mut self, key: &[u8], subkey: Option<&[u8]>, value: i64, sync: bool) -> i64 {
        self.integer_op(Code::CBitOr, key, subkey, value, sync).await
    }

    pub async fn bit_xor(&mut self, key: &[u8], subkey: Option<&[u8]>, value: i64, sync: bool) -> i64 {
        self.integer_op(Code::CBitXor, key, subkey, value, sync).await
    }

    async fn integer_op(
        &mut self,
        code: Code,
        key: &[u8],
        subkey: Option<&[u8]>,
        value: i64,
        sync: bool,
    ) -> i64 {
        let msg = Message::new(code)
            .key(composite(key, subkey))
            .ivalue(value)
            .sync(sync);

        self.exchange(msg, sync)
            .await
            .map_or(0, |reply| reply.ivalue)
    }

    /// Stores `value` only if the key is absent. Returns whether it was stored when `sync` is
    /// set; an unconfirmed request reports `true`.
    pub async fn set_nx(&mut self, key: &[u8], subkey: Option<&[u8]>, value: impl Pack, sync: bool) -> bool {
        let msg = Message::new(Code::CSetNx)
            .key(composite(key, subkey))
            .value(value.pack())
            .sync(sync);

        if !sync {
            self.exchange(msg, false).await;
            return true;
        }

        self.call(msg)
            .await
            .and_then(|reply| reply.value.first().copied())
            .is_some_and(|stored| stored != 0)
    }

    /// Deletes the key. With `sync`, reports whether it existed.
    pub async fn del(&mut self, key: &[u8], subkey: Option<&[u8]>, sync: bool) -> bool {
        let msg = Message::new(Code::CDel)
            .key(composite(key, subkey))
            .sync(sync);

        match self.exchange(msg, sync).await {
            Some(reply) => reply.ivalue != 0,
            None => !sync,
        }
    }

    /// Adds `value` (ignored unless positive). Returns the new counter with `sync`, else `value`.
    pub async fn inc(&mut self, key: &[u8], subkey: Option<&[u8]>, value: i64, sync: bool) -> i64 {
        self.counter_op(Code::CInc, key, subkey, value, sync).await
    }

    /// Subtracts `value` (ignored unless positive), clamping at zero.
    pub async fn dec(&mut self, key: &[u8], subkey: Option<&[u8]>, value: i64, sync: bool) -> i64 {
        self.counter_op(Code::CDec, key, subkey, value, sync).await
    }

    async fn counter_op(
        &mut self,
        code: Code,
        key: &[u8],
        subkey: Option<&[u8]>,
        value: i64,
        sync: bool,
    ) -> i64 {
        if !sync {
            self.integer_op(code, key, subkey, value, false).await;
            return value;
        }

        self.integer_op(code, key, subkey, value, true).await
    }

    pub async fn get(&mut self, key: &[u8], subkey: Option<&[u8]>) -> Option<Bytes> {
        let msg = Message::new(Code::CGet).key(composite(key, subkey));

        self.call(msg).await?.non_empty_value()
    }

    pub async fn get_int(&mut self, key: &[u8], subkey: Option<&[u8]>) -> i64 {
        let msg = Message::new(Code::CGetInt).key(composite(key, subkey));

        self.call(msg).await.map_or(0, |reply| reply.ivalue)
    }

    pub async fn has(&mut self, key: &[u8], subkey: Option<&[u8]>) -> bool {
        let msg = Message::new(Code::CHas).key(composite(key, subkey));

        self.call(msg).await.is_some_and(|reply| reply.ivalue != 0)
    }

    /// Appends `value` to a sequence. Members are keyed by insertion time, so key order is
    /// insertion order.
    pub async fn seq_add(&mut self, seq: &[u8], value: impl Pack, sync: bool) {
        let subkey = (unix_nanos(), value).pack();
        self.set(seq, Some(&subkey), [1u8], sync).await;
    }

    pub async fn hkill(&mut self, key: &[u8], sync: bool) {
        self.kill(Code::CHKill, key, sync).await;
    }

    pub async fn seq_kill(&mut self, seq: &[u8], sync: bool) {
        self.hkill(seq, sync).await;
    }

    pub async fn zkill(&mut self, key: &[u8], sync: bool) {
        self.kill(Code::CZKill, key, sync).await;
    }

    async fn kill(&mut self, code: Code, key: &[u8], sync: bool) {
        let msg = Message::new(code).key(composite(key, None)).sync(sync);

        self.exchange(msg, sync).await;
    }

    /// Number of keys stored on the node.
    pub async fn key_total(&mut self) -> i64 {
        self.call(Message::new(Code::CKeyTotal))
            .await
            .map_or(0, |reply| reply.ivalue)
    }

    pub async fn hsize(&mut self, key: &[u8]) -> i64 {
        let msg = Message::new(Code::CHSize).key(composite(key, None));

        self.call(msg).await.map_or(0, |reply| reply.ivalue)
    }

    pub async fn seq_size(&mut self, seq: &[u8]) -> i64 {
        self.hsize(seq).await
    }

    /// One page of hash members in key order: skip `offset` members, return at most `limit`.
    pub async fn hkeys(&mut self, key: &[u8], limit: i64, offset: i64) -> Vec<Bytes> {
        let msg = Message::new(Code::CHKeys)
            .key(composite(key, None))
            .value((limit, offset).pack());

        self.call(msg).await.map(|reply| reply.list).unwrap_or_default()
    }

    /// Every hash member, fetched page by page.
    pub async fn hkeys_all(&mut self, key: &[u8]) -> Vec<Bytes> {
        let mut members = Vec::new();
        let mut offset = 0;

        loop {
            let page = self.hkeys(key, HKEYS_PAGE, offset).await;
            let full = page.len() as i64 == HKEYS_PAGE;
            members.extend(page);

            if !full {
                break;
            }
            offset += HKEYS_PAGE;
        }

        members
    }

    pub async fn hall(&mut self, key: &[u8]) -> Vec<Pair> {
        let msg = Message::new(Code::CHAll).key(composite(key, None));

        let list = self.call(msg).await.map(|reply| reply.list).unwrap_or_default();
        if list.len() % 2 != 0 {
            return Vec::new();
        }

        list.into_iter()
            .tuples()
            .map(|(key, value)| Pair { key, value })
            .collect()
    }

    /// A random sample of at most `limit` hash members.
    pub async fn hkeys_rand(&mut self, key: &[u8], limit: i64) -> Vec<Bytes> {
        let msg = Message::new(Code::CHKeysRand)
            .key(composite(key, None))
            .value(limit.pack());

        self.call(msg).await.map(|reply| reply.list).unwrap_or_default()
    }

    /// Sequence values in insertion order, paginated like [`Connection::hkeys`].
    pub async fn seq_range(&mut self, seq: &[u8], limit: i64, offset: i64) -> Vec<Bytes> {
        self.hkeys(seq, limit, offset)
            .await
            .into_iter()
            .filter(|member| member.len() > 8)
            .map(|member| member.slice(8..))
            .collect()
    }

    /// Members scored within `[min, max]`, highest score first, paginated.
    pub async fn zrange(
        &mut self,
        key: &[u8],
        limit: i64,
        offset: i64,
        min: i64,
        max: i64,
    ) -> Vec<ZRecord> {
        let msg = Message::new(Code::CZRange)
            .key(composite(key, None))
            .value((limit, offset, min, max).pack());

        let list = self.call(msg).await.map(|reply| reply.list).unwrap_or_default();
        if list.len() % 2 != 0 {
            return Vec::new();
        }

        list.into_iter()
            .tuples()
            .map(|(key, score)| ZRecord::new(key, bytes_to_int(&score)))
            .collect()
    }

    pub async fn zrange_size(&mut self, key: &[u8], min: i64, max: i64) -> i64 {
        let msg = Message::new(Code::CZRangeSize)
            .key(composite(key, None))
            .value((min, max).pack());

        self.call(msg).await.map_or(0, |reply| reply.ivalue)
    }
}

fn unix_nanos() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_nanos() as i64)
        .unwrap_or_default()
}
