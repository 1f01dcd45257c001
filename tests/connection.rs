use bytes::Bytes;
use std::time::{Duration, Instant};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::sync::mpsc::{self, UnboundedReceiver};
use tokio::time::sleep;

use shardkv::config::ConnectionConfig;
use shardkv::connection::Connection;
use shardkv::frame::{self, FrameDecoder};
use shardkv::message::{Code, Message};

/// Starts a scripted node that accepts a single connection.
///
/// Every request is reported on the returned channel. `reply` decides what goes back: a list of
/// chunks written one after another with a short pause in between, so a reply can be split across
/// several socket reads. An empty list writes nothing.
async fn create_node<F>(reply: F) -> Result<(String, UnboundedReceiver<Message>), std::io::Error>
where
    F: Fn(&Message) -> Vec<Vec<u8>> + Send + 'static,
{
    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let local_addr = listener.local_addr()?;

    let (tx, rx) = mpsc::unbounded_channel::<Message>();

    tokio::spawn(async move {
        let Ok((mut socket, _)) = listener.accept().await else {
            return;
        };
        let mut decoder = FrameDecoder::new();
        let mut buf = [0u8; 4096];

        loop {
            let n = match socket.read(&mut buf).await {
                Ok(0) | Err(_) => break,
                Ok(n) => n,
            };

            let Ok(payloads) = decoder.feed(&buf[..n]) else {
                return;
            };

            for payload in payloads {
                let Ok(msg) = Message::from_bytes(payload) else {
                    return;
                };
                let chunks = reply(&msg);
                let _ = tx.send(msg);

                for chunk in chunks {
                    if socket.write_all(&chunk).await.is_err() {
                        return;
                    }
                    sleep(Duration::from_millis(20)).await;
                }
            }
        }
    });

    Ok((local_addr.to_string(), rx))
}

fn config() -> ConnectionConfig {
    ConnectionConfig {
        read_timeout: Duration::from_secs(2),
        ..ConnectionConfig::default()
    }
}

fn framed(msg: Message) -> Vec<u8> {
    frame::encode(&msg.to_bytes()).to_vec()
}

fn resp(ivalue: i64) -> Message {
    Message {
        code: Code::Resp as i32,
        ivalue,
        ..Default::default()
    }
}

#[tokio::test]
async fn test_reply_split_across_reads() {
    let (addr, mut requests) = create_node(|_| {
        let reply = framed(resp(42));
        vec![reply[..3].to_vec(), reply[3..].to_vec()]
    })
    .await
    .unwrap();
    let mut conn = Connection::new(addr, config());

    assert_eq!(conn.get_int(b"counter", None).await, 42);

    let request = requests.recv().await.unwrap();
    assert_eq!(request.code(), Code::CGetInt);
    assert!(conn.is_connected());
}

#[tokio::test]
async fn test_last_frame_of_a_read_wins() {
    let (addr, _requests) = create_node(|_| {
        let mut both = framed(resp(1));
        both.extend(framed(resp(2)));
        vec![both]
    })
    .await
    .unwrap();
    let mut conn = Connection::new(addr, config());

    assert_eq!(conn.get_int(b"counter", None).await, 2);
}

#[tokio::test]
async fn test_value_reply() {
    let (addr, _requests) = create_node(|_| {
        let reply = Message {
            code: Code::Resp as i32,
            value: Bytes::from("hello"),
            ..Default::default()
        };
        vec![framed(reply)]
    })
    .await
    .unwrap();
    let mut conn = Connection::new(addr, config());

    assert_eq!(conn.get(b"greeting", None).await, Some(Bytes::from("hello")));
}

#[tokio::test]
async fn test_malformed_reply_closes_connection() {
    let (addr, _requests) = create_node(|_| vec![frame::encode(&[0xff, 0xff, 0xff]).to_vec()])
        .await
        .unwrap();
    let mut conn = Connection::new(addr, config());

    assert_eq!(conn.get_int(b"counter", None).await, 0);
    assert!(!conn.is_connected());
}

#[tokio::test]
async fn test_negative_length_prefix_fails_fast() {
    let (addr, _requests) = create_node(|_| vec![vec![0xff, 0xff, 0xff, 0xff, 1, 2, 3]])
        .await
        .unwrap();
    let mut conn = Connection::new(addr, config());

    let started = Instant::now();
    assert_eq!(conn.get_int(b"counter", None).await, 0);

    assert!(started.elapsed() < Duration::from_secs(1));
    assert!(!conn.is_connected());
}

#[tokio::test]
async fn test_silent_node_gives_up() {
    let (addr, _requests) = create_node(|_| vec![]).await.unwrap();
    let mut conn = Connection::new(
        addr,
        ConnectionConfig {
            read_timeout: Duration::from_millis(100),
            ..ConnectionConfig::default()
        },
    );

    assert!(!conn.has(b"key", None).await);
    assert!(!conn.is_connected());
}

#[tokio::test]
async fn test_fire_and_forget_writes_force_a_nop() {
    let (addr, mut requests) = create_node(|msg| {
        if msg.code() == Code::CNop {
            vec![framed(resp(0))]
        } else {
            vec![]
        }
    })
    .await
    .unwrap();
    let mut conn = Connection::new(
        addr,
        ConnectionConfig {
            nop_after: 2,
            ..config()
        },
    );

    for _ in 0..3 {
        conn.set(b"key", None, "value", false).await;
    }

    let mut codes = vec![];
    for _ in 0..4 {
        codes.push(requests.recv().await.unwrap().code());
    }

    assert_eq!(codes, vec![Code::CSet, Code::CSet, Code::CNop, Code::CSet]);
    assert!(conn.is_connected());
}

#[tokio::test]
async fn test_unsynced_write_reports_success_without_waiting() {
    let (addr, mut requests) = create_node(|_| vec![]).await.unwrap();
    let mut conn = Connection::new(addr, config());

    assert_eq!(conn.inc(b"hits", None, 5, false).await, 5);
    assert!(conn.set_nx(b"once", None, 1i64, false).await);

    let inc = requests.recv().await.unwrap();
    assert_eq!(inc.code(), Code::CInc);
    assert_eq!(inc.ivalue, 5);
    assert!(!inc.sync);

    assert_eq!(requests.recv().await.unwrap().code(), Code::CSetNx);
}
