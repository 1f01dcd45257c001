use bytes::Bytes;
use futures::{SinkExt, StreamExt};
use std::future::Future;
use std::net::SocketAddr;
use std::time::Duration;
use tokio::net::{TcpListener, TcpStream};
use tokio::time::timeout;
use tokio_util::codec::Framed;
use tracing::{debug, error, info, instrument, trace};
use uuid::Uuid;

use crate::codec::FrameCodec;
use crate::config::ServerConfig;
use crate::Error;

/// Turns one request frame into an optional reply frame.
///
/// Returning `Ok(None)` writes nothing back, which is how fire-and-forget requests stay
/// unanswered. Returning an error closes the connection the frame came from.
pub trait Handler: Clone + Send + Sync + 'static {
    fn handle(&self, frame: Bytes) -> impl Future<Output = Result<Option<Bytes>, Error>> + Send;
}

pub async fn run<H: Handler>(config: ServerConfig, handler: H) -> Result<(), Error> {
    let _ = tracing_subscriber::fmt()
        .try_init()
        .map_err(|e| debug!("Failed to initialize global tracing: {}", e));

    let listener = TcpListener::bind(&config.addr).await?;

    info!("server listening on {}", listener.local_addr()?);

    serve(listener, handler, config.idle_timeout).await
}

/// Accepts connections on `listener` forever, one task per connection.
pub async fn serve<H: Handler>(
    listener: TcpListener,
    handler: H,
    idle_timeout: Duration,
) -> Result<(), Error> {
    loop {
        let (socket, client_address) = match listener.accept().await {
            Ok(accepted) => accepted,
            Err(e) => {
                error!("failed to accept connection: {}", e);
                continue;
            }
        };
        let handler = handler.clone();
        debug!("accepted connection from {:?}", client_address);

        tokio::spawn(async move {
            if let Err(e) = handle_connection(socket, client_address, handler, idle_timeout).await
            {
                debug!("connection dropped: {}", e);
            }
        });
    }
}

#[instrument(
    name = "connection",
    skip(stream, handler, idle_timeout),
    fields(connection_id, client_address)
)]
async fn handle_connection<H: Handler>(
    stream: TcpStream,
    client_address: SocketAddr,
    handler: H,
    idle_timeout: Duration,
) -> Result<(), Error> {
    let _ = stream.set_nodelay(true);
    let mut conn = Framed::new(stream, FrameCodec::new());

    tracing::Span::current()
        .record("connection_id", Uuid::new_v4().to_string())
        .record("client_address", client_address.to_string());

    loop {
        let frame = match timeout(idle_timeout, conn.next()).await {
            Ok(Some(frame)) => frame?,
            Ok(None) => break,
            Err(_) => {
                debug!("idle timeout");
                break;
            }
        };
        trace!(len = frame.len(), "received frame");

        if let Some(res) = handler.handle(frame).await? {
            trace!(len = res.len(), "sending reply");
            conn.send(res).await?;
        }
    }

    debug!("connection closed");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::{self, FrameDecoder};
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    /// Echoes every frame except empty ones, which get no reply, and `"fail"`, which errors.
    #[derive(Clone)]
    struct Echo;

    impl Handler for Echo {
        fn handle(
            &self,
            frame: Bytes,
        ) -> impl Future<Output = Result<Option<Bytes>, Error>> + Send {
            async move {
                if frame.is_empty() {
                    Ok(None)
                } else if frame == "fail" {
                    Err("handler failure".into())
                } else {
                    Ok(Some(frame))
                }
            }
        }
    }

    async fn start(idle_timeout: Duration) -> SocketAddr {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(serve(listener, Echo, idle_timeout));
        addr
    }

    async fn read_frame(stream: &mut TcpStream, decoder: &mut FrameDecoder) -> Option<Bytes> {
        let mut buf = [0u8; 1024];
        loop {
            let n = match stream.read(&mut buf).await {
                Ok(0) | Err(_) => return None,
                Ok(n) => n,
            };
            if let Some(frame) = decoder.feed(&buf[..n]).unwrap().pop() {
                return Some(frame);
            }
        }
    }

    #[tokio::test]
    async fn replies_in_order_and_skips_empty_replies() {
        let addr = start(Duration::from_secs(5)).await;
        let mut stream = TcpStream::connect(addr).await.unwrap();
        let mut decoder = FrameDecoder::new();

        let mut out = Vec::new();
        out.extend_from_slice(&frame::encode(b"one"));
        out.extend_from_slice(&frame::encode(b""));
        out.extend_from_slice(&frame::encode(b"two"));
        stream.write_all(&out).await.unwrap();

        let mut replies = vec![];
        while replies.len() < 2 {
            let mut buf = [0u8; 1024];
            let n = stream.read(&mut buf).await.unwrap();
            assert!(n > 0);
            replies.extend(decoder.feed(&buf[..n]).unwrap());
        }

        assert_eq!(replies, vec![Bytes::from("one"), Bytes::from("two")]);
    }

    #[tokio::test]
    async fn handler_error_closes_only_that_connection() {
        let addr = start(Duration::from_secs(5)).await;

        let mut failing = TcpStream::connect(addr).await.unwrap();
        failing.write_all(&frame::encode(b"fail")).await.unwrap();
        assert_eq!(read_frame(&mut failing, &mut FrameDecoder::new()).await, None);

        let mut healthy = TcpStream::connect(addr).await.unwrap();
        healthy.write_all(&frame::encode(b"ping")).await.unwrap();
        assert_eq!(
            read_frame(&mut healthy, &mut FrameDecoder::new()).await,
            Some(Bytes::from("ping"))
        );
    }

    #[tokio::test]
    async fn idle_connection_is_closed() {
        let addr = start(Duration::from_millis(50)).await;
        let mut stream = TcpStream::connect(addr).await.unwrap();

        assert_eq!(read_frame(&mut stream, &mut FrameDecoder::new()).await, None);
    }
}
