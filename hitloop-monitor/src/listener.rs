//! Frame listener
//!
//! Handles the TCP accept loop. Every connection gets its own transport
//! handle and feeds newline-delimited frames to the registry actor.

use std::net::SocketAddr;
use std::sync::Arc;

use hitloop_registry::{DropReason, RegistryHandle, TransportAllocator, TransportHandle};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncRead, AsyncReadExt, BufReader};
use tokio::net::TcpListener;
use tracing::{debug, info, warn};

/// Longest line accepted from a peer, line ending included
///
/// A frame is at most 20 hex characters, so anything near this is garbage.
pub const MAX_LINE_BYTES: usize = 256;

/// Accept connections until the registry goes away
pub async fn run_listener(
    listener: TcpListener,
    registry: RegistryHandle,
    transports: Arc<TransportAllocator>,
) {
    loop {
        match listener.accept().await {
            Ok((socket, peer_addr)) => {
                let transport = transports.allocate();
                info!(peer = %peer_addr, %transport, "Connection accepted");
                tokio::spawn(handle_connection(
                    socket,
                    peer_addr,
                    transport,
                    registry.clone(),
                ));
            }
            Err(e) => {
                warn!(error = %e, "Failed to accept connection");
            }
        }
    }
}

/// Forward every line from `reader` to the registry
///
/// Ends when the peer closes, the read fails or the registry stops. Lines
/// that are not valid UTF-8 are passed through lossily so the decoder can
/// count them as bad frames. Lines longer than [`MAX_LINE_BYTES`] are skipped
/// up to the next newline and reported as [`DropReason::Oversized`].
pub async fn handle_connection<R>(
    reader: R,
    peer_addr: SocketAddr,
    transport: TransportHandle,
    registry: RegistryHandle,
) where
    R: AsyncRead + Unpin,
{
    let mut reader = BufReader::new(reader);
    let mut buf = Vec::new();
    let mut lines: u64 = 0;

    loop {
        buf.clear();
        let limit = MAX_LINE_BYTES as u64;
        match (&mut reader).take(limit).read_until(b'\n', &mut buf).await {
            Ok(0) => {
                info!(peer = %peer_addr, %transport, lines, "Connection closed");
                break;
            }
            Ok(n) if n == MAX_LINE_BYTES && buf.last() != Some(&b'\n') => {
                lines += 1;
                warn!(peer = %peer_addr, %transport, "Discarding oversized line");
                let reject = registry.reject_frame(Some(transport), DropReason::Oversized);
                if reject.await.is_err() {
                    debug!(%transport, "Registry stopped; dropping connection");
                    break;
                }
                match skip_line(&mut reader).await {
                    Ok(true) => {}
                    Ok(false) => {
                        info!(peer = %peer_addr, %transport, lines, "Connection closed");
                        break;
                    }
                    Err(e) => {
                        warn!(peer = %peer_addr, %transport, error = %e, "Connection read failed");
                        break;
                    }
                }
            }
            Ok(_) => {
                lines += 1;
                let text = String::from_utf8_lossy(&buf).into_owned();
                if registry.send_frames(Some(transport), text).await.is_err() {
                    debug!(%transport, "Registry stopped; dropping connection");
                    break;
                }
            }
            Err(e) => {
                warn!(peer = %peer_addr, %transport, error = %e, "Connection read failed");
                break;
            }
        }
    }
}

/// Consume bytes through the next newline; false if the stream ended first
async fn skip_line<R>(reader: &mut R) -> std::io::Result<bool>
where
    R: AsyncBufRead + Unpin,
{
    loop {
        let available = reader.fill_buf().await?;
        if available.is_empty() {
            return Ok(false);
        }
        match available.iter().position(|&b| b == b'\n') {
            Some(end) => {
                reader.consume(end + 1);
                return Ok(true);
            }
            None => {
                let len = available.len();
                reader.consume(len);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hitloop_registry::{spawn_registry_actor, DeviceRegistry};
    use tokio::io::AsyncWriteExt;
    use tokio::net::TcpStream;
    use tokio::sync::mpsc;

    #[tokio::test]
    async fn test_connection_frames_reach_registry() {
        let (event_tx, _event_rx) = mpsc::channel(64);
        let (registry, task) = spawn_registry_actor(DeviceRegistry::new(), event_tx);
        let reader: &[u8] = b"0a1bff804020100804ff\r\n\xff\xfe\nbeef0000000000000000";
        let peer: SocketAddr = "127.0.0.1:9".parse().unwrap();

        handle_connection(reader, peer, TransportHandle(5), registry.clone()).await;

        assert_eq!(registry.count().await.unwrap(), 2);
        let device = registry.get("BEEF").await.unwrap().unwrap();
        assert_eq!(device.transport, Some(TransportHandle(5)));
        assert_eq!(registry.stats().await.unwrap().frames_dropped(), 1);

        registry.shutdown().await.unwrap();
        task.await.unwrap();
    }

    #[tokio::test]
    async fn test_oversized_line_is_skipped() {
        let (event_tx, _event_rx) = mpsc::channel(64);
        let (registry, task) = spawn_registry_actor(DeviceRegistry::new(), event_tx);
        let mut input = vec![b'a'; 64 * 1024];
        input.extend_from_slice(b"\n0a1bff804020100804ff\n");
        let peer: SocketAddr = "127.0.0.1:9".parse().unwrap();

        handle_connection(&input[..], peer, TransportHandle(2), registry.clone()).await;

        assert_eq!(registry.count().await.unwrap(), 1);
        assert!(registry.get("0a1b").await.unwrap().unwrap().tap);
        let stats = registry.stats().await.unwrap();
        assert_eq!(stats.dropped(DropReason::Oversized), 1);
        assert_eq!(stats.frames_dropped(), 1);
        assert_eq!(stats.frames_received, 1);

        registry.shutdown().await.unwrap();
        task.await.unwrap();
    }

    #[tokio::test]
    async fn test_oversized_tail_without_newline_ends_connection() {
        let (event_tx, _event_rx) = mpsc::channel(64);
        let (registry, task) = spawn_registry_actor(DeviceRegistry::new(), event_tx);
        let input = vec![b'0'; 10 * MAX_LINE_BYTES];
        let peer: SocketAddr = "127.0.0.1:9".parse().unwrap();

        handle_connection(&input[..], peer, TransportHandle(2), registry.clone()).await;

        assert_eq!(registry.count().await.unwrap(), 0);
        assert_eq!(registry.stats().await.unwrap().frames_dropped(), 1);

        registry.shutdown().await.unwrap();
        task.await.unwrap();
    }

    #[tokio::test]
    async fn test_listener_assigns_transports() {
        let (event_tx, _event_rx) = mpsc::channel(64);
        let (registry, task) = spawn_registry_actor(DeviceRegistry::new(), event_tx);
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let accept = tokio::spawn(run_listener(
            listener,
            registry.clone(),
            Arc::new(TransportAllocator::new()),
        ));

        let mut client = TcpStream::connect(addr).await.unwrap();
        client.write_all(b"00010000000000000000\n").await.unwrap();
        client.shutdown().await.unwrap();

        let mut device = None;
        for _ in 0..100 {
            device = registry.get("0001").await.unwrap();
            if device.is_some() {
                break;
            }
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        }
        assert_eq!(device.unwrap().transport, Some(TransportHandle(1)));

        accept.abort();
        registry.shutdown().await.unwrap();
        task.await.unwrap();
    }
}
