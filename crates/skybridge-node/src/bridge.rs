//! Line-oriented bridges between byte streams and channels.
//!
//! The network simulator speaks newline-terminated text on every connection.
//! A bridge turns one duplex stream into an inbound line channel and an
//! outbound line channel so the clock and router never touch sockets.

use skybridge_router::EndPoint;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// Default channel depth for a bridge.
pub const DEFAULT_LINE_CAPACITY: usize = 1024;

/// Channels attached to a bridged stream.
#[derive(Debug)]
pub struct LineBridge {
    /// Lines read from the stream, without terminators. Closes on EOF.
    pub inbound: mpsc::Receiver<String>,
    /// Lines to write; each gets a `\n`. Dropping it shuts the write side down.
    pub outbound: mpsc::Sender<String>,
}

/// Spawn reader and writer tasks for `stream`. Blank lines are dropped.
pub fn spawn_line_bridge<S>(stream: S, label: &str, capacity: usize) -> LineBridge
where
    S: AsyncRead + AsyncWrite + Send + 'static,
{
    let (read_half, mut write_half) = tokio::io::split(stream);
    let (inbound_tx, inbound) = mpsc::channel(capacity);
    let (outbound, mut outbound_rx) = mpsc::channel::<String>(capacity);

    let reader_label = label.to_string();
    tokio::spawn(async move {
        let mut lines = BufReader::new(read_half).lines();
        loop {
            match lines.next_line().await {
                Ok(Some(line)) => {
                    if line.trim().is_empty() {
                        continue;
                    }
                    if inbound_tx.send(line).await.is_err() {
                        break;
                    }
                }
                Ok(None) => {
                    tracing::info!("{} connection closed by peer", reader_label);
                    break;
                }
                Err(e) => {
                    tracing::error!("{} read error: {}", reader_label, e);
                    break;
                }
            }
        }
    });

    let writer_label = label.to_string();
    tokio::spawn(async move {
        while let Some(line) = outbound_rx.recv().await {
            let written = async {
                write_half.write_all(line.as_bytes()).await?;
                write_half.write_all(b"\n").await?;
                write_half.flush().await
            }
            .await;
            if let Err(e) = written {
                tracing::error!("{} write error: {}", writer_label, e);
                return;
            }
        }
        let _ = write_half.shutdown().await;
    });

    LineBridge { inbound, outbound }
}

/// Forward an endpoint's directives to the network simulator as text lines.
pub fn forward_directives(mut endpoint: EndPoint, lines: mpsc::Sender<String>) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(directive) = endpoint.next_directive().await {
            tracing::trace!("{} -> {}", endpoint.name(), directive);
            if lines.send(directive.to_string()).await.is_err() {
                tracing::warn!("Directive sink for {} closed", endpoint.name());
                break;
            }
        }
    })
}
