//! Server side of the channel: one accept loop, one client at a time.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use quicktype_core::IpcMessage;

use super::transport::{self, BoxedReader, BoxedWriter, Listener};

/// Receives messages from the attached client.
///
/// Both methods run on the listener task and must not block; long work is
/// handed off by the implementation.
pub trait InboundHandler: Send + Sync + 'static {
    /// A client has just connected.
    fn attached(&self);
    fn handle(&self, message: IpcMessage);
}

type WriterSlot = Arc<Mutex<Option<BoxedWriter>>>;

/// Bind the endpoint. Failure here is fatal for the service.
pub async fn bind(endpoint: &str) -> Result<Listener> {
    let listener = transport::bind(endpoint)
        .await
        .with_context(|| format!("failed to bind ipc endpoint {endpoint}"))?;
    info!(endpoint, "ipc server listening");
    Ok(listener)
}

/// Run the accept loop and the writer until `cancel` fires.
pub fn spawn<H: InboundHandler>(
    mut listener: Listener,
    outbound: mpsc::UnboundedReceiver<IpcMessage>,
    handler: Arc<H>,
    cancel: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let slot: WriterSlot = Arc::new(Mutex::new(None));
        let writer = tokio::spawn(write_loop(outbound, Arc::clone(&slot), cancel.clone()));

        loop {
            let accepted = tokio::select! {
                _ = cancel.cancelled() => break,
                accepted = listener.accept() => accepted,
            };
            match accepted {
                Ok((reader, writer)) => {
                    info!("client connected");
                    *slot.lock().await = Some(writer);
                    handler.attached();
                    read_loop(reader, handler.as_ref(), &cancel).await;
                    *slot.lock().await = None;
                    info!("client disconnected");
                }
                Err(error) => {
                    warn!(%error, "accept failed");
                    tokio::time::sleep(Duration::from_millis(100)).await;
                }
            }
        }

        if let Err(error) = writer.await {
            warn!(%error, "ipc writer task failed");
        }
        debug!("ipc server stopped");
    })
}

async fn read_loop<H: InboundHandler>(reader: BoxedReader, handler: &H, cancel: &CancellationToken) {
    let mut lines = BufReader::new(reader).lines();
    loop {
        let next = tokio::select! {
            _ = cancel.cancelled() => return,
            next = lines.next_line() => next,
        };
        match next {
            Ok(Some(line)) => {
                if line.trim().is_empty() {
                    continue;
                }
                match IpcMessage::from_line(&line) {
                    Ok(message) => {
                        debug!(kind = message.kind(), "message received");
                        handler.handle(message);
                    }
                    Err(error) => warn!(%error, "skipping malformed message"),
                }
            }
            Ok(None) => return,
            Err(error) => {
                warn!(%error, "read from client failed");
                return;
            }
        }
    }
}

/// Single writer: one line per message, in queue order.
async fn write_loop(
    mut outbound: mpsc::UnboundedReceiver<IpcMessage>,
    slot: WriterSlot,
    cancel: CancellationToken,
) {
    loop {
        let message = tokio::select! {
            _ = cancel.cancelled() => break,
            message = outbound.recv() => match message {
                Some(message) => message,
                None => break,
            },
        };

        let mut line = match message.to_line() {
            Ok(line) => line,
            Err(error) => {
                warn!(%error, kind = message.kind(), "failed to encode message");
                continue;
            }
        };
        line.push('\n');

        let mut guard = slot.lock().await;
        let Some(writer) = guard.as_mut() else {
            debug!(kind = message.kind(), "no client attached, message dropped");
            continue;
        };
        let written = async {
            writer.write_all(line.as_bytes()).await?;
            writer.flush().await
        }
        .await;
        if let Err(error) = written {
            warn!(%error, kind = message.kind(), "send failed, dropping client writer");
            *guard = None;
        }
    }
}
