//! Line-delimited JSON channel to the presentation client.
//!
//! The service hosts one well-known endpoint (`server`); presentation clients
//! connect with bounded, growing backoff (`client`). Outbound messages go
//! through an [`Outbound`] handle so every line is written by a single task.

pub mod client;
pub mod server;
pub mod transport;

use std::io;

use tokio::sync::mpsc;
use tracing::debug;

use quicktype_core::IpcMessage;

#[derive(Debug, thiserror::Error)]
pub enum IpcError {
    #[error("gave up connecting after {attempts} attempts")]
    RetriesExhausted { attempts: u32 },

    #[error("ipc i/o error: {0}")]
    Io(#[from] io::Error),

    #[error("failed to encode message: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("channel closed")]
    Closed,
}

/// Cloneable sender for messages to the connected client.
///
/// Sending never blocks; messages queued while no client is attached are
/// dropped by the writer.
#[derive(Debug, Clone)]
pub struct Outbound {
    tx: mpsc::UnboundedSender<IpcMessage>,
}

impl Outbound {
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<IpcMessage>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    pub fn send(&self, message: IpcMessage) {
        if self.tx.send(message).is_err() {
            debug!("outbound channel closed, message dropped");
        }
    }
}
