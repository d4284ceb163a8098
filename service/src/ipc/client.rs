//! Client side of the channel, with bounded reconnect backoff.

use std::future::Future;
use std::io;
use std::time::Duration;

use serde::Deserialize;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Lines};
use tokio::time::{sleep, timeout};
use tracing::{info, warn};

use quicktype_core::IpcMessage;

use super::transport::{self, BoxedReader, BoxedWriter};
use super::IpcError;

/// Reconnect schedule: attempt `n` (0-based) is followed by a wait of
/// `base_delay_ms + n * delay_increment_ms`, for at most `max_attempts`
/// attempts in total.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct RetryPolicy {
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,
    #[serde(default = "default_delay_increment_ms")]
    pub delay_increment_ms: u64,
    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,
}

fn default_max_attempts() -> u32 {
    20
}

fn default_base_delay_ms() -> u64 {
    1000
}

fn default_delay_increment_ms() -> u64 {
    1000
}

fn default_connect_timeout_ms() -> u64 {
    1000
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            base_delay_ms: default_base_delay_ms(),
            delay_increment_ms: default_delay_increment_ms(),
            connect_timeout_ms: default_connect_timeout_ms(),
        }
    }
}

impl RetryPolicy {
    pub fn delay(&self, attempt: u32) -> Duration {
        Duration::from_millis(
            self.base_delay_ms
                .saturating_add(self.delay_increment_ms.saturating_mul(attempt as u64)),
        )
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms.max(1))
    }
}

/// Call `connect` until it succeeds or the policy's attempts run out.
/// `connect` receives the 0-based attempt number.
pub async fn connect_with_retry<F, Fut, T>(policy: &RetryPolicy, mut connect: F) -> Result<T, IpcError>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = io::Result<T>>,
{
    for attempt in 0..policy.max_attempts {
        match timeout(policy.connect_timeout(), connect(attempt)).await {
            Ok(Ok(conn)) => {
                info!(attempt = attempt + 1, "connected");
                return Ok(conn);
            }
            Ok(Err(error)) => {
                warn!(attempt = attempt + 1, max = policy.max_attempts, %error, "connect failed");
            }
            Err(_) => {
                warn!(attempt = attempt + 1, max = policy.max_attempts, "connect timed out");
            }
        }
        if attempt + 1 < policy.max_attempts {
            sleep(policy.delay(attempt)).await;
        }
    }
    Err(IpcError::RetriesExhausted {
        attempts: policy.max_attempts,
    })
}

/// Connection state as seen by a client.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IpcState {
    Connected,
    Disconnected,
    /// Reconnection attempts exhausted.
    Failed,
}

/// A connected client.
pub struct IpcClient {
    lines: Lines<BufReader<BoxedReader>>,
    writer: BoxedWriter,
}

impl IpcClient {
    /// Connect to `endpoint`, retrying per `policy`.
    pub async fn connect(endpoint: &str, policy: &RetryPolicy) -> Result<Self, IpcError> {
        let (reader, writer) =
            connect_with_retry(policy, |_| transport::connect(endpoint)).await?;
        Ok(Self::from_parts(reader, writer))
    }

    pub fn from_parts(reader: BoxedReader, writer: BoxedWriter) -> Self {
        Self {
            lines: BufReader::new(reader).lines(),
            writer,
        }
    }

    pub async fn send(&mut self, message: &IpcMessage) -> Result<(), IpcError> {
        let mut line = message.to_line()?;
        line.push('\n');
        self.writer.write_all(line.as_bytes()).await?;
        self.writer.flush().await?;
        Ok(())
    }

    /// Next well-formed message; `None` once the service hangs up.
    /// Malformed lines are logged and skipped.
    pub async fn recv(&mut self) -> Result<Option<IpcMessage>, IpcError> {
        while let Some(line) = self.lines.next_line().await? {
            if line.trim().is_empty() {
                continue;
            }
            match IpcMessage::from_line(&line) {
                Ok(message) => return Ok(Some(message)),
                Err(error) => warn!(%error, "skipping malformed message"),
            }
        }
        Ok(None)
    }
}
