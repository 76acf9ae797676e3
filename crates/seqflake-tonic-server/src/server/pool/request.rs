use seqflake_tonic_core::seqflake::SnowflakeId;
use tokio::sync::oneshot;

/// A message sent to the uuid worker.
#[derive(Debug)]
pub enum UuidRequest {
    /// Generate one id and send it back on `reply`.
    Next { reply: oneshot::Sender<SnowflakeId> },
    /// Stop the worker and acknowledge on `response`.
    Shutdown { response: oneshot::Sender<()> },
}
