use super::request::UuidRequest;
use seqflake_tonic_core::seqflake::{SnowflakeGenerator, SnowflakeGeneratorAsyncExt, TokioSleep};
use tokio::sync::mpsc;

/// Worker task that owns the process's only id generator.
///
/// Requests are served strictly in queue order, so ids are handed out in the
/// order callers were admitted. When the generator is pending (sequence
/// exhausted or clock behind) the worker sleeps and every queued caller waits
/// with it.
///
/// Runs until a [`UuidRequest::Shutdown`] arrives or every sender is dropped.
pub async fn uuid_worker<G>(mut rx: mpsc::Receiver<UuidRequest>, mut generator: G)
where
    G: SnowflakeGenerator + Send,
{
    let machine_id = generator.machine_id();
    tracing::debug!(machine_id, "uuid worker started");

    while let Some(request) = rx.recv().await {
        match request {
            UuidRequest::Next { reply } => {
                let id = generator.next_id_async(&TokioSleep).await;
                if reply.send(id).is_err() {
                    // The id is burnt; that only costs a gap.
                    tracing::trace!(%id, "caller went away before receiving its id");
                }
            }
            UuidRequest::Shutdown { response } => {
                tracing::debug!("uuid worker received shutdown signal");
                if response.send(()).is_err() {
                    tracing::error!("uuid worker failed to acknowledge shutdown");
                }
                break;
            }
        }
    }

    tracing::debug!(machine_id, "uuid worker stopped");
}
