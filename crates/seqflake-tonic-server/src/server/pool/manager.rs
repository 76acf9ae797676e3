//! Front end of the uuid worker.
//!
//! [`UuidDispatcher`] forwards `GetUUID` calls to the single worker task over
//! a bounded [`mpsc`] queue and waits on a per-request [`oneshot`] for the
//! id. A shared [`CancellationToken`] turns new requests away once shutdown
//! has begun.

use super::{request::UuidRequest, worker::uuid_worker};
use core::time::Duration;
use seqflake_tonic_core::{
    Error, Result,
    seqflake::{SnowflakeGenerator, SnowflakeId},
};
use tokio::{
    sync::{mpsc, oneshot},
    time::timeout,
};
use tokio_util::sync::CancellationToken;

pub struct UuidDispatcher {
    tx: mpsc::Sender<UuidRequest>,
    shutdown_token: CancellationToken,
    shutdown_timeout: Duration,
}

impl UuidDispatcher {
    /// Spawns the worker owning `generator` and returns its dispatcher.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn spawn<G>(generator: G, queue_size: usize, shutdown_timeout: Duration) -> Self
    where
        G: SnowflakeGenerator + Send + 'static,
    {
        let (tx, rx) = mpsc::channel(queue_size.max(1));
        tokio::spawn(uuid_worker(rx, generator));
        Self {
            tx,
            shutdown_token: CancellationToken::new(),
            shutdown_timeout,
        }
    }

    /// Requests the next id from the worker.
    ///
    /// # Errors
    ///
    /// - [`Error::ServiceShutdown`] once [`Self::shutdown`] has been called,
    ///   including for requests queued behind the shutdown message.
    /// - [`Error::ChannelError`] if the worker is gone without a shutdown.
    pub async fn next_id(&self) -> Result<SnowflakeId> {
        if self.shutdown_token.is_cancelled() {
            return Err(Error::ServiceShutdown);
        }

        let (reply, rx) = oneshot::channel();
        self.tx
            .send(UuidRequest::Next { reply })
            .await
            .map_err(|_| self.worker_gone("uuid worker channel closed"))?;

        rx.await.map_err(|_| self.worker_gone("uuid worker dropped the reply"))
    }

    fn worker_gone(&self, context: &str) -> Error {
        if self.shutdown_token.is_cancelled() {
            Error::ServiceShutdown
        } else {
            Error::ChannelError {
                context: context.to_owned(),
            }
        }
    }

    pub fn is_shutting_down(&self) -> bool {
        self.shutdown_token.is_cancelled()
    }

    /// Stops the worker.
    ///
    /// - Cancels the shared [`CancellationToken`] to refuse new requests.
    /// - Queues a [`UuidRequest::Shutdown`] behind the requests already
    ///   admitted, so those still get their ids.
    /// - Waits up to the configured timeout for the acknowledgement.
    ///
    /// Calling it again after the worker has stopped is a no-op.
    ///
    /// # Errors
    ///
    /// [`Error::ChannelError`] if the worker does not acknowledge in time.
    pub async fn shutdown(&self) -> Result<()> {
        tracing::info!("Refusing new uuid requests");
        self.shutdown_token.cancel();

        let (response, rx) = oneshot::channel();
        if self
            .tx
            .send(UuidRequest::Shutdown { response })
            .await
            .is_err()
        {
            tracing::debug!("uuid worker already stopped");
            return Ok(());
        }

        match timeout(self.shutdown_timeout, rx).await {
            Ok(Ok(())) => {
                tracing::debug!("uuid worker shutdown acknowledged");
                Ok(())
            }
            Ok(Err(_)) => {
                // The worker exited between accepting the message and reading it.
                tracing::debug!("uuid worker already stopped");
                Ok(())
            }
            Err(_) => {
                tracing::warn!(
                    timeout = ?self.shutdown_timeout,
                    "uuid worker shutdown timed out"
                );
                Err(Error::ChannelError {
                    context: format!(
                        "uuid worker did not acknowledge shutdown within {:?}",
                        self.shutdown_timeout
                    ),
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use seqflake_tonic_core::seqflake::{BasicSnowflakeGenerator, SystemClock};
    use std::sync::Arc;

    fn dispatcher(machine_id: u64) -> UuidDispatcher {
        let generator = BasicSnowflakeGenerator::new(machine_id, SystemClock::default());
        UuidDispatcher::spawn(generator, 16, Duration::from_secs(1))
    }

    #[tokio::test]
    async fn ids_increase_in_call_order() {
        let dispatcher = dispatcher(3);
        let mut last = 0;
        for _ in 0..10_000 {
            let id = dispatcher.next_id().await.unwrap();
            assert!(id.to_raw() > last);
            assert_eq!(id.machine_id(), 3);
            last = id.to_raw();
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_callers_get_distinct_ids() {
        let dispatcher = Arc::new(dispatcher(1));
        let handles: Vec<_> = (0..32)
            .map(|_| {
                let dispatcher = Arc::clone(&dispatcher);
                tokio::spawn(async move {
                    let mut ids = Vec::with_capacity(200);
                    for _ in 0..200 {
                        ids.push(dispatcher.next_id().await.unwrap().to_raw());
                    }
                    ids
                })
            })
            .collect();

        let mut all = Vec::new();
        for handle in handles {
            let ids = handle.await.unwrap();
            // Each caller observes its own ids increasing.
            assert!(ids.windows(2).all(|w| w[0] < w[1]));
            all.extend(ids);
        }
        let total = all.len();
        all.sort_unstable();
        all.dedup();
        assert_eq!(all.len(), total);
    }

    #[tokio::test]
    async fn shutdown_refuses_new_requests() {
        let dispatcher = dispatcher(0);
        assert!(dispatcher.next_id().await.is_ok());

        dispatcher.shutdown().await.unwrap();
        assert!(dispatcher.is_shutting_down());
        assert!(matches!(
            dispatcher.next_id().await,
            Err(Error::ServiceShutdown)
        ));

        // Second call finds the worker gone.
        dispatcher.shutdown().await.unwrap();
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn requests_racing_shutdown_see_service_shutdown() {
        let dispatcher = Arc::new(dispatcher(2));
        let callers: Vec<_> = (0..16)
            .map(|_| {
                let dispatcher = Arc::clone(&dispatcher);
                tokio::spawn(async move {
                    loop {
                        if let Err(e) = dispatcher.next_id().await {
                            return e;
                        }
                    }
                })
            })
            .collect();

        tokio::task::yield_now().await;
        dispatcher.shutdown().await.unwrap();

        for caller in callers {
            assert!(matches!(caller.await.unwrap(), Error::ServiceShutdown));
        }
    }

    #[tokio::test(start_paused = true)]
    async fn unacknowledged_shutdown_times_out() {
        // Nobody reads the queue, so the shutdown message is never answered.
        let (tx, _rx) = mpsc::channel(4);
        let dispatcher = UuidDispatcher {
            tx,
            shutdown_token: CancellationToken::new(),
            shutdown_timeout: Duration::from_secs(3),
        };

        let started = tokio::time::Instant::now();
        assert!(matches!(
            dispatcher.shutdown().await,
            Err(Error::ChannelError { .. })
        ));
        assert!(started.elapsed() >= Duration::from_secs(3));
        assert!(dispatcher.is_shutting_down());
    }
}
