//! gRPC service implementation for snowflake ids and named counters.
//!
//! [`IdService`] implements the generated [`SnowflakeService`] trait:
//!
//! - `GetUUID` is forwarded to the single uuid worker through
//!   [`UuidDispatcher`].
//! - `Next` runs the CAS allocation for the named counter inline on the
//!   request task, drawing a store handle from the shared pool.

use crate::server::{
    config::ServerConfig,
    pool::manager::UuidDispatcher,
    telemetry::{
        increment_counters_allocated, increment_errors, increment_requests,
        increment_uuids_generated, record_rpc_duration,
    },
};
use seqflake_tonic_core::{
    Error,
    proto::{
        GetUuidRequest, GetUuidResponse, NextRequest, NextResponse,
        snowflake_service_server::SnowflakeService,
    },
    seqflake::{KvStore, MachineId, SequenceAllocator, StorePool},
    types::{Clock, Generator},
};
use std::{sync::Arc, time::Instant};
use tonic::{Request, Response, Status};

/// Service context shared by all connections.
///
/// Owns the uuid dispatcher, the counter allocator and the store pool; clones
/// share them.
pub struct IdService<S> {
    uuids: Arc<UuidDispatcher>,
    counters: Arc<SequenceAllocator<S>>,
    pool: Arc<StorePool<S>>,
}

impl<S> Clone for IdService<S> {
    fn clone(&self) -> Self {
        Self {
            uuids: Arc::clone(&self.uuids),
            counters: Arc::clone(&self.counters),
            pool: Arc::clone(&self.pool),
        }
    }
}

impl<S> IdService<S>
where
    S: KvStore,
{
    /// Creates the service and spawns the uuid worker.
    ///
    /// `machine_id` must already be assigned; it is fixed for the lifetime of
    /// the service.
    pub fn new(config: &ServerConfig, machine_id: MachineId, pool: Arc<StorePool<S>>) -> Self {
        let generator = Generator::new(machine_id.into(), Clock::with_epoch(config.epoch));
        let uuids = UuidDispatcher::spawn(generator, config.uuid_queue_size, config.shutdown_timeout);
        let counters = SequenceAllocator::new(Arc::clone(&pool), config.sequence.clone());

        tracing::debug!(?counters, "counter allocator ready");

        Self {
            uuids: Arc::new(uuids),
            counters: Arc::new(counters),
            pool,
        }
    }

    /// Stops the uuid worker, then closes the store pool so that in-flight
    /// and queued counter requests fail as unavailable.
    pub async fn shutdown(&self) -> Result<(), Error> {
        let result = self.uuids.shutdown().await;
        self.pool.close();
        tracing::info!("store pool closed");
        result
    }

    async fn next_value(&self, name: &str) -> Result<i64, Error> {
        if self.uuids.is_shutting_down() {
            return Err(Error::ServiceShutdown);
        }
        if name.trim().is_empty() {
            return Err(Error::InvalidRequest {
                reason: "counter name must not be empty".to_owned(),
            });
        }
        Ok(self.counters.allocate(name).await?)
    }
}

#[tonic::async_trait]
impl<S> SnowflakeService for IdService<S>
where
    S: KvStore,
{
    /// Returns the next snowflake id of this instance.
    #[tracing::instrument(level = "debug", skip_all)]
    async fn get_uuid(
        &self,
        _req: Request<GetUuidRequest>,
    ) -> Result<Response<GetUuidResponse>, Status> {
        let start = Instant::now();
        increment_requests("GetUUID");

        let result = self.uuids.next_id().await;
        record_rpc_duration("GetUUID", start.elapsed().as_secs_f64() * 1000.0);

        match result {
            Ok(id) => {
                increment_uuids_generated();
                Ok(Response::new(GetUuidResponse { uuid: id.to_raw() }))
            }
            Err(e) => {
                increment_errors("GetUUID");
                tracing::warn!("GetUUID failed: {e}");
                Err(e.into())
            }
        }
    }

    /// Returns the next value of the named counter.
    #[tracing::instrument(level = "debug", skip_all, fields(name = %req.get_ref().name))]
    async fn next(&self, req: Request<NextRequest>) -> Result<Response<NextResponse>, Status> {
        let start = Instant::now();
        increment_requests("Next");

        let name = req.into_inner().name;
        let result = self.next_value(&name).await;
        record_rpc_duration("Next", start.elapsed().as_secs_f64() * 1000.0);

        match result {
            Ok(value) => {
                increment_counters_allocated();
                Ok(Response::new(NextResponse { value }))
            }
            Err(e) => {
                increment_errors("Next");
                tracing::warn!(name = %name, "Next failed: {e}");
                Err(e.into())
            }
        }
    }
}
