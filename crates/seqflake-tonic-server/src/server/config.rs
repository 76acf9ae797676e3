use anyhow::{Context, bail};
use clap::{Parser, ValueEnum};
use core::time::Duration;
use seqflake_tonic_core::seqflake::{
    MachineIdSource, RetryPolicy, SequenceConfig, SnowflakeId, SystemClock, TimeSource,
};

/// Which key-value store backs counters and machine id assignment.
#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
pub enum StoreKind {
    /// etcd v3 cluster.
    Etcd,
    /// Process-local map; state is lost on exit.
    Memory,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    Pretty,
    Json,
}

/// Runtime configuration for the `seqflake-tonic-server` binary.
///
/// Every flag can also be supplied through the environment (or a `.env`
/// file loaded at startup).
#[derive(Parser, Debug, Clone)]
#[command(
    name = "seqflake-tonic-server",
    version,
    about = "A gRPC service for snowflake ids and named counters"
)]
pub struct CliArgs {
    /// Address to listen on (TCP or Unix socket path; use --uds for Unix
    /// socket).
    ///
    /// Environment variable: `SERVER_ADDR`
    #[arg(long, env = "SERVER_ADDR", default_value_t = String::from("0.0.0.0:50005"))]
    pub server_addr: String,

    /// Listen on a Unix socket instead of TCP. If set, `SERVER_ADDR` must be a
    /// file path.
    #[arg(short, long, default_value_t = false)]
    pub uds: bool,

    /// Store backend.
    ///
    /// Environment variable: `STORE`
    #[arg(long, env = "STORE", value_enum, default_value_t = StoreKind::Etcd)]
    pub store: StoreKind,

    /// Comma separated etcd endpoints.
    ///
    /// Environment variable: `ETCD_ENDPOINTS`
    #[arg(
        long,
        env = "ETCD_ENDPOINTS",
        value_delimiter = ',',
        default_value = "http://127.0.0.1:2379"
    )]
    pub etcd_endpoints: Vec<String>,

    /// Number of store handles, which also caps concurrent store calls.
    ///
    /// Environment variable: `STORE_POOL_SIZE`
    #[arg(long, env = "STORE_POOL_SIZE", default_value_t = 128)]
    pub store_pool_size: usize,

    /// Connect and per-request timeout for store calls, in milliseconds.
    ///
    /// Environment variable: `STORE_TIMEOUT_MS`
    #[arg(long, env = "STORE_TIMEOUT_MS", default_value_t = 5_000)]
    pub store_timeout_ms: u64,

    /// Fixed machine id. When unset the id is taken from the shared counter at
    /// `UUID_KEY`.
    ///
    /// Environment variable: `MACHINE_ID`
    #[arg(long, env = "MACHINE_ID")]
    pub machine_id: Option<u64>,

    /// Mask shared counter values above 1023 instead of refusing to start.
    ///
    /// Environment variable: `ALLOW_MACHINE_ID_WRAPAROUND`
    #[arg(long, env = "ALLOW_MACHINE_ID_WRAPAROUND", default_value_t = false)]
    pub allow_machine_id_wraparound: bool,

    /// Values reserved per counter round trip. Values above 1 enable block
    /// caching; reserved values that were never handed out are lost on
    /// restart.
    ///
    /// Environment variable: `INCR_STEP`
    #[arg(long, env = "INCR_STEP", default_value_t = 1)]
    pub incr_step: i64,

    /// Key prefix of named counters.
    ///
    /// Environment variable: `PK_ROOT`
    #[arg(long, env = "PK_ROOT", default_value_t = String::from("/seqs"))]
    pub pk_root: String,

    /// Shared counter used to assign machine ids.
    ///
    /// Environment variable: `UUID_KEY`
    #[arg(long, env = "UUID_KEY", default_value_t = String::from("/seqs/snowflake-uuid"))]
    pub uuid_key: String,

    /// Compare-and-swap rounds before a request fails as unavailable.
    ///
    /// Environment variable: `MAX_ATTEMPTS`
    #[arg(long, env = "MAX_ATTEMPTS", default_value_t = 32)]
    pub max_attempts: u32,

    /// Upper bound of the random pause after a lost compare-and-swap, in
    /// milliseconds.
    ///
    /// Environment variable: `BACKOFF_MS`
    #[arg(long, env = "BACKOFF_MS", default_value_t = 100)]
    pub backoff_ms: u64,

    /// Epoch of id timestamps, in Unix milliseconds.
    ///
    /// Environment variable: `EPOCH_MS`
    #[arg(long, env = "EPOCH_MS", default_value_t = 0)]
    pub epoch_ms: u64,

    /// Capacity of the queue in front of the uuid worker.
    ///
    /// Environment variable: `UUID_QUEUE_SIZE`
    #[arg(long, env = "UUID_QUEUE_SIZE", default_value_t = 1024)]
    pub uuid_queue_size: usize,

    /// Seconds to wait for the uuid worker to acknowledge shutdown.
    ///
    /// Environment variable: `SHUTDOWN_TIMEOUT`
    #[arg(long, env = "SHUTDOWN_TIMEOUT", default_value_t = 3)]
    pub shutdown_timeout: u64,

    /// Counters to create at startup, as `name=value` (memory store only).
    ///
    /// Environment variable: `SEED_COUNTERS` (comma separated)
    #[arg(long = "seed", env = "SEED_COUNTERS", value_delimiter = ',')]
    pub seed: Vec<String>,

    /// Log output format.
    ///
    /// Environment variable: `LOG_FORMAT`
    #[arg(long, env = "LOG_FORMAT", value_enum, default_value_t = LogFormat::Pretty)]
    pub log_format: LogFormat,
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub server_addr: String,
    pub uds: bool,
    pub store: StoreKind,
    pub etcd_endpoints: Vec<String>,
    pub store_pool_size: usize,
    pub store_timeout: Duration,
    pub machine_id: MachineIdSource,
    pub allow_machine_id_wraparound: bool,
    pub sequence: SequenceConfig,
    pub retry: RetryPolicy,
    pub epoch: Duration,
    pub uuid_queue_size: usize,
    pub shutdown_timeout: Duration,
    pub seeds: Vec<(String, i64)>,
    pub log_format: LogFormat,
}

impl ServerConfig {
    /// Store key of the counter called `name`.
    pub fn counter_key(&self, name: &str) -> String {
        format!("{}/{}", self.sequence.prefix.trim_end_matches('/'), name)
    }
}

impl TryFrom<CliArgs> for ServerConfig {
    type Error = anyhow::Error;

    fn try_from(args: CliArgs) -> Result<Self, Self::Error> {
        if args.incr_step < 1 {
            bail!("INCR_STEP must be at least 1 (got {})", args.incr_step);
        }
        if args.max_attempts == 0 {
            bail!("MAX_ATTEMPTS must be greater than 0");
        }
        if args.store_pool_size == 0 {
            bail!("STORE_POOL_SIZE must be greater than 0");
        }
        if args.uuid_queue_size == 0 {
            bail!("UUID_QUEUE_SIZE must be greater than 0");
        }
        if args.pk_root.trim_end_matches('/').is_empty() {
            bail!("PK_ROOT must not be empty");
        }
        if args.store == StoreKind::Etcd && args.etcd_endpoints.is_empty() {
            bail!("ETCD_ENDPOINTS must name at least one endpoint");
        }
        if args.store == StoreKind::Etcd && !cfg!(feature = "etcd") {
            bail!("this build does not include the etcd backend; use --store memory");
        }
        if args.store == StoreKind::Etcd && !args.seed.is_empty() {
            bail!("SEED_COUNTERS is only supported with the memory store");
        }

        let epoch = Duration::from_millis(args.epoch_ms);
        let unix_now = SystemClock::default().current_millis();
        if args.epoch_ms > unix_now {
            bail!("EPOCH_MS ({}) lies in the future", args.epoch_ms);
        }
        let elapsed = SystemClock::with_epoch(epoch).current_millis();
        if elapsed > SnowflakeId::max_timestamp() {
            bail!(
                "{elapsed} ms since EPOCH_MS do not fit the {}-bit timestamp field",
                SnowflakeId::TIMESTAMP_BITS
            );
        }

        let seeds = args
            .seed
            .iter()
            .map(|raw| parse_seed(raw))
            .collect::<anyhow::Result<Vec<_>>>()?;

        let retry = RetryPolicy::new(
            args.max_attempts,
            Duration::ZERO,
            Duration::from_millis(args.backoff_ms),
        );

        let machine_id = match args.machine_id {
            Some(id) => MachineIdSource::Override(id),
            None => MachineIdSource::Store { key: args.uuid_key },
        };

        Ok(Self {
            server_addr: args.server_addr,
            uds: args.uds,
            store: args.store,
            etcd_endpoints: args.etcd_endpoints,
            store_pool_size: args.store_pool_size,
            store_timeout: Duration::from_millis(args.store_timeout_ms),
            machine_id,
            allow_machine_id_wraparound: args.allow_machine_id_wraparound,
            sequence: SequenceConfig {
                prefix: args.pk_root,
                step: args.incr_step,
                policy: retry,
            },
            retry,
            epoch,
            uuid_queue_size: args.uuid_queue_size,
            shutdown_timeout: Duration::from_secs(args.shutdown_timeout),
            seeds,
            log_format: args.log_format,
        })
    }
}

fn parse_seed(raw: &str) -> anyhow::Result<(String, i64)> {
    let (name, value) = raw
        .split_once('=')
        .with_context(|| format!("seed `{raw}` is not of the form name=value"))?;
    let name = name.trim();
    if name.is_empty() {
        bail!("seed `{raw}` has an empty name");
    }
    let value = value
        .trim()
        .parse::<i64>()
        .with_context(|| format!("seed `{raw}` does not hold an integer"))?;
    Ok((name.to_owned(), value))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(extra: &[&str]) -> anyhow::Result<ServerConfig> {
        let mut argv = vec!["seqflake-tonic-server", "--store", "memory"];
        argv.extend_from_slice(extra);
        ServerConfig::try_from(CliArgs::try_parse_from(argv)?)
    }

    #[test]
    fn defaults() {
        let config = parse(&[]).unwrap();
        assert_eq!(config.server_addr, "0.0.0.0:50005");
        assert_eq!(config.store_pool_size, 128);
        assert_eq!(config.sequence.step, 1);
        assert_eq!(config.sequence.prefix, "/seqs");
        assert_eq!(config.retry.max_attempts, 32);
        assert_eq!(config.retry.max_jitter, Duration::from_millis(100));
        assert_eq!(config.uuid_queue_size, 1024);
        assert_eq!(
            config.machine_id,
            MachineIdSource::Store {
                key: "/seqs/snowflake-uuid".into()
            }
        );
        assert_eq!(config.counter_key("orders"), "/seqs/orders");
    }

    #[test]
    fn machine_id_override() {
        let config = parse(&["--machine-id", "7"]).unwrap();
        assert_eq!(config.machine_id, MachineIdSource::Override(7));
    }

    #[test]
    fn rejects_zero_step() {
        assert!(parse(&["--incr-step", "0"]).is_err());
    }

    #[test]
    fn rejects_zero_attempts_and_pool() {
        assert!(parse(&["--max-attempts", "0"]).is_err());
        assert!(parse(&["--store-pool-size", "0"]).is_err());
        assert!(parse(&["--uuid-queue-size", "0"]).is_err());
    }

    #[test]
    fn rejects_future_epoch() {
        assert!(parse(&["--epoch-ms", &u64::MAX.to_string()]).is_err());
    }

    #[test]
    fn parses_seeds() {
        let config = parse(&["--seed", "orders=100,jobs = -3"]).unwrap();
        assert_eq!(
            config.seeds,
            vec![("orders".to_owned(), 100), ("jobs".to_owned(), -3)]
        );
        assert!(parse(&["--seed", "orders"]).is_err());
        assert!(parse(&["--seed", "orders=abc"]).is_err());
        assert!(parse(&["--seed", "=1"]).is_err());
    }

    #[test]
    fn seeds_require_memory_store() {
        let args = CliArgs::try_parse_from([
            "seqflake-tonic-server",
            "--store",
            "etcd",
            "--seed",
            "orders=1",
        ])
        .unwrap();
        assert!(ServerConfig::try_from(args).is_err());
    }
}
