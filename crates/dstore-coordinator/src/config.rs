//! Command-line and environment configuration for the coordinator binary.

use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use dstore_engine::EngineConfig;

#[derive(Parser, Debug)]
#[command(name = "dstore-coordinator")]
#[command(about = "Availability engine coordinator")]
#[command(version)]
pub struct Cli {
    /// Port to bind the HTTP API on.
    #[arg(short, long, default_value = "8080")]
    pub port: u16,

    /// Directory for the file-backed metadata store. If unset, metadata
    /// lives in memory only and is lost on restart.
    #[arg(long)]
    pub data_dir: Option<PathBuf>,

    /// Minimum active replicas a file must maintain.
    #[arg(long, default_value = "2")]
    pub min_replicas: u32,

    /// Seconds since the last heartbeat after which a node is inactivated.
    #[arg(long, default_value = "30")]
    pub heartbeat_timeout_secs: u64,

    /// Node Liveness loop tick period, in seconds.
    #[arg(long, default_value = "10")]
    pub nl_tick_secs: u64,

    /// Replication Controller tick period, in seconds.
    #[arg(long, default_value = "30")]
    pub rc_tick_secs: u64,

    /// Integrity Verifier tick period, in seconds.
    #[arg(long, default_value = "300")]
    pub iv_tick_secs: u64,

    /// Recovery Queue main-loop tick period, in seconds.
    #[arg(long, default_value = "45")]
    pub rq_main_tick_secs: u64,

    /// Recovery Queue priority-loop tick period, in seconds.
    #[arg(long, default_value = "10")]
    pub rq_priority_tick_secs: u64,

    /// Recovery Queue proactive-scan tick period, in seconds.
    #[arg(long, default_value = "60")]
    pub rq_proactive_tick_secs: u64,

    /// Delay before a failed recovery record is retried, in seconds.
    #[arg(long, default_value = "300")]
    pub retry_delay_secs: u64,

    /// Maximum attempts before a recovery record is abandoned.
    #[arg(long, default_value = "3")]
    pub max_attempts: u32,

    /// Maximum recovery attempts running concurrently.
    #[arg(long, default_value = "3")]
    pub max_concurrent: usize,

    /// Number of entries retained in the recovery history ring.
    #[arg(long, default_value = "100")]
    pub history_cap: usize,
}

impl Cli {
    /// Builds the engine configuration from parsed flags, then lets
    /// `DSTORE_*` environment variables override anything still at its
    /// clap default (flags win when both are given explicitly; env vars
    /// are the documented escape hatch for container deployments).
    pub fn engine_config(&self) -> EngineConfig {
        let mut config = EngineConfig {
            min_replicas: self.min_replicas,
            heartbeat_timeout: Duration::from_secs(self.heartbeat_timeout_secs),
            nl_tick: Duration::from_secs(self.nl_tick_secs),
            rc_tick: Duration::from_secs(self.rc_tick_secs),
            iv_tick: Duration::from_secs(self.iv_tick_secs),
            rq_main_tick: Duration::from_secs(self.rq_main_tick_secs),
            rq_priority_tick: Duration::from_secs(self.rq_priority_tick_secs),
            rq_proactive_tick: Duration::from_secs(self.rq_proactive_tick_secs),
            retry_delay: Duration::from_secs(self.retry_delay_secs),
            max_attempts: self.max_attempts,
            max_concurrent: self.max_concurrent,
            history_cap: self.history_cap,
        };
        apply_env_overrides(&mut config);
        config
    }
}

fn env_u32(key: &str, value: &mut u32) {
    if let Some(v) = std::env::var(key).ok().and_then(|s| s.parse().ok()) {
        *value = v;
    }
}

fn env_usize(key: &str, value: &mut usize) {
    if let Some(v) = std::env::var(key).ok().and_then(|s| s.parse().ok()) {
        *value = v;
    }
}

fn env_secs(key: &str, value: &mut Duration) {
    if let Some(v) = std::env::var(key).ok().and_then(|s| s.parse().ok()) {
        *value = Duration::from_secs(v);
    }
}

fn apply_env_overrides(config: &mut EngineConfig) {
    env_u32("DSTORE_MIN_REPLICAS", &mut config.min_replicas);
    env_secs("DSTORE_HEARTBEAT_TIMEOUT_SECS", &mut config.heartbeat_timeout);
    env_secs("DSTORE_NL_TICK_SECS", &mut config.nl_tick);
    env_secs("DSTORE_RC_TICK_SECS", &mut config.rc_tick);
    env_secs("DSTORE_IV_TICK_SECS", &mut config.iv_tick);
    env_secs("DSTORE_RQ_MAIN_TICK_SECS", &mut config.rq_main_tick);
    env_secs("DSTORE_RQ_PRIORITY_TICK_SECS", &mut config.rq_priority_tick);
    env_secs("DSTORE_RQ_PROACTIVE_TICK_SECS", &mut config.rq_proactive_tick);
    env_secs("DSTORE_RETRY_DELAY_SECS", &mut config.retry_delay);
    env_u32("DSTORE_MAX_ATTEMPTS", &mut config.max_attempts);
    env_usize("DSTORE_MAX_CONCURRENT", &mut config.max_concurrent);
    env_usize("DSTORE_HISTORY_CAP", &mut config.history_cap);
}
