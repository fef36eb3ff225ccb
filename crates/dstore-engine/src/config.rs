//! Tunables for every background loop (spec §6 configuration table).

use std::time::Duration;

/// Every tick period and retry knob the engine's loops read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineConfig {
    pub min_replicas: u32,
    pub heartbeat_timeout: Duration,
    pub nl_tick: Duration,
    pub rc_tick: Duration,
    pub iv_tick: Duration,
    pub rq_main_tick: Duration,
    pub rq_priority_tick: Duration,
    pub rq_proactive_tick: Duration,
    pub retry_delay: Duration,
    pub max_attempts: u32,
    pub max_concurrent: usize,
    pub history_cap: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            min_replicas: 2,
            heartbeat_timeout: Duration::from_secs(30),
            nl_tick: Duration::from_secs(10),
            rc_tick: Duration::from_secs(30),
            iv_tick: Duration::from_secs(300),
            rq_main_tick: Duration::from_secs(45),
            rq_priority_tick: Duration::from_secs(10),
            rq_proactive_tick: Duration::from_secs(60),
            retry_delay: Duration::from_secs(300),
            max_attempts: 3,
            max_concurrent: 3,
            history_cap: 100,
        }
    }
}

impl EngineConfig {
    pub fn heartbeat_timeout_chrono(&self) -> chrono::Duration {
        chrono::Duration::from_std(self.heartbeat_timeout)
            .unwrap_or_else(|_| chrono::Duration::seconds(30))
    }
}
