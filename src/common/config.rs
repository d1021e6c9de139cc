use std::time::Duration;

use clap::Parser;
use tracing_subscriber::{fmt, EnvFilter};

pub const DEFAULT_RPC_TIMEOUT_MS: u64 = 1000;
pub const DEFAULT_INBOUND_CAPACITY: usize = 1024;

#[derive(Parser, Debug, Clone)]
#[command(name = "gossip-node", about = "Line-oriented JSON gossip node", version)]
pub struct Config {
    /// Milliseconds to wait for a reply before re-sending an originated request.
    #[arg(
        long,
        value_name = "MS",
        default_value_t = DEFAULT_RPC_TIMEOUT_MS,
        env = "GOSSIP_NODE_RPC_TIMEOUT_MS"
    )]
    pub rpc_timeout_ms: u64,

    /// Bound of the queue between the stdin reader and the node.
    #[arg(
        long,
        value_name = "N",
        default_value_t = DEFAULT_INBOUND_CAPACITY,
        env = "GOSSIP_NODE_INBOUND_CAPACITY"
    )]
    pub inbound_capacity: usize,

    /// Tracing filter directive. RUST_LOG takes precedence when set.
    #[arg(long, value_name = "FILTER", default_value = "info", env = "GOSSIP_NODE_LOG")]
    pub log_filter: String,
}

impl Config {
    pub fn rpc_timeout(&self) -> Duration {
        Duration::from_millis(self.rpc_timeout_ms)
    }

    /// Logs go to stderr; stdout carries the protocol.
    pub fn init_tracing(&self) {
        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(&self.log_filter));

        fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .with_ansi(false)
            .with_target(false)
            .init();
    }
}

impl Default for Config {
    fn default() -> Self {
        Config {
            rpc_timeout_ms: DEFAULT_RPC_TIMEOUT_MS,
            inbound_capacity: DEFAULT_INBOUND_CAPACITY,
            log_filter: "info".to_string(),
        }
    }
}
