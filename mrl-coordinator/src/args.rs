use std::net::SocketAddr;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;

use scheduler::SchedulerConfig;

#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
pub struct Args {
    /// Input partitions, one map task each.
    #[arg(required = true, num_args = 1..)]
    pub inputs: Vec<String>,

    /// Number of reduce tasks (reduce buckets).
    #[arg(short, long, default_value = "10", value_parser = clap::value_parser!(u32).range(1..))]
    pub n_reduce: u32,

    /// The host for the server to bind to.
    #[arg(long, default_value = "[::1]")]
    pub host: String,

    /// The port for the server to run on.
    #[arg(short, long, default_value = "8030")]
    pub port: u16,

    /// Seconds an executor may hold a task without reporting before the task
    /// is handed to someone else.
    #[arg(short, long, default_value = "10")]
    pub stale_after_secs: u64,

    /// How often to check whether the job is complete, in milliseconds.
    #[arg(long, default_value = "1000")]
    pub poll_interval_ms: u64,

    /// How long to keep answering executors after the job completes, so
    /// they can be told to exit, in milliseconds.
    #[arg(long, default_value = "1000")]
    pub grace_ms: u64,
}

impl Args {
    pub fn socket_addr(&self) -> anyhow::Result<SocketAddr> {
        let addr = format!("{}:{}", self.host, self.port);
        addr.parse()
            .with_context(|| format!("Invalid listen address `{}`", addr))
    }

    pub fn scheduler_config(&self) -> SchedulerConfig {
        SchedulerConfig::new(self.n_reduce as usize)
            .with_stale_after(Duration::from_secs(self.stale_after_secs))
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn grace(&self) -> Duration {
        Duration::from_millis(self.grace_ms)
    }
}
