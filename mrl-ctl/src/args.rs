use clap::{Parser, Subcommand};

//
// For parsing user specified command.
//
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
pub struct Args {
    /// The address of the coordinator server.
    #[arg(short, long, default_value = "http://[::1]:8030")]
    pub address: String,

    #[clap(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Display the job's phase and how many map and reduce tasks are done.
    Status,
    /// Block until the job is complete.
    Wait {
        /// Milliseconds between status polls.
        #[arg(short, long, default_value = "1000")]
        interval_ms: u64,
    },
}

/// Parse user command.
/// Can be 1 of 2:
/// - status
/// - wait
pub fn parse_args() -> Args {
    Args::parse()
}
