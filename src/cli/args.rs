use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "treecache")]
#[command(version)]
#[command(about = "Inspect and maintain cached remote directory listings", long_about = None)]
pub struct Cli {
    /// Path to configuration file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Snapshot directory (overrides configuration)
    #[arg(long, global = true, env = "TREECACHE_DIR")]
    pub cache_dir: Option<PathBuf>,

    /// Verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Show how old a repository's snapshot is and whether it has expired
    Status {
        /// Repository id
        id: String,
    },
    /// List every snapshot on disk
    List,
    /// Show a snapshot's totals and directories
    Show {
        /// Repository id
        id: String,
    },
    /// Delete a repository's snapshot
    Invalidate {
        /// Repository id
        id: String,
    },
    /// Delete all expired snapshots
    Sweep,
    /// Print the identity fingerprint for connection settings
    Fingerprint {
        /// Server address
        #[arg(long)]
        address: String,
        /// Server port
        #[arg(long, default_value_t = 21)]
        port: u16,
        /// Account name
        #[arg(long, default_value = "anonymous")]
        username: String,
    },
    /// Create a default configuration file
    Init,
}
