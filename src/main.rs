use anyhow::Result;
use clap::Parser;

use treecache::{
    app::{load_config_from, Config},
    cli::{handle_command, Cli, Commands},
    constants::VERBOSE_LOG_LEVEL,
    utils::init_logger,
};

fn main() -> Result<()> {
    // Parse CLI arguments
    let cli = Cli::parse();

    // init may be asked to create the file --config points at
    let config = match cli.command {
        Commands::Init => Config::default(),
        _ => load_config_from(cli.config.as_deref())?,
    };

    let level = if cli.verbose {
        VERBOSE_LOG_LEVEL
    } else {
        config.logging.level.as_str()
    };
    init_logger(level);

    handle_command(&cli, &config)
}
