//! cssurl - rewrite url() and @import references in stylesheets.

mod cli;

use anyhow::Result;
use clap::{ColorChoice, Parser};
use cli::{Cli, Commands};
use cssurl::config::CssurlConfig;
use cssurl::logger;

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Set global color override based on CLI option
    match cli.color {
        ColorChoice::Always => owo_colors::set_override(true),
        ColorChoice::Never => owo_colors::set_override(false),
        ColorChoice::Auto => {} // owo-colors auto-detects TTY
    }

    match &cli.command {
        Commands::Init { force } => {
            let cwd = std::env::current_dir()?;
            cli::init::write_config(&cwd.join(&cli.config), *force)
        }
        Commands::Rewrite { args } => {
            logger::set_verbose(args.verbose);
            let config = CssurlConfig::load(&cli.config, args.overrides())?;
            cli::rewrite::run(&config, args)
        }
    }
}
