//! Command-line interface definitions.

use clap::{ColorChoice, Parser, Subcommand};
use std::path::PathBuf;

use cssurl::config::{CONFIG_FILE, Overrides};
use cssurl::policy::TransformKind;

/// Rewrite url() and @import references in stylesheets
#[derive(Parser, Debug, Clone)]
#[command(version, about, long_about = None, arg_required_else_help = true)]
pub struct Cli {
    /// Control colored output (auto, always, never)
    #[arg(long, global = true, default_value = "auto")]
    pub color: ColorChoice,

    /// Config file path (default: cssurl.toml, searched upward)
    #[arg(short = 'C', long, global = true, default_value = CONFIG_FILE, value_hint = clap::ValueHint::FilePath)]
    pub config: PathBuf,

    /// subcommands
    #[command(subcommand)]
    pub command: Commands,
}

/// Available subcommands
#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Rewrite stylesheets
    #[command(visible_alias = "r")]
    Rewrite {
        #[command(flatten)]
        args: RewriteArgs,
    },

    /// Write a commented default config file
    #[command(visible_alias = "i")]
    Init {
        /// Overwrite an existing config file
        #[arg(short, long)]
        force: bool,
    },
}

/// Arguments for `cssurl rewrite`
#[derive(clap::Args, Debug, Clone)]
pub struct RewriteArgs {
    /// Stylesheets or directories to scan for *.css (default: .)
    #[arg(value_hint = clap::ValueHint::AnyPath)]
    pub paths: Vec<PathBuf>,

    /// Prefix prepended to every rewritten path
    #[arg(short, long)]
    pub prefix: Option<String>,

    /// Resolution root (overrides each input's own base)
    #[arg(short, long, value_hint = clap::ValueHint::DirPath)]
    pub base_dir: Option<PathBuf>,

    /// Output directory (stdout when omitted)
    #[arg(short, long, value_hint = clap::ValueHint::DirPath)]
    pub out: Option<PathBuf>,

    /// Feed documents through stream mode
    #[arg(long)]
    pub stream: bool,

    /// Post-process rewritten URLs
    #[arg(short, long, value_enum)]
    pub transform: Option<TransformKind>,

    /// Print a line for every rewritten URL
    #[arg(short = 'V', long)]
    pub verbose: bool,
}

impl RewriteArgs {
    /// Flags that take precedence over the config file.
    pub fn overrides(&self) -> Overrides {
        Overrides {
            prefix: self.prefix.clone(),
            base_dir: self.base_dir.clone(),
            out: self.out.clone(),
            stream: self.stream,
            transform: self.transform,
        }
    }
}
