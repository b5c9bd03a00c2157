//! Command-line interface module.

mod args;
pub mod init;
pub mod rewrite;

pub use args::{Cli, Commands, RewriteArgs};
