pub mod completions;
pub mod init;
pub mod recolor;
pub mod session;

use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};

use crate::config::Config;
use crate::error::Result;

/// colorsense - click-to-recolor for room photos
#[derive(Parser, Debug)]
#[command(name = "colorsense")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Config file (default: colorsense.yaml in the current directory, if present)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Show debug logging
    #[arg(long, short, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Recolor regions of an image by clicking points
    Recolor(recolor::RecolorArgs),

    /// Serve JSON-line requests on stdin, one reply per line on stdout
    Session(session::SessionArgs),

    /// Write a default colorsense.yaml
    Init(init::InitArgs),

    /// Generate shell completions
    Completions(completions::CompletionsArgs),
}

/// Resolve the config for commands that run the service.
pub fn load_config(path: Option<&Path>) -> Result<Config> {
    let cwd = std::env::current_dir()?;
    Config::discover(path, &cwd)
}
