pub use clap::Parser;

use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "drive")]
#[command(about = "Edit locks, cached store access and explorer listings for a shared file drive")]
pub struct Args {
    /// Path to the drive config directory (defaults to ~/.drive)
    #[arg(long, global = true)]
    pub config_path: Option<PathBuf>,

    #[command(subcommand)]
    pub command: crate::Command,
}
