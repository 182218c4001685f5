use clap::{Parser, Subcommand};
use std::path::PathBuf;
use stemdub_core::config::Stem;

#[derive(Parser)]
#[command(name = "stemdub")]
#[command(author, version, about = "Download videos and remux them with a separated audio stem")]
pub struct Cli {
    /// Path to config file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start the HTTP server
    Start {
        /// Host to bind to (overrides the config file)
        #[arg(long)]
        host: Option<String>,

        /// Port to listen on (overrides the config file)
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Run one conversion job in the foreground
    Convert {
        /// Source video or playlist URL
        #[arg(required = true)]
        url: String,

        /// Cookies as a JSON array, or @path to read them from a file
        #[arg(long)]
        cookies: Option<String>,

        /// Base URL used to build result links
        #[arg(long, default_value = "http://localhost:8000/")]
        base_url: String,

        /// Stem to keep: vocals, or accompaniment (alias: instrumental)
        #[arg(long)]
        stem: Option<Stem>,
    },

    /// List the entries of a playlist without downloading
    Probe {
        /// Playlist URL
        #[arg(required = true)]
        url: String,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Check that required external tools are available
    CheckTools,

    /// Validate configuration file
    Validate {
        /// Config file to validate (uses default if not specified)
        config: Option<PathBuf>,
    },

    /// Empty the staging directories
    Reset {
        /// Leave the output directory alone
        #[arg(long)]
        keep_output: bool,
    },

    /// Display version information
    Version,
}
