use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "mimicd")]
#[command(about = "OpenAPI-driven mock HTTP server", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Serve mock responses for every operation in an OpenAPI spec
    Serve {
        #[arg(short, long)]
        spec: PathBuf,

        /// YAML config file (auth keys, rate limits, proxy, CORS, ...)
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Listen address; overrides the config file
        #[arg(long)]
        addr: Option<String>,

        /// Watch the spec file and hot-reload on change
        #[arg(long, default_value_t = false)]
        watch: bool,
    },
    /// Parse a spec and print the routing table
    Check {
        #[arg(short, long)]
        spec: PathBuf,
    },
    /// Mint an API key suitable for the config file
    Keygen {
        #[arg(short, long, default_value = "generated")]
        name: String,
    },
}
