use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "xrefs")]
#[command(author, version, about = "Paginated cross-index references resolver")]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Create .xrefs/config.toml in the current directory
    Init {
        /// Overwrite an existing configuration
        #[arg(short, long)]
        force: bool,
    },

    /// Resolve references to the symbol at a position
    Resolve {
        /// JSON fixture describing uploads, symbols, moniker tables and diffs
        #[arg(short, long)]
        fixture: PathBuf,

        #[arg(short, long)]
        repository: String,

        #[arg(short, long)]
        commit: String,

        /// Repository-relative path of the source file
        #[arg(short, long)]
        path: String,

        /// Zero-based line
        #[arg(short, long)]
        line: u32,

        /// Zero-based character
        #[arg(long)]
        character: u32,

        /// Page size (defaults to resolver.default_page_size)
        #[arg(long)]
        limit: Option<usize>,

        /// Continuation token from a previous page
        #[arg(long, default_value = "")]
        cursor: String,

        /// Keep requesting pages until the result set is complete
        #[arg(long)]
        all: bool,

        /// Search for implementations instead of references
        #[arg(long)]
        implementations: bool,

        /// Print pages as JSON
        #[arg(long)]
        json: bool,

        /// Print resolver metrics afterwards
        #[arg(long)]
        metrics: bool,
    },

    /// Decode a continuation token and print it
    Cursor {
        token: String,
    },
}
