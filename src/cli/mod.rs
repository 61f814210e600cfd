//! CLI command definitions and parsing
pub mod eval;

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "hybrid-rerank",
    version,
    author = "neur0map",
    about = "Hybrid passage retrieval with BM25 reranking of vector candidates",
    long_about = "hybrid-rerank ingests plain-text documents into bounded passages, builds an aligned \
                  vector + BM25 index, and answers free-text queries by reranking the nearest vector \
                  candidates with a weighted fusion of semantic and lexical relevance."
)]
pub struct Cli {
    /// Global config file path (defaults to ~/.config/hybrid-rerank/config.toml)
    #[arg(short, long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Configuration profile to apply (defined under [profiles] in the config file)
    #[arg(short, long, global = true)]
    pub profile: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Chunk source documents into the chunk database
    Ingest {
        /// Directory holding the files listed in the source catalog
        #[arg(short, long, value_name = "DIR")]
        input: PathBuf,

        /// Source catalog (defaults to storage.sources_file)
        #[arg(short, long, value_name = "FILE")]
        sources: Option<PathBuf>,
    },

    /// Build a new index generation from the chunk database
    Build,

    /// Query the local index
    Query {
        /// Search query text
        query: String,

        /// Number of results (defaults to retrieval.default_top_k)
        #[arg(short = 'k', long)]
        top_k: Option<usize>,

        /// Show results in JSON format
        #[arg(long)]
        json: bool,
    },

    /// Serve queries over TCP
    Serve {
        /// Address to bind (defaults to server.bind)
        #[arg(short, long)]
        bind: Option<String>,
    },

    /// Query a running server
    Ask {
        /// Search query text
        query: String,

        /// Number of results (server default when omitted)
        #[arg(short = 'k', long)]
        top_k: Option<usize>,

        /// Server address (defaults to server.bind)
        #[arg(short, long)]
        server: Option<String>,
    },

    /// Compare vector-only and reranked top results for a question set
    Eval {
        /// JSON list of questions: strings or {"q": "..."} objects
        questions: PathBuf,

        /// Number of results retrieved per question
        #[arg(short = 'k', long, default_value = "3")]
        top_k: usize,
    },

    /// Show index generation and chunk database status
    Status,

    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Show current configuration
    Show,

    /// Validate configuration file
    Validate {
        /// Path to config file (defaults to standard location)
        #[arg(short, long)]
        file: Option<PathBuf>,
    },

    /// Initialize default configuration
    Init {
        /// Force overwrite existing config
        #[arg(short, long)]
        force: bool,
    },
}

impl Cli {
    /// Parse CLI arguments from command line
    pub fn parse_args() -> Self {
        Self::parse()
    }
}
