//! CLI command definitions and parsing
use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "passim",
    version,
    about = "Contract passage indexing with hybrid lexical + vector retrieval",
    long_about = "Passim ingests contract documents, reconciles extracted passage spans \
                  against the verbatim source text, and indexes passages for hybrid \
                  retrieval: BM25 and vector nearest-neighbor queries fused with \
                  Reciprocal Rank Fusion."
)]
pub struct Cli {
    /// Config file path (defaults to ~/.config/passim/config.toml)
    #[arg(short, long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Ingest a document: parse, extract passages, embed, and index
    Ingest {
        /// Path to the document file
        file: PathBuf,
    },

    /// Hybrid search over indexed passages
    Search {
        /// Query text
        query: String,

        /// Restrict to passage categories (repeatable)
        #[arg(short = 'c', long = "category")]
        categories: Vec<String>,

        /// Restrict to document ids (repeatable)
        #[arg(short = 'd', long = "document-id")]
        document_ids: Vec<String>,

        /// Number of results to return (1-100)
        #[arg(short = 'k', long, default_value = "10")]
        top_k: usize,

        /// Emit results as JSON
        #[arg(long)]
        json: bool,
    },

    /// List ingested documents, most recent first
    List {
        /// Maximum number of documents to show
        #[arg(short, long, default_value = "100")]
        limit: usize,
    },

    /// Show one document and its indexed passages
    Show {
        /// Document id
        document_id: String,
    },
}

impl Cli {
    pub fn parse_args() -> Self {
        Self::parse()
    }
}
