//! Argument definitions, kept apart from `main` per `jacquard-lexicon`'s
//! `cli.rs`/`bin/*.rs` split.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Compress or inspect did:plc operation chains.
#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "Differential codec for did:plc operation chains"
)]
pub struct Args {
    /// Subcommand to run
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Compress a JSON array of operations into a binary chain blob
    Compress {
        /// Path to a JSON file containing an array of operations
        input: PathBuf,
        /// Path to write the compressed blob to
        #[arg(short, long)]
        output: PathBuf,
    },
    /// Decompress a binary chain blob back into a JSON array of operations
    Decompress {
        /// Path to a compressed blob
        input: PathBuf,
        /// Path to write the decoded JSON array to
        #[arg(short, long)]
        output: PathBuf,
    },
    /// Print size and operation-count statistics for a chain blob
    Stats {
        /// Path to a compressed blob
        input: PathBuf,
    },
}
