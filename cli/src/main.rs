// Copyright 2025 Dagbox Contributors
// SPDX-License-Identifier: Apache-2.0, MIT

/// Command line interface for the Dagbox client.
///
/// Supports uploading content to a storage node and querying the node's
/// identity and version. Uses `clap` for argument parsing and `stderrlog`
/// for logging.
use clap::{Args, Parser, Subcommand};
use clap_stdin::{FileOrStdin, Source};
use futures::StreamExt;
use std::path::PathBuf;
use stderrlog::Timestamp;

use dagbox_client::{AddInput, AddOptions, Client, Config};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Node API endpoint.
    #[arg(long, env = "DAGBOX_API", default_value = "http://127.0.0.1:5001")]
    api: String,

    /// Increase log verbosity.
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

#[derive(Subcommand)]
enum Commands {
    /// Upload content to the node.
    Add(AddArgs),
    /// Show the node's identity.
    Id,
    /// Show the node's version.
    Version,
}

#[derive(Args)]
struct AddArgs {
    /// File to upload; `-` reads from stdin.
    input: FileOrStdin,

    /// Pin the content on the node.
    #[arg(long)]
    pin: Option<bool>,

    /// Compute the content identifier without storing anything.
    #[arg(long)]
    only_hash: bool,

    /// Wrap the uploaded content in a directory.
    #[arg(long)]
    wrap_with_directory: bool,

    /// Chunking strategy, e.g. `size-262144`.
    #[arg(long)]
    chunker: Option<String>,

    /// Report upload progress on stderr.
    #[arg(long)]
    progress: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    stderrlog::new()
        .module(module_path!())
        .verbosity(cli.verbose as usize)
        .timestamp(Timestamp::Millisecond)
        .init()
        .unwrap();

    let client = Client::new(Config::new(cli.api.clone()))?;

    match cli.command {
        Commands::Add(args) => {
            let mut options = AddOptions::new();
            if let Some(pin) = args.pin {
                options = options.pin(pin);
            }
            if args.only_hash {
                options = options.only_hash(true);
            }
            if args.wrap_with_directory {
                options = options.wrap_with_directory(true);
            }
            if let Some(chunker) = args.chunker {
                options = options.chunker(chunker);
            }
            if args.progress {
                options = options.on_progress(|bytes| eprintln!("{bytes} bytes processed"));
            }

            let records = client.add(upload_input(&args.input), options).await?;
            futures::pin_mut!(records);
            while let Some(record) = records.next().await {
                let record = record?;
                println!("added {} {}", record.cid, record.path);
            }
        }
        Commands::Id => {
            let identity = client.id().await?;
            println!("{}", serde_json::to_string_pretty(&identity)?);
        }
        Commands::Version => {
            let version = client.version().await?;
            println!("{}", serde_json::to_string_pretty(&version)?);
        }
    }

    Ok(())
}

/// File arguments are uploaded as paths, streamed from disk without ever
/// passing through a `String`; `-` streams raw bytes from stdin. Either way
/// binary content survives untouched.
fn upload_input(input: &FileOrStdin) -> AddInput {
    match &input.source {
        Source::Arg(path) => AddInput::from(PathBuf::from(path)),
        Source::Stdin => AddInput::reader(tokio::io::stdin()),
    }
}
