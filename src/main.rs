//! nltype command-line entry point

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use nltype::{Config, ResponsivenessLevel};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

mod cli;

/// nltype: type-check the semantics of natural-language text
#[derive(Parser, Debug)]
#[command(name = "nltype")]
#[command(version, about, long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, global = true)]
    config: Option<String>,

    /// Output as JSON
    #[arg(long, global = true)]
    json: bool,

    /// Enable JSON logging format
    #[arg(long, global = true)]
    json_logs: bool,

    /// Override the configured model
    #[arg(long, global = true)]
    model: Option<String>,

    /// Override the configured responsiveness level (low, medium, high)
    #[arg(long, global = true)]
    level: Option<ResponsivenessLevel>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Split text into minimal declarative propositions
    Decompose {
        /// Text to decompose
        text: String,
    },
    /// Annotate propositions with entity and relation types
    Annotate {
        /// One proposition per argument
        #[arg(required = true)]
        lines: Vec<String>,
        /// Revise already-annotated lines instead of annotating plain ones
        #[arg(short, long)]
        revise: bool,
        /// Extra guidance for revision
        #[arg(long, requires = "revise")]
        context: Option<String>,
    },
    /// Verify already-annotated propositions
    Verify {
        /// One annotated proposition per argument, e.g. "The dog (animal) is barking."
        #[arg(required = true)]
        lines: Vec<String>,
    },
    /// Run the full pipeline on a text
    Check {
        /// Text to check
        text: String,
        /// Revise and re-verify up to this many times while the verdict fails
        #[arg(short, long, default_value = "0")]
        max_revisions: usize,
        /// Extra guidance passed along with every revision
        #[arg(long)]
        context: Option<String>,
    },
    /// Check every non-blank line of a file as an independent text
    Batch {
        /// Input file, one text per line
        file: PathBuf,
        /// Maximum number of texts in flight (defaults to config)
        #[arg(short = 'n', long)]
        concurrency: Option<usize>,
    },
    /// Print the entity and relation taxonomy
    Taxonomy,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // One-shot commands stay quiet unless RUST_LOG says otherwise
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    if args.json_logs {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    }

    let mut config = if let Some(path) = &args.config {
        Config::from_file(path)?
    } else {
        Config::load()?
    };
    if let Some(model) = args.model {
        config.oracle.model = model;
    }
    if let Some(level) = args.level {
        config.oracle.level = level;
    }

    match args.command {
        Command::Decompose { text } => cli::run_decompose(&config, text, args.json).await,
        Command::Annotate {
            lines,
            revise,
            context,
        } => cli::run_annotate(&config, lines, revise, context, args.json).await,
        Command::Verify { lines } => cli::run_verify(&config, lines, args.json).await,
        Command::Check {
            text,
            max_revisions,
            context,
        } => cli::run_check(&config, text, max_revisions, context, args.json).await,
        Command::Batch { file, concurrency } => {
            cli::run_batch(&config, file, concurrency, args.json).await
        }
        Command::Taxonomy => cli::run_taxonomy(args.json),
    }
}
