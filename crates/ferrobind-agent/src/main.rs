//! Ferrobind — literature question answering for peptide binder research.
//! Entry point for the CLI binary.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use ferrobind_agent::{Config, Pipeline, RunOutcome};
use ferrobind_common::SourceKind;
use ferrobind_ingestion::SourceOutcome;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Ask literature questions across PubMed, bioRxiv, Scopus and Web of Science
#[derive(Parser, Debug)]
#[command(name = "ferrobind", version, about, long_about = None)]
struct Cli {
    /// Configuration file path (defaults to $FERROBIND_CONFIG or ./ferrobind.toml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Answer a question from the literature
    Ask {
        question: String,

        /// Sources to query, comma separated (pubmed,biorxiv,scopus,wos)
        #[arg(short, long, value_delimiter = ',')]
        sources: Vec<SourceKind>,

        /// Pages to fetch per source
        #[arg(long)]
        page_limit: Option<usize>,

        /// Overall deadline for the source fan-out, in milliseconds
        #[arg(long)]
        deadline_ms: Option<u64>,

        /// Print the answer as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show recent searches
    History {
        #[arg(short, long, default_value_t = 10)]
        limit: usize,

        /// Show answered questions instead of searches
        #[arg(long)]
        questions: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();

    // Initialise structured logging; stdout is reserved for answers
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("ferrobind=debug,info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    info!("Ferrobind {}", env!("CARGO_PKG_VERSION"));

    let mut config = match &cli.config {
        Some(path) => Config::load_from(path)?,
        None => Config::load()?,
    };

    match cli.command {
        Commands::Ask { question, sources, page_limit, deadline_ms, json } => {
            if !sources.is_empty() {
                config.sources.enabled = sources;
            }
            if let Some(pages) = page_limit {
                config.aggregation.page_limit = pages;
            }
            if let Some(ms) = deadline_ms {
                config.aggregation.deadline_ms = ms;
            }

            let pipeline = Pipeline::from_config(&config).await?;
            let outcome = pipeline.run(&question).await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&outcome.answer)?);
            } else {
                print_outcome(&outcome);
            }
        }
        Commands::History { limit, questions } => {
            let pipeline = Pipeline::from_config(&config).await?;
            if questions {
                for entry in pipeline.store().recent_questions(limit).await? {
                    let mark = if entry.evidence_found { "+" } else { "-" };
                    println!(
                        "{}  [{mark}] {}  ({} cited)",
                        entry.asked_at.format("%Y-%m-%d %H:%M"),
                        entry.question,
                        entry.cited.len()
                    );
                }
            } else {
                for entry in pipeline.store().recent_searches(limit).await? {
                    let sources: Vec<&str> = entry.sources.iter().map(|s| s.as_str()).collect();
                    println!(
                        "{}  {}  [{}]  {} records",
                        entry.searched_at.format("%Y-%m-%d %H:%M"),
                        entry.keywords,
                        sources.join(","),
                        entry.result_count
                    );
                }
            }
        }
    }

    Ok(())
}

fn print_outcome(outcome: &RunOutcome) {
    println!("{}\n", outcome.answer.text);
    println!("Sources:");
    for (kind, result) in &outcome.report.outcomes {
        let status = match result {
            SourceOutcome::Returned { records } => format!("{records} records"),
            SourceOutcome::Failed { reason } => format!("unavailable ({reason})"),
            SourceOutcome::TimedOut => "timed out".to_string(),
        };
        println!("  {:<8} {status}", kind.as_str());
    }
    println!(
        "{} merged records, {} facts (run {})",
        outcome.report.records.len(),
        outcome.facts.len(),
        outcome.run_id
    );
}
