use clap::{Parser, Subcommand};
use lore_rag::Result;
use lore_rag::commands::{ask, configure, coverage, evaluate, gather, index, search, show_status};
use lore_rag::config::{Config, get_config_dir};
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "lore-rag")]
#[command(about = "Answer Minecraft questions from a locally indexed copy of the wiki")]
#[command(version)]
struct Cli {
    /// Data directory holding config.toml, the corpus and the vector store
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Configure Ollama connection and settings
    Config {
        /// Show current configuration
        #[arg(long)]
        show: bool,
    },
    /// Download the configured wiki pages into the corpus files
    Gather,
    /// Chunk, embed and store the corpus
    Index {
        /// Corpus file to index (text or .json), defaults to the gathered text corpus
        #[arg(long)]
        corpus: Option<PathBuf>,
        /// Replace the existing vector store once every chunk has been embedded
        #[arg(long)]
        rebuild: bool,
    },
    /// Answer a question from the indexed corpus
    Ask {
        question: String,
        /// Number of chunks to retrieve
        #[arg(long)]
        top_k: Option<usize>,
        /// Print the retrieved chunks before the answer
        #[arg(long)]
        show_context: bool,
    },
    /// Show the chunks retrieved for a query
    Search {
        query: String,
        #[arg(long)]
        top_k: Option<usize>,
    },
    /// Measure retrieval quality against a gold prompt file
    Eval {
        /// JSON array of gold prompts
        #[arg(long)]
        gold: PathBuf,
        #[arg(long)]
        top_k: Option<usize>,
        /// Output directory for the result files
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Check which expected answers are missing from the corpus
    Coverage {
        #[arg(long)]
        gold: PathBuf,
        #[arg(long)]
        corpus: Option<PathBuf>,
    },
    /// Show corpus, vector store and Ollama status
    Status,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let data_dir = match cli.data_dir {
        Some(dir) => dir,
        None => get_config_dir().map_err(|e| lore_rag::LoreError::Config(e.to_string()))?,
    };

    run(cli.command, &data_dir).await
}

async fn run(command: Commands, data_dir: &Path) -> Result<()> {
    match command {
        Commands::Config { show } => {
            configure(data_dir, show)?;
        }
        Commands::Gather => {
            gather(&Config::load(data_dir)?).await?;
        }
        Commands::Index { corpus, rebuild } => {
            index(&Config::load(data_dir)?, corpus.as_deref(), rebuild).await?;
        }
        Commands::Ask {
            question,
            top_k,
            show_context,
        } => {
            ask(&Config::load(data_dir)?, &question, top_k, show_context).await?;
        }
        Commands::Search { query, top_k } => {
            search(&Config::load(data_dir)?, &query, top_k).await?;
        }
        Commands::Eval { gold, top_k, out } => {
            evaluate(&Config::load(data_dir)?, &gold, top_k, out).await?;
        }
        Commands::Coverage { gold, corpus } => {
            coverage(&Config::load(data_dir)?, &gold, corpus.as_deref())?;
        }
        Commands::Status => {
            show_status(&Config::load(data_dir)?).await?;
        }
    }

    Ok(())
}
