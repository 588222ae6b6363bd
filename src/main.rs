//! CLI interface for docvec

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use docvec::config::AppConfig;
use docvec::corpus::load_corpus;
use docvec::embedding::{EmbeddingProvider, OpenAiEmbedder};
use docvec::error::DocvecError;
use docvec::persistence::DurableStore;
use docvec::pipeline::{IngestPipeline, QueryPipeline};
use docvec::server::{self, AppState};
use docvec::storage::RecordStore;

#[derive(Parser)]
#[command(name = "docvec")]
#[command(about = "Semantic search over a directory of text documents", long_about = None)]
struct Cli {
    /// TOML configuration file. Flags and environment variables override it.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Directory holding the write-ahead log and snapshots.
    #[arg(long, global = true, env = "DOCVEC_DATA_DIR")]
    data_dir: Option<PathBuf>,

    /// Embedding dimension of the store.
    #[arg(long, global = true)]
    dimension: Option<usize>,

    /// Embedding model name.
    #[arg(long, global = true)]
    model: Option<String>,

    /// Base URL of the embeddings API.
    #[arg(long, global = true)]
    base_url: Option<String>,

    #[arg(long, global = true, env = "OPENAI_API_KEY", hide_env_values = true)]
    api_key: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Embed every document of the corpus directory and store it
    Ingest {
        /// Corpus directory
        #[arg(long)]
        corpus: Option<PathBuf>,
        /// Skip documents whose embedding fails instead of stopping
        #[arg(long)]
        skip_failures: bool,
        /// Embedding requests in flight
        #[arg(long)]
        concurrency: Option<usize>,
    },
    /// Find the stored documents most similar to a query
    Search {
        /// Query text
        query: String,
        /// Number of results to return
        #[arg(short, long)]
        k: Option<usize>,
    },
    /// Show store statistics
    Stats,
    /// Write a snapshot and truncate the write-ahead log
    Checkpoint,
    /// Start the HTTP API server
    Serve {
        /// Address to bind to
        #[arg(long, default_value = "127.0.0.1:3000")]
        addr: String,
    },
}

fn apply_overrides(config: &mut AppConfig, cli: &Cli) {
    if let Some(dir) = &cli.data_dir {
        config.store.data_dir = dir.clone();
    }
    if let Some(dimension) = cli.dimension {
        config.store.dimension = dimension;
    }
    if let Some(model) = &cli.model {
        config.embedding.model = model.clone();
    }
    if let Some(base_url) = &cli.base_url {
        config.embedding.base_url = base_url.clone();
    }
    if let Commands::Ingest {
        corpus,
        skip_failures,
        concurrency,
    } = &cli.command
    {
        if let Some(corpus) = corpus {
            config.corpus.dir = corpus.clone();
        }
        if *skip_failures {
            config.corpus.skip_failures = true;
        }
        if let Some(concurrency) = concurrency {
            config.embedding.concurrency = *concurrency;
        }
    }
}

fn init_tracing(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn build_embedder(api_key: Option<&str>, config: &AppConfig) -> Result<Arc<dyn EmbeddingProvider>> {
    let api_key = api_key.context("OPENAI_API_KEY is not set (environment, .env or --api-key)")?;
    let embedder = OpenAiEmbedder::new(api_key)
        .context("creating embedding client")?
        .with_model(&config.embedding.model, config.store.dimension)
        .with_base_url(&config.embedding.base_url);
    Ok(Arc::new(embedder))
}

fn open_store(config: &AppConfig) -> Result<DurableStore> {
    DurableStore::open(&config.store.data_dir, config.engine_config())
        .with_context(|| format!("opening store at {}", config.store.data_dir.display()))
}

/// For commands that must not create a store as a side effect.
fn open_existing_store(config: &AppConfig) -> Result<DurableStore> {
    DurableStore::open_existing(&config.store.data_dir, config.engine_config()).with_context(|| {
        format!(
            "opening store at {} (run `docvec ingest` first)",
            config.store.data_dir.display()
        )
    })
}

async fn ingest(config: &AppConfig, embedder: Arc<dyn EmbeddingProvider>) -> Result<()> {
    let documents = load_corpus(&config.corpus.dir, &config.corpus.extension)
        .with_context(|| format!("loading corpus from {}", config.corpus.dir.display()))?;
    let texts: Vec<&str> = documents.iter().map(|d| d.text.as_str()).collect();

    let mut store = open_store(config)?;
    let pipeline = IngestPipeline::with_options(embedder, config.ingest_options());

    let report = match pipeline.ingest_batch(&mut store, &texts).await {
        Ok(report) => report,
        Err(DocvecError::BatchAborted {
            index,
            ingested,
            source,
        }) => {
            let path = documents
                .get(index)
                .map(|d| d.path.display().to_string())
                .unwrap_or_default();
            return Err(anyhow::Error::new(*source).context(format!(
                "ingesting document {} of {} ({}); {} stored before the failure",
                index + 1,
                documents.len(),
                path,
                ingested
            )));
        }
        Err(e) => return Err(anyhow::Error::new(e).context("ingesting corpus")),
    };

    for skipped in &report.skipped {
        if let Some(doc) = documents.get(skipped.index) {
            println!("Skipped {}: {}", doc.path.display(), skipped.error);
        }
    }
    println!("Ingested {} documents", report.ingested.len());
    Ok(())
}

async fn search(
    config: &AppConfig,
    embedder: Arc<dyn EmbeddingProvider>,
    query: &str,
    k: usize,
) -> Result<()> {
    let store = open_existing_store(config)?;
    let pipeline = QueryPipeline::with_call_policy(embedder, config.call_policy());
    let results = pipeline
        .search(&store, query, k)
        .await
        .context("searching")?;

    if results.is_empty() {
        println!("No results found (store is empty)");
        return Ok(());
    }

    println!("Query: {}", query);
    for result in &results {
        println!(
            "ID: {}, Text: {}, Similarity: {:.4}",
            result.id, result.text, result.score
        );
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    // .env is optional; real environment variables win.
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let mut config = AppConfig::load(cli.config.as_deref()).context("loading configuration")?;
    apply_overrides(&mut config, &cli);
    config.validate().context("validating configuration")?;
    init_tracing(&config.logging.level);

    let api_key = cli.api_key.as_deref();
    match cli.command {
        Commands::Ingest { .. } => {
            let embedder = build_embedder(api_key, &config)?;
            ingest(&config, embedder).await?;
        }
        Commands::Search { ref query, k } => {
            let embedder = build_embedder(api_key, &config)?;
            let k = k.unwrap_or(config.search.default_k);
            search(&config, embedder, query, k).await?;
        }
        Commands::Stats => {
            let store = open_existing_store(&config)?;
            println!("Documents: {}", store.count());
            println!("Dimension: {}", store.dimension());
            println!("Data dir:  {}", store.data_dir().display());
        }
        Commands::Checkpoint => {
            let mut store = open_existing_store(&config)?;
            store.checkpoint().context("writing checkpoint")?;
            println!("Checkpoint written ({} documents)", store.count());
        }
        Commands::Serve { ref addr } => {
            let embedder = build_embedder(api_key, &config)?;
            let store = open_store(&config)?;
            let state = AppState::new(
                store,
                IngestPipeline::with_options(embedder.clone(), config.ingest_options()),
                QueryPipeline::with_call_policy(embedder, config.call_policy()),
                config.search.default_k,
            );
            server::serve(addr, state).await?;
        }
    }
    Ok(())
}
