//! Glossary Search CLI
//!
//! Command-line interface for running the glossary search service.

use clap::{Parser, Subcommand};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use glossary_search::{
    ApiServer, AppState, BlocklistHandle, ContentFilter, Corpus, EmbeddingProvider, FilterDecision,
    LexicalSearch, MemoryIndex, MemoryLexicalStore, MetricsService, OllamaProvider,
    QdrantIndex, Result, SearchOrchestrator, SearchSettings, ServiceConfig, VectorBackend,
    VectorSearchEngine,
};
use glossary_search::api::fetch_health;
use glossary_search::search::NeighborIndex;

#[derive(Parser)]
#[command(name = "glossary-search")]
#[command(author, version, about = "Semantic glossary search service", long_about = None)]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "config.toml")]
    config: String,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Write a default configuration file
    Init {
        /// Output path for configuration file
        #[arg(short, long, default_value = "config.toml")]
        output: String,
    },

    /// Start the search service
    Start {
        /// HTTP API listen address (overrides the config file)
        #[arg(long)]
        api_addr: Option<String>,
    },

    /// Check service health
    Health {
        /// API endpoint to check
        #[arg(long, default_value = "http://localhost:8080")]
        endpoint: String,
    },

    /// Run the content filter on a query and print the verdict
    Check {
        /// Query text
        query: String,
    },
}

fn init_logging(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(filter)
        .init();
}

fn load_config(path: &str) -> Result<ServiceConfig> {
    if Path::new(path).exists() {
        info!("Loading configuration from: {}", path);
        ServiceConfig::load(path)
    } else {
        info!("Using default configuration");
        Ok(ServiceConfig::default())
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_logging(cli.verbose);

    match cli.command {
        Commands::Init { output } => {
            info!("Writing default configuration to: {}", output);
            let config = ServiceConfig::default();
            config.save(&output)?;
            info!("Configuration saved successfully");
        }

        Commands::Start { api_addr } => {
            info!("Starting glossary search...");

            // 1. Configuration, with CLI overrides
            let mut config = load_config(&cli.config)?;
            if let Some(addr) = api_addr {
                config.api.listen_address = addr;
            }
            config.validate()?;
            let listen_address = config.api.listen_address.clone();
            info!("API address: {}", listen_address);

            // 2. Corpus
            let corpus = Arc::new(Corpus::load(
                &config.search.corpus_path,
                config.search.embedding_dim,
            )?);
            info!(
                "Loaded {} glossary terms from {}",
                corpus.len(),
                config.search.corpus_path.display()
            );

            // 3. Metrics
            let metrics = MetricsService::install(&config.metrics)?;

            // 4. Content filter
            let blocklist = BlocklistHandle::load(config.filter.blocked_words_path.as_deref());
            let filter = ContentFilter::new(config.filter.clone());

            // 5. Embedding provider
            let provider = Arc::new(OllamaProvider::new(
                &config.embedding,
                config.search.embedding_dim,
            )?);
            if !provider.is_available().await {
                warn!(
                    "Embedding provider at {} is not reachable; semantic search will use the lexical fallback until it is",
                    config.embedding.base_url
                );
            }

            // 6. Vector index
            let index: Arc<dyn NeighborIndex> = match config.search.vector_backend {
                VectorBackend::Memory => {
                    let index = MemoryIndex::from_corpus(&corpus);
                    info!("In-memory vector index holds {} embeddings", index.len());
                    Arc::new(index)
                }
                VectorBackend::Qdrant => {
                    let index = QdrantIndex::connect(
                        &config.search.qdrant_url,
                        config.search.qdrant_collection.clone(),
                    )?;
                    if !index.is_available().await {
                        warn!("Qdrant at {} is not reachable", config.search.qdrant_url);
                    }
                    Arc::new(index)
                }
            };

            // 7. Orchestrator and API
            let orchestrator = SearchOrchestrator::new(
                filter,
                blocklist.clone(),
                provider,
                VectorSearchEngine::new(index, corpus.clone(), config.search.embedding_dim),
                LexicalSearch::new(Arc::new(MemoryLexicalStore::new(corpus.clone()))),
                SearchSettings::from_config(&config),
            );
            let app_state =
                AppState::new(Arc::new(orchestrator), corpus.len()).with_metrics(metrics);
            let api_server = ApiServer::with_state(config.api.clone(), app_state);

            tokio::spawn(async move {
                if let Err(e) = api_server.run(&listen_address).await {
                    error!("API server error: {}", e);
                }
            });

            #[cfg(unix)]
            spawn_reload_listener(blocklist)?;

            info!("Glossary search started successfully");
            info!("Press Ctrl+C to stop");

            signal::ctrl_c().await?;
            info!("Received shutdown signal");
        }

        Commands::Health { endpoint } => {
            info!("Checking service health at: {}", endpoint);

            match fetch_health(&endpoint, Duration::from_secs(5)).await {
                Ok(response) => {
                    info!("Status: {}", response.status);
                    info!("Version: {}", response.version);
                    info!("Corpus terms: {}", response.corpus_size);
                    info!("Blocked words: {}", response.blocked_words);
                    info!("Embedding provider available: {}", response.provider.available);
                    info!(
                        "Vector index ({}) available: {}",
                        response.vector_index, response.vector_index_available
                    );
                    info!("Uptime: {} seconds", response.uptime);
                }
                Err(e) => {
                    error!("Health check failed: {}", e);
                    std::process::exit(1);
                }
            }
        }

        Commands::Check { query } => {
            let config = load_config(&cli.config)?;
            let blocklist = BlocklistHandle::load(config.filter.blocked_words_path.as_deref());
            let filter = ContentFilter::new(config.filter);

            let (normalized, decision) = filter.check(&query, &blocklist.snapshot());
            info!("Sanitized: {:?}", normalized.display);
            match decision {
                FilterDecision::Allow => info!("Verdict: allow"),
                FilterDecision::Reject(reason) => info!("Verdict: reject ({})", reason.as_str()),
            }
        }
    }

    Ok(())
}

/// Reload the blocked word list on SIGHUP.
#[cfg(unix)]
fn spawn_reload_listener(blocklist: BlocklistHandle) -> Result<()> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut hangup = signal(SignalKind::hangup())?;
    tokio::spawn(async move {
        while hangup.recv().await.is_some() {
            info!("Received SIGHUP, reloading blocked word list");
            if let Err(e) = blocklist.reload() {
                warn!("Blocked word list reload failed, keeping previous list: {}", e);
            }
        }
    });
    Ok(())
}
