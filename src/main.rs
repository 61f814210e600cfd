use hybrid_rerank::cli::eval;
use hybrid_rerank::cli::{Cli, Commands, ConfigAction};
use hybrid_rerank::config::{Config, RetrievalConfig};
use hybrid_rerank::corpus::ingest::{ingest_sources, TextChunker};
use hybrid_rerank::corpus::SourceCatalog;
use hybrid_rerank::embedding::{EmbeddingProvider, FastEmbedProvider};
use hybrid_rerank::error::{Result, RerankError};
use hybrid_rerank::index::{Bm25Params, IndexBuilder};
use hybrid_rerank::retrieval::{EngineHandle, HybridQueryEngine, RankedResult};
use hybrid_rerank::server::{QueryClient, QueryServer};
use hybrid_rerank::storage::{ArtifactStore, ChunkDatabase};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Characters of passage text printed per result
const TEXT_PREVIEW_CHARS: usize = 500;

fn main() -> Result<()> {
    let cli = Cli::parse_args();

    init_logging(cli.verbose);

    match cli.command {
        Commands::Ingest { input, sources } => {
            let config = load_config(cli.config, cli.profile)?;
            cmd_ingest(&config, &input, sources)?;
        }
        Commands::Build => {
            let config = load_config(cli.config, cli.profile)?;
            cmd_build(&config)?;
        }
        Commands::Query { query, top_k, json } => {
            let config = load_config(cli.config, cli.profile)?;
            cmd_query(&config, &query, top_k, json)?;
        }
        Commands::Serve { bind } => {
            let mut config = load_config(cli.config, cli.profile)?;
            if let Some(bind) = bind {
                config.server.bind = bind;
            }
            cmd_serve(&config)?;
        }
        Commands::Ask {
            query,
            top_k,
            server,
        } => {
            let config = load_config(cli.config, cli.profile)?;
            let addr = server.unwrap_or_else(|| config.server.bind.clone());
            cmd_ask(&addr, &query, top_k)?;
        }
        Commands::Eval { questions, top_k } => {
            let config = load_config(cli.config, cli.profile)?;
            cmd_eval(&config, &questions, top_k)?;
        }
        Commands::Status => {
            let config = load_config(cli.config, cli.profile)?;
            cmd_status(&config)?;
        }
        Commands::Config { action } => {
            cmd_config(cli.config, cli.profile, action)?;
        }
    }

    Ok(())
}

fn init_logging(verbose: bool) {
    use tracing_subscriber::{fmt, EnvFilter};

    let default_level = if verbose {
        "hybrid_rerank=debug"
    } else {
        "hybrid_rerank=info"
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    fmt().with_env_filter(filter).with_target(false).init();
}

fn cmd_ingest(config: &Config, input: &Path, sources: Option<PathBuf>) -> Result<()> {
    let sources_path = match sources {
        Some(path) => path,
        None => config.sources_path()?,
    };
    let catalog = SourceCatalog::load(&sources_path)?;
    let database = ChunkDatabase::new(&config.database_path()?)?;
    let chunker = TextChunker::new(&config.ingestion)?;

    let report = ingest_sources(input, &catalog, &chunker, &database)?;

    println!("✓ Ingestion complete");
    println!("  Files processed: {}", report.files_processed);
    println!("  Files skipped:   {}", report.files_skipped);
    println!("  Chunks written:  {}", report.chunks_written);

    Ok(())
}

fn cmd_build(config: &Config) -> Result<()> {
    let database = ChunkDatabase::new(&config.database_path()?)?;
    let corpus = database.load_corpus()?;

    let sources_path = config.sources_path()?;
    let catalog = if sources_path.exists() {
        SourceCatalog::load(&sources_path)?
    } else {
        tracing::warn!(
            "Source catalog not found at {}, results will carry no titles",
            sources_path.display()
        );
        SourceCatalog::default()
    };

    let provider = embedding_provider(config)?;
    let builder = IndexBuilder::new(
        config.embedding.batch_size,
        Bm25Params::from(&config.lexical),
    );
    let snapshot = builder.build(corpus, catalog, provider.as_ref())?;

    let store = ArtifactStore::new(config.index_path()?);
    let manifest = store.save(&snapshot)?;

    println!("✓ Index built");
    println!("  Generation: {}", manifest.generation.id);
    println!("  Rows:       {}", manifest.row_count);
    println!("  Model:      {} ({}D)", manifest.generation.model, manifest.generation.dimension);
    println!("  Location:   {}", store.root().display());

    Ok(())
}

fn cmd_query(config: &Config, query: &str, top_k: Option<usize>, json: bool) -> Result<()> {
    let handle = open_handle(config)?;
    let top_k = top_k.unwrap_or(config.retrieval.default_top_k);

    let results = handle.query(query, top_k)?;
    print_results(query, &results, json)
}

fn cmd_serve(config: &Config) -> Result<()> {
    let handle = Arc::new(open_handle(config)?);

    let rt = tokio::runtime::Runtime::new().map_err(|e| RerankError::Io {
        source: e,
        context: "Failed to create tokio runtime".to_string(),
    })?;

    rt.block_on(async {
        let server =
            QueryServer::bind(&config.server, handle, config.retrieval.default_top_k).await?;
        println!("✓ Serving on {} (Ctrl-C to stop)", server.local_addr()?);
        server
            .run_until(async {
                if let Err(e) = tokio::signal::ctrl_c().await {
                    tracing::warn!("Failed to listen for Ctrl-C: {}", e);
                }
            })
            .await
    })
}

fn cmd_ask(addr: &str, query: &str, top_k: Option<usize>) -> Result<()> {
    let rt = tokio::runtime::Runtime::new().map_err(|e| RerankError::Io {
        source: e,
        context: "Failed to create tokio runtime".to_string(),
    })?;

    let client = QueryClient::new(addr);
    let results = rt.block_on(client.ask(query, top_k))?;
    print_results(query, &results, false)
}

fn cmd_eval(config: &Config, questions: &Path, top_k: usize) -> Result<()> {
    let questions = eval::load_questions(questions)?;
    let snapshot = ArtifactStore::new(config.index_path()?).load()?;
    let provider = embedding_provider(config)?;

    // Baseline: the vector ranking alone
    let vector_only = RetrievalConfig {
        alpha: 1.0,
        ..config.retrieval.clone()
    };
    let baseline = HybridQueryEngine::new(
        snapshot.clone(),
        Arc::clone(&provider),
        &vector_only,
        &config.vector,
    )?;
    let rerank = HybridQueryEngine::new(snapshot, provider, &config.retrieval, &config.vector)?;

    let rows = eval::evaluate(&baseline, &rerank, &questions, top_k);
    print!("{}", eval::render_table(&rows));

    Ok(())
}

fn cmd_status(config: &Config) -> Result<()> {
    println!("hybrid-rerank Status");
    println!("====================");

    let db_path = config.database_path()?;
    if db_path.exists() {
        let database = ChunkDatabase::new(&db_path)?;
        println!("\nChunks: {} ({})", database.chunk_count()?, db_path.display());
    } else {
        println!("\nChunks: none (run 'hybrid-rerank ingest')");
    }

    let store = ArtifactStore::new(config.index_path()?);
    if store.exists() {
        let manifest = store.read_manifest()?;
        println!("\nIndex generation: {}", manifest.generation.id);
        println!(
            "  Created: {}",
            manifest.generation.created_at.format("%Y-%m-%d %H:%M:%S")
        );
        println!("  Rows:    {}", manifest.row_count);
        println!(
            "  Model:   {} ({}D)",
            manifest.generation.model, manifest.generation.dimension
        );
        println!("  Backend: {:?}", config.vector.backend);
    } else {
        println!("\nIndex: not built (run 'hybrid-rerank build')");
    }

    Ok(())
}

fn cmd_config(
    config_path: Option<PathBuf>,
    profile: Option<String>,
    action: ConfigAction,
) -> Result<()> {
    match action {
        ConfigAction::Show => {
            let config = load_config(config_path, profile)?;
            let content = toml::to_string_pretty(&config)?;
            println!("{}", content);
        }
        ConfigAction::Validate { file } => {
            let path = match file.or(config_path) {
                Some(path) => path,
                None => Config::default_path()?,
            };
            let config = Config::load(&path)?;
            println!("✓ Configuration is valid");
            println!("  Schema version: {}", config.meta.schema_version);
        }
        ConfigAction::Init { force } => {
            let path = match config_path {
                Some(path) => path,
                None => Config::default_path()?,
            };

            if path.exists() && !force {
                println!("Configuration file already exists at: {}", path.display());
                println!("Use --force to overwrite");
                return Ok(());
            }

            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent).map_err(|e| RerankError::Io {
                    source: e,
                    context: format!("Failed to create config directory: {:?}", parent),
                })?;
            }

            Config::default().save(&path)?;
            println!("✓ Configuration initialized at: {}", path.display());
        }
    }

    Ok(())
}

fn load_config(config_path: Option<PathBuf>, profile: Option<String>) -> Result<Config> {
    let path = match config_path {
        Some(path) => path,
        None => Config::default_path()?,
    };

    if !path.exists() {
        tracing::debug!(
            "Config file not found, using defaults. Run 'hybrid-rerank config init' to create one."
        );
        let mut config = Config::default();
        config.apply_env_overrides();
        if let Some(profile) = profile {
            config.apply_profile(&profile)?;
        }
        hybrid_rerank::config::ConfigValidator::validate(&config)?;
        return Ok(config);
    }

    if let Some(profile) = profile {
        Config::load_with_profile(&path, &profile)
    } else {
        Config::load(&path)
    }
}

fn embedding_provider(config: &Config) -> Result<Arc<dyn EmbeddingProvider>> {
    let provider = FastEmbedProvider::new(&config.embedding.model, config.embedding.batch_size)?;
    Ok(Arc::new(provider))
}

fn open_handle(config: &Config) -> Result<EngineHandle> {
    let handle = EngineHandle::new(
        embedding_provider(config)?,
        config.retrieval.clone(),
        config.vector.clone(),
    );
    handle.load(&ArtifactStore::new(config.index_path()?))?;
    Ok(handle)
}

fn print_results(query: &str, results: &[RankedResult], json: bool) -> Result<()> {
    if json {
        let output = serde_json::to_string_pretty(results).map_err(|e| RerankError::Json {
            source: e,
            context: "Failed to serialize results".to_string(),
        })?;
        println!("{}", output);
        return Ok(());
    }

    println!("\nQuery: {}\n", query);

    if results.is_empty() {
        println!("No results");
        return Ok(());
    }

    for (rank, result) in results.iter().enumerate() {
        println!(
            "Result {}: (Score: {:.4}, distance: {:.4}, bm25: {:.4})",
            rank + 1,
            result.fused_score,
            result.vector_distance,
            result.lexical_score
        );
        println!("File: {}", result.file);
        if let Some(source) = &result.source {
            println!("Title: {}", source.title);
            println!("URL: {}", source.url);
        }
        println!("Text: {}\n", result.preview(TEXT_PREVIEW_CHARS));
    }

    Ok(())
}
