use anyhow::{Context, Result, bail};
use console::style;
use dialoguer::Confirm;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};

use crate::config::{Config, get_config_dir};
use crate::database::{IndexCatalog, IndexSpec, LanceCatalog, Match, VectorIndex};
use crate::embeddings::{self, Embedder};
use crate::generation;
use crate::indexer::{SourceDocument, UploadPipeline, UploadStats};
use crate::query::{RagAnswer, RagQueryEngine, format_matches, retrieve};

/// Use `dir` if given, otherwise the default configuration directory
#[inline]
pub fn resolve_config_dir(dir: Option<PathBuf>) -> Result<PathBuf> {
    match dir {
        Some(dir) => Ok(dir),
        None => get_config_dir().context("Failed to determine configuration directory"),
    }
}

/// Index spec implied by the configuration
#[inline]
pub fn index_spec(config: &Config) -> IndexSpec {
    IndexSpec::new(
        config.index.name.clone(),
        config.embedder.dimension as usize,
        config.index.metric,
    )
}

async fn open_catalog(config: &Config) -> Result<LanceCatalog> {
    LanceCatalog::connect(&config.vector_database_path())
        .await
        .context("Failed to open vector database")
}

/// Open the configured index, pointing at `upload` when it does not exist yet
async fn open_index<C>(catalog: &C, config: &Config) -> Result<Arc<dyn VectorIndex>>
where
    C: IndexCatalog,
    C::Index: 'static,
{
    if !catalog.exists(&config.index.name).await? {
        bail!(
            "Index '{}' does not exist. Run 'rag-kit upload' or 'rag-kit index create' first.",
            config.index.name
        );
    }
    let index = catalog.open(&config.index.name).await?;

    let expected = config.embedder.dimension as usize;
    if index.spec().dimension != expected {
        warn!(
            "Index '{}' has {} dimensions but the embedder is configured for {}",
            config.index.name,
            index.spec().dimension,
            expected
        );
    }
    Ok(Arc::new(index))
}

/// Upload sources into the configured index, creating it when missing.
/// With `recreate` the index is dropped first and every record is lost.
#[inline]
pub async fn upload_into<C>(
    catalog: &C,
    config: &Config,
    embedder: Arc<dyn Embedder>,
    sources: &[SourceDocument],
    recreate: bool,
) -> Result<UploadStats>
where
    C: IndexCatalog,
    C::Index: 'static,
{
    let spec = index_spec(config);
    let index = if recreate {
        info!("Recreating index '{}'", spec.name);
        catalog.recreate(&spec).await?
    } else {
        catalog.create(&spec).await.with_context(|| {
            format!(
                "Index '{}' is incompatible with the configuration; use --recreate to replace it",
                spec.name
            )
        })?
    };

    let stats = UploadPipeline::new(embedder, Arc::new(index))
        .with_batch_size(config.index.upsert_batch_size)
        .upload_sources(sources)
        .await?;
    Ok(stats)
}

#[inline]
pub async fn upload(config_dir: &Path, sources: Vec<SourceDocument>, recreate: bool) -> Result<()> {
    if sources.is_empty() {
        bail!("No sources given. Use --source <type>=<path>.");
    }

    let config = Config::load(config_dir)?;
    let catalog = open_catalog(&config).await?;
    let embedder: Arc<dyn Embedder> = Arc::from(
        embeddings::from_config(&config.embedder).context("Failed to initialize embedder")?,
    );

    if recreate
        && catalog.exists(&config.index.name).await?
        && console::user_attended()
        && !Confirm::new()
            .with_prompt(format!(
                "Recreate index '{}'? Every stored record will be deleted.",
                config.index.name
            ))
            .default(false)
            .interact()?
    {
        println!("Upload cancelled.");
        return Ok(());
    }

    let stats = upload_into(&catalog, &config, embedder, &sources, recreate).await?;

    println!("{}", style("✓ Upload complete").green());
    println!("  Sources:          {}", stats.sources);
    println!("  Segments:         {}", stats.segments);
    println!("  Records upserted: {}", stats.records_upserted);
    println!("  Batches:          {}", stats.batches_committed);
    Ok(())
}

/// Answer a question against the configured index
#[inline]
pub async fn answer_with<C>(
    catalog: &C,
    config: &Config,
    embedder: Arc<dyn Embedder>,
    generator: Arc<dyn generation::Generator>,
    question: &str,
    top_k: Option<usize>,
) -> Result<RagAnswer>
where
    C: IndexCatalog,
    C::Index: 'static,
{
    let index = open_index(catalog, config).await?;
    let mut engine =
        RagQueryEngine::new(embedder, index, generator).with_retrieval_config(&config.retrieval)?;
    if let Some(top_k) = top_k {
        engine = engine.with_top_k(top_k);
    }
    Ok(engine.answer(question).await?)
}

#[inline]
pub async fn query(
    config_dir: &Path,
    question: &str,
    top_k: Option<usize>,
    show_context: bool,
) -> Result<()> {
    let config = Config::load(config_dir)?;
    let catalog = open_catalog(&config).await?;
    let embedder: Arc<dyn Embedder> = Arc::from(
        embeddings::from_config(&config.embedder).context("Failed to initialize embedder")?,
    );
    let generator: Arc<dyn generation::Generator> = Arc::from(
        generation::from_config(&config.generator).context("Failed to initialize generator")?,
    );

    let result = answer_with(&catalog, &config, embedder, generator, question, top_k).await?;

    if show_context {
        eprintln!("{}", style("Matches").bold().yellow());
        eprintln!("{}", format_matches(&result.matches));
        eprintln!();
        eprintln!("{}", style("Context").bold().yellow());
        eprintln!("{}", result.context);
        eprintln!();
    }
    println!("{}", result.answer);
    Ok(())
}

/// Nearest matches for a question against the configured index
#[inline]
pub async fn search_with<C>(
    catalog: &C,
    config: &Config,
    embedder: Arc<dyn Embedder>,
    question: &str,
    top_k: Option<usize>,
) -> Result<Vec<Match>>
where
    C: IndexCatalog,
    C::Index: 'static,
{
    let index = open_index(catalog, config).await?;
    let top_k = top_k.unwrap_or(config.retrieval.top_k);
    Ok(retrieve(embedder, &*index, question, top_k).await?)
}

/// Print the nearest matches for a question without generating an answer
#[inline]
pub async fn search(config_dir: &Path, question: &str, top_k: Option<usize>) -> Result<()> {
    let config = Config::load(config_dir)?;
    let catalog = open_catalog(&config).await?;
    let embedder: Arc<dyn Embedder> = Arc::from(
        embeddings::from_config(&config.embedder).context("Failed to initialize embedder")?,
    );

    let matches = search_with(&catalog, &config, embedder, question, top_k).await?;

    if matches.is_empty() {
        println!("No matches found.");
    } else {
        println!("{}", format_matches(&matches));
    }
    Ok(())
}

/// Create the configured index; `force` replaces an existing one
#[inline]
pub async fn create_index(config_dir: &Path, force: bool) -> Result<()> {
    let config = Config::load(config_dir)?;
    let catalog = open_catalog(&config).await?;
    let spec = index_spec(&config);

    let index = if force {
        catalog.recreate(&spec).await?
    } else {
        catalog.create(&spec).await?
    };

    println!(
        "{} Index '{}' ready ({} dimensions, {})",
        style("✓").green(),
        index.spec().name,
        index.spec().dimension,
        index.spec().metric
    );
    Ok(())
}

#[inline]
pub async fn delete_index(config_dir: &Path, yes: bool) -> Result<()> {
    let config = Config::load(config_dir)?;
    let catalog = open_catalog(&config).await?;
    let name = &config.index.name;

    if !catalog.exists(name).await? {
        println!("Index '{}' does not exist.", name);
        return Ok(());
    }

    let confirmed = yes
        || Confirm::new()
            .with_prompt(format!(
                "Delete index '{}' and every record in it? This cannot be undone.",
                name
            ))
            .default(false)
            .interact()?;
    if !confirmed {
        println!("Deletion cancelled.");
        return Ok(());
    }

    catalog.delete(name).await?;
    println!("{} Index '{}' deleted", style("✓").green(), name);
    Ok(())
}

/// Print name, dimensionality, metric and record count of the configured index
#[inline]
pub async fn index_status(config_dir: &Path) -> Result<()> {
    let config = Config::load(config_dir)?;
    let catalog = open_catalog(&config).await?;
    let name = &config.index.name;

    println!("📊 rag-kit Index Status");
    println!("{}", "=".repeat(50));

    let Some(spec) = catalog.describe(name).await? else {
        println!("Index '{}' has not been created yet.", name);
        return Ok(());
    };
    let count = catalog.open(name).await?.count().await?;

    println!("   Name:      {}", spec.name);
    println!("   Dimension: {}", spec.dimension);
    println!("   Metric:    {}", spec.metric);
    println!("   Records:   {}", count);

    let configured = index_spec(&config);
    if configured.dimension != spec.dimension || configured.metric != spec.metric {
        println!(
            "   {} configuration expects {} dimensions ({}); recreate the index to match",
            style("⚠️").yellow(),
            configured.dimension,
            configured.metric
        );
    }
    Ok(())
}
