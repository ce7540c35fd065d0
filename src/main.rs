use passim::cli::{Cli, Commands};
use passim::config::Config;
use passim::embedding::{EmbeddingProvider, FastEmbedProvider};
use passim::error::{PassimError, Result};
use passim::ingest::{IngestionPipeline, SegmentExtractor, TextParser};
use passim::models::{PassageCategory, SearchFilters};
use passim::retrieval::HybridRetriever;
use passim::store::IndexStore;
use std::path::Path;
use std::sync::Arc;

#[tokio::main]
async fn main() -> Result<()> {
    init_logging();

    let cli = Cli::parse_args();
    let config = match &cli.config {
        Some(path) => Config::load(path)?,
        None => Config::load_or_default(&Config::default_path())?,
    };

    match cli.command {
        Commands::Ingest { file } => cmd_ingest(&config, &file).await?,
        Commands::Search {
            query,
            categories,
            document_ids,
            top_k,
            json,
        } => cmd_search(&config, &query, categories, document_ids, top_k, json).await?,
        Commands::List { limit } => cmd_list(&config, limit)?,
        Commands::Show { document_id } => cmd_show(&config, &document_id)?,
    }

    Ok(())
}

fn init_logging() {
    use tracing_subscriber::{fmt, EnvFilter};

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("passim=info"));

    fmt().with_env_filter(filter).with_target(false).init();
}

fn open_store(config: &Config) -> Result<Arc<IndexStore>> {
    Ok(Arc::new(IndexStore::open(
        &config.storage.data_dir,
        &config.index,
    )?))
}

async fn cmd_ingest(config: &Config, file: &Path) -> Result<()> {
    let store = open_store(config)?;
    let embedder = Arc::new(FastEmbedProvider::new(&config.embedding.model)?);
    let pipeline = IngestionPipeline::new(
        Box::new(TextParser),
        Box::new(SegmentExtractor::new()?),
        embedder,
        Arc::clone(&store),
    );

    let bytes = std::fs::read(file).map_err(|e| PassimError::Io {
        source: e,
        context: format!("Failed to read input file: {:?}", file),
    })?;
    let filename = file
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| file.display().to_string());

    let summary = pipeline.index_document(&bytes, &filename).await?;

    println!("Ingested document {}", summary.document_id);
    println!("  passages: {}", summary.passage_count);
    println!("  categories: {}", join_categories(&summary.categories_found));
    Ok(())
}

async fn cmd_search(
    config: &Config,
    query: &str,
    categories: Vec<String>,
    document_ids: Vec<String>,
    top_k: usize,
    json: bool,
) -> Result<()> {
    let store = open_store(config)?;
    let embedder = FastEmbedProvider::new(&config.embedding.model)?;
    let query_vector = embedder.embed(query)?;

    let filters = SearchFilters {
        categories: categories
            .iter()
            .map(|label| PassageCategory::parse(label))
            .collect(),
        document_ids,
    };

    let retriever = HybridRetriever::new(store);
    let hits = retriever.search(query, &query_vector, &filters, top_k).await?;

    if json {
        let rendered =
            serde_json::to_string_pretty(&hits).map_err(|e| PassimError::Other(e.into()))?;
        println!("{rendered}");
        return Ok(());
    }

    if hits.is_empty() {
        println!("No matches.");
        return Ok(());
    }

    for (position, hit) in hits.iter().enumerate() {
        println!(
            "{}. [{:.5}] {} ({}, page {})",
            position + 1,
            hit.fusion_score,
            hit.passage.category,
            hit.passage.document_id,
            hit.passage.page_number,
        );
        if !hit.passage.section_label.is_empty() {
            println!("   section {}", hit.passage.section_label);
        }
        match hit.highlights.first() {
            Some(fragment) => println!("   {fragment}"),
            None => println!("   {}", preview(&hit.passage.text, 160)),
        }
    }
    Ok(())
}

fn cmd_list(config: &Config, limit: usize) -> Result<()> {
    let store = open_store(config)?;
    let documents = store.list_documents(limit)?;

    if documents.is_empty() {
        println!("No documents ingested yet.");
        return Ok(());
    }

    for doc in documents {
        println!(
            "{}  {}  {} pages, {} passages  [{}]",
            doc.document_id,
            doc.ingested_at.format("%Y-%m-%d %H:%M"),
            doc.page_count,
            doc.passage_count,
            doc.filename,
        );
    }
    Ok(())
}

fn cmd_show(config: &Config, document_id: &str) -> Result<()> {
    let store = open_store(config)?;
    let doc = store
        .get_document(document_id)?
        .ok_or_else(|| PassimError::DocumentNotFound {
            id: document_id.to_string(),
        })?;

    println!("{} ({})", doc.document_id, doc.filename);
    println!("  ingested: {}", doc.ingested_at.to_rfc3339());
    println!("  pages: {}, source chars: {}", doc.page_count, doc.source_length);
    println!("  categories: {}", join_categories(&doc.passage_types_found));

    let passages = store.get_passages_by_document(document_id)?;
    println!("  passages: {}", passages.len());
    for passage in passages {
        println!(
            "   - {} [{}] chars {}..{} (confidence {:.2})",
            passage.passage_id,
            passage.category,
            passage.char_start,
            passage.char_end,
            passage.confidence,
        );
        println!("     {}", preview(&passage.text, 120));
    }
    Ok(())
}

fn join_categories(categories: &[PassageCategory]) -> String {
    if categories.is_empty() {
        return "none".to_string();
    }
    categories
        .iter()
        .map(|c| c.as_str())
        .collect::<Vec<_>>()
        .join(", ")
}

fn preview(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let truncated: String = text.chars().take(max_chars).collect();
    format!("{truncated}...")
}
