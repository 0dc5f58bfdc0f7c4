use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use docsearch_core::error::ExtractError;
use docsearch_core::extract::{Extraction, TextExtractor};
use docsearch_core::{ExtractionMethod, Gateway, GatewayConfig, GatewayError, SledStore, UserId};
use serde::Deserialize;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use time::OffsetDateTime;
use tracing_subscriber::{fmt, EnvFilter};
use walkdir::WalkDir;

/// One already-extracted document, as produced by an offline extraction run.
#[derive(Debug, Deserialize)]
struct InputDoc {
    file_name: String,
    text: String,
    #[serde(default)]
    owner: Option<String>,
    #[serde(default)]
    size_bytes: Option<u64>,
    #[serde(default)]
    method: Option<ExtractionMethod>,
    #[serde(default, with = "time::serde::rfc3339::option")]
    processed_at: Option<OffsetDateTime>,
    #[serde(default)]
    processing_seconds: Option<f64>,
}

#[derive(Parser)]
#[command(name = "docsearch-importer")]
#[command(about = "Bulk-import extracted documents and inspect owner statistics", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Import documents from JSON/JSONL files or a directory of them
    Import {
        /// Input path (file or directory)
        #[arg(long)]
        input: String,
        /// Database directory
        #[arg(long)]
        data: String,
        /// Owner for records that do not name one
        #[arg(long)]
        owner: String,
        /// Minimum extracted characters for a record to be kept
        #[arg(long, default_value_t = 10)]
        min_text_chars: usize,
    },
    /// Print an owner's statistics as JSON
    Stats {
        /// Database directory
        #[arg(long)]
        data: String,
        #[arg(long)]
        owner: String,
        /// Window for the recent-documents count
        #[arg(long, default_value_t = 7)]
        window_days: u32,
    },
}

#[derive(Debug, Default, PartialEq, Eq)]
struct ImportReport {
    imported: usize,
    skipped: usize,
}

fn main() -> Result<()> {
    fmt().with_env_filter(EnvFilter::from_default_env()).init();
    let cli = Cli::parse();

    match cli.command {
        Commands::Import { input, data, owner, min_text_chars } => {
            let config = GatewayConfig { min_text_chars, ..Default::default() };
            let store = Arc::new(SledStore::open(&data).with_context(|| format!("opening database at {data}"))?);
            let gateway = offline_gateway(store.clone(), config);
            let report = import_path(&gateway, Path::new(&input), &UserId::new(owner))?;
            store.flush()?;
            tracing::info!(imported = report.imported, skipped = report.skipped, "import complete");
            Ok(())
        }
        Commands::Stats { data, owner, window_days } => {
            let config = GatewayConfig { recent_window_days: window_days, ..Default::default() };
            let store = Arc::new(SledStore::open(&data).with_context(|| format!("opening database at {data}"))?);
            let gateway = offline_gateway(store, config);
            let stats = gateway.statistics(&UserId::new(owner))?;
            println!("{}", serde_json::to_string_pretty(&stats)?);
            Ok(())
        }
    }
}

/// Gateway without an extraction engine; imports arrive with their text already extracted.
fn offline_gateway(store: Arc<SledStore>, config: GatewayConfig) -> Gateway {
    let extractor: Arc<dyn TextExtractor> = Arc::new(|_: &[u8]| -> Result<Extraction, ExtractError> {
        Err(ExtractError::Empty)
    });
    Gateway::new(store, extractor, config)
}

fn collect_files(input: &Path) -> Vec<PathBuf> {
    let mut files: Vec<PathBuf> = Vec::new();
    if input.is_dir() {
        for entry in WalkDir::new(input).into_iter().filter_map(|e| e.ok()) {
            let p = entry.path();
            if p.is_file() {
                if let Some(ext) = p.extension().and_then(|s| s.to_str()) {
                    if matches!(ext, "json" | "jsonl") {
                        files.push(p.to_path_buf());
                    }
                }
            }
        }
        files.sort();
    } else if input.is_file() {
        files.push(input.to_path_buf());
    }
    files
}

fn read_docs(file: &Path) -> Result<Vec<InputDoc>> {
    let f = File::open(file).with_context(|| format!("opening {}", file.display()))?;
    let reader = BufReader::new(f);
    if file.extension().and_then(|s| s.to_str()) == Some("jsonl") {
        let mut docs = Vec::new();
        for line in reader.lines() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            docs.push(serde_json::from_str(&line)?);
        }
        return Ok(docs);
    }
    let json: serde_json::Value = serde_json::from_reader(reader)?;
    match json {
        serde_json::Value::Array(arr) => arr.into_iter().map(|v| Ok(serde_json::from_value(v)?)).collect(),
        serde_json::Value::Object(_) => Ok(vec![serde_json::from_value(json)?]),
        _ => Ok(Vec::new()),
    }
}

fn import_path(gateway: &Gateway, input: &Path, default_owner: &UserId) -> Result<ImportReport> {
    let mut report = ImportReport::default();
    for file in collect_files(input) {
        for doc in read_docs(&file)? {
            let owner = doc.owner.map(UserId::from).unwrap_or_else(|| default_owner.clone());
            let size_bytes = doc.size_bytes.unwrap_or(doc.text.len() as u64);
            let extraction = Extraction {
                text: doc.text,
                method: doc.method.unwrap_or(ExtractionMethod::DirectText),
            };
            let processed_at = doc.processed_at.unwrap_or_else(OffsetDateTime::now_utc);
            match gateway.record_extraction(&owner, &doc.file_name, size_bytes, extraction, doc.processing_seconds, processed_at) {
                Ok(_) => report.imported += 1,
                Err(GatewayError::Processing(e)) => {
                    tracing::warn!(file = %file.display(), file_name = %doc.file_name, error = %e, "skipping record");
                    report.skipped += 1;
                }
                Err(e) => return Err(e.into()),
            }
        }
    }
    Ok(report)
}
