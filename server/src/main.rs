use anyhow::{Context, Result};
use axum::Router;
use clap::Parser;
use docsearch_core::extract::{CommandExtractor, HybridExtractor, TextExtractor};
use docsearch_core::{DocumentStore, ExtractionMethod, Gateway, GatewayConfig, MemoryStore, OwnerVisibility, SledStore};
use docsearch_server::build_app;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Parser)]
struct Args {
    /// Directory of the document database
    #[arg(long, env = "DOCSEARCH_DATA", default_value = "./data")]
    data: String,
    /// Keep documents in memory only; nothing is persisted
    #[arg(long, default_value_t = false)]
    in_memory: bool,
    /// Host to bind
    #[arg(long, default_value = "0.0.0.0")]
    host: String,
    /// Port to bind
    #[arg(long, default_value_t = 8080)]
    port: u16,
    /// Page size used when a request does not give one
    #[arg(long, default_value_t = 10)]
    default_page_size: usize,
    /// Upper bound for requested page sizes
    #[arg(long, default_value_t = 50)]
    max_page_size: usize,
    /// Characters of context on each side of a snippet match
    #[arg(long, default_value_t = 100)]
    snippet_radius: usize,
    /// Do not reveal document owners in global search results
    #[arg(long, default_value_t = false)]
    hide_owners: bool,
    /// Window for the recent-documents statistic
    #[arg(long, default_value_t = 7)]
    recent_window_days: u32,
    /// Largest accepted upload in MiB
    #[arg(long, default_value_t = 50)]
    max_upload_mb: u64,
    /// Minimum extracted characters for an upload to be stored
    #[arg(long, default_value_t = 10)]
    min_text_chars: usize,
    /// Direct text extractor: reads the PDF on stdin, writes text to stdout
    #[arg(long, env = "DOCSEARCH_EXTRACT_CMD", default_value = "pdftotext -q - -")]
    extract_cmd: String,
    /// OCR fallback extractor, same stdin/stdout convention
    #[arg(long, env = "DOCSEARCH_OCR_CMD")]
    ocr_cmd: Option<String>,
    /// Direct results shorter than this fall back to OCR
    #[arg(long, default_value_t = HybridExtractor::DEFAULT_MIN_DIRECT_CHARS)]
    ocr_threshold: usize,
}

impl Args {
    fn gateway_config(&self) -> GatewayConfig {
        GatewayConfig {
            default_page_size: self.default_page_size,
            max_page_size: self.max_page_size,
            snippet_radius: self.snippet_radius,
            owner_visibility: if self.hide_owners { OwnerVisibility::Hidden } else { OwnerVisibility::Exposed },
            recent_window_days: self.recent_window_days,
            max_upload_bytes: self.max_upload_mb * 1024 * 1024,
            min_text_chars: self.min_text_chars,
        }
    }

    fn extractor(&self) -> Result<HybridExtractor> {
        let direct = CommandExtractor::from_command_line(&self.extract_cmd, ExtractionMethod::DirectText)
            .context("--extract-cmd must not be blank")?;
        let ocr = self
            .ocr_cmd
            .as_deref()
            .and_then(|line| CommandExtractor::from_command_line(line, ExtractionMethod::Ocr))
            .map(|e| Box::new(e) as Box<dyn TextExtractor>);
        Ok(HybridExtractor::new(Box::new(direct), ocr).with_min_direct_chars(self.ocr_threshold))
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    fmt().with_env_filter(EnvFilter::from_default_env()).init();
    let args = Args::parse();

    let sled = if args.in_memory {
        None
    } else {
        let store = SledStore::open(&args.data).with_context(|| format!("opening database at {}", args.data))?;
        tracing::info!(path = %args.data, records = store.len(), "database opened");
        Some(Arc::new(store))
    };
    let store: Arc<dyn DocumentStore> = match &sled {
        Some(s) => Arc::clone(s) as Arc<dyn DocumentStore>,
        None => Arc::new(MemoryStore::new()),
    };

    let gateway = Gateway::new(store, Arc::new(args.extractor()?), args.gateway_config());
    let app: Router = build_app(Arc::new(gateway));

    let addr: SocketAddr = format!("{}:{}", args.host, args.port).parse()?;
    let listener = TcpListener::bind(addr).await?;
    tracing::info!(%addr, "server listening");
    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            tracing::info!("shutdown requested");
        })
        .await?;

    if let Some(store) = sled {
        store.flush()?;
    }
    Ok(())
}
