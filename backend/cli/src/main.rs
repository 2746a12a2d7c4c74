mod api;
mod config;

use std::path::Path;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use tokio::net::TcpListener;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;

use cropdoc_core::ImageRef;
use cropdoc_diagnosis::DiseaseDetector;
use cropdoc_providers::{GeminiClient, OpenAiCompatClient, ProviderRegistry};
use cropdoc_store::SqliteAdvisoryStore;
use cropdoc_understanding::{detect_image_mime, ImageLoader};

use api::AppState;
use config::Config;

#[derive(Parser)]
#[command(name = "cropdoc")]
#[command(about = "CropDoc: plant disease diagnosis and advisory service")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP API server
    Serve {
        /// Port to bind the HTTP server to
        #[arg(short, long)]
        port: Option<u16>,
    },
    /// Diagnose a single image and print the stored advisory as JSON
    Diagnose {
        /// Image URL or local path
        #[arg(short, long)]
        image: String,
        /// MIME type of the image (inferred from the extension when omitted)
        #[arg(short, long)]
        mime: Option<String>,
    },
    /// Show current server status
    Status,
}

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::from_env();

    let _log_guard =
        cropdoc_logging::init_logger(Some(Path::new(&config.log_dir)), &config.log_level);

    let cli = Cli::parse();

    match cli.command {
        Commands::Serve { port } => {
            let config = Config {
                port: port.unwrap_or(config.port),
                ..config
            };
            run_server(config).await?;
        }
        Commands::Diagnose { image, mime } => {
            let detector = build_detector(&config)?;
            let mime = mime.unwrap_or_else(|| detect_image_mime(&image).to_string());
            let record = detector.diagnose(Some(ImageRef::new(image, mime))).await?;
            println!(
                "{}",
                serde_json::to_string_pretty(&serde_json::json!({ "analysis": record }))?
            );
        }
        Commands::Status => {
            println!("CropDoc status: checking...");
            let client = reqwest::Client::new();
            match client
                .get(format!("http://localhost:{}/api/health", config.port))
                .send()
                .await
            {
                Ok(resp) => {
                    let body: serde_json::Value = resp.json().await?;
                    println!("{}", serde_json::to_string_pretty(&body)?);
                }
                Err(_) => {
                    println!("CropDoc is not running on port {}", config.port);
                }
            }
        }
    }

    Ok(())
}

/// Wire the pipeline from configuration. Clients are built once and shared.
fn build_detector(config: &Config) -> Result<DiseaseDetector> {
    config.validate()?;

    let http = reqwest::Client::builder()
        .timeout(config.generation_timeout())
        .build()
        .context("Failed to build generation HTTP client")?;

    let mut registry = ProviderRegistry::new();

    if let Some(api_key) = &config.gemini_api_key {
        let client = GeminiClient::new(api_key)
            .with_model(&config.gemini_model)
            .with_base_url(&config.gemini_base_url)
            .with_http_client(http.clone());
        registry.register(Arc::new(client));
        info!(model = %config.gemini_model, "Registered Gemini provider");
    }

    if let Some(api_key) = &config.openai_api_key {
        let client = OpenAiCompatClient::new(api_key)
            .with_model(&config.openai_model)
            .with_base_url(&config.openai_base_url)
            .with_http_client(http.clone());
        registry.register(Arc::new(client));
        info!(model = %config.openai_model, base_url = %config.openai_base_url, "Registered OpenAI-compatible provider");
    }

    let Some(generator) = registry.get(&config.provider) else {
        bail!(
            "provider {:?} is not configured (available: {:?})",
            config.provider,
            registry.list()
        );
    };

    let images = ImageLoader::new(config.fetch_timeout())?;
    let store = SqliteAdvisoryStore::open(&config.db_path)?;

    info!(provider = %generator.name(), db = %config.db_path, "Disease detector ready");

    Ok(DiseaseDetector::new(Arc::new(images), generator, Arc::new(store))
        .with_config(config.detector_config()))
}

async fn run_server(config: Config) -> Result<()> {
    info!(
        port = config.port,
        bind = %config.bind_address,
        db = %config.db_path,
        "Starting CropDoc API"
    );

    let detector = build_detector(&config)?;
    let app_state = Arc::new(AppState { detector });

    let app = api::build_router(app_state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());
    let addr = format!("{}:{}", config.bind_address, config.port);

    info!(addr = %addr, "HTTP API listening");

    let listener = TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
