mod config;
mod handlers;
mod models;
mod services;

#[cfg(feature = "http-server")]
mod api; // HTTP API for the UI layer

use anyhow::Result;
use dotenv::dotenv;
use std::env;
use std::path::Path;
use std::sync::Arc;

use config::Config;
use handlers::Pipeline;
use models::ImageInput;
use services::{InferenceGateway, OpenRouterService};

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables first so RUST_LOG from .env applies
    dotenv().ok();
    env_logger::init();

    log::info!("🚀 Starting Nutrition Lens...");

    let config = Config::from_env();

    let backend = Arc::new(OpenRouterService::new(
        config.base_url.clone(),
        config.model.clone(),
        config.timeout,
    )?);
    log::info!("✅ OpenRouter backend initialized with model: {}", config.model);

    let gateway = Arc::new(InferenceGateway::new(
        backend,
        config.api_key.clone(),
        config.timeout,
        config.max_tokens,
    ));
    let pipeline = Arc::new(Pipeline::new(gateway, config.nutrition_fields.clone()));
    log::info!(
        "✅ Pipeline ready ({} nutrition fields, {}s timeout)",
        pipeline.nutrition_fields().len(),
        config.timeout.as_secs()
    );

    // One-shot mode: nutrition-lens <image-path>
    if let Some(path) = env::args().nth(1) {
        return analyze_file(&pipeline, Path::new(&path)).await;
    }

    serve(pipeline, &config).await
}

#[cfg(feature = "http-server")]
async fn serve(pipeline: Arc<Pipeline>, config: &Config) -> Result<()> {
    let addr = config.server_addr.as_str();
    let app = api::create_router(pipeline, config.session_ttl);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    log::info!(
        "🌐 API server listening on {} (idle sessions expire after {}s)",
        addr,
        config.session_ttl.as_secs()
    );

    tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app).await {
            log::error!("❌ API server stopped: {}", e);
        }
    });

    println!("\n🍽️ Nutrition Lens is running!");
    println!("🌐 API: http://{}", addr);
    println!("   POST /api/analyze        - Full analysis of one image");
    println!("   POST /api/sessions       - Start an interactive session");
    println!("\n🛑 Press Ctrl+C to stop\n");

    tokio::signal::ctrl_c().await?;
    log::info!("🛑 Shutting down...");
    Ok(())
}

#[cfg(not(feature = "http-server"))]
async fn serve(_pipeline: Arc<Pipeline>, _config: &Config) -> Result<()> {
    anyhow::bail!("built without the http-server feature; usage: nutrition-lens <image-path>")
}

async fn analyze_file(pipeline: &Pipeline, path: &Path) -> Result<()> {
    let image = ImageInput::from_path(path)?;
    log::info!("📸 Analyzing {}", path.display());

    let analysis = pipeline.analyze(image).await?;

    if analysis.items.is_empty() {
        println!("🤷 No food items found in the image.");
        return Ok(());
    }

    println!("\n🍽️ Food items:");
    for item in &analysis.items {
        let quantity = if item.quantity.trim().is_empty() {
            "?"
        } else {
            item.quantity.as_str()
        };
        println!("   • {} ({})", item.name, quantity);
    }

    for warning in &analysis.warnings {
        println!("⚠️ {}: {}", warning.name, warning.message);
    }

    match analysis.report {
        Some(report) if !report.is_empty() => {
            if let Some(calories) = report.calories() {
                println!("\n🔥 {}", calories);
            }
            if let Some(overall) = report.overall() {
                println!("📝 {}", overall);
            }
            println!("\n📊 Nutrition estimate:\n{}", report);
        }
        _ => println!("\n📊 No nutrition estimate (the food list changed during analysis)."),
    }

    Ok(())
}
