use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;
use umkm_assistant::{
    api::start_server,
    config::AssistantConfig,
    session::{SessionFactory, SessionRegistry},
};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load environment variables
    dotenv::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = AssistantConfig::from_env().map_err(|e| {
        eprintln!("⚠️  {}", e);
        eprintln!("📌 See .env.example for setup instructions");
        e
    })?;

    info!("🚀 UMKM Assistant - API Server");
    info!("📍 Port: {}", config.port);
    info!("🤖 Model: {}", config.gemini_model);
    info!("⏳ Session idle TTL: {}s", config.session_idle_ttl.as_secs());

    let factory = SessionFactory::from_config(&config)?;
    let sessions = Arc::new(SessionRegistry::new(factory).with_idle_ttl(config.session_idle_ttl));

    info!("✅ Session factory initialized");
    info!("📡 Starting API server...");

    start_server(sessions, config.port).await?;

    Ok(())
}
