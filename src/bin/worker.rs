// Worker de génération asynchrone.
// Usage: worker [comic|grammar|vocab]   (défaut: vocab)

use lingua_backend::config::AppConfig;
use lingua_backend::db;
use lingua_backend::models::job::ModelType;
use lingua_backend::services::generation::GeneratorRegistry;
use lingua_backend::workers;

#[tokio::main]
async fn main() -> std::io::Result<()> {
    dotenv::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let model_type = match std::env::args().nth(1).as_deref() {
        Some("comic") => ModelType::Comic,
        Some("grammar") => ModelType::Grammar,
        Some("vocab") | None => ModelType::Vocab,
        Some(other) => {
            eprintln!("Unknown model type '{}' (expected comic|grammar|vocab)", other);
            std::process::exit(2);
        }
    };

    let config = AppConfig::from_env().unwrap_or_else(|e| {
        eprintln!("Configuration error: {}", e);
        std::process::exit(1);
    });

    println!("🔌 Connecting to database...");
    let db = db::establish_connection(&config)
        .await
        .expect("Failed to connect to database");
    println!("✅ Database connected!");

    let registry = GeneratorRegistry::new(&config);
    let generator = registry.for_model(model_type);

    println!("👷 Worker listening on {}", model_type.queue_name());
    if let Err(e) = workers::run_worker(&db, &config, model_type, generator).await {
        eprintln!("Worker stopped: {}", e);
        std::process::exit(1);
    }
    Ok(())
}
