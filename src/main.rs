use actix_web::{App, HttpServer, web};

use lingua_backend::config::AppConfig;
use lingua_backend::db;
use lingua_backend::routes;
use lingua_backend::services::generation::GeneratorRegistry;

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    dotenv::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let config = AppConfig::from_env().unwrap_or_else(|e| {
        eprintln!("Configuration error: {}", e);
        std::process::exit(1);
    });

    println!("🔌 Connecting to database...");
    let db = db::establish_connection(&config)
        .await
        .expect("Failed to connect to database");
    println!("✅ Database connected!");

    let registry = web::Data::new(GeneratorRegistry::new(&config));
    let db_data = web::Data::new(db);
    let config_data = web::Data::new(config.clone());

    println!(
        "🚀 Starting server on http://{}:{}",
        config.bind_address, config.bind_port
    );

    HttpServer::new(move || {
        App::new()
            .app_data(db_data.clone())
            .app_data(config_data.clone())
            .app_data(registry.clone())
            .configure(routes::configure_routes)
    })
    .bind((config.bind_address.as_str(), config.bind_port))?
    .run()
    .await
}
