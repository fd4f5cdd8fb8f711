use rust_decimal::Decimal;
use std::str::FromStr;
use std::time::Duration;

/// Configuration du service, chargée depuis l'environnement au démarrage.
/// Toutes les valeurs ont un défaut raisonnable sauf DATABASE_URL.
#[derive(Clone, Debug)]
pub struct AppConfig {
    pub database_url: String,
    pub jwt_secret: String,
    pub bind_address: String,
    pub bind_port: u16,
    /// Prix d'un contenu bonus, en crédits.
    pub bonus_cost: Decimal,
    pub ollama_enabled: bool,
    pub ollama_host: String,
    pub ollama_model: String,
    pub ollama_timeout: Duration,
    pub queue_poll_interval: Duration,
    /// Délai après lequel un message réclamé mais jamais acquitté redevient
    /// visible pour un autre worker.
    pub queue_visibility_timeout: Duration,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, String> {
        let database_url = std::env::var("DATABASE_URL")
            .map_err(|_| "DATABASE_URL must be set".to_string())?;

        let jwt_secret = match std::env::var("JWT_SECRET") {
            Ok(secret) => secret,
            Err(_) => {
                tracing::warn!("JWT_SECRET not set, using insecure default (dev only)");
                "dev-secret-change-me".to_string()
            }
        };

        Ok(AppConfig {
            database_url,
            jwt_secret,
            bind_address: std::env::var("BIND_ADDRESS")
                .unwrap_or_else(|_| "127.0.0.1".to_string()),
            bind_port: env_parse("BIND_PORT", 8080)?,
            bonus_cost: env_parse("BONUS_COST", Decimal::ONE)?,
            ollama_enabled: std::env::var("USE_OLLAMA")
                .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
                .unwrap_or(false),
            ollama_host: std::env::var("OLLAMA_HOST")
                .unwrap_or_else(|_| "http://localhost:11434".to_string()),
            ollama_model: std::env::var("OLLAMA_MODEL")
                .unwrap_or_else(|_| "qwen2.5:3b-instruct".to_string()),
            ollama_timeout: Duration::from_secs(env_parse("OLLAMA_TIMEOUT_SECS", 30u64)?),
            queue_poll_interval: Duration::from_secs(env_parse("QUEUE_POLL_SECS", 2u64)?),
            queue_visibility_timeout: Duration::from_secs(env_parse(
                "QUEUE_VISIBILITY_SECS",
                300u64,
            )?),
        })
    }
}

/// Parse une variable d'environnement, avec défaut si absente.
fn env_parse<T: FromStr>(name: &str, default: T) -> Result<T, String> {
    match std::env::var(name) {
        Ok(raw) => raw
            .parse::<T>()
            .map_err(|_| format!("Invalid value for {}: {}", name, raw)),
        Err(_) => Ok(default),
    }
}
