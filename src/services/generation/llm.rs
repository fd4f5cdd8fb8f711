use serde::Deserialize;
use std::time::Duration;

use crate::config::AppConfig;

/// Client Ollama minimal (POST /api/generate, stream désactivé).
/// Le timeout est appliqué au niveau du client reqwest: un modèle qui ne
/// répond pas fait échouer l'appel au lieu de bloquer la requête.
#[derive(Clone)]
pub struct OllamaClient {
    client: reqwest::Client,
    host: String,
    model: String,
    enabled: bool,
}

#[derive(Deserialize)]
struct GenerateResponse {
    response: String,
}

impl OllamaClient {
    pub fn from_config(config: &AppConfig) -> Self {
        Self::new(
            &config.ollama_host,
            &config.ollama_model,
            config.ollama_timeout,
            config.ollama_enabled,
        )
    }

    pub fn new(host: &str, model: &str, timeout: Duration, enabled: bool) -> Self {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_default();
        OllamaClient {
            client,
            host: host.trim_end_matches('/').to_string(),
            model: model.to_string(),
            enabled,
        }
    }

    pub fn enabled(&self) -> bool {
        self.enabled
    }

    /// Complétion simple. Err si Ollama est désactivé, injoignable, en
    /// timeout ou renvoie un corps inattendu; l'appelant retombe alors
    /// sur sa banque statique.
    pub async fn complete(&self, prompt: &str) -> Result<String, String> {
        if !self.enabled {
            return Err("Ollama disabled (USE_OLLAMA=0)".to_string());
        }

        let body = serde_json::json!({
            "model": self.model,
            "prompt": prompt,
            "stream": false,
            "options": { "temperature": 0.3 }
        });

        let resp = self
            .client
            .post(format!("{}/api/generate", self.host))
            .json(&body)
            .send()
            .await
            .map_err(|e| format!("Ollama request failed: {}", e))?;

        if !resp.status().is_success() {
            return Err(format!("Ollama returned status {}", resp.status()));
        }

        let parsed: GenerateResponse = resp
            .json()
            .await
            .map_err(|e| format!("Ollama response parse failed: {}", e))?;

        let text = strip_code_fences(&parsed.response);
        if text.is_empty() {
            return Err("Ollama returned an empty response".to_string());
        }
        Ok(text)
    }
}

/// Retire les éventuelles clôtures ``` (certains modèles en ajoutent).
fn strip_code_fences(text: &str) -> String {
    let t = text.trim();
    let t = t.strip_prefix("```json").or_else(|| t.strip_prefix("```")).unwrap_or(t);
    let t = t.strip_suffix("```").unwrap_or(t);
    t.trim().to_string()
}
