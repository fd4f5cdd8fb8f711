use async_trait::async_trait;

use crate::error::ServiceError;
use crate::models::theme;

use super::{GeneratedTask, Generator, OllamaClient, difficulty_for_level};

/// Exercices de grammaire (conjugaison, ser/estar, temps permis au niveau).
pub struct GrammarGenerator {
    llm: OllamaClient,
}

impl GrammarGenerator {
    pub fn new(llm: OllamaClient) -> Self {
        GrammarGenerator { llm }
    }
}

#[async_trait]
impl Generator for GrammarGenerator {
    fn name(&self) -> &str {
        "GrammarModel"
    }

    async fn generate(
        &self,
        theme: &theme::Model,
        _is_bonus: bool,
    ) -> Result<GeneratedTask, ServiceError> {
        let prompt = format!(
            "Eres profesor de ELE. Genera 3 ejercicios de gramática en español \
             (nivel {level}) sobre el tema \"{name}\": completar hueco con la forma \
             verbal correcta. Frases cortas.",
            level = theme.level,
            name = theme.name,
        );

        let explanation = match self.llm.complete(&prompt).await {
            Ok(text) => text,
            Err(e) => {
                tracing::warn!(theme = %theme.name, error = %e, "LLM indisponible, fallback grammaire statique");
                format!(
                    "Ejercicio de gramática, tema: {} (nivel {}): completa con ser/estar.",
                    theme.name, theme.level
                )
            }
        };

        Ok(GeneratedTask {
            difficulty: difficulty_for_level(&theme.level),
            vocabulary: vec!["ser".to_string(), "estar".to_string(), "tener".to_string()],
            explanation,
        })
    }
}
