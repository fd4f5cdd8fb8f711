use async_trait::async_trait;

use crate::error::ServiceError;
use crate::models::theme;

use super::{GeneratedTask, Generator, OllamaClient, difficulty_for_level};

/// Exercices de lexique (synonymes, mot manquant).
pub struct VocabularyGenerator {
    llm: OllamaClient,
}

impl VocabularyGenerator {
    pub fn new(llm: OllamaClient) -> Self {
        VocabularyGenerator { llm }
    }
}

#[async_trait]
impl Generator for VocabularyGenerator {
    fn name(&self) -> &str {
        "VocabularyModel"
    }

    async fn generate(
        &self,
        theme: &theme::Model,
        _is_bonus: bool,
    ) -> Result<GeneratedTask, ServiceError> {
        let prompt = format!(
            "Eres profesor de ELE. Genera 3 ejercicios de vocabulario en español \
             (nivel {level}) sobre el tema \"{name}\": elegir la palabra que complete \
             mejor la frase.",
            level = theme.level,
            name = theme.name,
        );

        let explanation = match self.llm.complete(&prompt).await {
            Ok(text) => text,
            Err(e) => {
                tracing::warn!(theme = %theme.name, error = %e, "LLM indisponible, fallback lexique statique");
                format!(
                    "Ejercicio de vocabulario, tema: {} (nivel {})",
                    theme.name, theme.level
                )
            }
        };

        Ok(GeneratedTask {
            difficulty: difficulty_for_level(&theme.level),
            vocabulary: vec!["casa".to_string(), "comida".to_string(), "ropa".to_string()],
            explanation,
        })
    }
}
