use async_trait::async_trait;

use crate::error::ServiceError;
use crate::models::theme;

use super::{GeneratedTask, Generator, OllamaClient, difficulty_for_level};

/// Génère un mini-comic en espagnol autour du thème.
/// Le contenu bonus s'appuie sur les comics bonus du thème; sans comic
/// bonus disponible la génération échoue (et le settlement rembourse).
pub struct ComicGenerator {
    llm: OllamaClient,
}

impl ComicGenerator {
    pub fn new(llm: OllamaClient) -> Self {
        ComicGenerator { llm }
    }
}

#[async_trait]
impl Generator for ComicGenerator {
    fn name(&self) -> &str {
        "SpanishComicModel"
    }

    async fn generate(
        &self,
        theme: &theme::Model,
        is_bonus: bool,
    ) -> Result<GeneratedTask, ServiceError> {
        let comic = if is_bonus {
            theme.get_bonus_comic().ok_or_else(|| {
                ServiceError::GenerationFailed(format!(
                    "No bonus comic available for theme '{}'",
                    theme.name
                ))
            })?
        } else {
            theme.base_comic.clone()
        };

        let prompt = format!(
            "Eres profesor de ELE. Escribe un diálogo de cómic corto en español \
             (nivel {level}) sobre el tema \"{name}\" basado en el cómic \"{comic}\". \
             Máximo 6 viñetas.",
            level = theme.level,
            name = theme.name,
            comic = comic,
        );

        let explanation = match self.llm.complete(&prompt).await {
            Ok(text) => text,
            Err(e) => {
                tracing::warn!(theme = %theme.name, error = %e, "LLM indisponible, fallback comic statique");
                format!(
                    "Comic '{}', tema: {} (nivel {})",
                    comic, theme.name, theme.level
                )
            }
        };

        Ok(GeneratedTask {
            difficulty: difficulty_for_level(&theme.level),
            vocabulary: vec![
                "hola".to_string(),
                "gracias".to_string(),
                "hasta luego".to_string(),
            ],
            explanation,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::task_result::Difficulty;
    use std::time::Duration;

    fn theme_with_bonus(bonus: serde_json::Value) -> theme::Model {
        theme::Model {
            id: 1,
            name: "La comida".to_string(),
            level: "A1".to_string(),
            base_comic: "comida_base".to_string(),
            bonus_comics: bonus,
        }
    }

    fn offline_generator() -> ComicGenerator {
        ComicGenerator::new(OllamaClient::new(
            "http://localhost:11434",
            "test",
            Duration::from_secs(1),
            false,
        ))
    }

    #[tokio::test]
    async fn test_base_generation_falls_back_without_llm() {
        let theme = theme_with_bonus(serde_json::json!([]));
        let task = offline_generator().generate(&theme, false).await.unwrap();
        assert_eq!(task.difficulty, Difficulty::Easy);
        assert!(task.explanation.contains("comida_base"));
        assert!(!task.vocabulary.is_empty());
    }

    #[tokio::test]
    async fn test_bonus_without_bonus_comic_fails() {
        let theme = theme_with_bonus(serde_json::json!([]));
        let err = offline_generator().generate(&theme, true).await.unwrap_err();
        assert!(matches!(err, ServiceError::GenerationFailed(_)));
    }

    #[tokio::test]
    async fn test_bonus_uses_first_bonus_comic() {
        let theme = theme_with_bonus(serde_json::json!(["comida_bonus_1"]));
        let task = offline_generator().generate(&theme, true).await.unwrap();
        assert!(task.explanation.contains("comida_bonus_1"));
    }
}
