// ============================================================================
// GENERATION - Collaborateur de génération d'exercices
// ============================================================================
//
// Une seule capacité `Generator`, sélectionnée par ModelType (comic /
// grammar / vocab). Le service de settlement l'invoque de façon
// polymorphe sans connaître la variante concrète.
//
// Chaque implémentation tente d'abord Ollama (timeout borné) puis retombe
// sur une banque statique: l'appel ne bloque jamais indéfiniment.
// ============================================================================

pub mod comic;
pub mod grammar;
pub mod llm;
pub mod vocabulary;

use async_trait::async_trait;

use crate::config::AppConfig;
use crate::error::ServiceError;
use crate::models::job::ModelType;
use crate::models::task_result::Difficulty;
use crate::models::theme;

pub use comic::ComicGenerator;
pub use grammar::GrammarGenerator;
pub use llm::OllamaClient;
pub use vocabulary::VocabularyGenerator;

/// Candidat de résultat produit par un générateur (pas encore persisté).
#[derive(Debug, Clone, PartialEq)]
pub struct GeneratedTask {
    pub difficulty: Difficulty,
    pub vocabulary: Vec<String>,
    pub explanation: String,
}

/// Capacité de génération d'exercices. Appel non fiable: toute erreur est
/// remontée en `GenerationFailed` et déclenche la compensation côté
/// settlement si un débit a déjà eu lieu.
#[async_trait]
pub trait Generator: Send + Sync {
    fn name(&self) -> &str;

    async fn generate(
        &self,
        theme: &theme::Model,
        is_bonus: bool,
    ) -> Result<GeneratedTask, ServiceError>;
}

/// Les trois générateurs, construits une fois au démarrage avec la config.
pub struct GeneratorRegistry {
    comic: ComicGenerator,
    grammar: GrammarGenerator,
    vocab: VocabularyGenerator,
}

impl GeneratorRegistry {
    pub fn new(config: &AppConfig) -> Self {
        let client = OllamaClient::from_config(config);
        GeneratorRegistry {
            comic: ComicGenerator::new(client.clone()),
            grammar: GrammarGenerator::new(client.clone()),
            vocab: VocabularyGenerator::new(client),
        }
    }

    pub fn for_model(&self, model_type: ModelType) -> &dyn Generator {
        match model_type {
            ModelType::Comic => &self.comic,
            ModelType::Grammar => &self.grammar,
            ModelType::Vocab => &self.vocab,
        }
    }
}

/// Difficulté dérivée du niveau CECR du thème.
pub fn difficulty_for_level(level: &str) -> Difficulty {
    match level.to_uppercase().as_str() {
        "A1" | "A2" => Difficulty::Easy,
        "B1" => Difficulty::Medium,
        _ => Difficulty::Hard,
    }
}
