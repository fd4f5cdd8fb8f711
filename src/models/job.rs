use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Type de générateur demandé pour une tâche asynchrone.
#[derive(Clone, Copy, Debug, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(16))")]
#[serde(rename_all = "lowercase")]
pub enum ModelType {
    #[sea_orm(string_value = "comic")]
    Comic,
    #[sea_orm(string_value = "grammar")]
    Grammar,
    #[sea_orm(string_value = "vocab")]
    Vocab,
}

impl ModelType {
    /// Nom de la file associée (queue.comic, queue.grammar, queue.vocab).
    pub fn queue_name(&self) -> String {
        let suffix = match self {
            ModelType::Comic => "comic",
            ModelType::Grammar => "grammar",
            ModelType::Vocab => "vocab",
        };
        format!("queue.{}", suffix)
    }
}

/// Cycle de vie: pending → processing → done/failed.
/// Les états done/failed sont terminaux (jamais de retour en arrière).
#[derive(Clone, Copy, Debug, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(16))")]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    #[sea_orm(string_value = "pending")]
    Pending,
    #[sea_orm(string_value = "processing")]
    Processing,
    #[sea_orm(string_value = "done")]
    Done,
    #[sea_orm(string_value = "failed")]
    Failed,
}

impl JobStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Done | JobStatus::Failed)
    }
}

/// Tâche de génération asynchrone, consommée par un worker via la file.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "job")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub user_id: i32,
    pub theme_id: i32,
    pub model_type: ModelType,
    pub status: JobStatus,
    /// Montant débité à la soumission (0 si non bonus).
    /// C'est ce montant exact qui est remboursé si le job échoue.
    pub credits_charged: Decimal,
    pub created_at: DateTimeUtc,
    pub updated_at: DateTimeUtc,
    pub result: Option<Json>,
    pub error: Option<String>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_queue_name() {
        assert_eq!(ModelType::Vocab.queue_name(), "queue.vocab");
        assert_eq!(ModelType::Comic.queue_name(), "queue.comic");
        assert_eq!(ModelType::Grammar.queue_name(), "queue.grammar");
    }

    #[test]
    fn test_terminal_states() {
        assert!(!JobStatus::Pending.is_terminal());
        assert!(!JobStatus::Processing.is_terminal());
        assert!(JobStatus::Done.is_terminal());
        assert!(JobStatus::Failed.is_terminal());
    }
}
