use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Message durable de la file de travail (table PostgreSQL).
///
/// Livraison at-least-once: un message réclamé (`claimed_at`) mais jamais
/// acquitté (`consumed_at`) redevient visible après le timeout de visibilité.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "queue_message")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub queue: String, // 'queue.comic', 'queue.grammar', 'queue.vocab'
    pub payload: Json, // {"job_id": ...}
    pub published_at: DateTimeUtc,
    pub claimed_at: Option<DateTimeUtc>,
    pub consumed_at: Option<DateTimeUtc>,
    pub delivery_count: i32,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
