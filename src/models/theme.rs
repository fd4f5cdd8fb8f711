use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Thème d'exercice (niveau CECR A1..B2, comic de base + comics bonus).
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "theme")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub name: String,
    pub level: String, // 'A1', 'A2', 'B1', 'B2'
    pub base_comic: String,
    pub bonus_comics: Json, // tableau JSON de chaînes
}

impl Model {
    /// Premier comic bonus disponible, ou None.
    pub fn get_bonus_comic(&self) -> Option<String> {
        self.bonus_comics
            .as_array()
            .and_then(|arr| arr.first())
            .and_then(|v| v.as_str())
            .map(|s| s.to_string())
    }
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::task_log::Entity")]
    TaskLog,
}

impl Related<super::task_log::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::TaskLog.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
