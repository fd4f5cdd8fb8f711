use chrono::Utc;
use sea_orm::*;
use std::collections::HashSet;

use crate::error::ServiceError;
use crate::models::{prediction_log, theme};

/// Politique de recommandation: premier thème jamais recommandé à
/// l'utilisateur; si tout a déjà été vu, on reprend le premier candidat.
pub fn pick_theme<'a>(
    candidates: &'a [theme::Model],
    already_seen: &HashSet<String>,
) -> Option<&'a theme::Model> {
    candidates
        .iter()
        .find(|t| !already_seen.contains(&t.name))
        .or_else(|| candidates.first())
}

/// Recommandation de thèmes + journal des prédictions.
pub struct PredictionService;

impl PredictionService {
    /// Recommande un thème à l'utilisateur. L'ensemble "déjà vu" vient de
    /// son historique de prédictions. L'entrée PredictionLog est écrite de
    /// façon synchrone AVANT de retourner le thème.
    pub async fn recommend(
        db: &DatabaseConnection,
        user_id: i32,
        model_name: &str,
    ) -> Result<theme::Model, ServiceError> {
        let candidates = theme::Entity::find()
            .order_by_asc(theme::Column::Id)
            .all(db)
            .await?;

        let already_seen: HashSet<String> = prediction_log::Entity::find()
            .filter(prediction_log::Column::UserId.eq(user_id))
            .all(db)
            .await?
            .into_iter()
            .map(|p| p.theme_name)
            .collect();

        let chosen = pick_theme(&candidates, &already_seen)
            .cloned()
            .ok_or(ServiceError::ThemeNotFound(0))?;

        prediction_log::ActiveModel {
            user_id: Set(user_id),
            model_name: Set(model_name.to_string()),
            theme_name: Set(chosen.name.clone()),
            difficulty: Set(chosen.level.clone()),
            recommended_at: Set(Utc::now()),
            ..Default::default()
        }
        .insert(db)
        .await?;

        tracing::info!(user_id, theme = %chosen.name, "thème recommandé");
        Ok(chosen)
    }

    /// Historique des prédictions, plus récentes d'abord.
    pub async fn history(
        db: &DatabaseConnection,
        user_id: i32,
        limit: u64,
    ) -> Result<Vec<prediction_log::Model>, ServiceError> {
        let rows = prediction_log::Entity::find()
            .filter(prediction_log::Column::UserId.eq(user_id))
            .order_by_desc(prediction_log::Column::RecommendedAt)
            .order_by_desc(prediction_log::Column::Id)
            .limit(limit)
            .all(db)
            .await?;
        Ok(rows)
    }
}
