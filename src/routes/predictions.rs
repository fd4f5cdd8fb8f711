use actix_web::{HttpResponse, get, post, web};
use sea_orm::DatabaseConnection;
use serde::Deserialize;

use crate::middleware::AuthUser;
use crate::models::job::ModelType;
use crate::services::generation::GeneratorRegistry;
use crate::services::prediction_service::PredictionService;

// DTO pour la recommandation
#[derive(Deserialize)]
pub struct RecommendRequest {
    pub model_type: Option<ModelType>,
}

#[derive(Deserialize)]
pub struct HistoryQuery {
    pub limit: Option<u64>,
}

/// POST /api/predictions/recommend - Recommander un thème jamais vu
/// L'entrée PredictionLog est écrite avant de répondre.
#[post("/recommend")]
pub async fn recommend(
    auth_user: AuthUser,
    body: web::Json<RecommendRequest>,
    db: web::Data<DatabaseConnection>,
    registry: web::Data<GeneratorRegistry>,
) -> HttpResponse {
    let model_type = body.model_type.unwrap_or(ModelType::Vocab);
    let model_name = registry.for_model(model_type).name().to_string();

    match PredictionService::recommend(db.get_ref(), auth_user.user_id, &model_name).await {
        Ok(theme) => HttpResponse::Ok().json(serde_json::json!({
            "theme_id": theme.id,
            "theme_name": theme.name,
            "level": theme.level,
            "model_name": model_name
        })),
        Err(e) => e.to_response(),
    }
}

/// GET /api/predictions/history/{user_id} - Historique (self ou admin)
#[get("/history/{user_id}")]
pub async fn prediction_history(
    auth_user: AuthUser,
    path: web::Path<i32>,
    query: web::Query<HistoryQuery>,
    db: web::Data<DatabaseConnection>,
) -> HttpResponse {
    let user_id = path.into_inner();
    if !auth_user.can_access(user_id) {
        return HttpResponse::Forbidden().json(serde_json::json!({
            "error": "You can only view your own predictions"
        }));
    }

    let limit = query.limit.unwrap_or(100);
    match PredictionService::history(db.get_ref(), user_id, limit).await {
        Ok(rows) => HttpResponse::Ok().json(rows),
        Err(e) => e.to_response(),
    }
}

pub fn prediction_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/predictions")
            .service(recommend)
            .service(prediction_history),
    );
}
