use actix_web::{HttpResponse, get, post, web};
use sea_orm::DatabaseConnection;
use serde::Deserialize;

use crate::config::AppConfig;
use crate::middleware::AuthUser;
use crate::models::job::ModelType;
use crate::services::generation::GeneratorRegistry;
use crate::services::settlement_service::SettlementService;

use super::wallet::decimal_to_f64;

// DTO pour la génération d'un exercice
#[derive(Deserialize)]
pub struct GenerateRequest {
    pub theme_id: i32,
    pub model_type: ModelType,
    #[serde(default)]
    pub is_bonus: bool,
}

// DTO pour la soumission d'une réponse
#[derive(Deserialize)]
pub struct SubmitRequest {
    pub task_log_id: i32,
    pub is_correct: bool,
}

/// POST /api/tasks/generate - Générer un exercice (settlement synchrone)
/// Contenu bonus: débité AVANT génération, remboursé si la génération échoue.
#[post("/generate")]
pub async fn generate_task(
    auth_user: AuthUser,
    body: web::Json<GenerateRequest>,
    db: web::Data<DatabaseConnection>,
    config: web::Data<AppConfig>,
    registry: web::Data<GeneratorRegistry>,
) -> HttpResponse {
    let generator = registry.for_model(body.model_type);

    let outcome = SettlementService::settle_generation(
        db.get_ref(),
        generator,
        auth_user.user_id,
        body.theme_id,
        body.is_bonus,
        config.bonus_cost,
    )
    .await;

    match outcome {
        Ok(o) => HttpResponse::Ok().json(serde_json::json!({
            "task_log_id": o.task_log_id,
            "model_name": o.model_name,
            "theme_name": o.theme_name,
            "difficulty": o.difficulty,
            "explanation": o.explanation,
            "vocabulary": o.vocabulary,
            "credits_spent": decimal_to_f64(o.credits_spent),
            "balance_after": decimal_to_f64(o.balance_after)
        })),
        Err(e) => e.to_response(),
    }
}

/// POST /api/tasks/submit - Noter la réponse d'un exercice généré
/// Premier passage correct: récompense créditée; re-soumission: rien de plus.
#[post("/submit")]
pub async fn submit_task(
    auth_user: AuthUser,
    body: web::Json<SubmitRequest>,
    db: web::Data<DatabaseConnection>,
) -> HttpResponse {
    let outcome = SettlementService::submit_task(
        db.get_ref(),
        body.task_log_id,
        body.is_correct,
        auth_user.user_id,
        auth_user.is_admin,
    )
    .await;

    match outcome {
        Ok(o) => HttpResponse::Ok().json(serde_json::json!({
            "task_log_id": o.task_log_id,
            "points_awarded": decimal_to_f64(o.points_awarded),
            "balance_after": decimal_to_f64(o.balance_after)
        })),
        Err(e) => e.to_response(),
    }
}

#[derive(Deserialize)]
pub struct HistoryQuery {
    pub limit: Option<u64>,
}

/// GET /api/tasks/history/{user_id} - Exercices de l'utilisateur (self ou admin)
#[get("/history/{user_id}")]
pub async fn task_history(
    auth_user: AuthUser,
    path: web::Path<i32>,
    query: web::Query<HistoryQuery>,
    db: web::Data<DatabaseConnection>,
) -> HttpResponse {
    let user_id = path.into_inner();
    if !auth_user.can_access(user_id) {
        return HttpResponse::Forbidden().json(serde_json::json!({
            "error": "You can only view your own tasks"
        }));
    }

    let limit = query.limit.unwrap_or(100);
    match SettlementService::task_history(db.get_ref(), user_id, limit).await {
        Ok(rows) => {
            let response: Vec<serde_json::Value> = rows
                .into_iter()
                .map(|(task, result)| {
                    serde_json::json!({
                        "id": task.id,
                        "theme_id": task.theme_id,
                        "task_description": task.task_description,
                        "model_name": task.model_name,
                        "credits_spent": decimal_to_f64(task.credits_spent),
                        "timestamp": task.timestamp.to_rfc3339(),
                        "result": result.map(|r| serde_json::json!({
                            "difficulty": r.difficulty,
                            "vocabulary": r.vocabulary,
                            "explanation": r.explanation,
                            "is_correct": r.is_correct
                        }))
                    })
                })
                .collect();
            HttpResponse::Ok().json(response)
        }
        Err(e) => e.to_response(),
    }
}

pub fn task_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/tasks")
            .service(generate_task)
            .service(submit_task)
            .service(task_history),
    );
}
