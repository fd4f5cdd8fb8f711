use actix_web::{HttpResponse, get, post, web};
use sea_orm::DatabaseConnection;
use serde::Deserialize;

use crate::config::AppConfig;
use crate::middleware::AuthUser;
use crate::models::job::ModelType;
use crate::services::job_service::JobService;

use super::wallet::decimal_to_f64;

// DTO pour soumettre un job asynchrone
#[derive(Deserialize)]
pub struct SubmitJobRequest {
    pub user_id: i32,
    pub theme_id: i32,
    pub model_type: ModelType,
    #[serde(default)]
    pub is_bonus: bool,
}

fn job_to_json(job: &crate::models::job::Model) -> serde_json::Value {
    serde_json::json!({
        "job_id": job.id,
        "user_id": job.user_id,
        "theme_id": job.theme_id,
        "model_type": job.model_type,
        "status": job.status,
        "credits_charged": decimal_to_f64(job.credits_charged),
        "created_at": job.created_at.to_rfc3339(),
        "updated_at": job.updated_at.to_rfc3339(),
        "result": job.result,
        "error": job.error
    })
}

/// POST /api/jobs - Soumettre une génération asynchrone (202 Accepted)
/// Débit bonus + job pending + message de file dans une transaction.
#[post("")]
pub async fn submit_job(
    auth_user: AuthUser,
    body: web::Json<SubmitJobRequest>,
    db: web::Data<DatabaseConnection>,
    config: web::Data<AppConfig>,
) -> HttpResponse {
    if !auth_user.can_access(body.user_id) {
        return HttpResponse::Forbidden().json(serde_json::json!({
            "error": "You can only submit jobs for yourself"
        }));
    }

    let outcome = JobService::submit(
        db.get_ref(),
        body.user_id,
        body.theme_id,
        body.model_type,
        body.is_bonus,
        config.bonus_cost,
    )
    .await;

    match outcome {
        Ok(job) => HttpResponse::Accepted().json(job_to_json(&job)),
        Err(e) => e.to_response(),
    }
}

/// GET /api/jobs/{job_id} - Statut d'un job (self ou admin)
#[get("/{job_id}")]
pub async fn get_job(
    auth_user: AuthUser,
    path: web::Path<i32>,
    db: web::Data<DatabaseConnection>,
) -> HttpResponse {
    let job_id = path.into_inner();
    match JobService::get(db.get_ref(), job_id).await {
        Ok(job) => {
            if !auth_user.can_access(job.user_id) {
                return HttpResponse::Forbidden().json(serde_json::json!({
                    "error": "You can only view your own jobs"
                }));
            }
            HttpResponse::Ok().json(job_to_json(&job))
        }
        Err(e) => e.to_response(),
    }
}

/// GET /api/jobs/user/{user_id} - Jobs d'un utilisateur (self ou admin)
#[get("/user/{user_id}")]
pub async fn list_jobs(
    auth_user: AuthUser,
    path: web::Path<i32>,
    db: web::Data<DatabaseConnection>,
) -> HttpResponse {
    let user_id = path.into_inner();
    if !auth_user.can_access(user_id) {
        return HttpResponse::Forbidden().json(serde_json::json!({
            "error": "You can only view your own jobs"
        }));
    }

    match JobService::list_by_user(db.get_ref(), user_id).await {
        Ok(jobs) => {
            let response: Vec<serde_json::Value> = jobs.iter().map(job_to_json).collect();
            HttpResponse::Ok().json(response)
        }
        Err(e) => e.to_response(),
    }
}

pub fn job_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/jobs")
            .service(submit_job)
            .service(list_jobs)
            .service(get_job),
    );
}
