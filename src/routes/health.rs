use actix_web::{HttpResponse, get};

/// GET /api/health - Vérifier que le service répond
#[get("/health")]
pub async fn health_check() -> HttpResponse {
    HttpResponse::Ok().json(serde_json::json!({
        "status": "ok",
        "service": "lingua-backend"
    }))
}
