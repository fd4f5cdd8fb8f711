use actix_web::{HttpResponse, get, post, web};
use rust_decimal::Decimal;
use sea_orm::DatabaseConnection;
use serde::{Deserialize, Serialize};

use crate::middleware::AuthUser;
use crate::models::transaction_log;
use crate::services::wallet_service::WalletService;

// DTO pour le top-up admin
#[derive(Deserialize)]
pub struct TopUpRequest {
    pub user_id: i32,
    pub amount: f64,
    pub reason: Option<String>,
}

// DTO pour une transaction dans la réponse
#[derive(Serialize)]
pub struct TransactionResponse {
    pub id: i32,
    pub amount: f64,
    pub operation: transaction_log::OperationType,
    pub reason: String,
    pub timestamp: String,
}

#[derive(Deserialize)]
pub struct HistoryQuery {
    pub limit: Option<u64>,
}

/// GET /api/wallet/{user_id} - Solde de l'utilisateur (self ou admin)
#[get("/{user_id}")]
pub async fn get_balance(
    auth_user: AuthUser,
    path: web::Path<i32>,
    db: web::Data<DatabaseConnection>,
) -> HttpResponse {
    let user_id = path.into_inner();
    if !auth_user.can_access(user_id) {
        return HttpResponse::Forbidden().json(serde_json::json!({
            "error": "You can only view your own wallet"
        }));
    }

    match WalletService::get_wallet(db.get_ref(), user_id).await {
        Ok(wallet) => HttpResponse::Ok().json(serde_json::json!({
            "user_id": wallet.user_id,
            "balance": decimal_to_f64(wallet.balance)
        })),
        Err(e) => e.to_response(),
    }
}

/// POST /api/wallet/top_up - Créditer un wallet (ADMIN uniquement)
#[post("/top_up")]
pub async fn top_up(
    auth_user: AuthUser,
    body: web::Json<TopUpRequest>,
    db: web::Data<DatabaseConnection>,
) -> HttpResponse {
    if !auth_user.is_admin {
        return HttpResponse::Forbidden().json(serde_json::json!({
            "error": "Only admins can top up wallets"
        }));
    }

    let amount = match Decimal::from_f64_retain(body.amount) {
        Some(d) => d,
        None => {
            return HttpResponse::BadRequest().json(serde_json::json!({
                "error": "Invalid amount format"
            }));
        }
    };

    let reason = body.reason.clone().unwrap_or_else(|| "admin top-up".to_string());
    match WalletService::credit(db.get_ref(), body.user_id, amount, &reason).await {
        Ok(wallet) => HttpResponse::Ok().json(serde_json::json!({
            "message": "Wallet credited",
            "user_id": wallet.user_id,
            "balance": decimal_to_f64(wallet.balance)
        })),
        Err(e) => e.to_response(),
    }
}

/// GET /api/wallet/history/{user_id} - Dernières transactions (self ou admin)
#[get("/history/{user_id}")]
pub async fn wallet_history(
    auth_user: AuthUser,
    path: web::Path<i32>,
    query: web::Query<HistoryQuery>,
    db: web::Data<DatabaseConnection>,
) -> HttpResponse {
    let user_id = path.into_inner();
    if !auth_user.can_access(user_id) {
        return HttpResponse::Forbidden().json(serde_json::json!({
            "error": "You can only view your own history"
        }));
    }

    let limit = query.limit.unwrap_or(100);
    match WalletService::history(db.get_ref(), user_id, limit).await {
        Ok(rows) => {
            let response: Vec<TransactionResponse> = rows
                .into_iter()
                .map(|t| TransactionResponse {
                    id: t.id,
                    amount: decimal_to_f64(t.amount),
                    operation: t.operation,
                    reason: t.reason,
                    timestamp: t.timestamp.to_rfc3339(),
                })
                .collect();
            HttpResponse::Ok().json(response)
        }
        Err(e) => e.to_response(),
    }
}

/// GET /api/wallet/can_spend/{user_id}/{amount} - Le solde suffit-il ?
/// Lecture non linéarisée: indication UI seulement, le débit fait foi.
#[get("/can_spend/{user_id}/{amount}")]
pub async fn can_spend(
    auth_user: AuthUser,
    path: web::Path<(i32, f64)>,
    db: web::Data<DatabaseConnection>,
) -> HttpResponse {
    let (user_id, amount) = path.into_inner();
    if !auth_user.can_access(user_id) {
        return HttpResponse::Forbidden().json(serde_json::json!({
            "error": "You can only check your own wallet"
        }));
    }

    let amount = match Decimal::from_f64_retain(amount) {
        Some(d) => d,
        None => {
            return HttpResponse::BadRequest().json(serde_json::json!({
                "error": "Invalid amount format"
            }));
        }
    };

    match WalletService::can_afford(db.get_ref(), user_id, amount).await {
        Ok(can) => HttpResponse::Ok().json(serde_json::json!({ "can_spend": can })),
        Err(e) => e.to_response(),
    }
}

// Fonction helper pour convertir Decimal en f64
pub(crate) fn decimal_to_f64(decimal: Decimal) -> f64 {
    decimal.to_string().parse::<f64>().unwrap_or(0.0)
}

pub fn wallet_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/wallet")
            .service(top_up)
            .service(wallet_history)
            .service(can_spend)
            .service(get_balance),
    );
}
