use actix_web::HttpResponse;
use rust_decimal::Decimal;
use sea_orm::DbErr;

/// Erreurs métier des services. Les routes les traduisent en réponses HTTP
/// via `to_response()`.
#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error("Amount must be strictly positive")]
    InvalidAmount,

    #[error("Wallet not found for user {0}")]
    WalletNotFound(i32),

    #[error("User {0} not found")]
    UserNotFound(i32),

    #[error("Theme {0} not found")]
    ThemeNotFound(i32),

    #[error("Task {0} not found")]
    TaskNotFound(i32),

    #[error("Job {0} not found")]
    JobNotFound(i32),

    #[error("Insufficient funds: available {available}, required {required}")]
    InsufficientFunds {
        available: Decimal,
        required: Decimal,
    },

    #[error("Generation failed: {0}")]
    GenerationFailed(String),

    /// Le crédit compensatoire a échoué APRÈS un débit: le ledger est
    /// potentiellement incohérent, l'incident est journalisé côté
    /// réconciliation avant de remonter cette erreur.
    #[error("Refund of {amount} for user {user_id} failed: {source}")]
    RefundFailed {
        user_id: i32,
        amount: Decimal,
        source: Box<ServiceError>,
    },

    #[error("Access denied")]
    Forbidden,

    #[error("Database error: {0}")]
    Database(#[from] DbErr),
}

impl ServiceError {
    pub fn to_response(&self) -> HttpResponse {
        let body = serde_json::json!({ "error": self.to_string() });
        match self {
            ServiceError::InvalidAmount => HttpResponse::BadRequest().json(body),
            ServiceError::WalletNotFound(_)
            | ServiceError::UserNotFound(_)
            | ServiceError::ThemeNotFound(_)
            | ServiceError::TaskNotFound(_)
            | ServiceError::JobNotFound(_) => HttpResponse::NotFound().json(body),
            ServiceError::InsufficientFunds { .. } => HttpResponse::Conflict().json(body),
            ServiceError::GenerationFailed(_) => HttpResponse::BadGateway().json(body),
            ServiceError::Forbidden => HttpResponse::Forbidden().json(body),
            ServiceError::RefundFailed { .. } | ServiceError::Database(_) => {
                HttpResponse::InternalServerError().json(body)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::http::StatusCode;
    use rust_decimal_macros::dec;

    #[test]
    fn test_error_messages() {
        let err = ServiceError::InsufficientFunds {
            available: dec!(0.5),
            required: dec!(1),
        };
        assert_eq!(
            err.to_string(),
            "Insufficient funds: available 0.5, required 1"
        );
        assert_eq!(
            ServiceError::WalletNotFound(7).to_string(),
            "Wallet not found for user 7"
        );
    }

    #[test]
    fn test_status_mapping() {
        assert_eq!(
            ServiceError::InvalidAmount.to_response().status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ServiceError::ThemeNotFound(1).to_response().status(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            ServiceError::InsufficientFunds {
                available: dec!(0),
                required: dec!(1)
            }
            .to_response()
            .status(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            ServiceError::GenerationFailed("boom".to_string())
                .to_response()
                .status(),
            StatusCode::BAD_GATEWAY
        );
        assert_eq!(
            ServiceError::Forbidden.to_response().status(),
            StatusCode::FORBIDDEN
        );
    }

    #[test]
    fn test_refund_failed_carries_source() {
        let err = ServiceError::RefundFailed {
            user_id: 3,
            amount: dec!(1),
            source: Box::new(ServiceError::WalletNotFound(3)),
        };
        assert!(err.to_string().contains("Wallet not found for user 3"));
        assert_eq!(
            err.to_response().status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
