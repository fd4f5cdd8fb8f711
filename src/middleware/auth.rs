use actix_web::{Error, FromRequest, HttpRequest, HttpResponse, dev::Payload, web};
use futures::future::{Ready, ready};
use serde::{Deserialize, Serialize};

use crate::config::AppConfig;
use crate::utils::jwt;

/// Structure qui contient les infos de l'utilisateur authentifié
/// Utilisée comme extracteur dans les routes protégées
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthUser {
    pub user_id: i32,
    pub email: String,
    pub is_admin: bool,
}

impl AuthUser {
    /// Autorisation "self ou admin": un utilisateur ne voit que son propre
    /// ledger et ses propres jobs, sauf s'il est admin.
    pub fn can_access(&self, owner_user_id: i32) -> bool {
        self.is_admin || self.user_id == owner_user_id
    }
}

fn unauthorized(message: &str) -> Ready<Result<AuthUser, Error>> {
    let response = HttpResponse::Unauthorized().json(serde_json::json!({ "error": message }));
    ready(Err(
        actix_web::error::InternalError::from_response("", response).into(),
    ))
}

/// Implémentation de FromRequest pour AuthUser
/// Cela permet à Actix-Web d'extraire automatiquement AuthUser des requêtes
impl FromRequest for AuthUser {
    type Error = Error;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _payload: &mut Payload) -> Self::Future {
        // 1. Extraire le header Authorization
        let auth_header = match req.headers().get("Authorization") {
            Some(header) => header,
            None => return unauthorized("Missing Authorization header"),
        };

        let auth_str = match auth_header.to_str() {
            Ok(s) => s,
            Err(_) => return unauthorized("Invalid Authorization header"),
        };

        // 2. Extraire le token (format: "Bearer <token>")
        let token = match auth_str.strip_prefix("Bearer ") {
            Some(t) => t,
            None => return unauthorized("Invalid Authorization format (expected: Bearer <token>)"),
        };

        // 3. Récupérer la config de l'app (pas de secret global)
        let config = match req.app_data::<web::Data<AppConfig>>() {
            Some(c) => c,
            None => return unauthorized("Server configuration missing"),
        };

        // 4. Vérifier le token JWT
        let claims = match jwt::verify_token(token, &config.jwt_secret) {
            Ok(claims) => claims,
            Err(e) => {
                let response = HttpResponse::Unauthorized().json(serde_json::json!({
                    "error": format!("Invalid token: {}", e)
                }));
                return ready(Err(actix_web::error::InternalError::from_response(
                    "", response,
                )
                .into()));
            }
        };

        ready(Ok(AuthUser {
            user_id: claims.sub,
            email: claims.email,
            is_admin: claims.is_admin,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_can_access() {
        let user = AuthUser {
            user_id: 7,
            email: "u@example.com".to_string(),
            is_admin: false,
        };
        assert!(user.can_access(7));
        assert!(!user.can_access(8));

        let admin = AuthUser {
            user_id: 1,
            email: "admin@example.com".to_string(),
            is_admin: true,
        };
        assert!(admin.can_access(7));
    }
}
