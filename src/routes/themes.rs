use actix_web::{HttpResponse, get, post, web};
use sea_orm::{ActiveModelTrait, DatabaseConnection, EntityTrait, QueryOrder, Set};
use serde::Deserialize;

use crate::middleware::AuthUser;
use crate::models::theme;

// DTO pour créer un thème
#[derive(Deserialize)]
pub struct CreateThemeRequest {
    pub name: String,
    pub level: String,
    pub base_comic: String,
    #[serde(default)]
    pub bonus_comics: Vec<String>,
}

/// GET /api/themes - Lister tous les thèmes disponibles
#[get("")]
pub async fn list_themes(
    _auth_user: AuthUser,
    db: web::Data<DatabaseConnection>,
) -> HttpResponse {
    match theme::Entity::find()
        .order_by_asc(theme::Column::Id)
        .all(db.get_ref())
        .await
    {
        Ok(themes) => HttpResponse::Ok().json(themes),
        Err(e) => HttpResponse::InternalServerError().json(serde_json::json!({
            "error": format!("Database error: {}", e)
        })),
    }
}

/// GET /api/themes/{theme_id} - Détail d'un thème
#[get("/{theme_id}")]
pub async fn get_theme(
    _auth_user: AuthUser,
    path: web::Path<i32>,
    db: web::Data<DatabaseConnection>,
) -> HttpResponse {
    let theme_id = path.into_inner();
    match theme::Entity::find_by_id(theme_id).one(db.get_ref()).await {
        Ok(Some(t)) => HttpResponse::Ok().json(t),
        Ok(None) => HttpResponse::NotFound().json(serde_json::json!({
            "error": format!("Theme {} not found", theme_id)
        })),
        Err(e) => HttpResponse::InternalServerError().json(serde_json::json!({
            "error": format!("Database error: {}", e)
        })),
    }
}

/// POST /api/themes - Créer un thème (ADMIN uniquement)
#[post("")]
pub async fn create_theme(
    auth_user: AuthUser,
    body: web::Json<CreateThemeRequest>,
    db: web::Data<DatabaseConnection>,
) -> HttpResponse {
    if !auth_user.is_admin {
        return HttpResponse::Forbidden().json(serde_json::json!({
            "error": "Only admins can create themes"
        }));
    }

    let new_theme = theme::ActiveModel {
        name: Set(body.name.clone()),
        level: Set(body.level.clone()),
        base_comic: Set(body.base_comic.clone()),
        bonus_comics: Set(serde_json::json!(body.bonus_comics)),
        ..Default::default()
    };

    match new_theme.insert(db.get_ref()).await {
        Ok(t) => HttpResponse::Created().json(t),
        Err(e) => HttpResponse::InternalServerError().json(serde_json::json!({
            "error": format!("Failed to create theme: {}", e)
        })),
    }
}

pub fn theme_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/themes")
            .service(list_themes)
            .service(create_theme)
            .service(get_theme),
    );
}
