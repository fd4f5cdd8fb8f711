pub mod auth;
pub mod health;
pub mod jobs;
pub mod predictions;
pub mod tasks;
pub mod themes;
pub mod wallet;

use actix_web::web;

pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api")
            .service(health::health_check)
            .configure(auth::auth_routes)
            .configure(wallet::wallet_routes)
            .configure(themes::theme_routes)
            .configure(tasks::task_routes)
            .configure(jobs::job_routes)
            .configure(predictions::prediction_routes),
    );
}
