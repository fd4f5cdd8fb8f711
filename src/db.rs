// connexion BD

use crate::config::AppConfig;
use sea_orm::{Database, DatabaseConnection, DbErr};

pub async fn establish_connection(config: &AppConfig) -> Result<DatabaseConnection, DbErr> {
    Database::connect(&config.database_url).await
}
