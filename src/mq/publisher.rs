use chrono::Utc;
use sea_orm::*;

use crate::error::ServiceError;
use crate::models::queue_message;

/// Publie un message durable sur une file.
/// Appelé avec la transaction du producteur: le job et son message sont
/// alors créés ou annulés ensemble.
pub async fn publish<C: ConnectionTrait>(
    conn: &C,
    queue: &str,
    payload: serde_json::Value,
) -> Result<queue_message::Model, ServiceError> {
    let message = queue_message::ActiveModel {
        queue: Set(queue.to_string()),
        payload: Set(payload),
        published_at: Set(Utc::now()),
        claimed_at: Set(None),
        consumed_at: Set(None),
        delivery_count: Set(0),
        ..Default::default()
    }
    .insert(conn)
    .await?;

    tracing::debug!(queue, message_id = message.id, "message publié");
    Ok(message)
}
