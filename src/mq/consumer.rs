use chrono::Utc;
use sea_orm::sea_query::{LockBehavior, LockType};
use sea_orm::*;
use std::time::Duration;

use crate::error::ServiceError;
use crate::models::queue_message;

/// Consommateur d'une file. Plusieurs workers peuvent consommer la même
/// file: FOR UPDATE SKIP LOCKED garantit qu'un message n'est réclamé que
/// par un seul worker à la fois.
pub struct QueueConsumer {
    queue: String,
    visibility_timeout: Duration,
}

impl QueueConsumer {
    pub fn new(queue: String, visibility_timeout: Duration) -> Self {
        QueueConsumer {
            queue,
            visibility_timeout,
        }
    }

    /// Réclame le prochain message visible (non consommé, et pas réclamé
    /// récemment par un autre worker). Retourne None si la file est vide.
    pub async fn fetch_next(
        &self,
        db: &DatabaseConnection,
    ) -> Result<Option<queue_message::Model>, ServiceError> {
        let stale_cutoff = Utc::now()
            - chrono::Duration::from_std(self.visibility_timeout)
                .unwrap_or_else(|_| chrono::Duration::seconds(300));

        let txn = db.begin().await?;

        let found = queue_message::Entity::find()
            .filter(queue_message::Column::Queue.eq(&self.queue))
            .filter(queue_message::Column::ConsumedAt.is_null())
            .filter(
                Condition::any()
                    .add(queue_message::Column::ClaimedAt.is_null())
                    .add(queue_message::Column::ClaimedAt.lt(stale_cutoff)),
            )
            .order_by_asc(queue_message::Column::Id)
            .lock_with_behavior(LockType::Update, LockBehavior::SkipLocked)
            .one(&txn)
            .await?;

        let Some(message) = found else {
            txn.commit().await?;
            return Ok(None);
        };

        let delivery_count = message.delivery_count + 1;
        if delivery_count > 1 {
            tracing::warn!(
                message_id = message.id,
                delivery_count,
                "re-livraison d'un message non acquitté"
            );
        }

        let mut active: queue_message::ActiveModel = message.into();
        active.claimed_at = Set(Some(Utc::now()));
        active.delivery_count = Set(delivery_count);
        let claimed = active.update(&txn).await?;

        txn.commit().await?;
        Ok(Some(claimed))
    }

    /// Acquitte un message: à n'appeler qu'une fois la transition de statut
    /// du job durablement enregistrée.
    pub async fn ack(
        &self,
        db: &DatabaseConnection,
        message_id: i32,
    ) -> Result<(), ServiceError> {
        let message = queue_message::Entity::find_by_id(message_id)
            .one(db)
            .await?;

        if let Some(message) = message {
            let mut active: queue_message::ActiveModel = message.into();
            active.consumed_at = Set(Some(Utc::now()));
            active.update(db).await?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn message_row(id: i32, delivery_count: i32) -> queue_message::Model {
        queue_message::Model {
            id,
            queue: "queue.vocab".to_string(),
            payload: serde_json::json!({ "job_id": 5 }),
            published_at: Utc::now(),
            claimed_at: None,
            consumed_at: None,
            delivery_count,
        }
    }

    #[tokio::test]
    async fn test_fetch_next_claims_with_skip_locked() {
        let mut claimed = message_row(1, 1);
        claimed.claimed_at = Some(Utc::now());

        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![message_row(1, 0)]])
            .append_query_results([vec![claimed]])
            .into_connection();

        let consumer = QueueConsumer::new("queue.vocab".to_string(), Duration::from_secs(300));
        let message = consumer.fetch_next(&db).await.unwrap().unwrap();
        assert_eq!(message.delivery_count, 1);
        assert!(message.claimed_at.is_some());

        // La réclamation doit passer par un verrou non bloquant
        let log = format!("{:?}", db.into_transaction_log());
        assert!(log.contains("FOR UPDATE SKIP LOCKED"));
    }

    #[tokio::test]
    async fn test_fetch_next_empty_queue() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([Vec::<queue_message::Model>::new()])
            .into_connection();

        let consumer = QueueConsumer::new("queue.vocab".to_string(), Duration::from_secs(300));
        assert!(consumer.fetch_next(&db).await.unwrap().is_none());
    }
}
