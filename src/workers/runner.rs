use sea_orm::DatabaseConnection;

use crate::config::AppConfig;
use crate::error::ServiceError;
use crate::models::job::ModelType;
use crate::models::theme;
use crate::mq::QueueConsumer;
use crate::services::generation::Generator;
use crate::services::job_service::JobService;
use rust_decimal::Decimal;
use sea_orm::EntityTrait;

/// Boucle d'un worker: réclame les messages de sa file, pilote le cycle de
/// vie du job, acquitte APRÈS la transition de statut durable.
///
/// Les erreurs de traitement "attendues" (job déjà traité, génération en
/// échec avec remboursement émis) acquittent le message; seule une erreur
/// de persistance laisse le message en place pour re-livraison.
pub async fn run_worker(
    db: &DatabaseConnection,
    config: &AppConfig,
    model_type: ModelType,
    generator: &dyn Generator,
) -> Result<(), ServiceError> {
    let queue = model_type.queue_name();
    let consumer = QueueConsumer::new(queue.clone(), config.queue_visibility_timeout);

    tracing::info!(queue, model = generator.name(), "worker à l'écoute");

    loop {
        let message = match consumer.fetch_next(db).await {
            Ok(m) => m,
            Err(e) => {
                tracing::error!(queue, error = %e, "échec de lecture de la file");
                tokio::time::sleep(config.queue_poll_interval).await;
                continue;
            }
        };

        let Some(message) = message else {
            tokio::time::sleep(config.queue_poll_interval).await;
            continue;
        };

        match handle_message(db, generator, &message.payload, config.queue_visibility_timeout).await
        {
            Ok(()) => {
                consumer.ack(db, message.id).await?;
            }
            Err(e) => {
                // Pas d'ack: le message redeviendra visible après le
                // timeout et sera re-traité (le claim du job est idempotent)
                tracing::error!(message_id = message.id, error = %e, "traitement échoué, re-livraison");
            }
        }
    }
}

/// Traite un message `{job_id}`. Retourne Ok quand le message peut être
/// acquitté, y compris pour les issues "échec géré" (job failed + refund).
pub async fn handle_message(
    db: &DatabaseConnection,
    generator: &dyn Generator,
    payload: &serde_json::Value,
    stale_after: std::time::Duration,
) -> Result<(), ServiceError> {
    let Some(job_id) = payload.get("job_id").and_then(|v| v.as_i64()) else {
        tracing::warn!(%payload, "message invalide, abandonné");
        return Ok(());
    };
    let job_id = job_id as i32;

    // Réclamation exclusive: None = job terminal ou processing frais (un
    // autre worker est dessus), on acquitte sans toucher au ledger. Un
    // processing périmé (worker mort) est repris par claim().
    let job = match JobService::claim(db, job_id, stale_after).await {
        Ok(Some(job)) => job,
        Ok(None) => {
            tracing::info!(job_id, "job déjà traité, message ignoré");
            return Ok(());
        }
        Err(ServiceError::JobNotFound(_)) => {
            tracing::warn!(job_id, "job introuvable, message abandonné");
            return Ok(());
        }
        Err(e) => return Err(e),
    };

    let theme = theme::Entity::find_by_id(job.theme_id).one(db).await?;
    let is_bonus = job.credits_charged > Decimal::ZERO;

    let generation = match theme {
        Some(theme) => generator.generate(&theme, is_bonus).await,
        None => Err(ServiceError::ThemeNotFound(job.theme_id)),
    };

    match generation {
        Ok(task) => {
            let result = serde_json::json!({
                "difficulty": task.difficulty.as_str(),
                "vocabulary": task.vocabulary,
                "explanation": task.explanation,
                "model_name": generator.name(),
            });
            JobService::complete(db, job.id, result).await?;
            tracing::info!(job_id, "job terminé");
            Ok(())
        }
        Err(e) => {
            match JobService::fail_and_refund(db, job.id, &e.to_string()).await {
                Ok(refunded) => {
                    tracing::warn!(job_id, refunded, "job en échec, statut enregistré");
                    Ok(())
                }
                Err(refund_err @ ServiceError::RefundFailed { .. }) => {
                    // Déjà journalisé en réconciliation; on acquitte pour ne
                    // pas boucler sur un message empoisonné
                    tracing::error!(job_id, error = %refund_err, "échec de remboursement, message acquitté");
                    Ok(())
                }
                Err(other) => Err(other),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::generation::GeneratedTask;
    use async_trait::async_trait;
    use chrono::Utc;
    use rust_decimal_macros::dec;
    use sea_orm::{DatabaseBackend, MockDatabase};

    struct StubGenerator;

    #[async_trait]
    impl Generator for StubGenerator {
        fn name(&self) -> &str {
            "StubModel"
        }

        async fn generate(
            &self,
            theme: &theme::Model,
            _is_bonus: bool,
        ) -> Result<GeneratedTask, ServiceError> {
            Ok(GeneratedTask {
                difficulty: crate::models::task_result::Difficulty::Easy,
                vocabulary: vec!["casa".to_string()],
                explanation: format!("Ejercicio: {}", theme.name),
            })
        }
    }

    const STALE_AFTER: std::time::Duration = std::time::Duration::from_secs(300);

    fn job_with_status(
        status: crate::models::job::JobStatus,
        charged: rust_decimal::Decimal,
        updated_at: chrono::DateTime<Utc>,
    ) -> crate::models::job::Model {
        crate::models::job::Model {
            id: 5,
            user_id: 1,
            theme_id: 1,
            model_type: ModelType::Vocab,
            status,
            credits_charged: charged,
            created_at: Utc::now(),
            updated_at,
            result: None,
            error: None,
        }
    }

    fn theme_row() -> theme::Model {
        theme::Model {
            id: 1,
            name: "La comida".to_string(),
            level: "A1".to_string(),
            base_comic: "comida_base".to_string(),
            bonus_comics: serde_json::json!([]),
        }
    }

    #[tokio::test]
    async fn test_bad_payload_is_dropped() {
        let db = MockDatabase::new(DatabaseBackend::Postgres).into_connection();
        let payload = serde_json::json!({ "not_a_job": true });
        // Ok = acquitter sans rien faire
        handle_message(&db, &StubGenerator, &payload, STALE_AFTER)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_redelivered_message_for_terminal_job_is_acked() {
        use crate::models::job::JobStatus;

        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![job_with_status(JobStatus::Done, dec!(0), Utc::now())]])
            .into_connection();

        let payload = serde_json::json!({ "job_id": 5 });
        handle_message(&db, &StubGenerator, &payload, STALE_AFTER)
            .await
            .unwrap();

        // Aucun remboursement, aucun changement de statut
        let log = format!("{:?}", db.into_transaction_log());
        assert!(!log.contains("INSERT INTO \\\"transaction_log\\\""));
        assert!(!log.contains("UPDATE \\\"job\\\""));
    }

    #[tokio::test]
    async fn test_stale_processing_job_is_retried_on_redelivery() {
        use crate::models::job::JobStatus;

        // Worker mort après réclamation: le job est resté processing avec
        // un updated_at d'une heure. La re-livraison doit le reprendre et
        // le mener à un état terminal, pas l'acquitter tel quel.
        let stale = Utc::now() - chrono::Duration::hours(1);
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            // claim: reprise du processing périmé
            .append_query_results([vec![job_with_status(JobStatus::Processing, dec!(2), stale)]])
            .append_query_results([vec![job_with_status(
                JobStatus::Processing,
                dec!(2),
                Utc::now(),
            )]])
            // thème puis génération (stub), puis complete
            .append_query_results([vec![theme_row()]])
            .append_query_results([vec![job_with_status(
                JobStatus::Processing,
                dec!(2),
                Utc::now(),
            )]])
            .append_query_results([vec![job_with_status(JobStatus::Done, dec!(2), Utc::now())]])
            .into_connection();

        let payload = serde_json::json!({ "job_id": 5 });
        handle_message(&db, &StubGenerator, &payload, STALE_AFTER)
            .await
            .unwrap();

        // Reprise + passage en done: deux UPDATE du job
        let log = format!("{:?}", db.into_transaction_log());
        assert_eq!(log.matches("UPDATE \\\"job\\\"").count(), 2);
    }
}
