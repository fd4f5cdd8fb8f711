use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::*;

use crate::error::ServiceError;
use crate::models::task_result::Difficulty;
use crate::models::{prediction_log, task_log, task_result, theme, users};
use crate::services::generation::Generator;
use crate::services::wallet_service::WalletService;

/// Barème de récompense par difficulté (unique, pas de variante):
/// easy → 2.0, medium → 3.0, hard → 4.0 crédits.
pub fn reward_points(difficulty: Difficulty) -> Decimal {
    match difficulty {
        Difficulty::Easy => Decimal::from(2),
        Difficulty::Medium => Decimal::from(3),
        Difficulty::Hard => Decimal::from(4),
    }
}

/// Résultat d'un settlement de génération.
#[derive(Debug, Clone, serde::Serialize)]
pub struct SettlementOutcome {
    pub task_log_id: i32,
    pub model_name: String,
    pub theme_name: String,
    pub difficulty: Difficulty,
    pub explanation: String,
    pub vocabulary: Vec<String>,
    pub credits_spent: Decimal,
    pub balance_after: Decimal,
}

/// Résultat d'une soumission de réponse.
#[derive(Debug, Clone, serde::Serialize)]
pub struct SubmitOutcome {
    pub task_log_id: i32,
    pub points_awarded: Decimal,
    pub balance_after: Decimal,
}

/// Orchestration "payer (peut-être) → générer → journaliser → récompenser".
///
/// Protocole par requête (non persisté):
///   START → (si bonus) CHARGED → GENERATING → SETTLED | REFUNDED+FAILED
///
/// Le débit (+ son journal) et la récompense (+ son journal) sont deux
/// unités atomiques distinctes reliées par compensation explicite: la
/// génération, lente et externe, se trouve entre les deux.
pub struct SettlementService;

impl SettlementService {
    /// Génère un exercice pour l'utilisateur, en débitant d'abord le coût
    /// si c'est du contenu bonus.
    ///
    /// En cas d'échec de génération après débit, un crédit compensatoire du
    /// même montant est émis avant de propager `GenerationFailed`. Si ce
    /// remboursement échoue à son tour, l'incident est journalisé sur la
    /// cible `reconciliation` et remonté en `RefundFailed`.
    pub async fn settle_generation(
        db: &DatabaseConnection,
        generator: &dyn Generator,
        user_id: i32,
        theme_id: i32,
        is_bonus: bool,
        bonus_cost: Decimal,
    ) -> Result<SettlementOutcome, ServiceError> {
        // 1. Vérifier utilisateur, thème, wallet
        users::Entity::find_by_id(user_id)
            .one(db)
            .await?
            .ok_or(ServiceError::UserNotFound(user_id))?;

        let theme = theme::Entity::find_by_id(theme_id)
            .one(db)
            .await?
            .ok_or(ServiceError::ThemeNotFound(theme_id))?;

        WalletService::get_wallet(db, user_id).await?;

        // 2. Débit AVANT génération si bonus; tout échec coupe la requête ici
        let charged = if is_bonus {
            WalletService::debit(db, user_id, bonus_cost, "bonus purchase").await?;
            bonus_cost
        } else {
            Decimal::ZERO
        };

        // 3. Génération (collaborateur non fiable)
        let generated = match generator.generate(&theme, is_bonus).await {
            Ok(g) => g,
            Err(generation_err) => {
                if charged > Decimal::ZERO {
                    Self::refund(db, user_id, charged, "refund: failed generation").await?;
                }
                return Err(generation_err);
            }
        };

        // 4. TaskLog + TaskResult + PredictionLog: une seule transaction.
        // Un échec d'écriture APRÈS débit suit le même chemin de
        // compensation qu'un échec de génération: l'utilisateur ne reste
        // pas débité sans trace persistée.
        let log = match Self::record_outcome(
            db, user_id, &theme, generator, &generated, is_bonus, charged,
        )
        .await
        {
            Ok(log) => log,
            Err(persist_err) => {
                if charged > Decimal::ZERO {
                    Self::refund(db, user_id, charged, "refund: failed settlement write").await?;
                }
                return Err(persist_err);
            }
        };

        let balance_after = WalletService::get_wallet(db, user_id).await?.balance;

        tracing::info!(
            user_id,
            theme_id,
            credits_spent = %charged,
            "settlement terminé"
        );

        Ok(SettlementOutcome {
            task_log_id: log.id,
            model_name: generator.name().to_string(),
            theme_name: theme.name,
            difficulty: generated.difficulty,
            explanation: generated.explanation,
            vocabulary: generated.vocabulary,
            credits_spent: charged,
            balance_after,
        })
    }

    /// Note la réponse d'un exercice déjà généré et crédite la récompense
    /// lors du PREMIER passage correct. Une re-livraison de la même
    /// soumission ne crédite rien de plus (exactly-once par task_log).
    ///
    /// Le flip du TaskResult et le crédit partagent la même transaction:
    /// récompense et journal sont une seule unité durable.
    pub async fn submit_task(
        db: &DatabaseConnection,
        task_log_id: i32,
        is_correct: bool,
        requester_id: i32,
        requester_is_admin: bool,
    ) -> Result<SubmitOutcome, ServiceError> {
        let txn = db.begin().await?;

        let task = task_log::Entity::find_by_id(task_log_id)
            .one(&txn)
            .await?
            .ok_or(ServiceError::TaskNotFound(task_log_id))?;

        if !(requester_is_admin || requester_id == task.user_id) {
            return Err(ServiceError::Forbidden);
        }

        // Verrou sur le résultat: deux soumissions concurrentes du même
        // exercice se sérialisent ici
        let result = task_result::Entity::find()
            .filter(task_result::Column::TaskLogId.eq(task_log_id))
            .lock_exclusive()
            .one(&txn)
            .await?
            .ok_or(ServiceError::TaskNotFound(task_log_id))?;

        // Déjà récompensé: requête idempotente, rien à créditer
        if result.is_correct {
            let balance = WalletService::get_wallet(&txn, task.user_id).await?.balance;
            txn.commit().await?;
            return Ok(SubmitOutcome {
                task_log_id,
                points_awarded: Decimal::ZERO,
                balance_after: balance,
            });
        }

        if !is_correct {
            let balance = WalletService::get_wallet(&txn, task.user_id).await?.balance;
            txn.commit().await?;
            return Ok(SubmitOutcome {
                task_log_id,
                points_awarded: Decimal::ZERO,
                balance_after: balance,
            });
        }

        let points = reward_points(result.difficulty);
        let difficulty = result.difficulty;

        let mut active: task_result::ActiveModel = result.into();
        active.is_correct = Set(true);
        active.update(&txn).await?;

        let wallet = WalletService::credit_in(
            &txn,
            task.user_id,
            points,
            &format!("task reward: task_log={} ({})", task_log_id, difficulty.as_str()),
        )
        .await?;

        txn.commit().await?;

        tracing::info!(
            user_id = task.user_id,
            task_log_id,
            points = %points,
            "récompense créditée"
        );

        Ok(SubmitOutcome {
            task_log_id,
            points_awarded: points,
            balance_after: wallet.balance,
        })
    }

    /// Persiste TaskLog + TaskResult (non noté) + PredictionLog dans une
    /// seule transaction.
    async fn record_outcome(
        db: &DatabaseConnection,
        user_id: i32,
        theme: &theme::Model,
        generator: &dyn Generator,
        generated: &crate::services::generation::GeneratedTask,
        is_bonus: bool,
        charged: Decimal,
    ) -> Result<task_log::Model, ServiceError> {
        let txn = db.begin().await?;

        let description = format!(
            "{} task: {}",
            if is_bonus { "Bonus" } else { "Base" },
            theme.name
        );
        let log = task_log::ActiveModel {
            user_id: Set(user_id),
            theme_id: Set(theme.id),
            task_description: Set(description),
            model_name: Set(generator.name().to_string()),
            credits_spent: Set(charged),
            timestamp: Set(Utc::now()),
            ..Default::default()
        }
        .insert(&txn)
        .await?;

        task_result::ActiveModel {
            task_log_id: Set(log.id),
            difficulty: Set(generated.difficulty),
            vocabulary: Set(serde_json::json!(generated.vocabulary)),
            explanation: Set(generated.explanation.clone()),
            is_correct: Set(false), // pas encore de réponse au moment de la génération
            ..Default::default()
        }
        .insert(&txn)
        .await?;

        prediction_log::ActiveModel {
            user_id: Set(user_id),
            model_name: Set(generator.name().to_string()),
            theme_name: Set(theme.name.clone()),
            difficulty: Set(generated.difficulty.as_str().to_string()),
            recommended_at: Set(Utc::now()),
            ..Default::default()
        }
        .insert(&txn)
        .await?;

        txn.commit().await?;
        Ok(log)
    }

    /// Historique des exercices d'un utilisateur, plus récents d'abord.
    pub async fn task_history(
        db: &DatabaseConnection,
        user_id: i32,
        limit: u64,
    ) -> Result<Vec<(task_log::Model, Option<task_result::Model>)>, ServiceError> {
        let rows = task_log::Entity::find()
            .filter(task_log::Column::UserId.eq(user_id))
            .order_by_desc(task_log::Column::Timestamp)
            .order_by_desc(task_log::Column::Id)
            .limit(limit)
            .find_also_related(task_result::Entity)
            .all(db)
            .await?;
        Ok(rows)
    }

    /// Crédit compensatoire. Un échec ici laisse l'utilisateur débité sans
    /// service rendu: journalisé en erreur critique pour réconciliation
    /// manuelle, puis remonté en `RefundFailed`.
    async fn refund(
        db: &DatabaseConnection,
        user_id: i32,
        amount: Decimal,
        reason: &str,
    ) -> Result<(), ServiceError> {
        match WalletService::credit(db, user_id, amount, reason).await {
            Ok(_) => {
                tracing::info!(user_id, amount = %amount, "remboursement émis");
                Ok(())
            }
            Err(refund_err) => {
                tracing::error!(
                    target: "reconciliation",
                    user_id,
                    amount = %amount,
                    error = %refund_err,
                    "REMBOURSEMENT ÉCHOUÉ: utilisateur débité sans service rendu"
                );
                Err(ServiceError::RefundFailed {
                    user_id,
                    amount,
                    source: Box::new(refund_err),
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::job::ModelType;
    use crate::models::transaction_log::{self, OperationType};
    use crate::models::wallet;
    use crate::services::generation::GeneratedTask;
    use async_trait::async_trait;
    use rust_decimal_macros::dec;
    use std::sync::atomic::{AtomicU32, Ordering};

    struct FailingGenerator {
        calls: AtomicU32,
    }

    impl FailingGenerator {
        fn new() -> Self {
            FailingGenerator {
                calls: AtomicU32::new(0),
            }
        }
    }

    #[async_trait]
    impl Generator for FailingGenerator {
        fn name(&self) -> &str {
            "FailingModel"
        }

        async fn generate(
            &self,
            _theme: &theme::Model,
            _is_bonus: bool,
        ) -> Result<GeneratedTask, ServiceError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Err(ServiceError::GenerationFailed("model exploded".to_string()))
        }
    }

    struct StaticGenerator;

    #[async_trait]
    impl Generator for StaticGenerator {
        fn name(&self) -> &str {
            "StaticModel"
        }

        async fn generate(
            &self,
            theme: &theme::Model,
            _is_bonus: bool,
        ) -> Result<GeneratedTask, ServiceError> {
            Ok(GeneratedTask {
                difficulty: Difficulty::Medium,
                vocabulary: vec!["casa".to_string()],
                explanation: format!("Ejercicio: {}", theme.name),
            })
        }
    }

    fn user_row(id: i32) -> users::Model {
        users::Model {
            id,
            email: format!("user{}@example.com", id),
            password_hash: "pbkdf2:sha256:260000$s$h".to_string(),
            is_admin: false,
            created_at: Utc::now(),
        }
    }

    fn theme_row(id: i32) -> theme::Model {
        theme::Model {
            id,
            name: "La comida".to_string(),
            level: "B1".to_string(),
            base_comic: "comida_base".to_string(),
            bonus_comics: serde_json::json!(["comida_bonus"]),
        }
    }

    fn wallet_row(user_id: i32, balance: Decimal) -> wallet::Model {
        wallet::Model {
            id: 1,
            user_id,
            balance,
        }
    }

    fn tx_row(user_id: i32, amount: Decimal, operation: OperationType) -> transaction_log::Model {
        transaction_log::Model {
            id: 1,
            user_id,
            amount,
            operation,
            reason: "x".to_string(),
            timestamp: Utc::now(),
        }
    }

    fn task_row(id: i32, user_id: i32) -> task_log::Model {
        task_log::Model {
            id,
            user_id,
            theme_id: 1,
            task_description: "Base task: La comida".to_string(),
            model_name: "StaticModel".to_string(),
            credits_spent: Decimal::ZERO,
            timestamp: Utc::now(),
        }
    }

    fn result_row(task_log_id: i32, difficulty: Difficulty, is_correct: bool) -> task_result::Model {
        task_result::Model {
            id: 1,
            task_log_id,
            difficulty,
            vocabulary: serde_json::json!(["casa"]),
            explanation: "Ejercicio".to_string(),
            is_correct,
        }
    }

    #[test]
    fn test_reward_table_is_fixed() {
        assert_eq!(reward_points(Difficulty::Easy), dec!(2));
        assert_eq!(reward_points(Difficulty::Medium), dec!(3));
        assert_eq!(reward_points(Difficulty::Hard), dec!(4));
    }

    #[test]
    fn test_model_type_covers_all_generators() {
        // Le registre doit accepter chaque variante
        for mt in [ModelType::Comic, ModelType::Grammar, ModelType::Vocab] {
            let _ = mt.queue_name();
        }
    }

    #[tokio::test]
    async fn test_bonus_debit_failure_skips_generation() {
        // Solde 1, coût bonus 2: le générateur ne doit JAMAIS être invoqué
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![user_row(1)]])
            .append_query_results([vec![theme_row(1)]])
            .append_query_results([vec![wallet_row(1, dec!(1))]]) // check wallet
            .append_query_results([vec![wallet_row(1, dec!(1))]]) // debit: SELECT FOR UPDATE
            .into_connection();

        let generator = FailingGenerator::new();
        let err = SettlementService::settle_generation(&db, &generator, 1, 1, true, dec!(2))
            .await
            .unwrap_err();

        assert!(matches!(err, ServiceError::InsufficientFunds { .. }));
        assert_eq!(generator.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_failed_generation_refunds_charge() {
        // Débit 2 puis génération en échec: crédit compensatoire de 2,
        // solde net inchangé, l'appel remonte GenerationFailed
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![user_row(1)]])
            .append_query_results([vec![theme_row(1)]])
            .append_query_results([vec![wallet_row(1, dec!(10))]])
            // débit
            .append_query_results([vec![wallet_row(1, dec!(10))]])
            .append_query_results([vec![wallet_row(1, dec!(8))]])
            .append_query_results([vec![tx_row(1, dec!(2), OperationType::Debit)]])
            // remboursement
            .append_query_results([vec![wallet_row(1, dec!(8))]])
            .append_query_results([vec![wallet_row(1, dec!(10))]])
            .append_query_results([vec![tx_row(1, dec!(2), OperationType::Credit)]])
            .into_connection();

        let generator = FailingGenerator::new();
        let err = SettlementService::settle_generation(&db, &generator, 1, 1, true, dec!(2))
            .await
            .unwrap_err();

        assert!(matches!(err, ServiceError::GenerationFailed(_)));
        assert_eq!(generator.calls.load(Ordering::SeqCst), 1);

        // Une ligne debit + une ligne credit de même magnitude
        let log = format!("{:?}", db.into_transaction_log());
        assert_eq!(log.matches("INSERT INTO \\\"transaction_log\\\"").count(), 2);
    }

    #[tokio::test]
    async fn test_failed_persistence_after_charge_refunds() {
        // Génération OK mais écriture TaskLog en échec après le débit:
        // crédit compensatoire émis, l'erreur de persistance remonte
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![user_row(1)]])
            .append_query_results([vec![theme_row(1)]])
            .append_query_results([vec![wallet_row(1, dec!(10))]])
            // débit
            .append_query_results([vec![wallet_row(1, dec!(10))]])
            .append_query_results([vec![wallet_row(1, dec!(8))]])
            .append_query_results([vec![tx_row(1, dec!(2), OperationType::Debit)]])
            // INSERT task_log en échec
            .append_query_errors([DbErr::Custom("disk full".to_string())])
            // remboursement
            .append_query_results([vec![wallet_row(1, dec!(8))]])
            .append_query_results([vec![wallet_row(1, dec!(10))]])
            .append_query_results([vec![tx_row(1, dec!(2), OperationType::Credit)]])
            .into_connection();

        let err = SettlementService::settle_generation(&db, &StaticGenerator, 1, 1, true, dec!(2))
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Database(_)));

        // Une ligne debit + une ligne credit: solde net inchangé
        let log = format!("{:?}", db.into_transaction_log());
        assert_eq!(log.matches("INSERT INTO \\\"transaction_log\\\"").count(), 2);
    }

    #[tokio::test]
    async fn test_non_bonus_generation_settles_without_charge() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![user_row(1)]])
            .append_query_results([vec![theme_row(1)]])
            .append_query_results([vec![wallet_row(1, dec!(5))]])
            .append_query_results([vec![task_row(42, 1)]]) // INSERT task_log
            .append_query_results([vec![result_row(42, Difficulty::Medium, false)]]) // INSERT task_result
            .append_query_results([vec![prediction_log::Model {
                id: 1,
                user_id: 1,
                model_name: "StaticModel".to_string(),
                theme_name: "La comida".to_string(),
                difficulty: "medium".to_string(),
                recommended_at: Utc::now(),
            }]])
            .append_query_results([vec![wallet_row(1, dec!(5))]]) // balance_after
            .into_connection();

        let outcome = SettlementService::settle_generation(&db, &StaticGenerator, 1, 1, false, dec!(1))
            .await
            .unwrap();

        assert_eq!(outcome.task_log_id, 42);
        assert_eq!(outcome.credits_spent, Decimal::ZERO);
        assert_eq!(outcome.balance_after, dec!(5));
        assert_eq!(outcome.model_name, "StaticModel");
    }

    #[tokio::test]
    async fn test_submit_rewards_first_correct_grading() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![task_row(42, 1)]])
            .append_query_results([vec![result_row(42, Difficulty::Hard, false)]])
            .append_query_results([vec![result_row(42, Difficulty::Hard, true)]]) // UPDATE task_result
            .append_query_results([vec![wallet_row(1, dec!(0))]]) // credit: SELECT FOR UPDATE
            .append_query_results([vec![wallet_row(1, dec!(4))]]) // UPDATE wallet
            .append_query_results([vec![tx_row(1, dec!(4), OperationType::Credit)]])
            .into_connection();

        let outcome = SettlementService::submit_task(&db, 42, true, 1, false)
            .await
            .unwrap();

        // difficulty=hard → exactement la valeur de la table
        assert_eq!(outcome.points_awarded, dec!(4));
        assert_eq!(outcome.balance_after, dec!(4));
    }

    #[tokio::test]
    async fn test_submit_already_graded_awards_nothing() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![task_row(42, 1)]])
            .append_query_results([vec![result_row(42, Difficulty::Hard, true)]])
            .append_query_results([vec![wallet_row(1, dec!(4))]])
            .into_connection();

        let outcome = SettlementService::submit_task(&db, 42, true, 1, false)
            .await
            .unwrap();

        assert_eq!(outcome.points_awarded, Decimal::ZERO);
        assert_eq!(outcome.balance_after, dec!(4));

        let log = format!("{:?}", db.into_transaction_log());
        assert!(
            !log.contains("INSERT INTO \\\"transaction_log\\\""),
            "retry must not credit anything"
        );
        assert!(!log.contains("UPDATE \\\"task_result\\\""));
    }

    #[tokio::test]
    async fn test_submit_foreign_task_is_forbidden() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![task_row(42, 1)]])
            .into_connection();

        let err = SettlementService::submit_task(&db, 42, true, 2, false)
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Forbidden));
    }
}
