use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::*;
use std::time::Duration;

use crate::error::ServiceError;
use crate::models::job::{self, JobStatus, ModelType};
use crate::models::theme;
use crate::mq;
use crate::services::wallet_service::WalletService;

/// Suivi du cycle de vie des tâches asynchrones.
///
/// Soumission: débit éventuel + création du Job pending + publication du
/// message, dans UNE transaction (tout ou rien). Côté worker, chaque
/// transition passe par un verrou de ligne; un job déjà terminal n'est
/// jamais retouché, ce qui rend les re-livraisons de messages inoffensives
/// pour le ledger (jamais deux remboursements pour un même job).
pub struct JobService;

impl JobService {
    /// Soumet une tâche asynchrone. Si bonus, le débit a lieu d'abord et
    /// tout échec (solde, wallet) annule la soumission entière.
    pub async fn submit(
        db: &DatabaseConnection,
        user_id: i32,
        theme_id: i32,
        model_type: ModelType,
        is_bonus: bool,
        bonus_cost: Decimal,
    ) -> Result<job::Model, ServiceError> {
        let txn = db.begin().await?;

        theme::Entity::find_by_id(theme_id)
            .one(&txn)
            .await?
            .ok_or(ServiceError::ThemeNotFound(theme_id))?;

        let charged = if is_bonus {
            WalletService::debit_in(&txn, user_id, bonus_cost, "bonus purchase (async)").await?;
            bonus_cost
        } else {
            Decimal::ZERO
        };

        let now = Utc::now();
        let job = job::ActiveModel {
            user_id: Set(user_id),
            theme_id: Set(theme_id),
            model_type: Set(model_type),
            status: Set(JobStatus::Pending),
            credits_charged: Set(charged),
            created_at: Set(now),
            updated_at: Set(now),
            result: Set(None),
            error: Set(None),
            ..Default::default()
        }
        .insert(&txn)
        .await?;

        mq::publish(
            &txn,
            &model_type.queue_name(),
            serde_json::json!({ "job_id": job.id }),
        )
        .await?;

        txn.commit().await?;

        tracing::info!(user_id, job_id = job.id, charged = %charged, "job soumis");
        Ok(job)
    }

    pub async fn get(db: &DatabaseConnection, job_id: i32) -> Result<job::Model, ServiceError> {
        job::Entity::find_by_id(job_id)
            .one(db)
            .await?
            .ok_or(ServiceError::JobNotFound(job_id))
    }

    /// Jobs d'un utilisateur, plus récents d'abord.
    pub async fn list_by_user(
        db: &DatabaseConnection,
        user_id: i32,
    ) -> Result<Vec<job::Model>, ServiceError> {
        let rows = job::Entity::find()
            .filter(job::Column::UserId.eq(user_id))
            .order_by_desc(job::Column::CreatedAt)
            .order_by_desc(job::Column::Id)
            .all(db)
            .await?;
        Ok(rows)
    }

    /// Réclamation exclusive sous verrou de ligne. Réclame un job pending,
    /// ou REPREND un job processing dont `updated_at` est plus vieux que
    /// `stale_after`: c'est le cas d'un worker mort après réclamation, que
    /// la re-livraison du message doit récupérer au lieu de l'abandonner
    /// débité à jamais.
    ///
    /// Retourne None pour un job terminal ou un processing encore frais
    /// (un autre worker est dessus): le message peut être acquitté.
    pub async fn claim(
        db: &DatabaseConnection,
        job_id: i32,
        stale_after: Duration,
    ) -> Result<Option<job::Model>, ServiceError> {
        let txn = db.begin().await?;
        let job = Self::lock_job(&txn, job_id).await?;

        let now = Utc::now();
        let claimable = match job.status {
            JobStatus::Pending => true,
            JobStatus::Processing => {
                let cutoff = now
                    - chrono::Duration::from_std(stale_after)
                        .unwrap_or_else(|_| chrono::Duration::seconds(300));
                job.updated_at < cutoff
            }
            JobStatus::Done | JobStatus::Failed => false,
        };

        if !claimable {
            txn.commit().await?;
            return Ok(None);
        }

        if job.status == JobStatus::Processing {
            tracing::warn!(job_id, "job processing abandonné, reprise après timeout");
        }

        let mut active: job::ActiveModel = job.into();
        active.status = Set(JobStatus::Processing);
        active.updated_at = Set(now);
        let claimed = active.update(&txn).await?;

        txn.commit().await?;
        Ok(Some(claimed))
    }

    /// processing → done avec le payload de résultat. Un job non-processing
    /// est laissé tel quel (idempotent).
    pub async fn complete(
        db: &DatabaseConnection,
        job_id: i32,
        result: serde_json::Value,
    ) -> Result<job::Model, ServiceError> {
        let txn = db.begin().await?;
        let job = Self::lock_job(&txn, job_id).await?;

        if job.status != JobStatus::Processing {
            txn.commit().await?;
            return Ok(job);
        }

        let mut active: job::ActiveModel = job.into();
        active.status = Set(JobStatus::Done);
        active.result = Set(Some(result));
        active.updated_at = Set(Utc::now());
        let done = active.update(&txn).await?;

        txn.commit().await?;
        Ok(done)
    }

    /// processing → failed + crédit compensatoire du montant débité à la
    /// soumission, dans la MÊME transaction. Retourne true si un
    /// remboursement a été émis.
    ///
    /// Un job déjà terminal (ou pas encore réclamé) ne rembourse RIEN:
    /// c'est ce test qui rend la re-livraison d'un échec idempotente.
    pub async fn fail_and_refund(
        db: &DatabaseConnection,
        job_id: i32,
        error: &str,
    ) -> Result<bool, ServiceError> {
        let txn = db.begin().await?;
        let job = Self::lock_job(&txn, job_id).await?;

        if job.status != JobStatus::Processing {
            txn.commit().await?;
            return Ok(false);
        }

        let user_id = job.user_id;
        let refund = job.credits_charged;

        let mut active: job::ActiveModel = job.into();
        active.status = Set(JobStatus::Failed);
        active.error = Set(Some(error.to_string()));
        active.updated_at = Set(Utc::now());
        active.update(&txn).await?;

        let mut refunded = false;
        if refund > Decimal::ZERO {
            match WalletService::credit_in(
                &txn,
                user_id,
                refund,
                &format!("refund: failed job {}", job_id),
            )
            .await
            {
                Ok(_) => refunded = true,
                Err(refund_err) => {
                    // Rollback implicite: le statut reste processing, le
                    // message sera re-livré; l'incident part en réconciliation
                    tracing::error!(
                        target: "reconciliation",
                        user_id,
                        job_id,
                        amount = %refund,
                        error = %refund_err,
                        "REMBOURSEMENT ÉCHOUÉ pour un job en échec"
                    );
                    return Err(ServiceError::RefundFailed {
                        user_id,
                        amount: refund,
                        source: Box::new(refund_err),
                    });
                }
            }
        }

        txn.commit().await?;

        tracing::warn!(job_id, user_id, refunded, error, "job en échec");
        Ok(refunded)
    }

    async fn lock_job(
        txn: &DatabaseTransaction,
        job_id: i32,
    ) -> Result<job::Model, ServiceError> {
        job::Entity::find_by_id(job_id)
            .lock_exclusive()
            .one(txn)
            .await?
            .ok_or(ServiceError::JobNotFound(job_id))
    }
}
