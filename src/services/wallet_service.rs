use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::*;

use crate::error::ServiceError;
use crate::models::transaction_log::{self, OperationType};
use crate::models::wallet;

/// Moteur de transactions: SEUL chemin autorisé à muter un solde.
///
/// Discipline de verrouillage: chaque credit()/debit() prend le verrou de
/// ligne du wallet (SELECT ... FOR UPDATE) pour toute la séquence
/// lire-vérifier-écrire-journaliser. Deux débits concurrents sur le même
/// wallet sont donc sérialisés et ne peuvent jamais dépasser le solde.
///
/// Frontière de commit: les variantes `*_in` travaillent dans une
/// transaction ouverte par l'appelant et ne commitent JAMAIS elles-mêmes;
/// les wrappers publics credit()/debit() ouvrent leur propre transaction
/// (mutation + ligne de journal = une unité atomique).
pub struct WalletService;

impl WalletService {
    /// Récupère le wallet d'un utilisateur.
    pub async fn get_wallet<C: ConnectionTrait>(
        conn: &C,
        user_id: i32,
    ) -> Result<wallet::Model, ServiceError> {
        wallet::Entity::find()
            .filter(wallet::Column::UserId.eq(user_id))
            .one(conn)
            .await?
            .ok_or(ServiceError::WalletNotFound(user_id))
    }

    /// Crée le wallet d'un nouvel utilisateur (balance 0).
    /// La contrainte UNIQUE sur user_id refuse un deuxième wallet.
    pub async fn create_wallet<C: ConnectionTrait>(
        conn: &C,
        user_id: i32,
    ) -> Result<wallet::Model, ServiceError> {
        let new_wallet = wallet::ActiveModel {
            user_id: Set(user_id),
            balance: Set(Decimal::ZERO),
            ..Default::default()
        };
        Ok(new_wallet.insert(conn).await?)
    }

    /// Lecture pure pour l'UI: le solde peut être périmé au moment où la
    /// réponse arrive, seule la séquence débit verrouillée fait foi.
    pub async fn can_afford(
        db: &DatabaseConnection,
        user_id: i32,
        amount: Decimal,
    ) -> Result<bool, ServiceError> {
        let wallet = Self::get_wallet(db, user_id).await?;
        Ok(wallet.balance >= amount)
    }

    /// Crédite le wallet et journalise, une seule transaction SQL.
    pub async fn credit(
        db: &DatabaseConnection,
        user_id: i32,
        amount: Decimal,
        reason: &str,
    ) -> Result<wallet::Model, ServiceError> {
        if amount <= Decimal::ZERO {
            return Err(ServiceError::InvalidAmount);
        }
        let txn = db.begin().await?;
        let wallet = Self::credit_in(&txn, user_id, amount, reason).await?;
        txn.commit().await?;
        Ok(wallet)
    }

    /// Débite le wallet et journalise, une seule transaction SQL.
    /// Échec `InsufficientFunds`: solde inchangé, AUCUNE ligne de journal.
    pub async fn debit(
        db: &DatabaseConnection,
        user_id: i32,
        amount: Decimal,
        reason: &str,
    ) -> Result<wallet::Model, ServiceError> {
        if amount <= Decimal::ZERO {
            return Err(ServiceError::InvalidAmount);
        }
        let txn = db.begin().await?;
        let wallet = Self::debit_in(&txn, user_id, amount, reason).await?;
        txn.commit().await?;
        Ok(wallet)
    }

    /// Crédit dans la transaction de l'appelant (pas de commit ici).
    pub(crate) async fn credit_in(
        txn: &DatabaseTransaction,
        user_id: i32,
        amount: Decimal,
        reason: &str,
    ) -> Result<wallet::Model, ServiceError> {
        if amount <= Decimal::ZERO {
            return Err(ServiceError::InvalidAmount);
        }
        let wallet = Self::lock_wallet(txn, user_id).await?;
        let new_balance = wallet.balance + amount;
        Self::apply(txn, wallet, new_balance, amount, OperationType::Credit, reason).await
    }

    /// Débit dans la transaction de l'appelant (pas de commit ici).
    pub(crate) async fn debit_in(
        txn: &DatabaseTransaction,
        user_id: i32,
        amount: Decimal,
        reason: &str,
    ) -> Result<wallet::Model, ServiceError> {
        if amount <= Decimal::ZERO {
            return Err(ServiceError::InvalidAmount);
        }
        let wallet = Self::lock_wallet(txn, user_id).await?;
        if wallet.balance < amount {
            return Err(ServiceError::InsufficientFunds {
                available: wallet.balance,
                required: amount,
            });
        }
        let new_balance = wallet.balance - amount;
        Self::apply(txn, wallet, new_balance, amount, OperationType::Debit, reason).await
    }

    /// Historique des transactions, plus récentes d'abord.
    pub async fn history(
        db: &DatabaseConnection,
        user_id: i32,
        limit: u64,
    ) -> Result<Vec<transaction_log::Model>, ServiceError> {
        let rows = transaction_log::Entity::find()
            .filter(transaction_log::Column::UserId.eq(user_id))
            .order_by_desc(transaction_log::Column::Timestamp)
            .order_by_desc(transaction_log::Column::Id)
            .limit(limit)
            .all(db)
            .await?;
        Ok(rows)
    }

    /// SELECT ... FOR UPDATE sur la ligne du wallet.
    async fn lock_wallet(
        txn: &DatabaseTransaction,
        user_id: i32,
    ) -> Result<wallet::Model, ServiceError> {
        wallet::Entity::find()
            .filter(wallet::Column::UserId.eq(user_id))
            .lock_exclusive()
            .one(txn)
            .await?
            .ok_or(ServiceError::WalletNotFound(user_id))
    }

    /// Écrit le nouveau solde + la ligne de journal (même transaction).
    async fn apply(
        txn: &DatabaseTransaction,
        wallet: wallet::Model,
        new_balance: Decimal,
        amount: Decimal,
        operation: OperationType,
        reason: &str,
    ) -> Result<wallet::Model, ServiceError> {
        let user_id = wallet.user_id;
        let mut active: wallet::ActiveModel = wallet.into();
        active.balance = Set(new_balance);
        let updated = active.update(txn).await?;

        transaction_log::ActiveModel {
            user_id: Set(user_id),
            amount: Set(amount),
            operation: Set(operation),
            reason: Set(reason.to_string()),
            timestamp: Set(Utc::now()),
            ..Default::default()
        }
        .insert(txn)
        .await?;

        Ok(updated)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn wallet_row(user_id: i32, balance: Decimal) -> wallet::Model {
        wallet::Model {
            id: 1,
            user_id,
            balance,
        }
    }

    fn log_row(user_id: i32, amount: Decimal, operation: OperationType) -> transaction_log::Model {
        transaction_log::Model {
            id: 1,
            user_id,
            amount,
            operation,
            reason: "test".to_string(),
            timestamp: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_credit_rejects_non_positive_amount() {
        // Aucun résultat mocké: la validation doit couper avant toute requête
        let db = MockDatabase::new(DatabaseBackend::Postgres).into_connection();

        let err = WalletService::credit(&db, 1, dec!(0), "init").await.unwrap_err();
        assert!(matches!(err, ServiceError::InvalidAmount));

        let err = WalletService::credit(&db, 1, dec!(-5), "init").await.unwrap_err();
        assert!(matches!(err, ServiceError::InvalidAmount));
    }

    #[tokio::test]
    async fn test_debit_rejects_non_positive_amount() {
        let db = MockDatabase::new(DatabaseBackend::Postgres).into_connection();

        let err = WalletService::debit(&db, 1, dec!(0), "predict").await.unwrap_err();
        assert!(matches!(err, ServiceError::InvalidAmount));
    }

    #[tokio::test]
    async fn test_debit_wallet_not_found() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([Vec::<wallet::Model>::new()])
            .into_connection();

        let err = WalletService::debit(&db, 42, dec!(1), "predict").await.unwrap_err();
        assert!(matches!(err, ServiceError::WalletNotFound(42)));
    }

    #[tokio::test]
    async fn test_debit_insufficient_funds_leaves_balance_untouched() {
        // Solde 9, débit 100 → refus sans UPDATE ni ligne de journal
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![wallet_row(1, dec!(9))]])
            .into_connection();

        let err = WalletService::debit(&db, 1, dec!(100), "predict").await.unwrap_err();
        match err {
            ServiceError::InsufficientFunds { available, required } => {
                assert_eq!(available, dec!(9));
                assert_eq!(required, dec!(100));
            }
            other => panic!("unexpected error: {:?}", other),
        }

        // Seules les requêtes de la transaction et le SELECT verrouillé ont eu lieu
        let log = format!("{:?}", db.into_transaction_log());
        assert!(
            !log.contains("UPDATE \\\"wallet\\\"") && !log.contains("INSERT"),
            "a failed debit must not write anything"
        );
    }

    #[tokio::test]
    async fn test_debit_success_updates_balance_and_logs() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![wallet_row(1, dec!(10))]]) // SELECT FOR UPDATE
            .append_query_results([vec![wallet_row(1, dec!(4))]]) // UPDATE RETURNING
            .append_query_results([vec![log_row(1, dec!(6), OperationType::Debit)]]) // INSERT RETURNING
            .into_connection();

        let wallet = WalletService::debit(&db, 1, dec!(6), "bonus purchase").await.unwrap();
        assert_eq!(wallet.balance, dec!(4));

        let log = db.into_transaction_log();
        let joined = format!("{:?}", log);
        assert!(joined.contains("UPDATE"));
        assert!(joined.contains("INSERT"));
        assert!(joined.contains("FOR UPDATE"), "wallet row must be locked");
    }

    #[tokio::test]
    async fn test_credit_success() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![wallet_row(7, dec!(0))]])
            .append_query_results([vec![wallet_row(7, dec!(10))]])
            .append_query_results([vec![log_row(7, dec!(10), OperationType::Credit)]])
            .into_connection();

        let wallet = WalletService::credit(&db, 7, dec!(10), "init").await.unwrap();
        assert_eq!(wallet.balance, dec!(10));
    }

    #[tokio::test]
    async fn test_can_afford() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![wallet_row(1, dec!(9))]])
            .append_query_results([vec![wallet_row(1, dec!(9))]])
            .into_connection();

        assert!(WalletService::can_afford(&db, 1, dec!(9)).await.unwrap());
        assert!(!WalletService::can_afford(&db, 1, dec!(9.5)).await.unwrap());
    }
}
