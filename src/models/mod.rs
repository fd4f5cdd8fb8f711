// ============================================================================
// MODELS - MODULE PRINCIPAL
// ============================================================================
//
// Description:
//   Point d'entrée pour tous les modèles de données.
//   Chaque modèle correspond à une table PostgreSQL avec SeaORM.
//
// Liste des modules:
//   - users : Utilisateurs (email + password, flag admin)
//   - wallet : Solde de crédits (1:1 avec users, balance >= 0)
//   - transaction_log : Journal append-only des mouvements (credit/debit)
//   - theme : Thèmes d'exercices (niveau A1..B2, comics de base/bonus)
//   - task_log : Exercices générés/soumis
//   - task_result : Résultat rattaché 1:1 à task_log
//   - prediction_log : Journal des thèmes recommandés (anti-répétition)
//   - job : Tâches asynchrones (pending → processing → done/failed)
//   - queue_message : File de messages durable (livraison at-least-once)
//
// Points d'attention:
//   - Tous les modèles utilisent SeaORM (pas de SQL brut)
//   - Le solde du wallet n'est JAMAIS modifié hors de WalletService
//   - Les relations entre tables sont définies dans chaque modèle
//
// ============================================================================

pub mod job;
pub mod prediction_log;
pub mod queue_message;
pub mod task_log;
pub mod task_result;
pub mod theme;
pub mod transaction_log;
pub mod users;
pub mod wallet;
