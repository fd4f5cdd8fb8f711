// ============================================================================
// SERVICES - Logique métier
// ============================================================================
//
// - wallet_service : moteur de transactions (seul chemin qui mute un solde)
// - settlement_service : payer → générer → journaliser → récompenser
// - job_service : cycle de vie des tâches asynchrones + remboursements
// - prediction_service : recommandation de thèmes + journal
// - generation : collaborateur de génération (Ollama + fallback statique)
//
// ============================================================================

pub mod generation;
pub mod job_service;
pub mod prediction_service;
pub mod settlement_service;
pub mod wallet_service;
