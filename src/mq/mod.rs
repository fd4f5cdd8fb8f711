// ============================================================================
// MQ - File de messages durable (table PostgreSQL)
// ============================================================================
//
// Livraison at-least-once:
//   - publish: INSERT d'une ligne queue_message (durable, dans la
//     transaction de l'appelant si fournie)
//   - consommation: réclamation via FOR UPDATE SKIP LOCKED + timeout de
//     visibilité; un message réclamé mais jamais acquitté redevient
//     visible et est re-livré
//   - ack: seulement APRÈS que la transition de statut du job est durable
//
// Les consommateurs doivent donc être idempotents (voir JobService::claim).
// ============================================================================

pub mod consumer;
pub mod publisher;

pub use consumer::QueueConsumer;
pub use publisher::publish;
