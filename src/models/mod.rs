// ============================================================================
// MODELS - MODULE PRINCIPAL
// ============================================================================
//
// Description:
//   Point d'entrée pour tous les modèles de données.
//   Chaque entité correspond à une table PostgreSQL avec SeaORM.
//
// Liste des modules:
//   - health : Health check API
//   - users : Utilisateurs (rôles, reset password, soft delete)
//   - tour : Tours (dates, localisations et images en JSONB)
//   - tour_guide : Jointure tours <-> guides
//   - review : Reviews (une par user et par tour)
//   - booking : Réservations payées
//   - dto : Corps de requêtes validés et réponses "populées"
//
// Points d'attention:
//   - Tous les modèles utilisent SeaORM (pas de SQL brut)
//   - Les tables sont créées au démarrage par db::sync_schema
//
// ============================================================================

pub mod booking;
pub mod dto;
pub mod health;
pub mod review;
pub mod tour;
pub mod tour_guide;
pub mod users;
