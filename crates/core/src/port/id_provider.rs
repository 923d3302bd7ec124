// Id Provider Port (for deterministic testing)

/// Ticket number generator (allows mocking in tests)
pub trait IdProvider: Send + Sync {
    /// Generate a ticket number, unique per submission
    fn generate_ticket(&self) -> String;
}

/// Uuid-backed ticket provider (production): first six characters of
/// a v4 uuid, matching the operator-facing ticket format
pub struct UuidTicketProvider;

impl IdProvider for UuidTicketProvider {
    fn generate_ticket(&self) -> String {
        uuid::Uuid::new_v4().to_string()[..6].to_string()
    }
}
