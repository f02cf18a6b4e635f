//! Prefixed ID generation for Payguard identifiers.
//!
//! All IDs use a `pg_` brand prefix to guarantee collision avoidance with
//! payment gateway IDs (Stripe's `cs_`, `evt_`, `pi_`, etc.).
//!
//! Format: `pg_{entity}_{uuid_simple}` (32 hex chars, no hyphens)

use uuid::Uuid;

/// All known entity prefixes for validation.
const ALL_PREFIXES: &[&str] = &["pg_req_", "pg_idem_"];

/// Validate that a string is a valid Payguard prefixed ID.
///
/// This is a cheap check to reject garbage before hitting the database.
/// Validates format: `pg_{entity}_{32_hex_chars}`
pub fn is_valid_prefixed_id(s: &str) -> bool {
    // Must start with a known prefix
    let Some(prefix) = ALL_PREFIXES.iter().find(|p| s.starts_with(*p)) else {
        return false;
    };

    // Get the hex part after the prefix
    let hex_part = &s[prefix.len()..];

    // Must be exactly 32 hex characters
    hex_part.len() == 32 && hex_part.chars().all(|c| c.is_ascii_hexdigit())
}

/// Entity types that have prefixed IDs in Payguard.
///
/// `Request` ids deduplicate initiation attempts at the storage layer;
/// `IdempotencyKey` ids deduplicate the gateway call against transport-level
/// retries. The two serve different layers and are never conflated.
#[derive(Debug, Clone, Copy)]
pub enum EntityType {
    Request,
    IdempotencyKey,
}

impl EntityType {
    /// Returns the prefix for this entity type.
    pub fn prefix(&self) -> &'static str {
        match self {
            Self::Request => "pg_req",
            Self::IdempotencyKey => "pg_idem",
        }
    }

    /// Generates a new prefixed ID for this entity type.
    pub fn gen_id(&self) -> String {
        format!("{}_{}", self.prefix(), Uuid::new_v4().as_simple())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_id_format() {
        let id = EntityType::Request.gen_id();
        assert!(id.starts_with("pg_req_"));
        // pg_req_ (7 chars) + 32 hex chars = 39 chars total
        assert_eq!(id.len(), 39);
    }

    #[test]
    fn test_ids_are_unique() {
        let id1 = EntityType::Request.gen_id();
        let id2 = EntityType::Request.gen_id();
        assert_ne!(id1, id2);
    }

    #[test]
    fn test_request_and_idempotency_prefixes_differ() {
        assert_ne!(
            EntityType::Request.prefix(),
            EntityType::IdempotencyKey.prefix()
        );
    }

    #[test]
    fn test_is_valid_prefixed_id() {
        // Generated IDs should be valid
        assert!(is_valid_prefixed_id(&EntityType::Request.gen_id()));
        assert!(is_valid_prefixed_id(&EntityType::IdempotencyKey.gen_id()));

        // Invalid IDs
        assert!(!is_valid_prefixed_id("")); // empty
        assert!(!is_valid_prefixed_id("a1b2c3d4-e5f6-7890-1234-567890123456")); // plain UUID
        assert!(!is_valid_prefixed_id("pg_unknown_a1b2c3d4e5f6789012345678901234ab")); // unknown prefix
        assert!(!is_valid_prefixed_id("pg_req_a1b2c3d4")); // too short
        assert!(!is_valid_prefixed_id("pg_req_a1b2c3d4e5f6789012345678901234gg")); // non-hex
        assert!(!is_valid_prefixed_id("cs_test_a1b2c3d4e5f6789012345678901234ab")); // gateway id
    }
}
