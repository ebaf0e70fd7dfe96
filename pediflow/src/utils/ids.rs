//! Identifier generation.

use uuid::Uuid;

/// Generates a new UUID v4.
#[must_use]
pub fn generate_uuid() -> Uuid {
    Uuid::new_v4()
}

/// Generates `"{prefix}_{uuid}"` using the simple (unhyphenated) form.
#[must_use]
pub fn prefixed_id(prefix: &str) -> String {
    format!("{prefix}_{}", generate_uuid().simple())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_uuid_v4() {
        assert_eq!(generate_uuid().get_version_num(), 4);
    }

    #[test]
    fn test_prefixed_id() {
        let a = prefixed_id("msg");
        let b = prefixed_id("msg");
        assert!(a.starts_with("msg_"));
        assert_eq!(a.len(), "msg_".len() + 32);
        assert_ne!(a, b);
    }
}
