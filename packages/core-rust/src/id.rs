//! Short correlation-id generation.

use uuid::Uuid;

/// Generates a 16-character lowercase hex identifier.
///
/// Used as the default correlation id when a caller does not supply one.
/// Half a v4 UUID is plenty for tracing a call chain and keeps log lines
/// short.
#[must_use]
pub fn short_id() -> String {
    let mut buf = Uuid::encode_buffer();
    let full = Uuid::new_v4().simple().encode_lower(&mut buf);
    full[..16].to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn is_16_lowercase_hex_chars() {
        let id = short_id();
        assert_eq!(id.len(), 16);
        assert!(id.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
    }

    #[test]
    fn successive_ids_differ() {
        assert_ne!(short_id(), short_id());
    }
}
