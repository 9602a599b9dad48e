/// Generate a new opaque entity id.
pub fn generate_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generated_ids_are_unique() {
        assert_ne!(generate_id(), generate_id());
    }

    #[test]
    fn test_generated_id_is_uuid() {
        assert!(uuid::Uuid::parse_str(&generate_id()).is_ok());
    }
}
