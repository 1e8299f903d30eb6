use bcrypt::{hash, verify, DEFAULT_COST};

pub fn hash_password(password: &str) -> Result<String, bcrypt::BcryptError> {
    hash(password, DEFAULT_COST)
}

/// Malformed stored hashes count as a mismatch.
pub fn verify_password(password: &str, password_hash: &str) -> bool {
    verify(password, password_hash).unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_and_verify() {
        // Low cost keeps the test fast; verification reads the cost from the hash.
        let hashed = hash("s3cret-pass", 4).unwrap();
        assert!(verify_password("s3cret-pass", &hashed));
        assert!(!verify_password("wrong-pass", &hashed));
    }

    #[test]
    fn test_garbage_hash_is_mismatch() {
        assert!(!verify_password("anything", "not-a-bcrypt-hash"));
    }
}
