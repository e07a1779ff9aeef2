//! Admin configuration.

use argon2::{Argon2, PasswordHash, PasswordVerifier};

/// Admin configuration with hashed passcode.
#[derive(Debug, Clone)]
pub struct AdminConfig {
    /// The argon2 hashed admin passcode.
    pub passcode_hash: String,
}

impl AdminConfig {
    /// Create a new AdminConfig with the given hashed passcode.
    pub fn new(passcode_hash: String) -> Self {
        Self { passcode_hash }
    }

    /// Verify a plaintext passcode against the stored hash.
    ///
    /// Returns `true` if the passcode matches, `false` otherwise.
    pub fn verify_passcode(&self, plaintext: &str) -> bool {
        let Ok(parsed_hash) = PasswordHash::new(&self.passcode_hash) else {
            return false;
        };

        Argon2::default()
            .verify_password(plaintext.as_bytes(), &parsed_hash)
            .is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::admin::test_support::admin_config;

    #[test]
    fn test_verify_passcode() {
        let admin_config = admin_config("123456");
        assert!(admin_config.verify_passcode("123456"));
        assert!(!admin_config.verify_passcode("654321"));
        assert!(!admin_config.verify_passcode(""));
    }

    #[test]
    fn test_unhashed_passcode_never_verifies() {
        let admin_config = AdminConfig::new("123456".to_owned());
        assert!(!admin_config.verify_passcode("123456"));
    }
}
