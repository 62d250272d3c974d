use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};

/// Hashes a password into an argon2 PHC string for the `users.password` column.
pub fn hash_password(password: &str) -> Result<String, potion::Error> {
    let salt = SaltString::generate(&mut OsRng);

    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| {
            log::error!("Failed to hash password: {e}");
            potion::Error {
                code: 500,
                info: Some(String::from("Failed to hash password")),
                redirect: None,
            }
        })
}

/// A stored hash that does not parse never matches.
pub fn password_matches(password: &str, stored_hash: &str) -> bool {
    let parsed_hash = match PasswordHash::new(stored_hash) {
        Ok(hash) => hash,
        Err(e) => {
            log::error!("Stored password hash is unreadable: {e}");
            return false;
        }
    };

    Argon2::default()
        .verify_password(password.as_bytes(), &parsed_hash)
        .is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verifies_own_hash_only() {
        let hash = hash_password("correct horse").unwrap();

        assert!(hash.starts_with("$argon2"));
        assert!(password_matches("correct horse", &hash));
        assert!(!password_matches("battery staple", &hash));
    }

    #[test]
    fn salts_every_hash() {
        assert_ne!(hash_password("same").unwrap(), hash_password("same").unwrap());
    }

    #[test]
    fn malformed_hash_never_matches() {
        assert!(!password_matches("anything", "not-a-phc-string"));
        assert!(!password_matches("", ""));
    }
}
