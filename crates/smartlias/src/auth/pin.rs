//! PIN hashing.
//!
//! Stored form is `salt$hex`, where the hash is BLAKE3 in derive-key mode over
//! `pepper || salt || pin`. The pepper comes from configuration and never
//! touches the database.

use uuid::Uuid;

const CONTEXT: &str = "smartlias 2025-01 mpin hash";

/// Hashes and checks PINs with a server-side pepper.
#[derive(Clone, Default)]
pub struct PinHasher {
    pepper: String,
}

impl std::fmt::Debug for PinHasher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PinHasher")
            .field("pepper", &"<redacted>")
            .finish()
    }
}

impl PinHasher {
    /// Create a hasher using `pepper`.
    #[must_use]
    pub fn new(pepper: impl Into<String>) -> Self {
        Self {
            pepper: pepper.into(),
        }
    }

    fn digest(&self, salt: &str, pin: &str) -> blake3::Hash {
        let mut hasher = blake3::Hasher::new_derive_key(CONTEXT);
        hasher.update(self.pepper.as_bytes());
        hasher.update(salt.as_bytes());
        hasher.update(pin.as_bytes());
        hasher.finalize()
    }

    /// Hash a PIN under a fresh random salt.
    #[must_use]
    pub fn hash(&self, pin: &str) -> String {
        let salt = Uuid::new_v4().simple().to_string();
        format!("{salt}${}", self.digest(&salt, pin).to_hex())
    }

    /// Check a PIN against a stored hash.
    ///
    /// Malformed stored values never verify.
    #[must_use]
    pub fn verify(&self, pin: &str, stored: &str) -> bool {
        let Some((salt, hex)) = stored.split_once('$') else {
            return false;
        };
        match blake3::Hash::from_hex(hex) {
            // `Hash` equality is constant time.
            Ok(expected) => self.digest(salt, pin) == expected,
            Err(_) => false,
        }
    }
}
