/// Password hashing module using Argon2id
///
/// Passwords are hashed with Argon2id into PHC strings that embed the
/// algorithm, the work-factor parameters and a random salt. Verification
/// reads the parameters back out of the stored hash, so raising the work
/// factor only affects newly hashed passwords.
///
/// # Security
///
/// - **Algorithm**: Argon2id
/// - **Default work factor**: 64 MB memory, 3 passes, 4 lanes (comfortably
///   above bcrypt cost 12)
/// - **Salt**: 16 random bytes per hash from the OS RNG
/// - **Comparison**: constant-time, inside `argon2`
///
/// # Example
///
/// ```
/// use atlascrm_shared::auth::password::{HashParams, SecretHasher};
///
/// # fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let hasher = SecretHasher::new(HashParams::default());
/// let hash = hasher.hash("super_secret_password_123")?;
///
/// assert!(hasher.verify("super_secret_password_123", &hash));
/// assert!(!hasher.verify("wrong_password", &hash));
/// assert!(!hasher.verify("anything", "not-a-phc-string"));
/// # Ok(())
/// # }
/// ```

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Algorithm, Argon2, Params, ParamsBuilder, Version,
};

/// Minimum password length accepted at registration and reset
pub const PASSWORD_MIN_LENGTH: usize = 8;

/// The one sentence shown for any password that fails the strength rule
pub const PASSWORD_RULE_MESSAGE: &str =
    "Password must be at least 8 characters and contain at least one letter and one digit.";

/// Error type for password hashing operations
#[derive(Debug, thiserror::Error)]
pub enum PasswordError {
    /// Failed to hash password
    #[error("Failed to hash password: {0}")]
    HashError(String),

    /// Work-factor parameters were rejected
    #[error("Invalid hash parameters: {0}")]
    InvalidParams(String),
}

/// Argon2id work-factor parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HashParams {
    /// Memory cost in KiB
    pub memory_kib: u32,

    /// Number of passes
    pub iterations: u32,

    /// Degree of parallelism (lanes)
    pub parallelism: u32,
}

impl Default for HashParams {
    fn default() -> Self {
        Self {
            memory_kib: 65536, // 64 MB
            iterations: 3,
            parallelism: 4,
        }
    }
}

impl HashParams {
    fn build(&self) -> Result<Params, PasswordError> {
        ParamsBuilder::new()
            .m_cost(self.memory_kib)
            .t_cost(self.iterations)
            .p_cost(self.parallelism)
            .output_len(32)
            .build()
            .map_err(|e| PasswordError::InvalidParams(e.to_string()))
    }
}

/// One-way secret hasher with a tunable work factor
///
/// Cheap to clone. Hashing is CPU-bound; async callers should go through
/// [`SecretHasher::hash_blocking`] and [`SecretHasher::verify_blocking`],
/// which move the work onto tokio's blocking pool.
#[derive(Debug, Clone, Copy, Default)]
pub struct SecretHasher {
    params: HashParams,
}

impl SecretHasher {
    /// Creates a hasher with the given work factor
    pub fn new(params: HashParams) -> Self {
        Self { params }
    }

    /// Checks that the configured parameters are acceptable to Argon2
    pub fn validate_params(&self) -> Result<(), PasswordError> {
        self.params.build().map(|_| ())
    }

    /// Hashes a secret into a PHC string
    ///
    /// Example output:
    /// ```text
    /// $argon2id$v=19$m=65536,t=3,p=4$c2FsdHNhbHRzYWx0$hash...
    /// ```
    ///
    /// # Errors
    ///
    /// Returns `PasswordError::HashError` if hashing fails, or
    /// `PasswordError::InvalidParams` if the work factor is rejected.
    pub fn hash(&self, secret: &str) -> Result<String, PasswordError> {
        let salt = SaltString::generate(&mut OsRng);
        let argon2 = Argon2::new(Algorithm::Argon2id, Version::V0x13, self.params.build()?);

        let password_hash = argon2
            .hash_password(secret.as_bytes(), &salt)
            .map_err(|e| PasswordError::HashError(format!("Hash generation failed: {}", e)))?;

        Ok(password_hash.to_string())
    }

    /// Verifies a secret against a stored hash
    ///
    /// Returns `false` for a wrong secret and for a stored value that is not
    /// a valid PHC string. Never fails.
    pub fn verify(&self, secret: &str, hash: &str) -> bool {
        let parsed_hash = match PasswordHash::new(hash) {
            Ok(parsed) => parsed,
            Err(e) => {
                tracing::debug!(error = %e, "Stored password hash is not a PHC string");
                return false;
            }
        };

        // Parameters come from the stored hash
        match Argon2::default().verify_password(secret.as_bytes(), &parsed_hash) {
            Ok(()) => true,
            Err(argon2::password_hash::Error::Password) => false,
            Err(e) => {
                tracing::debug!(error = %e, "Password verification failed");
                false
            }
        }
    }

    /// [`SecretHasher::hash`] on the blocking thread pool
    pub async fn hash_blocking(&self, secret: String) -> Result<String, PasswordError> {
        let hasher = *self;
        tokio::task::spawn_blocking(move || hasher.hash(&secret))
            .await
            .map_err(|e| PasswordError::HashError(format!("Hashing task failed: {}", e)))?
    }

    /// [`SecretHasher::verify`] on the blocking thread pool
    pub async fn verify_blocking(&self, secret: String, hash: String) -> bool {
        let hasher = *self;
        tokio::task::spawn_blocking(move || hasher.verify(&secret, &hash))
            .await
            .unwrap_or(false)
    }
}

/// Validates password strength
///
/// A password is accepted when it:
/// - is at least [`PASSWORD_MIN_LENGTH`] characters long
/// - contains at least one ASCII letter
/// - contains at least one digit
///
/// The error is always [`PASSWORD_RULE_MESSAGE`]; which part failed is not
/// reported.
///
/// # Example
///
/// ```
/// use atlascrm_shared::auth::password::validate_password_strength;
///
/// assert!(validate_password_strength("atlas2024").is_ok());
/// assert!(validate_password_strength("short1").is_err());
/// assert!(validate_password_strength("onlyletters").is_err());
/// ```
pub fn validate_password_strength(password: &str) -> Result<(), &'static str> {
    let long_enough = password.chars().count() >= PASSWORD_MIN_LENGTH;
    let has_letter = password.chars().any(|c| c.is_ascii_alphabetic());
    let has_digit = password.chars().any(|c| c.is_ascii_digit());

    if long_enough && has_letter && has_digit {
        Ok(())
    } else {
        Err(PASSWORD_RULE_MESSAGE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fast_hasher() -> SecretHasher {
        SecretHasher::new(HashParams {
            memory_kib: 1024,
            iterations: 1,
            parallelism: 1,
        })
    }

    #[test]
    fn test_hash_embeds_parameters() {
        let hash = SecretHasher::default()
            .hash("test_password_123")
            .expect("Hash should succeed");

        assert!(hash.starts_with("$argon2id$"));
        assert!(hash.contains("v=19"));
        assert!(hash.contains("m=65536"));
        assert!(hash.contains("t=3"));
        assert!(hash.contains("p=4"));
    }

    #[test]
    fn test_hash_uses_configured_work_factor() {
        let hash = fast_hasher().hash("pw").expect("Hash should succeed");
        assert!(hash.contains("m=1024,t=1,p=1"));
    }

    #[test]
    fn test_hash_produces_different_salts() {
        let hasher = fast_hasher();
        let hash1 = hasher.hash("same_password").expect("Hash 1 should succeed");
        let hash2 = hasher.hash("same_password").expect("Hash 2 should succeed");

        assert_ne!(hash1, hash2);
    }

    #[test]
    fn test_verify_correct_and_incorrect() {
        let hasher = fast_hasher();
        let hash = hasher.hash("correct_password").expect("Hash should succeed");

        assert!(hasher.verify("correct_password", &hash));
        assert!(!hasher.verify("wrong_password", &hash));
        assert!(!hasher.verify("", &hash));
    }

    #[test]
    fn test_verify_accepts_hash_from_other_work_factor() {
        let stored = fast_hasher().hash("pw12345678").expect("Hash should succeed");
        assert!(SecretHasher::default().verify("pw12345678", &stored));
    }

    #[test]
    fn test_verify_invalid_hash_is_false() {
        let hasher = fast_hasher();
        assert!(!hasher.verify("password", "invalid_hash"));
        assert!(!hasher.verify("password", "$argon2id$invalid"));
        assert!(!hasher.verify("password", ""));
    }

    #[test]
    fn test_invalid_params_rejected() {
        let hasher = SecretHasher::new(HashParams {
            memory_kib: 1,
            iterations: 0,
            parallelism: 1,
        });

        assert!(hasher.validate_params().is_err());
        assert!(matches!(
            hasher.hash("pw"),
            Err(PasswordError::InvalidParams(_))
        ));
    }

    #[tokio::test]
    async fn test_blocking_roundtrip() {
        let hasher = fast_hasher();
        let hash = hasher
            .hash_blocking("unicode-密码-パスワード1".to_string())
            .await
            .expect("Hash should succeed");

        assert!(
            hasher
                .verify_blocking("unicode-密码-パスワード1".to_string(), hash.clone())
                .await
        );
        assert!(!hasher.verify_blocking("other".to_string(), hash).await);
    }

    #[test]
    fn test_validate_password_strength_valid() {
        for password in ["atlas2024", "12345678a", "Str0ng!Pass", "pass word 9"] {
            assert!(
                validate_password_strength(password).is_ok(),
                "Password '{}' should be valid",
                password
            );
        }
    }

    #[test]
    fn test_validate_password_strength_rejections() {
        for password in ["sh0rt", "abcdefgh", "12345678", "", "ğüşıöç12"] {
            assert_eq!(
                validate_password_strength(password),
                Err(PASSWORD_RULE_MESSAGE),
                "Password '{}' should be rejected",
                password
            );
        }
    }
}
