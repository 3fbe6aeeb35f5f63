/// Authentication and authorization
///
/// # Modules
///
/// - [`password`]: Argon2id secret hashing and the password strength rule
/// - [`token`]: session/reset tokens, activation codes and their digests
/// - [`session`]: cookie sessions keyed by token digest
/// - [`reset`]: single-use password reset tokens
/// - [`activation`]: DEMO/PAID activation code issuance and redemption
/// - [`authorization`]: access tiers and tenant scoping
/// - [`service`]: the facade the HTTP layer and the admin CLI call
///
/// # Security Properties
///
/// - **Secrets at rest**: only Argon2id hashes (passwords) and SHA-256 digests
///   (tokens, codes) are stored
/// - **Generic failures**: unknown email vs wrong password, and unknown vs
///   used vs expired tokens and codes, produce identical errors
/// - **Single use**: reset tokens and activation codes are claimed with
///   conditional updates inside one transaction
///
/// # Example
///
/// ```
/// use atlascrm_shared::auth::password::{HashParams, SecretHasher};
/// use atlascrm_shared::auth::token::{digest, generate_token};
///
/// # fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let hasher = SecretHasher::new(HashParams::default());
/// let hash = hasher.hash("user_password1")?;
/// assert!(hasher.verify("user_password1", &hash));
///
/// let token = generate_token();
/// let stored = digest(&token);
/// assert_eq!(stored.len(), 64);
/// # Ok(())
/// # }
/// ```

pub mod activation;
pub mod authorization;
pub mod password;
pub mod reset;
pub mod service;
pub mod session;
pub mod token;
