/// Token and activation-code codec
///
/// Generates the secrets handed to clients and derives the digests stored in
/// their place. Plaintext secrets never reach the database; every lookup is by
/// exact digest equality, which is why the digest is deterministic SHA-256 and
/// not the salted password hash.
///
/// # Formats
///
/// - **Session / reset token**: 32 random bytes, URL-safe base64 without
///   padding (43 chars)
/// - **Activation code**: 16 chars from an unambiguous alphabet (no `I`, `O`,
///   `0`, `1`), shown as `XXXX-XXXX-XXXX-XXXX`
/// - **Digest**: lowercase hex SHA-256 (64 chars)
///
/// # Example
///
/// ```
/// use atlascrm_shared::auth::token::{digest, generate_activation_code, normalize_code};
///
/// let code = generate_activation_code();
/// assert_eq!(code.len(), 19);
///
/// // Users may type the code lower-case and without hyphens
/// let typed = code.replace('-', " ").to_lowercase();
/// assert_eq!(digest(&normalize_code(&typed)), digest(&normalize_code(&code)));
/// ```

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use rand::{rngs::OsRng, Rng, RngCore};
use sha2::{Digest, Sha256};

/// Number of random bytes in a session or reset token
pub const TOKEN_BYTES: usize = 32;

/// Alphabet for activation codes, visually confusable characters removed
pub const ACTIVATION_CODE_ALPHABET: &[u8] = b"ABCDEFGHJKLMNPQRSTUVWXYZ23456789";

/// Number of significant characters in an activation code
pub const ACTIVATION_CODE_LENGTH: usize = 16;

/// Characters per hyphen-separated group
const ACTIVATION_CODE_GROUP: usize = 4;

/// Generates an opaque session or reset token
///
/// Uses the OS CSPRNG; 256 bits of entropy.
pub fn generate_token() -> String {
    let mut bytes = [0u8; TOKEN_BYTES];
    OsRng.fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

/// Generates a human-typable activation code in display form
///
/// Characters are drawn uniformly from [`ACTIVATION_CODE_ALPHABET`].
pub fn generate_activation_code() -> String {
    let raw: String = (0..ACTIVATION_CODE_LENGTH)
        .map(|_| {
            let idx = OsRng.gen_range(0..ACTIVATION_CODE_ALPHABET.len());
            ACTIVATION_CODE_ALPHABET[idx] as char
        })
        .collect();

    format_code(&raw)
}

/// Canonical form of a user-entered code: ASCII alphanumerics only, uppercased
pub fn normalize_code(code: &str) -> String {
    code.chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .map(|c| c.to_ascii_uppercase())
        .collect()
}

/// Display form of a code: normalized, then grouped in blocks of four
pub fn format_code(code: &str) -> String {
    let normalized = normalize_code(code);
    normalized
        .as_bytes()
        .chunks(ACTIVATION_CODE_GROUP)
        .map(|chunk| String::from_utf8_lossy(chunk).into_owned())
        .collect::<Vec<_>>()
        .join("-")
}

/// Deterministic storage digest of a secret
///
/// Hex-encoded SHA-256. Activation codes must be normalized first.
pub fn digest(value: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(value.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Digest of an activation code as entered by a user
pub fn digest_code(code: &str) -> String {
    digest(&normalize_code(code))
}
