//! API token generation and hashing.

use rand::Rng;
use rand::distr::Alphanumeric;
use sha2::{Digest, Sha256};

/// Length of a generated token, in characters.
pub const TOKEN_LENGTH: usize = 40;

/// Generates a random alphanumeric token.
#[must_use]
pub fn generate_token() -> String {
    rand::rng()
        .sample_iter(&Alphanumeric)
        .take(TOKEN_LENGTH)
        .map(char::from)
        .collect()
}

/// Lowercase hex SHA-256 of `token`.
#[must_use]
pub fn hash_token(token: &str) -> String {
    hex::encode(Sha256::digest(token.as_bytes()))
}
