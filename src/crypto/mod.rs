//! # Digest Module
//!
//! The single digest the service hands out: SHA-512 over the raw secret
//! bytes, unsalted, encoded as URL-safe base64 with padding.

use base64::{engine::general_purpose::URL_SAFE as BASE64_URL_SAFE, Engine};
use sha2::{Digest, Sha512};

/// Name of the digest algorithm, reported by the health endpoint
pub const DIGEST_ALGORITHM: &str = "SHA-512";

/// Length in characters of an encoded digest (64 bytes, padded base64)
pub const ENCODED_DIGEST_LEN: usize = 88;

/// Hash `secret` with SHA-512 and encode it as URL-safe padded base64
///
/// Deterministic: the same secret always yields the same string.
#[must_use]
pub fn digest_secret(secret: &[u8]) -> String {
    let hash = Sha512::digest(secret);
    BASE64_URL_SAFE.encode(hash)
}
