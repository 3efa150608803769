//! MySQL authentication.
//!
//! Only the `mysql_native_password` plugin is implemented. Servers that
//! request any other plugin are reported as unsupported so callers can
//! route the connection elsewhere.

use sha1::{Digest, Sha1};

/// Plugin name this client can answer.
pub const MYSQL_NATIVE_PASSWORD: &str = "mysql_native_password";

/// Compute the `mysql_native_password` auth response.
///
/// The scramble is the 20-byte nonce from the server handshake. The
/// response is `SHA1(password) XOR SHA1(scramble + SHA1(SHA1(password)))`,
/// always 20 bytes. An empty password produces an empty response.
pub fn native_password_response(password: &str, scramble: &[u8]) -> Vec<u8> {
    if password.is_empty() {
        return Vec::new();
    }

    // Servers may hand over more than 20 bytes; only the first 20 count.
    let scramble = if scramble.len() > 20 {
        &scramble[..20]
    } else {
        scramble
    };

    let mut hasher = Sha1::new();
    hasher.update(password.as_bytes());
    let stage1 = hasher.finalize();

    let mut hasher = Sha1::new();
    hasher.update(stage1);
    let stage2 = hasher.finalize();

    let mut hasher = Sha1::new();
    hasher.update(scramble);
    hasher.update(stage2);
    let stage3 = hasher.finalize();

    stage1
        .iter()
        .zip(stage3.iter())
        .map(|(a, b)| a ^ b)
        .collect()
}
