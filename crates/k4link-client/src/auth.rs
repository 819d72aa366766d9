//! Plaintext authentication.
//!
//! On the plaintext port the client proves knowledge of the password by
//! writing the lowercase hex SHA-384 digest of its UTF-8 bytes, unframed
//! and without a terminator, immediately after the TCP connect. The radio
//! answers a bad password by closing the socket; there is no explicit
//! acknowledgement, so the first decoded packet is taken as success.

use sha2::{Digest, Sha384};

/// Length of the hex digest on the wire.
pub const HASH_HEX_LEN: usize = 96;

/// Lowercase hex SHA-384 of `password`.
///
/// ```
/// use k4link_client::auth::password_hash;
///
/// let hash = password_hash("");
/// assert_eq!(hash.len(), 96);
/// assert!(hash.starts_with("38b060a751ac9638"));
/// ```
pub fn password_hash(password: &str) -> String {
    hex::encode(Sha384::digest(password.as_bytes()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_digest() {
        assert_eq!(
            password_hash("abc"),
            "cb00753f45a35e8bb5a03d699ac65007272c32ab0eded1631a8b605a43ff5bed\
             8086072ba1e7cc2358baeca134c825a7"
        );
    }

    #[test]
    fn lowercase_fixed_length() {
        let hash = password_hash("K4 remote pässword");
        assert_eq!(hash.len(), HASH_HEX_LEN);
        assert!(hash.chars().all(|c| c.is_ascii_digit() || ('a'..='f').contains(&c)));
    }
}
