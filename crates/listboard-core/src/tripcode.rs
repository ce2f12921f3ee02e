//! Trip codes: deterministic signatures of a poster-supplied secret
//!
//! A trip code proves authorship for later edits. It is not a login
//! credential, so a fixed salt is used to keep the mapping stable.

use crate::error::{ListboardError, Result};
use argon2::Argon2;
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};

const TRIP_SALT: &[u8] = b"listboard-tripcode";
const TRIP_LEN: usize = 10;

/// Derive the public trip code for `secret`. Empty secrets stay anonymous.
pub fn tripcode(secret: &str) -> Result<String> {
    if secret.is_empty() {
        return Ok(String::new());
    }

    let mut digest = [0u8; 16];
    Argon2::default()
        .hash_password_into(secret.as_bytes(), TRIP_SALT, &mut digest)
        .map_err(|e| ListboardError::Tripcode(e.to_string()))?;

    let encoded = URL_SAFE_NO_PAD.encode(digest);
    Ok(format!("!{}", &encoded[..TRIP_LEN]))
}

/// Map a vote form value to its delta
pub fn vote_from_form(value: &str) -> i64 {
    match value {
        "y" => 1,
        "n" => -1,
        _ => 0,
    }
}
