//! Session token signing and verification.
//!
//! Resume tokens are compact HMAC-SHA256 signed payloads
//! (`base64url(claims).base64url(signature)`) handed out on join; a valid
//! token lets a dropped connection rejoin under the same player id.

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;

use crate::util::time::unix_millis;

type HmacSha256 = Hmac<Sha256>;

/// Claims carried by a session resume token
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionClaims {
    pub player_id: String,
    pub room_id: String,
    /// Expiration time (Unix timestamp, seconds)
    pub exp: u64,
}

/// Sign a session token for a player/room pair.
pub fn sign_session_token(
    player_id: &str,
    room_id: &str,
    ttl_sec: u64,
    secret: &str,
) -> Result<String, AuthError> {
    let claims = SessionClaims {
        player_id: player_id.to_string(),
        room_id: room_id.to_string(),
        exp: unix_millis() / 1000 + ttl_sec,
    };
    let payload = serde_json::to_vec(&claims).map_err(|_| AuthError::InvalidToken)?;
    let payload_b64 = URL_SAFE_NO_PAD.encode(payload);

    let mut mac =
        HmacSha256::new_from_slice(secret.as_bytes()).map_err(|_| AuthError::InvalidToken)?;
    mac.update(payload_b64.as_bytes());
    let signature_b64 = URL_SAFE_NO_PAD.encode(mac.finalize().into_bytes());

    Ok(format!("{}.{}", payload_b64, signature_b64))
}

/// Verify a session token and extract its claims.
pub fn verify_session_token(token: &str, secret: &str) -> Result<SessionClaims, AuthError> {
    let parts: Vec<&str> = token.split('.').collect();
    if parts.len() != 2 {
        return Err(AuthError::InvalidToken);
    }
    let payload_b64 = parts[0];
    let signature_b64 = parts[1];

    let mut mac =
        HmacSha256::new_from_slice(secret.as_bytes()).map_err(|_| AuthError::InvalidToken)?;
    mac.update(payload_b64.as_bytes());
    let expected_signature = mac.finalize().into_bytes();
    let provided_signature = URL_SAFE_NO_PAD
        .decode(signature_b64)
        .map_err(|_| AuthError::InvalidToken)?;

    if expected_signature.as_slice() != provided_signature.as_slice() {
        return Err(AuthError::InvalidToken);
    }

    let payload_json = URL_SAFE_NO_PAD
        .decode(payload_b64)
        .map_err(|_| AuthError::InvalidToken)?;
    let claims: SessionClaims =
        serde_json::from_slice(&payload_json).map_err(|_| AuthError::InvalidToken)?;

    if claims.exp < unix_millis() / 1000 {
        return Err(AuthError::TokenExpired);
    }

    Ok(claims)
}

/// Authentication error types
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("Invalid token")]
    InvalidToken,

    #[error("Token expired")]
    TokenExpired,
}
