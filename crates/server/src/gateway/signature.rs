//! HMAC-SHA256 signing and verification for the payment gateway.
//!
//! Outbound order requests are signed with the outbound key; inbound
//! callbacks are verified with the inbound key. The two keys are distinct
//! (enforced at config load).

use hmac::{Hmac, Mac};
use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use sha2::Sha256;
use thiserror::Error;

type HmacSha256 = Hmac<Sha256>;

/// Reasons a signature check fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum SignatureError {
    /// The signature is well-formed but does not match the payload.
    #[error("signature mismatch")]
    Mismatch,

    /// The claimed signature is not a hex-encoded digest.
    #[error("malformed signature")]
    MalformedSignature,

    /// The key cannot be used for HMAC.
    #[error("invalid signing key")]
    InvalidKey,
}

/// A payload whose signature has been checked.
///
/// Only [`verify`] constructs this, so holding one proves the payload came
/// from the key holder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifiedPayload(String);

impl VerifiedPayload {
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    #[must_use]
    pub fn into_inner(self) -> String {
        self.0
    }

    /// Deserialize the payload as JSON.
    ///
    /// # Errors
    ///
    /// Returns the `serde_json` error if the payload does not match `T`.
    pub fn parse<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_str(&self.0)
    }
}

fn keyed(key: &SecretString) -> Result<HmacSha256, SignatureError> {
    HmacSha256::new_from_slice(key.expose_secret().as_bytes())
        .map_err(|_| SignatureError::InvalidKey)
}

/// Sign a message, returning the lowercase hex digest.
///
/// # Errors
///
/// Returns [`SignatureError::InvalidKey`] if the key is rejected.
pub fn sign(message: &str, key: &SecretString) -> Result<String, SignatureError> {
    let mut mac = keyed(key)?;
    mac.update(message.as_bytes());
    Ok(hex::encode(mac.finalize().into_bytes()))
}

/// Check `signature` against `payload` and hand back the verified payload.
///
/// The digest comparison is constant-time.
///
/// # Errors
///
/// Returns [`SignatureError::MalformedSignature`] for non-hex input and
/// [`SignatureError::Mismatch`] when the digest differs.
pub fn verify(
    payload: &str,
    signature: &str,
    key: &SecretString,
) -> Result<VerifiedPayload, SignatureError> {
    let claimed = hex::decode(signature.trim()).map_err(|_| SignatureError::MalformedSignature)?;

    let mut mac = keyed(key)?;
    mac.update(payload.as_bytes());
    mac.verify_slice(&claimed)
        .map_err(|_| SignatureError::Mismatch)?;

    Ok(VerifiedPayload(payload.to_owned()))
}
