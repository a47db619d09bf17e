//! HTTP signature verification
//!
//! Verifies a parsed HTTP message signature against a resolved actor's
//! public key. Signature *parsing* happens upstream (in the HTTP
//! layer); this module receives the already-structured signature and
//! only answers whether the claimed actor produced it.
//!
//! Verification never fails with an error: any malformed input — an
//! unsupported algorithm, undecodable base64, broken PEM — is a
//! failed verification, not a fault.

use base64::{Engine, engine::general_purpose::STANDARD as BASE64};
use rsa::pkcs8::DecodePublicKey;
use rsa::signature::Verifier;
use rsa::{RsaPublicKey, pkcs1v15::Signature as Pkcs1v15Signature};
use serde::{Deserialize, Serialize};
use sha2::Sha256;

use crate::data::ActorKeyPair;
use crate::federation::activity::Activity;
use crate::policy::normalize_host;

/// Signature algorithms accepted for HTTP signatures
///
/// `hs2019` leaves the algorithm to the key, which for fediverse
/// actors means RSA-SHA256 in practice.
pub const SUPPORTED_ALGORITHMS: [&str; 2] = ["rsa-sha256", "hs2019"];

/// A parsed HTTP message signature
///
/// Produced by the HTTP layer's signature parser and carried through
/// job queues, hence the serde derives with wire-compatible names.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Signature {
    /// URI of the public key that allegedly produced the signature
    pub key_id: String,
    /// Declared algorithm (e.g., "rsa-sha256")
    pub algorithm: String,
    /// Ordered list of signed header names
    pub headers: Vec<String>,
    /// The exact string that was signed
    pub signing_string: String,
    /// Base64-encoded signature bytes
    pub signature: String,
}

impl Signature {
    /// Normalized host of the keyId URI, if it has one.
    pub fn host(&self) -> Option<String> {
        let url = url::Url::parse(&self.key_id).ok()?;
        url.host_str().map(normalize_host)
    }

    /// Whether the keyId uses the legacy `acct:` addressing scheme.
    ///
    /// That scheme predates key URIs and can no longer be resolved to
    /// a key document.
    pub fn is_legacy_key_id(&self) -> bool {
        self.key_id
            .get(..5)
            .is_some_and(|prefix| prefix.eq_ignore_ascii_case("acct:"))
    }

    /// Whether the keyId is a resolvable HTTP(S) URL.
    pub fn has_resolvable_key_id(&self) -> bool {
        url::Url::parse(&self.key_id)
            .map(|url| matches!(url.scheme(), "http" | "https") && url.host_str().is_some())
            .unwrap_or(false)
    }
}

/// Outcome of primary verification
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrimaryVerdict {
    /// Cryptographic check and actor consistency both passed
    Pass,
    /// The signature bytes do not verify against the key
    CryptoFailed,
    /// The signature verifies but the signer is not the activity's actor
    ActorMismatch,
}

/// Verify an HTTP signature against a resolved actor.
///
/// # Arguments
/// * `pair` - Resolved actor and key material
/// * `signature` - Parsed HTTP signature
/// * `activity` - Activity payload, if the message carried one
///
/// # Returns
/// [`PrimaryVerdict::Pass`] only if the cryptographic check succeeds
/// *and* the actor matches the activity's claimed actor (vacuously
/// true without an activity).
pub fn verify_http_signature(
    pair: &ActorKeyPair,
    signature: &Signature,
    activity: Option<&Activity>,
) -> PrimaryVerdict {
    let Some(key) = pair.usable_key() else {
        return PrimaryVerdict::CryptoFailed;
    };

    if !SUPPORTED_ALGORITHMS.contains(&signature.algorithm.as_str()) {
        tracing::debug!(
            algorithm = %signature.algorithm,
            "Unsupported HTTP signature algorithm"
        );
        return PrimaryVerdict::CryptoFailed;
    }

    if !verify_rsa_sha256(&key.key_pem, &signature.signing_string, &signature.signature) {
        return PrimaryVerdict::CryptoFailed;
    }

    // Actor consistency: the signer must be the actor the activity claims.
    if let Some(activity) = activity {
        if activity.actor_id() != Some(pair.actor.uri.as_str()) {
            tracing::debug!(
                signer = %pair.actor.uri,
                claimed = ?activity.actor_id(),
                "HTTP signature signer does not match activity actor"
            );
            return PrimaryVerdict::ActorMismatch;
        }
    }

    PrimaryVerdict::Pass
}

/// Verify RSA-SHA256 signature bytes over a message.
///
/// Uses unprefixed PKCS#1 v1.5 digests for compatibility with the
/// signatures mainstream fediverse servers emit.
pub(crate) fn verify_rsa_sha256(public_key_pem: &str, message: &str, signature_b64: &str) -> bool {
    let Ok(signature_bytes) = BASE64.decode(signature_b64) else {
        tracing::debug!("Signature is not valid base64");
        return false;
    };

    let public_key = match RsaPublicKey::from_public_key_pem(public_key_pem) {
        Ok(key) => key,
        Err(error) => {
            tracing::debug!(%error, "Unparseable public key PEM");
            return false;
        }
    };

    let verifier = rsa::pkcs1v15::VerifyingKey::<Sha256>::new_unprefixed(public_key);

    let Ok(signature) = Pkcs1v15Signature::try_from(signature_bytes.as_slice()) else {
        return false;
    };

    verifier.verify(message.as_bytes(), &signature).is_ok()
}
