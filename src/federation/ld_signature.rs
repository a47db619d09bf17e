//! Linked-data signatures
//!
//! Fallback verification path for activities whose transport signature
//! cannot be verified (relayed messages, key/actor skew): the payload
//! itself carries an embedded `RsaSignature2017` block, verified via a
//! canonicalization + digest procedure that is independent of HTTP.
//!
//! The signing input is the SHA-256 digest of the canonicalized
//! signature options concatenated with the SHA-256 digest of the
//! canonicalized document (minus its signature block), both hex
//! encoded. Canonicalization is deterministic sorted-key JSON
//! serialization.
//!
//! Verification never raises: any canonicalization or crypto problem
//! is a failed verification.

use base64::{Engine, engine::general_purpose::STANDARD as BASE64};
use chrono::{SecondsFormat, Utc};
use rsa::pkcs8::{DecodePrivateKey, DecodePublicKey};
use rsa::signature::{SignatureEncoding, Signer, Verifier};
use rsa::{RsaPrivateKey, RsaPublicKey, pkcs1v15::Signature as Pkcs1v15Signature};
use serde_json::{Map, Value};
use sha2::{Digest, Sha256};

use crate::error::AppError;
use crate::federation::activity::Activity;

/// The one supported embedded signature scheme
pub const RSA_SIGNATURE_2017: &str = "RsaSignature2017";

/// Security context pinned into the signature options during hashing
const SECURITY_CONTEXT: &str = "https://w3id.org/identity/v1";

/// Serialize a JSON value deterministically.
///
/// Compact form with object keys emitted in sorted order at every
/// nesting level, so both signer and verifier hash identical bytes.
pub fn canonicalize(value: &Value) -> String {
    let mut out = String::new();
    write_canonical(value, &mut out);
    out
}

fn write_canonical(value: &Value, out: &mut String) {
    match value {
        Value::Object(map) => {
            out.push('{');
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            for (index, key) in keys.iter().enumerate() {
                if index > 0 {
                    out.push(',');
                }
                write_canonical(&Value::String((*key).clone()), out);
                out.push(':');
                if let Some(child) = map.get(*key) {
                    write_canonical(child, out);
                }
            }
            out.push('}');
        }
        Value::Array(items) => {
            out.push('[');
            for (index, item) in items.iter().enumerate() {
                if index > 0 {
                    out.push(',');
                }
                write_canonical(item, out);
            }
            out.push(']');
        }
        // Scalars already have a single compact rendering.
        scalar => out.push_str(&scalar.to_string()),
    }
}

fn sha256_hex(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    let digest = hasher.finalize();
    let mut hex = String::with_capacity(digest.len() * 2);
    for byte in digest {
        hex.push_str(&format!("{byte:02x}"));
    }
    hex
}

/// Build the string that gets signed/verified.
///
/// `options` is the signature block; its `type`, `id` and
/// `signatureValue` members do not participate and the security
/// context is pinned. `document` is the full activity payload; its
/// `signature` member is excluded.
fn create_verify_data(document: &Value, options: &Value) -> String {
    let mut options_view = match options {
        Value::Object(map) => map.clone(),
        _ => Map::new(),
    };
    options_view.remove("type");
    options_view.remove("id");
    options_view.remove("signatureValue");
    options_view.insert(
        "@context".to_string(),
        Value::String(SECURITY_CONTEXT.to_string()),
    );

    let mut document_view = match document {
        Value::Object(map) => map.clone(),
        _ => Map::new(),
    };
    document_view.remove("signature");

    let options_hash = sha256_hex(canonicalize(&Value::Object(options_view)).as_bytes());
    let document_hash = sha256_hex(canonicalize(&Value::Object(document_view)).as_bytes());

    format!("{options_hash}{document_hash}")
}

/// Attach an `RsaSignature2017` block to an activity.
///
/// # Arguments
/// * `activity` - Payload to sign (an existing signature block is replaced)
/// * `private_key_pem` - PKCS#8 PEM-encoded RSA private key
/// * `creator` - Key URI recorded as the signature's creator
///
/// # Errors
/// Returns error if the private key cannot be parsed.
pub fn sign_rsa_signature_2017(
    activity: &Activity,
    private_key_pem: &str,
    creator: &str,
) -> Result<Activity, AppError> {
    let options = serde_json::json!({
        "type": RSA_SIGNATURE_2017,
        "creator": creator,
        "created": Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true),
    });

    let verify_data = create_verify_data(activity.as_value(), &options);

    let private_key = RsaPrivateKey::from_pkcs8_pem(private_key_pem)
        .map_err(|e| AppError::Validation(format!("Invalid private key: {e}")))?;
    let signing_key = rsa::pkcs1v15::SigningKey::<Sha256>::new_unprefixed(private_key);
    let signature_b64 = BASE64.encode(signing_key.sign(verify_data.as_bytes()).to_bytes());

    let mut block = match options {
        Value::Object(map) => map,
        _ => Map::new(),
    };
    block.insert(
        "signatureValue".to_string(),
        Value::String(signature_b64),
    );

    Ok(activity.with_signature(Value::Object(block)))
}

/// Verify the embedded `RsaSignature2017` block of an activity.
///
/// # Returns
/// `true` only if the recomputed canonical digest verifies against the
/// given key. Missing blocks, undecodable values, and key parse
/// failures all yield `false`.
pub fn verify_rsa_signature_2017(activity: &Activity, public_key_pem: &str) -> bool {
    let Some(options) = activity.raw_signature() else {
        return false;
    };
    let Some(signature_b64) = options.get("signatureValue").and_then(Value::as_str) else {
        tracing::debug!("LD signature block has no signatureValue");
        return false;
    };
    let Ok(signature_bytes) = BASE64.decode(signature_b64) else {
        tracing::debug!("LD signatureValue is not valid base64");
        return false;
    };

    let verify_data = create_verify_data(activity.as_value(), options);

    let public_key = match RsaPublicKey::from_public_key_pem(public_key_pem) {
        Ok(key) => key,
        Err(error) => {
            tracing::debug!(%error, "Unparseable public key PEM for LD signature");
            return false;
        }
    };
    let verifier = rsa::pkcs1v15::VerifyingKey::<Sha256>::new_unprefixed(public_key);
    let Ok(signature) = Pkcs1v15Signature::try_from(signature_bytes.as_slice()) else {
        return false;
    };

    verifier
        .verify(verify_data.as_bytes(), &signature)
        .is_ok()
}
