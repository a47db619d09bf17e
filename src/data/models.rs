//! Data models
//!
//! Rust structs representing remote actors, their key material, and
//! the wire documents they are parsed from. Actors are keyed by their
//! canonical ActivityPub URI; there are no local surrogate IDs.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// =============================================================================
// Actor and key material
// =============================================================================

/// A remote actor known to this instance
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Actor {
    /// Canonical ActivityPub URI (globally unique)
    pub uri: String,
    /// Normalized (punycode, lowercase) host, derived from `uri`
    pub host: String,
    /// When this actor was last materialized from its origin server
    pub fetched_at: DateTime<Utc>,
}

/// Public key of a remote actor, used for signature verification
///
/// An actor has at most one active key in this model; rotation is
/// handled by re-materializing the actor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PublicKey {
    /// Key URI (typically `<actor uri>#main-key`)
    pub id: String,
    /// URI of the actor that owns this key
    pub owner: String,
    /// PEM-encoded RSA public key
    pub key_pem: String,
}

/// A resolved actor together with its key material
///
/// This is what the local actor store hands out and what the
/// authentication pipeline passes around.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActorKeyPair {
    pub actor: Actor,
    pub key: Option<PublicKey>,
}

impl ActorKeyPair {
    /// The actor's key, if it is usable for verification.
    ///
    /// A key without PEM material or without an owner cannot be used.
    pub fn usable_key(&self) -> Option<&PublicKey> {
        self.key
            .as_ref()
            .filter(|key| !key.key_pem.trim().is_empty() && !key.owner.trim().is_empty())
    }
}

// =============================================================================
// Wire documents
// =============================================================================

/// Duck-typed document fetched from a keyId URI
///
/// Requesting a key URI returns either the key object itself
/// (`{id, owner, ...}`) or the owning actor document, whose own `id`
/// doubles as the owner. [`KeyDocument::owner_id`] applies the
/// owner-then-id precedence.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct KeyDocument {
    pub id: Option<String>,
    pub owner: Option<String>,
}

impl KeyDocument {
    /// The actor URI that owns the fetched key, if determinable.
    pub fn owner_id(&self) -> Option<&str> {
        self.owner.as_deref().or(self.id.as_deref())
    }
}

/// Actor document as served by a remote instance
///
/// Only the fields the authentication pipeline needs; everything else
/// in the document is ignored.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActorDocument {
    pub id: String,
    pub public_key: Option<PublicKeyDocument>,
}

/// Public key block inside an actor document
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PublicKeyDocument {
    pub id: String,
    pub owner: Option<String>,
    pub public_key_pem: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn actor(uri: &str) -> Actor {
        Actor {
            uri: uri.to_string(),
            host: "remote.example".to_string(),
            fetched_at: Utc::now(),
        }
    }

    #[test]
    fn key_document_prefers_owner_over_id() {
        let document = KeyDocument {
            id: Some("https://remote.example/users/alice#main-key".to_string()),
            owner: Some("https://remote.example/users/alice".to_string()),
        };
        assert_eq!(
            document.owner_id(),
            Some("https://remote.example/users/alice")
        );
    }

    #[test]
    fn key_document_falls_back_to_id() {
        let document = KeyDocument {
            id: Some("https://remote.example/users/alice".to_string()),
            owner: None,
        };
        assert_eq!(document.owner_id(), Some("https://remote.example/users/alice"));

        let empty = KeyDocument::default();
        assert_eq!(empty.owner_id(), None);
    }

    #[test]
    fn key_without_material_is_unusable() {
        let pair = ActorKeyPair {
            actor: actor("https://remote.example/users/alice"),
            key: Some(PublicKey {
                id: "https://remote.example/users/alice#main-key".to_string(),
                owner: "https://remote.example/users/alice".to_string(),
                key_pem: "   ".to_string(),
            }),
        };
        assert!(pair.usable_key().is_none());
    }

    #[test]
    fn key_without_owner_is_unusable() {
        let pair = ActorKeyPair {
            actor: actor("https://remote.example/users/alice"),
            key: Some(PublicKey {
                id: "https://remote.example/users/alice#main-key".to_string(),
                owner: String::new(),
                key_pem: "-----BEGIN PUBLIC KEY-----".to_string(),
            }),
        };
        assert!(pair.usable_key().is_none());
    }

    #[test]
    fn actor_document_parses_camel_case_fields() {
        let document: ActorDocument = serde_json::from_value(serde_json::json!({
            "id": "https://remote.example/users/alice",
            "type": "Person",
            "publicKey": {
                "id": "https://remote.example/users/alice#main-key",
                "owner": "https://remote.example/users/alice",
                "publicKeyPem": "-----BEGIN PUBLIC KEY-----"
            }
        }))
        .expect("actor document parses");

        let key = document.public_key.expect("key present");
        assert_eq!(key.public_key_pem, "-----BEGIN PUBLIC KEY-----");
    }
}
