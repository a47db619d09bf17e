//! Common test utilities for E2E tests

use std::collections::HashMap;
use std::sync::{Arc, Once};
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use base64::{Engine, engine::general_purpose::STANDARD as BASE64};
use rsa::pkcs8::{DecodePrivateKey, EncodePrivateKey, EncodePublicKey, LineEnding};
use rsa::signature::{SignatureEncoding, Signer};
use rsa::{RsaPrivateKey, RsaPublicKey};
use serde_json::{Value, json};
use sha2::Sha256;

use fedgate::config::{AppConfig, FederationConfig, InstanceConfig, LoggingConfig, PolicyConfig};
use fedgate::data::MemoryActorStore;
use fedgate::error::{AppError, FetchError};
use fedgate::federation::RemoteObjectResolver;
use fedgate::policy::{HostPolicy, HostPolicySource};
use fedgate::{Authenticator, Signature};

/// Remote resolver serving a fixed set of documents.
///
/// Unknown URIs answer like a remote 404. Fetches are counted so
/// tests can assert that short-circuit paths never touch the network.
pub struct TestRemote {
    documents: HashMap<String, Value>,
    calls: AtomicUsize,
}

impl TestRemote {
    pub fn new() -> Self {
        Self {
            documents: HashMap::new(),
            calls: AtomicUsize::new(0),
        }
    }

    /// Register a document at a URI.
    pub fn register(&mut self, uri: &str, document: Value) {
        self.documents.insert(uri.to_string(), document);
    }

    /// Number of resolve calls made so far.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RemoteObjectResolver for TestRemote {
    async fn resolve(&self, uri: &str) -> Result<Value, FetchError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.documents
            .get(uri)
            .cloned()
            .ok_or_else(|| FetchError::Status {
                status: http::StatusCode::NOT_FOUND,
                uri: uri.to_string(),
            })
    }
}

/// Policy source with a fixed snapshot.
pub struct StaticPolicy {
    policy: HostPolicy,
}

impl StaticPolicy {
    pub fn deny(hosts: &[&str]) -> Self {
        Self {
            policy: HostPolicy::deny(hosts.iter().copied()),
        }
    }

    pub fn allow(hosts: &[&str]) -> Self {
        Self {
            policy: HostPolicy::allow(hosts.iter().copied()),
        }
    }
}

#[async_trait]
impl HostPolicySource for StaticPolicy {
    async fn snapshot(&self) -> Result<HostPolicy, AppError> {
        Ok(self.policy.clone())
    }
}

/// Assembled authenticator plus handles to its collaborators.
pub struct TestHarness {
    pub authenticator: Authenticator,
    pub store: Arc<MemoryActorStore>,
    pub remote: Arc<TestRemote>,
}

impl TestHarness {
    pub fn new(remote: TestRemote, policy: StaticPolicy) -> Self {
        init_tracing();

        let remote = Arc::new(remote);
        let store = Arc::new(MemoryActorStore::new(remote.clone()));
        let authenticator = Authenticator::new(
            store.clone(),
            remote.clone(),
            Arc::new(policy),
            &test_config(),
        );

        Self {
            authenticator,
            store,
            remote,
        }
    }
}

static TRACING: Once = Once::new();

/// Install a test-writer tracing subscriber once per test binary.
pub fn init_tracing() {
    TRACING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
            )
            .with_test_writer()
            .try_init();
    });
}

pub fn test_config() -> AppConfig {
    AppConfig {
        instance: InstanceConfig {
            domain: "local.example".to_string(),
        },
        federation: FederationConfig {
            fetch_timeout_secs: 10,
            user_agent: "FedGate-test/0.1.0".to_string(),
        },
        policy: PolicyConfig {
            snapshot_ttl_secs: 30,
        },
        logging: LoggingConfig {
            level: "debug".to_string(),
            format: "pretty".to_string(),
        },
    }
}

/// Generate an RSA keypair as (private PEM, public PEM).
pub fn generate_keypair() -> (String, String) {
    let mut rng = rand::thread_rng();
    let private_key = RsaPrivateKey::new(&mut rng, 1024).expect("key generation should work");
    let public_key = RsaPublicKey::from(&private_key);

    let private_key_pem = private_key
        .to_pkcs8_pem(LineEnding::LF)
        .expect("private key pem")
        .to_string();
    let public_key_pem = public_key
        .to_public_key_pem(LineEnding::LF)
        .expect("public key pem");

    (private_key_pem, public_key_pem)
}

/// Sign a signing string the way fediverse servers do (unprefixed
/// PKCS#1 v1.5 over SHA-256), returning base64.
pub fn sign_signing_string(private_key_pem: &str, signing_string: &str) -> String {
    let private_key = RsaPrivateKey::from_pkcs8_pem(private_key_pem).expect("private key");
    let signing_key = rsa::pkcs1v15::SigningKey::<Sha256>::new_unprefixed(private_key);
    BASE64.encode(signing_key.sign(signing_string.as_bytes()).to_bytes())
}

/// A complete, valid HTTP signature over a fixed signing string.
pub fn http_signature(key_id: &str, private_key_pem: &str) -> Signature {
    let signing_string =
        "(request-target): post /inbox\nhost: local.example\ndate: Sat, 01 Jun 2024 12:00:00 GMT";
    Signature {
        key_id: key_id.to_string(),
        algorithm: "rsa-sha256".to_string(),
        headers: vec![
            "(request-target)".to_string(),
            "host".to_string(),
            "date".to_string(),
        ],
        signing_string: signing_string.to_string(),
        signature: sign_signing_string(private_key_pem, signing_string),
    }
}

/// An ActivityPub actor document advertising the given key.
pub fn actor_document(actor_uri: &str, key_id: &str, public_key_pem: &str) -> Value {
    json!({
        "@context": "https://www.w3.org/ns/activitystreams",
        "id": actor_uri,
        "type": "Person",
        "inbox": format!("{actor_uri}/inbox"),
        "publicKey": {
            "id": key_id,
            "owner": actor_uri,
            "publicKeyPem": public_key_pem,
        }
    })
}
