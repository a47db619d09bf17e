//! ActivityPub federation authentication
//!
//! Handles:
//! - Inbound message authentication (orchestrator)
//! - HTTP signature verification
//! - Linked-data signature verification (fallback path)
//! - Key/actor resolution with remote fallback
//! - Remote object fetching

mod activity;
mod auth;
mod ld_signature;
mod remote;
mod resolver;
mod signature;

pub use activity::{Activity, LdSignatureBlock};
pub use auth::{AuthResult, Authenticator};
pub use ld_signature::{
    RSA_SIGNATURE_2017, canonicalize, sign_rsa_signature_2017, verify_rsa_signature_2017,
};
pub use remote::{ACTIVITY_CONTENT_TYPE, HttpRemoteResolver, RemoteObjectResolver};
pub use resolver::ActorResolver;
pub use signature::{PrimaryVerdict, SUPPORTED_ALGORITHMS, Signature, verify_http_signature};

#[cfg(test)]
pub use remote::MockRemoteObjectResolver;
