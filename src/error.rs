//! Error types for FedGate
//!
//! Two families of errors live here:
//!
//! - [`AppError`]: internal faults (configuration, store access, remote
//!   fetch transport) that the crate's own components exchange.
//! - [`Rejection`]: the typed authentication outcomes returned by
//!   [`crate::federation::Authenticator::authorize`]. Expected rejection
//!   paths are values, never panics or opaque errors.

use http::StatusCode;
use thiserror::Error;

/// Application-wide error type
///
/// Covers faults that are not authentication decisions: broken
/// configuration, a failing actor store, transport problems while
/// talking to a remote server.
#[derive(Debug, Error)]
pub enum AppError {
    /// Validation error (malformed URI, unusable document)
    #[error("Validation error: {0}")]
    Validation(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Local actor store error
    #[error("Store error: {0}")]
    Store(String),

    /// Remote fetch error (classified)
    #[error(transparent)]
    Fetch(#[from] FetchError),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl From<config::ConfigError> for AppError {
    fn from(err: config::ConfigError) -> Self {
        AppError::Config(err.to_string())
    }
}

/// Result type alias using AppError
pub type Result<T> = std::result::Result<T, AppError>;

/// Classified failure from the remote object resolver
///
/// The classification drives retry policy: an HTTP 4xx means the
/// remote entity is gone or was never there (do not retry), everything
/// else is a condition that may clear up.
#[derive(Debug, Error)]
pub enum FetchError {
    /// The remote answered with a non-success status code
    #[error("remote returned HTTP {status} for {uri}")]
    Status { status: StatusCode, uri: String },

    /// The request never completed (DNS, connect, timeout, TLS)
    #[error("transport failure fetching {uri}: {message}")]
    Transport { uri: String, message: String },

    /// The remote answered 2xx but the body was not a usable document
    #[error("invalid payload from {uri}: {message}")]
    Payload { uri: String, message: String },
}

impl FetchError {
    /// True when retrying the same fetch cannot succeed.
    ///
    /// 4xx responses and undecodable payloads are permanent; transport
    /// failures and 5xx responses are transient.
    pub fn is_permanent(&self) -> bool {
        match self {
            FetchError::Status { status, .. } => status.is_client_error(),
            FetchError::Payload { .. } => true,
            FetchError::Transport { .. } => false,
        }
    }
}

/// Typed rejection returned by the authentication orchestrator
///
/// Every expected failure of an authentication attempt maps to exactly
/// one variant, so callers can distinguish "drop this message" from
/// "retry later" without string matching.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Rejection {
    /// The signer's host is not allowed to interact with this instance
    #[error("blocked host: {host}")]
    BlockedHost { host: String },

    /// The signature keyId uses a form that cannot be resolved to a key
    #[error("unsupported keyId form: {key_id}")]
    UnsupportedKeyIdScheme { key_id: String },

    /// No actor with usable public key material could be resolved
    #[error("no public key available for signer")]
    NoPublicKey,

    /// The embedded payload signature uses an unsupported scheme
    #[error("unsupported signature type: {signature_type}")]
    UnsupportedSignatureType { signature_type: String },

    /// Cryptographic verification failed on every applicable path
    #[error("signature verification failed")]
    SignatureMismatch,

    /// The verified signer is not the actor the activity claims
    #[error("signer does not match activity actor: {detail}")]
    ActorActivityMismatch { detail: String },

    /// Resolution failed for a reason that may clear up (network, 5xx)
    #[error("transient resolution error: {reason}")]
    ResolutionTransientError { reason: String },

    /// Resolution failed permanently (gone remote entity, internal fault)
    #[error("permanent resolution error: {reason}")]
    ResolutionPermanentError { reason: String },
}

impl Rejection {
    /// Whether a caller may retry the whole attempt later.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Rejection::ResolutionTransientError { .. })
    }

    /// Stable label for metrics and logs.
    pub fn label(&self) -> &'static str {
        match self {
            Rejection::BlockedHost { .. } => "blocked_host",
            Rejection::UnsupportedKeyIdScheme { .. } => "unsupported_key_id",
            Rejection::NoPublicKey => "no_public_key",
            Rejection::UnsupportedSignatureType { .. } => "unsupported_signature_type",
            Rejection::SignatureMismatch => "signature_mismatch",
            Rejection::ActorActivityMismatch { .. } => "actor_mismatch",
            Rejection::ResolutionTransientError { .. } => "resolution_transient",
            Rejection::ResolutionPermanentError { .. } => "resolution_permanent",
        }
    }
}
