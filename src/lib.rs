//! FedGate - inbound federation authentication for ActivityPub servers
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                 Authentication Orchestrator                  │
//! │  - host policy gate → key resolve → verify → final check    │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      Verification Layer                      │
//! │  - HTTP signatures (RSA-SHA256)                             │
//! │  - Linked-data signatures (RsaSignature2017 fallback)       │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      Resolution Layer                        │
//! │  - Local actor store (trait, owned by the embedder)         │
//! │  - Remote object resolver (reqwest)                         │
//! │  - Host policy snapshots (TTL-cached)                       │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Modules
//!
//! - `federation`: authentication pipeline and signature verification
//! - `policy`: host allow/block list gate
//! - `data`: actor models and the local actor store abstraction
//! - `config`: configuration management
//! - `error`: error and rejection types
//! - `metrics`: Prometheus instruments
//!
//! # Usage
//!
//! ```ignore
//! let authenticator = Authenticator::new(store, remote, policy, &config);
//! match authenticator.authorize(&signature, Some(&activity)).await {
//!     Ok(auth) => process(auth.actor, activity).await?,
//!     Err(rejection) if rejection.is_retryable() => requeue(),
//!     Err(rejection) => drop_message(rejection),
//! }
//! ```

pub mod config;
pub mod data;
pub mod error;
pub mod federation;
pub mod metrics;
pub mod policy;

pub use error::{AppError, FetchError, Rejection};
pub use federation::{Activity, AuthResult, Authenticator, Signature};
