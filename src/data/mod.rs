//! Actor data layer
//!
//! Models for remote actors and key material, plus the local actor
//! store abstraction the authentication pipeline resolves through.

mod models;
mod store;

pub use models::{Actor, ActorDocument, ActorKeyPair, KeyDocument, PublicKey, PublicKeyDocument};
pub use store::{LocalActorStore, MemoryActorStore};

#[cfg(test)]
pub use store::MockLocalActorStore;
