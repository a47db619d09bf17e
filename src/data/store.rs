//! Local actor store
//!
//! The persistent store of known actors and their key material is
//! owned by the embedding application; the authentication pipeline
//! only needs two lookups and one upsert, expressed as the
//! [`LocalActorStore`] trait.
//!
//! [`MemoryActorStore`] is an in-memory reference implementation used
//! by the integration tests and useful for embedders' own tests.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;

use crate::data::models::{Actor, ActorDocument, ActorKeyPair, PublicKey};
use crate::error::{AppError, FetchError};
use crate::federation::RemoteObjectResolver;

/// Store of locally known actors and their keys
///
/// `materialize` must be idempotent: concurrent materializations of
/// the same actor URI may race, and the store must guarantee
/// at-most-one-writer-wins semantics per URI so a partially completed
/// attempt never leaves inconsistent state.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait LocalActorStore: Send + Sync {
    /// Look up an actor by the URI of its public key.
    async fn find_by_key_id(&self, key_id: &str) -> Result<Option<ActorKeyPair>, AppError>;

    /// Look up an actor by its canonical URI.
    async fn find_by_actor_id(&self, actor_id: &str) -> Result<Option<ActorKeyPair>, AppError>;

    /// Fetch a remote actor and persist (or update) it locally.
    async fn materialize(&self, actor_id: &str) -> Result<(), AppError>;
}

/// In-memory actor store
///
/// Materializes actors through a [`RemoteObjectResolver`] and keeps
/// them in a map keyed by actor URI. Upserts replace the whole entry,
/// so a re-materialization after key rotation swaps the key
/// atomically.
pub struct MemoryActorStore {
    remote: Arc<dyn RemoteObjectResolver>,
    actors: RwLock<HashMap<String, ActorKeyPair>>,
}

impl MemoryActorStore {
    /// Create an empty store backed by the given resolver.
    pub fn new(remote: Arc<dyn RemoteObjectResolver>) -> Self {
        Self {
            remote,
            actors: RwLock::new(HashMap::new()),
        }
    }

    /// Insert or replace an actor entry directly.
    ///
    /// Used to seed test fixtures and to import actors discovered
    /// outside the authentication pipeline.
    pub async fn upsert(&self, pair: ActorKeyPair) {
        let mut actors = self.actors.write().await;
        actors.insert(pair.actor.uri.clone(), pair);
    }

    fn pair_from_document(document: ActorDocument) -> Result<ActorKeyPair, AppError> {
        let uri = document.id;
        let host = crate::policy::host_of(&uri)
            .ok_or_else(|| AppError::Validation(format!("actor URI has no host: {uri}")))?;

        let key = document.public_key.map(|key| PublicKey {
            id: key.id,
            owner: key.owner.unwrap_or_else(|| uri.clone()),
            key_pem: key.public_key_pem,
        });

        Ok(ActorKeyPair {
            actor: Actor {
                uri,
                host,
                fetched_at: Utc::now(),
            },
            key,
        })
    }
}

#[async_trait]
impl LocalActorStore for MemoryActorStore {
    async fn find_by_key_id(&self, key_id: &str) -> Result<Option<ActorKeyPair>, AppError> {
        let actors = self.actors.read().await;
        // Linear scan; acceptable for the in-memory reference store.
        Ok(actors
            .values()
            .find(|pair| pair.key.as_ref().is_some_and(|key| key.id == key_id))
            .cloned())
    }

    async fn find_by_actor_id(&self, actor_id: &str) -> Result<Option<ActorKeyPair>, AppError> {
        let actors = self.actors.read().await;
        Ok(actors.get(actor_id).cloned())
    }

    async fn materialize(&self, actor_id: &str) -> Result<(), AppError> {
        let value = self.remote.resolve(actor_id).await?;
        let document: ActorDocument =
            serde_json::from_value(value).map_err(|e| {
                AppError::Fetch(FetchError::Payload {
                    uri: actor_id.to_string(),
                    message: e.to_string(),
                })
            })?;

        let pair = Self::pair_from_document(document)?;
        tracing::debug!(uri = %pair.actor.uri, "Materialized remote actor");

        let mut actors = self.actors.write().await;
        actors.insert(pair.actor.uri.clone(), pair);
        Ok(())
    }
}
