//! Key and actor resolution
//!
//! Turns a key URI or actor URI into a locally known actor+key pair,
//! fetching from the origin server and materializing into the local
//! actor store when the entity is not yet known.
//!
//! Failure classification matters here: a 4xx from the origin means
//! the actor or key is gone (logged, treated as a miss, never
//! retried), while transport failures and 5xx responses surface as
//! transient errors the caller may retry at a higher level.

use std::sync::Arc;

use crate::data::{ActorKeyPair, KeyDocument, LocalActorStore};
use crate::error::{AppError, Rejection};
use crate::federation::remote::RemoteObjectResolver;

/// Resolves actors and keys through the local store with remote fallback
pub struct ActorResolver {
    store: Arc<dyn LocalActorStore>,
    remote: Arc<dyn RemoteObjectResolver>,
}

impl ActorResolver {
    pub fn new(store: Arc<dyn LocalActorStore>, remote: Arc<dyn RemoteObjectResolver>) -> Self {
        Self { store, remote }
    }

    /// Resolve an actor by the URI of its public key.
    ///
    /// Checks the local store first; on a miss, fetches the key
    /// document, determines the owning actor (owner-then-id
    /// precedence), materializes it, and re-queries the store.
    ///
    /// # Returns
    /// `Ok(None)` when the key cannot be resolved for a permanent,
    /// non-faulty reason (unknown key, remote 4xx).
    pub async fn resolve_by_key_id(&self, key_id: &str) -> Result<Option<ActorKeyPair>, Rejection> {
        match self.store.find_by_key_id(key_id).await {
            Ok(Some(pair)) => return Ok(Some(pair)),
            Ok(None) => {}
            Err(error) => return Err(store_rejection(error)),
        }

        self.resolve_key_remote(key_id).await
    }

    /// Re-resolve a key from its origin, bypassing the local lookup.
    ///
    /// Used when a cached key is suspected stale (remote key rotation
    /// without notification). Materialization still goes through the
    /// store, so the refreshed key replaces the stale one.
    pub async fn refresh_by_key_id(&self, key_id: &str) -> Result<Option<ActorKeyPair>, Rejection> {
        tracing::debug!(key_id = %key_id, "Bypassing local key lookup for refresh");
        self.resolve_key_remote(key_id).await
    }

    async fn resolve_key_remote(&self, key_id: &str) -> Result<Option<ActorKeyPair>, Rejection> {
        let value = match self.remote.resolve(key_id).await {
            Ok(value) => value,
            Err(error) if error.is_permanent() => {
                tracing::info!(%error, key_id = %key_id, "Signer key no longer available");
                return Ok(None);
            }
            Err(error) => {
                return Err(Rejection::ResolutionTransientError {
                    reason: error.to_string(),
                });
            }
        };

        // Requesting a key URI returns either the key object itself or
        // the owning actor document.
        let document: KeyDocument = serde_json::from_value(value).unwrap_or_default();
        let Some(owner) = document.owner_id() else {
            return Err(Rejection::ResolutionPermanentError {
                reason: format!("cannot determine key owner for {key_id}"),
            });
        };

        self.materialize(owner).await?;

        match self.store.find_by_key_id(key_id).await {
            Ok(pair) => Ok(pair),
            Err(error) => Err(store_rejection(error)),
        }
    }

    /// Resolve an actor by its canonical URI.
    ///
    /// Local lookup first; on a miss the actor is materialized and the
    /// store re-queried.
    pub async fn resolve_by_actor_id(
        &self,
        actor_id: &str,
    ) -> Result<Option<ActorKeyPair>, Rejection> {
        match self.store.find_by_actor_id(actor_id).await {
            Ok(Some(pair)) => return Ok(Some(pair)),
            Ok(None) => {}
            Err(error) => return Err(store_rejection(error)),
        }

        self.materialize(actor_id).await?;

        match self.store.find_by_actor_id(actor_id).await {
            Ok(pair) => Ok(pair),
            Err(error) => Err(store_rejection(error)),
        }
    }

    /// Materialize with resolver-grade error classification.
    ///
    /// A permanent fetch failure during materialization is a logged
    /// no-op: the subsequent store re-query simply misses.
    async fn materialize(&self, actor_id: &str) -> Result<(), Rejection> {
        match self.store.materialize(actor_id).await {
            Ok(()) => Ok(()),
            Err(AppError::Fetch(error)) if error.is_permanent() => {
                tracing::info!(%error, actor_id = %actor_id, "Actor no longer available");
                Ok(())
            }
            Err(AppError::Fetch(error)) => Err(Rejection::ResolutionTransientError {
                reason: error.to_string(),
            }),
            Err(error) => Err(store_rejection(error)),
        }
    }
}

/// Map a store/internal fault to a rejection.
///
/// Transient fetch errors stay retryable; everything else is a
/// permanent resolution failure.
fn store_rejection(error: AppError) -> Rejection {
    match error {
        AppError::Fetch(fetch) if !fetch.is_permanent() => Rejection::ResolutionTransientError {
            reason: fetch.to_string(),
        },
        other => Rejection::ResolutionPermanentError {
            reason: other.to_string(),
        },
    }
}
