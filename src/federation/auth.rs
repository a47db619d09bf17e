//! Authentication orchestrator
//!
//! The public entry point for inbound message authentication. Given a
//! parsed HTTP signature and an optional activity payload, decides
//! which remote actor produced the message:
//!
//! ```text
//! START → HOST_CHECK → KEY_RESOLVE → PRIMARY_VERIFY
//!       → (LD_VERIFY | REFRESH_RETRY) → FINAL_HOST_CHECK
//!       → {ACCEPT, REJECT}
//! ```
//!
//! Every rejection is a typed [`Rejection`] value; no expected failure
//! path crosses this boundary as an error of any other kind.

use std::sync::Arc;

use crate::config::AppConfig;
use crate::data::{ActorKeyPair, LocalActorStore, PublicKey};
use crate::error::Rejection;
use crate::federation::activity::{Activity, LdSignatureBlock};
use crate::federation::ld_signature;
use crate::federation::remote::RemoteObjectResolver;
use crate::federation::resolver::ActorResolver;
use crate::federation::signature::{PrimaryVerdict, Signature, verify_http_signature};
use crate::policy::{HostPolicyGate, HostPolicySource, host_of};

/// Successful authentication outcome
///
/// The resolved actor and the key that verified. The key always
/// carries non-empty PEM material.
#[derive(Debug, Clone, PartialEq)]
pub struct AuthResult {
    pub actor: crate::data::Actor,
    pub key: PublicKey,
}

/// Inbound message authenticator
///
/// One instance serves many concurrent authentication attempts; each
/// `authorize` call is an independent, sequential pipeline that shares
/// only the (externally synchronized) actor store and policy source.
pub struct Authenticator {
    resolver: ActorResolver,
    gate: HostPolicyGate,
}

impl Authenticator {
    /// Assemble an authenticator from its collaborators.
    ///
    /// # Arguments
    /// * `store` - Local actor store (lookups + materialization)
    /// * `remote` - Remote object resolver for key/actor fetches
    /// * `policy` - Host policy source (allow/block lists)
    /// * `config` - Instance domain and policy cache tuning
    pub fn new(
        store: Arc<dyn LocalActorStore>,
        remote: Arc<dyn RemoteObjectResolver>,
        policy: Arc<dyn HostPolicySource>,
        config: &AppConfig,
    ) -> Self {
        Self {
            resolver: ActorResolver::new(store, remote),
            gate: HostPolicyGate::new(
                policy,
                &config.instance.domain,
                std::time::Duration::from_secs(config.policy.snapshot_ttl_secs),
            ),
        }
    }

    /// Force the next host policy check to re-read its source.
    ///
    /// Hook for "policy changed" admin signals.
    pub async fn invalidate_policy(&self) {
        self.gate.invalidate().await;
    }

    /// Authenticate an inbound message.
    ///
    /// # Arguments
    /// * `signature` - Parsed HTTP message signature
    /// * `activity` - Activity payload, when the message carried one
    ///
    /// # Returns
    /// The resolved actor and key on acceptance, or a typed
    /// [`Rejection`] naming why the message must not be processed.
    pub async fn authorize(
        &self,
        signature: &Signature,
        activity: Option<&Activity>,
    ) -> Result<AuthResult, Rejection> {
        use crate::metrics::{AUTH_ATTEMPTS_TOTAL, AUTH_OUTCOMES_TOTAL};

        AUTH_ATTEMPTS_TOTAL.inc();

        let result = self.authorize_inner(signature, activity).await;
        match &result {
            Ok(auth) => {
                AUTH_OUTCOMES_TOTAL.with_label_values(&["accepted"]).inc();
                tracing::info!(actor = %auth.actor.uri, "Authenticated inbound message");
            }
            Err(rejection) => {
                AUTH_OUTCOMES_TOTAL
                    .with_label_values(&[rejection.label()])
                    .inc();
                tracing::info!(
                    key_id = %signature.key_id,
                    reason = %rejection,
                    "Rejected inbound message"
                );
            }
        }
        result
    }

    async fn authorize_inner(
        &self,
        signature: &Signature,
        activity: Option<&Activity>,
    ) -> Result<AuthResult, Rejection> {
        // HOST_CHECK: the signature's own host, derived from the keyId
        // URI authority.
        let signature_host = signature.host();
        if self.host_blocked(signature_host.as_deref()).await? {
            return Err(Rejection::BlockedHost {
                host: signature_host.unwrap_or_default(),
            });
        }

        // The legacy acct: addressing scheme is no longer resolvable to
        // a key document, and a keyId that is not an HTTP(S) URL never
        // will be.
        if signature.is_legacy_key_id() || !signature.has_resolvable_key_id() {
            return Err(Rejection::UnsupportedKeyIdScheme {
                key_id: signature.key_id.clone(),
            });
        }

        // KEY_RESOLVE
        let pair = self.resolve_signer(signature, activity).await?;

        // PRIMARY_VERIFY, with LD fallback or a single refresh retry.
        let verified = match verify_http_signature(&pair, signature, activity) {
            PrimaryVerdict::Pass => pair,
            verdict => {
                let block = activity.and_then(Activity::signature_block);
                match (activity, block) {
                    (Some(activity), Some(block)) => {
                        self.verify_ld_signature(activity, block).await?
                    }
                    _ => self.refresh_and_retry(signature, activity, verdict).await?,
                }
            }
        };

        // The activity must originate from the signer's host.
        if let Some(id) = activity.and_then(Activity::id) {
            let id_host = host_of(id);
            if id_host.as_deref() != Some(verified.actor.host.as_str()) {
                return Err(Rejection::ActorActivityMismatch {
                    detail: format!(
                        "activity id host {:?} does not match signer host {}",
                        id_host, verified.actor.host
                    ),
                });
            }
        }

        // FINAL_HOST_CHECK: the resolved actor's host may legitimately
        // differ from the keyId host, so it gets its own policy check.
        if self.host_blocked(Some(&verified.actor.host)).await? {
            return Err(Rejection::BlockedHost {
                host: verified.actor.host.clone(),
            });
        }

        // ACCEPT
        let key = verified
            .usable_key()
            .cloned()
            .ok_or(Rejection::NoPublicKey)?;
        Ok(AuthResult {
            actor: verified.actor,
            key,
        })
    }

    /// KEY_RESOLVE: by keyId, falling back to the activity's actor.
    ///
    /// The actor may be locally known even when the specific key
    /// document is not. A transient resolution error aborts the
    /// attempt; permanent resolver faults are kept and surfaced only
    /// if no path yields a usable key.
    async fn resolve_signer(
        &self,
        signature: &Signature,
        activity: Option<&Activity>,
    ) -> Result<ActorKeyPair, Rejection> {
        let mut permanent: Option<Rejection> = None;

        let mut pair = match self.resolver.resolve_by_key_id(&signature.key_id).await {
            Ok(pair) => pair,
            Err(rejection) if rejection.is_retryable() => return Err(rejection),
            Err(rejection) => {
                permanent = Some(rejection);
                None
            }
        };

        let usable = pair.as_ref().is_some_and(|p| p.usable_key().is_some());
        if !usable {
            if let Some(actor_id) = activity.and_then(Activity::actor_id) {
                match self.resolver.resolve_by_actor_id(actor_id).await {
                    Ok(Some(fallback)) => pair = Some(fallback),
                    Ok(None) => {}
                    Err(rejection) if rejection.is_retryable() => return Err(rejection),
                    Err(rejection) => permanent = Some(rejection),
                }
            }
        }

        match pair.filter(|p| p.usable_key().is_some()) {
            Some(pair) => Ok(pair),
            None => Err(permanent.unwrap_or(Rejection::NoPublicKey)),
        }
    }

    /// LD_VERIFY: verify the embedded payload signature.
    async fn verify_ld_signature(
        &self,
        activity: &Activity,
        block: LdSignatureBlock,
    ) -> Result<ActorKeyPair, Rejection> {
        if block.signature_type != ld_signature::RSA_SIGNATURE_2017 {
            return Err(Rejection::UnsupportedSignatureType {
                signature_type: block.signature_type,
            });
        }

        let Some(creator) = block.creator else {
            return Err(Rejection::NoPublicKey);
        };

        // Opportunistic pre-warm of the creator's actor; never aborts
        // the flow.
        let bare_creator = creator.split('#').next().unwrap_or(creator.as_str());
        if let Err(error) = self.resolver.resolve_by_actor_id(bare_creator).await {
            tracing::debug!(%error, creator = %creator, "LD signature creator pre-warm failed");
        }

        let pair = match self.resolver.resolve_by_key_id(&creator).await {
            Ok(Some(pair)) => pair,
            Ok(None) => return Err(Rejection::NoPublicKey),
            Err(rejection) if rejection.is_retryable() => return Err(rejection),
            Err(_) => return Err(Rejection::NoPublicKey),
        };

        let key_pem = match pair.usable_key() {
            Some(key) => key.key_pem.clone(),
            None => return Err(Rejection::NoPublicKey),
        };

        if !ld_signature::verify_rsa_signature_2017(activity, &key_pem) {
            return Err(Rejection::SignatureMismatch);
        }

        // The signer resolved through `creator` must still be the actor
        // the activity claims.
        if activity.actor_id() != Some(pair.actor.uri.as_str()) {
            return Err(Rejection::ActorActivityMismatch {
                detail: format!(
                    "LD signer {} is not the activity actor {:?}",
                    pair.actor.uri,
                    activity.actor_id()
                ),
            });
        }

        Ok(pair)
    }

    /// REFRESH_RETRY: one forced re-resolution against a possibly
    /// rotated key, then one more primary verification.
    async fn refresh_and_retry(
        &self,
        signature: &Signature,
        activity: Option<&Activity>,
        first: PrimaryVerdict,
    ) -> Result<ActorKeyPair, Rejection> {
        tracing::info!(
            key_id = %signature.key_id,
            "Primary verification failed; refreshing signer key"
        );

        let refreshed = match self.resolver.refresh_by_key_id(&signature.key_id).await {
            Ok(Some(pair)) if pair.usable_key().is_some() => pair,
            Ok(_) => return Err(verdict_rejection(first)),
            Err(rejection) if rejection.is_retryable() => return Err(rejection),
            Err(_) => return Err(verdict_rejection(first)),
        };

        match verify_http_signature(&refreshed, signature, activity) {
            PrimaryVerdict::Pass => Ok(refreshed),
            verdict => Err(verdict_rejection(verdict)),
        }
    }

    async fn host_blocked(&self, host: Option<&str>) -> Result<bool, Rejection> {
        self.gate.is_host_blocked(host).await.map_err(|error| {
            Rejection::ResolutionTransientError {
                reason: format!("host policy unavailable: {error}"),
            }
        })
    }
}

/// Rejection matching a failed primary verdict.
fn verdict_rejection(verdict: PrimaryVerdict) -> Rejection {
    match verdict {
        PrimaryVerdict::ActorMismatch => Rejection::ActorActivityMismatch {
            detail: "HTTP signature signer does not match activity actor".to_string(),
        },
        _ => Rejection::SignatureMismatch,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{AppConfig, FederationConfig, InstanceConfig, LoggingConfig, PolicyConfig};
    use crate::data::MockLocalActorStore;
    use crate::error::AppError;
    use crate::federation::remote::MockRemoteObjectResolver;
    use crate::policy::{HostPolicy, MockHostPolicySource};
    use async_trait::async_trait;

    fn config() -> AppConfig {
        AppConfig {
            instance: InstanceConfig {
                domain: "local.example".to_string(),
            },
            federation: FederationConfig {
                fetch_timeout_secs: 10,
                user_agent: "FedGate/0.1.0".to_string(),
            },
            policy: PolicyConfig {
                snapshot_ttl_secs: 30,
            },
            logging: LoggingConfig {
                level: "info".to_string(),
                format: "pretty".to_string(),
            },
        }
    }

    fn signature(key_id: &str) -> Signature {
        Signature {
            key_id: key_id.to_string(),
            algorithm: "rsa-sha256".to_string(),
            headers: vec!["(request-target)".to_string()],
            signing_string: "(request-target): post /inbox".to_string(),
            signature: "Zm9v".to_string(),
        }
    }

    fn deny_policy(hosts: &'static [&'static str]) -> MockHostPolicySource {
        let mut policy = MockHostPolicySource::new();
        policy
            .expect_snapshot()
            .returning(move || Ok(HostPolicy::deny(hosts.iter().copied())));
        policy
    }

    #[tokio::test]
    async fn blocked_key_id_host_short_circuits_before_resolution() {
        // Neither store nor remote get any expectations: a call panics.
        let store = MockLocalActorStore::new();
        let remote = MockRemoteObjectResolver::new();
        let policy = deny_policy(&["blocked.example"]);

        let authenticator = Authenticator::new(
            Arc::new(store),
            Arc::new(remote),
            Arc::new(policy),
            &config(),
        );

        let rejection = authenticator
            .authorize(
                &signature("https://blocked.example/users/mallory#main-key"),
                None,
            )
            .await
            .unwrap_err();

        assert_eq!(
            rejection,
            Rejection::BlockedHost {
                host: "blocked.example".to_string()
            }
        );
    }

    #[tokio::test]
    async fn legacy_acct_key_id_is_rejected() {
        let store = MockLocalActorStore::new();
        let remote = MockRemoteObjectResolver::new();
        let policy = deny_policy(&[]);

        let authenticator = Authenticator::new(
            Arc::new(store),
            Arc::new(remote),
            Arc::new(policy),
            &config(),
        );

        let rejection = authenticator
            .authorize(&signature("acct:mallory@remote.example"), None)
            .await
            .unwrap_err();

        assert!(matches!(
            rejection,
            Rejection::UnsupportedKeyIdScheme { .. }
        ));
    }

    #[tokio::test]
    async fn unresolvable_key_id_scheme_is_rejected() {
        let store = MockLocalActorStore::new();
        let remote = MockRemoteObjectResolver::new();
        let policy = deny_policy(&[]);

        let authenticator = Authenticator::new(
            Arc::new(store),
            Arc::new(remote),
            Arc::new(policy),
            &config(),
        );

        let rejection = authenticator
            .authorize(&signature("did:example:mallory#key-1"), None)
            .await
            .unwrap_err();

        assert!(matches!(
            rejection,
            Rejection::UnsupportedKeyIdScheme { .. }
        ));
    }

    #[tokio::test]
    async fn unresolvable_signer_yields_no_public_key() {
        let mut store = MockLocalActorStore::new();
        store.expect_find_by_key_id().returning(|_| Ok(None));

        let mut remote = MockRemoteObjectResolver::new();
        remote.expect_resolve().returning(|uri| {
            Err(crate::error::FetchError::Status {
                status: http::StatusCode::NOT_FOUND,
                uri: uri.to_string(),
            })
        });

        let policy = deny_policy(&[]);
        let authenticator = Authenticator::new(
            Arc::new(store),
            Arc::new(remote),
            Arc::new(policy),
            &config(),
        );

        let rejection = authenticator
            .authorize(
                &signature("https://remote.example/users/alice#main-key"),
                None,
            )
            .await
            .unwrap_err();

        assert_eq!(rejection, Rejection::NoPublicKey);
    }

    #[tokio::test]
    async fn transient_resolution_errors_propagate_as_retryable() {
        let mut store = MockLocalActorStore::new();
        store.expect_find_by_key_id().returning(|_| Ok(None));

        let mut remote = MockRemoteObjectResolver::new();
        remote.expect_resolve().returning(|uri| {
            Err(crate::error::FetchError::Transport {
                uri: uri.to_string(),
                message: "timed out".to_string(),
            })
        });

        let policy = deny_policy(&[]);
        let authenticator = Authenticator::new(
            Arc::new(store),
            Arc::new(remote),
            Arc::new(policy),
            &config(),
        );

        let rejection = authenticator
            .authorize(
                &signature("https://remote.example/users/alice#main-key"),
                None,
            )
            .await
            .unwrap_err();

        assert!(rejection.is_retryable());
    }

    #[tokio::test]
    async fn failing_policy_source_is_a_transient_rejection() {
        struct BrokenPolicy;

        #[async_trait]
        impl crate::policy::HostPolicySource for BrokenPolicy {
            async fn snapshot(&self) -> Result<HostPolicy, AppError> {
                Err(AppError::Store("meta table unavailable".to_string()))
            }
        }

        let store = MockLocalActorStore::new();
        let remote = MockRemoteObjectResolver::new();
        let authenticator = Authenticator::new(
            Arc::new(store),
            Arc::new(remote),
            Arc::new(BrokenPolicy),
            &config(),
        );

        let rejection = authenticator
            .authorize(
                &signature("https://remote.example/users/alice#main-key"),
                None,
            )
            .await
            .unwrap_err();

        assert!(rejection.is_retryable());
    }
}
