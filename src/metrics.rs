//! Prometheus metrics registry and instruments.
//!
//! This module is framework-agnostic and can be used from any layer.

use lazy_static::lazy_static;
use prometheus::{IntCounter, IntCounterVec, Opts, Registry};

lazy_static! {
    /// Global Prometheus registry
    pub static ref REGISTRY: Registry = Registry::new();

    // Authentication Metrics
    pub static ref AUTH_ATTEMPTS_TOTAL: IntCounter = IntCounter::new(
        "fedgate_auth_attempts_total",
        "Total number of authentication attempts"
    ).expect("metric can be created");
    pub static ref AUTH_OUTCOMES_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("fedgate_auth_outcomes_total", "Authentication outcomes by result"),
        &["outcome"]
    ).expect("metric can be created");

    // Federation Metrics
    pub static ref REMOTE_FETCHES_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("fedgate_remote_fetches_total", "Total number of remote object fetches"),
        &["outcome"]
    ).expect("metric can be created");

    // Cache Metrics
    pub static ref CACHE_HITS_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("fedgate_cache_hits_total", "Total number of cache hits"),
        &["cache_name"]
    ).expect("metric can be created");
    pub static ref CACHE_MISSES_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("fedgate_cache_misses_total", "Total number of cache misses"),
        &["cache_name"]
    ).expect("metric can be created");
}

/// Initialize metrics registry.
pub fn init_metrics() {
    REGISTRY
        .register(Box::new(AUTH_ATTEMPTS_TOTAL.clone()))
        .expect("AUTH_ATTEMPTS_TOTAL can be registered");
    REGISTRY
        .register(Box::new(AUTH_OUTCOMES_TOTAL.clone()))
        .expect("AUTH_OUTCOMES_TOTAL can be registered");
    REGISTRY
        .register(Box::new(REMOTE_FETCHES_TOTAL.clone()))
        .expect("REMOTE_FETCHES_TOTAL can be registered");
    REGISTRY
        .register(Box::new(CACHE_HITS_TOTAL.clone()))
        .expect("CACHE_HITS_TOTAL can be registered");
    REGISTRY
        .register(Box::new(CACHE_MISSES_TOTAL.clone()))
        .expect("CACHE_MISSES_TOTAL can be registered");

    tracing::info!("Metrics registry initialized");
}
