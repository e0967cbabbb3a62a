//! Prometheus metrics registry and instruments.
//!
//! This module is framework-agnostic and can be used from any layer.

use std::sync::Once;

use lazy_static::lazy_static;
use prometheus::{IntCounterVec, Opts, Registry};

lazy_static! {
    /// Global Prometheus registry
    pub static ref REGISTRY: Registry = Registry::new();

    // Session Metrics
    pub static ref SESSION_ISSUED_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("pantry_auth_sessions_issued_total", "Total number of session tokens issued"),
        &["stage"]
    ).expect("metric can be created");
    pub static ref SESSION_REFRESH_FAILURES_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("pantry_auth_session_refresh_failures_total", "Total number of failed session refreshes"),
        &["reason"]
    ).expect("metric can be created");

    // Sign-in Metrics
    pub static ref SIGN_IN_ATTEMPTS_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("pantry_auth_sign_in_attempts_total", "Total number of OAuth sign-in attempts"),
        &["outcome"]
    ).expect("metric can be created");

    // Route Guard Metrics
    pub static ref GUARD_DECISIONS_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("pantry_auth_guard_decisions_total", "Total number of route guard decisions"),
        &["decision"]
    ).expect("metric can be created");

    // Error Metrics
    pub static ref ERRORS_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("pantry_auth_errors_total", "Total number of errors"),
        &["error_type"]
    ).expect("metric can be created");
}

static INIT: Once = Once::new();

/// Initialize metrics registry.
///
/// Safe to call more than once; only the first call registers.
pub fn init_metrics() {
    INIT.call_once(|| {
        REGISTRY
            .register(Box::new(SESSION_ISSUED_TOTAL.clone()))
            .expect("SESSION_ISSUED_TOTAL can be registered");
        REGISTRY
            .register(Box::new(SESSION_REFRESH_FAILURES_TOTAL.clone()))
            .expect("SESSION_REFRESH_FAILURES_TOTAL can be registered");
        REGISTRY
            .register(Box::new(SIGN_IN_ATTEMPTS_TOTAL.clone()))
            .expect("SIGN_IN_ATTEMPTS_TOTAL can be registered");
        REGISTRY
            .register(Box::new(GUARD_DECISIONS_TOTAL.clone()))
            .expect("GUARD_DECISIONS_TOTAL can be registered");
        REGISTRY
            .register(Box::new(ERRORS_TOTAL.clone()))
            .expect("ERRORS_TOTAL can be registered");

        tracing::info!("Metrics registry initialized");
    });
}
