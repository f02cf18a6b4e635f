//! Payguard - payment request integrity service
//!
//! This library provides the core functionality for the Payguard checkout
//! service: origin/CSRF gating, per-client rate limiting, idempotent
//! transaction initiation against Stripe, and webhook reconciliation with
//! replay suppression.

pub mod config;
pub mod db;
pub mod error;
pub mod extractors;
pub mod handlers;
pub mod id;
pub mod middleware;
pub mod models;
pub mod payments;
pub mod rate_limit;
pub mod reconcile;
pub mod security;
