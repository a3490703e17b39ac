//! Authentication and token lifecycle for the AstroLake IAM.
//!
//! # Overview
//!
//! The pieces compose bottom-up:
//!
//! 1. [`resolver`] finds initial credentials (constructor argument →
//!    environment variable → persisted file, per token kind).
//! 2. The login flow drives an interactive OAuth2 exchange (device or
//!    authorization-code, selected by configuration) when nothing resolves.
//! 3. [`token`] inspects validity via embedded JWT claims; the owning
//!    client refreshes an expired pair transparently, once per call.
//! 4. [`cache`] holds per-service token pairs obtained by RFC 8693 token
//!    exchange, scoped to the lifetime of the home pair.
//! 5. [`store`] persists the home pair as two flat plaintext files after
//!    every successful login or refresh.
//!
//! # Security
//!
//! Persisted tokens are plaintext files with no permission hardening; this
//! is long-standing observable behavior that existing integrations rely
//! on, not an oversight. Point the paths at protected storage (or disable
//! persistence with `None`) where that matters.

pub mod cache;
pub(crate) mod iam;
pub(crate) mod login;
pub mod resolver;
pub mod store;
pub mod token;

pub use cache::ServiceTokenCache;
pub use resolver::ResolvedCredentials;
pub use store::TokenStore;
pub use token::TokenPair;
