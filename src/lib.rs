//! # AstroLake SDK for Rust
//!
//! Client SDK for the AstroLake federated astronomical data network:
//! IAM authentication with full token lifecycle, service-scoped token
//! exchange, data queries, downloads and SODA cutouts.
//! Async/await, strong typing, tokio-based.
//!
//! ## Quick Start
//!
//! ```no_run
//! use astrolake_sdk::{AstroLakeClient, ClientConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = AstroLakeClient::new(ClientConfig::default())?;
//!
//!     // Sign in if nothing was resolved from the environment or
//!     // persisted token files
//!     if !client.is_authenticated().await {
//!         client.login().await?;
//!     }
//!
//!     let results = client
//!         .query_adql("SELECT TOP 10 obs_publisher_did FROM ivoa.obscore")
//!         .await?;
//!     println!("{results}");
//!     Ok(())
//! }
//! ```
//!
//! ## Token Lifecycle
//!
//! The client resolves initial credentials at construction time, checking
//! each token kind independently in a fixed priority order:
//!
//! 1. Explicit constructor argument
//!    ([`AstroLakeClient::with_tokens`])
//! 2. Environment variables (`ASTROLAKE_ACCESS_TOKEN`,
//!    `ASTROLAKE_REFRESH_TOKEN`)
//! 3. Persisted token files (by default under the OS temp directory)
//!
//! If nothing resolves, [`AstroLakeClient::login`] drives an interactive
//! OAuth2 flow - a device flow (verification URI + user code, polled until
//! authorized) or an authorization-code flow with PKCE, selected by
//! [`LoginMethod`] in the configuration.
//!
//! Every privileged operation first ensures the home access token is
//! valid, refreshing it transparently at most once per call. Operations
//! that target a downstream service (metadata/query API, data management,
//! SODA) exchange the home token for a service-scoped one via the RFC 8693
//! token-exchange grant; exchanged tokens are cached per audience for the
//! lifetime of the home token.
//!
//! Note that the IAM refuses to start a new login while a still-valid
//! access token exists; [`AstroLakeClient::login`] surfaces that rejection
//! as [`AstroLakeError::TokenExchangeFailed`] and the caller must wait for
//! the current token to expire.
//!
//! ## Dataset Dispatch
//!
//! [`AstroLakeClient::resolve`] looks up a dataset's `dataproduct_type`
//! and returns a typed [`FormatHandler`] whose method set matches the
//! type: `cutout` for images and spectra, `subcube` for cubes, `subvis`
//! for visibilities, plus shared metadata access. See the [`products`]
//! module.
//!
//! ## Logging
//!
//! This crate uses [`tracing`](https://crates.io/crates/tracing) for
//! structured logging. Tracing events are always emitted but are zero-cost
//! when no subscriber is attached. To see logs, attach a subscriber in
//! your application:
//!
//! ```rust,ignore
//! tracing_subscriber::fmt::init();
//! ```
//!
//! ## Security
//!
//! Persisted tokens are written as plaintext files with no permission
//! hardening - long-standing observable behavior that existing
//! integrations depend on. Disable persistence (set the paths to `None`)
//! or point the paths at protected storage where this matters.
//!
//! ## Error Handling
//!
//! All fallible operations return [`Result<T, AstroLakeError>`](Result).
//! The taxonomy separates [`AstroLakeError::Unauthenticated`] (no usable
//! token - log in) from [`AstroLakeError::Unauthorized`] (authenticated
//! but lacking entitlement for a specific service), with flow-specific
//! terminal states for login and a dedicated variant for IAM exchange
//! rejections.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod auth;
pub mod client;
pub mod config;
pub mod error;
pub mod products;

// Re-export commonly used types
pub use auth::{ResolvedCredentials, ServiceTokenCache, TokenPair, TokenStore};
pub use client::{AstroLakeClient, CutoutCircle, ReplicaSite, ReplicaSort};
pub use config::{ACCESS_TOKEN_ENV, REFRESH_TOKEN_ENV, ClientConfig, LoginMethod, audience};
pub use error::{AstroLakeError, Result};
pub use products::{DataProductType, DatasetDescriptor, FormatHandler};

/// Version of the SDK
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
