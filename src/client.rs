//! `AstroLakeClient` - authenticated access to the AstroLake data network.
//!
//! The client owns the home token pair and the per-service token cache for
//! one logical identity. Every privileged operation goes through the same
//! sequence:
//!
//! 1. [`ensure_valid`](AstroLakeClient::ensure_valid) - check the home
//!    access token, refreshing it at most once if it has expired.
//! 2. [`token_for`](AstroLakeClient::token_for) - exchange the home token
//!    for a service-scoped one (cached per audience for the lifetime of
//!    the home token).
//! 3. The operation itself attaches the service token as a bearer
//!    credential and performs its request.
//!
//! # Example
//!
//! ```no_run
//! use astrolake_sdk::{AstroLakeClient, ClientConfig, CutoutCircle};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let client = AstroLakeClient::new(ClientConfig::default())?;
//!
//! // Interactive sign-in (skip if tokens were resolved from the
//! // environment or persisted files)
//! client.login().await?;
//!
//! // Dispatch on the dataset's data product type
//! let handler = client.resolve("testing", "obs1.fits").await?;
//! if let Some(cube) = handler.as_cube() {
//!     cube.subcube(
//!         CutoutCircle::new(351.986728, 8.778684, 0.1),
//!         "subcube.fits".as_ref(),
//!     )
//!     .await?;
//! }
//! # Ok(())
//! # }
//! ```
//!
//! # Concurrency
//!
//! Token state lives behind a single async mutex, so refresh and cache
//! invalidation are atomic with respect to concurrent callers on the same
//! instance. The client performs no background work; every operation is a
//! single awaited request sequence.

use futures::StreamExt;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;

use crate::auth::cache::ServiceTokenCache;
use crate::auth::iam::IamClient;
use crate::auth::login;
use crate::auth::resolver;
use crate::auth::store::TokenStore;
use crate::auth::token::TokenPair;
use crate::config::{ClientConfig, audience};
use crate::error::{AstroLakeError, Result};
use crate::products::{self, DatasetDescriptor, FormatHandler};

/// Mutable token state, exclusively owned by one client instance
#[derive(Debug)]
struct SessionState {
    tokens: Option<TokenPair>,
    service_cache: ServiceTokenCache,
}

/// Client for the AstroLake data network
#[derive(Debug)]
pub struct AstroLakeClient {
    config: ClientConfig,
    http: reqwest::Client,
    iam: IamClient,
    store: TokenStore,
    state: Mutex<SessionState>,
}

/// Replica ordering applied by the data-management API when locating data
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ReplicaSort {
    /// Closest replica to the requesting (or supplied) IP address
    #[default]
    NearestByIp,
    /// Any replica
    Random,
}

impl ReplicaSort {
    fn as_str(self) -> &'static str {
        match self {
            Self::NearestByIp => "nearest_by_ip",
            Self::Random => "random",
        }
    }
}

/// One storage site holding replicas of a dataset
#[derive(Debug, Clone, Deserialize)]
pub struct ReplicaSite {
    /// Site identifier
    pub identifier: String,
    /// Replica access URLs at this site
    pub replicas: Vec<String>,
    /// Storage area the download token must be scoped to
    pub associated_storage_area_id: String,
}

/// Short-lived token granting read access to one storage area
#[derive(Debug, Deserialize)]
struct StorageToken {
    access_token: String,
}

/// Circular sky region (ICRS, degrees) for cutout-style operations.
///
/// Circle filtering is the only region shape the cutout service accepts.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CutoutCircle {
    /// Right ascension of the centre
    pub ra_deg: f64,
    /// Declination of the centre
    pub dec_deg: f64,
    /// Radius
    pub radius_deg: f64,
}

impl CutoutCircle {
    /// Create a circle from centre coordinates and radius, all in degrees
    #[must_use]
    pub fn new(ra_deg: f64, dec_deg: f64, radius_deg: f64) -> Self {
        Self {
            ra_deg,
            dec_deg,
            radius_deg,
        }
    }

    fn as_param(self) -> String {
        format!("{} {} {}", self.ra_deg, self.dec_deg, self.radius_deg)
    }
}

impl AstroLakeClient {
    /// Create a client, resolving initial credentials from the environment
    /// and any persisted token files.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be constructed.
    pub fn new(config: ClientConfig) -> Result<Self> {
        Self::with_tokens(config, None, None)
    }

    /// Create a client with explicitly supplied tokens.
    ///
    /// Explicit tokens take priority over the environment, which takes
    /// priority over persisted files; access and refresh tokens resolve
    /// independently. If nothing resolves the client starts without
    /// credentials and [`login`](Self::login) must be called.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be constructed.
    pub fn with_tokens(
        config: ClientConfig,
        access_token: Option<String>,
        refresh_token: Option<String>,
    ) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()?;
        let store = TokenStore::new(
            config.access_token_path.clone(),
            config.refresh_token_path.clone(),
        );
        let resolved = resolver::resolve(access_token, refresh_token, &store);
        let tokens = TokenPair::from_resolved(resolved.access_token, resolved.refresh_token);
        let iam = IamClient::new(config.clone(), http.clone());

        Ok(Self {
            config,
            http,
            iam,
            store,
            state: Mutex::new(SessionState {
                tokens,
                service_cache: ServiceTokenCache::new(),
            }),
        })
    }

    /// The configuration this client was built with
    #[must_use]
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Whether the client currently holds a locally valid access token.
    ///
    /// Does not consult the IAM; an opaque token with no expiry signal
    /// counts as valid here.
    pub async fn is_authenticated(&self) -> bool {
        let state = self.state.lock().await;
        state.tokens.as_ref().is_some_and(|pair| !pair.is_expired())
    }

    /// The current home token pair, if any
    pub async fn current_tokens(&self) -> Option<TokenPair> {
        self.state.lock().await.tokens.clone()
    }

    /// Log in interactively using the configured flow.
    ///
    /// On success the new pair is persisted and the service-token cache is
    /// reset.
    ///
    /// # Errors
    ///
    /// Surfaces [`AstroLakeError::TokenExchangeFailed`] when the IAM
    /// rejects the flow - including the case of initiating a login while a
    /// still-valid access token exists, which the IAM refuses; wait for
    /// the current token to expire before retrying. Other failure modes
    /// are [`AstroLakeError::LoginTimedOut`],
    /// [`AstroLakeError::LoginDenied`] and
    /// [`AstroLakeError::LoginCancelled`].
    pub async fn login(&self) -> Result<TokenPair> {
        let pair = login::run(&self.config, &self.iam).await?;
        self.install(pair.clone()).await?;
        tracing::info!("logged in");
        Ok(pair)
    }

    /// Drop the in-memory tokens, clear the service cache and delete any
    /// persisted token files.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if a persisted file cannot be removed.
    pub async fn logout(&self) -> Result<()> {
        let mut state = self.state.lock().await;
        state.tokens = None;
        state.service_cache.clear();
        self.store.delete()?;
        tracing::info!("logged out");
        Ok(())
    }

    /// Ensure the home access token is valid, refreshing it at most once.
    ///
    /// A valid token is returned unchanged without any network traffic, so
    /// repeated calls are idempotent. An expired token with a refresh token
    /// present is exchanged for a new pair, which is persisted and
    /// invalidates the service-token cache.
    ///
    /// # Errors
    ///
    /// [`AstroLakeError::Unauthenticated`] when no tokens are held or the
    /// pair is expired with no refresh token;
    /// [`AstroLakeError::TokenExchangeFailed`] when the IAM rejects the
    /// refresh. A failed refresh is never papered over as "still valid".
    pub async fn ensure_valid(&self) -> Result<TokenPair> {
        let mut state = self.state.lock().await;
        let Some(pair) = state.tokens.clone() else {
            return Err(AstroLakeError::login_required());
        };

        if !self.is_pair_expired(&pair).await? {
            tracing::debug!("access token is valid, not attempting a refresh");
            return Ok(pair);
        }

        let Some(refresh_token) = pair.refresh_token.clone() else {
            return Err(AstroLakeError::unauthenticated(
                "access token expired and no refresh token is available; call login()",
            ));
        };

        tracing::info!("access token expired, attempting refresh");
        let new_pair = self.iam.refresh(&refresh_token).await?;
        self.store.persist(&new_pair)?;
        state.tokens = Some(new_pair.clone());
        state.service_cache.clear();
        tracing::info!("access token refreshed");
        Ok(new_pair)
    }

    /// Expiry check: local signals first, introspection only for opaque
    /// tokens when an endpoint is configured.
    async fn is_pair_expired(&self, pair: &TokenPair) -> Result<bool> {
        if pair.is_expired() {
            return Ok(true);
        }
        if !pair.has_expiry_signal() {
            if let Some(active) = self.iam.introspect(&pair.access_token).await? {
                return Ok(!active);
            }
        }
        Ok(false)
    }

    /// Obtain a token scoped to the given service audience.
    ///
    /// Ensures the home token is valid first, then answers from the
    /// service-token cache when possible; otherwise performs an RFC 8693
    /// token exchange and caches the result for the lifetime of the home
    /// token.
    ///
    /// # Errors
    ///
    /// [`AstroLakeError::Unauthorized`] when the IAM refuses the exchange
    /// for this audience (authenticated, but lacking entitlement);
    /// [`AstroLakeError::Unauthenticated`] /
    /// [`AstroLakeError::TokenExchangeFailed`] as for
    /// [`ensure_valid`](Self::ensure_valid).
    pub async fn token_for(&self, audience: &str) -> Result<TokenPair> {
        let home = self.ensure_valid().await?;

        let mut state = self.state.lock().await;
        if let Some(pair) = state.service_cache.get(audience) {
            tracing::debug!(audience, "using cached service token");
            return Ok(pair.clone());
        }

        let pair = self
            .iam
            .exchange_for_service(&home.access_token, audience)
            .await?;
        tracing::info!(audience, "exchanged home token for service token");
        state.service_cache.insert(audience, pair.clone());
        Ok(pair)
    }

    /// Install a freshly obtained home pair: persist it and reset the
    /// service-token cache.
    async fn install(&self, pair: TokenPair) -> Result<()> {
        self.store.persist(&pair)?;
        let mut state = self.state.lock().await;
        state.tokens = Some(pair);
        state.service_cache.clear();
        Ok(())
    }

    /// Fetch the metadata document for a dataset.
    ///
    /// # Errors
    ///
    /// Fails when the caller is not authenticated or the metadata service
    /// rejects the request.
    pub async fn get_metadata(&self, namespace: &str, name: &str) -> Result<serde_json::Value> {
        let token = self.token_for(audience::METADATA).await?;
        let url = format!("{}/metadata/{namespace}/{name}", self.config.metadata_url);
        let response = self
            .http
            .get(&url)
            .header(reqwest::header::AUTHORIZATION, token.authorization_header())
            .send()
            .await?
            .error_for_status()?;
        Ok(response.json().await?)
    }

    /// Run an ADQL query against the query service and return the raw
    /// response document.
    ///
    /// The query string is passed through untouched; this client does no
    /// query construction.
    ///
    /// # Errors
    ///
    /// Fails when the caller is not authenticated or the query service
    /// rejects the query.
    pub async fn query_adql(&self, query: &str) -> Result<serde_json::Value> {
        let token = self.token_for(audience::METADATA).await?;
        let url = format!("{}/query", self.config.metadata_url);
        let response = self
            .http
            .get(&url)
            .query(&[("lang", "ADQL"), ("query", query)])
            .header(reqwest::header::AUTHORIZATION, token.authorization_header())
            .send()
            .await?
            .error_for_status()?;
        Ok(response.json().await?)
    }

    /// List the storage sites holding replicas of a dataset, best first.
    ///
    /// # Errors
    ///
    /// Fails when the caller is not authenticated or the data-management
    /// service rejects the request.
    pub async fn locate_data(
        &self,
        namespace: &str,
        name: &str,
        sort: ReplicaSort,
        ip_address: Option<&str>,
    ) -> Result<Vec<ReplicaSite>> {
        let token = self.token_for(audience::DATA_MANAGEMENT).await?;
        let url = format!(
            "{}/data/locate/{namespace}/{name}",
            self.config.data_management_url
        );
        let response = self
            .http
            .get(&url)
            .query(&[
                ("sort", sort.as_str()),
                ("ip_address", ip_address.unwrap_or_default()),
            ])
            .header(reqwest::header::AUTHORIZATION, token.authorization_header())
            .send()
            .await?
            .error_for_status()?;
        Ok(response.json().await?)
    }

    /// Locate and download a dataset.
    ///
    /// Picks the first replica of the best-ranked site, obtains a storage
    /// read token for its storage area and streams the payload to
    /// `output` (defaulting to `name` in the working directory). Returns
    /// the path written.
    ///
    /// # Errors
    ///
    /// [`AstroLakeError::UnsupportedAccessProtocol`] when the replica URL
    /// is neither `https` nor `davs`; otherwise authentication, transport
    /// and I/O errors.
    pub async fn download_data(
        &self,
        namespace: &str,
        name: &str,
        output: Option<&Path>,
    ) -> Result<PathBuf> {
        let sites = self
            .locate_data(namespace, name, ReplicaSort::default(), None)
            .await?;
        let site = sites.first().ok_or_else(|| {
            AstroLakeError::invalid_response(format!("no replicas found for {namespace}:{name}"))
        })?;
        let access_url = site.replicas.first().ok_or_else(|| {
            AstroLakeError::invalid_response(format!(
                "site {} listed no replica URLs",
                site.identifier
            ))
        })?;

        if !(access_url.starts_with("https") || access_url.starts_with("davs")) {
            let scheme = access_url.split(':').next().unwrap_or_default();
            return Err(AstroLakeError::UnsupportedAccessProtocol(
                scheme.to_string(),
            ));
        }

        // The storage read token is scoped to the site's storage area and
        // is distinct from the data-management service token.
        let token = self.token_for(audience::DATA_MANAGEMENT).await?;
        let url = format!(
            "{}/data/download/{}/{namespace}/{name}",
            self.config.data_management_url, site.associated_storage_area_id
        );
        let storage: StorageToken = self
            .http
            .get(&url)
            .header(reqwest::header::AUTHORIZATION, token.authorization_header())
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        tracing::info!(site = %site.identifier, url = %access_url, "downloading data");
        let response = self
            .http
            .get(access_url)
            .header(
                reqwest::header::AUTHORIZATION,
                format!("Bearer {}", storage.access_token),
            )
            .send()
            .await?
            .error_for_status()?;

        let output = output.map_or_else(|| PathBuf::from(name), Path::to_path_buf);
        stream_to_file(response, &output).await?;
        Ok(output)
    }

    /// Request a circular cutout of a dataset from the SODA service and
    /// stream it to `output`. Returns the path written.
    ///
    /// # Errors
    ///
    /// Fails when the caller is not authenticated, lacks entitlement for
    /// the cutout service, or the output file cannot be written.
    pub async fn soda_cutout(
        &self,
        namespace: &str,
        name: &str,
        circle: CutoutCircle,
        output: &Path,
    ) -> Result<PathBuf> {
        let token = self.token_for(audience::SODA).await?;
        let id = format!("ivo://astrolake.org/datasets?{namespace}/{name}");

        tracing::info!(%id, circle = %circle.as_param(), "requesting cutout");
        let response = self
            .http
            .get(&self.config.soda_url)
            .query(&[
                ("ID", id.as_str()),
                ("CIRCLE", circle.as_param().as_str()),
                ("RESPONSE_FORMAT", "application/fits"),
            ])
            .header(reqwest::header::AUTHORIZATION, token.authorization_header())
            .send()
            .await?
            .error_for_status()?;

        if let Some(parent) = output.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }
        stream_to_file(response, output).await?;
        tracing::info!(output = %output.display(), "cutout saved");
        Ok(output.to_path_buf())
    }

    /// Resolve a dataset to a typed handler based on its declared data
    /// product type.
    ///
    /// # Errors
    ///
    /// [`AstroLakeError::UnsupportedDataProductType`] when the metadata
    /// lacks a `dataproduct_type` or carries an unknown value; otherwise
    /// authentication and transport errors from the metadata lookup.
    pub async fn resolve(&self, namespace: &str, name: &str) -> Result<FormatHandler<'_>> {
        let metadata = self.get_metadata(namespace, name).await?;
        let dataproduct_type = products::dataproduct_type_of(&metadata)?;
        tracing::info!(%namespace, %name, %dataproduct_type, "resolved dataset type");

        Ok(FormatHandler::attach(
            self,
            DatasetDescriptor {
                namespace: namespace.to_string(),
                name: name.to_string(),
                dataproduct_type,
            },
        ))
    }
}

async fn stream_to_file(response: reqwest::Response, path: &Path) -> Result<()> {
    let mut file = tokio::fs::File::create(path).await?;
    let mut stream = response.bytes_stream();
    while let Some(chunk) = stream.next().await {
        file.write_all(&chunk?).await?;
    }
    file.flush().await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::token::tests::fake_jwt;
    use crate::config::ClientConfig;

    fn offline_config() -> ClientConfig {
        ClientConfig::builder()
            .access_token_path(None)
            .refresh_token_path(None)
            .build()
    }

    fn valid_jwt() -> String {
        let exp = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap()
            .as_secs()
            + 3600;
        fake_jwt(&serde_json::json!({"exp": exp}))
    }

    #[tokio::test]
    async fn test_ensure_valid_without_tokens_is_unauthenticated() {
        let client = AstroLakeClient::with_tokens(offline_config(), None, None).unwrap();
        let err = client.ensure_valid().await.unwrap_err();
        assert!(err.is_unauthenticated());
    }

    #[tokio::test]
    async fn test_ensure_valid_expired_without_refresh_is_unauthenticated() {
        let expired = fake_jwt(&serde_json::json!({"exp": 1000}));
        let client =
            AstroLakeClient::with_tokens(offline_config(), Some(expired), None).unwrap();
        let err = client.ensure_valid().await.unwrap_err();
        assert!(err.is_unauthenticated());
    }

    #[tokio::test]
    async fn test_ensure_valid_returns_valid_pair_unchanged() {
        let token = valid_jwt();
        let client =
            AstroLakeClient::with_tokens(offline_config(), Some(token.clone()), None).unwrap();

        let first = client.ensure_valid().await.unwrap();
        let second = client.ensure_valid().await.unwrap();
        assert_eq!(first.access_token, token);
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn test_explicit_tokens_populate_state() {
        let client = AstroLakeClient::with_tokens(
            offline_config(),
            Some(valid_jwt()),
            Some("refresh-token".to_string()),
        )
        .unwrap();

        assert!(client.is_authenticated().await);
        let pair = client.current_tokens().await.unwrap();
        assert_eq!(pair.refresh_token.as_deref(), Some("refresh-token"));
    }

    #[tokio::test]
    async fn test_logout_drops_tokens() {
        let client =
            AstroLakeClient::with_tokens(offline_config(), Some(valid_jwt()), None).unwrap();
        assert!(client.is_authenticated().await);

        client.logout().await.unwrap();

        assert!(!client.is_authenticated().await);
        assert!(client.current_tokens().await.is_none());
    }

    #[test]
    fn test_cutout_circle_param_format() {
        let circle = CutoutCircle::new(351.986728, 8.778684, 0.1);
        assert_eq!(circle.as_param(), "351.986728 8.778684 0.1");
    }

    #[test]
    fn test_replica_sort_wire_values() {
        assert_eq!(ReplicaSort::NearestByIp.as_str(), "nearest_by_ip");
        assert_eq!(ReplicaSort::Random.as_str(), "random");
    }
}
