//! Client configuration for the AstroLake SDK

use std::path::PathBuf;
use std::time::Duration;
use typed_builder::TypedBuilder;

// AstroLake IAM defaults (production deployment)
const DEFAULT_CLIENT_ID: &str = "astrolake-sdk";
const DEFAULT_DEVICE_AUTHORIZATION_URL: &str = "https://iam.astrolake.org/oauth2/devicecode";
const DEFAULT_AUTHORIZATION_URL: &str = "https://iam.astrolake.org/oauth2/authorize";
const DEFAULT_TOKEN_URL: &str = "https://iam.astrolake.org/oauth2/token";
const DEFAULT_REDIRECT_URI: &str = "https://iam.astrolake.org/oauth2/code/callback";
const DEFAULT_SCOPES: &str = "openid profile offline_access";

// Downstream service defaults
const DEFAULT_METADATA_URL: &str = "https://metadata.astrolake.org/v1";
const DEFAULT_DATA_MANAGEMENT_URL: &str = "https://data-management.astrolake.org/v1";
const DEFAULT_SODA_URL: &str = "https://soda.astrolake.org/sync";

/// Environment variable consulted for an initial access token
pub const ACCESS_TOKEN_ENV: &str = "ASTROLAKE_ACCESS_TOKEN";

/// Environment variable consulted for an initial refresh token
pub const REFRESH_TOKEN_ENV: &str = "ASTROLAKE_REFRESH_TOKEN";

/// Service audience identifiers understood by the token exchange
pub mod audience {
    /// Datalake / data-management API
    pub const DATA_MANAGEMENT: &str = "data-management-api";
    /// Metadata and query API
    pub const METADATA: &str = "metadata-api";
    /// SODA cutout service
    pub const SODA: &str = "soda-api";
}

/// Which interactive flow [`login()`](crate::AstroLakeClient::login) drives.
///
/// The IAM supports both; deployments pick one via configuration.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LoginMethod {
    /// RFC 8628 device flow: verification URI + user code, polled until
    /// the user completes authorization on another device
    #[default]
    Device,
    /// Authorization-code flow with PKCE: sign-in URL, then out-of-band
    /// entry of the resulting `code#state` value
    AuthorizationCode,
}

/// Configuration for [`AstroLakeClient`](crate::AstroLakeClient)
#[derive(Debug, Clone, TypedBuilder)]
#[builder(
    builder_method(doc = "Create a new builder for ClientConfig"),
    builder_type(doc = "Builder for ClientConfig", vis = "pub"),
    build_method(doc = "Build the ClientConfig")
)]
pub struct ClientConfig {
    /// OAuth client ID registered with the IAM
    #[builder(default = DEFAULT_CLIENT_ID.to_string(), setter(into))]
    pub client_id: String,

    /// Device-authorization endpoint URL
    #[builder(default = DEFAULT_DEVICE_AUTHORIZATION_URL.to_string(), setter(into))]
    pub device_authorization_url: String,

    /// Authorization endpoint URL (authorization-code flow)
    #[builder(default = DEFAULT_AUTHORIZATION_URL.to_string(), setter(into))]
    pub authorization_url: String,

    /// Token endpoint URL (all grant types)
    #[builder(default = DEFAULT_TOKEN_URL.to_string(), setter(into))]
    pub token_url: String,

    /// RFC 7662 introspection endpoint, used only for opaque tokens
    #[builder(default, setter(strip_option, into))]
    pub introspection_url: Option<String>,

    /// Redirect URI for the authorization-code callback
    #[builder(default = DEFAULT_REDIRECT_URI.to_string(), setter(into))]
    pub redirect_uri: String,

    /// Space-separated scopes to request at login
    #[builder(default = DEFAULT_SCOPES.to_string(), setter(into))]
    pub scopes: String,

    /// Metadata/query API base URL
    #[builder(default = DEFAULT_METADATA_URL.to_string(), setter(into))]
    pub metadata_url: String,

    /// Data-management API base URL
    #[builder(default = DEFAULT_DATA_MANAGEMENT_URL.to_string(), setter(into))]
    pub data_management_url: String,

    /// SODA cutout service URL
    #[builder(default = DEFAULT_SODA_URL.to_string(), setter(into))]
    pub soda_url: String,

    /// Interactive login flow to use
    #[builder(default)]
    pub login_method: LoginMethod,

    /// Where to persist the access token; `None` disables persistence.
    /// Tokens are written as plaintext — see the crate-level security note.
    #[builder(default = Some(default_token_path("astrolake_access_token")))]
    pub access_token_path: Option<PathBuf>,

    /// Where to persist the refresh token; `None` disables persistence
    #[builder(default = Some(default_token_path("astrolake_refresh_token")))]
    pub refresh_token_path: Option<PathBuf>,

    /// Timeout applied to every non-login HTTP request
    #[builder(default = Duration::from_secs(30))]
    pub request_timeout: Duration,

    /// Maximum token-endpoint polls before the device flow gives up
    #[builder(default = 60)]
    pub max_poll_attempts: u32,

    /// Whether the authorization-code flow opens the sign-in URL in a
    /// browser automatically
    #[builder(default = true)]
    pub auto_open_browser: bool,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self::builder().build()
    }
}

fn default_token_path(file_name: &str) -> PathBuf {
    std::env::temp_dir().join(file_name)
}
