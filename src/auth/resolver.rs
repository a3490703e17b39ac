//! Initial credential resolution at client construction

use crate::auth::store::TokenStore;
use crate::config::{ACCESS_TOKEN_ENV, REFRESH_TOKEN_ENV};

/// Zero, one, or two token strings found at construction time.
///
/// Access and refresh tokens resolve independently and may come from
/// different sources.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResolvedCredentials {
    /// Access token, if any source provided one
    pub access_token: Option<String>,
    /// Refresh token, if any source provided one
    pub refresh_token: Option<String>,
}

/// Resolve initial credentials from explicit arguments, the process
/// environment, and persisted files, in that priority order per token kind.
///
/// Performs no network calls and yields absent tokens silently; callers
/// with nothing resolved must invoke the login flow.
#[must_use]
pub fn resolve(
    explicit_access: Option<String>,
    explicit_refresh: Option<String>,
    store: &TokenStore,
) -> ResolvedCredentials {
    resolve_with(explicit_access, explicit_refresh, store, |name| {
        std::env::var(name).ok()
    })
}

/// Resolution with an injected environment lookup, so priority order is
/// testable without touching the process environment.
fn resolve_with(
    explicit_access: Option<String>,
    explicit_refresh: Option<String>,
    store: &TokenStore,
    env: impl Fn(&str) -> Option<String>,
) -> ResolvedCredentials {
    let (file_access, file_refresh) = store.load();

    let access_token = first_non_empty([
        explicit_access,
        env(ACCESS_TOKEN_ENV),
        file_access,
    ]);
    let refresh_token = first_non_empty([
        explicit_refresh,
        env(REFRESH_TOKEN_ENV),
        file_refresh,
    ]);

    if access_token.is_some() || refresh_token.is_some() {
        tracing::debug!(
            access = access_token.is_some(),
            refresh = refresh_token.is_some(),
            "resolved initial credentials"
        );
    }

    ResolvedCredentials {
        access_token,
        refresh_token,
    }
}

fn first_non_empty(sources: [Option<String>; 3]) -> Option<String> {
    sources.into_iter().flatten().find(|s| !s.is_empty())
}
