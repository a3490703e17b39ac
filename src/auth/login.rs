//! Interactive login flows against the IAM.
//!
//! Two strategies behind [`LoginMethod`](crate::config::LoginMethod):
//!
//! 1. **Device flow**: request a device code, show the verification URI and
//!    user code, then poll the token endpoint at the server-dictated
//!    interval until the user completes authorization on another device.
//! 2. **Authorization-code flow**: build a PKCE-protected sign-in URL, let
//!    the user authenticate in a browser, and exchange the pasted
//!    `code#state` value in a single call.
//!
//! Either flow finishes only with a fully populated token pair; the caller
//! installs it (persistence + service-cache reset).

use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use sha2::{Digest, Sha256};
use std::io::{BufRead, Write};
use std::time::Duration;

use crate::auth::iam::{DevicePoll, IamClient};
use crate::auth::token::TokenPair;
use crate::config::{ClientConfig, LoginMethod};
use crate::error::{AstroLakeError, Result};

/// States a login flow moves through
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LoginState {
    NotStarted,
    AwaitingUserAction,
    Polling,
    Complete,
    Failed,
}

/// Run the configured login flow to completion
pub(crate) async fn run(config: &ClientConfig, iam: &IamClient) -> Result<TokenPair> {
    match config.login_method {
        LoginMethod::Device => DeviceFlow::new(config, iam).run().await,
        LoginMethod::AuthorizationCode => authorization_code_flow(config, iam).await,
    }
}

/// Driver for the RFC 8628 device flow
struct DeviceFlow<'a> {
    config: &'a ClientConfig,
    iam: &'a IamClient,
    state: LoginState,
}

impl<'a> DeviceFlow<'a> {
    fn new(config: &'a ClientConfig, iam: &'a IamClient) -> Self {
        Self {
            config,
            iam,
            state: LoginState::NotStarted,
        }
    }

    fn transition(&mut self, next: LoginState) {
        tracing::debug!(from = ?self.state, to = ?next, "login state transition");
        self.state = next;
    }

    async fn run(mut self) -> Result<TokenPair> {
        let device = match self.iam.device_authorize().await {
            Ok(device) => device,
            Err(e) => {
                self.transition(LoginState::Failed);
                return Err(e);
            }
        };
        self.transition(LoginState::AwaitingUserAction);

        let verification_uri = device
            .verification_uri_complete
            .as_deref()
            .unwrap_or(&device.verification_uri);
        println!();
        println!("To sign in, using a browser on another device, visit:");
        println!("  {verification_uri}");
        println!("and enter code {}", device.user_code);
        println!();

        self.transition(LoginState::Polling);
        let mut interval = Duration::from_secs(device.interval);
        let max_attempts = self.config.max_poll_attempts;

        for attempt in 1..=max_attempts {
            match self.iam.poll_device_token(&device.device_code).await {
                Ok(DevicePoll::Complete(pair)) => {
                    self.transition(LoginState::Complete);
                    println!("Login complete.");
                    return Ok(pair);
                }
                Ok(DevicePoll::Pending) => {
                    print!("Waiting for authorization... ({attempt}/{max_attempts})\r");
                    let _ = std::io::stdout().flush();
                }
                Ok(DevicePoll::SlowDown) => {
                    // RFC 8628: add 5 seconds and keep going
                    interval += Duration::from_secs(5);
                    tracing::debug!(interval_secs = interval.as_secs(), "server requested slow_down");
                }
                Ok(DevicePoll::Expired) => {
                    self.transition(LoginState::Failed);
                    return Err(AstroLakeError::LoginTimedOut { attempts: attempt });
                }
                Ok(DevicePoll::Denied(message)) => {
                    self.transition(LoginState::Failed);
                    return Err(AstroLakeError::login_denied(message));
                }
                Err(e) => {
                    // Terminal IAM rejections are propagated, never retried
                    self.transition(LoginState::Failed);
                    return Err(e);
                }
            }
            tokio::time::sleep(interval).await;
        }

        self.transition(LoginState::Failed);
        Err(AstroLakeError::LoginTimedOut {
            attempts: max_attempts,
        })
    }
}

/// Authorization-code flow with PKCE and out-of-band code entry
async fn authorization_code_flow(config: &ClientConfig, iam: &IamClient) -> Result<TokenPair> {
    let pkce = PkceChallenge::generate();
    let auth_url = build_auth_url(config, &pkce.challenge);

    println!();
    println!("To sign in, please:");
    println!("  1. Open the following URL in your browser");
    println!("  2. Log in with your AstroLake account");
    println!("  3. Copy the authorization code shown after approval");
    println!("  4. Paste the code below");
    println!();
    println!("Sign-in URL:");
    println!("  {auth_url}");
    println!();

    if config.auto_open_browser {
        if let Err(e) = open_browser(&auth_url) {
            tracing::debug!("could not open browser: {e}");
            println!("(Could not open browser automatically - please open the URL manually)");
        } else {
            println!("(Opening browser...)");
        }
    }
    println!();

    let (code, state) = prompt_for_code()?;
    if code.is_empty() || code.eq_ignore_ascii_case("cancel") {
        return Err(AstroLakeError::LoginCancelled);
    }

    let pair = iam
        .exchange_code(&code, state.as_deref(), &pkce.verifier)
        .await?;
    println!("Login complete.");
    Ok(pair)
}

/// PKCE code challenge data
#[derive(Debug, Clone)]
struct PkceChallenge {
    /// Code verifier (random string)
    verifier: String,
    /// Code challenge (SHA-256 hash of verifier, base64url encoded)
    challenge: String,
}

impl PkceChallenge {
    fn generate() -> Self {
        use std::time::{SystemTime, UNIX_EPOCH};

        let timestamp = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_nanos();
        let pid = std::process::id();
        let thread_id = std::thread::current().id();

        let mut hasher = Sha256::new();
        hasher.update(timestamp.to_le_bytes());
        hasher.update(pid.to_le_bytes());
        hasher.update(format!("{thread_id:?}").as_bytes());
        let entropy = hasher.finalize();

        let verifier = URL_SAFE_NO_PAD.encode(entropy);

        let mut hasher = Sha256::new();
        hasher.update(verifier.as_bytes());
        let challenge = URL_SAFE_NO_PAD.encode(hasher.finalize());

        Self {
            verifier,
            challenge,
        }
    }
}

fn build_auth_url(config: &ClientConfig, code_challenge: &str) -> String {
    let state = generate_state();
    let params = [
        ("client_id", config.client_id.as_str()),
        ("response_type", "code"),
        ("redirect_uri", config.redirect_uri.as_str()),
        ("scope", config.scopes.as_str()),
        ("code_challenge", code_challenge),
        ("code_challenge_method", "S256"),
        ("state", &state),
    ];

    let query = params
        .iter()
        .map(|(k, v)| format!("{k}={}", urlencoding(v)))
        .collect::<Vec<_>>()
        .join("&");

    format!("{}?{query}", config.authorization_url)
}

/// Generate a state parameter (base64url encoded hash of process entropy)
fn generate_state() -> String {
    let seed = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_nanos();
    let mut hasher = Sha256::new();
    hasher.update(seed.to_le_bytes());
    hasher.update(std::process::id().to_le_bytes());
    let hash = hasher.finalize();
    URL_SAFE_NO_PAD.encode(&hash[..24])
}

/// Prompt the user for the authorization code.
///
/// The callback page displays `code#state`; both parts are extracted.
fn prompt_for_code() -> Result<(String, Option<String>)> {
    print!("Enter authorization code (or 'cancel' to abort): ");
    std::io::stdout().flush()?;

    let mut input = String::new();
    std::io::stdin().lock().read_line(&mut input)?;
    let input = input.trim();

    let (code, state) = if let Some(hash_pos) = input.find('#') {
        (
            input[..hash_pos].to_string(),
            Some(input[hash_pos + 1..].to_string()),
        )
    } else {
        (input.to_string(), None)
    };

    Ok((code, state))
}

/// Open URL in default browser
fn open_browser(url: &str) -> std::io::Result<()> {
    #[cfg(target_os = "macos")]
    {
        std::process::Command::new("open").arg(url).spawn()?;
    }

    #[cfg(target_os = "linux")]
    {
        std::process::Command::new("xdg-open").arg(url).spawn()?;
    }

    #[cfg(target_os = "windows")]
    {
        std::process::Command::new("cmd")
            .args(["/C", "start", "", url])
            .spawn()?;
    }

    Ok(())
}

/// URL encode a string for OAuth parameters.
/// Preserves unreserved characters per RFC 3986.
fn urlencoding(s: &str) -> String {
    use std::fmt::Write;
    let mut result = String::with_capacity(s.len() * 3);
    for byte in s.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                result.push(byte as char);
            }
            _ => {
                write!(result, "%{byte:02X}").unwrap();
            }
        }
    }
    result
}
