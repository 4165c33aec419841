// ABOUTME: Service-account OAuth for the Google Sheets API
// ABOUTME: Signs an RS256 JWT assertion and caches the exchanged bearer token

use async_trait::async_trait;
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use serde::Serialize;
use std::fmt;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tokio::sync::Mutex;
use tokio::time::Instant;

use super::models::TokenResponse;
use crate::error::SyncError;

pub const DEFAULT_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";
pub const SHEETS_SCOPE: &str = "https://www.googleapis.com/auth/spreadsheets";

const ASSERTION_LIFETIME_SECS: u64 = 3600;
const EXPIRY_MARGIN: Duration = Duration::from_secs(60);

/// Credentials of a Google service account.
#[derive(Clone)]
pub struct ServiceAccountKey {
    pub client_email: String,
    pub private_key: String,
    pub token_uri: String,
}

impl ServiceAccountKey {
    pub fn new(client_email: impl Into<String>, private_key: &str) -> Self {
        Self {
            client_email: client_email.into(),
            private_key: normalize_private_key(private_key),
            token_uri: DEFAULT_TOKEN_URI.to_string(),
        }
    }
}

impl fmt::Debug for ServiceAccountKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceAccountKey")
            .field("client_email", &self.client_email)
            .field("private_key", &"<redacted>")
            .field("token_uri", &self.token_uri)
            .finish()
    }
}

/// PEM keys passed through environment variables usually carry literal `\n`
/// sequences and sometimes surrounding quotes.
pub fn normalize_private_key(raw: &str) -> String {
    raw.trim()
        .trim_matches('"')
        .replace("\\n", "\n")
}

#[derive(Debug, Serialize)]
struct Claims<'a> {
    iss: &'a str,
    scope: &'a str,
    aud: &'a str,
    iat: u64,
    exp: u64,
}

/// Supplies bearer tokens to the sheet client.
#[async_trait]
pub trait TokenSource: Send + Sync {
    async fn access_token(&self) -> Result<String, SyncError>;
}

/// A fixed token, for emulators and short-lived scripts.
pub struct StaticToken(pub String);

#[async_trait]
impl TokenSource for StaticToken {
    async fn access_token(&self) -> Result<String, SyncError> {
        Ok(self.0.clone())
    }
}

struct CachedToken {
    value: String,
    refresh_at: Instant,
}

/// Issues bearer tokens for a service account, refreshing shortly before expiry.
pub struct ServiceAccountAuth {
    http: reqwest::Client,
    key: ServiceAccountKey,
    scope: String,
    cached: Mutex<Option<CachedToken>>,
}

impl ServiceAccountAuth {
    pub fn new(http: reqwest::Client, key: ServiceAccountKey) -> Self {
        Self {
            http,
            key,
            scope: SHEETS_SCOPE.to_string(),
            cached: Mutex::new(None),
        }
    }

    pub fn client_email(&self) -> &str {
        &self.key.client_email
    }

    /// Signed JWT assertion for the token exchange.
    pub fn build_assertion(&self, now_secs: u64) -> Result<String, SyncError> {
        let claims = Claims {
            iss: &self.key.client_email,
            scope: &self.scope,
            aud: &self.key.token_uri,
            iat: now_secs,
            exp: now_secs + ASSERTION_LIFETIME_SECS,
        };

        let encoding_key = EncodingKey::from_rsa_pem(self.key.private_key.as_bytes())
            .map_err(|e| SyncError::remote("authenticate", format!("invalid private key: {}", e)))?;

        jsonwebtoken::encode(&Header::new(Algorithm::RS256), &claims, &encoding_key)
            .map_err(|e| SyncError::remote("authenticate", format!("failed to sign assertion: {}", e)))
    }

    async fn fetch_token(&self) -> Result<String, SyncError> {
        let mut cached = self.cached.lock().await;
        if let Some(token) = cached.as_ref() {
            if Instant::now() < token.refresh_at {
                return Ok(token.value.clone());
            }
        }

        let now_secs = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or_default();
        let assertion = self.build_assertion(now_secs)?;

        let response = self
            .http
            .post(&self.key.token_uri)
            .form(&[
                ("grant_type", "urn:ietf:params:oauth:grant-type:jwt-bearer"),
                ("assertion", assertion.as_str()),
            ])
            .send()
            .await
            .map_err(|e| SyncError::remote("authenticate", format!("token request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(SyncError::remote_status(
                "authenticate",
                status.as_u16(),
                format!(
                    "service account {} was rejected: {}",
                    self.key.client_email, body
                ),
            ));
        }

        let token: TokenResponse = response
            .json()
            .await
            .map_err(|e| SyncError::remote("authenticate", format!("invalid token response: {}", e)))?;

        let lifetime = Duration::from_secs(token.expires_in.unwrap_or(ASSERTION_LIFETIME_SECS));
        let refresh_at = Instant::now() + lifetime.saturating_sub(EXPIRY_MARGIN);
        tracing::debug!(
            "Obtained access token for {} (valid {:?})",
            self.key.client_email,
            lifetime
        );

        *cached = Some(CachedToken {
            value: token.access_token.clone(),
            refresh_at,
        });
        Ok(token.access_token)
    }
}

#[async_trait]
impl TokenSource for ServiceAccountAuth {
    /// A valid access token, exchanging a fresh assertion when needed.
    async fn access_token(&self) -> Result<String, SyncError> {
        self.fetch_token().await
    }
}
