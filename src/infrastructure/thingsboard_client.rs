// ThingsBoard client - Login and the authenticated fetch path with bounded re-authentication
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, CONTENT_TYPE};
use reqwest::{Method, StatusCode};
use serde::{Deserialize, Serialize};

use crate::domain::error::TelemetryError;
use crate::infrastructure::config::ThingsBoardSettings;

const AUTH_HEADER: HeaderName = HeaderName::from_static("x-authorization");

/// Short-lived bearer token. Used for one attempt, then dropped.
pub struct AccessToken(String);

impl AccessToken {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

// Keep tokens out of logs
impl std::fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("AccessToken(****)")
    }
}

#[derive(Clone)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

/// How many times a request is attempted when the platform rejects the token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuthRetryPolicy {
    pub max_attempts: u32,
}

impl Default for AuthRetryPolicy {
    fn default() -> Self {
        Self { max_attempts: 3 }
    }
}

/// Method and extra headers for an authenticated request.
#[derive(Debug, Clone, Default)]
pub struct FetchOptions {
    pub method: Method,
    pub headers: HeaderMap,
}

#[derive(Serialize)]
struct LoginRequest<'a> {
    username: &'a str,
    password: &'a str,
}

#[derive(Deserialize)]
struct LoginResponse {
    token: String,
}

#[derive(Clone)]
pub struct ThingsBoardClient {
    http: reqwest::Client,
    base_url: String,
    credentials: Credentials,
    policy: AuthRetryPolicy,
}

impl ThingsBoardClient {
    pub fn new(
        http: reqwest::Client,
        base_url: impl Into<String>,
        credentials: Credentials,
        policy: AuthRetryPolicy,
    ) -> Self {
        Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            credentials,
            policy,
        }
    }

    pub fn from_settings(settings: &ThingsBoardSettings) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(settings.request_timeout())
            .build()?;

        Ok(Self::new(
            http,
            settings.url.clone(),
            Credentials {
                username: settings.username.clone(),
                password: settings.password.clone(),
            },
            AuthRetryPolicy {
                max_attempts: settings.auth_attempts.max(1),
            },
        ))
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Log in and return a fresh token. Never cached, never retried here.
    pub async fn authenticate(&self) -> Result<AccessToken, TelemetryError> {
        let url = format!("{}/api/auth/login", self.base_url);
        let body = LoginRequest {
            username: &self.credentials.username,
            password: &self.credentials.password,
        };

        let response = self
            .http
            .post(&url)
            .header(CONTENT_TYPE, "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                tracing::error!("ThingsBoard login request failed: {}", e);
                TelemetryError::Auth(e.to_string())
            })?;

        let status = response.status();
        if !status.is_success() {
            tracing::error!("ThingsBoard authentication error: {}", status);
            return Err(TelemetryError::Auth(format!(
                "ThingsBoard authentication error: {}",
                status.as_u16()
            )));
        }

        let login = response.json::<LoginResponse>().await.map_err(|e| {
            tracing::error!("ThingsBoard login response unreadable: {}", e);
            TelemetryError::Auth(format!("invalid login response: {e}"))
        })?;

        tracing::debug!("Obtained ThingsBoard access token");
        Ok(AccessToken(login.token))
    }

    /// Authenticate, then send the request with the bearer token attached.
    ///
    /// A 401 or 403 re-authenticates and retries until the policy's attempt
    /// budget is spent. Login failures propagate immediately. Any other
    /// non-2xx fails with the observed status.
    pub async fn fetch_with_auth(
        &self,
        url: &str,
        options: &FetchOptions,
    ) -> Result<reqwest::Response, TelemetryError> {
        let mut attempt = 1;

        loop {
            let token = self.authenticate().await?;

            let mut headers = options.headers.clone();
            let bearer = HeaderValue::from_str(&format!("Bearer {}", token.as_str()))
                .map_err(|e| TelemetryError::Auth(format!("unusable token: {e}")))?;
            headers.insert(AUTH_HEADER, bearer);

            let response = self
                .http
                .request(options.method.clone(), url)
                .headers(headers)
                .send()
                .await
                .map_err(|e| {
                    tracing::error!("Fetch with auth failed for {}: {}", url, e);
                    TelemetryError::Transport(e.to_string())
                })?;

            let status = response.status();
            if status.is_success() {
                return Ok(response);
            }

            if is_auth_rejection(status) && attempt < self.policy.max_attempts {
                tracing::warn!(
                    "Token rejected with {} (attempt {}/{}), re-authenticating",
                    status,
                    attempt,
                    self.policy.max_attempts
                );
                attempt += 1;
                continue;
            }

            tracing::error!("ThingsBoard API error: {} for {}", status, url);
            return Err(TelemetryError::Upstream {
                status: status.as_u16(),
            });
        }
    }
}

fn is_auth_rejection(status: StatusCode) -> bool {
    status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN
}
