//! Upstream profile client.
//!
//! [`HttpProfileFetcher`] is the production [`UpstreamFetcher`]: it loads the
//! session cookie jar from disk on every call, authenticates with the
//! session and CSRF cookies and assembles the five profile sections into one
//! payload.
//!
//! [`MeteredFetcher`] wraps any fetcher with a latency histogram and a log
//! line per call.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use profcache_core::{CacheKey, FetchError, Payload};
use profcache_storage::UpstreamFetcher;
use reqwest::{header, Client, StatusCode};
use serde_json::Value;

use crate::config::UpstreamConfig;
use crate::error::{ApiError, ApiResult};
use crate::telemetry::metrics;

/// Session cookie required by the upstream.
pub const SESSION_COOKIE: &str = "li_at";

/// Cookie whose value doubles as the CSRF token.
pub const CSRF_COOKIE: &str = "JSESSIONID";

// ============================================================================
// CREDENTIALS
// ============================================================================

/// Cookie jar loaded from the session cookie document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionCookies {
    cookies: BTreeMap<String, String>,
}

impl SessionCookies {
    /// Parse a JSON object of cookie name to string value.
    pub fn from_json(raw: &str) -> Result<Self, FetchError> {
        let value: Value = serde_json::from_str(raw)
            .map_err(|e| FetchError::CredentialLoad(format!("invalid cookie JSON: {}", e)))?;

        let Value::Object(map) = value else {
            return Err(FetchError::CredentialLoad(
                "cookie document must be a JSON object".to_string(),
            ));
        };

        let mut cookies = BTreeMap::new();
        for (name, value) in map {
            match value {
                Value::String(v) => {
                    cookies.insert(name, v);
                }
                other => {
                    return Err(FetchError::CredentialLoad(format!(
                        "cookie {} must be a string, got {}",
                        name, other
                    )))
                }
            }
        }
        Ok(Self { cookies })
    }

    /// Read and parse the cookie document at `path`.
    pub async fn load(path: &Path) -> Result<Self, FetchError> {
        let raw = tokio::fs::read_to_string(path).await.map_err(|e| {
            FetchError::CredentialLoad(format!("cannot read {}: {}", path.display(), e))
        })?;
        Self::from_json(&raw)
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.cookies.get(name).map(String::as_str)
    }

    /// Check that the session and CSRF cookies are present.
    pub fn authenticate(&self) -> Result<SessionHeaders, FetchError> {
        let missing: Vec<&str> = [SESSION_COOKIE, CSRF_COOKIE]
            .into_iter()
            .filter(|name| self.get(name).map_or(true, |v| v.trim().is_empty()))
            .collect();
        if !missing.is_empty() {
            return Err(FetchError::Authentication(format!(
                "missing session cookies: {}",
                missing.join(", ")
            )));
        }

        let csrf_token = self
            .get(CSRF_COOKIE)
            .unwrap_or_default()
            .trim_matches('"')
            .to_string();
        let cookie_header = self
            .cookies
            .iter()
            .map(|(name, value)| format!("{}={}", name, value))
            .collect::<Vec<_>>()
            .join("; ");

        Ok(SessionHeaders {
            csrf_token,
            cookie_header,
        })
    }
}

/// Headers attached to every upstream request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionHeaders {
    pub csrf_token: String,
    pub cookie_header: String,
}

// ============================================================================
// HTTP FETCHER
// ============================================================================

/// Fetches profile sections from the upstream profile API.
///
/// The fetcher speaks a generic profile-API contract rather than any one
/// vendor's API. Relative to the configured base URL, the service must
/// answer with JSON documents at:
///
/// - `profiles/{public_id}`, carrying a string `profile_id`
/// - `profiles/{public_id}/contact-info`
/// - `profiles/{public_id}/skills`
/// - `profiles/{profile_id}/experiences`
/// - `profiles/{profile_id}/connections`
///
/// Requests carry the session cookies and a `csrf-token` header; 401 and
/// 403 are reported as authentication failures.
#[derive(Debug, Clone)]
pub struct HttpProfileFetcher {
    client: Client,
    base_url: String,
    cookies_path: PathBuf,
}

impl HttpProfileFetcher {
    pub fn new(config: &UpstreamConfig) -> ApiResult<Self> {
        let client = Client::builder()
            .timeout(config.timeout)
            .user_agent(concat!("profcache/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| ApiError::internal_error(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            cookies_path: config.cookies_path.clone(),
        })
    }

    async fn get_json(&self, session: &SessionHeaders, path: &str) -> Result<Value, FetchError> {
        let url = format!("{}/{}", self.base_url, path);
        let response = self
            .client
            .get(&url)
            .header(header::ACCEPT, "application/json")
            .header(header::COOKIE, &session.cookie_header)
            .header("csrf-token", &session.csrf_token)
            .send()
            .await
            .map_err(|e| FetchError::Upstream(format!("GET {} failed: {}", path, e)))?;

        let status = response.status();
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return Err(FetchError::Authentication(format!(
                "upstream rejected session with {}",
                status
            )));
        }
        if !status.is_success() {
            return Err(FetchError::Upstream(format!(
                "GET {} returned {}",
                path, status
            )));
        }

        response
            .json::<Value>()
            .await
            .map_err(|e| FetchError::Upstream(format!("GET {} returned invalid JSON: {}", path, e)))
    }
}

#[async_trait]
impl UpstreamFetcher for HttpProfileFetcher {
    async fn fetch(&self, key: &CacheKey) -> Result<Payload, FetchError> {
        let cookies = SessionCookies::load(&self.cookies_path).await?;
        let session = cookies.authenticate()?;

        let profile_path = format!("profiles/{}", key);
        let contact_info_path = format!("profiles/{}/contact-info", key);
        let skills_path = format!("profiles/{}/skills", key);
        let (profile, contact_info, skills) = tokio::try_join!(
            self.get_json(&session, &profile_path),
            self.get_json(&session, &contact_info_path),
            self.get_json(&session, &skills_path),
        )?;

        let profile_id = profile
            .get("profile_id")
            .and_then(Value::as_str)
            .ok_or_else(|| {
                FetchError::Upstream(format!("profile for {} has no profile_id", key))
            })?
            .to_string();

        let experiences_path = format!("profiles/{}/experiences", profile_id);
        let connections_path = format!("profiles/{}/connections", profile_id);
        let (experiences, connections) = tokio::try_join!(
            self.get_json(&session, &experiences_path),
            self.get_json(&session, &connections_path),
        )?;

        let mut payload = Payload::new();
        payload.insert("profile".to_string(), profile);
        payload.insert("contact_info".to_string(), contact_info);
        payload.insert("experiences".to_string(), experiences);
        payload.insert("skills".to_string(), skills);
        payload.insert("connections".to_string(), connections);
        Ok(payload)
    }
}

// ============================================================================
// METERED DECORATOR
// ============================================================================

/// Records fetch latency and outcome around another fetcher.
pub struct MeteredFetcher {
    inner: Arc<dyn UpstreamFetcher>,
}

impl MeteredFetcher {
    pub fn new(inner: Arc<dyn UpstreamFetcher>) -> Self {
        Self { inner }
    }
}

#[async_trait]
impl UpstreamFetcher for MeteredFetcher {
    async fn fetch(&self, key: &CacheKey) -> Result<Payload, FetchError> {
        let start = Instant::now();
        let result = self.inner.fetch(key).await;
        let elapsed = start.elapsed();

        let outcome = match &result {
            Ok(_) => "success",
            Err(e) => e.kind(),
        };
        if let Some(m) = metrics() {
            m.record_upstream_fetch(outcome, elapsed.as_secs_f64());
        }
        tracing::info!(
            key = %key,
            outcome,
            duration_ms = elapsed.as_millis() as u64,
            "Upstream fetch finished"
        );
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::{Matcher, Server};
    use serde_json::json;
    use std::time::Duration;
    use tempfile::TempDir;

    const COOKIES: &str = r#"{"li_at": "AQEDAR", "JSESSIONID": "\"ajax:123\"", "lang": "v=2&lang=en-us"}"#;

    fn key(raw: &str) -> CacheKey {
        CacheKey::parse(raw).unwrap()
    }

    fn write_cookies(dir: &TempDir, contents: &str) -> PathBuf {
        let path = dir.path().join("cookies.json");
        std::fs::write(&path, contents).unwrap();
        path
    }

    fn fetcher(base_url: &str, cookies_path: PathBuf) -> HttpProfileFetcher {
        HttpProfileFetcher::new(&UpstreamConfig {
            base_url: base_url.to_string(),
            cookies_path,
            timeout: Duration::from_secs(5),
        })
        .unwrap()
    }

    #[test]
    fn test_session_headers() {
        let headers = SessionCookies::from_json(COOKIES).unwrap().authenticate().unwrap();
        assert_eq!(headers.csrf_token, "ajax:123");
        assert_eq!(
            headers.cookie_header,
            "JSESSIONID=\"ajax:123\"; lang=v=2&lang=en-us; li_at=AQEDAR"
        );
    }

    #[test]
    fn test_malformed_cookie_document() {
        assert!(matches!(
            SessionCookies::from_json("{not json"),
            Err(FetchError::CredentialLoad(_))
        ));
        assert!(matches!(
            SessionCookies::from_json("[1, 2]"),
            Err(FetchError::CredentialLoad(_))
        ));
        assert!(matches!(
            SessionCookies::from_json(r#"{"li_at": 42}"#),
            Err(FetchError::CredentialLoad(_))
        ));
    }

    #[test]
    fn test_missing_session_cookie_is_authentication_error() {
        let err = SessionCookies::from_json(r#"{"JSESSIONID": "ajax:1"}"#)
            .unwrap()
            .authenticate()
            .unwrap_err();
        assert!(matches!(err, FetchError::Authentication(ref d) if d.contains("li_at")));
    }

    #[tokio::test]
    async fn test_missing_cookie_file_is_credential_error() {
        let dir = TempDir::new().unwrap();
        let fetcher = fetcher("http://127.0.0.1:9", dir.path().join("absent.json"));
        let err = fetcher.fetch(&key("alice")).await.unwrap_err();
        assert!(matches!(err, FetchError::CredentialLoad(_)));
    }

    #[tokio::test]
    async fn test_fetch_assembles_all_sections() {
        let mut server = Server::new_async().await;
        let dir = TempDir::new().unwrap();
        let cookies = write_cookies(&dir, COOKIES);

        let profile = server
            .mock("GET", "/profiles/alice")
            .match_header("csrf-token", "ajax:123")
            .match_header("cookie", Matcher::Regex("li_at=AQEDAR".to_string()))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(json!({"firstName": "Alice", "profile_id": "ACoAAA"}).to_string())
            .create_async()
            .await;
        let contact = server
            .mock("GET", "/profiles/alice/contact-info")
            .with_status(200)
            .with_body(json!({"email_address": "alice@example.com"}).to_string())
            .create_async()
            .await;
        let skills = server
            .mock("GET", "/profiles/alice/skills")
            .with_status(200)
            .with_body(json!([{"name": "Rust"}]).to_string())
            .create_async()
            .await;
        let experiences = server
            .mock("GET", "/profiles/ACoAAA/experiences")
            .with_status(200)
            .with_body(json!([{"title": "Engineer"}]).to_string())
            .create_async()
            .await;
        let connections = server
            .mock("GET", "/profiles/ACoAAA/connections")
            .with_status(200)
            .with_body(json!([]).to_string())
            .create_async()
            .await;

        let payload = fetcher(&server.url(), cookies)
            .fetch(&key("alice"))
            .await
            .unwrap();

        assert_eq!(payload["profile"]["firstName"], "Alice");
        assert_eq!(payload["contact_info"]["email_address"], "alice@example.com");
        assert_eq!(payload["skills"][0]["name"], "Rust");
        assert_eq!(payload["experiences"][0]["title"], "Engineer");
        assert_eq!(payload["connections"], json!([]));

        for mock in [profile, contact, skills, experiences, connections] {
            mock.assert_async().await;
        }
    }

    #[tokio::test]
    async fn test_unauthorized_is_authentication_error() {
        let mut server = Server::new_async().await;
        let dir = TempDir::new().unwrap();
        let cookies = write_cookies(&dir, COOKIES);

        let _m = server
            .mock("GET", Matcher::Regex("^/profiles/bob".to_string()))
            .with_status(401)
            .expect_at_least(1)
            .create_async()
            .await;

        let err = fetcher(&server.url(), cookies)
            .fetch(&key("bob"))
            .await
            .unwrap_err();
        assert!(matches!(err, FetchError::Authentication(_)));
    }

    #[tokio::test]
    async fn test_server_error_is_upstream_error() {
        let mut server = Server::new_async().await;
        let dir = TempDir::new().unwrap();
        let cookies = write_cookies(&dir, COOKIES);

        let _m = server
            .mock("GET", Matcher::Regex("^/profiles/bob".to_string()))
            .with_status(500)
            .expect_at_least(1)
            .create_async()
            .await;

        let err = fetcher(&server.url(), cookies)
            .fetch(&key("bob"))
            .await
            .unwrap_err();
        assert!(matches!(err, FetchError::Upstream(ref d) if d.contains("500")));
    }

    #[tokio::test]
    async fn test_missing_profile_id_is_upstream_error() {
        let mut server = Server::new_async().await;
        let dir = TempDir::new().unwrap();
        let cookies = write_cookies(&dir, COOKIES);

        let _m = server
            .mock("GET", Matcher::Regex("^/profiles/carol".to_string()))
            .with_status(200)
            .with_body("{}")
            .expect_at_least(1)
            .create_async()
            .await;

        let err = fetcher(&server.url(), cookies)
            .fetch(&key("carol"))
            .await
            .unwrap_err();
        assert!(matches!(err, FetchError::Upstream(ref d) if d.contains("profile_id")));
    }
}
