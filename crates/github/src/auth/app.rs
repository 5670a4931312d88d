use std::time::Duration as StdDuration;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{AuthError, Credential, CredentialExchange};

/// Installation tokens live for an hour upstream; we only trust ten minutes.
const TOKEN_LIFETIME_MINUTES: i64 = 10;
const ASSERTION_LIFETIME_SECS: i64 = 540;
const CLOCK_SKEW_SECS: i64 = 60;

#[derive(Debug, Serialize)]
struct Claims {
    iat: i64,
    exp: i64,
    iss: String,
}

#[derive(Debug, Deserialize)]
struct InstallationTokenResponse {
    token: String,
    expires_at: Option<DateTime<Utc>>,
}

/// Exchanges a GitHub App assertion for an installation access token.
pub struct GitHubAppExchange {
    http: reqwest::Client,
    api_base: String,
    app_id: String,
    installation_id: u64,
    signing_key: EncodingKey,
}

impl GitHubAppExchange {
    pub fn new(
        api_base: impl Into<String>,
        app_id: impl Into<String>,
        installation_id: u64,
        private_key_pem: &[u8],
    ) -> Result<Self, AuthError> {
        let signing_key = EncodingKey::from_rsa_pem(private_key_pem)
            .map_err(|e| AuthError::Signing(e.to_string()))?;

        let http = reqwest::Client::builder()
            .timeout(StdDuration::from_secs(30))
            .user_agent(concat!("testsmith/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| AuthError::Exchange(e.to_string()))?;

        Ok(Self {
            http,
            api_base: api_base.into().trim_end_matches('/').to_string(),
            app_id: app_id.into(),
            installation_id,
            signing_key,
        })
    }

    fn assertion(&self, now: DateTime<Utc>) -> Result<String, AuthError> {
        let issued_at = now.timestamp();
        let claims = Claims {
            iat: issued_at - CLOCK_SKEW_SECS,
            exp: issued_at + ASSERTION_LIFETIME_SECS,
            iss: self.app_id.clone(),
        };

        jsonwebtoken::encode(&Header::new(Algorithm::RS256), &claims, &self.signing_key)
            .map_err(|e| AuthError::Signing(e.to_string()))
    }
}

#[async_trait]
impl CredentialExchange for GitHubAppExchange {
    async fn exchange(&self) -> Result<Credential, AuthError> {
        let now = Utc::now();
        let assertion = self.assertion(now)?;
        let endpoint = format!(
            "{}/app/installations/{}/access_tokens",
            self.api_base, self.installation_id
        );

        debug!(installation_id = self.installation_id, "Requesting installation token");

        let response = self
            .http
            .post(&endpoint)
            .header("Accept", "application/vnd.github+json")
            .header("X-GitHub-Api-Version", "2022-11-28")
            .bearer_auth(assertion)
            .send()
            .await
            .map_err(|e| AuthError::Exchange(e.to_string()))?;

        let status = response.status();
        if status != StatusCode::CREATED {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "unable to read token response body".to_string());
            return Err(AuthError::UnexpectedStatus {
                status: status.as_u16(),
                body,
            });
        }

        let payload: InstallationTokenResponse = response
            .json()
            .await
            .map_err(|e| AuthError::Exchange(e.to_string()))?;

        let local_expiry = now + Duration::minutes(TOKEN_LIFETIME_MINUTES);
        let expires_at = payload
            .expires_at
            .map_or(local_expiry, |upstream| upstream.min(local_expiry));

        Ok(Credential::new(payload.token, expires_at))
    }
}

#[cfg(test)]
mod tests {
    use jsonwebtoken::{DecodingKey, Validation};
    use serde::Deserialize;
    use wiremock::matchers::{header_exists, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;

    const TEST_KEY: &[u8] = include_bytes!("../../tests/fixtures/test-app-key.pem");

    fn exchange(server: &MockServer) -> GitHubAppExchange {
        GitHubAppExchange::new(server.uri(), "12345", 99, TEST_KEY).unwrap()
    }

    #[test]
    fn test_rejects_invalid_key() {
        let result = GitHubAppExchange::new("http://localhost", "1", 1, b"not a key");
        assert!(matches!(result, Err(AuthError::Signing(_))));
    }

    #[tokio::test]
    async fn test_assertion_claims() {
        #[derive(Deserialize)]
        struct Decoded {
            iat: i64,
            exp: i64,
            iss: String,
        }

        let server = MockServer::start().await;
        let exchange = exchange(&server);
        let now = Utc::now();
        let jwt = exchange.assertion(now).unwrap();

        let mut validation = Validation::new(Algorithm::RS256);
        validation.insecure_disable_signature_validation();
        validation.validate_exp = false;
        let decoded = jsonwebtoken::decode::<Decoded>(&jwt, &DecodingKey::from_secret(&[]), &validation)
            .unwrap()
            .claims;

        assert_eq!(decoded.iss, "12345");
        assert_eq!(decoded.iat, now.timestamp() - 60);
        assert_eq!(decoded.exp, now.timestamp() + 540);
    }

    #[tokio::test]
    async fn test_exchange_success() {
        let server = MockServer::start().await;
        let upstream_expiry = Utc::now() + Duration::hours(1);

        Mock::given(method("POST"))
            .and(path("/app/installations/99/access_tokens"))
            .and(header_exists("authorization"))
            .respond_with(ResponseTemplate::new(201).set_body_json(serde_json::json!({
                "token": "ghs_installation",
                "expires_at": upstream_expiry.to_rfc3339(),
            })))
            .expect(1)
            .mount(&server)
            .await;

        let credential = exchange(&server).exchange().await.unwrap();
        assert_eq!(credential.token, "ghs_installation");
        assert!(credential.expires_at <= Utc::now() + Duration::minutes(10));
        assert!(credential.is_valid_at(Utc::now()));
    }

    #[tokio::test]
    async fn test_exchange_unexpected_status() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/app/installations/99/access_tokens"))
            .respond_with(ResponseTemplate::new(401).set_body_string("bad credentials"))
            .mount(&server)
            .await;

        let err = exchange(&server).exchange().await.unwrap_err();
        assert_eq!(
            err,
            AuthError::UnexpectedStatus {
                status: 401,
                body: "bad credentials".to_string()
            }
        );
    }

    #[tokio::test]
    async fn test_exchange_requires_created_status() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/app/installations/99/access_tokens"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "token": "ghs_installation"
            })))
            .mount(&server)
            .await;

        let err = exchange(&server).exchange().await.unwrap_err();
        assert!(matches!(err, AuthError::UnexpectedStatus { status: 200, .. }));
    }
}
