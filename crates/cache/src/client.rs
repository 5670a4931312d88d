use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde::Serialize;
use testsmith_core::{CacheKey, GenerationContext};
use tracing::debug;

use crate::error::{CacheError, Result};
use crate::protocol::{
    codes, AckResponse, ContextResponse, ErrorResponse, ExhaustedResponse, KeyRequest,
    StoreRequest,
};
use crate::store::ContextCache;

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// [`ContextCache`] reached over the cache service's HTTP RPC.
#[derive(Clone)]
pub struct CacheClient {
    http: reqwest::Client,
    base_url: String,
}

impl CacheClient {
    pub fn new(base_url: impl Into<String>) -> Result<Self> {
        Self::with_timeout(base_url, DEFAULT_TIMEOUT)
    }

    pub fn with_timeout(base_url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| CacheError::Unavailable(e.to_string()))?;

        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    async fn call<B, R>(&self, operation: &str, key: &CacheKey, body: &B) -> Result<R>
    where
        B: Serialize + ?Sized + Sync,
        R: DeserializeOwned,
    {
        let url = format!("{}/v1/cache/{}", self.base_url, operation);
        debug!(key = %key, "cache {}", operation);

        let response = self
            .http
            .post(&url)
            .json(body)
            .send()
            .await
            .map_err(|e| CacheError::Unavailable(e.to_string()))?;

        let status = response.status();
        if status.is_success() {
            return response.json().await.map_err(|e| CacheError::Remote {
                status: status.as_u16(),
                message: e.to_string(),
            });
        }

        let error: ErrorResponse = response.json().await.unwrap_or_else(|_| ErrorResponse {
            error: String::new(),
            message: status.to_string(),
            value: None,
        });

        Err(match error.error.as_str() {
            codes::NOT_FOUND => CacheError::NotFound(key.to_string()),
            codes::CORRUPT_BUDGET => CacheError::CorruptBudget {
                key: key.to_string(),
                value: error.value.unwrap_or_default(),
            },
            _ if status == StatusCode::SERVICE_UNAVAILABLE => {
                CacheError::Unavailable(error.message)
            }
            _ => CacheError::Remote {
                status: status.as_u16(),
                message: error.message,
            },
        })
    }
}

#[async_trait]
impl ContextCache for CacheClient {
    async fn put(&self, key: &CacheKey, context: &GenerationContext) -> Result<()> {
        let request = StoreRequest {
            key: key.clone(),
            value: context.clone(),
        };
        let _: AckResponse = self.call("set", key, &request).await?;
        Ok(())
    }

    async fn get(&self, key: &CacheKey) -> Result<GenerationContext> {
        let request = KeyRequest { key: key.clone() };
        let response: ContextResponse = self.call("get", key, &request).await?;
        Ok(response.value)
    }

    async fn update(&self, key: &CacheKey, context: &GenerationContext) -> Result<()> {
        let request = StoreRequest {
            key: key.clone(),
            value: context.clone(),
        };
        let _: AckResponse = self.call("update", key, &request).await?;
        Ok(())
    }

    async fn delete(&self, key: &CacheKey) -> Result<()> {
        let request = KeyRequest { key: key.clone() };
        let _: AckResponse = self.call("delete", key, &request).await?;
        Ok(())
    }

    async fn is_exhausted(&self, key: &CacheKey) -> Result<bool> {
        let request = KeyRequest { key: key.clone() };
        let response: ExhaustedResponse = self.call("exhausted", key, &request).await?;
        Ok(response.exhausted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn key() -> CacheKey {
        CacheKey::new("octo", "demo", "main")
    }

    #[tokio::test]
    async fn test_maps_unavailable() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/cache/exhausted"))
            .respond_with(ResponseTemplate::new(503).set_body_json(serde_json::json!({
                "error": "unavailable",
                "message": "pool timed out"
            })))
            .mount(&server)
            .await;

        let client = CacheClient::new(server.uri()).unwrap();
        let err = client.is_exhausted(&key()).await.unwrap_err();

        assert!(err.is_transient());
    }

    #[tokio::test]
    async fn test_maps_corrupt_budget() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/cache/get"))
            .respond_with(ResponseTemplate::new(500).set_body_json(serde_json::json!({
                "error": "corrupt_budget",
                "message": "Retry budget is corrupt",
                "value": "NaN"
            })))
            .mount(&server)
            .await;

        let client = CacheClient::new(server.uri()).unwrap();
        let err = client.get(&key()).await.unwrap_err();

        assert!(matches!(err, CacheError::CorruptBudget { value, .. } if value == "NaN"));
    }

    #[tokio::test]
    async fn test_unreachable_service_is_transient() {
        let client = CacheClient::with_timeout("http://127.0.0.1:9", Duration::from_secs(2)).unwrap();
        let err = client.delete(&key()).await.unwrap_err();

        assert!(err.is_transient());
    }

    #[tokio::test]
    async fn test_unexpected_error_body() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/cache/set"))
            .respond_with(ResponseTemplate::new(502).set_body_string("bad gateway"))
            .mount(&server)
            .await;

        let client = CacheClient::new(server.uri()).unwrap();
        let err = client
            .put(&key(), &GenerationContext::default())
            .await
            .unwrap_err();

        assert!(matches!(err, CacheError::Remote { status: 502, .. }));
    }
}
