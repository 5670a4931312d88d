//! Request and response bodies of the cache RPC.

use serde::{Deserialize, Serialize};
use testsmith_core::{CacheKey, GenerationContext};
use utoipa::ToSchema;

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct KeyRequest {
    pub key: CacheKey,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct StoreRequest {
    pub key: CacheKey,
    pub value: GenerationContext,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct AckResponse {
    pub ok: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ContextResponse {
    pub value: GenerationContext,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ExhaustedResponse {
    pub exhausted: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
    /// Raw budget value for `corrupt_budget` errors.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
}

pub mod codes {
    pub const NOT_FOUND: &str = "not_found";
    pub const CORRUPT_BUDGET: &str = "corrupt_budget";
    pub const UNAVAILABLE: &str = "unavailable";
}
