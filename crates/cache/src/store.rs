use async_trait::async_trait;
use testsmith_core::{CacheKey, GenerationContext};

use crate::error::Result;

/// Credits granted to a key by every `put`.
pub const RETRY_BUDGET: i64 = 3;

/// Generation contexts keyed per branch, each paired with a retry budget.
///
/// A budget row exists exactly when its context row exists.
#[async_trait]
pub trait ContextCache: Send + Sync {
    /// Stores `context` and resets the budget to [`RETRY_BUDGET`].
    async fn put(&self, key: &CacheKey, context: &GenerationContext) -> Result<()>;

    /// Reads the context and consumes one credit. The budget never drops
    /// below zero.
    async fn get(&self, key: &CacheKey) -> Result<GenerationContext>;

    /// Replaces the stored context, leaving the budget untouched.
    async fn update(&self, key: &CacheKey, context: &GenerationContext) -> Result<()>;

    /// Removes the context and its budget. Deleting an absent key succeeds.
    async fn delete(&self, key: &CacheKey) -> Result<()>;

    async fn is_exhausted(&self, key: &CacheKey) -> Result<bool>;
}
