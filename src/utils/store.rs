use thiserror::Error;

/// Errors raised by a key-value backend.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("redis error: {0}")]
    Redis(#[from] redis::RedisError),
}

/// Minimal key-value capability the clip store is built on.
///
/// Single-key operations are assumed atomic; there are no cross-key
/// transactions. Keys put with a TTL disappear on their own once it elapses.
#[rocket::async_trait]
pub trait KvStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError>;

    async fn put(&self, key: &str, value: &str, ttl_secs: Option<u64>) -> Result<(), StoreError>;

    /// Deleting a missing key is not an error.
    async fn delete(&self, key: &str) -> Result<(), StoreError>;

    /// All live keys, in no particular order.
    async fn list(&self) -> Result<Vec<String>, StoreError>;
}
