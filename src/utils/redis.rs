use log::{error, trace};
use redis::aio::MultiplexedConnection;
use redis::{AsyncCommands, RedisResult};

use super::store::{KvStore, StoreError};

pub struct RedisStore {
    client: redis::Client,
    prefix: String,
}

impl RedisStore {
    /// Validates the URL only; connections are opened per operation.
    pub fn open(url: &str, prefix: impl Into<String>) -> Result<Self, StoreError> {
        Ok(RedisStore {
            client: redis::Client::open(url)?,
            prefix: prefix.into(),
        })
    }

    async fn get_redis_conn(&self) -> RedisResult<MultiplexedConnection> {
        trace!("Establishing Redis connection");
        match self.client.get_multiplexed_async_connection().await {
            Ok(conn) => Ok(conn),
            Err(e) => {
                error!("Error with Redis: {}", e);
                Err(e)
            }
        }
    }

    fn key(&self, key: &str) -> String {
        format!("{}{}", self.prefix, key)
    }
}

#[rocket::async_trait]
impl KvStore for RedisStore {
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let mut conn = self.get_redis_conn().await?;
        let value: Option<String> = conn.get(self.key(key)).await?;
        Ok(value)
    }

    async fn put(&self, key: &str, value: &str, ttl_secs: Option<u64>) -> Result<(), StoreError> {
        let mut conn = self.get_redis_conn().await?;
        match ttl_secs {
            Some(seconds) => conn.set_ex::<_, _, ()>(self.key(key), value, seconds).await?,
            None => conn.set::<_, _, ()>(self.key(key), value).await?,
        }
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), StoreError> {
        let mut conn = self.get_redis_conn().await?;
        conn.del::<_, ()>(self.key(key)).await?;
        Ok(())
    }

    async fn list(&self) -> Result<Vec<String>, StoreError> {
        let mut conn = self.get_redis_conn().await?;
        let keys: Vec<String> = conn.keys(format!("{}*", self.prefix)).await?;
        Ok(keys
            .into_iter()
            .filter_map(|key| key.strip_prefix(&self.prefix).map(str::to_string))
            .collect())
    }
}
