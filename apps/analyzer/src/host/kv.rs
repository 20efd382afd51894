//! Redis-backed key-value capability.

use anyhow::{Context, Result};
use async_trait::async_trait;
use redis::AsyncCommands;
use tracing::info;

use crate::capability::{KvCapability, KvEntry};

pub struct RedisKv {
    client: redis::Client,
}

impl RedisKv {
    pub fn connect(url: &str) -> Result<Self> {
        let client = redis::Client::open(url).context("invalid redis url")?;
        info!("kv client initialized");
        Ok(Self { client })
    }

    async fn connection(&self) -> Result<redis::aio::MultiplexedConnection> {
        self.client
            .get_multiplexed_async_connection()
            .await
            .context("kv connection failed")
    }
}

#[async_trait]
impl KvCapability for RedisKv {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        let mut con = self.connection().await?;
        Ok(con.get(key).await?)
    }

    async fn set(&self, key: &str, value: &str) -> Result<bool> {
        let mut con = self.connection().await?;
        let _: () = con.set(key, value).await?;
        Ok(true)
    }

    async fn delete(&self, key: &str) -> Result<bool> {
        let mut con = self.connection().await?;
        let removed: i64 = con.del(key).await?;
        Ok(removed > 0)
    }

    async fn list(&self, pattern: &str) -> Result<Vec<String>> {
        let mut con = self.connection().await?;
        Ok(con.keys(pattern).await?)
    }

    async fn list_entries(&self, pattern: &str) -> Result<Vec<KvEntry>> {
        let mut con = self.connection().await?;
        let keys: Vec<String> = con.keys(pattern).await?;
        let mut entries = Vec::with_capacity(keys.len());
        for key in keys {
            // A key can expire between KEYS and GET; skip those.
            let value: Option<String> = con.get(&key).await?;
            if let Some(value) = value {
                entries.push(KvEntry { key, value });
            }
        }
        Ok(entries)
    }

    async fn flush(&self) -> Result<bool> {
        let mut con = self.connection().await?;
        let _: () = redis::cmd("FLUSHDB").query_async(&mut con).await?;
        Ok(true)
    }
}
