//! Default host adapters: the capability surface backed by real
//! services — S3/MinIO for file storage, Redis for the kv store, the
//! Anthropic Messages API for AI inference, and a local session
//! identity for auth.

pub mod auth;
pub mod kv;
pub mod model;
pub mod object_store;

use std::sync::Arc;

use anyhow::Result;

use crate::capability::{CapabilitySet, FsCapability};
use crate::config::Config;

/// Builds the full capability set from configuration.
pub async fn connect(config: &Config) -> Result<Arc<CapabilitySet>> {
    let fs: Arc<dyn FsCapability> = Arc::new(object_store::ObjectStoreFs::connect(config).await);
    let kv = Arc::new(kv::RedisKv::connect(&config.redis_url)?);
    let ai = Arc::new(model::ModelClient::new(
        config.anthropic_api_key.clone(),
        fs.clone(),
    ));
    let auth = Arc::new(auth::SessionAuth::new(&config.user_id, &config.username));

    Ok(Arc::new(CapabilitySet { auth, fs, ai, kv }))
}
