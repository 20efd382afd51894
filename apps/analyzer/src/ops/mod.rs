//! Remote-operation catalog over the capability gateway.
//!
//! Every operation either reads (query — cached, de-duplicated, tagged)
//! or writes (mutation — uncached, invalidates tags). All of them check
//! the gateway first: when the host capabilities are not installed the
//! operation fails immediately with the fixed "capability not available"
//! condition and performs no delegated call. Failures thrown by a
//! delegated call are caught and surfaced with the underlying message,
//! or a per-operation fallback when the message is empty.

pub mod cache;

use std::sync::{Arc, RwLock};
use std::time::Duration;

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;
use tracing::{info, warn};

use crate::capability::gateway::CapabilityGateway;
use crate::capability::{
    AiResponse, CapabilitySet, ChatMessage, ChatOptions, ContentPart, FileDescriptor, FileLike,
    KvEntry, UserIdentity,
};
use self::cache::{QueryCache, QueryState};

/// Model requested for all feedback calls. Hardcoded to prevent drift.
pub const MODEL: &str = "claude-sonnet-4-5";

/// How long `init` waits for the host capabilities to appear.
pub const INIT_TIMEOUT: Duration = Duration::from_secs(10);
/// Poll interval while waiting.
pub const INIT_POLL_INTERVAL: Duration = Duration::from_millis(100);

const TAG_FS: &str = "fs";
const TAG_KV: &str = "kv";

#[derive(Debug, Error)]
pub enum OpError {
    /// The gateway returned its unavailable sentinel; no delegated call
    /// was attempted.
    #[error("capability not available")]
    CapabilityUnavailable,

    /// A delegated call failed; carries the underlying message.
    #[error("{0}")]
    Delegated(String),

    /// `init` gave up waiting for the host capabilities.
    #[error("timed out waiting for host capabilities")]
    InitTimeout,
}

/// Locally cached authentication status, refreshed on sign-in and
/// cleared on sign-out.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AuthSnapshot {
    pub user: Option<UserIdentity>,
    pub is_authenticated: bool,
}

/// Content-type hint for `fs_read`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FileKind {
    Pdf,
    Image,
    Other,
}

impl FileKind {
    fn mime(self) -> &'static str {
        match self {
            FileKind::Pdf => "application/pdf",
            FileKind::Image => "image/png",
            FileKind::Other => "application/octet-stream",
        }
    }
}

/// Raw keys or resolved pairs from `kv_list`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum KvList {
    Keys(Vec<String>),
    Entries(Vec<KvEntry>),
}

/// What `wipe` removed.
#[derive(Debug, Clone, Default)]
pub struct WipeSummary {
    pub files_deleted: usize,
    pub kv_flushed: bool,
}

pub struct RemoteOps {
    gateway: CapabilityGateway,
    cache: QueryCache,
    auth: RwLock<AuthSnapshot>,
}

impl RemoteOps {
    pub fn new(gateway: CapabilityGateway) -> Self {
        Self {
            gateway,
            cache: QueryCache::new(),
            auth: RwLock::new(AuthSnapshot::default()),
        }
    }

    fn caps(&self) -> Result<Arc<CapabilitySet>, OpError> {
        self.gateway.get().ok_or(OpError::CapabilityUnavailable)
    }

    /// Message of the underlying failure, or a fixed per-operation fallback.
    fn delegated(op: &str, err: anyhow::Error) -> OpError {
        let message = err.to_string();
        if message.trim().is_empty() {
            OpError::Delegated(format!("{op} failed"))
        } else {
            OpError::Delegated(message)
        }
    }

    /// The locally cached authentication status.
    pub fn auth_snapshot(&self) -> AuthSnapshot {
        self.auth.read().map(|a| a.clone()).unwrap_or_default()
    }

    fn store_auth(&self, snapshot: AuthSnapshot) {
        if let Ok(mut auth) = self.auth.write() {
            *auth = snapshot;
        }
    }

    /// Observable state of a cached query, for UI collaborators.
    pub fn query_state<A: Serialize>(&self, op: &'static str, args: &A) -> QueryState {
        self.cache.state(op, args)
    }

    // ────────────────────────────────────────────────────────────────
    // auth
    // ────────────────────────────────────────────────────────────────

    /// Waits for the host capabilities to appear, polling every 100ms
    /// for up to 10s. Timing out is a distinct condition from
    /// "capability not available".
    pub async fn init(&self) -> Result<(), OpError> {
        let wait = async {
            let mut ticker = tokio::time::interval(INIT_POLL_INTERVAL);
            loop {
                ticker.tick().await;
                if self.gateway.is_available() {
                    break;
                }
            }
        };
        tokio::time::timeout(INIT_TIMEOUT, wait)
            .await
            .map_err(|_| OpError::InitTimeout)?;
        if let Err(e) = self.refresh_user().await {
            warn!("initial auth refresh failed: {e}");
        }
        Ok(())
    }

    pub async fn sign_in(&self) -> Result<(), OpError> {
        let caps = self.caps()?;
        caps.auth
            .sign_in()
            .await
            .map_err(|e| Self::delegated("sign-in", e))?;
        // Successful sign-in re-checks authentication status.
        self.refresh_user().await
    }

    pub async fn sign_out(&self) -> Result<(), OpError> {
        let caps = self.caps()?;
        caps.auth
            .sign_out()
            .await
            .map_err(|e| Self::delegated("sign-out", e))?;
        self.store_auth(AuthSnapshot::default());
        Ok(())
    }

    /// Re-reads signed-in status and identity into the local snapshot.
    pub async fn refresh_user(&self) -> Result<(), OpError> {
        let caps = self.caps()?;
        let signed_in = caps
            .auth
            .is_signed_in()
            .await
            .map_err(|e| Self::delegated("auth status check", e))?;
        let snapshot = if signed_in {
            let user = caps
                .auth
                .get_user()
                .await
                .map_err(|e| Self::delegated("get-user", e))?;
            AuthSnapshot { user: Some(user), is_authenticated: true }
        } else {
            AuthSnapshot::default()
        };
        self.store_auth(snapshot);
        Ok(())
    }

    // ────────────────────────────────────────────────────────────────
    // fs
    // ────────────────────────────────────────────────────────────────

    pub async fn fs_write(&self, path: &str, data: Bytes) -> Result<FileDescriptor, OpError> {
        let caps = self.caps()?;
        let descriptor = caps
            .fs
            .write(path, data)
            .await
            .map_err(|e| Self::delegated("write", e))?;
        self.cache.invalidate_tag(TAG_FS);
        Ok(descriptor)
    }

    /// Reads a stored file and converts the bytes into a dereferenceable
    /// data URL, typed `application/pdf` when the hint says PDF.
    pub async fn fs_read(&self, path: &str, kind: FileKind) -> Result<String, OpError> {
        let caps = self.caps()?;
        self.cache
            .fetch("fs:read", &(path, kind), &[TAG_FS], move || async move {
                let bytes = caps
                    .fs
                    .read(path)
                    .await
                    .map_err(|e| Self::delegated("read", e))?;
                Ok(data_url(kind.mime(), &bytes))
            })
            .await
    }

    pub async fn fs_readdir(&self, path: &str) -> Result<Vec<FileDescriptor>, OpError> {
        let caps = self.caps()?;
        self.cache
            .fetch("fs:readdir", &path, &[TAG_FS], move || async move {
                caps.fs
                    .readdir(path)
                    .await
                    .map_err(|e| Self::delegated("readdir", e))
            })
            .await
    }

    pub async fn fs_upload(
        &self,
        files: Vec<Arc<dyn FileLike>>,
    ) -> Result<Option<FileDescriptor>, OpError> {
        let caps = self.caps()?;
        let descriptor = caps
            .fs
            .upload(files)
            .await
            .map_err(|e| Self::delegated("upload", e))?;
        self.cache.invalidate_tag(TAG_FS);
        Ok(descriptor)
    }

    pub async fn fs_delete(&self, path: &str) -> Result<(), OpError> {
        let caps = self.caps()?;
        caps.fs
            .delete(path)
            .await
            .map_err(|e| Self::delegated("delete", e))?;
        self.cache.invalidate_tag(TAG_FS);
        Ok(())
    }

    // ────────────────────────────────────────────────────────────────
    // ai
    // ────────────────────────────────────────────────────────────────

    pub async fn ai_chat(
        &self,
        messages: Vec<ChatMessage>,
        options: Option<ChatOptions>,
    ) -> Result<Option<AiResponse>, OpError> {
        let caps = self.caps()?;
        let key = (messages.clone(), options.clone());
        self.cache
            .fetch("ai:chat", &key, &[], move || async move {
                caps.ai
                    .chat(messages, options)
                    .await
                    .map_err(|e| Self::delegated("chat", e))
            })
            .await
    }

    /// Requests structured feedback for a stored resume: one user
    /// message carrying a file reference plus the instruction text,
    /// pinned to [`MODEL`].
    pub async fn ai_feedback(
        &self,
        path: &str,
        message: &str,
    ) -> Result<Option<AiResponse>, OpError> {
        let caps = self.caps()?;
        let request = vec![ChatMessage::user(vec![
            ContentPart::File { path: path.to_string() },
            ContentPart::Text { text: message.to_string() },
        ])];
        caps.ai
            .chat(request, Some(ChatOptions { model: MODEL.to_string() }))
            .await
            .map_err(|e| Self::delegated("feedback", e))
    }

    /// Extracts text from an image; cached under the image's digest.
    pub async fn ai_img2txt(&self, image: Bytes) -> Result<String, OpError> {
        let caps = self.caps()?;
        let digest = hex::encode(Sha256::digest(&image));
        self.cache
            .fetch("ai:img2txt", &digest, &[], move || async move {
                caps.ai
                    .img2txt(image)
                    .await
                    .map_err(|e| Self::delegated("img2txt", e))
            })
            .await
    }

    // ────────────────────────────────────────────────────────────────
    // kv
    // ────────────────────────────────────────────────────────────────

    pub async fn kv_get(&self, key: &str) -> Result<Option<String>, OpError> {
        let caps = self.caps()?;
        self.cache
            .fetch("kv:get", &key, &[TAG_KV], move || async move {
                caps.kv
                    .get(key)
                    .await
                    .map_err(|e| Self::delegated("kv get", e))
            })
            .await
    }

    /// Lists keys matching `pattern`; resolved to key-value pairs when
    /// `return_values` is set.
    pub async fn kv_list(&self, pattern: &str, return_values: bool) -> Result<KvList, OpError> {
        let caps = self.caps()?;
        self.cache
            .fetch(
                "kv:list",
                &(pattern, return_values),
                &[TAG_KV],
                move || async move {
                    let listed = if return_values {
                        caps.kv.list_entries(pattern).await.map(KvList::Entries)
                    } else {
                        caps.kv.list(pattern).await.map(KvList::Keys)
                    };
                    listed.map_err(|e| Self::delegated("kv list", e))
                },
            )
            .await
    }

    pub async fn kv_set(&self, key: &str, value: &str) -> Result<bool, OpError> {
        let caps = self.caps()?;
        let stored = caps
            .kv
            .set(key, value)
            .await
            .map_err(|e| Self::delegated("kv set", e))?;
        self.cache.invalidate_tag(TAG_KV);
        Ok(stored)
    }

    pub async fn kv_delete(&self, key: &str) -> Result<bool, OpError> {
        let caps = self.caps()?;
        let removed = caps
            .kv
            .delete(key)
            .await
            .map_err(|e| Self::delegated("kv delete", e))?;
        self.cache.invalidate_tag(TAG_KV);
        Ok(removed)
    }

    pub async fn kv_flush(&self) -> Result<bool, OpError> {
        let caps = self.caps()?;
        let flushed = caps
            .kv
            .flush()
            .await
            .map_err(|e| Self::delegated("kv flush", e))?;
        self.cache.invalidate_tag(TAG_KV);
        Ok(flushed)
    }

    // ────────────────────────────────────────────────────────────────
    // maintenance
    // ────────────────────────────────────────────────────────────────

    /// Deletes every stored file under `root` and flushes the kv store.
    pub async fn wipe(&self, root: &str) -> Result<WipeSummary, OpError> {
        let files = self.fs_readdir(root).await?;
        let mut summary = WipeSummary::default();
        for file in &files {
            self.fs_delete(&file.path).await?;
            summary.files_deleted += 1;
        }
        summary.kv_flushed = self.kv_flush().await?;
        info!("wiped {} files and flushed the kv store", summary.files_deleted);
        Ok(summary)
    }
}

fn data_url(mime: &str, bytes: &[u8]) -> String {
    use base64::engine::general_purpose::STANDARD;
    use base64::Engine as _;
    format!("data:{mime};base64,{}", STANDARD.encode(bytes))
}
