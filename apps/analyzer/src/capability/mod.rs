//! The capability surface expected from the host environment.
//!
//! Auth, file storage, AI inference and the key-value store are all
//! delegated outward. Each concern is an object-safe trait; a full set
//! is bundled into a [`CapabilitySet`] and injected through
//! [`gateway::CapabilityGateway`] — the sole seam to the outside. Real
//! adapters live in `host`; tests substitute counting mocks.
//!
//! "Falsy" results from the delegated surface (an upload that yields no
//! descriptor, a chat that yields no usable reply) are modeled as
//! `Ok(None)`, kept distinct from actual failures (`Err`).

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use bytes::Bytes;
use serde::{Deserialize, Serialize};

pub mod gateway;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserIdentity {
    pub id: String,
    pub username: String,
}

/// Handle to a stored file, as reported by the storage capability.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileDescriptor {
    pub path: String,
    pub name: String,
    pub size: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KvEntry {
    pub key: String,
    pub value: String,
}

/// One part of a chat message: a stored-file reference or free text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentPart {
    File { path: String },
    Text { text: String },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: Vec<ContentPart>,
}

impl ChatMessage {
    pub fn user(content: Vec<ContentPart>) -> Self {
        Self {
            role: "user".to_string(),
            content,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatOptions {
    pub model: String,
}

/// Normalized AI reply. `message.content` is either a bare string or a
/// list of parts; [`AiResponse::text`] picks the first part's text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AiResponse {
    pub message: AiMessage,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AiMessage {
    pub content: AiContent,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AiContent {
    Text(String),
    Parts(Vec<AiContentPart>),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AiContentPart {
    pub text: String,
}

impl AiResponse {
    /// The textual payload: the string itself, or the first part's text.
    pub fn text(&self) -> Option<&str> {
        match &self.message.content {
            AiContent::Text(text) => Some(text),
            AiContent::Parts(parts) => parts.first().map(|p| p.text.as_str()),
        }
    }
}

/// A file-like object: a name plus an async read-all-bytes operation.
#[async_trait]
pub trait FileLike: Send + Sync {
    fn name(&self) -> &str;
    async fn read_bytes(&self) -> Result<Bytes>;
}

/// In-memory file; rasterizer output and test fixtures.
#[derive(Debug, Clone)]
pub struct MemoryFile {
    pub name: String,
    pub bytes: Bytes,
}

impl MemoryFile {
    pub fn new(name: impl Into<String>, bytes: impl Into<Bytes>) -> Self {
        Self {
            name: name.into(),
            bytes: bytes.into(),
        }
    }
}

#[async_trait]
impl FileLike for MemoryFile {
    fn name(&self) -> &str {
        &self.name
    }

    async fn read_bytes(&self) -> Result<Bytes> {
        Ok(self.bytes.clone())
    }
}

/// File on local disk; the CLI driver's input.
#[derive(Debug, Clone)]
pub struct DiskFile {
    path: PathBuf,
    name: String,
}

impl DiskFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.to_string_lossy().into_owned());
        Self { path, name }
    }
}

#[async_trait]
impl FileLike for DiskFile {
    fn name(&self) -> &str {
        &self.name
    }

    async fn read_bytes(&self) -> Result<Bytes> {
        Ok(Bytes::from(tokio::fs::read(&self.path).await?))
    }
}

/// Authentication primitives of the host.
#[async_trait]
pub trait AuthCapability: Send + Sync {
    async fn is_signed_in(&self) -> Result<bool>;
    async fn get_user(&self) -> Result<UserIdentity>;
    async fn sign_in(&self) -> Result<()>;
    async fn sign_out(&self) -> Result<()>;
}

/// File storage primitives of the host.
#[async_trait]
pub trait FsCapability: Send + Sync {
    async fn write(&self, path: &str, data: Bytes) -> Result<FileDescriptor>;
    async fn read(&self, path: &str) -> Result<Bytes>;
    /// Uploads a batch; the descriptor of the last stored file, or
    /// `None` when the host produced nothing usable.
    async fn upload(&self, files: Vec<Arc<dyn FileLike>>) -> Result<Option<FileDescriptor>>;
    async fn delete(&self, path: &str) -> Result<()>;
    async fn readdir(&self, path: &str) -> Result<Vec<FileDescriptor>>;
}

/// AI inference primitives of the host.
#[async_trait]
pub trait AiCapability: Send + Sync {
    async fn chat(
        &self,
        messages: Vec<ChatMessage>,
        options: Option<ChatOptions>,
    ) -> Result<Option<AiResponse>>;
    async fn img2txt(&self, image: Bytes) -> Result<String>;
}

/// Key-value primitives of the host.
#[async_trait]
pub trait KvCapability: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>>;
    async fn set(&self, key: &str, value: &str) -> Result<bool>;
    async fn delete(&self, key: &str) -> Result<bool>;
    async fn list(&self, pattern: &str) -> Result<Vec<String>>;
    async fn list_entries(&self, pattern: &str) -> Result<Vec<KvEntry>>;
    async fn flush(&self) -> Result<bool>;
}

/// The full capability surface injected by the host.
pub struct CapabilitySet {
    pub auth: Arc<dyn AuthCapability>,
    pub fs: Arc<dyn FsCapability>,
    pub ai: Arc<dyn AiCapability>,
    pub kv: Arc<dyn KvCapability>,
}
