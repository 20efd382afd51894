//! Counting mock capabilities for ops and pipeline tests.
//!
//! Every mock records how often it was called so tests can assert that
//! an operation either delegated exactly once or never delegated at
//! all. Behavior is scriptable per call: uploads can be denied (the
//! "falsy result" shape) and chat replies can be swapped out.

use std::collections::{BTreeMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, RwLock};

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use bytes::Bytes;

use crate::capability::{
    AiCapability, AiContent, AiMessage, AiResponse, AuthCapability, CapabilitySet, ChatMessage,
    ChatOptions, FileDescriptor, FileLike, FsCapability, KvCapability, KvEntry, UserIdentity,
};

/// A feedback payload every mock chat returns by default.
pub const VALID_FEEDBACK_JSON: &str = r#"{
    "overallScore": 82,
    "ATS": {"score": 85, "tips": [{"type": "good", "tip": "Standard section headings"}]},
    "toneAndStyle": {"score": 78, "tips": [{"type": "improve", "tip": "Passive phrasing", "explanation": "Lead bullets with active verbs."}]},
    "content": {"score": 80, "tips": []},
    "structure": {"score": 84, "tips": []},
    "skills": {"score": 79, "tips": [{"type": "good", "tip": "Skills match the posting"}]}
}"#;

// ────────────────────────────────────────────────────────────────────
// auth
// ────────────────────────────────────────────────────────────────────

#[derive(Default)]
pub struct MockAuth {
    pub signed_in: RwLock<bool>,
    pub sign_in_calls: AtomicUsize,
    pub sign_out_calls: AtomicUsize,
    pub status_calls: AtomicUsize,
}

#[async_trait]
impl AuthCapability for MockAuth {
    async fn is_signed_in(&self) -> Result<bool> {
        self.status_calls.fetch_add(1, Ordering::SeqCst);
        Ok(*self.signed_in.read().unwrap())
    }

    async fn get_user(&self) -> Result<UserIdentity> {
        Ok(UserIdentity { id: "u-1".to_string(), username: "tester".to_string() })
    }

    async fn sign_in(&self) -> Result<()> {
        self.sign_in_calls.fetch_add(1, Ordering::SeqCst);
        *self.signed_in.write().unwrap() = true;
        Ok(())
    }

    async fn sign_out(&self) -> Result<()> {
        self.sign_out_calls.fetch_add(1, Ordering::SeqCst);
        *self.signed_in.write().unwrap() = false;
        Ok(())
    }
}

// ────────────────────────────────────────────────────────────────────
// fs
// ────────────────────────────────────────────────────────────────────

enum UploadScript {
    /// Fall through to the default (successful) behavior.
    Allow,
    /// Delegated call "succeeds" but yields no descriptor.
    Deny,
}

#[derive(Default)]
pub struct MockFs {
    pub files: Mutex<Vec<(String, Bytes)>>,
    pub write_calls: AtomicUsize,
    pub read_calls: AtomicUsize,
    pub upload_calls: AtomicUsize,
    pub delete_calls: AtomicUsize,
    pub readdir_calls: AtomicUsize,
    upload_script: Mutex<VecDeque<UploadScript>>,
}

impl MockFs {
    pub fn insert(&self, path: &str, bytes: &[u8]) {
        self.files
            .lock()
            .unwrap()
            .push((path.to_string(), Bytes::copy_from_slice(bytes)));
    }

    /// The next upload call yields no descriptor.
    pub fn deny_next_upload(&self) {
        self.upload_script.lock().unwrap().push_back(UploadScript::Deny);
    }

    /// The next upload call behaves normally (used to script "succeed
    /// then fail" sequences).
    pub fn allow_next_upload(&self) {
        self.upload_script.lock().unwrap().push_back(UploadScript::Allow);
    }
}

#[async_trait]
impl FsCapability for MockFs {
    async fn write(&self, path: &str, data: Bytes) -> Result<FileDescriptor> {
        self.write_calls.fetch_add(1, Ordering::SeqCst);
        let size = data.len() as u64;
        self.files.lock().unwrap().push((path.to_string(), data));
        Ok(FileDescriptor {
            path: path.to_string(),
            name: path.rsplit('/').next().unwrap_or(path).to_string(),
            size,
        })
    }

    async fn read(&self, path: &str) -> Result<Bytes> {
        self.read_calls.fetch_add(1, Ordering::SeqCst);
        self.files
            .lock()
            .unwrap()
            .iter()
            .find(|(p, _)| p == path)
            .map(|(_, bytes)| bytes.clone())
            .ok_or_else(|| anyhow!("no such file: {path}"))
    }

    async fn upload(&self, files: Vec<Arc<dyn FileLike>>) -> Result<Option<FileDescriptor>> {
        self.upload_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(UploadScript::Deny) = self.upload_script.lock().unwrap().pop_front() {
            return Ok(None);
        }
        let mut last = None;
        for file in files {
            let bytes = file.read_bytes().await?;
            let path = format!("uploads/{}", file.name());
            let size = bytes.len() as u64;
            self.files.lock().unwrap().push((path.clone(), bytes));
            last = Some(FileDescriptor { path, name: file.name().to_string(), size });
        }
        Ok(last)
    }

    async fn delete(&self, path: &str) -> Result<()> {
        self.delete_calls.fetch_add(1, Ordering::SeqCst);
        self.files.lock().unwrap().retain(|(p, _)| p != path);
        Ok(())
    }

    async fn readdir(&self, path: &str) -> Result<Vec<FileDescriptor>> {
        self.readdir_calls.fetch_add(1, Ordering::SeqCst);
        let prefix = format!("{}/", path.trim_end_matches('/'));
        Ok(self
            .files
            .lock()
            .unwrap()
            .iter()
            .filter(|(p, _)| p.starts_with(&prefix))
            .map(|(p, bytes)| FileDescriptor {
                path: p.clone(),
                name: p.rsplit('/').next().unwrap_or(p.as_str()).to_string(),
                size: bytes.len() as u64,
            })
            .collect())
    }
}

// ────────────────────────────────────────────────────────────────────
// ai
// ────────────────────────────────────────────────────────────────────

#[derive(Default)]
pub struct MockAi {
    pub chat_calls: AtomicUsize,
    pub img2txt_calls: AtomicUsize,
    chat_script: Mutex<VecDeque<Option<AiResponse>>>,
    last_request: Mutex<Option<(Vec<ChatMessage>, Option<ChatOptions>)>>,
}

impl MockAi {
    pub fn text_response(text: &str) -> AiResponse {
        AiResponse {
            message: AiMessage { content: AiContent::Text(text.to_string()) },
        }
    }

    /// Scripts the next chat outcome (`None` is the falsy result).
    pub fn script_chat(&self, response: Option<AiResponse>) {
        self.chat_script.lock().unwrap().push_back(response);
    }

    /// Scripts the next chat to answer with plain text.
    pub fn script_chat_text(&self, text: &str) {
        self.script_chat(Some(Self::text_response(text)));
    }

    /// Messages and options of the most recent chat call.
    pub fn last_request(&self) -> Option<(Vec<ChatMessage>, Option<ChatOptions>)> {
        self.last_request.lock().unwrap().clone()
    }
}

#[async_trait]
impl AiCapability for MockAi {
    async fn chat(
        &self,
        messages: Vec<ChatMessage>,
        options: Option<ChatOptions>,
    ) -> Result<Option<AiResponse>> {
        self.chat_calls.fetch_add(1, Ordering::SeqCst);
        *self.last_request.lock().unwrap() = Some((messages, options));
        if let Some(scripted) = self.chat_script.lock().unwrap().pop_front() {
            return Ok(scripted);
        }
        Ok(Some(Self::text_response(VALID_FEEDBACK_JSON)))
    }

    async fn img2txt(&self, _image: Bytes) -> Result<String> {
        self.img2txt_calls.fetch_add(1, Ordering::SeqCst);
        Ok("transcribed text".to_string())
    }
}

// ────────────────────────────────────────────────────────────────────
// kv
// ────────────────────────────────────────────────────────────────────

#[derive(Default)]
pub struct MockKv {
    pub store: Mutex<BTreeMap<String, String>>,
    pub get_calls: AtomicUsize,
    pub set_calls: AtomicUsize,
    pub delete_calls: AtomicUsize,
    pub list_calls: AtomicUsize,
    pub flush_calls: AtomicUsize,
    fail_get: Mutex<Option<String>>,
}

impl MockKv {
    /// The next get call fails with `message`.
    pub fn fail_next_get(&self, message: &str) {
        *self.fail_get.lock().unwrap() = Some(message.to_string());
    }
}

fn pattern_matches(pattern: &str, key: &str) -> bool {
    match pattern.strip_suffix('*') {
        Some(prefix) => key.starts_with(prefix),
        None => key == pattern,
    }
}

#[async_trait]
impl KvCapability for MockKv {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        self.get_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(message) = self.fail_get.lock().unwrap().take() {
            return Err(anyhow!(message));
        }
        Ok(self.store.lock().unwrap().get(key).cloned())
    }

    async fn set(&self, key: &str, value: &str) -> Result<bool> {
        self.set_calls.fetch_add(1, Ordering::SeqCst);
        self.store.lock().unwrap().insert(key.to_string(), value.to_string());
        Ok(true)
    }

    async fn delete(&self, key: &str) -> Result<bool> {
        self.delete_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.store.lock().unwrap().remove(key).is_some())
    }

    async fn list(&self, pattern: &str) -> Result<Vec<String>> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self
            .store
            .lock()
            .unwrap()
            .keys()
            .filter(|key| pattern_matches(pattern, key))
            .cloned()
            .collect())
    }

    async fn list_entries(&self, pattern: &str) -> Result<Vec<KvEntry>> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self
            .store
            .lock()
            .unwrap()
            .iter()
            .filter(|(key, _)| pattern_matches(pattern, key))
            .map(|(key, value)| KvEntry { key: key.clone(), value: value.clone() })
            .collect())
    }

    async fn flush(&self) -> Result<bool> {
        self.flush_calls.fetch_add(1, Ordering::SeqCst);
        self.store.lock().unwrap().clear();
        Ok(true)
    }
}

// ────────────────────────────────────────────────────────────────────
// bundle
// ────────────────────────────────────────────────────────────────────

/// One mock host: individual mocks plus the bundled capability set.
pub struct MockHost {
    pub auth: Arc<MockAuth>,
    pub fs: Arc<MockFs>,
    pub ai: Arc<MockAi>,
    pub kv: Arc<MockKv>,
}

impl MockHost {
    #[allow(clippy::new_without_default)]
    pub fn new() -> Self {
        Self {
            auth: Arc::new(MockAuth::default()),
            fs: Arc::new(MockFs::default()),
            ai: Arc::new(MockAi::default()),
            kv: Arc::new(MockKv::default()),
        }
    }

    pub fn capability_set(&self) -> Arc<CapabilitySet> {
        Arc::new(CapabilitySet {
            auth: self.auth.clone(),
            fs: self.fs.clone(),
            ai: self.ai.clone(),
            kv: self.kv.clone(),
        })
    }
}
