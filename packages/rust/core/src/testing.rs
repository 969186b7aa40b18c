//! Test doubles shared by the stage and pipeline tests.

use std::collections::VecDeque;
use std::path::PathBuf;
use std::sync::Mutex;

use async_trait::async_trait;
use contentcrew_generation::{Generation, GenerationRequest, GenerativeBackend, ResponsePart};
use contentcrew_shared::{ContentCrewError, Result};
use contentcrew_storage::OutputStore;

pub(crate) fn temp_store() -> (PathBuf, OutputStore) {
    let root = std::env::temp_dir().join(format!("cc-core-test-{}", uuid::Uuid::now_v7()));
    (root.clone(), OutputStore::new(root))
}

/// Replies with queued texts in order and records every request.
pub(crate) struct ScriptedBackend {
    replies: Mutex<VecDeque<String>>,
    requests: Mutex<Vec<GenerationRequest>>,
    finish_reason: String,
}

impl ScriptedBackend {
    pub(crate) fn new<const N: usize>(replies: [&str; N]) -> Self {
        Self {
            replies: Mutex::new(replies.iter().map(|r| r.to_string()).collect()),
            requests: Mutex::new(Vec::new()),
            finish_reason: "end_turn".into(),
        }
    }

    pub(crate) fn with_finish_reason(mut self, reason: &str) -> Self {
        self.finish_reason = reason.into();
        self
    }

    pub(crate) fn requests(&self) -> Vec<GenerationRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl GenerativeBackend for ScriptedBackend {
    fn model(&self) -> &str {
        "scripted"
    }

    async fn generate(&self, request: &GenerationRequest) -> Result<Generation> {
        self.requests.lock().unwrap().push(request.clone());
        let text = self
            .replies
            .lock()
            .unwrap()
            .pop_front()
            .ok_or_else(|| ContentCrewError::Generation("no scripted reply left".into()))?;
        Ok(Generation {
            model: "scripted".into(),
            parts: vec![ResponsePart::Text { text }],
            finish_reason: Some(self.finish_reason.clone()),
            tokens_in: 10,
            tokens_out: 20,
            ..Default::default()
        })
    }
}

/// Always fails as a broken connection would.
pub(crate) struct FailingBackend;

#[async_trait]
impl GenerativeBackend for FailingBackend {
    fn model(&self) -> &str {
        "failing"
    }

    async fn generate(&self, _request: &GenerationRequest) -> Result<Generation> {
        Err(ContentCrewError::Network("connection reset by peer".into()))
    }
}
