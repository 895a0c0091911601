#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tempfile::TempDir;

use flux_digest::clients::{Publisher, Summarizer};
use flux_digest::database::repositories::SqlxJobRepository;
use flux_digest::database::{DbPool, init_pool, run_migrations};
use flux_digest::{Error, Result};

pub fn database_url(dir: &TempDir, name: &str) -> String {
    format!(
        "sqlite:{}?mode=rwc",
        dir.path().join(name).to_string_lossy().replace('\\', "/")
    )
}

pub async fn open_pool(url: &str) -> DbPool {
    let pool = init_pool(url).await.unwrap();
    run_migrations(&pool).await.unwrap();
    pool
}

/// Fresh queue database in its own temp directory.
pub async fn temp_repo() -> (TempDir, Arc<SqlxJobRepository>) {
    let dir = TempDir::new().unwrap();
    let pool = open_pool(&database_url(&dir, "queue.db")).await;
    (dir, Arc::new(SqlxJobRepository::new(pool)))
}

/// Replays scripted replies in order, then answers "S".
#[derive(Default)]
pub struct ScriptedSummarizer {
    replies: Mutex<VecDeque<Result<String>>>,
    pub prompts: Mutex<Vec<String>>,
}

impl ScriptedSummarizer {
    pub fn failing_times(n: usize) -> Self {
        let replies = (1..=n)
            .map(|i| Err(Error::upstream(format!("ollama request failed: 500 attempt {i}"))))
            .collect::<VecDeque<_>>();
        Self {
            replies: Mutex::new(replies),
            prompts: Mutex::default(),
        }
    }
}

#[async_trait]
impl Summarizer for ScriptedSummarizer {
    async fn summarize(&self, prompt: &str) -> Result<String> {
        self.prompts.lock().unwrap().push(prompt.to_string());
        let next = self.replies.lock().unwrap().pop_front();
        next.unwrap_or_else(|| Ok("S".to_string()))
    }
}

#[derive(Default)]
pub struct RecordingPublisher {
    pub calls: Mutex<Vec<(String, String)>>,
}

#[async_trait]
impl Publisher for RecordingPublisher {
    async fn save_entry_content(&self, entry_id: &str, content: &str) -> Result<()> {
        self.calls
            .lock()
            .unwrap()
            .push((entry_id.to_string(), content.to_string()));
        Ok(())
    }
}
