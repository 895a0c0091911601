//! Summarization pipeline.
//!
//! Turns one claimed job into merged content: prompt, summarize, merge,
//! publish. The first failing step aborts the job and its error is returned
//! unchanged so the worker can record it.

use std::sync::Arc;

use tracing::debug;

use crate::Result;
use crate::clients::{Publisher, Summarizer};
use crate::database::models::JobDbModel;

/// Fixed instruction prepended to every article.
pub const SUMMARY_INSTRUCTION: &str = "请对下面的文章内容进行总结，保持简洁明了，字数控制在150字以内。无论文章原文使用何种语言，请用中文完成总结。";

/// Separator placed between the summary block and the original content.
pub const CONTENT_SEPARATOR: &str = "\n\n<p>------------------------</p>\n\n";

/// Build the summarization prompt for an article body.
pub fn build_prompt(content: &str) -> String {
    format!("{}\n\n{}", SUMMARY_INSTRUCTION, content)
}

/// Combine a summary with the original content.
///
/// The layout is consumed by existing readers and must stay byte-for-byte stable.
pub fn merge_content_and_summary(content: &str, summary: &str) -> String {
    format!("<p>\n{}\n</p>{}{}", summary, CONTENT_SEPARATOR, content)
}

/// Orchestrates summarization and publish-back for a single job.
#[derive(Clone)]
pub struct SummaryPipeline {
    summarizer: Arc<dyn Summarizer>,
    publisher: Arc<dyn Publisher>,
}

impl SummaryPipeline {
    pub fn new(summarizer: Arc<dyn Summarizer>, publisher: Arc<dyn Publisher>) -> Self {
        Self {
            summarizer,
            publisher,
        }
    }

    /// Process a claimed job and return the content that was published.
    pub async fn process(&self, job: &JobDbModel) -> Result<String> {
        let prompt = build_prompt(&job.content);
        let summary = self.summarizer.summarize(&prompt).await?;
        let summary = summary.trim();

        debug!(job_id = job.id, entry_id = %job.entry_id, "Publishing summary");

        let merged = merge_content_and_summary(&job.content, summary);
        self.publisher
            .save_entry_content(&job.entry_id, &merged)
            .await?;

        Ok(merged)
    }
}
