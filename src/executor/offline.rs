//! Offline placeholder executor.
//!
//! Produces canned results and replies without touching any external search
//! or generation service. Useful for local development, demos, and as the
//! reference for how an executor should checkpoint cancellation and report
//! progress.

use super::{JobContext, ResearchExecutor, SessionReply};
use crate::types::{
    AppError, LogEntry, MessageType, OutputFormat, Reference, ResearchRequest, ResearchResult,
    Result, SourceBreakdown, SourceKind,
};
use async_trait::async_trait;
use chrono::Utc;
use std::time::Duration;

/// Research phases the offline executor walks through, with the progress
/// reported after each.
const PHASES: &[(&str, f32)] = &[
    ("collecting sources", 0.25),
    ("reading sources", 0.5),
    ("synthesizing findings", 0.75),
    ("formatting output", 0.95),
];

/// A [`ResearchExecutor`] that fabricates plausible output locally.
pub struct OfflineExecutor {
    step_delay: Duration,
}

impl OfflineExecutor {
    pub fn new() -> Self {
        Self {
            step_delay: Duration::from_millis(150),
        }
    }

    /// Use a custom delay between research phases.
    pub fn with_step_delay(step_delay: Duration) -> Self {
        Self { step_delay }
    }

    fn render_content(request: &ResearchRequest) -> String {
        match request.output_format {
            OutputFormat::Bullets => format!(
                "- Placeholder overview of '{topic}'.\n\
                 - No external sources were consulted; this content is generated offline.\n\
                 - Re-run against a connected executor for real findings.",
                topic = request.topic
            ),
            OutputFormat::FullReport => format!(
                "Auto-generated placeholder report for '{topic}'. No external search or \
                 generation service was consulted; a connected executor would gather arxiv, \
                 pubmed and web sources here and synthesize them into a full report.",
                topic = request.topic
            ),
        }
    }
}

impl Default for OfflineExecutor {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ResearchExecutor for OfflineExecutor {
    async fn run(&self, request: &ResearchRequest, ctx: &JobContext) -> Result<ResearchResult> {
        for (phase, progress) in PHASES {
            if ctx.is_cancelled() {
                tracing::info!(job_id = %ctx.job_id(), phase, "stopping at cancellation checkpoint");
                return Err(AppError::Executor(format!(
                    "cancelled while {phase}"
                )));
            }
            tokio::time::sleep(self.step_delay).await;
            ctx.report_progress(*progress).await;
        }

        let content = Self::render_content(request);
        let references = vec![Reference {
            title: format!("Placeholder source for '{}'", request.topic),
            url: Some("https://example.org/placeholder".to_string()),
            accessed_date: Utc::now(),
            snippet: Some("Generated offline; not a real citation.".to_string()),
            source: Some(SourceKind::Web),
        }];

        Ok(ResearchResult {
            topic: request.topic.clone(),
            word_count: content.split_whitespace().count(),
            source_breakdown: SourceBreakdown::from_references(&references),
            content,
            references,
            output_format: request.output_format,
            generated_at: Utc::now(),
            confidence_score: 0.5,
        })
    }

    async fn respond(
        &self,
        _topic: &str,
        _history: &[LogEntry],
        content: &str,
        message_type: MessageType,
    ) -> Result<SessionReply> {
        let reply = match message_type {
            MessageType::Audio => {
                "Received your audio message. Transcription is not enabled in the offline \
                 executor."
                    .to_string()
            }
            MessageType::Text => {
                let trimmed = content.trim();
                if trimmed.is_empty() {
                    "Please provide a question or message to continue.".to_string()
                } else {
                    format!(
                        "Working on that. The offline executor is a placeholder; a connected \
                         executor would search pubmed/arxiv/web and summarize findings.\n\n\
                         Echo: {trimmed}"
                    )
                }
            }
        };

        Ok(SessionReply {
            content: reply,
            key_findings: Vec::new(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::{CancelFlag, ProgressSink};
    use parking_lot::Mutex;
    use std::sync::Arc;

    struct RecordingSink(Mutex<Vec<f32>>);

    #[async_trait]
    impl ProgressSink for RecordingSink {
        async fn report(&self, _job_id: &str, value: f32) {
            self.0.lock().push(value);
        }
    }

    fn request(topic: &str) -> ResearchRequest {
        ResearchRequest {
            topic: topic.to_string(),
            output_format: OutputFormat::FullReport,
            sources: None,
            deadline: None,
        }
    }

    #[tokio::test]
    async fn test_run_reports_monotonic_progress() {
        let sink = Arc::new(RecordingSink(Mutex::new(Vec::new())));
        let ctx = JobContext::new("job-1".to_string(), CancelFlag::new(), sink.clone());
        let executor = OfflineExecutor::with_step_delay(Duration::from_millis(1));

        let result = executor.run(&request("quantum batteries"), &ctx).await.unwrap();
        assert_eq!(result.topic, "quantum batteries");
        assert!(result.word_count > 0);
        assert_eq!(result.source_breakdown.total_sources, 1);

        let reported = sink.0.lock().clone();
        assert!(reported.windows(2).all(|w| w[0] <= w[1]));
        assert_eq!(reported.len(), PHASES.len());
    }

    #[tokio::test]
    async fn test_run_observes_cancellation_checkpoint() {
        let sink = Arc::new(RecordingSink(Mutex::new(Vec::new())));
        let cancel = CancelFlag::new();
        cancel.set();
        let ctx = JobContext::new("job-1".to_string(), cancel, sink);
        let executor = OfflineExecutor::with_step_delay(Duration::from_millis(1));

        let err = executor.run(&request("t"), &ctx).await.unwrap_err();
        assert!(matches!(err, AppError::Executor(_)));
    }

    #[tokio::test]
    async fn test_respond_to_audio_and_empty_text() {
        let executor = OfflineExecutor::new();

        let reply = executor
            .respond("t", &[], "ignored", MessageType::Audio)
            .await
            .unwrap();
        assert!(reply.content.contains("Transcription is not enabled"));

        let reply = executor
            .respond("t", &[], "   ", MessageType::Text)
            .await
            .unwrap();
        assert!(reply.content.contains("Please provide a question"));

        let reply = executor
            .respond("t", &[], "what is new?", MessageType::Text)
            .await
            .unwrap();
        assert!(reply.content.contains("Echo: what is new?"));
    }
}
