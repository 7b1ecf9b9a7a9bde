//! Session state and turn sequencing.

use crate::executor::ResearchExecutor;
use crate::types::{
    AppError, LogEntry, MessageType, Modality, Result, Sender, SessionState, SessionSummary,
    StartSessionRequest, StartSessionResponse,
};
use chrono::{DateTime, Utc};
use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::broadcast;
use uuid::Uuid;

/// Mutable session state, guarded by a short lock that is never held across
/// an await point.
struct SessionInner {
    state: SessionState,
    log: Vec<LogEntry>,
    interactions: usize,
    key_findings: Vec<serde_json::Value>,
    ended_at: Option<DateTime<Utc>>,
}

struct SessionHandle {
    session_id: String,
    topic: String,
    modalities: Vec<Modality>,
    started_at: DateTime<Utc>,
    inner: Mutex<SessionInner>,
    /// Serializes turns: a session never has two in-flight executor calls,
    /// so replies cannot be misattributed across turns.
    turn: tokio::sync::Mutex<()>,
    /// Fan-out of appended log entries to connected transports.
    outbound: broadcast::Sender<LogEntry>,
}

impl SessionHandle {
    /// Append an entry and fan it out. The broadcast happens under the inner
    /// lock so subscribers never observe a gap between replay and live
    /// entries.
    fn append(&self, sender: Sender, content: String, message_type: MessageType) -> LogEntry {
        let mut inner = self.inner.lock();
        let entry = LogEntry {
            seq: inner.log.len() as u64,
            sender,
            content,
            message_type,
            timestamp: Utc::now(),
        };
        inner.log.push(entry.clone());
        let _ = self.outbound.send(entry.clone());
        entry
    }

    fn summary(&self) -> SessionSummary {
        let inner = self.inner.lock();
        let until = inner.ended_at.unwrap_or_else(Utc::now);
        let elapsed_minutes = (until - self.started_at).num_minutes().max(1);

        let research_report = match inner.state {
            SessionState::Ended => Some(format!(
                "Live research session for '{}' ended after {} minute(s).",
                self.topic, elapsed_minutes
            )),
            _ => None,
        };

        SessionSummary {
            session_id: self.session_id.clone(),
            topic: self.topic.clone(),
            status: inner.state,
            duration_minutes: elapsed_minutes,
            total_interactions: inner.interactions,
            key_findings: inner.key_findings.clone(),
            research_report,
        }
    }
}

/// Sole mutator of live-session state and sole appender to session logs.
pub struct LiveSessionManager {
    executor: Arc<dyn ResearchExecutor>,
    sessions: RwLock<HashMap<String, Arc<SessionHandle>>>,
    channel_capacity: usize,
}

impl LiveSessionManager {
    pub fn new(executor: Arc<dyn ResearchExecutor>, channel_capacity: usize) -> Self {
        Self {
            executor,
            sessions: RwLock::new(HashMap::new()),
            channel_capacity,
        }
    }

    /// Create a session in `active` state.
    pub fn start_session(&self, request: StartSessionRequest) -> Result<StartSessionResponse> {
        let topic = request.topic.trim();
        if topic.len() < 3 {
            return Err(AppError::InvalidInput(
                "topic must be at least 3 characters".to_string(),
            ));
        }

        let modalities = request
            .modalities
            .filter(|modalities| !modalities.is_empty())
            .unwrap_or_else(|| vec![Modality::Text]);

        let (outbound, _) = broadcast::channel(self.channel_capacity);
        let handle = Arc::new(SessionHandle {
            session_id: Uuid::new_v4().to_string(),
            topic: topic.to_string(),
            modalities: modalities.clone(),
            started_at: Utc::now(),
            inner: Mutex::new(SessionInner {
                state: SessionState::Active,
                log: Vec::new(),
                interactions: 0,
                key_findings: Vec::new(),
                ended_at: None,
            }),
            turn: tokio::sync::Mutex::new(()),
            outbound,
        });

        let response = StartSessionResponse {
            session_id: handle.session_id.clone(),
            topic: handle.topic.clone(),
            status: SessionState::Active,
            started_at: handle.started_at,
            modalities,
        };
        tracing::info!(session_id = %handle.session_id, topic = %handle.topic, "live session started");
        self.sessions
            .write()
            .insert(handle.session_id.clone(), handle);
        Ok(response)
    }

    /// Append a message to the session log in strict arrival order.
    ///
    /// A `user` message is forwarded to the executor and its asynchronous
    /// reply appended as a second, `assistant` entry. Turns are strictly
    /// sequential per session: this call holds the session's turn lock for
    /// the whole round trip. An executor failure is recorded as a `system`
    /// entry and leaves the session active.
    pub async fn post_message(
        &self,
        session_id: &str,
        sender: Sender,
        content: String,
        message_type: MessageType,
    ) -> Result<LogEntry> {
        let handle = self.handle(session_id)?;
        let _turn = handle.turn.lock().await;

        {
            let inner = handle.inner.lock();
            if inner.state.is_closed() {
                return Err(AppError::SessionClosed(format!(
                    "session '{session_id}' is {:?}",
                    inner.state
                )));
            }
        }

        let entry = handle.append(sender, content.clone(), message_type);

        if sender == Sender::User {
            handle.inner.lock().interactions += 1;

            let history: Vec<LogEntry> = handle.inner.lock().log.clone();
            match self
                .executor
                .respond(&handle.topic, &history, &content, message_type)
                .await
            {
                Ok(reply) => {
                    let mut inner = handle.inner.lock();
                    if inner.state.is_closed() {
                        // The session was torn down while the turn was in
                        // flight; the reply has nowhere to go.
                        tracing::debug!(session_id, "dropping reply for closed session");
                    } else {
                        inner.key_findings.extend(reply.key_findings.iter().cloned());
                        drop(inner);
                        handle.append(Sender::Assistant, reply.content, MessageType::Text);
                    }
                }
                Err(err) => {
                    tracing::warn!(session_id, %err, "executor failed to answer session turn");
                    handle.append(
                        Sender::System,
                        format!("The research assistant could not answer this turn: {err}"),
                        MessageType::Text,
                    );
                }
            }
        }

        Ok(entry)
    }

    /// Transition `active -> ended` and compute the final summary. Ending a
    /// session that is already closed returns its summary unchanged.
    pub fn end_session(&self, session_id: &str) -> Result<SessionSummary> {
        let handle = self.handle(session_id)?;
        {
            let mut inner = handle.inner.lock();
            if inner.state == SessionState::Active {
                inner.state = SessionState::Ended;
                inner.ended_at = Some(Utc::now());
                tracing::info!(session_id, "live session ended");
            }
        }
        Ok(handle.summary())
    }

    /// Current summary snapshot without changing state.
    pub fn summary(&self, session_id: &str) -> Result<SessionSummary> {
        Ok(self.handle(session_id)?.summary())
    }

    /// Granted modalities of a session.
    pub fn modalities(&self, session_id: &str) -> Result<Vec<Modality>> {
        Ok(self.handle(session_id)?.modalities.clone())
    }

    /// Current lifecycle state of a session.
    pub fn state(&self, session_id: &str) -> Result<SessionState> {
        Ok(self.handle(session_id)?.inner.lock().state)
    }

    /// Replay of the session log so far plus a live subscription for
    /// everything appended afterwards, with no gap between the two.
    pub fn subscribe(
        &self,
        session_id: &str,
    ) -> Result<(Vec<LogEntry>, broadcast::Receiver<LogEntry>)> {
        let handle = self.handle(session_id)?;
        let inner = handle.inner.lock();
        let receiver = handle.outbound.subscribe();
        Ok((inner.log.clone(), receiver))
    }

    /// The transport dropped: an active session becomes `errored`; a session
    /// that already ended cleanly stays ended.
    pub fn mark_disconnected(&self, session_id: &str) {
        let Ok(handle) = self.handle(session_id) else {
            return;
        };
        let mut inner = handle.inner.lock();
        if inner.state == SessionState::Active {
            tracing::warn!(session_id, "transport lost, session errored");
            inner.state = SessionState::Errored;
            inner.ended_at = Some(Utc::now());
        }
    }

    fn handle(&self, session_id: &str) -> Result<Arc<SessionHandle>> {
        self.sessions
            .read()
            .get(session_id)
            .cloned()
            .ok_or_else(|| AppError::NotFound(format!("Session with ID '{session_id}' not found")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::{JobContext, SessionReply};
    use crate::types::{ResearchRequest, ResearchResult};
    use async_trait::async_trait;
    use std::time::Duration;

    /// Replies after a configurable delay; used to exercise turn sequencing.
    struct SlowEchoExecutor {
        delay: Duration,
    }

    #[async_trait]
    impl ResearchExecutor for SlowEchoExecutor {
        async fn run(
            &self,
            _request: &ResearchRequest,
            _ctx: &JobContext,
        ) -> Result<ResearchResult> {
            Err(AppError::Executor("jobs not used here".to_string()))
        }

        async fn respond(
            &self,
            _topic: &str,
            _history: &[LogEntry],
            content: &str,
            _message_type: MessageType,
        ) -> Result<SessionReply> {
            tokio::time::sleep(self.delay).await;
            Ok(SessionReply {
                content: format!("re: {content}"),
                key_findings: vec![serde_json::json!({ "finding": content })],
            })
        }
    }

    struct FailingSessionExecutor;

    #[async_trait]
    impl ResearchExecutor for FailingSessionExecutor {
        async fn run(
            &self,
            _request: &ResearchRequest,
            _ctx: &JobContext,
        ) -> Result<ResearchResult> {
            Err(AppError::Executor("jobs not used here".to_string()))
        }

        async fn respond(
            &self,
            _topic: &str,
            _history: &[LogEntry],
            _content: &str,
            _message_type: MessageType,
        ) -> Result<SessionReply> {
            Err(AppError::Executor("model endpoint unreachable".to_string()))
        }
    }

    fn manager_with_delay(delay: Duration) -> Arc<LiveSessionManager> {
        Arc::new(LiveSessionManager::new(
            Arc::new(SlowEchoExecutor { delay }),
            64,
        ))
    }

    fn start(manager: &LiveSessionManager) -> String {
        manager
            .start_session(StartSessionRequest {
                topic: "protein folding".to_string(),
                modalities: None,
            })
            .unwrap()
            .session_id
    }

    #[tokio::test]
    async fn test_start_session_defaults_to_text() {
        let manager = manager_with_delay(Duration::ZERO);
        let response = manager
            .start_session(StartSessionRequest {
                topic: "protein folding".to_string(),
                modalities: None,
            })
            .unwrap();

        assert_eq!(response.status, SessionState::Active);
        assert_eq!(response.modalities, vec![Modality::Text]);
        assert_eq!(manager.state(&response.session_id).unwrap(), SessionState::Active);
    }

    #[tokio::test]
    async fn test_user_turn_appends_user_then_assistant() {
        let manager = manager_with_delay(Duration::ZERO);
        let session_id = start(&manager);

        manager
            .post_message(&session_id, Sender::User, "hello".to_string(), MessageType::Text)
            .await
            .unwrap();

        let (log, _rx) = manager.subscribe(&session_id).unwrap();
        assert_eq!(log.len(), 2);
        assert_eq!(log[0].sender, Sender::User);
        assert_eq!(log[1].sender, Sender::Assistant);
        assert_eq!(log[1].content, "re: hello");
        assert_eq!(log[0].seq, 0);
        assert_eq!(log[1].seq, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_turns_are_strictly_sequential() {
        let manager = manager_with_delay(Duration::from_millis(200));
        let session_id = start(&manager);

        let first = {
            let manager = manager.clone();
            let session_id = session_id.clone();
            tokio::spawn(async move {
                manager
                    .post_message(&session_id, Sender::User, "one".to_string(), MessageType::Text)
                    .await
                    .unwrap();
            })
        };
        // Let the first turn acquire the turn lock before posting the second.
        tokio::time::sleep(Duration::from_millis(10)).await;
        let second = {
            let manager = manager.clone();
            let session_id = session_id.clone();
            tokio::spawn(async move {
                manager
                    .post_message(&session_id, Sender::User, "two".to_string(), MessageType::Text)
                    .await
                    .unwrap();
            })
        };

        first.await.unwrap();
        second.await.unwrap();

        let (log, _rx) = manager.subscribe(&session_id).unwrap();
        let contents: Vec<&str> = log.iter().map(|entry| entry.content.as_str()).collect();
        assert_eq!(contents, vec!["one", "re: one", "two", "re: two"]);
        let seqs: Vec<u64> = log.iter().map(|entry| entry.seq).collect();
        assert_eq!(seqs, vec![0, 1, 2, 3]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_no_reply_appended_while_turn_in_flight() {
        let manager = manager_with_delay(Duration::from_secs(30));
        let session_id = start(&manager);

        let turn = {
            let manager = manager.clone();
            let session_id = session_id.clone();
            tokio::spawn(async move {
                manager
                    .post_message(&session_id, Sender::User, "slow".to_string(), MessageType::Text)
                    .await
                    .unwrap();
            })
        };

        tokio::time::sleep(Duration::from_secs(1)).await;
        // Executor still thinking: only the user entry exists and the
        // session is still active.
        let (log, _rx) = manager.subscribe(&session_id).unwrap();
        assert_eq!(log.len(), 1);
        assert_eq!(manager.state(&session_id).unwrap(), SessionState::Active);

        turn.await.unwrap();
        let (log, _rx) = manager.subscribe(&session_id).unwrap();
        assert_eq!(log.len(), 2);
        assert_eq!(log[1].content, "re: slow");
    }

    #[tokio::test]
    async fn test_executor_failure_keeps_session_active() {
        let manager = Arc::new(LiveSessionManager::new(Arc::new(FailingSessionExecutor), 64));
        let session_id = start(&manager);

        manager
            .post_message(&session_id, Sender::User, "hello".to_string(), MessageType::Text)
            .await
            .unwrap();

        let (log, _rx) = manager.subscribe(&session_id).unwrap();
        assert_eq!(log.len(), 2);
        assert_eq!(log[1].sender, Sender::System);
        assert!(log[1].content.contains("model endpoint unreachable"));
        assert_eq!(manager.state(&session_id).unwrap(), SessionState::Active);
    }

    #[tokio::test]
    async fn test_end_session_summary_and_rejection() {
        let manager = manager_with_delay(Duration::ZERO);
        let session_id = start(&manager);

        manager
            .post_message(&session_id, Sender::User, "q1".to_string(), MessageType::Text)
            .await
            .unwrap();
        manager
            .post_message(&session_id, Sender::User, "q2".to_string(), MessageType::Text)
            .await
            .unwrap();

        let summary = manager.end_session(&session_id).unwrap();
        assert_eq!(summary.status, SessionState::Ended);
        assert_eq!(summary.total_interactions, 2);
        assert_eq!(summary.key_findings.len(), 2);
        assert!(summary.duration_minutes >= 1);
        assert!(summary.research_report.unwrap().contains("ended after"));

        let err = manager
            .post_message(&session_id, Sender::User, "late".to_string(), MessageType::Text)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::SessionClosed(_)));

        // Ending again is a no-op returning the same terminal summary.
        let again = manager.end_session(&session_id).unwrap();
        assert_eq!(again.status, SessionState::Ended);
    }

    #[tokio::test]
    async fn test_disconnect_marks_active_session_errored() {
        let manager = manager_with_delay(Duration::ZERO);
        let session_id = start(&manager);

        manager.mark_disconnected(&session_id);
        assert_eq!(manager.state(&session_id).unwrap(), SessionState::Errored);

        let err = manager
            .post_message(&session_id, Sender::User, "hi".to_string(), MessageType::Text)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::SessionClosed(_)));
    }

    #[tokio::test]
    async fn test_disconnect_after_clean_end_stays_ended() {
        let manager = manager_with_delay(Duration::ZERO);
        let session_id = start(&manager);

        manager.end_session(&session_id).unwrap();
        manager.mark_disconnected(&session_id);
        assert_eq!(manager.state(&session_id).unwrap(), SessionState::Ended);
    }

    #[tokio::test]
    async fn test_subscribe_replays_and_streams() {
        let manager = manager_with_delay(Duration::ZERO);
        let session_id = start(&manager);

        manager
            .post_message(&session_id, Sender::User, "first".to_string(), MessageType::Text)
            .await
            .unwrap();

        let (replay, mut rx) = manager.subscribe(&session_id).unwrap();
        assert_eq!(replay.len(), 2);

        manager
            .post_message(&session_id, Sender::User, "second".to_string(), MessageType::Text)
            .await
            .unwrap();

        let live = rx.recv().await.unwrap();
        assert_eq!(live.content, "second");
        assert_eq!(live.seq, 2);
    }
}
