//! Activity recording.
//!
//! [`ActivityRecorder::record`] normalizes a draft and hands it to a
//! background task that appends it to an [`ActivitySink`]. Recording never
//! blocks the caller and a failing sink only produces a warning, so board and
//! project mutations are never held up or undone by it.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, oneshot};
use tracker_common::{ActivityEvent, ActivityEventDraft, ActorId, ProjectId};

/// Append-only destination for activity events.
#[async_trait]
pub trait ActivitySink: Send + Sync {
    async fn append(&self, event: ActivityEvent) -> anyhow::Result<()>;
}

/// Narrows a recent-activity query. Empty fields match everything.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActivityFilter {
    pub project_id: Option<ProjectId>,
    pub actor_id: Option<ActorId>,
}

impl ActivityFilter {
    pub fn project(project_id: ProjectId) -> Self {
        Self {
            project_id: Some(project_id),
            actor_id: None,
        }
    }

    pub fn actor(actor_id: ActorId) -> Self {
        Self {
            project_id: None,
            actor_id: Some(actor_id),
        }
    }

    pub fn matches(&self, event: &ActivityEvent) -> bool {
        self.project_id.is_none_or(|id| id == event.project_id)
            && self.actor_id.is_none_or(|id| id == event.actor_id)
    }
}

enum Message {
    Event(ActivityEvent),
    Flush(oneshot::Sender<()>),
}

/// Fire-and-forget handle onto the activity sink. Cheap to clone.
#[derive(Clone)]
pub struct ActivityRecorder {
    tx: Option<mpsc::UnboundedSender<Message>>,
}

impl std::fmt::Debug for ActivityRecorder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ActivityRecorder")
            .field("enabled", &self.tx.is_some())
            .finish()
    }
}

impl ActivityRecorder {
    /// Start the drain task on the current tokio runtime.
    pub fn spawn(sink: Arc<dyn ActivitySink>) -> Self {
        let (tx, mut rx) = mpsc::unbounded_channel::<Message>();
        tokio::spawn(async move {
            while let Some(message) = rx.recv().await {
                match message {
                    Message::Event(event) => {
                        let (id, kind) = (event.id, event.kind);
                        if let Err(e) = sink.append(event).await {
                            tracing::warn!(event_id = %id, kind = %kind, error = %e, "failed to record activity");
                        }
                    }
                    Message::Flush(done) => {
                        let _ = done.send(());
                    }
                }
            }
        });
        Self { tx: Some(tx) }
    }

    /// A recorder that drops every event.
    pub fn disabled() -> Self {
        Self { tx: None }
    }

    pub fn is_enabled(&self) -> bool {
        self.tx.is_some()
    }

    pub fn record(&self, draft: ActivityEventDraft) {
        let Some(tx) = &self.tx else {
            return;
        };
        let event = draft.normalize(Utc::now());
        tracing::debug!(kind = %event.kind, project_id = event.project_id, "activity recorded");
        if tx.send(Message::Event(event)).is_err() {
            tracing::warn!("activity recorder stopped; event dropped");
        }
    }

    /// Wait until every event recorded so far has reached the sink.
    pub async fn flush(&self) {
        let Some(tx) = &self.tx else {
            return;
        };
        let (done_tx, done_rx) = oneshot::channel();
        if tx.send(Message::Flush(done_tx)).is_ok() {
            let _ = done_rx.await;
        }
    }
}

/// Activity sink that keeps events in memory, newest last.
#[derive(Debug, Default)]
pub struct MemorySink {
    events: Mutex<Vec<ActivityEvent>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// The most recent `limit` events matching `filter`, newest first.
    pub fn recent(&self, filter: &ActivityFilter, limit: usize) -> Vec<ActivityEvent> {
        self.lock()
            .iter()
            .rev()
            .filter(|e| filter.matches(e))
            .take(limit)
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<ActivityEvent>> {
        self.events.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[async_trait]
impl ActivitySink for MemorySink {
    async fn append(&self, event: ActivityEvent) -> anyhow::Result<()> {
        self.lock().push(event);
        Ok(())
    }
}
