use std::sync::Arc;

use chrono::{DateTime, Utc};
use deadpool_postgres::Pool;
use serde::Serialize;
use strum::AsRefStr;

use crate::fs::FileNode;

type BoxDynError = Box<dyn std::error::Error + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, AsRefStr)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ActivityType {
    FileCreated,
    FileUpdated,
    FileDeleted,
    FileMoved,
    FileDownloaded,
    FolderCreated,
}

#[derive(Debug, Clone, Serialize)]
pub struct Event {
    pub kind: ActivityType,
    pub actor_id: String,
    pub target_id: Option<String>,
    pub target_name: Option<String>,
    pub details: Option<String>,
    pub timestamp: DateTime<Utc>,
}

impl Event {
    pub fn new(kind: ActivityType, actor_id: &str) -> Self {
        Event {
            kind,
            actor_id: actor_id.to_owned(),
            target_id: None,
            target_name: None,
            details: None,
            timestamp: Utc::now(),
        }
    }

    pub fn on(kind: ActivityType, node: &FileNode) -> Self {
        Event::new(kind, &node.owner_id)
            .with_target(node)
    }

    pub fn with_target(mut self, node: &FileNode) -> Self {
        self.target_id = Some(node.id.clone());
        self.target_name = Some(node.name.clone());
        self
    }

    pub fn with_details<D>(mut self, details: D) -> Self
    where
        D: Into<String>
    {
        self.details = Some(details.into());
        self
    }
}

/// destination for activity events. recording never blocks the request
/// that produced the event
#[async_trait::async_trait]
pub trait Recorder: Send + Sync {
    async fn record(&self, event: &Event) -> Result<(), BoxDynError>;
}

/// emits events through tracing
#[derive(Debug, Default)]
pub struct LogRecorder;

#[async_trait::async_trait]
impl Recorder for LogRecorder {
    async fn record(&self, event: &Event) -> Result<(), BoxDynError> {
        tracing::info!(
            kind = event.kind.as_ref(),
            actor = event.actor_id.as_str(),
            target = event.target_id.as_deref(),
            name = event.target_name.as_deref(),
            details = event.details.as_deref(),
            "activity"
        );

        Ok(())
    }
}

/// appends events to the activities table
pub struct PgRecorder {
    pool: Pool,
}

impl PgRecorder {
    pub fn new(pool: Pool) -> Self {
        PgRecorder { pool }
    }
}

#[async_trait::async_trait]
impl Recorder for PgRecorder {
    async fn record(&self, event: &Event) -> Result<(), BoxDynError> {
        let conn = self.pool.get().await?;

        conn.execute(
            "\
            insert into activities (\
                kind, actor_id, target_id, target_name, details, created\
            ) values ($1, $2, $3, $4, $5, $6)",
            &[
                &event.kind.as_ref(),
                &event.actor_id,
                &event.target_id,
                &event.target_name,
                &event.details,
                &event.timestamp,
            ]
        ).await?;

        Ok(())
    }
}

/// cheap handle shared by the adapters
#[derive(Clone)]
pub struct Activity {
    recorder: Arc<dyn Recorder>,
}

impl Activity {
    pub fn new(recorder: Arc<dyn Recorder>) -> Self {
        Activity { recorder }
    }

    /// records in the background, failures are logged and otherwise ignored
    pub fn record(&self, event: Event) {
        let recorder = self.recorder.clone();

        tokio::spawn(async move {
            if let Err(err) = recorder.record(&event).await {
                tracing::warn!(kind = event.kind.as_ref(), "failed to record activity: {err}");
            }
        });
    }
}

impl std::fmt::Debug for Activity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Activity").finish()
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use std::sync::Mutex;

    #[derive(Default)]
    struct Collect(Mutex<Vec<Event>>);

    #[async_trait::async_trait]
    impl Recorder for Collect {
        async fn record(&self, event: &Event) -> Result<(), BoxDynError> {
            self.0.lock().unwrap().push(event.clone());
            Ok(())
        }
    }

    #[test]
    fn type_names() {
        assert_eq!(ActivityType::FileCreated.as_ref(), "file_created");
        assert_eq!(ActivityType::FolderCreated.as_ref(), "folder_created");
        assert_eq!(
            serde_json::to_value(ActivityType::FileDownloaded).unwrap(),
            serde_json::json!("file_downloaded")
        );
    }

    #[tokio::test]
    async fn record_runs_in_background() {
        let collect = Arc::new(Collect::default());
        let activity = Activity::new(collect.clone());

        activity.record(Event::new(ActivityType::FileMoved, "owner").with_details("/a -> /b"));

        for _ in 0..50 {
            if !collect.0.lock().unwrap().is_empty() {
                break;
            }

            tokio::task::yield_now().await;
        }

        let events = collect.0.lock().unwrap();

        assert_eq!(events.len(), 1);
        assert_eq!(events[0].details.as_deref(), Some("/a -> /b"));
    }
}
