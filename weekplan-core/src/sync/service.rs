use std::sync::Arc;

use chrono::{Local, SubsecRound, Utc};
use serde_json::Value;
use tracing::{debug, info};

use crate::document::CalendarDocument;
use crate::error::{WeekplanError, WeekplanResult};
use crate::ids::{self, validate_calendar_id};
use crate::migrate::migrate;
use crate::storage::Storage;
use crate::sync::locks::CalendarLocks;
use crate::sync::outcome::{SaveOutcome, SaveRequest};

/// How many fresh IDs `create` tries before giving up.
pub const CREATE_ATTEMPTS: usize = 10;

type IdGenerator = Box<dyn Fn() -> String + Send + Sync>;

/// Server side of the sync protocol over one storage backend.
pub struct CalendarService {
    storage: Arc<dyn Storage>,
    locks: CalendarLocks,
    generate_id: IdGenerator,
}

impl CalendarService {
    pub fn new(storage: Arc<dyn Storage>) -> Self {
        CalendarService {
            storage,
            locks: CalendarLocks::default(),
            generate_id: Box::new(ids::calendar_id),
        }
    }

    /// Replace the calendar ID generator.
    pub fn with_id_generator(mut self, generate: impl Fn() -> String + Send + Sync + 'static) -> Self {
        self.generate_id = Box::new(generate);
        self
    }

    pub fn storage(&self) -> &Arc<dyn Storage> {
        &self.storage
    }

    async fn load(&self, calendar_id: &str) -> WeekplanResult<CalendarDocument> {
        let bytes = self.storage.read(calendar_id).await?;
        let raw: Value = serde_json::from_slice(&bytes)?;
        Ok(migrate(&raw))
    }

    async fn load_existing(&self, calendar_id: &str) -> WeekplanResult<Option<CalendarDocument>> {
        match self.load(calendar_id).await {
            Ok(doc) => Ok(Some(doc)),
            Err(e) if e.is_not_found() => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// The stored calendar, migrated; an unknown ID yields an empty one.
    pub async fn fetch(&self, calendar_id: &str) -> WeekplanResult<CalendarDocument> {
        validate_calendar_id(calendar_id)?;

        match self.load_existing(calendar_id).await? {
            Some(doc) => Ok(doc),
            None => {
                debug!(calendar = calendar_id, "No stored calendar, serving an empty one");
                Ok(CalendarDocument::empty(Local::now().date_naive()))
            }
        }
    }

    /// Save a client's document.
    ///
    /// Rejected as a conflict when the client sent a token and the stored
    /// `lastModified` is strictly newer. A payload equal to the stored one
    /// (timestamps aside) is not written and keeps the stored token.
    pub async fn save(&self, calendar_id: &str, request: SaveRequest) -> WeekplanResult<SaveOutcome> {
        validate_calendar_id(calendar_id)?;
        let _guard = self.locks.acquire(calendar_id).await;

        let stored = self.load_existing(calendar_id).await?;

        if let Some(stored) = &stored {
            let server_token = stored.last_modified;
            if let (Some(client_token), Some(server_token)) = (request.client_last_modified, server_token) {
                if server_token > client_token {
                    info!(
                        calendar = calendar_id,
                        %client_token,
                        %server_token,
                        "Rejected stale save"
                    );
                    return Ok(SaveOutcome::Conflict {
                        server_data: Box::new(stored.clone()),
                        server_last_modified: server_token,
                    });
                }
            }

            if stored.payload_eq(&request.document) {
                debug!(calendar = calendar_id, "Save is a no-op");
                return Ok(SaveOutcome::Unchanged {
                    last_modified: server_token,
                });
            }
        }

        let mut document = request.document;

        let now = Utc::now().trunc_subsecs(3);
        document.created = stored
            .as_ref()
            .and_then(|s| s.created)
            .or(document.created)
            .or(Some(now));
        document.last_modified = Some(now);

        let bytes = serde_json::to_vec_pretty(&document)?;
        self.storage.write(calendar_id, &bytes).await?;

        info!(calendar = calendar_id, last_modified = %now, "Saved calendar");
        Ok(SaveOutcome::Saved { last_modified: now })
    }

    /// Create a calendar under a fresh ID, optionally seeded with data.
    pub async fn create(&self, seed: Option<Value>) -> WeekplanResult<String> {
        let mut document = match seed {
            Some(seed) if seed.is_object() => migrate(&seed),
            _ => CalendarDocument::empty(Local::now().date_naive()),
        };

        for attempt in 1..=CREATE_ATTEMPTS {
            let id = (self.generate_id)();
            validate_calendar_id(&id)?;

            let _guard = self.locks.acquire(&id).await;
            if self.storage.exists(&id).await? {
                debug!(calendar = %id, attempt, "Generated calendar ID already taken");
                continue;
            }

            let now = Utc::now().trunc_subsecs(3);
            document.created = Some(now);
            document.last_modified = Some(now);

            let bytes = serde_json::to_vec_pretty(&document)?;
            self.storage.write(&id, &bytes).await?;

            info!(calendar = %id, "Created calendar");
            return Ok(id);
        }

        Err(WeekplanError::IdExhausted(CREATE_ATTEMPTS))
    }

    /// Every stored calendar ID.
    pub async fn list(&self) -> WeekplanResult<Vec<String>> {
        self.storage.list("").await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::{ItemId, Task};
    use crate::storage::{FileStore, ObjectStorage};
    use chrono::{DateTime, Duration};
    use object_store::memory::InMemory;
    use serde_json::json;
    use std::sync::Mutex;
    use tempfile::TempDir;

    fn memory_service() -> CalendarService {
        CalendarService::new(Arc::new(ObjectStorage::new(Arc::new(InMemory::new()), None, "memory")))
    }

    fn task(id: &str) -> Task {
        Task {
            id: ItemId::new(id),
            name: id.to_string(),
            duration_minutes: 30,
            color: "#3B82F6".into(),
            notes: String::new(),
            project_id: None,
        }
    }

    async fn saved_token(service: &CalendarService, id: &str) -> DateTime<Utc> {
        service.fetch(id).await.unwrap().last_modified.unwrap()
    }

    #[tokio::test]
    async fn test_fetch_unknown_is_empty() {
        let service = memory_service();
        let doc = service.fetch("fresh1").await.unwrap();
        assert!(doc.is_empty());
        assert_eq!(doc.last_modified, None);
        assert!(service.list().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_undefined_id_rejected() {
        let service = memory_service();
        let err = service.fetch("undefined").await.unwrap_err();
        assert!(matches!(err, WeekplanError::InvalidCalendarId(_)));

        let doc = CalendarDocument::empty(Local::now().date_naive());
        let err = service.save("undefined", SaveRequest::new(doc, None)).await.unwrap_err();
        assert!(matches!(err, WeekplanError::InvalidCalendarId(_)));
    }

    #[tokio::test]
    async fn test_noop_save_keeps_token() {
        let service = memory_service();
        let mut doc = service.fetch("cal1").await.unwrap();
        doc.tasks.push(task("t1"));

        let first = service.save("cal1", SaveRequest::new(doc.clone(), None)).await.unwrap();
        assert!(first.has_changes());
        let token = saved_token(&service, "cal1").await;
        assert_eq!(first.last_modified(), Some(token));

        let again = service
            .save("cal1", SaveRequest::new(doc.clone(), Some(token)))
            .await
            .unwrap();
        assert_eq!(again, SaveOutcome::Unchanged { last_modified: Some(token) });
        assert_eq!(again.message(), "No changes detected");
        assert_eq!(saved_token(&service, "cal1").await, token);
    }

    #[tokio::test]
    async fn test_stale_save_conflicts_without_writing() {
        let service = memory_service();
        let mut doc = service.fetch("cal1").await.unwrap();
        doc.tasks.push(task("t1"));
        service.save("cal1", SaveRequest::new(doc.clone(), None)).await.unwrap();
        let server_token = saved_token(&service, "cal1").await;

        let mut stale = doc.clone();
        stale.tasks.push(task("t2"));
        let outcome = service
            .save("cal1", SaveRequest::new(stale, Some(server_token - Duration::seconds(5))))
            .await
            .unwrap();

        match outcome {
            SaveOutcome::Conflict { server_data, server_last_modified } => {
                assert_eq!(server_last_modified, server_token);
                assert_eq!(server_data.tasks.len(), 1);
            }
            other => panic!("Expected conflict, got {:?}", other),
        }
        let stored = service.fetch("cal1").await.unwrap();
        assert_eq!(stored.tasks.len(), 1);
        assert_eq!(stored.last_modified, Some(server_token));
    }

    #[tokio::test]
    async fn test_save_without_token_overwrites_and_keeps_created() {
        let service = memory_service();
        let id = service.create(None).await.unwrap();
        let created = service.fetch(&id).await.unwrap().created;
        assert!(created.is_some());

        let mut doc = CalendarDocument::empty(Local::now().date_naive());
        doc.tasks.push(task("t1"));
        doc.created = None;
        let outcome = service.save(&id, SaveRequest::new(doc, None)).await.unwrap();
        assert!(outcome.has_changes());
        assert_eq!(service.fetch(&id).await.unwrap().created, created);
    }

    #[tokio::test]
    async fn test_create_seeds_and_retries_collisions() {
        let service = memory_service();
        service
            .save("taken1", SaveRequest::new(CalendarDocument::empty(Local::now().date_naive()), None))
            .await
            .unwrap();

        let ids = Mutex::new(vec!["fresh1".to_string(), "taken1".to_string()]);
        let service = CalendarService {
            generate_id: Box::new(move || ids.lock().unwrap().pop().unwrap_or_default()),
            ..service
        };

        let id = service
            .create(Some(json!({ "tasks": [{ "id": "t1", "name": "Seeded" }] })))
            .await
            .unwrap();
        assert_eq!(id, "fresh1");
        assert_eq!(service.fetch(&id).await.unwrap().tasks[0].name, "Seeded");
    }

    #[tokio::test]
    async fn test_create_gives_up_after_budget() {
        let service = memory_service();
        service
            .save("always", SaveRequest::new(CalendarDocument::empty(Local::now().date_naive()), None))
            .await
            .unwrap();

        let calls = Arc::new(Mutex::new(0usize));
        let counter = calls.clone();
        let service = service.with_id_generator(move || {
            *counter.lock().unwrap() += 1;
            "always".to_string()
        });

        let err = service.create(None).await.unwrap_err();
        assert!(matches!(err, WeekplanError::IdExhausted(CREATE_ATTEMPTS)));
        assert_eq!(*calls.lock().unwrap(), CREATE_ATTEMPTS);
    }

    #[tokio::test]
    async fn test_create_many_distinct() {
        let service = memory_service();
        let mut ids = Vec::new();
        for _ in 0..20 {
            ids.push(service.create(None).await.unwrap());
        }
        let mut listed = service.list().await.unwrap();
        listed.sort();
        ids.sort();
        ids.dedup();
        assert_eq!(ids.len(), 20);
        assert_eq!(listed, ids);
    }

    #[tokio::test]
    async fn test_legacy_document_served_migrated() {
        let dir = TempDir::new().unwrap();
        let store = FileStore::new(dir.path());
        let legacy = json!({
            "tasks": [],
            "scheduledTasks": [{ "id": 7, "name": "Write", "weekOffset": 0, "day": 1, "startTime": 9.5 }],
            "lastModified": "2024-01-03T12:00:00.000Z"
        });
        store.write("old1", legacy.to_string().as_bytes()).await.unwrap();

        let service = CalendarService::new(Arc::new(store));
        let doc = service.fetch("old1").await.unwrap();
        assert_eq!(doc.date_version, 2);
        assert_eq!(doc.scheduled_tasks.len(), 1);
        assert_eq!(doc.scheduled_tasks[0].start_minutes, 570);
        assert!(!doc.scheduled_tasks[0].occurrence_id.is_empty());
    }

    #[tokio::test]
    async fn test_unmigrated_document_loads_stably() {
        let service = memory_service();
        let legacy = json!({
            "tasks": [{ "id": 7, "name": "Write", "duration": 30 }],
            "scheduledTasks": [
                { "id": 7, "name": "Write", "weekOffset": 0, "day": 1, "startTime": 9.5 },
                { "name": "No id", "weekOffset": 1, "day": 3, "startTime": 14 }
            ],
            "lastModified": "2024-01-03T12:00:00.000Z"
        });
        service
            .storage()
            .write("old2", legacy.to_string().as_bytes())
            .await
            .unwrap();

        let first = service.fetch("old2").await.unwrap();
        let second = service.fetch("old2").await.unwrap();
        assert_eq!(first, second);

        let outcome = service
            .save("old2", SaveRequest::new(first.clone(), first.last_modified))
            .await
            .unwrap();
        assert!(matches!(outcome, SaveOutcome::Unchanged { .. }));
        assert_eq!(saved_token(&service, "old2").await, first.last_modified.unwrap());

        let task = service.fetch("old2").await.unwrap().scheduled_tasks[0].clone();
        assert_eq!(task.occurrence_id, first.scheduled_tasks[0].occurrence_id);
    }

    #[tokio::test]
    async fn test_end_to_end_scenario() {
        let service = memory_service().with_id_generator(|| "abc123".to_string());

        let id = service.create(None).await.unwrap();
        assert_eq!(id, "abc123");

        let fetched = service.fetch("abc123").await.unwrap();
        assert!(fetched.is_empty());
        let before_first_save = fetched.last_modified.unwrap() - Duration::milliseconds(1);

        let mut doc = fetched.clone();
        doc.tasks.push(task("t1"));
        let outcome = service
            .save("abc123", SaveRequest::new(doc.clone(), fetched.last_modified))
            .await
            .unwrap();
        assert!(outcome.has_changes());

        let reloaded = service.fetch("abc123").await.unwrap();
        assert_eq!(reloaded.tasks, vec![task("t1")]);
        assert!(reloaded.last_modified >= fetched.last_modified);

        let mut late = doc.clone();
        late.tasks.push(task("t2"));
        let outcome = service
            .save("abc123", SaveRequest::new(late, Some(before_first_save)))
            .await
            .unwrap();
        assert!(outcome.is_conflict());
    }
}
