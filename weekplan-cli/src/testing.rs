//! Scripted stand-in for the server.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, TimeZone, Utc};

use weekplan_core::{CalendarDocument, ItemId, Task};

use crate::autosave::Remote;
use crate::client::SaveResult;

pub type SaveCall = (CalendarDocument, Option<DateTime<Utc>>);

/// Answers saves from a queue (accepting at `ts(100)` once it runs dry)
/// and fetches from `served`, failing when that is unset.
#[derive(Default)]
pub struct MockRemote {
    pub served: Mutex<Option<CalendarDocument>>,
    results: Mutex<VecDeque<Result<SaveResult>>>,
    saves: Mutex<Vec<SaveCall>>,
}

impl MockRemote {
    pub fn with_results(results: Vec<Result<SaveResult>>) -> Arc<Self> {
        Arc::new(MockRemote {
            results: Mutex::new(results.into()),
            ..MockRemote::default()
        })
    }

    pub fn serving(document: CalendarDocument, results: Vec<Result<SaveResult>>) -> Arc<Self> {
        Arc::new(MockRemote {
            served: Mutex::new(Some(document)),
            results: Mutex::new(results.into()),
            ..MockRemote::default()
        })
    }

    pub fn saves(&self) -> Vec<SaveCall> {
        self.saves.lock().unwrap().clone()
    }
}

#[async_trait]
impl Remote for MockRemote {
    async fn fetch(&self, _calendar_id: &str) -> Result<CalendarDocument> {
        match self.served.lock().unwrap().clone() {
            Some(document) => Ok(document),
            None => anyhow::bail!("connection refused"),
        }
    }

    async fn save(
        &self,
        _calendar_id: &str,
        document: &CalendarDocument,
        client_last_modified: Option<DateTime<Utc>>,
    ) -> Result<SaveResult> {
        self.saves
            .lock()
            .unwrap()
            .push((document.clone(), client_last_modified));
        self.results
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok(accepted(ts(100))))
    }
}

pub fn ts(secs: i64) -> DateTime<Utc> {
    Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap()
}

pub fn accepted(at: DateTime<Utc>) -> SaveResult {
    SaveResult::Accepted {
        last_modified: Some(at),
        has_changes: true,
    }
}

/// A document holding `tasks` pool tasks.
pub fn doc(tasks: usize) -> CalendarDocument {
    let mut doc = CalendarDocument::empty(NaiveDate::from_ymd_opt(2024, 1, 1).unwrap());
    for n in 0..tasks {
        doc.tasks.push(Task {
            id: ItemId::new(format!("t{}", n)),
            name: format!("Task {}", n),
            duration_minutes: 30,
            color: String::new(),
            notes: String::new(),
            project_id: None,
        });
    }
    doc
}
