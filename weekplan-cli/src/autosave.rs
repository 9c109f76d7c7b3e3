//! Debounced background saving.
//!
//! Edits are handed to an [`AutoSaver`], which waits for a quiet period
//! before sending the latest document. A failed save is retried exactly
//! once after a fixed delay. All saves for a calendar go through one
//! worker task, so a manual flush never races a debounce timer.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::{Instant, sleep_until};
use tracing::{debug, info, warn};

use weekplan_core::CalendarDocument;

use crate::client::SaveResult;

/// The server as seen by a syncing client.
#[async_trait]
pub trait Remote: Send + Sync {
    async fn fetch(&self, calendar_id: &str) -> Result<CalendarDocument>;

    async fn save(
        &self,
        calendar_id: &str,
        document: &CalendarDocument,
        client_last_modified: Option<DateTime<Utc>>,
    ) -> Result<SaveResult>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AutoSaveConfig {
    /// Quiet period after the last edit before saving.
    pub debounce: Duration,
    /// Delay before the single retry of a failed save.
    pub retry_delay: Duration,
}

impl Default for AutoSaveConfig {
    fn default() -> Self {
        AutoSaveConfig {
            debounce: Duration::from_secs(2),
            retry_delay: Duration::from_secs(5),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum SyncStatus {
    Idle,
    /// Waiting out the debounce.
    Pending,
    Saving,
    Saved {
        last_modified: Option<DateTime<Utc>>,
        has_changes: bool,
    },
    /// The last save failed. Local edits are kept.
    Offline { error: String, retrying: bool },
    /// The server had a newer document; the pending write was dropped.
    Superseded {
        server_data: Box<CalendarDocument>,
        server_last_modified: DateTime<Utc>,
    },
}

impl SyncStatus {
    /// No save is queued or in flight.
    pub fn is_settled(&self) -> bool {
        !matches!(
            self,
            SyncStatus::Pending | SyncStatus::Saving | SyncStatus::Offline { retrying: true, .. }
        )
    }
}

enum Command {
    Changed(Box<CalendarDocument>),
    Flush(oneshot::Sender<SyncStatus>),
}

/// Handle to the save worker of one calendar.
pub struct AutoSaver {
    commands: mpsc::UnboundedSender<Command>,
    status: watch::Receiver<SyncStatus>,
    worker: JoinHandle<()>,
}

impl AutoSaver {
    pub fn spawn(
        remote: Arc<dyn Remote>,
        calendar_id: String,
        last_modified: Option<DateTime<Utc>>,
        config: AutoSaveConfig,
    ) -> Self {
        let (commands, receiver) = mpsc::unbounded_channel();
        let (status_tx, status) = watch::channel(SyncStatus::Idle);

        let worker = Worker {
            remote,
            calendar_id,
            token: last_modified,
            config,
            pending: None,
            deadline: None,
            retried: false,
            status: status_tx,
        };

        AutoSaver {
            commands,
            status,
            worker: tokio::spawn(worker.run(receiver)),
        }
    }

    /// Queue `document` to be saved once edits go quiet.
    pub fn changed(&self, document: CalendarDocument) {
        if self.commands.send(Command::Changed(Box::new(document))).is_err() {
            warn!("Save worker has stopped; change not queued");
        }
    }

    /// Save anything pending right away and report the outcome.
    pub async fn flush(&self) -> SyncStatus {
        let (reply, response) = oneshot::channel();
        if self.commands.send(Command::Flush(reply)).is_err() {
            return self.current();
        }
        response.await.unwrap_or_else(|_| self.current())
    }

    /// Wait until no save is queued or in flight, including a scheduled
    /// retry.
    pub async fn settle(&self) -> SyncStatus {
        let mut status = self.status.clone();
        match status.wait_for(SyncStatus::is_settled).await {
            Ok(settled) => settled.clone(),
            Err(_) => self.current(),
        }
    }

    pub fn current(&self) -> SyncStatus {
        self.status.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<SyncStatus> {
        self.status.clone()
    }

    /// Stop the worker after it makes one last attempt at anything pending.
    pub async fn shutdown(self) {
        drop(self.commands);
        let _ = self.worker.await;
    }
}

struct Worker {
    remote: Arc<dyn Remote>,
    calendar_id: String,
    token: Option<DateTime<Utc>>,
    config: AutoSaveConfig,
    pending: Option<CalendarDocument>,
    deadline: Option<Instant>,
    /// Whether the pending document already used its retry.
    retried: bool,
    status: watch::Sender<SyncStatus>,
}

impl Worker {
    async fn run(mut self, mut commands: mpsc::UnboundedReceiver<Command>) {
        loop {
            let deadline = self.deadline;
            tokio::select! {
                command = commands.recv() => match command {
                    Some(Command::Changed(document)) => self.on_changed(*document),
                    Some(Command::Flush(reply)) => {
                        self.save_pending(&mut commands).await;
                        let _ = reply.send(self.status.borrow().clone());
                    }
                    None => {
                        if !self.retry_exhausted() {
                            self.save_pending(&mut commands).await;
                        }
                        break;
                    }
                },
                _ = sleep_until(deadline.unwrap_or_else(Instant::now)), if deadline.is_some() => {
                    self.save_pending(&mut commands).await;
                }
            }
        }
    }

    /// The pending document failed its save and its retry.
    fn retry_exhausted(&self) -> bool {
        self.retried && self.deadline.is_none()
    }

    fn on_changed(&mut self, document: CalendarDocument) {
        self.pending = Some(document);
        self.deadline = Some(Instant::now() + self.config.debounce);
        self.retried = false;
        self.status.send_replace(SyncStatus::Pending);
    }

    async fn save_pending(&mut self, commands: &mut mpsc::UnboundedReceiver<Command>) {
        self.deadline = None;
        let Some(document) = self.pending.take() else {
            return;
        };

        self.status.send_replace(SyncStatus::Saving);
        let result = self.remote.save(&self.calendar_id, &document, self.token).await;

        match result {
            Ok(SaveResult::Accepted {
                last_modified,
                has_changes,
            }) => {
                if last_modified.is_some() {
                    self.token = last_modified;
                }
                self.retried = false;
                debug!(calendar = %self.calendar_id, has_changes, "Saved");
                self.status.send_replace(SyncStatus::Saved {
                    last_modified: self.token,
                    has_changes,
                });
            }
            Ok(SaveResult::Conflict {
                server_data,
                server_last_modified,
            }) => {
                info!(calendar = %self.calendar_id, "Save superseded by a newer server copy");
                self.token = Some(server_last_modified);
                self.retried = false;
                self.status.send_replace(SyncStatus::Superseded {
                    server_data,
                    server_last_modified,
                });
                self.discard_queued(commands);
            }
            Err(e) => {
                let retrying = !self.retried;
                warn!(calendar = %self.calendar_id, error = %e, retrying, "Save failed");

                self.pending = Some(document);
                if retrying {
                    self.retried = true;
                    self.deadline = Some(Instant::now() + self.config.retry_delay);
                }
                self.status.send_replace(SyncStatus::Offline {
                    error: format!("{:#}", e),
                    retrying,
                });
            }
        }
    }

    /// Edits queued against the superseded document are dropped.
    fn discard_queued(&mut self, commands: &mut mpsc::UnboundedReceiver<Command>) {
        while let Ok(command) = commands.try_recv() {
            match command {
                Command::Changed(_) => debug!("Dropping edit made on a superseded document"),
                Command::Flush(reply) => {
                    let _ = reply.send(self.status.borrow().clone());
                }
            }
        }
    }
}
