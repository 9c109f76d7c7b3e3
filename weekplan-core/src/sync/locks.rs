use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{Mutex, OwnedMutexGuard};

/// One async mutex per calendar ID.
///
/// Serializes the read-compare-write of a save against other requests for
/// the same calendar. Different IDs never contend.
#[derive(Default)]
pub struct CalendarLocks {
    locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl CalendarLocks {
    pub async fn acquire(&self, calendar_id: &str) -> OwnedMutexGuard<()> {
        let lock = {
            let mut locks = self.locks.lock().await;
            // Drop locks nobody holds or waits on.
            locks.retain(|_, lock| Arc::strong_count(lock) > 1);
            locks
                .entry(calendar_id.to_string())
                .or_default()
                .clone()
        };
        lock.lock_owned().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_same_id_is_serialized() {
        let locks = Arc::new(CalendarLocks::default());
        let guard = locks.acquire("abc").await;

        let contender = {
            let locks = locks.clone();
            tokio::spawn(async move {
                let _guard = locks.acquire("abc").await;
            })
        };

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!contender.is_finished());

        // Other IDs are unaffected.
        let _other = locks.acquire("xyz").await;

        drop(guard);
        contender.await.unwrap();
    }
}
