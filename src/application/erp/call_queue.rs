//! CallQueue - serialized outbound ERP calls per store.
//!
//! Tiny's API rejects concurrent calls on the same account, so all
//! outbound traffic for a store funnels through a concurrency-1 queue.
//! Tokio's mutex hands the lock to waiters in FIFO order, which gives the
//! queue its ordering guarantee without an explicit task list.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use tokio::sync::Mutex;

use crate::domain::foundation::StoreId;

/// Per-store serialization for outbound ERP calls.
#[derive(Default)]
pub struct CallQueue {
    locks: Mutex<HashMap<StoreId, Arc<Mutex<()>>>>,
}

impl CallQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `call` once all earlier calls for the same store have finished.
    ///
    /// Calls for different stores run concurrently.
    pub async fn run<F, Fut, T>(&self, store_id: StoreId, call: F) -> T
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = T>,
    {
        let lock = {
            let mut locks = self.locks.lock().await;
            locks
                .entry(store_id)
                .or_insert_with(|| Arc::new(Mutex::new(())))
                .clone()
        };
        let result = {
            let _guard = lock.lock().await;
            call().await
        };

        // Remove the entry once no other caller holds a clone; clones are
        // only handed out under the map lock, so the count check is safe.
        let mut locks = self.locks.lock().await;
        drop(lock);
        if let Some(entry) = locks.get(&store_id) {
            if Arc::strong_count(entry) == 1 {
                locks.remove(&store_id);
            }
        }
        result
    }
}
