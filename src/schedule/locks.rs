use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{Mutex, OwnedMutexGuard};

/// One async lock per group id so cascades and sweeps over the same chain
/// run one after another. Entries nobody holds are dropped on the next
/// acquisition.
#[derive(Default)]
pub(crate) struct GroupLocks {
    groups: Mutex<HashMap<i64, Arc<Mutex<()>>>>,
}

impl GroupLocks {
    pub(crate) async fn lock(&self, group_id: i64) -> OwnedMutexGuard<()> {
        let lock = {
            let mut groups = self.groups.lock().await;
            groups.retain(|id, lock| *id == group_id || Arc::strong_count(lock) > 1);
            Arc::clone(groups.entry(group_id).or_default())
        };
        lock.lock_owned().await
    }
}
