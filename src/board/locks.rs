//! Per-entity in-flight locks.
//!
//! An operation locks every entity it touches before applying its optimistic
//! change and holds the locks until the remote call settles. A second
//! operation on the same entity waits its turn (tokio mutexes queue FIFO), so
//! two in-flight changes to one column or issue can never interleave their
//! snapshots. Operations on disjoint entities proceed concurrently.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use tokio::sync::OwnedMutexGuard;
use tracker_common::{ColumnId, IssueId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum LockKey {
    /// The column layout of the board.
    Layout,
    Column(ColumnId),
    Issue(IssueId),
}

type Slot = Arc<tokio::sync::Mutex<()>>;

#[derive(Debug, Default)]
pub struct EntityLocks {
    slots: Mutex<HashMap<LockKey, Slot>>,
}

/// Guards for one operation. Dropping releases every key.
#[derive(Debug)]
pub struct HeldLocks {
    keys: Vec<LockKey>,
    _guards: Vec<OwnedMutexGuard<()>>,
}

impl HeldLocks {
    pub fn keys(&self) -> &[LockKey] {
        &self.keys
    }
}

impl EntityLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Acquire all `keys`, waiting behind earlier holders.
    ///
    /// Keys are taken in sorted order so two operations sharing several
    /// entities cannot deadlock.
    pub async fn acquire(&self, keys: &[LockKey]) -> HeldLocks {
        let mut keys = keys.to_vec();
        keys.sort();
        keys.dedup();

        let slots: Vec<Slot> = {
            let mut table = self.table();
            table.retain(|_, slot| Arc::strong_count(slot) > 1);
            keys.iter()
                .map(|key| Arc::clone(table.entry(*key).or_default()))
                .collect()
        };

        let mut guards = Vec::with_capacity(slots.len());
        for slot in slots {
            guards.push(slot.lock_owned().await);
        }
        HeldLocks {
            keys,
            _guards: guards,
        }
    }

    /// True while some operation holds or waits on `key`.
    pub fn in_flight(&self, key: LockKey) -> bool {
        self.table()
            .get(&key)
            .is_some_and(|slot| Arc::strong_count(slot) > 1)
    }

    /// Forget every slot. Holders keep their guards, but new operations no
    /// longer queue behind them.
    pub fn reset(&self) {
        self.table().clear();
    }

    fn table(&self) -> std::sync::MutexGuard<'_, HashMap<LockKey, Slot>> {
        // The table is only touched in short non-panicking sections.
        self.slots.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
