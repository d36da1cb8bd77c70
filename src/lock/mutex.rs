// Copyright 2026 The jobstore Authors.
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program.  If not, see <http://www.gnu.org/licenses/>.

//! Realisation 2 of the Lock Manager: a process-wide mutex keyed by lock
//! name, for single-instance deployments without row-lock support
//! (spec.md §4.1). Grounded on the teacher's SQLite backend, which
//! already serializes all writes through a single `tokio::Mutex`-guarded
//! connection (`infra/src/db/sqlite.rs`'s `CLIENT_RW`) — this generalizes
//! that single implicit lock into the three named locks the spec
//! requires. `LockGuard` releases on drop, so the envelope's exit point
//! (end of scope, early return, or panic unwind) is always also the
//! lock's release point.

use std::{collections::HashMap, sync::Arc};

use tokio::sync::{Mutex, OwnedMutexGuard};

use super::LockName;
use crate::errors::Result;

#[derive(Default)]
pub struct InProcessLockManager {
    locks: std::sync::Mutex<HashMap<LockName, Arc<Mutex<()>>>>,
}

/// Held for the lifetime of one mutator operation; dropping it releases
/// the lock, matching "always release locks" from spec.md §4.2 even on
/// an early return or panic unwind.
pub struct LockGuard {
    _guard: OwnedMutexGuard<()>,
}

impl InProcessLockManager {
    pub fn new() -> Self {
        Self::default()
    }

    fn handle_for(&self, lock_name: LockName) -> Arc<Mutex<()>> {
        self.locks
            .lock()
            .unwrap()
            .entry(lock_name)
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    /// Blocks until held (spec.md §4.1 `obtain`).
    pub async fn obtain(&self, lock_name: LockName) -> Result<LockGuard> {
        let handle = self.handle_for(lock_name);
        let guard = handle.lock_owned().await;
        Ok(LockGuard { _guard: guard })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn second_obtain_waits_for_first_release() {
        let mgr = Arc::new(InProcessLockManager::new());
        let g1 = mgr.obtain(LockName::TriggerAccess).await.unwrap();

        let mgr2 = mgr.clone();
        let waiter = tokio::spawn(async move {
            let _g = mgr2.obtain(LockName::TriggerAccess).await.unwrap();
        });

        tokio::task::yield_now().await;
        assert!(!waiter.is_finished());
        drop(g1);
        waiter.await.unwrap();
    }
}
