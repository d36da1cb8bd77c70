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

//! Startup recovery (spec.md §4.6). Grounded on the teacher's
//! `scheduler::postgres::PostgresScheduler::watch_timeout` in spirit
//! (reclaim work a prior run of this same process left dangling) but
//! triggered once at start rather than on an interval.

use crate::{engine, errors::Result, store::JobStore};

/// Run once by `store::connect` after schema creation, under the same
/// `instance_id` the caller will use for `acquire_next_trigger`.
pub async fn recover_jobs(store: &dyn JobStore, instance_id: &str) -> Result<()> {
    store.recover_instance(instance_id).await?;
    store.purge_volatile().await?;

    // One pass only — draining the full misfire batch across multiple
    // passes is the scheduling thread's job, not startup recovery's.
    store.recover_misfired_jobs(engine::now_micros()).await?;
    Ok(())
}
