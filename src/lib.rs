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

//! Persistent, clustered transactional store for a time-based job
//! scheduler: jobs, triggers, calendars, and the state machine that
//! coordinates firing across scheduler peers sharing one database.

pub mod cluster;
pub mod config;
pub mod engine;
pub mod errors;
pub mod lock;
pub mod model;
pub mod recovery;
pub mod store;

pub use errors::{Error, ErrorCode, Result};
pub use model::{Calendar, CompletionCode, Job, JobKey, Trigger, TriggerKey, TriggerState, TriggerVariant};
pub use store::{connect, FiredBundle, JobStore};

/// Connects, creates the schema if needed, and runs startup recovery for
/// `config.resolved_instance_id()` (spec.md §4.6). The returned instance
/// id is the one every subsequent `JobStore` call should use.
pub async fn init(config: &config::StoreConfig) -> Result<(Box<dyn JobStore>, String)> {
    let store = connect(config).await?;
    let instance_id = config.resolved_instance_id();
    store.recover_jobs(&instance_id).await?;
    log::info!("jobstore ready: instance_id={instance_id} backend={:?}", config.backend());
    Ok((store, instance_id))
}
