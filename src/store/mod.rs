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

//! The `JobStore` trait is the upstream contract from spec.md §6: every
//! public operation a scheduler thread calls into. Grounded on the
//! teacher's `scheduler::Scheduler` trait shape (`infra/src/scheduler/mod.rs`):
//! a `Sync + Send + 'static` async trait, one struct per backend, selected
//! at startup by `connect()`.

pub mod postgres;
pub mod sqlite;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::{
    config::{Backend, StoreConfig},
    errors::Result,
    model::{Calendar, CompletionCode, Job, JobKey, SchedulerStateRecord, Trigger, TriggerKey, TriggerState},
};

/// Returned by `trigger_fired` (spec.md §4.4). `None` means the trigger
/// raced with a pause/delete between acquisition and firing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FiredBundle {
    pub job: Job,
    pub trigger: Trigger,
    pub scheduled_fire_time: i64,
    pub prev_fire_time: Option<i64>,
    pub next_fire_time: Option<i64>,
    pub is_recovering: bool,
}

#[async_trait]
pub trait JobStore: Sync + Send + 'static {
    // ---- setup (spec.md §6 "Setup") ----
    async fn create_schema(&self) -> Result<()>;
    /// Startup recovery (spec.md §4.6), run once by `scheduler_started`.
    async fn recover_jobs(&self, instance_id: &str) -> Result<()>;

    // ---- job/trigger CRUD ----
    async fn store_job(&self, job: Job, replace: bool) -> Result<()>;
    async fn store_trigger(&self, trigger: Trigger, replace: bool) -> Result<()>;
    async fn store_job_and_trigger(&self, job: Job, trigger: Trigger) -> Result<()>;
    async fn remove_job(&self, key: &JobKey) -> Result<bool>;
    async fn remove_trigger(&self, key: &TriggerKey) -> Result<bool>;
    async fn replace_trigger(&self, key: &TriggerKey, new_trigger: Trigger) -> Result<bool>;
    async fn retrieve_job(&self, key: &JobKey) -> Result<Option<Job>>;
    async fn retrieve_trigger(&self, key: &TriggerKey) -> Result<Option<Trigger>>;

    // ---- calendars ----
    async fn store_calendar(&self, calendar: Calendar, replace: bool, update_triggers: bool) -> Result<()>;
    async fn remove_calendar(&self, name: &str) -> Result<bool>;
    async fn retrieve_calendar(&self, name: &str) -> Result<Option<Calendar>>;

    // ---- introspection ----
    async fn job_group_names(&self) -> Result<Vec<String>>;
    async fn trigger_group_names(&self) -> Result<Vec<String>>;
    async fn triggers_for_job(&self, job_key: &JobKey) -> Result<Vec<Trigger>>;
    async fn trigger_state(&self, key: &TriggerKey) -> Result<Option<TriggerState>>;
    async fn paused_trigger_groups(&self) -> Result<Vec<String>>;

    // ---- pause/resume ----
    async fn pause_trigger(&self, key: &TriggerKey) -> Result<()>;
    async fn resume_trigger(&self, key: &TriggerKey) -> Result<()>;
    async fn pause_trigger_group(&self, group: &str) -> Result<()>;
    async fn resume_trigger_group(&self, group: &str) -> Result<()>;
    async fn pause_job(&self, key: &JobKey) -> Result<()>;
    async fn resume_job(&self, key: &JobKey) -> Result<()>;
    async fn pause_job_group(&self, group: &str) -> Result<()>;
    async fn resume_job_group(&self, group: &str) -> Result<()>;
    async fn pause_all(&self) -> Result<()>;
    async fn resume_all(&self) -> Result<()>;

    // ---- firing (spec.md §4.4) ----
    async fn acquire_next_trigger(
        &self,
        instance_id: &str,
        now: i64,
        time_window_ms: i64,
    ) -> Result<Option<Trigger>>;
    async fn release_acquired_trigger(&self, instance_id: &str, key: &TriggerKey) -> Result<()>;
    async fn trigger_fired(&self, instance_id: &str, key: &TriggerKey) -> Result<Option<FiredBundle>>;
    async fn triggered_job_complete(
        &self,
        instance_id: &str,
        trigger_key: &TriggerKey,
        job_key: &JobKey,
        code: CompletionCode,
    ) -> Result<()>;

    /// Misfire recovery pass (spec.md §4.4). Returns `more_to_do = true`
    /// when the batch was full.
    async fn recover_misfired_jobs(&self, now: i64) -> Result<bool>;

    // ---- cluster coordination (spec.md §4.5) ----
    async fn list_scheduler_states(&self) -> Result<Vec<SchedulerStateRecord>>;
    async fn checkin(&self, instance_id: &str, now: i64, checkin_interval: i64) -> Result<()>;
    async fn delete_scheduler_state(&self, instance_id: &str) -> Result<()>;
    /// Resets every trigger this instance had ACQUIRED/BLOCKED back to
    /// WAITING/PAUSED, synthesizes recovery triggers where requested, and
    /// deletes the instance's fired-trigger records. Shared by both
    /// startup recovery (§4.6) and cluster failover (§4.5).
    async fn recover_instance(&self, instance_id: &str) -> Result<()>;

    /// Deletes every volatile job, trigger, and calendar (spec.md §4.6
    /// "any volatile jobs/triggers/calendars").
    async fn purge_volatile(&self) -> Result<()>;

    async fn shutdown(&self) -> Result<()>;
}

/// Mirrors the teacher's `scheduler::connect()` + `Lazy<Box<dyn
/// Scheduler>>` pattern (`infra/src/scheduler/mod.rs`).
pub async fn connect(config: &StoreConfig) -> Result<Box<dyn JobStore>> {
    let store: Box<dyn JobStore> = match config.backend() {
        Backend::Postgres => Box::new(postgres::PostgresStore::connect(config).await?),
        Backend::Sqlite => Box::new(sqlite::SqliteStore::connect(config).await?),
    };
    store.create_schema().await?;
    Ok(store)
}
