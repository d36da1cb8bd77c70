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

//! SQLite backend: realisation 2 of the Lock Manager (in-process mutex,
//! spec.md §4.1). Grounded on the teacher's `scheduler::sqlite::SqliteScheduler`
//! (`infra/src/scheduler/sqlite.rs`), whose `CLIENT_RW: Arc<Mutex<SqlitePool>>`
//! serializes every write behind one mutex and a `CLIENT_RO` pool serves
//! reads. The named-lock manager from `lock::mutex` rides on top of that
//! same mutex to give the three spec locks distinct identities rather than
//! one big implicit one.

use std::sync::Arc;

use async_trait::async_trait;
use sqlx::{
    sqlite::{SqliteConnectOptions, SqlitePoolOptions},
    Row, Sqlite, SqlitePool, Transaction,
};
use tokio::sync::Mutex;
use uuid::Uuid;

use super::{FiredBundle, JobStore};
use crate::{
    config::StoreConfig,
    engine::{self, MisfireOutcome},
    errors::{DbError, Error, Result},
    lock::{mutex::InProcessLockManager, LockName},
    model::{
        Calendar, CompletionCode, Job, JobKey, MisfireInstruction, SchedulerStateRecord, Trigger,
        TriggerKey, TriggerState, TriggerVariant,
    },
};

pub struct SqliteStore {
    write: Arc<Mutex<SqlitePool>>,
    read: SqlitePool,
    locks: InProcessLockManager,
}

#[derive(sqlx::FromRow)]
struct JobRow {
    job_group: String,
    job_name: String,
    job_class: String,
    description: Option<String>,
    is_durable: bool,
    is_stateful: bool,
    requests_recovery: bool,
    is_volatile: bool,
    job_data: String,
}

impl TryFrom<JobRow> for Job {
    type Error = Error;
    fn try_from(r: JobRow) -> Result<Job> {
        Ok(Job {
            key: JobKey::new(r.job_group, r.job_name),
            job_class: r.job_class,
            description: r.description,
            durable: r.is_durable,
            stateful: r.is_stateful,
            requests_recovery: r.requests_recovery,
            volatile: r.is_volatile,
            job_data: serde_json::from_str(&r.job_data)?,
        })
    }
}

#[derive(sqlx::FromRow)]
struct TriggerRow {
    trigger_group: String,
    trigger_name: String,
    job_group: String,
    job_name: String,
    calendar_name: Option<String>,
    next_fire_time: Option<i64>,
    prev_fire_time: Option<i64>,
    priority: i32,
    misfire_instruction: MisfireInstruction,
    trigger_state: TriggerState,
    is_volatile: bool,
    variant_json: String,
}

impl TryFrom<TriggerRow> for Trigger {
    type Error = Error;
    fn try_from(r: TriggerRow) -> Result<Trigger> {
        Ok(Trigger {
            key: TriggerKey::new(r.trigger_group, r.trigger_name),
            job_key: JobKey::new(r.job_group, r.job_name),
            calendar_name: r.calendar_name,
            next_fire_time: r.next_fire_time,
            prev_fire_time: r.prev_fire_time,
            priority: r.priority,
            misfire_instruction: r.misfire_instruction,
            state: r.trigger_state,
            volatile: r.is_volatile,
            variant: serde_json::from_str::<TriggerVariant>(&r.variant_json)?,
        })
    }
}

#[derive(sqlx::FromRow)]
struct CalendarRow {
    calendar_name: String,
    description: Option<String>,
    is_volatile: bool,
    data_json: String,
}

impl TryFrom<CalendarRow> for Calendar {
    type Error = Error;
    fn try_from(r: CalendarRow) -> Result<Calendar> {
        let mut cal: Calendar = serde_json::from_str(&r.data_json)?;
        cal.name = r.calendar_name;
        cal.description = r.description;
        cal.volatile = r.is_volatile;
        Ok(cal)
    }
}

#[derive(sqlx::FromRow)]
struct FiredTriggerRow {
    entry_id: String,
    instance_id: String,
    trigger_group: String,
    trigger_name: String,
    job_group: String,
    job_name: String,
    state: TriggerState,
    is_stateful: bool,
    requests_recovery: bool,
    fire_time: i64,
    priority: i32,
}

impl From<FiredTriggerRow> for crate::model::FiredTrigger {
    fn from(r: FiredTriggerRow) -> Self {
        crate::model::FiredTrigger {
            entry_id: r.entry_id,
            instance_id: r.instance_id,
            trigger_key: TriggerKey::new(r.trigger_group, r.trigger_name),
            job_key: JobKey::new(r.job_group, r.job_name),
            state: r.state,
            is_stateful: r.is_stateful,
            requests_recovery: r.requests_recovery,
            fire_time: r.fire_time,
            priority: r.priority,
        }
    }
}

impl SqliteStore {
    pub async fn connect(config: &StoreConfig) -> Result<Self> {
        // `shared_cache` lets the read pool's connections see the write
        // pool's in-memory database; without it every new connection to
        // `sqlite::memory:` gets its own empty database.
        let options: SqliteConnectOptions = config
            .db_url
            .parse::<SqliteConnectOptions>()?
            .create_if_missing(true)
            .shared_cache(true);
        let write = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options.clone())
            .await?;
        let read = SqlitePoolOptions::new().connect_with(options).await?;
        Ok(Self {
            write: Arc::new(Mutex::new(write)),
            read,
            locks: InProcessLockManager::new(),
        })
    }

    async fn fetch_job(tx: &mut Transaction<'_, Sqlite>, key: &JobKey) -> Result<Option<Job>> {
        let row = sqlx::query_as::<_, JobRow>(
            "SELECT job_group, job_name, job_class, description, is_durable, is_stateful, \
             requests_recovery, is_volatile, job_data FROM job_details \
             WHERE job_group = ? AND job_name = ?",
        )
        .bind(&key.group)
        .bind(&key.name)
        .fetch_optional(&mut **tx)
        .await?;
        row.map(Job::try_from).transpose()
    }

    async fn fetch_trigger(tx: &mut Transaction<'_, Sqlite>, key: &TriggerKey) -> Result<Option<Trigger>> {
        let row = sqlx::query_as::<_, TriggerRow>(
            "SELECT trigger_group, trigger_name, job_group, job_name, calendar_name, \
             next_fire_time, prev_fire_time, priority, misfire_instruction, trigger_state, \
             is_volatile, variant_json FROM triggers WHERE trigger_group = ? AND trigger_name = ?",
        )
        .bind(&key.group)
        .bind(&key.name)
        .fetch_optional(&mut **tx)
        .await?;
        row.map(Trigger::try_from).transpose()
    }

    async fn fetch_calendar(tx: &mut Transaction<'_, Sqlite>, name: &str) -> Result<Option<Calendar>> {
        let row = sqlx::query_as::<_, CalendarRow>(
            "SELECT calendar_name, description, is_volatile, data_json FROM calendars WHERE calendar_name = ?",
        )
        .bind(name)
        .fetch_optional(&mut **tx)
        .await?;
        row.map(Calendar::try_from).transpose()
    }

    async fn is_group_paused(tx: &mut Transaction<'_, Sqlite>, group: &str) -> Result<bool> {
        let row = sqlx::query("SELECT 1 FROM paused_trigger_grps WHERE trigger_group = ?")
            .bind(group)
            .fetch_optional(&mut **tx)
            .await?;
        Ok(row.is_some())
    }

    async fn upsert_trigger(tx: &mut Transaction<'_, Sqlite>, t: &Trigger) -> Result<()> {
        let variant_json = serde_json::to_string(&t.variant)?;
        sqlx::query(
            "INSERT INTO triggers (trigger_group, trigger_name, job_group, job_name, \
             calendar_name, next_fire_time, prev_fire_time, priority, misfire_instruction, \
             trigger_state, is_volatile, variant_json) VALUES (?,?,?,?,?,?,?,?,?,?,?,?) \
             ON CONFLICT (trigger_group, trigger_name) DO UPDATE SET \
             job_group = excluded.job_group, job_name = excluded.job_name, \
             calendar_name = excluded.calendar_name, next_fire_time = excluded.next_fire_time, \
             prev_fire_time = excluded.prev_fire_time, priority = excluded.priority, \
             misfire_instruction = excluded.misfire_instruction, \
             trigger_state = excluded.trigger_state, is_volatile = excluded.is_volatile, \
             variant_json = excluded.variant_json",
        )
        .bind(&t.key.group)
        .bind(&t.key.name)
        .bind(&t.job_key.group)
        .bind(&t.job_key.name)
        .bind(&t.calendar_name)
        .bind(t.next_fire_time)
        .bind(t.prev_fire_time)
        .bind(t.priority)
        .bind(t.misfire_instruction)
        .bind(t.state)
        .bind(t.volatile)
        .bind(variant_json)
        .execute(&mut **tx)
        .await?;
        Ok(())
    }

    async fn set_trigger_state(tx: &mut Transaction<'_, Sqlite>, key: &TriggerKey, state: TriggerState) -> Result<()> {
        sqlx::query("UPDATE triggers SET trigger_state = ? WHERE trigger_group = ? AND trigger_name = ?")
            .bind(state)
            .bind(&key.group)
            .bind(&key.name)
            .execute(&mut **tx)
            .await?;
        Ok(())
    }

    async fn cas_trigger_state(
        tx: &mut Transaction<'_, Sqlite>,
        key: &TriggerKey,
        from: TriggerState,
        to: TriggerState,
    ) -> Result<bool> {
        let result = sqlx::query(
            "UPDATE triggers SET trigger_state = ? WHERE trigger_group = ? AND trigger_name = ? AND trigger_state = ?",
        )
        .bind(to)
        .bind(&key.group)
        .bind(&key.name)
        .bind(from)
        .execute(&mut **tx)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    async fn delete_job_if_orphaned(tx: &mut Transaction<'_, Sqlite>, job_key: &JobKey) -> Result<()> {
        let job = Self::fetch_job(tx, job_key).await?;
        let Some(job) = job else { return Ok(()) };
        if job.durable {
            return Ok(());
        }
        let row = sqlx::query("SELECT 1 FROM triggers WHERE job_group = ? AND job_name = ? LIMIT 1")
            .bind(&job_key.group)
            .bind(&job_key.name)
            .fetch_optional(&mut **tx)
            .await?;
        if row.is_none() {
            sqlx::query("DELETE FROM job_details WHERE job_group = ? AND job_name = ?")
                .bind(&job_key.group)
                .bind(&job_key.name)
                .execute(&mut **tx)
                .await?;
        }
        Ok(())
    }

    async fn block_sibling_triggers(tx: &mut Transaction<'_, Sqlite>, job_key: &JobKey, except: &TriggerKey) -> Result<()> {
        sqlx::query(
            "UPDATE triggers SET trigger_state = ? WHERE job_group = ? AND job_name = ? \
             AND NOT (trigger_group = ? AND trigger_name = ?) AND trigger_state = ?",
        )
        .bind(TriggerState::Blocked)
        .bind(&job_key.group)
        .bind(&job_key.name)
        .bind(&except.group)
        .bind(&except.name)
        .bind(TriggerState::Waiting)
        .execute(&mut **tx)
        .await?;
        sqlx::query(
            "UPDATE triggers SET trigger_state = ? WHERE job_group = ? AND job_name = ? \
             AND NOT (trigger_group = ? AND trigger_name = ?) AND trigger_state = ?",
        )
        .bind(TriggerState::PausedBlocked)
        .bind(&job_key.group)
        .bind(&job_key.name)
        .bind(&except.group)
        .bind(&except.name)
        .bind(TriggerState::Paused)
        .execute(&mut **tx)
        .await?;
        Ok(())
    }

    async fn unblock_sibling_triggers(tx: &mut Transaction<'_, Sqlite>, job_key: &JobKey) -> Result<()> {
        sqlx::query("UPDATE triggers SET trigger_state = ? WHERE job_group = ? AND job_name = ? AND trigger_state = ?")
            .bind(TriggerState::Waiting)
            .bind(&job_key.group)
            .bind(&job_key.name)
            .bind(TriggerState::Blocked)
            .execute(&mut **tx)
            .await?;
        sqlx::query("UPDATE triggers SET trigger_state = ? WHERE job_group = ? AND job_name = ? AND trigger_state = ?")
            .bind(TriggerState::Paused)
            .bind(&job_key.group)
            .bind(&job_key.name)
            .bind(TriggerState::PausedBlocked)
            .execute(&mut **tx)
            .await?;
        Ok(())
    }
}

#[async_trait]
impl JobStore for SqliteStore {
    async fn create_schema(&self) -> Result<()> {
        let client = self.write.lock().await;
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS job_details (
                job_group TEXT NOT NULL,
                job_name TEXT NOT NULL,
                job_class TEXT NOT NULL,
                description TEXT,
                is_durable BOOLEAN NOT NULL DEFAULT 0,
                is_stateful BOOLEAN NOT NULL DEFAULT 0,
                requests_recovery BOOLEAN NOT NULL DEFAULT 0,
                is_volatile BOOLEAN NOT NULL DEFAULT 0,
                job_data TEXT NOT NULL DEFAULT '{}',
                PRIMARY KEY (job_group, job_name)
            )",
        )
        .execute(&*client)
        .await?;
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS triggers (
                trigger_group TEXT NOT NULL,
                trigger_name TEXT NOT NULL,
                job_group TEXT NOT NULL,
                job_name TEXT NOT NULL,
                calendar_name TEXT,
                next_fire_time BIGINT,
                prev_fire_time BIGINT,
                priority INT NOT NULL DEFAULT 5,
                misfire_instruction INT NOT NULL DEFAULT 0,
                trigger_state INT NOT NULL DEFAULT 0,
                is_volatile BOOLEAN NOT NULL DEFAULT 0,
                variant_json TEXT NOT NULL,
                PRIMARY KEY (trigger_group, trigger_name)
            )",
        )
        .execute(&*client)
        .await?;
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS calendars (
                calendar_name TEXT PRIMARY KEY,
                description TEXT,
                is_volatile BOOLEAN NOT NULL DEFAULT 0,
                data_json TEXT NOT NULL
            )",
        )
        .execute(&*client)
        .await?;
        sqlx::query("CREATE TABLE IF NOT EXISTS paused_trigger_grps (trigger_group TEXT PRIMARY KEY)")
            .execute(&*client)
            .await?;
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS fired_triggers (
                entry_id TEXT PRIMARY KEY,
                instance_id TEXT NOT NULL,
                trigger_group TEXT NOT NULL,
                trigger_name TEXT NOT NULL,
                job_group TEXT NOT NULL,
                job_name TEXT NOT NULL,
                state INT NOT NULL,
                is_stateful BOOLEAN NOT NULL,
                requests_recovery BOOLEAN NOT NULL,
                fire_time BIGINT NOT NULL,
                priority INT NOT NULL
            )",
        )
        .execute(&*client)
        .await?;
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS scheduler_state (
                instance_id TEXT PRIMARY KEY,
                last_checkin_time BIGINT NOT NULL,
                checkin_interval BIGINT NOT NULL
            )",
        )
        .execute(&*client)
        .await?;
        Ok(())
    }

    async fn recover_jobs(&self, instance_id: &str) -> Result<()> {
        crate::recovery::recover_jobs(self, instance_id).await
    }

    async fn store_job(&self, job: Job, replace: bool) -> Result<()> {
        let _guard = if crate::config::CONFIG.lock_on_insert || replace {
            Some(self.locks.obtain(LockName::TriggerAccess).await?)
        } else {
            None
        };
        let client = self.write.lock().await;
        let mut tx = client.begin().await?;
        if !replace {
            let existing = Self::fetch_job(&mut tx, &job.key).await?;
            if existing.is_some() {
                tx.rollback().await.ok();
                return Err(Error::DbError(DbError::ObjectAlreadyExists(job.key.to_string())));
            }
        }
        let job_data = serde_json::to_string(&job.job_data)?;
        sqlx::query(
            "INSERT INTO job_details (job_group, job_name, job_class, description, is_durable, \
             is_stateful, requests_recovery, is_volatile, job_data) VALUES (?,?,?,?,?,?,?,?,?) \
             ON CONFLICT (job_group, job_name) DO UPDATE SET job_class = excluded.job_class, \
             description = excluded.description, is_durable = excluded.is_durable, \
             is_stateful = excluded.is_stateful, requests_recovery = excluded.requests_recovery, \
             is_volatile = excluded.is_volatile, job_data = excluded.job_data",
        )
        .bind(&job.key.group)
        .bind(&job.key.name)
        .bind(&job.job_class)
        .bind(&job.description)
        .bind(job.durable)
        .bind(job.stateful)
        .bind(job.requests_recovery)
        .bind(job.volatile)
        .bind(job_data)
        .execute(&mut *tx)
        .await?;
        tx.commit().await?;
        Ok(())
    }

    async fn store_trigger(&self, mut trigger: Trigger, replace: bool) -> Result<()> {
        let _guard = if crate::config::CONFIG.lock_on_insert || replace {
            Some(self.locks.obtain(LockName::TriggerAccess).await?)
        } else {
            None
        };
        let client = self.write.lock().await;
        let mut tx = client.begin().await?;
        if !replace && Self::fetch_trigger(&mut tx, &trigger.key).await?.is_some() {
            tx.rollback().await.ok();
            return Err(Error::DbError(DbError::ObjectAlreadyExists(trigger.key.to_string())));
        }
        let job = Self::fetch_job(&mut tx, &trigger.job_key).await?;
        let Some(job) = job else {
            tx.rollback().await.ok();
            return Err(Error::DbError(DbError::JobDoesNotExist(trigger.job_key.to_string())));
        };
        if job.volatile && !trigger.volatile {
            tx.rollback().await.ok();
            return Err(Error::DbError(DbError::ClientError(format!(
                "volatile job {} may only have volatile triggers",
                job.key
            ))));
        }
        if let Some(cal_name) = &trigger.calendar_name {
            if Self::fetch_calendar(&mut tx, cal_name).await?.is_none() {
                tx.rollback().await.ok();
                return Err(Error::DbError(DbError::CalendarDoesNotExist(cal_name.clone())));
            }
        }
        let group_paused = Self::is_group_paused(&mut tx, &trigger.key.group).await?;
        let executing = if job.stateful {
            sqlx::query(
                "SELECT 1 FROM triggers WHERE job_group = ? AND job_name = ? AND trigger_state = ? LIMIT 1",
            )
            .bind(&job.key.group)
            .bind(&job.key.name)
            .bind(TriggerState::Executing)
            .fetch_optional(&mut *tx)
            .await?
            .is_some()
        } else {
            false
        };
        trigger.state = match (group_paused, executing) {
            (true, true) => TriggerState::PausedBlocked,
            (true, false) => TriggerState::Paused,
            (false, true) => TriggerState::Blocked,
            (false, false) => TriggerState::Waiting,
        };
        Self::upsert_trigger(&mut tx, &trigger).await?;
        tx.commit().await?;
        Ok(())
    }

    async fn store_job_and_trigger(&self, job: Job, trigger: Trigger) -> Result<()> {
        if job.volatile && !trigger.volatile {
            return Err(Error::DbError(DbError::ClientError(format!(
                "volatile job {} may only have volatile triggers",
                job.key
            ))));
        }
        self.store_job(job, true).await?;
        self.store_trigger(trigger, true).await
    }

    async fn remove_job(&self, key: &JobKey) -> Result<bool> {
        let _guard = self.locks.obtain(LockName::TriggerAccess).await?;
        let client = self.write.lock().await;
        let mut tx = client.begin().await?;
        sqlx::query("DELETE FROM triggers WHERE job_group = ? AND job_name = ?")
            .bind(&key.group)
            .bind(&key.name)
            .execute(&mut *tx)
            .await?;
        let result = sqlx::query("DELETE FROM job_details WHERE job_group = ? AND job_name = ?")
            .bind(&key.group)
            .bind(&key.name)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        Ok(result.rows_affected() > 0)
    }

    async fn remove_trigger(&self, key: &TriggerKey) -> Result<bool> {
        let _guard = self.locks.obtain(LockName::TriggerAccess).await?;
        let client = self.write.lock().await;
        let mut tx = client.begin().await?;
        let Some(trigger) = Self::fetch_trigger(&mut tx, key).await? else {
            tx.rollback().await.ok();
            return Ok(false);
        };
        sqlx::query("DELETE FROM triggers WHERE trigger_group = ? AND trigger_name = ?")
            .bind(&key.group)
            .bind(&key.name)
            .execute(&mut *tx)
            .await?;
        Self::delete_job_if_orphaned(&mut tx, &trigger.job_key).await?;
        tx.commit().await?;
        Ok(true)
    }

    async fn replace_trigger(&self, key: &TriggerKey, mut new_trigger: Trigger) -> Result<bool> {
        let _guard = self.locks.obtain(LockName::TriggerAccess).await?;
        let client = self.write.lock().await;
        let mut tx = client.begin().await?;
        let Some(old) = Self::fetch_trigger(&mut tx, key).await? else {
            tx.rollback().await.ok();
            return Ok(false);
        };
        new_trigger.job_key = old.job_key;
        if new_trigger.key != *key {
            sqlx::query("DELETE FROM triggers WHERE trigger_group = ? AND trigger_name = ?")
                .bind(&key.group)
                .bind(&key.name)
                .execute(&mut *tx)
                .await?;
        }
        Self::upsert_trigger(&mut tx, &new_trigger).await?;
        tx.commit().await?;
        Ok(true)
    }

    async fn retrieve_job(&self, key: &JobKey) -> Result<Option<Job>> {
        let row = sqlx::query_as::<_, JobRow>(
            "SELECT job_group, job_name, job_class, description, is_durable, is_stateful, \
             requests_recovery, is_volatile, job_data FROM job_details \
             WHERE job_group = ? AND job_name = ?",
        )
        .bind(&key.group)
        .bind(&key.name)
        .fetch_optional(&self.read)
        .await?;
        row.map(Job::try_from).transpose()
    }

    async fn retrieve_trigger(&self, key: &TriggerKey) -> Result<Option<Trigger>> {
        let row = sqlx::query_as::<_, TriggerRow>(
            "SELECT trigger_group, trigger_name, job_group, job_name, calendar_name, \
             next_fire_time, prev_fire_time, priority, misfire_instruction, trigger_state, \
             is_volatile, variant_json FROM triggers WHERE trigger_group = ? AND trigger_name = ?",
        )
        .bind(&key.group)
        .bind(&key.name)
        .fetch_optional(&self.read)
        .await?;
        row.map(Trigger::try_from).transpose()
    }

    async fn store_calendar(&self, calendar: Calendar, replace: bool, update_triggers: bool) -> Result<()> {
        let _guard = if crate::config::CONFIG.lock_on_insert || replace {
            Some(self.locks.obtain(LockName::TriggerAccess).await?)
        } else {
            None
        };
        let client = self.write.lock().await;
        let mut tx = client.begin().await?;
        if !replace && Self::fetch_calendar(&mut tx, &calendar.name).await?.is_some() {
            tx.rollback().await.ok();
            return Err(Error::DbError(DbError::ObjectAlreadyExists(calendar.name.clone())));
        }
        let data_json = serde_json::to_string(&calendar)?;
        sqlx::query(
            "INSERT INTO calendars (calendar_name, description, is_volatile, data_json) VALUES (?,?,?,?) \
             ON CONFLICT (calendar_name) DO UPDATE SET description = excluded.description, \
             is_volatile = excluded.is_volatile, data_json = excluded.data_json",
        )
        .bind(&calendar.name)
        .bind(&calendar.description)
        .bind(calendar.volatile)
        .bind(data_json)
        .execute(&mut *tx)
        .await?;
        if update_triggers {
            let rows = sqlx::query_as::<_, TriggerRow>(
                "SELECT trigger_group, trigger_name, job_group, job_name, calendar_name, \
                 next_fire_time, prev_fire_time, priority, misfire_instruction, trigger_state, \
                 is_volatile, variant_json FROM triggers WHERE calendar_name = ?",
            )
            .bind(&calendar.name)
            .fetch_all(&mut *tx)
            .await?;
            for row in rows {
                let trigger = Trigger::try_from(row)?;
                if let Some(next) = trigger.next_fire_time {
                    let recomputed = engine::compute_next_fire_time(&trigger, next - 1, Some(&calendar));
                    sqlx::query("UPDATE triggers SET next_fire_time = ? WHERE trigger_group = ? AND trigger_name = ?")
                        .bind(recomputed)
                        .bind(&trigger.key.group)
                        .bind(&trigger.key.name)
                        .execute(&mut *tx)
                        .await?;
                }
            }
        }
        tx.commit().await?;
        Ok(())
    }

    async fn remove_calendar(&self, name: &str) -> Result<bool> {
        let _guard = self.locks.obtain(LockName::CalendarAccess).await?;
        let client = self.write.lock().await;
        let mut tx = client.begin().await?;
        let in_use = sqlx::query("SELECT 1 FROM triggers WHERE calendar_name = ? LIMIT 1")
            .bind(name)
            .fetch_optional(&mut *tx)
            .await?;
        if in_use.is_some() {
            tx.rollback().await.ok();
            return Err(Error::DbError(DbError::CalendarInUse(name.to_string())));
        }
        let result = sqlx::query("DELETE FROM calendars WHERE calendar_name = ?")
            .bind(name)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        Ok(result.rows_affected() > 0)
    }

    async fn retrieve_calendar(&self, name: &str) -> Result<Option<Calendar>> {
        let row = sqlx::query_as::<_, CalendarRow>(
            "SELECT calendar_name, description, is_volatile, data_json FROM calendars WHERE calendar_name = ?",
        )
        .bind(name)
        .fetch_optional(&self.read)
        .await?;
        row.map(Calendar::try_from).transpose()
    }

    async fn job_group_names(&self) -> Result<Vec<String>> {
        let rows = sqlx::query("SELECT DISTINCT job_group FROM job_details ORDER BY job_group")
            .fetch_all(&self.read)
            .await?;
        Ok(rows.iter().map(|r| r.get("job_group")).collect())
    }

    async fn trigger_group_names(&self) -> Result<Vec<String>> {
        let rows = sqlx::query("SELECT DISTINCT trigger_group FROM triggers ORDER BY trigger_group")
            .fetch_all(&self.read)
            .await?;
        Ok(rows.iter().map(|r| r.get("trigger_group")).collect())
    }

    async fn triggers_for_job(&self, job_key: &JobKey) -> Result<Vec<Trigger>> {
        let rows = sqlx::query_as::<_, TriggerRow>(
            "SELECT trigger_group, trigger_name, job_group, job_name, calendar_name, \
             next_fire_time, prev_fire_time, priority, misfire_instruction, trigger_state, \
             is_volatile, variant_json FROM triggers WHERE job_group = ? AND job_name = ?",
        )
        .bind(&job_key.group)
        .bind(&job_key.name)
        .fetch_all(&self.read)
        .await?;
        rows.into_iter().map(Trigger::try_from).collect()
    }

    async fn trigger_state(&self, key: &TriggerKey) -> Result<Option<TriggerState>> {
        Ok(self.retrieve_trigger(key).await?.map(|t| t.state))
    }

    async fn paused_trigger_groups(&self) -> Result<Vec<String>> {
        let rows = sqlx::query("SELECT trigger_group FROM paused_trigger_grps ORDER BY trigger_group")
            .fetch_all(&self.read)
            .await?;
        Ok(rows.iter().map(|r| r.get("trigger_group")).collect())
    }

    async fn pause_trigger(&self, key: &TriggerKey) -> Result<()> {
        let _guard = self.locks.obtain(LockName::TriggerAccess).await?;
        let client = self.write.lock().await;
        let mut tx = client.begin().await?;
        Self::cas_trigger_state(&mut tx, key, TriggerState::Waiting, TriggerState::Paused).await?;
        Self::cas_trigger_state(&mut tx, key, TriggerState::Blocked, TriggerState::PausedBlocked).await?;
        tx.commit().await?;
        Ok(())
    }

    async fn resume_trigger(&self, key: &TriggerKey) -> Result<()> {
        let _guard = self.locks.obtain(LockName::TriggerAccess).await?;
        let client = self.write.lock().await;
        let mut tx = client.begin().await?;
        Self::cas_trigger_state(&mut tx, key, TriggerState::Paused, TriggerState::Waiting).await?;
        Self::cas_trigger_state(&mut tx, key, TriggerState::PausedBlocked, TriggerState::Blocked).await?;
        if let Some(trigger) = Self::fetch_trigger(&mut tx, key).await? {
            if let Some(next) = trigger.next_fire_time {
                let now = engine::now_micros();
                let threshold = crate::config::CONFIG.misfire_threshold_ms;
                if trigger.state == TriggerState::Waiting && engine::is_misfired(next, now, threshold) {
                    let calendar = match &trigger.calendar_name {
                        Some(name) => Self::fetch_calendar(&mut tx, name).await?,
                        None => None,
                    };
                    apply_and_persist_misfire(&mut tx, &trigger, now, calendar.as_ref()).await?;
                }
            }
        }
        tx.commit().await?;
        Ok(())
    }

    async fn pause_trigger_group(&self, group: &str) -> Result<()> {
        let _guard = self.locks.obtain(LockName::TriggerAccess).await?;
        let client = self.write.lock().await;
        let mut tx = client.begin().await?;
        sqlx::query("INSERT INTO paused_trigger_grps (trigger_group) VALUES (?) ON CONFLICT DO NOTHING")
            .bind(group)
            .execute(&mut *tx)
            .await?;
        sqlx::query("UPDATE triggers SET trigger_state = ? WHERE trigger_group = ? AND trigger_state = ?")
            .bind(TriggerState::Paused)
            .bind(group)
            .bind(TriggerState::Waiting)
            .execute(&mut *tx)
            .await?;
        sqlx::query("UPDATE triggers SET trigger_state = ? WHERE trigger_group = ? AND trigger_state = ?")
            .bind(TriggerState::PausedBlocked)
            .bind(group)
            .bind(TriggerState::Blocked)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        Ok(())
    }

    async fn resume_trigger_group(&self, group: &str) -> Result<()> {
        let _guard = self.locks.obtain(LockName::TriggerAccess).await?;
        let client = self.write.lock().await;
        let mut tx = client.begin().await?;
        sqlx::query("DELETE FROM paused_trigger_grps WHERE trigger_group = ?")
            .bind(group)
            .execute(&mut *tx)
            .await?;
        sqlx::query("UPDATE triggers SET trigger_state = ? WHERE trigger_group = ? AND trigger_state = ?")
            .bind(TriggerState::Waiting)
            .bind(group)
            .bind(TriggerState::Paused)
            .execute(&mut *tx)
            .await?;
        sqlx::query("UPDATE triggers SET trigger_state = ? WHERE trigger_group = ? AND trigger_state = ?")
            .bind(TriggerState::Blocked)
            .bind(group)
            .bind(TriggerState::PausedBlocked)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        Ok(())
    }

    async fn pause_job(&self, key: &JobKey) -> Result<()> {
        let _guard = self.locks.obtain(LockName::TriggerAccess).await?;
        let client = self.write.lock().await;
        let mut tx = client.begin().await?;
        let rows = sqlx::query("SELECT trigger_group, trigger_name FROM triggers WHERE job_group = ? AND job_name = ?")
            .bind(&key.group)
            .bind(&key.name)
            .fetch_all(&mut *tx)
            .await?;
        for row in rows {
            let tk = TriggerKey::new(row.get::<String, _>("trigger_group"), row.get::<String, _>("trigger_name"));
            Self::cas_trigger_state(&mut tx, &tk, TriggerState::Waiting, TriggerState::Paused).await?;
            Self::cas_trigger_state(&mut tx, &tk, TriggerState::Blocked, TriggerState::PausedBlocked).await?;
        }
        tx.commit().await?;
        Ok(())
    }

    async fn resume_job(&self, key: &JobKey) -> Result<()> {
        let _guard = self.locks.obtain(LockName::TriggerAccess).await?;
        let client = self.write.lock().await;
        let mut tx = client.begin().await?;
        let rows = sqlx::query("SELECT trigger_group, trigger_name FROM triggers WHERE job_group = ? AND job_name = ?")
            .bind(&key.group)
            .bind(&key.name)
            .fetch_all(&mut *tx)
            .await?;
        for row in rows {
            let tk = TriggerKey::new(row.get::<String, _>("trigger_group"), row.get::<String, _>("trigger_name"));
            Self::cas_trigger_state(&mut tx, &tk, TriggerState::Paused, TriggerState::Waiting).await?;
            Self::cas_trigger_state(&mut tx, &tk, TriggerState::PausedBlocked, TriggerState::Blocked).await?;
        }
        tx.commit().await?;
        Ok(())
    }

    async fn pause_job_group(&self, group: &str) -> Result<()> {
        let _guard = self.locks.obtain(LockName::TriggerAccess).await?;
        let client = self.write.lock().await;
        let mut tx = client.begin().await?;
        let rows = sqlx::query("SELECT trigger_group, trigger_name FROM triggers WHERE job_group = ?")
            .bind(group)
            .fetch_all(&mut *tx)
            .await?;
        for row in rows {
            let tk = TriggerKey::new(row.get::<String, _>("trigger_group"), row.get::<String, _>("trigger_name"));
            Self::cas_trigger_state(&mut tx, &tk, TriggerState::Waiting, TriggerState::Paused).await?;
            Self::cas_trigger_state(&mut tx, &tk, TriggerState::Blocked, TriggerState::PausedBlocked).await?;
        }
        tx.commit().await?;
        Ok(())
    }

    async fn resume_job_group(&self, group: &str) -> Result<()> {
        let _guard = self.locks.obtain(LockName::TriggerAccess).await?;
        let client = self.write.lock().await;
        let mut tx = client.begin().await?;
        let rows = sqlx::query("SELECT trigger_group, trigger_name FROM triggers WHERE job_group = ?")
            .bind(group)
            .fetch_all(&mut *tx)
            .await?;
        for row in rows {
            let tk = TriggerKey::new(row.get::<String, _>("trigger_group"), row.get::<String, _>("trigger_name"));
            Self::cas_trigger_state(&mut tx, &tk, TriggerState::Paused, TriggerState::Waiting).await?;
            Self::cas_trigger_state(&mut tx, &tk, TriggerState::PausedBlocked, TriggerState::Blocked).await?;
        }
        tx.commit().await?;
        Ok(())
    }

    async fn pause_all(&self) -> Result<()> {
        let groups = self.trigger_group_names().await?;
        for group in groups {
            self.pause_trigger_group(&group).await?;
        }
        Ok(())
    }

    async fn resume_all(&self) -> Result<()> {
        let groups = self.paused_trigger_groups().await?;
        for group in groups {
            self.resume_trigger_group(&group).await?;
        }
        Ok(())
    }

    async fn acquire_next_trigger(&self, instance_id: &str, now: i64, time_window_ms: i64) -> Result<Option<Trigger>> {
        let _guard = self.locks.obtain(LockName::TriggerAccess).await?;
        let client = self.write.lock().await;
        let mut tx = client.begin().await?;
        let max_next_fire_time = now + time_window_ms * 1000;
        loop {
            let row = sqlx::query_as::<_, TriggerRow>(
                "SELECT trigger_group, trigger_name, job_group, job_name, calendar_name, \
                 next_fire_time, prev_fire_time, priority, misfire_instruction, trigger_state, \
                 is_volatile, variant_json FROM triggers \
                 WHERE trigger_state = ? AND next_fire_time <= ? \
                 ORDER BY next_fire_time ASC, priority DESC LIMIT 1",
            )
            .bind(TriggerState::Waiting)
            .bind(max_next_fire_time)
            .fetch_optional(&mut *tx)
            .await?;
            let Some(row) = row else {
                tx.commit().await?;
                return Ok(None);
            };
            let trigger = Trigger::try_from(row)?;
            let won = Self::cas_trigger_state(&mut tx, &trigger.key, TriggerState::Waiting, TriggerState::Acquired).await?;
            if !won {
                continue;
            }
            let job = Self::fetch_job(&mut tx, &trigger.job_key)
                .await?
                .ok_or_else(|| Error::DbError(DbError::JobDoesNotExist(trigger.job_key.to_string())))?;
            let entry_id = format!("{}-{}", instance_id, Uuid::new_v4());
            sqlx::query(
                "INSERT INTO fired_triggers (entry_id, instance_id, trigger_group, trigger_name, \
                 job_group, job_name, state, is_stateful, requests_recovery, fire_time, priority) \
                 VALUES (?,?,?,?,?,?,?,?,?,?,?)",
            )
            .bind(&entry_id)
            .bind(instance_id)
            .bind(&trigger.key.group)
            .bind(&trigger.key.name)
            .bind(&trigger.job_key.group)
            .bind(&trigger.job_key.name)
            .bind(TriggerState::Acquired)
            .bind(job.stateful)
            .bind(job.requests_recovery)
            .bind(trigger.next_fire_time.unwrap_or(now))
            .bind(trigger.priority)
            .execute(&mut *tx)
            .await?;
            tx.commit().await?;
            return Ok(Some(trigger));
        }
    }

    async fn release_acquired_trigger(&self, instance_id: &str, key: &TriggerKey) -> Result<()> {
        let _guard = self.locks.obtain(LockName::TriggerAccess).await?;
        let client = self.write.lock().await;
        let mut tx = client.begin().await?;
        Self::cas_trigger_state(&mut tx, key, TriggerState::Acquired, TriggerState::Waiting).await?;
        sqlx::query("DELETE FROM fired_triggers WHERE instance_id = ? AND trigger_group = ? AND trigger_name = ?")
            .bind(instance_id)
            .bind(&key.group)
            .bind(&key.name)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        Ok(())
    }

    async fn trigger_fired(&self, instance_id: &str, key: &TriggerKey) -> Result<Option<FiredBundle>> {
        let _guard = self.locks.obtain(LockName::TriggerAccess).await?;
        let client = self.write.lock().await;
        let mut tx = client.begin().await?;
        let Some(trigger) = Self::fetch_trigger(&mut tx, key).await? else {
            tx.commit().await?;
            return Ok(None);
        };
        if trigger.state != TriggerState::Acquired {
            tx.commit().await?;
            return Ok(None);
        }

        let job_result = Self::fetch_job(&mut tx, &trigger.job_key)
            .await
            .and_then(|j| j.ok_or_else(|| Error::DbError(DbError::JobDoesNotExist(trigger.job_key.to_string()))));

        let calendar = match &trigger.calendar_name {
            Some(name) => Self::fetch_calendar(&mut tx, name).await?,
            None => None,
        };
        let scheduled_fire_time = trigger.next_fire_time.unwrap_or(engine::now_micros());
        let next_fire_time = engine::compute_next_fire_time(&trigger, scheduled_fire_time, calendar.as_ref());

        let mut updated = trigger.clone();
        updated.state = TriggerState::Executing;
        updated.prev_fire_time = Some(scheduled_fire_time);
        updated.next_fire_time = next_fire_time;
        if let TriggerVariant::Simple { times_triggered, .. } = &mut updated.variant {
            *times_triggered += 1;
        }
        Self::upsert_trigger(&mut tx, &updated).await?;

        let is_stateful = job_result.as_ref().map(|j| j.stateful).unwrap_or(false);
        if is_stateful {
            Self::block_sibling_triggers(&mut tx, &trigger.job_key, &trigger.key).await?;
        }
        sqlx::query("UPDATE fired_triggers SET state = ?, is_stateful = ? WHERE instance_id = ? AND trigger_group = ? AND trigger_name = ?")
            .bind(TriggerState::Executing)
            .bind(is_stateful)
            .bind(instance_id)
            .bind(&key.group)
            .bind(&key.name)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        let job = job_result?;
        Ok(Some(FiredBundle {
            job,
            trigger: updated,
            scheduled_fire_time,
            prev_fire_time: trigger.prev_fire_time,
            next_fire_time,
            is_recovering: false,
        }))
    }

    async fn triggered_job_complete(
        &self,
        instance_id: &str,
        trigger_key: &TriggerKey,
        job_key: &JobKey,
        code: CompletionCode,
    ) -> Result<()> {
        let _guard = self.locks.obtain(LockName::TriggerAccess).await?;
        let client = self.write.lock().await;
        let mut tx = client.begin().await?;
        match code {
            CompletionCode::DeleteTrigger => {
                sqlx::query("DELETE FROM triggers WHERE trigger_group = ? AND trigger_name = ?")
                    .bind(&trigger_key.group)
                    .bind(&trigger_key.name)
                    .execute(&mut *tx)
                    .await?;
                Self::delete_job_if_orphaned(&mut tx, job_key).await?;
            }
            CompletionCode::SetComplete => {
                Self::set_trigger_state(&mut tx, trigger_key, TriggerState::Complete).await?;
            }
            CompletionCode::SetError => {
                Self::set_trigger_state(&mut tx, trigger_key, TriggerState::Error).await?;
            }
            CompletionCode::SetAllJobTriggersError => {
                sqlx::query("UPDATE triggers SET trigger_state = ? WHERE job_group = ? AND job_name = ?")
                    .bind(TriggerState::Error)
                    .bind(&job_key.group)
                    .bind(&job_key.name)
                    .execute(&mut *tx)
                    .await?;
            }
            CompletionCode::SetAllJobTriggersComplete => {
                sqlx::query("UPDATE triggers SET trigger_state = ? WHERE job_group = ? AND job_name = ?")
                    .bind(TriggerState::Complete)
                    .bind(&job_key.group)
                    .bind(&job_key.name)
                    .execute(&mut *tx)
                    .await?;
            }
            CompletionCode::NoopReturnToWaiting => {
                if let Some(trigger) = Self::fetch_trigger(&mut tx, trigger_key).await? {
                    if trigger.next_fire_time.is_none() {
                        sqlx::query("DELETE FROM triggers WHERE trigger_group = ? AND trigger_name = ?")
                            .bind(&trigger_key.group)
                            .bind(&trigger_key.name)
                            .execute(&mut *tx)
                            .await?;
                        Self::delete_job_if_orphaned(&mut tx, job_key).await?;
                    } else if trigger.state == TriggerState::Executing {
                        Self::set_trigger_state(&mut tx, trigger_key, TriggerState::Waiting).await?;
                    }
                }
            }
        }

        let job = Self::fetch_job(&mut tx, job_key).await?;
        if let Some(job) = &job {
            if job.stateful {
                Self::unblock_sibling_triggers(&mut tx, job_key).await?;
            }
        }
        sqlx::query("DELETE FROM fired_triggers WHERE instance_id = ? AND trigger_group = ? AND trigger_name = ?")
            .bind(instance_id)
            .bind(&trigger_key.group)
            .bind(&trigger_key.name)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        Ok(())
    }

    async fn recover_misfired_jobs(&self, now: i64) -> Result<bool> {
        let _guard = self.locks.obtain(LockName::TriggerAccess).await?;
        let client = self.write.lock().await;
        let mut tx = client.begin().await?;
        let threshold = crate::config::CONFIG.misfire_threshold_ms;
        let batch_size = crate::config::CONFIG.max_misfires_to_handle_at_a_time;
        let cutoff = now - threshold * 1000;
        let rows = sqlx::query_as::<_, TriggerRow>(
            "SELECT trigger_group, trigger_name, job_group, job_name, calendar_name, \
             next_fire_time, prev_fire_time, priority, misfire_instruction, trigger_state, \
             is_volatile, variant_json FROM triggers \
             WHERE trigger_state = ? AND next_fire_time < ? ORDER BY next_fire_time ASC LIMIT ?",
        )
        .bind(TriggerState::Waiting)
        .bind(cutoff)
        .bind(batch_size)
        .fetch_all(&mut *tx)
        .await?;
        let more_to_do = rows.len() as i64 == batch_size;
        for row in rows {
            let trigger = Trigger::try_from(row)?;
            let calendar = match &trigger.calendar_name {
                Some(name) => Self::fetch_calendar(&mut tx, name).await?,
                None => None,
            };
            apply_and_persist_misfire(&mut tx, &trigger, now, calendar.as_ref()).await?;
        }
        tx.commit().await?;
        Ok(more_to_do)
    }

    async fn list_scheduler_states(&self) -> Result<Vec<SchedulerStateRecord>> {
        let rows = sqlx::query_as::<_, (String, i64, i64)>(
            "SELECT instance_id, last_checkin_time, checkin_interval FROM scheduler_state",
        )
        .fetch_all(&self.read)
        .await?;
        Ok(rows
            .into_iter()
            .map(|(instance_id, last_checkin_time, checkin_interval)| SchedulerStateRecord {
                instance_id,
                last_checkin_time,
                checkin_interval,
            })
            .collect())
    }

    async fn checkin(&self, instance_id: &str, now: i64, checkin_interval: i64) -> Result<()> {
        let _guard = self.locks.obtain(LockName::StateAccess).await?;
        let client = self.write.lock().await;
        sqlx::query(
            "INSERT INTO scheduler_state (instance_id, last_checkin_time, checkin_interval) VALUES (?,?,?) \
             ON CONFLICT (instance_id) DO UPDATE SET last_checkin_time = excluded.last_checkin_time, \
             checkin_interval = excluded.checkin_interval",
        )
        .bind(instance_id)
        .bind(now)
        .bind(checkin_interval)
        .execute(&*client)
        .await?;
        Ok(())
    }

    async fn delete_scheduler_state(&self, instance_id: &str) -> Result<()> {
        let _guard = self.locks.obtain(LockName::StateAccess).await?;
        let client = self.write.lock().await;
        sqlx::query("DELETE FROM scheduler_state WHERE instance_id = ?")
            .bind(instance_id)
            .execute(&*client)
            .await?;
        Ok(())
    }

    async fn recover_instance(&self, instance_id: &str) -> Result<()> {
        let _guard = self.locks.obtain(LockName::TriggerAccess).await?;
        let client = self.write.lock().await;
        let mut tx = client.begin().await?;
        let rows = sqlx::query_as::<_, FiredTriggerRow>(
            "SELECT entry_id, instance_id, trigger_group, trigger_name, job_group, job_name, \
             state, is_stateful, requests_recovery, fire_time, priority FROM fired_triggers \
             WHERE instance_id = ?",
        )
        .bind(instance_id)
        .fetch_all(&mut *tx)
        .await?;
        for row in rows {
            let fired: crate::model::FiredTrigger = row.into();
            if fired.requests_recovery {
                let job = Self::fetch_job(&mut tx, &fired.job_key).await?;
                if job.is_some() {
                    let mut recovery = Trigger::new(
                        TriggerKey::new(
                            fired.trigger_key.group.clone(),
                            format!("RECOVER_{}_{}", fired.instance_id, fired.entry_id),
                        ),
                        fired.job_key.clone(),
                        TriggerVariant::Blob { data: Vec::new() },
                    );
                    recovery.next_fire_time = Some(fired.fire_time);
                    recovery.priority = fired.priority;
                    recovery.volatile = true;
                    Self::upsert_trigger(&mut tx, &recovery).await?;
                }
            }
            Self::cas_trigger_state(&mut tx, &fired.trigger_key, TriggerState::Acquired, TriggerState::Waiting).await?;
            Self::cas_trigger_state(&mut tx, &fired.trigger_key, TriggerState::Executing, TriggerState::Waiting).await?;
            Self::cas_trigger_state(&mut tx, &fired.trigger_key, TriggerState::Blocked, TriggerState::Waiting).await?;
            Self::cas_trigger_state(&mut tx, &fired.trigger_key, TriggerState::PausedBlocked, TriggerState::Paused).await?;
        }
        sqlx::query("DELETE FROM fired_triggers WHERE instance_id = ?")
            .bind(instance_id)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        Ok(())
    }

    async fn purge_volatile(&self) -> Result<()> {
        let _guard = self.locks.obtain(LockName::TriggerAccess).await?;
        let client = self.write.lock().await;
        let mut tx = client.begin().await?;
        sqlx::query("DELETE FROM triggers WHERE is_volatile = 1").execute(&mut *tx).await?;
        sqlx::query("DELETE FROM job_details WHERE is_volatile = 1").execute(&mut *tx).await?;
        sqlx::query("DELETE FROM calendars WHERE is_volatile = 1").execute(&mut *tx).await?;
        tx.commit().await?;
        Ok(())
    }

    async fn shutdown(&self) -> Result<()> {
        self.write.lock().await.close().await;
        self.read.close().await;
        Ok(())
    }
}

/// Shared by `resume_trigger` and `recover_misfired_jobs`: apply the
/// trigger's misfire policy and persist the outcome (spec.md §4.4).
async fn apply_and_persist_misfire(
    tx: &mut Transaction<'_, Sqlite>,
    trigger: &Trigger,
    now: i64,
    calendar: Option<&Calendar>,
) -> Result<()> {
    let outcome = engine::apply_misfire_policy(trigger, now, calendar);
    let next = match outcome {
        MisfireOutcome::FireNow => Some(now),
        MisfireOutcome::RescheduleTo(next) => next,
        MisfireOutcome::DoNothing => return Ok(()),
    };
    sqlx::query("UPDATE triggers SET next_fire_time = ? WHERE trigger_group = ? AND trigger_name = ?")
        .bind(next)
        .bind(&trigger.key.group)
        .bind(&trigger.key.name)
        .execute(&mut **tx)
        .await?;
    Ok(())
}
