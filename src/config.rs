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

use dotenv_config::EnvConfig;
use dotenvy::dotenv_override;
use once_cell::sync::Lazy;
use uuid::Uuid;

pub static CONFIG: Lazy<StoreConfig> = Lazy::new(|| {
    dotenv_override().ok();
    StoreConfig::init().expect("invalid config")
});

/// Backend selection. `spec.md` §4.1 calls for two interchangeable Lock
/// Manager realisations; `Backend` is how a caller of `connect()` picks
/// which one (and which `JobStore` implementation) to use.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backend {
    /// Database-row lock realisation (`SELECT ... FOR UPDATE`).
    Postgres,
    /// In-process mutex realisation, for single-instance deployments.
    Sqlite,
}

impl From<&str> for Backend {
    fn from(value: &str) -> Self {
        match value {
            "postgres" | "postgresql" => Backend::Postgres,
            _ => Backend::Sqlite,
        }
    }
}

#[derive(EnvConfig, Debug, Clone)]
pub struct StoreConfig {
    /// Stable identifier of this scheduler peer. `AUTO` means "generate a
    /// random one at startup" (spec.md §6).
    #[env_config(name = "JOBSTORE_INSTANCE_ID", default = "AUTO")]
    pub instance_id: String,

    /// Enables cluster check-in / failover recovery (spec.md §4.5).
    #[env_config(name = "JOBSTORE_IS_CLUSTERED", default = false)]
    pub is_clustered: bool,

    #[env_config(name = "JOBSTORE_CLUSTER_CHECKIN_INTERVAL_MS", default = 7500)]
    pub cluster_checkin_interval_ms: i64,

    /// Multiplier applied to `cluster_checkin_interval_ms` beyond which a
    /// peer's heartbeat is considered stale. Not specified numerically by
    /// spec.md; resolved in DESIGN.md.
    #[env_config(name = "JOBSTORE_CLUSTER_CHECKIN_FAILURE_FACTOR", default = 3.0)]
    pub cluster_checkin_failure_factor: f64,

    #[env_config(name = "JOBSTORE_MISFIRE_THRESHOLD_MS", default = 60000)]
    pub misfire_threshold_ms: i64,

    #[env_config(name = "JOBSTORE_MAX_MISFIRES_TO_HANDLE_AT_A_TIME", default = 20)]
    pub max_misfires_to_handle_at_a_time: i64,

    /// Serialize `store_job`/`store_trigger`/`store_calendar` behind
    /// TRIGGER_ACCESS even on insert (no replace) — a deliberate bulk-load
    /// optimisation toggle per spec.md §4.2.
    #[env_config(name = "JOBSTORE_LOCK_ON_INSERT", default = false)]
    pub lock_on_insert: bool,

    /// Selects which Lock Manager realisation and `JobStore` backend to
    /// use: "postgres" (database-row lock) or "sqlite" (in-process mutex).
    #[env_config(name = "JOBSTORE_BACKEND", default = "sqlite")]
    pub backend: String,

    #[env_config(name = "JOBSTORE_DB_URL", default = "sqlite::memory:")]
    pub db_url: String,

    /// How many triggers `acquire_next_trigger`'s caller pulls per batch;
    /// not part of the strict interface but threaded through so callers
    /// of the crate can batch-acquire without re-deriving it.
    #[env_config(name = "JOBSTORE_ACQUIRE_BATCH_SIZE", default = 1)]
    pub acquire_batch_size: i64,
}

impl StoreConfig {
    pub fn backend(&self) -> Backend {
        Backend::from(self.backend.as_str())
    }

    pub fn resolved_instance_id(&self) -> String {
        if self.instance_id == "AUTO" {
            format!("auto-{}", Uuid::new_v4())
        } else {
            self.instance_id.clone()
        }
    }
}
