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

//! Cluster Coordinator (spec.md §4.5): periodic check-in plus failover
//! recovery of peers whose heartbeat has gone stale. Grounded on the
//! teacher's `watch_timeout` background loop (`infra/src/scheduler/postgres.rs`),
//! generalized from "reclaim stale rows on a timer" to "track distinct
//! peers by `instance_id` and recover a specific failed one".

use std::time::Duration;

use crate::{config::StoreConfig, engine, errors::Result, store::JobStore};

/// One run of `do_checkin` (spec.md §4.5 steps 1-4). Callers loop this on
/// `config.cluster_checkin_interval_ms`.
pub async fn do_checkin(store: &dyn JobStore, instance_id: &str, config: &StoreConfig, first_checkin: bool) -> Result<()> {
    let now = engine::now_micros();
    let states = store.list_scheduler_states().await?;
    let stale_after = (config.cluster_checkin_interval_ms as f64 * config.cluster_checkin_failure_factor) as i64;

    let mut failed: Vec<String> = states
        .iter()
        .filter(|s| s.instance_id != instance_id)
        .filter(|s| now - s.last_checkin_time > stale_after * 1000)
        .map(|s| s.instance_id.clone())
        .collect();

    if first_checkin {
        if let Some(prior) = states.iter().find(|s| s.instance_id == instance_id) {
            log::warn!("scheduler instance {instance_id} found its own stale check-in row on startup; treating as failed-by-self");
            failed.push(prior.instance_id.clone());
        }
    }

    store.checkin(instance_id, now, config.cluster_checkin_interval_ms).await?;

    for failed_instance in failed {
        log::warn!("recovering fired triggers for failed peer {failed_instance}");
        store.recover_instance(&failed_instance).await?;
        store.delete_scheduler_state(&failed_instance).await?;
    }

    Ok(())
}

/// Drives `do_checkin` on an interval until the process shuts down. Spawn
/// with `tokio::spawn` once `config.is_clustered` is true.
pub async fn run_checkin_loop(store: &dyn JobStore, instance_id: &str, config: &StoreConfig) {
    let mut interval = tokio::time::interval(Duration::from_millis(config.cluster_checkin_interval_ms as u64));
    let mut first = true;
    loop {
        interval.tick().await;
        if let Err(e) = do_checkin(store, instance_id, config, first).await {
            log::error!("cluster check-in failed for {instance_id}: {e}");
        }
        first = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{config::StoreConfig, store};

    fn test_config() -> StoreConfig {
        StoreConfig {
            instance_id: "self".into(),
            is_clustered: true,
            cluster_checkin_interval_ms: 1000,
            cluster_checkin_failure_factor: 3.0,
            misfire_threshold_ms: 60000,
            max_misfires_to_handle_at_a_time: 20,
            lock_on_insert: false,
            backend: "sqlite".into(),
            db_url: "sqlite::memory:".into(),
            acquire_batch_size: 1,
        }
    }

    #[tokio::test]
    async fn first_checkin_after_restart_recovers_own_stale_row() {
        let config = test_config();
        let store = store::connect(&config).await.unwrap();
        store.checkin("self", 0, 1000).await.unwrap();

        do_checkin(&*store, "self", &config, true).await.unwrap();

        let states = store.list_scheduler_states().await.unwrap();
        assert_eq!(states.len(), 1);
        assert!(states[0].last_checkin_time > 0);
    }

    #[tokio::test]
    async fn stale_peer_is_recovered_and_removed() {
        let config = test_config();
        let store = store::connect(&config).await.unwrap();
        store.checkin("peer", 0, 1000).await.unwrap();

        do_checkin(&*store, "self", &config, false).await.unwrap();

        let states = store.list_scheduler_states().await.unwrap();
        assert!(states.iter().all(|s| s.instance_id != "peer"));
    }
}
