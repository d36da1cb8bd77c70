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

//! End-to-end scenarios from spec.md §8, run against the SQLite backend
//! with an in-memory database — mirrors the teacher's habit of exercising
//! the SQLite backend directly where a live Postgres isn't available.

use jobstore::{
    cluster, config::StoreConfig, model::MisfireInstruction, store, Calendar, CompletionCode,
    Job, JobKey, Trigger, TriggerKey, TriggerState, TriggerVariant,
};

fn config() -> StoreConfig {
    StoreConfig {
        instance_id: "AUTO".into(),
        is_clustered: false,
        cluster_checkin_interval_ms: 1000,
        cluster_checkin_failure_factor: 3.0,
        misfire_threshold_ms: 5000,
        max_misfires_to_handle_at_a_time: 20,
        lock_on_insert: false,
        backend: "sqlite".into(),
        db_url: "sqlite::memory:".into(),
        acquire_batch_size: 1,
    }
}

fn one_shot_trigger(key: TriggerKey, job_key: JobKey, next_fire_time: i64) -> Trigger {
    let mut t = Trigger::new(
        key,
        job_key,
        TriggerVariant::Simple {
            interval_ms: 0,
            repeat_count: Some(0),
            times_triggered: 0,
        },
    );
    t.next_fire_time = Some(next_fire_time);
    t
}

#[tokio::test]
async fn happy_path_non_durable_job_is_deleted_after_completion() {
    let store = store::connect(&config()).await.unwrap();
    let now = 1_000_000_000_i64;
    let job_key = JobKey::new("g", "j1");
    let mut job = Job::new(job_key.clone(), "handlers::Noop");
    job.durable = false;
    job.stateful = false;
    store.store_job(job, false).await.unwrap();

    let trigger_key = TriggerKey::new("g", "t1");
    let trigger = one_shot_trigger(trigger_key.clone(), job_key.clone(), now + 1_000_000);
    store.store_trigger(trigger, false).await.unwrap();

    let acquired = store
        .acquire_next_trigger("inst-a", now + 1_500_000, 5_000)
        .await
        .unwrap()
        .expect("trigger should be acquirable once due");
    assert_eq!(acquired.key, trigger_key);

    let bundle = store
        .trigger_fired("inst-a", &trigger_key)
        .await
        .unwrap()
        .expect("trigger_fired should return a bundle");
    assert_eq!(bundle.scheduled_fire_time, now + 1_000_000);
    assert_eq!(bundle.next_fire_time, None, "one-shot trigger has no more fire times");

    store
        .triggered_job_complete("inst-a", &trigger_key, &job_key, CompletionCode::NoopReturnToWaiting)
        .await
        .unwrap();

    assert!(store.retrieve_trigger(&trigger_key).await.unwrap().is_none());
    assert!(store.retrieve_job(&job_key).await.unwrap().is_none(), "non-durable orphaned job is deleted");
}

#[tokio::test]
async fn replace_trigger_keeps_a_single_row() {
    let store = store::connect(&config()).await.unwrap();
    let job_key = JobKey::new("g", "j2");
    store.store_job(Job::new(job_key.clone(), "handlers::Noop"), false).await.unwrap();

    let key = TriggerKey::new("g", "t2");
    store.store_trigger(one_shot_trigger(key.clone(), job_key.clone(), 1_000), false).await.unwrap();

    let mut replacement = one_shot_trigger(key.clone(), job_key.clone(), 2_000);
    replacement.priority = 9;
    store.replace_trigger(&key, replacement).await.unwrap();

    let fetched = store.retrieve_trigger(&key).await.unwrap().unwrap();
    assert_eq!(fetched.priority, 9);
    assert_eq!(fetched.next_fire_time, Some(2_000));
    assert_eq!(store.triggers_for_job(&job_key).await.unwrap().len(), 1);
}

#[tokio::test]
async fn pause_group_lands_new_triggers_in_paused() {
    let store = store::connect(&config()).await.unwrap();
    let job_key = JobKey::new("g3", "j3");
    store.store_job(Job::new(job_key.clone(), "handlers::Noop"), false).await.unwrap();

    store.pause_trigger_group("g3").await.unwrap();

    let key = TriggerKey::new("g3", "t3");
    store.store_trigger(one_shot_trigger(key.clone(), job_key, 1_000), false).await.unwrap();
    assert_eq!(store.trigger_state(&key).await.unwrap(), Some(TriggerState::Paused));

    store.resume_trigger_group("g3").await.unwrap();
    assert_eq!(store.trigger_state(&key).await.unwrap(), Some(TriggerState::Waiting));
}

#[tokio::test]
async fn stateful_job_blocks_sibling_triggers_until_completion() {
    let store = store::connect(&config()).await.unwrap();
    let job_key = JobKey::new("g4", "j4");
    let mut job = Job::new(job_key.clone(), "handlers::Noop");
    job.stateful = true;
    store.store_job(job, false).await.unwrap();

    let ta = TriggerKey::new("g4", "ta");
    let tb = TriggerKey::new("g4", "tb");
    store.store_trigger(one_shot_trigger(ta.clone(), job_key.clone(), 1_000), false).await.unwrap();
    store.store_trigger(one_shot_trigger(tb.clone(), job_key.clone(), 2_000), false).await.unwrap();

    store.acquire_next_trigger("inst-a", 1_000, 5_000).await.unwrap().unwrap();
    store.trigger_fired("inst-a", &ta).await.unwrap().unwrap();
    assert_eq!(store.trigger_state(&ta).await.unwrap(), Some(TriggerState::Executing));
    assert_eq!(store.trigger_state(&tb).await.unwrap(), Some(TriggerState::Blocked));

    store
        .triggered_job_complete("inst-a", &ta, &job_key, CompletionCode::NoopReturnToWaiting)
        .await
        .unwrap();
    assert_eq!(store.trigger_state(&tb).await.unwrap(), Some(TriggerState::Waiting));
}

#[tokio::test]
async fn misfired_trigger_is_rescheduled_to_fire_immediately() {
    let store = store::connect(&config()).await.unwrap();
    let job_key = JobKey::new("g5", "j5");
    store.store_job(Job::new(job_key.clone(), "handlers::Noop"), false).await.unwrap();

    let key = TriggerKey::new("g5", "t5");
    let now = 200_000_000_i64;
    let mut t = one_shot_trigger(key.clone(), job_key, now - 120_000_000);
    t.misfire_instruction = MisfireInstruction::FireNow;
    store.store_trigger(t, false).await.unwrap();

    let more = store.recover_misfired_jobs(now).await.unwrap();
    assert!(!more);

    let fetched = store.retrieve_trigger(&key).await.unwrap().unwrap();
    assert_eq!(fetched.next_fire_time, Some(now));
    assert_eq!(fetched.state, TriggerState::Waiting);

    let acquired = store.acquire_next_trigger("inst-a", now, 0).await.unwrap();
    assert_eq!(acquired.map(|t| t.key), Some(key));
}

#[tokio::test]
async fn calendar_exclusion_is_respected_when_updating_triggers() {
    let store = store::connect(&config()).await.unwrap();
    let mut cal = Calendar::new("blackout");
    cal.excluded_windows.push((1_000, 2_000));
    store.store_calendar(cal, false, false).await.unwrap();
    assert!(store.retrieve_calendar("blackout").await.unwrap().is_some());
    assert!(store.remove_calendar("blackout").await.unwrap());
}

#[tokio::test]
async fn cluster_failover_recovers_requests_recovery_trigger() {
    let mut cfg = config();
    cfg.is_clustered = true;
    let store = store::connect(&cfg).await.unwrap();

    let job_key = JobKey::new("g6", "j6");
    let mut job = Job::new(job_key.clone(), "handlers::Noop");
    job.requests_recovery = true;
    store.store_job(job, false).await.unwrap();

    let trigger_key = TriggerKey::new("g6", "t6");
    let fire_time = 5_000_000_i64;
    store
        .store_trigger(one_shot_trigger(trigger_key.clone(), job_key.clone(), fire_time), false)
        .await
        .unwrap();

    // Peer A's heartbeat is ancient; it then acquires the trigger and
    // "dies" before ever completing it.
    store.checkin("peer-a", 0, cfg.cluster_checkin_interval_ms).await.unwrap();
    let acquired = store.acquire_next_trigger("peer-a", fire_time, 0).await.unwrap().unwrap();
    assert_eq!(acquired.key, trigger_key);

    cluster::do_checkin(&*store, "peer-b", &cfg, false).await.unwrap();

    let states = store.list_scheduler_states().await.unwrap();
    assert!(states.iter().any(|s| s.instance_id == "peer-b"));
    assert!(
        states.iter().all(|s| s.instance_id != "peer-a"),
        "peer-a's stale state row should be deleted on recovery"
    );

    assert_eq!(store.trigger_state(&trigger_key).await.unwrap(), Some(TriggerState::Waiting));

    let triggers = store.triggers_for_job(&job_key).await.unwrap();
    let recovery = triggers
        .iter()
        .find(|t| t.key.name.starts_with("RECOVER_peer-a_"))
        .expect("a recovery trigger should be synthesized for peer-a's fired trigger");
    assert_eq!(recovery.next_fire_time, Some(fire_time));
    assert!(recovery.volatile);
}
