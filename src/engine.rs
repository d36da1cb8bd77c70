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

//! DB-agnostic trigger-variant dispatch: next fire-time computation and
//! misfire classification (spec.md §4.4, §9). Kept free of `sqlx` so it
//! can be unit tested without a database and shared by every backend.

use std::str::FromStr;

use chrono::TimeZone;
use chrono_tz::Tz;
use cron::Schedule;

use crate::{
    errors::Result,
    model::{Calendar, MisfireInstruction, Trigger, TriggerVariant},
};

/// Bounds the calendar-exclusion retry loop in `compute_next_fire_time`
/// so a calendar that excludes everything can't spin forever.
const MAX_CALENDAR_SKIPS: usize = 100;

/// Advances `trigger` past `after` (exclusive), honoring the referenced
/// calendar's exclusions. Returns `None` when the trigger variant has no
/// more fire times (simple trigger exhausted its repeat count, blob
/// trigger, or the calendar rejected every candidate within the bound).
pub fn compute_next_fire_time(trigger: &Trigger, after: i64, calendar: Option<&Calendar>) -> Option<i64> {
    let mut candidate = raw_next_fire_time(trigger, after)?;
    if let Some(cal) = calendar {
        for _ in 0..MAX_CALENDAR_SKIPS {
            if cal.is_time_included(candidate) {
                return Some(candidate);
            }
            candidate = cal.next_included_time(candidate)?;
            candidate = raw_next_fire_time_from(trigger, candidate, after)?;
        }
        return None;
    }
    Some(candidate)
}

/// The trigger variant's own increment logic, ignoring calendars.
fn raw_next_fire_time(trigger: &Trigger, after: i64) -> Option<i64> {
    raw_next_fire_time_from(trigger, after + 1, after)
}

/// `anchor` is the firing this trigger is advancing past — the base a
/// first firing (no `prev_fire_time` yet) counts its interval from.
fn raw_next_fire_time_from(trigger: &Trigger, floor: i64, anchor: i64) -> Option<i64> {
    match &trigger.variant {
        TriggerVariant::Simple {
            interval_ms,
            repeat_count,
            times_triggered,
        } => {
            if let Some(max) = repeat_count {
                if *times_triggered >= *max {
                    return None;
                }
            }
            let base = trigger.prev_fire_time.unwrap_or(anchor);
            let mut next = base + interval_ms * 1000;
            while next < floor {
                next += interval_ms * 1000;
            }
            Some(next)
        }
        TriggerVariant::Cron {
            expression,
            time_zone,
        } => cron_next_fire_time(expression, time_zone, floor).ok().flatten(),
        TriggerVariant::Blob { .. } => None,
    }
}

fn cron_next_fire_time(expression: &str, time_zone: &str, floor_micros: i64) -> Result<Option<i64>> {
    let schedule = Schedule::from_str(expression)?;
    let tz: Tz = time_zone.parse().unwrap_or(chrono_tz::UTC);
    let floor = tz
        .timestamp_micros(floor_micros)
        .single()
        .unwrap_or_else(|| tz.timestamp_micros(floor_micros).earliest().unwrap());
    Ok(schedule
        .after(&floor)
        .next()
        .map(|dt| dt.timestamp_micros()))
}

pub fn now_micros() -> i64 {
    chrono::Utc::now().timestamp_micros()
}

/// A trigger is misfired if its `next_fire_time` is already further in
/// the past than `threshold_ms` while still `WAITING` (spec.md §4.4).
pub fn is_misfired(next_fire_time: i64, now: i64, threshold_ms: i64) -> bool {
    next_fire_time < now - threshold_ms * 1000
}

/// Resolves `SmartPolicy` to the trigger variant's recommended default.
fn resolved_instruction(trigger: &Trigger) -> MisfireInstruction {
    if trigger.misfire_instruction != MisfireInstruction::SmartPolicy {
        return trigger.misfire_instruction;
    }
    match &trigger.variant {
        TriggerVariant::Simple { repeat_count, .. } if repeat_count.is_none() => {
            MisfireInstruction::RescheduleNextWithRemainingCount
        }
        TriggerVariant::Simple { .. } => MisfireInstruction::RescheduleNextWithExistingCount,
        TriggerVariant::Cron { .. } => MisfireInstruction::FireNow,
        TriggerVariant::Blob { .. } => MisfireInstruction::DoNothing,
    }
}

/// Outcome of applying a trigger's misfire policy (spec.md §4.4
/// "Misfire policy").
pub enum MisfireOutcome {
    /// Fire immediately: set `next_fire_time = now`.
    FireNow,
    /// Reschedule to the next slot strictly after `now`.
    RescheduleTo(Option<i64>),
    /// Leave the trigger's `next_fire_time` untouched.
    DoNothing,
}

pub fn apply_misfire_policy(
    trigger: &Trigger,
    now: i64,
    calendar: Option<&Calendar>,
) -> MisfireOutcome {
    match resolved_instruction(trigger) {
        MisfireInstruction::FireNow => MisfireOutcome::FireNow,
        MisfireInstruction::DoNothing => MisfireOutcome::DoNothing,
        MisfireInstruction::RescheduleNextWithExistingCount
        | MisfireInstruction::RescheduleNextWithRemainingCount
        | MisfireInstruction::SmartPolicy => {
            MisfireOutcome::RescheduleTo(compute_next_fire_time(trigger, now - 1, calendar))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{JobKey, Trigger, TriggerKey, TriggerVariant};

    fn simple_trigger(interval_ms: i64, repeat_count: Option<i32>) -> Trigger {
        Trigger::new(
            TriggerKey::new("g", "t"),
            JobKey::new("g", "j"),
            TriggerVariant::Simple {
                interval_ms,
                repeat_count,
                times_triggered: 0,
            },
        )
    }

    #[test]
    fn simple_trigger_advances_by_interval() {
        let mut t = simple_trigger(1_000, Some(3));
        t.prev_fire_time = Some(1_000_000);
        let next = compute_next_fire_time(&t, 1_000_000, None);
        assert_eq!(next, Some(2_000_000));
    }

    #[test]
    fn simple_trigger_first_fire_waits_a_full_interval() {
        // `prev_fire_time` is still `None` on a trigger's first firing
        // (`Trigger::new` leaves it unset); the next fire time must be a
        // full interval after the firing that's being advanced past, not
        // immediately after it.
        let t = simple_trigger(60_000, Some(3));
        let fired_at = 10_000_000;
        let next = compute_next_fire_time(&t, fired_at, None);
        assert_eq!(next, Some(fired_at + 60_000_000));
    }

    #[test]
    fn simple_trigger_exhausted_returns_none() {
        let mut t = simple_trigger(1_000, Some(1));
        if let TriggerVariant::Simple { times_triggered, .. } = &mut t.variant {
            *times_triggered = 1;
        }
        assert_eq!(compute_next_fire_time(&t, 1_000_000, None), None);
    }

    #[test]
    fn misfire_detection_uses_threshold() {
        let now = 120_000_000; // 120s in micros
        assert!(is_misfired(0, now, 5_000));
        assert!(!is_misfired(now - 1_000, now, 5_000));
    }

    #[test]
    fn calendar_exclusion_skips_candidate() {
        let mut t = simple_trigger(1_000, None);
        t.prev_fire_time = Some(0);
        let mut cal = Calendar::new("blackout");
        cal.excluded_windows.push((1_000_000, 1_500_000));
        let next = compute_next_fire_time(&t, 0, Some(&cal));
        assert_eq!(next, Some(1_500_000));
    }

    #[test]
    fn fire_now_policy_sets_immediate() {
        let t = simple_trigger(1_000, None);
        match apply_misfire_policy(&t, 5_000_000, None) {
            MisfireOutcome::RescheduleTo(Some(_)) => {}
            _ => panic!("expected reschedule for unbounded simple trigger"),
        }
    }
}
