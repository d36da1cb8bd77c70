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

use serde::{Deserialize, Serialize};

use super::job::JobKey;

/// `(group, name)` — the unique identifier of a trigger (spec.md §3).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TriggerKey {
    pub group: String,
    pub name: String,
}

impl TriggerKey {
    pub fn new(group: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            group: group.into(),
            name: name.into(),
        }
    }
}

impl std::fmt::Display for TriggerKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}", self.group, self.name)
    }
}

/// Trigger lifecycle state (spec.md §3, §4.4).
#[derive(Debug, Clone, Copy, PartialEq, Eq, sqlx::Type, Serialize, Deserialize, Default)]
#[repr(i32)]
pub enum TriggerState {
    #[default]
    Waiting,
    Paused,
    Acquired,
    Executing,
    Complete,
    Error,
    Blocked,
    PausedBlocked,
}

impl std::fmt::Display for TriggerState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            TriggerState::Waiting => "waiting",
            TriggerState::Paused => "paused",
            TriggerState::Acquired => "acquired",
            TriggerState::Executing => "executing",
            TriggerState::Complete => "complete",
            TriggerState::Error => "error",
            TriggerState::Blocked => "blocked",
            TriggerState::PausedBlocked => "paused_blocked",
        };
        write!(f, "{s}")
    }
}

/// The per-trigger misfire policy choice (spec.md §4.4 "Misfire policy").
/// `SmartPolicy` defers to the trigger variant's own recommended default
/// (mirrors Quartz's `MISFIRE_INSTRUCTION_SMART_POLICY`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, sqlx::Type, Serialize, Deserialize, Default)]
#[repr(i32)]
pub enum MisfireInstruction {
    #[default]
    SmartPolicy,
    FireNow,
    RescheduleNextWithRemainingCount,
    RescheduleNextWithExistingCount,
    DoNothing,
}

/// The four `triggered_job_complete` codes plus the implicit "leave as
/// is" default (spec.md §4.4).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompletionCode {
    DeleteTrigger,
    SetComplete,
    SetError,
    SetAllJobTriggersError,
    SetAllJobTriggersComplete,
    NoopReturnToWaiting,
}

/// Tagged-variant payload replacing the source's trigger subclassing
/// (spec.md §9).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum TriggerVariant {
    Simple {
        interval_ms: i64,
        /// `None` = repeat indefinitely.
        repeat_count: Option<i32>,
        times_triggered: i32,
    },
    Cron {
        expression: String,
        time_zone: String,
    },
    Blob {
        data: Vec<u8>,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Trigger {
    pub key: TriggerKey,
    pub job_key: JobKey,
    pub calendar_name: Option<String>,
    pub next_fire_time: Option<i64>,
    pub prev_fire_time: Option<i64>,
    pub priority: i32,
    pub misfire_instruction: MisfireInstruction,
    pub state: TriggerState,
    pub volatile: bool,
    pub variant: TriggerVariant,
}

impl Trigger {
    pub fn new(key: TriggerKey, job_key: JobKey, variant: TriggerVariant) -> Self {
        Self {
            key,
            job_key,
            calendar_name: None,
            next_fire_time: None,
            prev_fire_time: None,
            priority: 5,
            misfire_instruction: MisfireInstruction::SmartPolicy,
            state: TriggerState::Waiting,
            volatile: false,
            variant,
        }
    }
}
