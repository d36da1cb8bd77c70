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

use super::{job::JobKey, trigger::TriggerKey, trigger::TriggerState};

/// The authoritative record of work in flight (spec.md §3). Created when
/// a trigger is acquired; deleted on completion, release, or cluster
/// recovery.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FiredTrigger {
    pub entry_id: String,
    pub instance_id: String,
    pub trigger_key: TriggerKey,
    pub job_key: JobKey,
    pub state: TriggerState,
    pub is_stateful: bool,
    pub requests_recovery: bool,
    pub fire_time: i64,
    pub priority: i32,
}
