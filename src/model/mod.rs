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

pub mod calendar;
pub mod fired;
pub mod job;
pub mod scheduler_state;
pub mod trigger;

pub use calendar::Calendar;
pub use fired::FiredTrigger;
pub use job::{Job, JobKey};
pub use scheduler_state::SchedulerStateRecord;
pub use trigger::{
    CompletionCode, MisfireInstruction, Trigger, TriggerKey, TriggerState, TriggerVariant,
};
