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

//! Named, database-backed (or in-process) mutual-exclusion locks that
//! serialize cluster-wide access to protected tables (spec.md §4.1).

pub mod mutex;
pub mod row;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LockName {
    TriggerAccess,
    StateAccess,
    CalendarAccess,
}

impl LockName {
    pub fn as_str(&self) -> &'static str {
        match self {
            LockName::TriggerAccess => "TRIGGER_ACCESS",
            LockName::StateAccess => "STATE_ACCESS",
            LockName::CalendarAccess => "CALENDAR_ACCESS",
        }
    }
}
