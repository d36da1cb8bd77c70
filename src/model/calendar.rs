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

/// Name-keyed exclusion schedule a trigger may reference to skip fire
/// times (spec.md §3). Modeled as a set of excluded `[start, end)`
/// microsecond windows, which is enough to express "blackout calendar"
/// semantics without needing the source's full calendar class hierarchy.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Calendar {
    pub name: String,
    pub description: Option<String>,
    pub excluded_windows: Vec<(i64, i64)>,
    /// Discarded on scheduler restart, along with volatile jobs/triggers
    /// that reference it (spec.md §4.6).
    pub volatile: bool,
}

impl Calendar {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: None,
            excluded_windows: Vec::new(),
            volatile: false,
        }
    }

    pub fn is_time_included(&self, time_micros: i64) -> bool {
        !self
            .excluded_windows
            .iter()
            .any(|(start, end)| time_micros >= *start && time_micros < *end)
    }

    /// Smallest `t >= time_micros` not excluded by this calendar, or
    /// `None` if every window from `time_micros` onward up to a bounded
    /// lookahead is excluded (a calendar that blacks out everything).
    pub fn next_included_time(&self, time_micros: i64) -> Option<i64> {
        let mut t = time_micros;
        for _ in 0..self.excluded_windows.len() + 1 {
            match self
                .excluded_windows
                .iter()
                .find(|(start, end)| t >= *start && t < *end)
            {
                Some((_, end)) => t = *end,
                None => return Some(t),
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn skips_excluded_window() {
        let mut cal = Calendar::new("blackout");
        cal.excluded_windows.push((100, 200));
        assert!(!cal.is_time_included(150));
        assert!(cal.is_time_included(250));
        assert_eq!(cal.next_included_time(150), Some(200));
    }

    #[test]
    fn gives_up_on_a_calendar_that_excludes_everything() {
        let mut cal = Calendar::new("always-closed");
        cal.excluded_windows.push((0, i64::MAX));
        assert_eq!(cal.next_included_time(10), None);
    }
}
