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

/// `(group, name)` — the unique identifier of a job (spec.md §3).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct JobKey {
    pub group: String,
    pub name: String,
}

impl JobKey {
    pub fn new(group: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            group: group.into(),
            name: name.into(),
        }
    }
}

impl std::fmt::Display for JobKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}", self.group, self.name)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    pub key: JobKey,
    /// Opaque reference to the implementation class/handler; the store
    /// never inspects this (spec.md §1 Non-goals: "how jobs execute").
    pub job_class: String,
    pub description: Option<String>,
    /// Survives having no triggers.
    pub durable: bool,
    /// Persist mutated payload after each firing; other triggers of this
    /// job block while it executes.
    pub stateful: bool,
    pub requests_recovery: bool,
    /// Discarded on scheduler restart; may only have volatile triggers.
    pub volatile: bool,
    /// Opaque key-value payload ("job data map").
    pub job_data: serde_json::Map<String, serde_json::Value>,
}

impl Job {
    pub fn new(key: JobKey, job_class: impl Into<String>) -> Self {
        Self {
            key,
            job_class: job_class.into(),
            description: None,
            durable: false,
            stateful: false,
            requests_recovery: false,
            volatile: false,
            job_data: serde_json::Map::new(),
        }
    }
}
