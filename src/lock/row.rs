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

//! Realisation 1 of the Lock Manager: `SELECT ... FOR UPDATE` against a
//! row in the `LOCKS` table, held until the enclosing transaction commits
//! or rolls back. Grounded on the teacher's `get_for_update` pattern in
//! `infra/src/db/mysql.rs` (begin, `SELECT ... FOR UPDATE`, mutate,
//! commit-or-rollback), generalized from "lock a meta row" to "lock a
//! named row the caller's own transaction then continues using".

use sqlx::{Postgres, Transaction};

use super::LockName;
use crate::errors::Result;

/// Obtains `lock_name` against the caller's open transaction. Blocks
/// until held, per spec.md §4.1's `obtain(connection, lock_name)`
/// contract — the blocking happens inside Postgres itself, via the row
/// lock wait queue.
///
/// Released implicitly by the caller's `tx.commit()`/`tx.rollback()` —
/// there is no separate release call for this realisation.
pub async fn obtain(tx: &mut Transaction<'_, Postgres>, lock_name: LockName) -> Result<bool> {
    sqlx::query("INSERT INTO locks (lock_name) VALUES ($1) ON CONFLICT DO NOTHING")
        .bind(lock_name.as_str())
        .execute(&mut **tx)
        .await?;
    sqlx::query("SELECT lock_name FROM locks WHERE lock_name = $1 FOR UPDATE")
        .bind(lock_name.as_str())
        .fetch_one(&mut **tx)
        .await?;
    Ok(true)
}

pub const CREATE_TABLE_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS locks (
    lock_name VARCHAR(40) NOT NULL PRIMARY KEY
);
"#;
