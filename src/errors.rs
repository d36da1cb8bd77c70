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

use thiserror::Error as ThisError;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(ThisError, Debug)]
pub enum Error {
    #[error("IoError# {0}")]
    IoError(#[from] std::io::Error),
    #[error("SqlxError# {0}")]
    SqlxError(#[from] sqlx::Error),
    #[error("SerdeJsonError# {0}")]
    SerdeJsonError(#[from] serde_json::Error),
    #[error("CronError# {0}")]
    CronError(#[from] cron::error::Error),
    #[error("DbError# {0}")]
    DbError(#[from] DbError),
    #[error("Message# {0}")]
    Message(String),
}

impl Error {
    /// Maps an internal error onto the error codes the Store interface
    /// surfaces to its caller (spec.md §6 "Error codes surfaced").
    pub fn code(&self) -> ErrorCode {
        match self {
            Error::DbError(DbError::ClientError(_)) => ErrorCode::ClientError,
            Error::DbError(DbError::JobDoesNotExist(_)) => ErrorCode::PersistenceJobDoesNotExist,
            Error::DbError(DbError::ObjectAlreadyExists(_)) => ErrorCode::ObjectAlreadyExists,
            _ => ErrorCode::PersistenceGeneric,
        }
    }
}

#[derive(ThisError, Debug)]
pub enum DbError {
    #[error("client error: {0}")]
    ClientError(String),
    #[error("job {0} does not exist")]
    JobDoesNotExist(String),
    #[error("trigger {0} does not exist")]
    TriggerDoesNotExist(String),
    #[error("calendar {0} does not exist")]
    CalendarDoesNotExist(String),
    #[error("calendar {0} is still referenced by one or more triggers")]
    CalendarInUse(String),
    #[error("{0} already exists")]
    ObjectAlreadyExists(String),
}

/// Mirrors spec.md §6 "Error codes surfaced".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    ClientError,
    PersistenceJobDoesNotExist,
    PersistenceGeneric,
    ObjectAlreadyExists,
}
