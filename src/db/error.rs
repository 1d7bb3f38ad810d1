//! Store errors

use mongodb::error::{ErrorKind, WriteFailure};
use thiserror::Error;

const DUPLICATE_KEY_CODE: i32 = 11000;

#[derive(Error, Debug)]
pub enum DbError {
    #[error("database error: {0}")]
    Mongo(mongodb::error::Error),

    /// A unique index rejected the write.
    #[error("duplicate key")]
    Duplicate,

    #[error("in-memory store lock poisoned")]
    Poisoned,
}

impl From<mongodb::error::Error> for DbError {
    fn from(err: mongodb::error::Error) -> Self {
        if is_duplicate_key(&err) {
            DbError::Duplicate
        } else {
            DbError::Mongo(err)
        }
    }
}

fn is_duplicate_key(err: &mongodb::error::Error) -> bool {
    match err.kind.as_ref() {
        ErrorKind::Write(WriteFailure::WriteError(write_error)) => {
            write_error.code == DUPLICATE_KEY_CODE
        }
        ErrorKind::BulkWrite(bulk) => bulk
            .write_errors
            .as_ref()
            .map(|errors| errors.iter().any(|e| e.code == DUPLICATE_KEY_CODE))
            .unwrap_or(false),
        _ => false,
    }
}

pub type DbResult<T> = Result<T, DbError>;
