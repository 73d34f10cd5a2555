use common_types::EmbeddingError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DbError {
    #[error("Database error: {0}")]
    Sqlx(sqlx::Error),

    #[error("Unique constraint violated: {0}")]
    UniqueViolation(sqlx::Error),

    #[error("Migration failed: {0}")]
    Migrate(#[from] sqlx::migrate::MigrateError),

    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: i64 },

    #[error("More than one person is named {0:?}")]
    AmbiguousName(String),

    #[error("Invalid embedding: {0}")]
    Embedding(#[from] EmbeddingError),
}

impl DbError {
    /// Serialization failures and deadlocks; the whole transaction may be retried.
    #[must_use]
    pub fn is_retryable_conflict(&self) -> bool {
        match self {
            Self::Sqlx(err) => err
                .as_database_error()
                .and_then(|db_err| db_err.code())
                .is_some_and(|code| code == "40001" || code == "40P01"),
            _ => false,
        }
    }
}

impl From<sqlx::Error> for DbError {
    fn from(err: sqlx::Error) -> Self {
        if err
            .as_database_error()
            .is_some_and(|db_err| db_err.is_unique_violation())
        {
            Self::UniqueViolation(err)
        } else {
            Self::Sqlx(err)
        }
    }
}
