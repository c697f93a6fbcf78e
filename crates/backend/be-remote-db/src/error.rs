//! Error types for the persistence layer

use thiserror::Error;

#[derive(Error, Debug)]
pub enum DbError {
    #[error("{entity} not found{}", .id.as_ref().map(|id| format!(": {}", id)).unwrap_or_default())]
    NotFound {
        entity: &'static str,
        id: Option<String>,
    },

    #[error("Duplicate {field}: {value}")]
    Duplicate { field: &'static str, value: String },

    #[error("{entity} {id} was modified concurrently")]
    Conflict { entity: &'static str, id: String },

    #[error("Database connection error: {0}")]
    Connection(String),

    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error("Connection pool error: {0}")]
    Pool(String),

    #[error("Query error: {0}")]
    Query(String),

    #[error("Data encoding error: {0}")]
    Encoding(String),

    #[error("Database error: {0}")]
    Database(#[source] sqlx::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl DbError {
    pub fn not_found(entity: &'static str) -> Self {
        Self::NotFound { entity, id: None }
    }

    pub fn not_found_with_id(entity: &'static str, id: impl Into<String>) -> Self {
        Self::NotFound {
            entity,
            id: Some(id.into()),
        }
    }

    pub fn duplicate(field: &'static str, value: impl Into<String>) -> Self {
        Self::Duplicate {
            field,
            value: value.into(),
        }
    }

    pub fn conflict(entity: &'static str, id: impl Into<String>) -> Self {
        Self::Conflict {
            entity,
            id: id.into(),
        }
    }

    pub fn encoding(msg: impl Into<String>) -> Self {
        Self::Encoding(msg.into())
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    pub fn is_duplicate(&self) -> bool {
        matches!(self, Self::Duplicate { .. })
    }

    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::Conflict { .. })
    }
}

/// Maps a unique-constraint name to the field it guards.
fn constrained_field(constraint: &str) -> &'static str {
    if constraint.contains("email") {
        "email"
    } else if constraint.contains("card_number") {
        "card_number"
    } else if constraint.contains("transaction_id") {
        "transaction_id"
    } else {
        "constraint"
    }
}

impl From<sqlx::Error> for DbError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => Self::NotFound {
                entity: "record",
                id: None,
            },
            sqlx::Error::Database(db_err) => {
                // 23505 = unique_violation, 23503 = foreign_key_violation
                let code = db_err.code().map(|c| c.into_owned());
                match code.as_deref() {
                    Some("23505") => {
                        let constraint = db_err.constraint().unwrap_or("unknown").to_string();
                        Self::Duplicate {
                            field: constrained_field(&constraint),
                            value: constraint,
                        }
                    }
                    Some("23503") => Self::Query(format!(
                        "Foreign key violation: {}",
                        db_err.constraint().unwrap_or("referenced record")
                    )),
                    _ => Self::Database(sqlx::Error::Database(db_err)),
                }
            }
            sqlx::Error::PoolTimedOut => Self::Pool("Connection pool timed out".to_string()),
            sqlx::Error::PoolClosed => Self::Pool("Connection pool is closed".to_string()),
            sqlx::Error::Io(io_err) => Self::Connection(io_err.to_string()),
            sqlx::Error::Tls(tls_err) => Self::Connection(format!("TLS error: {}", tls_err)),
            other => Self::Database(other),
        }
    }
}

pub type DbResult<T> = std::result::Result<T, DbError>;
