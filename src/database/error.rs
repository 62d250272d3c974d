use std::fmt::{self, Display};

use potion::{Error, HtmlError};

pub struct QueryError {
    info: String,
    invalid: bool,
}

impl QueryError {
    pub fn new(info: String) -> Self {
        Self {
            info,
            invalid: false,
        }
    }

    /// Errors caused by the request data rather than the database itself.
    pub fn invalid(info: String) -> Self {
        Self {
            info,
            invalid: true,
        }
    }
}

impl From<sqlx::Error> for QueryError {
    fn from(value: sqlx::Error) -> Self {
        match value {
            sqlx::Error::Database(e) if e.is_unique_violation() => Self::invalid(format!(
                "Already exists ({})",
                e.constraint().unwrap_or("unique")
            )),
            sqlx::Error::Database(e) if e.is_foreign_key_violation() => Self::invalid(format!(
                "Referenced object does not exist ({})",
                e.constraint().unwrap_or("foreign key")
            )),
            sqlx::Error::Database(e) if e.is_check_violation() => Self::invalid(format!(
                "Constraint failed ({})",
                e.constraint().unwrap_or("check")
            )),
            sqlx::Error::Configuration(e) => Self::new(format!("{e}")),
            sqlx::Error::Database(e) => Self::new(format!("{e}")),
            sqlx::Error::Io(e) => Self::new(format!("{e}")),
            sqlx::Error::Tls(e) => Self::new(format!("{e}")),
            sqlx::Error::Protocol(e) => Self::new(format!("{e}")),
            sqlx::Error::RowNotFound => Self::new(format!("RowNotFound")),
            sqlx::Error::TypeNotFound { type_name } => {
                Self::new(format!("Type not found: {type_name}"))
            }
            sqlx::Error::ColumnIndexOutOfBounds { index, len } => {
                Self::new(format!("Column index out of bounds {index} ({len})"))
            }
            sqlx::Error::ColumnNotFound(e) => Self::new(format!("{e}")),
            sqlx::Error::ColumnDecode { index, source } => {
                Self::new(format!("Column decode {index} ({source})"))
            }
            sqlx::Error::Decode(e) => Self::new(format!("{e}")),
            sqlx::Error::PoolTimedOut => Self::new(format!("Pool timed out")),
            sqlx::Error::PoolClosed => Self::new(format!("Pool closed")),
            sqlx::Error::WorkerCrashed => Self::new(format!("Worker crashed")),
            sqlx::Error::Migrate(e) => Self::new(format!("{e}")),
            _ => Self::new(format!("Unknown error")),
        }
    }
}

impl From<QueryError> for Error {
    fn from(value: QueryError) -> Self {
        if value.invalid {
            return HtmlError::InvalidRequest.new(&value.info);
        }

        log::error!("Query failed: {}", value.info);
        Error {
            code: 500,
            info: Some(value.info),
            redirect: None,
        }
    }
}

pub struct CacheError {
    info: String,
}

impl From<redis::RedisError> for CacheError {
    fn from(value: redis::RedisError) -> Self {
        Self {
            info: format!("{:?} - {:?}", value.code(), value.detail()),
        }
    }
}

impl From<CacheError> for Error {
    fn from(value: CacheError) -> Self {
        Error {
            code: 500,
            info: Some(value.info),
            redirect: None,
        }
    }
}

#[derive(Debug)]
pub struct TypeError {
    info: String,
}

impl TypeError {
    pub fn new(info: &str) -> Self {
        Self {
            info: info.to_string(),
        }
    }

    pub fn info(&self) -> &str {
        &self.info
    }
}

impl From<TypeError> for Error {
    fn from(value: TypeError) -> Self {
        HtmlError::InvalidRequest.new(&value.info)
    }
}

impl Display for TypeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({})", self.info)
    }
}

impl std::error::Error for TypeError {}

pub fn invalid_request(info: &str) -> Error {
    HtmlError::InvalidRequest.new(info)
}

pub fn unauthorized(info: &str) -> Error {
    Error {
        code: 401,
        info: Some(info.to_string()),
        redirect: None,
    }
}

pub fn forbidden(info: &str) -> Error {
    Error {
        code: 403,
        info: Some(info.to_string()),
        redirect: None,
    }
}

pub fn not_found(info: &str) -> Error {
    Error {
        code: 404,
        info: Some(info.to_string()),
        redirect: None,
    }
}
