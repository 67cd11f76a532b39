use async_graphql::ErrorExtensions;

use crate::booking::{BookingError, ErrorKind};

/// Error type for resolvers that touch storage directly.
///
/// async-graphql converts anything `Display` via `?`, so the `Display` impl
/// decides what clients see: database detail is logged, never returned.
#[derive(Debug)]
pub enum GqlError {
    Sqlx(sqlx::Error),
    Uuid(uuid::Error),
    Custom(String),
}

impl GqlError {
    pub fn new(msg: impl Into<String>) -> Self {
        GqlError::Custom(msg.into())
    }
}

impl std::fmt::Display for GqlError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            GqlError::Sqlx(e) => {
                tracing::error!("Database error: {e}");
                write!(f, "Internal database error")
            }
            GqlError::Uuid(e) => write!(f, "Invalid ID: {e}"),
            GqlError::Custom(msg) => write!(f, "{msg}"),
        }
    }
}

impl std::error::Error for GqlError {}

impl From<sqlx::Error> for GqlError {
    fn from(e: sqlx::Error) -> Self {
        GqlError::Sqlx(e)
    }
}

impl From<uuid::Error> for GqlError {
    fn from(e: uuid::Error) -> Self {
        GqlError::Uuid(e)
    }
}

/// Converts any `Result<T, E: Display>` into a GraphQL result with a prefix.
///
/// Usage: `id.parse::<i64>().gql_err("Invalid booking ID")?`
pub trait ResultExt<T> {
    fn gql_err(self, context: &str) -> std::result::Result<T, async_graphql::Error>;
}

impl<T, E: std::fmt::Display> ResultExt<T> for std::result::Result<T, E> {
    fn gql_err(self, context: &str) -> std::result::Result<T, async_graphql::Error> {
        self.map_err(|e| async_graphql::Error::new(format!("{context}: {e}")))
    }
}

/// Booking errors carry their machine code in `extensions.code`.
impl ErrorExtensions for BookingError {
    fn extend(&self) -> async_graphql::Error {
        let kind = self.kind();
        if kind == ErrorKind::Internal {
            tracing::error!("Booking operation failed: {:?}", self);
        }

        async_graphql::Error::new(self.to_string()).extend_with(|_, e| e.set("code", kind.code()))
    }
}

/// `.gql()` on engine results.
pub trait BookingResultExt<T> {
    fn gql(self) -> async_graphql::Result<T>;
}

impl<T> BookingResultExt<T> for Result<T, BookingError> {
    fn gql(self) -> async_graphql::Result<T> {
        self.map_err(|e| e.extend())
    }
}
