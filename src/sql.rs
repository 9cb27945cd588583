use std::str::FromStr;

use tokio_postgres::{Error as PgError};
use tokio_postgres::error::SqlState;

pub fn mime_from_sql(value: &str) -> mime::Mime {
    mime::Mime::from_str(value).unwrap_or(mime::APPLICATION_OCTET_STREAM)
}

pub fn try_u64_from_sql(value: i64) -> Option<u64> {
    if value >= 0 {
        Some(value as u64)
    } else {
        None
    }
}

/// negative values are clamped to zero, the columns carry check constraints
#[inline]
pub fn u64_from_sql(value: i64) -> u64 {
    try_u64_from_sql(value).unwrap_or(0)
}

#[inline]
pub fn u64_to_sql(value: u64) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}

#[inline]
pub fn u32_from_sql(value: i32) -> u32 {
    u32::try_from(value).unwrap_or(0)
}

#[inline]
pub fn u32_to_sql(value: u32) -> i32 {
    i32::try_from(value).unwrap_or(i32::MAX)
}

pub fn unique_constraint_error(error: &PgError) -> Option<&str> {
    let Some(db_error) = error.as_db_error() else {
        return None;
    };

    if *db_error.code() == SqlState::UNIQUE_VIOLATION {
        db_error.constraint()
    } else {
        None
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn integer_conversions() {
        assert_eq!(u64_from_sql(-1), 0);
        assert_eq!(u64_from_sql(42), 42);
        assert_eq!(u64_to_sql(u64::MAX), i64::MAX);
        assert_eq!(u32_from_sql(-5), 0);
        assert_eq!(u32_to_sql(7), 7);
    }

    #[test]
    fn mime_fallback() {
        assert_eq!(mime_from_sql("text/plain"), mime::TEXT_PLAIN);
        assert_eq!(mime_from_sql("not a mime"), mime::APPLICATION_OCTET_STREAM);
    }
}
