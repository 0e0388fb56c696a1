//! Shared error mapping and numeric casts for the Diesel repositories.
//!
//! Every sync port error exposes `connection` and `query` constructors, so the
//! mapping is written once against those two callbacks.

use tracing::debug;

use super::pool::PoolError;

/// Map a pool failure into the port's connection error.
pub fn map_pool_error<E, C>(error: PoolError, connection: C) -> E
where
    C: FnOnce(String) -> E,
{
    match error {
        PoolError::Checkout { message } | PoolError::Build { message } => connection(message),
    }
}

/// Map a Diesel failure into the port's query or connection error.
///
/// Unique and foreign key violations keep their database message; anything
/// else is reduced to a fixed phrase and logged at debug.
pub fn map_diesel_error<E, Q, C>(error: diesel::result::Error, query: Q, connection: C) -> E
where
    Q: FnOnce(String) -> E,
    C: FnOnce(String) -> E,
{
    use diesel::result::{DatabaseErrorKind, Error as DieselError};

    match &error {
        DieselError::DatabaseError(kind, info) => {
            debug!(?kind, message = info.message(), "diesel operation failed");
        }
        _ => debug!(
            error_type = %std::any::type_name_of_val(&error),
            "diesel operation failed"
        ),
    }

    match error {
        DieselError::NotFound => query("record not found".to_owned()),
        DieselError::QueryBuilderError(_) => query("database query error".to_owned()),
        DieselError::DatabaseError(DatabaseErrorKind::ClosedConnection, _) => {
            connection("database connection error".to_owned())
        }
        DieselError::DatabaseError(
            DatabaseErrorKind::UniqueViolation | DatabaseErrorKind::ForeignKeyViolation,
            info,
        ) => query(info.message().to_owned()),
        DieselError::DatabaseError(_, _) => query("database error".to_owned()),
        _ => query("database error".to_owned()),
    }
}

/// Counter to `BIGINT`, saturating at `i64::MAX`.
pub fn count_to_db(value: u64) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}

/// `BIGINT` counter back to `u64`; negative values read as zero.
pub fn count_from_db(value: i64) -> u64 {
    u64::try_from(value).unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use diesel::result::{DatabaseErrorInformation, DatabaseErrorKind, Error as DieselError};
    use rstest::rstest;

    #[derive(Debug, PartialEq, Eq)]
    enum Mapped {
        Query(String),
        Connection(String),
    }

    struct Info(&'static str);

    impl DatabaseErrorInformation for Info {
        fn message(&self) -> &str {
            self.0
        }
        fn details(&self) -> Option<&str> {
            None
        }
        fn hint(&self) -> Option<&str> {
            None
        }
        fn table_name(&self) -> Option<&str> {
            None
        }
        fn column_name(&self) -> Option<&str> {
            None
        }
        fn constraint_name(&self) -> Option<&str> {
            None
        }
        fn statement_position(&self) -> Option<i32> {
            None
        }
    }

    fn map(error: DieselError) -> Mapped {
        map_diesel_error(error, Mapped::Query, Mapped::Connection)
    }

    #[rstest]
    fn pool_errors_become_connection_errors() {
        let mapped = map_pool_error(PoolError::checkout("refused"), Mapped::Connection);
        assert_eq!(mapped, Mapped::Connection("refused".to_owned()));
    }

    #[rstest]
    fn closed_connection_is_a_connection_error() {
        let error = DieselError::DatabaseError(
            DatabaseErrorKind::ClosedConnection,
            Box::new(Info("server closed the connection")),
        );
        assert_eq!(
            map(error),
            Mapped::Connection("database connection error".to_owned())
        );
    }

    #[rstest]
    fn constraint_violations_keep_the_database_message() {
        let error = DieselError::DatabaseError(
            DatabaseErrorKind::ForeignKeyViolation,
            Box::new(Info("insert on messages violates foreign key")),
        );
        assert_eq!(
            map(error),
            Mapped::Query("insert on messages violates foreign key".to_owned())
        );
    }

    #[rstest]
    fn other_failures_are_generic_query_errors() {
        assert_eq!(map(DieselError::NotFound), Mapped::Query("record not found".to_owned()));
        assert_eq!(
            map(DieselError::RollbackTransaction),
            Mapped::Query("database error".to_owned())
        );
    }

    #[rstest]
    #[case(0, 0)]
    #[case(42, 42)]
    #[case(u64::MAX, i64::MAX)]
    fn counts_saturate_into_bigint(#[case] value: u64, #[case] expected: i64) {
        assert_eq!(count_to_db(value), expected);
    }

    #[rstest]
    fn negative_counts_read_as_zero() {
        assert_eq!(count_from_db(-3), 0);
        assert_eq!(count_from_db(7), 7);
    }
}
