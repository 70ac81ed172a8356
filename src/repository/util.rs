//! Repository utilities.

use diesel::result::{DatabaseErrorInformation, DatabaseErrorKind, Error};

/// Message-only error details for failures diesel has no variant for.
#[derive(Debug)]
struct Detail(String);

impl DatabaseErrorInformation for Detail {
    fn message(&self) -> &str {
        &self.0
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

/// Wrap a connection or configuration failure as a diesel error.
pub fn to_diesel_error(e: impl std::fmt::Display) -> Error {
    Error::DatabaseError(DatabaseErrorKind::Unknown, Box::new(Detail(e.to_string())))
}

/// Scheme of a database URL that names a server rather than a file.
///
/// `sqlite:` URLs and bare paths return `None`.
pub fn server_scheme(url: &str) -> Option<&str> {
    let (scheme, _) = url.split_once("://")?;
    if scheme.eq_ignore_ascii_case("sqlite") || scheme.is_empty() {
        return None;
    }
    Some(scheme)
}
