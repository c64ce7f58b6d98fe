//! SQLSTATE classification.
//!
//! Store errors surface as SQL faults whose code names the Postgres error
//! condition. Only the conditions an adapter is expected to branch on are
//! named; every other state falls back to [`SQL_ERROR`].

/// Fallback code for unclassified database errors.
pub const SQL_ERROR: &str = "SQL_ERROR";

/// Code for syntax and access rule violations (SQLSTATE class `42`).
pub const PREPARED_STATEMENT_FAILED: &str = "PREPARED_STATEMENT_FAILED";

const NAMED: &[(&str, &str)] = &[
    ("23505", "UNIQUE_VIOLATION"),
    ("23503", "FOREIGN_KEY_VIOLATION"),
    ("23502", "NOT_NULL_VIOLATION"),
    ("23514", "CHECK_VIOLATION"),
    ("40001", "SERIALIZATION_FAILURE"),
    ("40P01", "DEADLOCK_DETECTED"),
    ("57014", "QUERY_CANCELED"),
];

/// Maps a SQLSTATE to the fault code adapters match on.
///
/// ```
/// use trezer_sql::sqlstate::code_name;
///
/// assert_eq!(code_name("23505"), "UNIQUE_VIOLATION");
/// assert_eq!(code_name("42703"), "PREPARED_STATEMENT_FAILED");
/// assert_eq!(code_name("XX000"), "SQL_ERROR");
/// ```
pub fn code_name(sqlstate: &str) -> &'static str {
    if let Some((_, name)) = NAMED.iter().find(|(state, _)| *state == sqlstate) {
        return name;
    }
    if sqlstate.len() == 5 && sqlstate.starts_with("42") {
        return PREPARED_STATEMENT_FAILED;
    }
    SQL_ERROR
}
