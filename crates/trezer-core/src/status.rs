//! Transport status classification.
//!
//! The boundary is the only place where a semantic fault code turns into an
//! externally visible status. Every other layer deals in codes only.

use http::StatusCode;

/// Codes with a fixed client-error classification. Anything else is a server error.
const CLIENT_ERROR_CODES: &[&str] = &[
    "UNKNOWN_FIELD",
    "MALFORMED_JSON",
    "EMPTY_JSON",
    "WRONG_TYPE",
    "BAD_REQUEST",
];

/// Derives a transport status from a fault code.
///
/// Decoding and validation codes map to `400 Bad Request`. Every other code,
/// including `INTERNAL_MARSHALING_ERROR` and codes this table has never seen,
/// maps to `500 Internal Server Error`.
///
/// # Example
///
/// ```
/// use http::StatusCode;
/// use trezer_core::status::status_for_code;
///
/// assert_eq!(status_for_code("WRONG_TYPE"), StatusCode::BAD_REQUEST);
/// assert_eq!(status_for_code("SOMETHING_ELSE"), StatusCode::INTERNAL_SERVER_ERROR);
/// ```
#[must_use]
pub fn status_for_code(code: &str) -> StatusCode {
    if CLIENT_ERROR_CODES.contains(&code) {
        StatusCode::BAD_REQUEST
    } else {
        StatusCode::INTERNAL_SERVER_ERROR
    }
}
