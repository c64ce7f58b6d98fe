//! Decoding-failure taxonomy.
//!
//! JSON decoders report failures as text. [`DecodeFailure::classify`] maps the
//! few shapes worth telling apart onto stable codes. The mapping is a
//! best-effort table over message text and is not exhaustive: anything it does
//! not recognise is reported as [`DecodeFailure::BadRequest`].

use crate::fault::Fault;
use regex::Regex;
use serde_json::json;
use std::error::Error as StdError;
use std::sync::OnceLock;

/// Message fragments that indicate syntactically broken input.
const MALFORMED_MARKERS: &[&str] = &[
    "EOF while parsing",
    "expected value",
    "expected `,`",
    "expected `:`",
    "key must be a string",
    "trailing characters",
    "invalid escape",
    "control character",
    "expected ident",
    "invalid number",
];

/// Input was empty: the decoder hit end of input before any value.
const EMPTY_MARKER: &str = "EOF while parsing a value at line 1 column 0";

fn wrong_type_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"invalid (?:type|value): (.+?), expected (.+)").expect("valid regex")
    })
}

/// Closed set of decode failure sub-kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DecodeFailure {
    /// The payload names a field the target type does not have.
    UnknownField,
    /// The payload is not well-formed JSON.
    MalformedJson,
    /// The payload is empty.
    EmptyJson,
    /// A value has the wrong JSON type for its field.
    WrongType,
    /// The decoder itself failed.
    InternalMarshaling,
    /// Anything else.
    BadRequest,
}

impl DecodeFailure {
    /// Classifies a decoder error message. First match wins.
    ///
    /// # Example
    ///
    /// ```
    /// use trezer_core::DecodeFailure;
    ///
    /// let err = serde_json::from_str::<u32>("\"seven\"").unwrap_err();
    /// assert_eq!(DecodeFailure::classify(&err.to_string()), DecodeFailure::WrongType);
    /// ```
    #[must_use]
    pub fn classify(message: &str) -> Self {
        if message.contains("unknown field") {
            Self::UnknownField
        } else if message.contains(EMPTY_MARKER) {
            Self::EmptyJson
        } else if MALFORMED_MARKERS.iter().any(|m| message.contains(m)) {
            Self::MalformedJson
        } else if wrong_type_pattern().is_match(message) {
            Self::WrongType
        } else if message.contains("recursion limit exceeded") {
            Self::InternalMarshaling
        } else {
            Self::BadRequest
        }
    }

    /// The fault code for this failure.
    #[must_use]
    pub const fn code(self) -> &'static str {
        match self {
            Self::UnknownField => "UNKNOWN_FIELD",
            Self::MalformedJson => "MALFORMED_JSON",
            Self::EmptyJson => "EMPTY_JSON",
            Self::WrongType => "WRONG_TYPE",
            Self::InternalMarshaling => "INTERNAL_MARSHALING_ERROR",
            Self::BadRequest => "BAD_REQUEST",
        }
    }

    /// The fault message for this failure.
    #[must_use]
    pub const fn message(self) -> &'static str {
        match self {
            Self::UnknownField => "Cannot unmarshall the provided JSON : unknown field",
            Self::MalformedJson => "Cannot unmarshall the provided JSON because its malformed",
            Self::EmptyJson => "Cannot unmarshall the provided JSON because it's empty",
            Self::WrongType => "Cannot unmarshall the provided JSON because a wrong type is used",
            Self::InternalMarshaling => {
                "Cannot unmarshall the provided JSON because of an internal error"
            }
            Self::BadRequest => "Cannot unmarshall the provided JSON",
        }
    }
}

impl Fault {
    /// Builds a validator fault from a raw decode error.
    ///
    /// The code comes from [`DecodeFailure::classify`]; the decoder's own text
    /// is kept under the `unmarshall` metadata entry.
    #[must_use]
    pub fn from_decode_error<E>(err: E) -> Fault
    where
        E: StdError + Send + Sync + 'static,
    {
        let text = err.to_string();
        let failure = DecodeFailure::classify(&text);
        Fault::validator(failure.code(), failure.message())
            .meta("unmarshall", json!({ "message": text }))
            .cause(err)
            .build()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Deserialize)]
    #[serde(deny_unknown_fields)]
    #[allow(dead_code)]
    struct Body {
        name: String,
        age: u32,
    }

    fn classify(input: &str) -> DecodeFailure {
        let err = serde_json::from_str::<Body>(input).unwrap_err();
        DecodeFailure::classify(&err.to_string())
    }

    #[test]
    fn test_unknown_field() {
        assert_eq!(
            classify(r#"{"name":"rex","age":3,"color":"red"}"#),
            DecodeFailure::UnknownField
        );
    }

    #[test]
    fn test_empty_payload() {
        assert_eq!(classify(""), DecodeFailure::EmptyJson);
    }

    #[test]
    fn test_malformed_payload() {
        assert_eq!(classify(r#"{"name":"rex","#), DecodeFailure::MalformedJson);
        assert_eq!(classify("{name}"), DecodeFailure::MalformedJson);
        assert_eq!(classify(r#"{"name":"rex","age":3}x"#), DecodeFailure::MalformedJson);
    }

    #[test]
    fn test_wrong_type() {
        assert_eq!(classify(r#"{"name":12,"age":3}"#), DecodeFailure::WrongType);
        assert_eq!(classify(r#"{"name":"rex","age":-1}"#), DecodeFailure::WrongType);
    }

    #[test]
    fn test_missing_field_is_bad_request() {
        assert_eq!(classify(r#"{"name":"rex"}"#), DecodeFailure::BadRequest);
    }

    #[test]
    fn test_internal_marshaling() {
        assert_eq!(
            DecodeFailure::classify("recursion limit exceeded at line 1 column 129"),
            DecodeFailure::InternalMarshaling
        );
    }

    #[test]
    fn test_fault_from_decode_error() {
        let err = serde_json::from_str::<Body>("").unwrap_err();
        let fault = Fault::from_decode_error(err);

        assert_eq!(fault.code(), "EMPTY_JSON");
        assert_eq!(fault.component(), "Validator");
        let unmarshall = fault.metadata().get("unmarshall").unwrap();
        assert!(unmarshall["message"]
            .as_str()
            .unwrap()
            .starts_with("EOF while parsing"));
        assert!(fault.cause().is_some());
    }
}
