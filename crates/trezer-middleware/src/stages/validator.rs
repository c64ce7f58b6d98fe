//! Request body validator.
//!
//! Decoding rejects unknown fields (types opt in with
//! `#[serde(deny_unknown_fields)]`), then the decoded value checks its own
//! constraints through [`Validate`].

use crate::middleware::Middleware;
use parking_lot::RwLock;
use serde::de::DeserializeOwned;
use std::marker::PhantomData;
use tracing::Span;
use trezer_core::{BoxFuture, Fault, FaultResult, InvocationContext, Validate};

/// Decodes and validates JSON request bodies.
pub struct ValidatorMiddleware<Req, Res> {
    span: RwLock<Span>,
    _marker: PhantomData<fn(Req) -> Res>,
}

impl<Req, Res> ValidatorMiddleware<Req, Res> {
    /// Creates the middleware.
    #[must_use]
    pub fn new() -> Self {
        Self {
            span: RwLock::new(Span::none()),
            _marker: PhantomData,
        }
    }

    /// Decodes `json` into `T` and validates it.
    ///
    /// # Errors
    ///
    /// A validator fault classified by [`trezer_core::DecodeFailure`] when
    /// decoding fails, or a `BAD_REQUEST` validation fault listing every
    /// failed field.
    pub fn decode<T>(&self, json: &str) -> Result<T, Fault>
    where
        T: DeserializeOwned + Validate,
    {
        let value: T = serde_json::from_str(json).map_err(Fault::from_decode_error)?;
        value.validate().map_err(Fault::validation)?;
        tracing::trace!(parent: &*self.span.read(), "Request body validated");
        Ok(value)
    }
}

impl<Req, Res> Default for ValidatorMiddleware<Req, Res> {
    fn default() -> Self {
        Self::new()
    }
}

impl<Req, Res> std::fmt::Debug for ValidatorMiddleware<Req, Res> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ValidatorMiddleware").finish_non_exhaustive()
    }
}

impl<Req, Res> Middleware<Req, Res> for ValidatorMiddleware<Req, Res>
where
    Req: Send + Sync + 'static,
    Res: Send + 'static,
{
    fn name(&self) -> &'static str {
        "validator"
    }

    fn on_setup<'a>(
        &'a self,
        ctx: &'a InvocationContext,
        _first_request: &'a Req,
    ) -> BoxFuture<'a, FaultResult<()>> {
        Box::pin(async move {
            let span = tracing::info_span!(parent: &ctx.log_context().span(), "validator", commands = "Validator");
            tracing::debug!(parent: &span, "Creating validator");
            *self.span.write() = span;
            Ok(())
        })
    }

    fn on_before<'a>(
        &'a self,
        _ctx: &'a InvocationContext,
        _request: &'a Req,
    ) -> BoxFuture<'a, FaultResult<()>> {
        Box::pin(async { Ok(()) })
    }

    fn on_after<'a>(
        &'a self,
        _response: &'a mut Res,
        fault: Option<Fault>,
    ) -> BoxFuture<'a, Option<Fault>> {
        Box::pin(async move { fault })
    }

    fn on_shutdown(&self) -> BoxFuture<'_, ()> {
        Box::pin(async {})
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use trezer_core::ValidationErrors;

    #[derive(Debug, Deserialize)]
    #[serde(deny_unknown_fields)]
    struct NewPet {
        name: String,
        age: Option<u8>,
    }

    impl Validate for NewPet {
        fn validate(&self) -> Result<(), ValidationErrors> {
            let mut errors = ValidationErrors::new();
            if self.name.is_empty() {
                errors.add("NewPet", "Name", "required", self.name.clone());
            }
            errors.into_result()
        }
    }

    fn validator() -> ValidatorMiddleware<(), ()> {
        ValidatorMiddleware::new()
    }

    #[test]
    fn test_decode_valid_body() {
        let pet: NewPet = validator().decode(r#"{"name": "rex", "age": 3}"#).unwrap();
        assert_eq!(pet.name, "rex");
        assert_eq!(pet.age, Some(3));
    }

    #[test]
    fn test_decode_classifies_failures() {
        let cases = [
            (r#"{"name": "rex", "color": "red"}"#, "UNKNOWN_FIELD"),
            ("", "EMPTY_JSON"),
            (r#"{"name": "rex""#, "MALFORMED_JSON"),
            (r#"{"name": 12}"#, "WRONG_TYPE"),
        ];

        for (body, code) in cases {
            let fault = validator().decode::<NewPet>(body).unwrap_err();
            assert_eq!(fault.code(), code, "body {body:?}");
            assert!(fault.metadata().contains_key("unmarshall"));
        }
    }

    #[test]
    fn test_decode_runs_validation() {
        let fault = validator().decode::<NewPet>(r#"{"name": ""}"#).unwrap_err();
        assert_eq!(fault.code(), "BAD_REQUEST");
        assert_eq!(fault.message(), "Validation failed");
        let entries = fault.metadata()["validation"].as_array().unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0]["field"], "Name");
        assert_eq!(entries[0]["tag"], "required");
    }

    #[tokio::test]
    async fn test_hooks_are_passive() {
        let middleware = validator();
        let ctx = InvocationContext::new("req");
        middleware.on_setup(&ctx, &()).await.unwrap();
        middleware.on_before(&ctx, &()).await.unwrap();
        let fault = Fault::validator("BAD_REQUEST", "nope").build();
        assert_eq!(
            middleware.on_after(&mut (), Some(fault)).await.unwrap().code(),
            "BAD_REQUEST"
        );
    }
}
