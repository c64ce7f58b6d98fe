//! API Gateway proxy middleware.
//!
//! Stamps every response with the gateway's `requestId` and `requestTime`
//! and turns the final fault of an invocation into a JSON error body:
//!
//! ```json
//! {
//!   "statusCode": 404,
//!   "code": "PET_NOT_FOUND",
//!   "message": "Pet not found",
//!   "metadata": { "id": "...", "requestId": "...", "requestTime": "..." }
//! }
//! ```
//!
//! The fault is consumed: the host receives a well-formed response instead
//! of a function error. Handlers pick the status through [`ko`], [`ko_from`]
//! or [`ko_classified`]; any other fault is answered with a 500.

use crate::events::{ApiGatewayProxyRequest, ApiGatewayProxyResponse};
use crate::middleware::Middleware;
use http::StatusCode;
use parking_lot::RwLock;
use serde::Serialize;
use serde_json::Value;
use trezer_core::{BoxFuture, Fault, FaultKind, FaultResult, InvocationContext, Metadata};

/// Response header carrying the gateway request id.
pub const REQUEST_ID_HEADER: &str = "requestId";

/// Response header carrying the gateway request time.
pub const REQUEST_TIME_HEADER: &str = "requestTime";

const CONTENT_TYPE: &str = "Content-Type";
const APPLICATION_JSON: &str = "application/json";

#[derive(Debug, Clone, Default)]
struct Stamp {
    request_id: String,
    request_time: String,
}

impl Stamp {
    fn of(request: &ApiGatewayProxyRequest) -> Self {
        Self {
            request_id: request.request_context.request_id.clone(),
            request_time: request.request_context.request_time.clone(),
        }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ErrorBody<'a> {
    status_code: u16,
    code: &'a str,
    message: &'a str,
    metadata: Metadata,
}

/// Shapes API Gateway proxy responses.
#[derive(Debug, Default)]
pub struct ApiGatewayMiddleware {
    stamp: RwLock<Stamp>,
}

impl ApiGatewayMiddleware {
    /// Creates the middleware.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn capture(&self, request: &ApiGatewayProxyRequest) {
        *self.stamp.write() = Stamp::of(request);
    }

    // Writes the error body. Returns a fault only if the body cannot be encoded.
    fn write_error(
        stamp: &Stamp,
        response: &mut ApiGatewayProxyResponse,
        fault: &Fault,
    ) -> Option<Fault> {
        let status = match (fault.kind(), fault.status()) {
            (FaultKind::Transport, Some(status)) => status,
            _ => {
                tracing::warn!(
                    code = fault.code(),
                    "Error type is a Fault but should be an ApiGatewayFault with a status code, so choosing 500 by default"
                );
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };

        let mut metadata = fault.metadata().clone();
        metadata.insert(REQUEST_ID_HEADER.to_string(), Value::from(stamp.request_id.as_str()));
        metadata.insert(
            REQUEST_TIME_HEADER.to_string(),
            Value::from(stamp.request_time.as_str()),
        );

        let body = ErrorBody {
            status_code: status.as_u16(),
            code: fault.code(),
            message: fault.message(),
            metadata,
        };

        match serde_json::to_string(&body) {
            Ok(json) => {
                response.status_code = status.as_u16();
                response.body = Some(json);
                response
                    .headers
                    .insert(CONTENT_TYPE.to_string(), APPLICATION_JSON.to_string());
                None
            }
            Err(err) => {
                response.status_code = StatusCode::INTERNAL_SERVER_ERROR.as_u16();
                response.body = None;
                Some(
                    Fault::transport(
                        StatusCode::INTERNAL_SERVER_ERROR,
                        "ERROR_MARSHALL_JSON",
                        "Cannot marshall the error body",
                    )
                    .meta("marshall", serde_json::json!({ "message": err.to_string() }))
                    .cause(err)
                    .build(),
                )
            }
        }
    }
}

impl Middleware<ApiGatewayProxyRequest, ApiGatewayProxyResponse> for ApiGatewayMiddleware {
    fn name(&self) -> &'static str {
        "api_gateway"
    }

    fn on_setup<'a>(
        &'a self,
        _ctx: &'a InvocationContext,
        first_request: &'a ApiGatewayProxyRequest,
    ) -> BoxFuture<'a, FaultResult<()>> {
        Box::pin(async move {
            self.capture(first_request);
            Ok(())
        })
    }

    fn on_before<'a>(
        &'a self,
        _ctx: &'a InvocationContext,
        request: &'a ApiGatewayProxyRequest,
    ) -> BoxFuture<'a, FaultResult<()>> {
        Box::pin(async move {
            self.capture(request);
            Ok(())
        })
    }

    fn on_after<'a>(
        &'a self,
        response: &'a mut ApiGatewayProxyResponse,
        fault: Option<Fault>,
    ) -> BoxFuture<'a, Option<Fault>> {
        Box::pin(async move {
            let stamp = self.stamp.read().clone();
            response
                .headers
                .insert(REQUEST_ID_HEADER.to_string(), stamp.request_id.clone());
            response
                .headers
                .insert(REQUEST_TIME_HEADER.to_string(), stamp.request_time.clone());

            match fault {
                Some(fault) => Self::write_error(&stamp, response, &fault),
                None => None,
            }
        })
    }

    fn on_shutdown(&self) -> BoxFuture<'_, ()> {
        Box::pin(async {})
    }
}

/// Builds a 200 response with `body` encoded as JSON.
///
/// # Errors
///
/// Returns an `ERROR_MARSHALL_JSON` transport fault (500) if `body` cannot be
/// encoded.
pub fn ok<T: Serialize + ?Sized>(body: &T) -> Result<ApiGatewayProxyResponse, Fault> {
    let json = serde_json::to_string(body).map_err(|err| {
        Fault::transport(
            StatusCode::INTERNAL_SERVER_ERROR,
            "ERROR_MARSHALL_JSON",
            "Cannot marshall the response body",
        )
        .meta("marshall", serde_json::json!({ "message": err.to_string() }))
        .cause(err)
        .build()
    })?;

    let mut response = ApiGatewayProxyResponse {
        status_code: StatusCode::OK.as_u16(),
        body: Some(json),
        ..ApiGatewayProxyResponse::default()
    };
    response
        .headers
        .insert(CONTENT_TYPE.to_string(), APPLICATION_JSON.to_string());
    Ok(response)
}

/// Builds a 204 response with no body.
#[must_use]
pub fn ok_empty() -> ApiGatewayProxyResponse {
    ApiGatewayProxyResponse {
        status_code: StatusCode::NO_CONTENT.as_u16(),
        ..ApiGatewayProxyResponse::default()
    }
}

/// Builds a transport fault answered with `status`.
#[must_use]
pub fn ko(
    status: StatusCode,
    code: impl Into<String>,
    message: impl Into<String>,
    metadata: Option<Metadata>,
) -> Fault {
    Fault::transport(status, code, message)
        .metadata(metadata.unwrap_or_default())
        .build()
}

/// Answers an existing fault with `status`, keeping its code and message.
#[must_use]
pub fn ko_from(status: StatusCode, fault: Fault) -> Fault {
    Fault::transport_from(status, fault)
}

/// Answers an existing fault with the status its code maps to.
#[must_use]
pub fn ko_classified(fault: Fault) -> Fault {
    Fault::transport_classified(fault)
}
