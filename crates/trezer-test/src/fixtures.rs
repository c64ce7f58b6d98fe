//! Fixture events.

use serde::Serialize;
use trezer_middleware::events::{ApiGatewayProxyRequest, SqsEvent, SqsMessage};

/// Request id stamped on fixture API Gateway requests.
pub const FIXTURE_REQUEST_ID: &str = "c6af9ac6-7b61-11e6-9a41-93e8deadbeef";

/// Request time stamped on fixture API Gateway requests.
pub const FIXTURE_REQUEST_TIME: &str = "09/Apr/2015:12:34:56 +0000";

/// A `GET` request with the given query parameters.
#[must_use]
pub fn api_gateway_get(path: &str, query: &[(&str, &str)]) -> ApiGatewayProxyRequest {
    query.iter().fold(
        ApiGatewayProxyRequest::new("GET", path)
            .with_request_id(FIXTURE_REQUEST_ID, FIXTURE_REQUEST_TIME),
        |request, (key, value)| request.with_query(*key, *value),
    )
}

/// A `POST` request with a raw body.
#[must_use]
pub fn api_gateway_post(path: &str, body: &str) -> ApiGatewayProxyRequest {
    ApiGatewayProxyRequest::new("POST", path)
        .with_request_id(FIXTURE_REQUEST_ID, FIXTURE_REQUEST_TIME)
        .with_body(body)
}

/// A `POST` request with `body` encoded as JSON.
///
/// # Panics
///
/// Panics if `body` cannot be encoded.
#[must_use]
pub fn api_gateway_post_json<T: Serialize>(path: &str, body: &T) -> ApiGatewayProxyRequest {
    let json = serde_json::to_string(body).expect("fixture body must encode");
    api_gateway_post(path, &json)
}

/// An SQS event with one message per body.
#[must_use]
pub fn sqs_event(bodies: &[&str]) -> SqsEvent {
    SqsEvent {
        records: bodies
            .iter()
            .enumerate()
            .map(|(index, body)| SqsMessage {
                message_id: format!("message-{index}"),
                receipt_handle: format!("receipt-{index}"),
                body: (*body).to_string(),
                event_source: "aws:sqs".to_string(),
                event_source_arn: "arn:aws:sqs:eu-west-3:123456789012:fixture".to_string(),
                aws_region: "eu-west-3".to_string(),
                ..SqsMessage::default()
            })
            .collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_fixture() {
        let request = api_gateway_get("/pets", &[("id", "42")]);
        assert_eq!(request.http_method, "GET");
        assert_eq!(request.query_string_parameters["id"], "42");
        assert_eq!(request.request_context.request_id, FIXTURE_REQUEST_ID);
    }

    #[test]
    fn test_post_json_fixture() {
        let request = api_gateway_post_json("/pets", &serde_json::json!({"name": "rex"}));
        assert_eq!(request.body.as_deref(), Some(r#"{"name":"rex"}"#));
    }

    #[test]
    fn test_sqs_fixture() {
        let event = sqs_event(&["a", "b"]);
        assert_eq!(event.records.len(), 2);
        assert_eq!(event.records[1].message_id, "message-1");
    }
}
