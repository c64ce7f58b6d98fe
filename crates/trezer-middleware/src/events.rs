//! Event payloads delivered by the host.
//!
//! Wire-compatible with the API Gateway proxy integration and SQS event
//! shapes. Maps the host may send as `null` deserialize to empty maps.

use serde::{Deserialize, Deserializer, Serialize};
use std::collections::HashMap;

fn nullable<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// API Gateway proxy integration request.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ApiGatewayProxyRequest {
    /// Resource path template.
    pub resource: String,
    /// Request path.
    pub path: String,
    /// HTTP method.
    pub http_method: String,
    /// Single-value headers.
    #[serde(deserialize_with = "nullable")]
    pub headers: HashMap<String, String>,
    /// Multi-value headers.
    #[serde(deserialize_with = "nullable")]
    pub multi_value_headers: HashMap<String, Vec<String>>,
    /// Single-value query string parameters.
    #[serde(deserialize_with = "nullable")]
    pub query_string_parameters: HashMap<String, String>,
    /// Multi-value query string parameters.
    #[serde(deserialize_with = "nullable")]
    pub multi_value_query_string_parameters: HashMap<String, Vec<String>>,
    /// Path parameters.
    #[serde(deserialize_with = "nullable")]
    pub path_parameters: HashMap<String, String>,
    /// Stage variables.
    #[serde(deserialize_with = "nullable")]
    pub stage_variables: HashMap<String, String>,
    /// Request context populated by API Gateway.
    pub request_context: ApiGatewayRequestContext,
    /// Raw body.
    pub body: Option<String>,
    /// Whether `body` is base64 encoded.
    pub is_base64_encoded: bool,
}

impl ApiGatewayProxyRequest {
    /// Returns the request with the given method and path.
    pub fn new(http_method: impl Into<String>, path: impl Into<String>) -> Self {
        let path = path.into();
        let http_method = http_method.into();
        Self {
            resource: path.clone(),
            path: path.clone(),
            http_method: http_method.clone(),
            request_context: ApiGatewayRequestContext {
                http_method,
                path,
                ..ApiGatewayRequestContext::default()
            },
            ..Self::default()
        }
    }

    /// Sets a query string parameter.
    #[must_use]
    pub fn with_query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        let (key, value) = (key.into(), value.into());
        self.multi_value_query_string_parameters
            .entry(key.clone())
            .or_default()
            .push(value.clone());
        self.query_string_parameters.insert(key, value);
        self
    }

    /// Sets the body.
    #[must_use]
    pub fn with_body(mut self, body: impl Into<String>) -> Self {
        self.body = Some(body.into());
        self
    }

    /// Sets the request id and request time of the request context.
    #[must_use]
    pub fn with_request_id(
        mut self,
        request_id: impl Into<String>,
        request_time: impl Into<String>,
    ) -> Self {
        self.request_context.request_id = request_id.into();
        self.request_context.request_time = request_time.into();
        self
    }
}

/// Request context of an API Gateway proxy request.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ApiGatewayRequestContext {
    /// AWS account id.
    pub account_id: String,
    /// Resource id.
    pub resource_id: String,
    /// Deployment stage.
    pub stage: String,
    /// API Gateway request id.
    pub request_id: String,
    /// Formatted request time.
    pub request_time: String,
    /// Request time as epoch milliseconds.
    pub request_time_epoch: i64,
    /// HTTP method.
    pub http_method: String,
    /// Request path.
    pub path: String,
    /// Custom domain name, if any.
    pub domain_name: String,
    /// API id.
    pub api_id: String,
}

/// API Gateway proxy integration response.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ApiGatewayProxyResponse {
    /// HTTP status code. `0` means unset.
    pub status_code: u16,
    /// Single-value headers.
    pub headers: HashMap<String, String>,
    /// Multi-value headers.
    pub multi_value_headers: HashMap<String, Vec<String>>,
    /// Response body.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,
    /// Whether `body` is base64 encoded.
    pub is_base64_encoded: bool,
}

/// SQS event carrying a batch of messages.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SqsEvent {
    /// Messages in the batch.
    #[serde(rename = "Records", default)]
    pub records: Vec<SqsMessage>,
}

/// One SQS message.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SqsMessage {
    /// Message id.
    pub message_id: String,
    /// Receipt handle used to delete the message.
    pub receipt_handle: String,
    /// Message body.
    pub body: String,
    /// System attributes.
    #[serde(deserialize_with = "nullable")]
    pub attributes: HashMap<String, String>,
    /// User attributes.
    #[serde(deserialize_with = "nullable")]
    pub message_attributes: HashMap<String, serde_json::Value>,
    /// MD5 digest of the body.
    pub md5_of_body: String,
    /// Always `aws:sqs`.
    pub event_source: String,
    /// Queue ARN.
    #[serde(rename = "eventSourceARN")]
    pub event_source_arn: String,
    /// Queue region.
    pub aws_region: String,
}

/// Partial batch failure report for SQS.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SqsBatchResponse {
    /// Messages to make visible again.
    pub batch_item_failures: Vec<SqsBatchItemFailure>,
}

/// One failed SQS message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SqsBatchItemFailure {
    /// The failed message id.
    pub item_identifier: String,
}
