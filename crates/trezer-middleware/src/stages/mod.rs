//! Built-in middleware stages.
//!
//! Typical registration order for an API Gateway function:
//!
//! 1. [`logging`] - Install the subscriber and the invocation span
//! 2. [`api_gateway`] - Stamp response headers and shape error bodies
//! 3. resource middlewares (e.g. the SQL unit-of-work)
//! 4. adapters and use cases
//! 5. [`validator`] - Decode and validate request bodies
//!
//! After hooks run in reverse, so the API Gateway stage sees the final fault
//! of everything registered after it.

pub mod api_gateway;
pub mod logging;
pub mod validator;

pub use api_gateway::ApiGatewayMiddleware;
pub use logging::{LogFields, LoggingMiddleware};
pub use validator::ValidatorMiddleware;
