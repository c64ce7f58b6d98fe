//! `GET /pet?id=<uuid>`.

use http::StatusCode;
use std::sync::Arc;
use trezer_core::{handler_fn, Fault, FaultResult, InvocationContext};
use trezer_middleware::stages::api_gateway;
use trezer_middleware::Pipeline;
use uuid::Uuid;

use super::{PetStack, Request, Response};
use crate::usecase::PetUseCase;

fn bad_request(message: &str) -> Fault {
    api_gateway::ko_classified(Fault::validator("BAD_REQUEST", message).build())
}

/// Answers with the pet named by the `id` query parameter.
///
/// # Errors
///
/// 400 when `id` is missing, unparsable or not the only parameter, 404
/// when no pet matches, 500 otherwise.
pub async fn handle(
    use_case: &PetUseCase<Request, Response>,
    request: Request,
) -> FaultResult<Response> {
    let params = &request.query_string_parameters;
    if params.len() > 1 {
        return Err(bad_request("Provide only ID"));
    }
    let Some(raw) = params.get("id") else {
        return Err(bad_request("Provide ID"));
    };
    let id = Uuid::parse_str(raw).map_err(|err| {
        api_gateway::ko_classified(
            Fault::validator("BAD_REQUEST", "Can't parse ID")
                .cause(err)
                .build(),
        )
    })?;

    match use_case.get(id).await {
        Ok(pet) => api_gateway::ok(&pet),
        Err(fault) if fault.code() == "PET_NOT_FOUND" => {
            Err(api_gateway::ko_from(StatusCode::NOT_FOUND, fault))
        }
        Err(fault) => Err(api_gateway::ko_from(StatusCode::INTERNAL_SERVER_ERROR, fault)),
    }
}

/// The `pet-get` function.
pub fn pipeline(stack: PetStack) -> Pipeline<Request, Response> {
    let use_case = stack.use_case();
    stack.build(handler_fn(move |_ctx: InvocationContext, request: Request| {
        let use_case = Arc::clone(&use_case);
        async move { handle(&use_case, request).await }
    }))
}
