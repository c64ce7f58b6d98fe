//! `POST /pet` with body `{ "id"?, "raceId", "name" }`.

use http::StatusCode;
use serde::Deserialize;
use std::sync::Arc;
use trezer_core::{handler_fn, FaultResult, InvocationContext, Validate, ValidationErrors};
use trezer_middleware::stages::{api_gateway, ValidatorMiddleware};
use trezer_middleware::Pipeline;
use uuid::Uuid;

use super::{PetStack, Request, Response};
use crate::usecase::PetUseCase;

/// Body of a pet creation request.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields, rename_all = "camelCase")]
pub struct NewPet {
    /// Requested id, generated when absent.
    #[serde(default)]
    pub id: Option<Uuid>,
    /// Race of the pet.
    pub race_id: Uuid,
    /// Pet name.
    #[serde(default)]
    pub name: String,
}

impl Validate for NewPet {
    fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();
        if self.race_id.is_nil() {
            errors.add("NewPet", "raceId", "required", self.race_id.to_string());
        }
        if self.name.trim().is_empty() {
            errors.add("NewPet", "name", "required", self.name.clone());
        }
        errors.into_result()
    }
}

/// Creates a pet and answers with it.
///
/// # Errors
///
/// 400 for an invalid body, 422 when the id is taken, 500 otherwise.
pub async fn handle(
    validator: &ValidatorMiddleware<Request, Response>,
    use_case: &PetUseCase<Request, Response>,
    request: Request,
) -> FaultResult<Response> {
    let body: NewPet = validator
        .decode(request.body.as_deref().unwrap_or_default())
        .map_err(api_gateway::ko_classified)?;

    match use_case.create(body.id, body.name, body.race_id).await {
        Ok(pet) => api_gateway::ok(&pet),
        Err(fault) if fault.code() == "PET_ID_NOT_UNIQUE" => {
            Err(api_gateway::ko_from(StatusCode::UNPROCESSABLE_ENTITY, fault))
        }
        Err(fault) => Err(api_gateway::ko_from(StatusCode::INTERNAL_SERVER_ERROR, fault)),
    }
}

/// The `pet-post` function.
pub fn pipeline(stack: PetStack) -> Pipeline<Request, Response> {
    let use_case = stack.use_case();
    let validator = stack.validator();
    stack.build(handler_fn(move |_ctx: InvocationContext, request: Request| {
        let use_case = Arc::clone(&use_case);
        let validator = Arc::clone(&validator);
        async move { handle(&validator, &use_case, request).await }
    }))
}
