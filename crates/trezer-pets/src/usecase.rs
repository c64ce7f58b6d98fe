//! Pet use cases.

use parking_lot::RwLock;
use serde_json::Value;
use std::sync::Arc;
use tracing::Span;
use trezer_core::{BoxFuture, Fault, FaultResult, InvocationContext};
use trezer_middleware::Middleware;
use uuid::Uuid;

use crate::entities::Pet;
use crate::id::{IdGenerator, UuidV7Generator};
use crate::repository::PetRepository;

const COMPONENT: &str = "PetUseCase";

/// Creates and reads pets, translating repository faults into use case
/// codes.
pub struct PetUseCase<Req, Res> {
    repository: Arc<PetRepository<Req, Res>>,
    ids: Box<dyn IdGenerator>,
    span: RwLock<Span>,
}

impl<Req, Res> PetUseCase<Req, Res> {
    /// Creates the use case with UUID v7 identifiers.
    pub fn new(repository: Arc<PetRepository<Req, Res>>) -> Self {
        Self {
            repository,
            ids: Box::new(UuidV7Generator),
            span: RwLock::new(Span::none()),
        }
    }

    /// Replaces the identifier generator.
    #[must_use]
    pub fn with_id_generator(mut self, ids: impl IdGenerator) -> Self {
        self.ids = Box::new(ids);
        self
    }

    fn span(&self) -> Span {
        self.span.read().clone()
    }

    /// Creates a pet, generating its id when none (or the nil UUID) is given.
    ///
    /// # Errors
    ///
    /// `IDENTIFIER_GENERATION_ERROR`, `PET_ID_NOT_UNIQUE` when the id is
    /// taken, `PET_CREATION_FAILED` for any other repository fault.
    pub async fn create(&self, id: Option<Uuid>, name: String, race_id: Uuid) -> FaultResult<Pet> {
        tracing::trace!(parent: &self.span(), "Create");
        let id = id.filter(|id| !id.is_nil());
        let requested = Value::from(id.map(|id| id.to_string()));

        let id = match id {
            Some(id) => id,
            None => {
                tracing::debug!(parent: &self.span(), "No id provided, generating one...");
                self.ids.new_v7().map_err(|err| {
                    Fault::use_case(COMPONENT, "IDENTIFIER_GENERATION_ERROR", "Cannot generate identifier")
                        .meta("id", requested.clone())
                        .cause(err)
                        .build()
                })?
            }
        };

        self.repository
            .create(Pet::new(id, name, race_id))
            .await
            .map_err(|err| {
                let (code, message) = match err.code() {
                    "UNIQUE_VIOLATION" => ("PET_ID_NOT_UNIQUE", "Pet id not unique"),
                    _ => ("PET_CREATION_FAILED", "Pet creation failed"),
                };
                Fault::use_case(COMPONENT, code, message)
                    .meta("id", requested)
                    .cause(err)
                    .build()
            })
    }

    /// Reads the pet `id`.
    ///
    /// # Errors
    ///
    /// `PET_NOT_FOUND`, or `PET_GET_FAILED` for any other repository fault.
    pub async fn get(&self, id: Uuid) -> FaultResult<Pet> {
        tracing::trace!(parent: &self.span(), "Get");
        self.repository.get(id).await.map_err(|err| {
            let (code, message) = match err.code() {
                "NOT_FOUND" => ("PET_NOT_FOUND", "Pet not found"),
                _ => ("PET_GET_FAILED", "Cannot get this pet"),
            };
            Fault::use_case(COMPONENT, code, message)
                .meta("id", id.to_string())
                .cause(err)
                .build()
        })
    }
}

impl<Req, Res> std::fmt::Debug for PetUseCase<Req, Res> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PetUseCase").finish_non_exhaustive()
    }
}

impl<Req, Res> Middleware<Req, Res> for PetUseCase<Req, Res>
where
    Req: Send + Sync + 'static,
    Res: Send + 'static,
{
    fn name(&self) -> &'static str {
        "pet_use_case"
    }

    fn on_setup<'a>(
        &'a self,
        ctx: &'a InvocationContext,
        _first_request: &'a Req,
    ) -> BoxFuture<'a, FaultResult<()>> {
        Box::pin(async move {
            let span = tracing::info_span!(parent: &ctx.log_context().span(), "usecase", usecase = COMPONENT);
            tracing::trace!(parent: &span, "OnSetup");
            *self.span.write() = span;
            Ok(())
        })
    }

    fn on_before<'a>(
        &'a self,
        _ctx: &'a InvocationContext,
        _request: &'a Req,
    ) -> BoxFuture<'a, FaultResult<()>> {
        Box::pin(async move {
            tracing::trace!(parent: &self.span(), "OnBefore");
            Ok(())
        })
    }

    fn on_after<'a>(
        &'a self,
        _response: &'a mut Res,
        fault: Option<Fault>,
    ) -> BoxFuture<'a, Option<Fault>> {
        Box::pin(async move {
            tracing::trace!(parent: &self.span(), "OnAfter");
            fault
        })
    }

    fn on_shutdown(&self) -> BoxFuture<'_, ()> {
        Box::pin(async move {
            tracing::trace!(parent: &self.span(), "OnShutdown");
        })
    }
}
