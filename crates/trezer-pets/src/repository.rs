//! Pet persistence.

use parking_lot::RwLock;
use std::sync::Arc;
use tracing::Span;
use trezer_core::{BoxFuture, Fault, FaultBuilder, FaultResult, InvocationContext};
use trezer_middleware::Middleware;
use trezer_sql::{SqlMiddleware, SqlQuery};
use uuid::Uuid;

use crate::entities::Pet;

const COMPONENT: &str = "PetRepository";

/// Inserts a pet. Binds `id`, `name`, `race_id`.
pub const PET_SQL_CREATE: &str = "INSERT INTO pet(id, name, race_id) VALUES($1, $2, $3)";

/// Selects a pet with its race. Binds `id`.
pub const PET_SQL_GET: &str = "SELECT p.id, p.name, json_build_object('id', r.id, 'name', r.name) AS race \
     FROM pet p INNER JOIN race r ON p.race_id = r.id WHERE p.id = $1";

/// The insert statement for `pet`.
pub fn create_query(pet: &Pet) -> SqlQuery {
    SqlQuery::new(PET_SQL_CREATE)
        .bind(pet.id)
        .bind(pet.name.as_str())
        .bind(pet.race.id)
}

/// The select statement for the pet `id`.
pub fn get_query(id: Uuid) -> SqlQuery {
    SqlQuery::new(PET_SQL_GET).bind(id)
}

fn fault(code: &str, message: &str, id: Uuid) -> FaultBuilder {
    Fault::repository(COMPONENT, code, message).meta("id", id.to_string())
}

/// Reads and writes pets through the invocation's transaction.
pub struct PetRepository<Req, Res> {
    sql: Arc<SqlMiddleware<Req, Res>>,
    span: RwLock<Span>,
}

impl<Req, Res> PetRepository<Req, Res> {
    /// Creates the repository on top of the SQL middleware.
    pub fn new(sql: Arc<SqlMiddleware<Req, Res>>) -> Self {
        Self {
            sql,
            span: RwLock::new(Span::none()),
        }
    }

    fn span(&self) -> Span {
        self.span.read().clone()
    }

    /// Inserts `pet`.
    ///
    /// # Errors
    ///
    /// `UNIQUE_VIOLATION` when the id is taken, `INSERT_ERROR` otherwise.
    pub async fn create(&self, pet: Pet) -> FaultResult<Pet> {
        if let Err(err) = self.sql.exec_one(&create_query(&pet)).await {
            let (code, message) = match err.code() {
                "UNIQUE_VIOLATION" => ("UNIQUE_VIOLATION", "Pet id not unique"),
                _ => ("INSERT_ERROR", "Error while inserting Pet"),
            };
            return Err(fault(code, message, pet.id).cause(err).build());
        }
        tracing::debug!(parent: &self.span(), id = %pet.id, "Pet created");
        Ok(pet)
    }

    /// Loads the pet `id` with its race.
    ///
    /// # Errors
    ///
    /// `SELECT_ERROR` when the query fails, `NOT_FOUND` when no pet matches,
    /// `TOO_MANY_PETS` when several do.
    pub async fn get(&self, id: Uuid) -> FaultResult<Pet> {
        let mut pets: Vec<Pet> = self.sql.select(&get_query(id)).await.map_err(|err| {
            fault("SELECT_ERROR", "Error while selecting Pet", id)
                .cause(err)
                .build()
        })?;

        match pets.len() {
            0 => Err(fault("NOT_FOUND", "Pet not found", id).build()),
            1 => {
                let pet = pets.remove(0);
                tracing::debug!(parent: &self.span(), id = %pet.id, "Pet found");
                Ok(pet)
            }
            found => Err(fault("TOO_MANY_PETS", "Multiple pets found", id)
                .meta("found", found)
                .build()),
        }
    }
}

impl<Req, Res> std::fmt::Debug for PetRepository<Req, Res> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PetRepository").finish_non_exhaustive()
    }
}

impl<Req, Res> Middleware<Req, Res> for PetRepository<Req, Res>
where
    Req: Send + Sync + 'static,
    Res: Send + 'static,
{
    fn name(&self) -> &'static str {
        "pet_repository"
    }

    fn on_setup<'a>(
        &'a self,
        ctx: &'a InvocationContext,
        _first_request: &'a Req,
    ) -> BoxFuture<'a, FaultResult<()>> {
        Box::pin(async move {
            let span = tracing::info_span!(parent: &ctx.log_context().span(), "repository", repository = COMPONENT);
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
