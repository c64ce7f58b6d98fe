//! API Gateway functions.
//!
//! Both functions share one middleware stack, registered in this order:
//! logging, API Gateway, SQL, pet repository, pet use case, validator.

pub mod pet_get;
pub mod pet_post;

use std::sync::Arc;
use trezer_middleware::events::{ApiGatewayProxyRequest, ApiGatewayProxyResponse};
use trezer_middleware::stages::{ApiGatewayMiddleware, LoggingMiddleware, ValidatorMiddleware};
use trezer_middleware::{Handler, Pipeline};
use trezer_sql::{Connector, SqlMiddleware};

use crate::id::IdGenerator;
use crate::repository::PetRepository;
use crate::usecase::PetUseCase;

/// Request type of the pets functions.
pub type Request = ApiGatewayProxyRequest;

/// Response type of the pets functions.
pub type Response = ApiGatewayProxyResponse;

/// The middlewares of a pets function.
pub struct PetStack {
    logging: LoggingMiddleware<Request, Response>,
    sql: Arc<SqlMiddleware<Request, Response>>,
    repository: Arc<PetRepository<Request, Response>>,
    use_case: Arc<PetUseCase<Request, Response>>,
    validator: Arc<ValidatorMiddleware<Request, Response>>,
}

impl PetStack {
    /// Wires the stack around a database connector.
    pub fn new(logging: LoggingMiddleware<Request, Response>, connector: impl Connector) -> Self {
        let sql = Arc::new(SqlMiddleware::new(connector));
        let repository = Arc::new(PetRepository::new(Arc::clone(&sql)));
        let use_case = Arc::new(PetUseCase::new(Arc::clone(&repository)));
        Self {
            logging,
            sql,
            repository,
            use_case,
            validator: Arc::new(ValidatorMiddleware::new()),
        }
    }

    /// Replaces the identifier generator of the use case.
    #[must_use]
    pub fn with_id_generator(mut self, ids: impl IdGenerator) -> Self {
        self.use_case =
            Arc::new(PetUseCase::new(Arc::clone(&self.repository)).with_id_generator(ids));
        self
    }

    /// The pet use case, for the handler.
    pub fn use_case(&self) -> Arc<PetUseCase<Request, Response>> {
        Arc::clone(&self.use_case)
    }

    /// The body validator, for the handler.
    pub fn validator(&self) -> Arc<ValidatorMiddleware<Request, Response>> {
        Arc::clone(&self.validator)
    }

    /// The SQL middleware.
    pub fn sql(&self) -> Arc<SqlMiddleware<Request, Response>> {
        Arc::clone(&self.sql)
    }

    /// Registers the stack around `handler`.
    pub fn build<H>(self, handler: H) -> Pipeline<Request, Response>
    where
        H: Handler<Request, Response>,
    {
        Pipeline::builder()
            .use_middleware(self.logging)
            .use_middleware(ApiGatewayMiddleware::new())
            .use_shared(self.sql)
            .use_shared(self.repository)
            .use_shared(self.use_case)
            .use_shared(self.validator)
            .build(handler)
    }
}

impl std::fmt::Debug for PetStack {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PetStack")
            .field("sql", &self.sql)
            .finish_non_exhaustive()
    }
}
