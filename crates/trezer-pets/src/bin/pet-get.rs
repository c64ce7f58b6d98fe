//! `pet-get` function binary.

use trezer_middleware::stages::LoggingMiddleware;
use trezer_pets::handlers::pet_get;
use trezer_pets::PetStack;
use trezer_runtime::RuntimeError;
use trezer_sql::PgConnector;

#[tokio::main]
async fn main() -> Result<(), RuntimeError> {
    let config = trezer_runtime::load_config()?;
    let logging = LoggingMiddleware::new(trezer_runtime::log_config(&config));
    let stack = PetStack::new(logging, PgConnector::with_config_or_env(config.sql));
    trezer_runtime::start(pet_get::pipeline(stack)).await
}
