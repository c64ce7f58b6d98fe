//! # Trezer Pets
//!
//! Reference backend: two API Gateway functions over a `pet` table.
//!
//! | Function | Request | Success | Faults |
//! |----------|---------|---------|--------|
//! | `pet-get` | `GET ?id=<uuid>` | 200 with the pet | 400, 404 `PET_NOT_FOUND`, 500 |
//! | `pet-post` | `POST {"id"?, "raceId", "name"}` | 200 with the pet | 400, 422 `PET_ID_NOT_UNIQUE`, 500 |
//!
//! Layers, outermost first:
//!
//! - [`handlers`] - decode the request and pick the status
//! - [`PetUseCase`] - generate ids, name business failures
//! - [`PetRepository`] - SQL statements, run in the invocation transaction

#![doc(html_root_url = "https://docs.rs/trezer-pets/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

pub mod entities;
pub mod handlers;
pub mod id;
pub mod repository;
pub mod usecase;

pub use entities::{Pet, Race};
pub use handlers::PetStack;
pub use id::{FixedIdGenerator, IdGenerationError, IdGenerator, UuidV7Generator};
pub use repository::PetRepository;
pub use usecase::PetUseCase;
