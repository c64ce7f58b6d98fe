//! Identifier generation.

use thiserror::Error;
use uuid::Uuid;

/// Identifier generation failure.
#[derive(Debug, Error)]
#[error("cannot generate identifier: {0}")]
pub struct IdGenerationError(pub String);

/// Source of new entity identifiers.
pub trait IdGenerator: Send + Sync + 'static {
    /// Returns a new time-ordered identifier.
    fn new_v7(&self) -> Result<Uuid, IdGenerationError>;
}

/// Generates UUID v7 identifiers from the system clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct UuidV7Generator;

impl IdGenerator for UuidV7Generator {
    fn new_v7(&self) -> Result<Uuid, IdGenerationError> {
        Ok(Uuid::now_v7())
    }
}

/// Always returns the same identifier.
#[derive(Debug, Clone, Copy)]
pub struct FixedIdGenerator(pub Uuid);

impl FixedIdGenerator {
    /// The identifier returned by [`FixedIdGenerator::default`].
    pub const DEFAULT_ID: Uuid = Uuid::from_u128(0x1111_1111_1111_1111_1111_1111_1111_1111);
}

impl Default for FixedIdGenerator {
    fn default() -> Self {
        Self(Self::DEFAULT_ID)
    }
}

impl IdGenerator for FixedIdGenerator {
    fn new_v7(&self) -> Result<Uuid, IdGenerationError> {
        Ok(self.0)
    }
}
