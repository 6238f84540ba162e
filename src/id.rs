//! Session name generation.

use uuid::Uuid;

/// Produces identifiers used as role session names.
pub trait IdGenerator: Send + Sync {
    fn generate(&self) -> String;
}

/// Random 32-character lowercase hex identifiers (UUID v4, no hyphens).
#[derive(Debug, Clone, Copy, Default)]
pub struct RandomIdGenerator;

impl IdGenerator for RandomIdGenerator {
    fn generate(&self) -> String {
        Uuid::new_v4().simple().to_string()
    }
}

impl<F> IdGenerator for F
where
    F: Fn() -> String + Send + Sync,
{
    fn generate(&self) -> String {
        self()
    }
}
