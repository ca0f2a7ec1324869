use sqlx::PgPool;

/// Postgres-backed processor for the entity commands.
///
/// Every command in [`crate::entities`] is implemented as
/// `kanau::processor::Processor<Command> for DatabaseProcessor`, and the
/// store traits in [`crate::store`] delegate to those implementations.
#[derive(Debug, Clone)]
pub struct DatabaseProcessor {
    pub pool: PgPool,
}

impl DatabaseProcessor {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}
