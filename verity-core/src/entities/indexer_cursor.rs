use crate::framework::DatabaseProcessor;
use kanau::processor::Processor;

#[derive(Debug, Clone)]
/// Read the last applied version of an event stream.
pub struct GetIndexerCursor {
    pub event_type: String,
}

impl Processor<GetIndexerCursor> for DatabaseProcessor {
    type Output = Option<i64>;
    type Error = sqlx::Error;
    #[tracing::instrument(skip_all, err, name = "SQL:GetIndexerCursor")]
    async fn process(&self, query: GetIndexerCursor) -> Result<Option<i64>, sqlx::Error> {
        let last_version = sqlx::query_scalar::<_, i64>(
            r#"
            SELECT last_version
            FROM indexer_cursors
            WHERE event_type = $1
            "#,
        )
        .bind(query.event_type)
        .fetch_optional(&self.pool)
        .await?;
        Ok(last_version)
    }
}

#[derive(Debug, Clone)]
/// Move a stream cursor forward.
///
/// `GREATEST` keeps the stored value from regressing; the returned value is
/// whatever the row holds after the statement.
pub struct AdvanceIndexerCursor {
    pub event_type: String,
    pub last_version: i64,
}

impl Processor<AdvanceIndexerCursor> for DatabaseProcessor {
    type Output = i64;
    type Error = sqlx::Error;
    #[tracing::instrument(skip_all, err, name = "SQL:AdvanceIndexerCursor")]
    async fn process(&self, cmd: AdvanceIndexerCursor) -> Result<i64, sqlx::Error> {
        let stored = sqlx::query_scalar::<_, i64>(
            r#"
            INSERT INTO indexer_cursors (event_type, last_version)
            VALUES ($1, $2)
            ON CONFLICT (event_type) DO UPDATE SET
                last_version = GREATEST(indexer_cursors.last_version, EXCLUDED.last_version),
                updated_at = NOW()
            RETURNING last_version
            "#,
        )
        .bind(cmd.event_type)
        .bind(cmd.last_version)
        .fetch_one(&self.pool)
        .await?;
        Ok(stored)
    }
}
