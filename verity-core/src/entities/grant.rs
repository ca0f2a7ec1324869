use crate::entities::GrantStatus;
use crate::framework::DatabaseProcessor;
use kanau::processor::Processor;
use rust_decimal::Decimal;

/// A grant record as stored in the `grants` table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Grant {
    pub id: String,
    pub title: String,
    pub description: String,
    pub amount: Decimal,
    pub category: String,
    pub deadline: time::OffsetDateTime,
    pub status: GrantStatus,
    pub donor_id: String,
    pub donor_name: String,
    pub milestones_count: i64,
    pub tx_version: Option<i64>,
}

/// Fields written only when the grant does not exist yet.
#[derive(Debug, Clone)]
pub struct NewGrant {
    pub id: String,
    pub title: String,
    pub description: String,
    pub amount: Decimal,
    pub category: String,
    pub deadline: time::OffsetDateTime,
    pub status: GrantStatus,
    pub donor_id: String,
    pub donor_name: String,
    pub milestones_count: i64,
    pub tx_version: Option<i64>,
}

/// Fields merged into an existing grant. `None` leaves the column untouched.
#[derive(Debug, Clone, Default)]
pub struct GrantChanges {
    pub title: Option<String>,
    pub amount: Option<Decimal>,
}

impl From<NewGrant> for Grant {
    fn from(value: NewGrant) -> Self {
        Grant {
            id: value.id,
            title: value.title,
            description: value.description,
            amount: value.amount,
            category: value.category,
            deadline: value.deadline,
            status: value.status,
            donor_id: value.donor_id,
            donor_name: value.donor_name,
            milestones_count: value.milestones_count,
            tx_version: value.tx_version,
        }
    }
}

impl GrantChanges {
    pub fn merge_into(&self, grant: &mut Grant) {
        if let Some(title) = &self.title {
            grant.title = title.clone();
        }
        if let Some(amount) = self.amount {
            grant.amount = amount;
        }
    }
}

#[derive(Debug, Clone)]
/// Create the grant if absent, otherwise merge `changes` into it.
pub struct UpsertGrant {
    pub grant: NewGrant,
    pub changes: GrantChanges,
}

impl Processor<UpsertGrant> for DatabaseProcessor {
    type Output = ();
    type Error = sqlx::Error;
    #[tracing::instrument(skip_all, err, name = "SQL:UpsertGrant")]
    async fn process(&self, cmd: UpsertGrant) -> Result<(), sqlx::Error> {
        let UpsertGrant { grant, changes } = cmd;
        sqlx::query(
            r#"
            INSERT INTO grants
                (id, title, description, amount, category, deadline, status,
                 donor_id, donor_name, milestones_count, tx_version)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            ON CONFLICT (id) DO UPDATE SET
                title = COALESCE($12, grants.title),
                amount = COALESCE($13, grants.amount),
                updated_at = NOW()
            "#,
        )
        .bind(grant.id)
        .bind(grant.title)
        .bind(grant.description)
        .bind(grant.amount)
        .bind(grant.category)
        .bind(grant.deadline)
        .bind(grant.status)
        .bind(grant.donor_id)
        .bind(grant.donor_name)
        .bind(grant.milestones_count)
        .bind(grant.tx_version)
        .bind(changes.title)
        .bind(changes.amount)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}
