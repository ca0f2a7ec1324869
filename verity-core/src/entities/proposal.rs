use crate::entities::ProposalStatus;
use crate::framework::DatabaseProcessor;
use kanau::processor::Processor;
use rust_decimal::Decimal;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Proposal {
    pub id: String,
    /// Not a foreign key: the grant may be indexed after its proposals.
    pub grant_id: String,
    pub applicant_id: String,
    pub applicant_name: String,
    pub title: String,
    pub description: String,
    pub requested_amount: Decimal,
    pub status: ProposalStatus,
    pub submitted_at: time::OffsetDateTime,
    pub tx_version: Option<i64>,
}

#[derive(Debug, Clone)]
pub struct NewProposal {
    pub id: String,
    pub grant_id: String,
    pub applicant_id: String,
    pub applicant_name: String,
    pub title: String,
    pub description: String,
    pub requested_amount: Decimal,
    pub status: ProposalStatus,
    pub submitted_at: time::OffsetDateTime,
    pub tx_version: Option<i64>,
}

#[derive(Debug, Clone, Default)]
pub struct ProposalChanges {
    pub requested_amount: Option<Decimal>,
}

impl From<NewProposal> for Proposal {
    fn from(value: NewProposal) -> Self {
        Proposal {
            id: value.id,
            grant_id: value.grant_id,
            applicant_id: value.applicant_id,
            applicant_name: value.applicant_name,
            title: value.title,
            description: value.description,
            requested_amount: value.requested_amount,
            status: value.status,
            submitted_at: value.submitted_at,
            tx_version: value.tx_version,
        }
    }
}

impl ProposalChanges {
    pub fn merge_into(&self, proposal: &mut Proposal) {
        if let Some(requested_amount) = self.requested_amount {
            proposal.requested_amount = requested_amount;
        }
    }
}

#[derive(Debug, Clone)]
pub struct UpsertProposal {
    pub proposal: NewProposal,
    pub changes: ProposalChanges,
}

impl Processor<UpsertProposal> for DatabaseProcessor {
    type Output = ();
    type Error = sqlx::Error;
    #[tracing::instrument(skip_all, err, name = "SQL:UpsertProposal")]
    async fn process(&self, cmd: UpsertProposal) -> Result<(), sqlx::Error> {
        let UpsertProposal { proposal, changes } = cmd;
        sqlx::query(
            r#"
            INSERT INTO proposals
                (id, grant_id, applicant_id, applicant_name, title, description,
                 requested_amount, status, submitted_at, tx_version)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            ON CONFLICT (id) DO UPDATE SET
                requested_amount = COALESCE($11, proposals.requested_amount),
                updated_at = NOW()
            "#,
        )
        .bind(proposal.id)
        .bind(proposal.grant_id)
        .bind(proposal.applicant_id)
        .bind(proposal.applicant_name)
        .bind(proposal.title)
        .bind(proposal.description)
        .bind(proposal.requested_amount)
        .bind(proposal.status)
        .bind(proposal.submitted_at)
        .bind(proposal.tx_version)
        .bind(changes.requested_amount)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}
