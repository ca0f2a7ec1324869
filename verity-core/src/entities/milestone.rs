use crate::entities::MilestoneStatus;
use crate::framework::DatabaseProcessor;
use kanau::processor::Processor;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Milestone {
    pub id: String,
    pub proposal_id: String,
    pub milestone_index: i64,
    pub title: String,
    pub description: String,
    pub due_date: time::OffsetDateTime,
    pub status: MilestoneStatus,
}

impl Milestone {
    /// Stable key of the `index`-th milestone of a proposal.
    pub fn key(proposal_id: &str, index: i64) -> String {
        format!("{proposal_id}#{index}")
    }
}

#[derive(Debug, Clone)]
pub struct NewMilestone {
    pub id: String,
    pub proposal_id: String,
    pub milestone_index: i64,
    pub title: String,
    pub description: String,
    pub due_date: time::OffsetDateTime,
    pub status: MilestoneStatus,
}

#[derive(Debug, Clone, Default)]
pub struct MilestoneChanges {
    pub description: Option<String>,
    /// Only applied while the stored milestone is still `Pending`, so a
    /// replayed submission never overwrites a verdict.
    pub status: Option<MilestoneStatus>,
}

impl From<NewMilestone> for Milestone {
    fn from(value: NewMilestone) -> Self {
        Milestone {
            id: value.id,
            proposal_id: value.proposal_id,
            milestone_index: value.milestone_index,
            title: value.title,
            description: value.description,
            due_date: value.due_date,
            status: value.status,
        }
    }
}

impl MilestoneChanges {
    pub fn merge_into(&self, milestone: &mut Milestone) {
        if let Some(description) = &self.description {
            milestone.description = description.clone();
        }
        if let Some(status) = self.status {
            if milestone.status == MilestoneStatus::Pending {
                milestone.status = status;
            }
        }
    }
}

#[derive(Debug, Clone)]
pub struct UpsertMilestone {
    pub milestone: NewMilestone,
    pub changes: MilestoneChanges,
}

impl Processor<UpsertMilestone> for DatabaseProcessor {
    type Output = ();
    type Error = sqlx::Error;
    #[tracing::instrument(skip_all, err, name = "SQL:UpsertMilestone")]
    async fn process(&self, cmd: UpsertMilestone) -> Result<(), sqlx::Error> {
        let UpsertMilestone { milestone, changes } = cmd;
        sqlx::query(
            r#"
            INSERT INTO milestones
                (id, proposal_id, milestone_index, title, description, due_date, status)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            ON CONFLICT (id) DO UPDATE SET
                description = COALESCE($8, milestones.description),
                status = CASE
                    WHEN milestones.status = 'pending' THEN COALESCE($9, milestones.status)
                    ELSE milestones.status
                END,
                updated_at = NOW()
            "#,
        )
        .bind(milestone.id)
        .bind(milestone.proposal_id)
        .bind(milestone.milestone_index)
        .bind(milestone.title)
        .bind(milestone.description)
        .bind(milestone.due_date)
        .bind(milestone.status)
        .bind(changes.description)
        .bind(changes.status)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

#[derive(Debug, Clone)]
/// Move every milestone of a proposal to `status` in a single statement.
///
/// Returns the number of rows updated; zero when the proposal has no
/// milestones indexed yet.
pub struct SetProposalMilestonesStatus {
    pub proposal_id: String,
    pub status: MilestoneStatus,
}

impl Processor<SetProposalMilestonesStatus> for DatabaseProcessor {
    type Output = u64;
    type Error = sqlx::Error;
    #[tracing::instrument(skip_all, err, name = "SQL:SetProposalMilestonesStatus")]
    async fn process(&self, cmd: SetProposalMilestonesStatus) -> Result<u64, sqlx::Error> {
        let result = sqlx::query(
            r#"
            UPDATE milestones
            SET status = $2, updated_at = NOW()
            WHERE proposal_id = $1
            "#,
        )
        .bind(cmd.proposal_id)
        .bind(cmd.status)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }
}
