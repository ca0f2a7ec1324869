pub mod grant;
pub mod indexer_cursor;
pub mod milestone;
pub mod proposal;

/// Lifecycle of a grant. Only `Open` is ever written by the indexer; the
/// other states are driven by the CRUD API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, sqlx::Type)]
#[sqlx(rename_all = "snake_case", type_name = "grant_status")]
pub enum GrantStatus {
    Open,
    InProgress,
    Completed,
    Cancelled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, sqlx::Type)]
#[sqlx(rename_all = "snake_case", type_name = "proposal_status")]
pub enum ProposalStatus {
    Pending,
    Approved,
    Rejected,
    InProgress,
    Completed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, sqlx::Type)]
#[sqlx(rename_all = "snake_case", type_name = "milestone_status")]
pub enum MilestoneStatus {
    Pending,
    Submitted,
    Verified,
    Rejected,
}

impl MilestoneStatus {
    /// Outcome of a verifier decision.
    pub fn from_verdict(approved: bool) -> Self {
        if approved {
            MilestoneStatus::Verified
        } else {
            MilestoneStatus::Rejected
        }
    }
}
