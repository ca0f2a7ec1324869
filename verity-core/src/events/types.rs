use std::fmt;

/// Event structs emitted by the `verity_vest` Move module, one stream each.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    GrantCreated,
    ProposalCreated,
    MilestoneSubmitted,
    VerificationLogged,
}

impl EventKind {
    pub const ALL: [EventKind; 4] = [
        EventKind::GrantCreated,
        EventKind::ProposalCreated,
        EventKind::MilestoneSubmitted,
        EventKind::VerificationLogged,
    ];

    pub const MODULE_NAME: &'static str = "verity_vest";

    pub fn struct_name(self) -> &'static str {
        match self {
            EventKind::GrantCreated => "GrantCreatedEvent",
            EventKind::ProposalCreated => "ProposalCreatedEvent",
            EventKind::MilestoneSubmitted => "MilestoneSubmittedEvent",
            EventKind::VerificationLogged => "VerificationLoggedEvent",
        }
    }

    /// Fully qualified Move event type, which is also the cursor key.
    pub fn event_type(self, module_address: &str) -> String {
        format!(
            "{module_address}::{}::{}",
            Self::MODULE_NAME,
            self.struct_name()
        )
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.struct_name())
    }
}

/// Why a tick stopped early. The full error is logged where it happens.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickFailure {
    /// Reading the cursor failed; nothing was fetched.
    CursorRead,
    /// The ledger fetch failed or timed out; cursor untouched.
    Fetch,
    /// One transaction at `version` emits more events than the largest page
    /// holds, so it can never be read in full.
    PageOverflow { version: u64 },
    /// A handler failed at `version`; later events were not applied.
    Handler { version: u64 },
    /// Writing the cursor failed after applying up to `version`.
    CursorWrite { version: u64 },
    /// The tick task panicked.
    Panicked,
}

impl fmt::Display for TickFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TickFailure::CursorRead => write!(f, "cursor read"),
            TickFailure::Fetch => write!(f, "fetch"),
            TickFailure::PageOverflow { version } => write!(f, "page overflow at {version}"),
            TickFailure::Handler { version } => write!(f, "handler at {version}"),
            TickFailure::CursorWrite { version } => write!(f, "cursor write at {version}"),
            TickFailure::Panicked => write!(f, "panicked"),
        }
    }
}

/// Outcome of one poller tick.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamReport {
    pub kind: EventKind,
    /// Events returned by the ledger, before filtering.
    pub fetched: usize,
    /// Events newly applied in this tick.
    pub applied: usize,
    /// Durable cursor after the tick.
    pub cursor: u64,
    pub failure: Option<TickFailure>,
}

impl StreamReport {
    pub fn is_success(&self) -> bool {
        self.failure.is_none()
    }
}
