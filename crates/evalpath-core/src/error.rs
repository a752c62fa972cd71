use std::fmt;

use crate::store::StoreError;

/// Machine-readable error codes for callers that branch on failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    PlanNotFound,
    OrderingViolation,
    UnknownScreen,
    InvalidInput,
    StoreUnavailable,
    CorruptRecord,
    MigrationAmbiguity,
    /// Config files failed to parse or validate. Raised at startup, before
    /// any [`FlowError`] can occur.
    InvalidConfig,
}

impl ErrorCode {
    /// Stable code identifier (`E####`) for machine parsing.
    #[must_use]
    pub const fn code(self) -> &'static str {
        match self {
            Self::PlanNotFound => "E2001",
            Self::OrderingViolation => "E2002",
            Self::UnknownScreen => "E2003",
            Self::InvalidInput => "E2004",
            Self::StoreUnavailable => "E5001",
            Self::CorruptRecord => "E5002",
            Self::MigrationAmbiguity => "E9001",
            Self::InvalidConfig => "E1001",
        }
    }

    /// Short human-facing summary for logs and terminal output.
    #[must_use]
    pub const fn message(self) -> &'static str {
        match self {
            Self::PlanNotFound => "No evaluation plan exists for this flow",
            Self::OrderingViolation => "Screen is not reachable yet",
            Self::UnknownScreen => "Screen is not part of this flow",
            Self::InvalidInput => "Invalid input",
            Self::StoreUnavailable => "Record store unavailable",
            Self::CorruptRecord => "Stored record could not be decoded",
            Self::MigrationAmbiguity => "Record cannot be migrated",
            Self::InvalidConfig => "Config file is invalid",
        }
    }

    /// Optional remediation hint for operators.
    #[must_use]
    pub const fn hint(self) -> Option<&'static str> {
        match self {
            Self::PlanNotFound => {
                Some("Complete the selection screen to generate a plan first.")
            }
            Self::OrderingViolation => {
                Some("Finish or skip the current screen before moving ahead.")
            }
            Self::UnknownScreen => Some("Run `ep state` to list the screens of this flow."),
            Self::InvalidInput => None,
            Self::StoreUnavailable => Some("Check the record store and retry."),
            Self::CorruptRecord => Some("Inspect the stored record; it was written by a newer or broken client."),
            Self::MigrationAmbiguity => Some("Report a bug with the offending record attached."),
            Self::InvalidConfig => Some("Fix .evalpath/config.toml or the user config and retry."),
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// Failures of the flow engine.
#[derive(Debug, thiserror::Error)]
pub enum FlowError {
    /// No plan has been generated for this flow yet.
    #[error("no evaluation plan for flow {flow}")]
    NotFound { flow: String },

    /// Navigation or completion requested for a screen still ahead of the
    /// current one.
    #[error("screen {screen} is pending; current screen is {current}")]
    OrderingViolation { screen: String, current: String },

    /// Screen id does not appear in the flow's catalog.
    #[error("unknown screen {0}")]
    UnknownScreen(String),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// The persistence layer failed. Never retried here.
    #[error(transparent)]
    StoreUnavailable(#[from] StoreError),

    /// A record exists but is not valid JSON for its type.
    #[error("corrupt record at {key}: {source}")]
    CorruptRecord {
        key: String,
        #[source]
        source: serde_json::Error,
    },

    /// A record could not be upgraded. Every field has a documented
    /// default, so this indicates a record that is not an object at all.
    #[error("cannot migrate {kind} record: {reason}")]
    MigrationAmbiguity { kind: &'static str, reason: String },
}

impl FlowError {
    /// Machine-readable code for this error.
    #[must_use]
    pub const fn code(&self) -> ErrorCode {
        match self {
            Self::NotFound { .. } => ErrorCode::PlanNotFound,
            Self::OrderingViolation { .. } => ErrorCode::OrderingViolation,
            Self::UnknownScreen(_) => ErrorCode::UnknownScreen,
            Self::InvalidInput(_) => ErrorCode::InvalidInput,
            Self::StoreUnavailable(_) => ErrorCode::StoreUnavailable,
            Self::CorruptRecord { .. } => ErrorCode::CorruptRecord,
            Self::MigrationAmbiguity { .. } => ErrorCode::MigrationAmbiguity,
        }
    }
}
