use std::fmt;

use super::domain::{AdmissionId, ApplicationStatus, ListingId, UserId};

/// Failure raised by a backing store, distinct from lifecycle rule violations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

/// Invariant that rejected a request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConflictReason {
    DuplicateApplication,
    InstitutionApplicationLimit { limit: u32 },
    AlreadyDecided { status: ApplicationStatus },
    NotWithdrawable { status: ApplicationStatus },
    ListingNotOpen,
    DeadlinePassed,
    AdmissionAlreadyAnswered,
    AdmissionAlreadyAccepted { existing: AdmissionId },
    DuplicateEmail,
}

impl ConflictReason {
    pub const fn code(&self) -> &'static str {
        match self {
            ConflictReason::DuplicateApplication => "duplicate_application",
            ConflictReason::InstitutionApplicationLimit { .. } => "institution_application_limit",
            ConflictReason::AlreadyDecided { .. } => "already_decided",
            ConflictReason::NotWithdrawable { .. } => "not_withdrawable",
            ConflictReason::ListingNotOpen => "listing_not_open",
            ConflictReason::DeadlinePassed => "deadline_passed",
            ConflictReason::AdmissionAlreadyAnswered => "admission_already_answered",
            ConflictReason::AdmissionAlreadyAccepted { .. } => "admission_already_accepted",
            ConflictReason::DuplicateEmail => "duplicate_email",
        }
    }
}

impl fmt::Display for ConflictReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConflictReason::DuplicateApplication => {
                write!(f, "student already applied to this listing")
            }
            ConflictReason::InstitutionApplicationLimit { limit } => write!(
                f,
                "student already holds {limit} applications to this institution's courses"
            ),
            ConflictReason::AlreadyDecided { status } => {
                write!(f, "application is already {status} and cannot be reviewed")
            }
            ConflictReason::NotWithdrawable { status } => {
                write!(f, "only pending applications can be withdrawn (status {status})")
            }
            ConflictReason::ListingNotOpen => write!(f, "listing is not accepting applications"),
            ConflictReason::DeadlinePassed => write!(f, "listing deadline has passed"),
            ConflictReason::AdmissionAlreadyAnswered => {
                write!(f, "admission response is already recorded")
            }
            ConflictReason::AdmissionAlreadyAccepted { existing } => {
                write!(f, "student already accepted admission {existing}")
            }
            ConflictReason::DuplicateEmail => write!(f, "email is already registered"),
        }
    }
}

/// Error taxonomy surfaced by every lifecycle operation.
#[derive(Debug, thiserror::Error)]
pub enum LifecycleError {
    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: String },
    #[error("conflict: {0}")]
    Conflict(ConflictReason),
    #[error("user {actor} is not permitted to {action}")]
    Forbidden { actor: UserId, action: &'static str },
    #[error("listing {listing} has reached its capacity of {capacity}")]
    CapacityExceeded { listing: ListingId, capacity: u32 },
    #[error("invalid request: {0}")]
    Validation(String),
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl LifecycleError {
    pub(crate) fn not_found(entity: &'static str, id: impl fmt::Display) -> Self {
        Self::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    pub(crate) fn forbidden(actor: &UserId, action: &'static str) -> Self {
        Self::Forbidden {
            actor: actor.clone(),
            action,
        }
    }

    pub(crate) fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    /// Stable machine-readable code for API payloads.
    pub fn code(&self) -> &'static str {
        match self {
            LifecycleError::NotFound { .. } => "not_found",
            LifecycleError::Conflict(reason) => reason.code(),
            LifecycleError::Forbidden { .. } => "forbidden",
            LifecycleError::CapacityExceeded { .. } => "capacity_exceeded",
            LifecycleError::Validation(_) => "validation_error",
            LifecycleError::Store(_) => "internal_error",
        }
    }
}

impl From<ConflictReason> for LifecycleError {
    fn from(reason: ConflictReason) -> Self {
        Self::Conflict(reason)
    }
}
