use serde::{Deserialize, Serialize};

use super::domain::{ApplicationStatus, ListingKind};

const DEFAULT_MAX_APPLICATIONS_PER_INSTITUTION: u32 = 2;

/// Whether job `capacity` (open positions) caps accepted applicants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobCapacityMode {
    Unlimited,
    Enforced,
}

impl JobCapacityMode {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "unlimited" | "off" => Some(Self::Unlimited),
            "enforced" | "on" => Some(Self::Enforced),
            _ => None,
        }
    }
}

/// Whether institutions/companies must still hold an approved account when they review
/// applications or issue offers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReviewerApprovalMode {
    Ignored,
    Required,
}

impl ReviewerApprovalMode {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "ignored" | "off" => Some(Self::Ignored),
            "required" | "on" => Some(Self::Required),
            _ => None,
        }
    }
}

/// Policy dials for the lifecycle rules that are deployment decisions rather than invariants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LifecyclePolicy {
    pub max_course_applications_per_institution: u32,
    pub job_capacity: JobCapacityMode,
    pub reviewer_approval: ReviewerApprovalMode,
}

impl Default for LifecyclePolicy {
    fn default() -> Self {
        Self {
            max_course_applications_per_institution: DEFAULT_MAX_APPLICATIONS_PER_INSTITUTION,
            job_capacity: JobCapacityMode::Unlimited,
            reviewer_approval: ReviewerApprovalMode::Ignored,
        }
    }
}

impl LifecyclePolicy {
    /// Ceiling on accepted applicants for a listing, if any applies under this policy.
    pub fn capacity_ceiling(&self, kind: ListingKind, capacity: Option<u32>) -> Option<u32> {
        match kind {
            ListingKind::Course => capacity,
            ListingKind::Job => match self.job_capacity {
                JobCapacityMode::Enforced => capacity,
                JobCapacityMode::Unlimited => None,
            },
        }
    }
}

/// Statuses a reviewer may move an application of the given kind into.
pub fn review_targets(kind: ListingKind) -> &'static [ApplicationStatus] {
    match kind {
        ListingKind::Course => &[ApplicationStatus::Accepted, ApplicationStatus::Rejected],
        ListingKind::Job => &[
            ApplicationStatus::Shortlisted,
            ApplicationStatus::Interviewing,
            ApplicationStatus::Accepted,
            ApplicationStatus::Rejected,
        ],
    }
}

/// Statuses from which a reviewer may still act.
pub fn is_reviewable(kind: ListingKind, status: ApplicationStatus) -> bool {
    match kind {
        ListingKind::Course => status == ApplicationStatus::Pending,
        ListingKind::Job => !status.is_terminal(),
    }
}
