use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub String);

        impl $name {
            pub fn new(value: impl Into<String>) -> Self {
                Self(value.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }
    };
}

string_id!(
    /// Identifier for any directory entry (student, institute, company, admin).
    UserId
);
string_id!(
    /// Identifier for a course or job posting.
    ListingId
);
string_id!(
    /// Identifier wrapper for submitted applications.
    ApplicationId
);
string_id!(AdmissionId);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Student,
    Institute,
    Company,
    Admin,
}

impl Role {
    pub const fn label(self) -> &'static str {
        match self {
            Role::Student => "student",
            Role::Institute => "institute",
            Role::Company => "company",
            Role::Admin => "admin",
        }
    }

    /// Institutes and companies need an administrator's approval before they can publish.
    pub const fn requires_approval(self) -> bool {
        matches!(self, Role::Institute | Role::Company)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApprovalStatus {
    Pending,
    Approved,
    Rejected,
}

/// Free-form profile data kept alongside the identity record.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProfile {
    pub name: String,
    pub email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub headline: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(default)]
    pub skills: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub role: Role,
    pub approval: ApprovalStatus,
    pub verified: bool,
    pub profile: UserProfile,
    pub created_at: DateTime<Utc>,
}

impl User {
    pub fn is_approved(&self) -> bool {
        !self.role.requires_approval() || self.approval == ApprovalStatus::Approved
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegisterUser {
    pub role: Role,
    pub profile: UserProfile,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ListingKind {
    Course,
    Job,
}

impl ListingKind {
    pub const fn label(self) -> &'static str {
        match self {
            ListingKind::Course => "course",
            ListingKind::Job => "job",
        }
    }

    /// The only role allowed to publish this kind of listing.
    pub const fn owner_role(self) -> Role {
        match self {
            ListingKind::Course => Role::Institute,
            ListingKind::Job => Role::Company,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ListingStatus {
    Active,
    Closed,
}

/// A course or job posting. `capacity` is a ceiling; consumption is always derived from
/// the accepted applications rather than stored here.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Listing {
    pub id: ListingId,
    pub kind: ListingKind,
    pub owner_id: UserId,
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(default)]
    pub skills: Vec<String>,
    pub capacity: Option<u32>,
    pub status: ListingStatus,
    pub deadline: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl Listing {
    pub fn accepts_applications_at(&self, now: DateTime<Utc>) -> bool {
        self.status == ListingStatus::Active && self.deadline.map_or(true, |due| now <= due)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewListing {
    pub kind: ListingKind,
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub skills: Vec<String>,
    #[serde(default)]
    pub capacity: Option<u32>,
    #[serde(default)]
    pub deadline: Option<DateTime<Utc>>,
}

/// Listing plus the aggregates computed from the application ledger at read time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ListingView {
    #[serde(flatten)]
    pub listing: Listing,
    pub application_count: u32,
    pub accepted_count: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seats_available: Option<u32>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApplicationStatus {
    Pending,
    #[serde(alias = "approved")]
    Accepted,
    Rejected,
    Shortlisted,
    Interviewing,
    Withdrawn,
}

impl ApplicationStatus {
    pub const fn label(self) -> &'static str {
        match self {
            ApplicationStatus::Pending => "pending",
            ApplicationStatus::Accepted => "accepted",
            ApplicationStatus::Rejected => "rejected",
            ApplicationStatus::Shortlisted => "shortlisted",
            ApplicationStatus::Interviewing => "interviewing",
            ApplicationStatus::Withdrawn => "withdrawn",
        }
    }

    pub const fn is_terminal(self) -> bool {
        matches!(
            self,
            ApplicationStatus::Accepted | ApplicationStatus::Rejected | ApplicationStatus::Withdrawn
        )
    }
}

impl fmt::Display for ApplicationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Metadata for an uploaded document; the bytes live in external storage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentDescriptor {
    pub name: String,
    pub storage_key: String,
}

/// Payload a student sends when applying.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApplicationSubmission {
    pub target_id: ListingId,
    pub target_type: ListingKind,
    #[serde(default)]
    pub cover_letter: Option<String>,
    #[serde(default)]
    pub documents: Vec<DocumentDescriptor>,
}

/// Ledger entry. `owner_id` is copied from the listing when the application is created so
/// ownership checks never need a live join.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Application {
    pub id: ApplicationId,
    pub student_id: UserId,
    pub target_id: ListingId,
    pub target_type: ListingKind,
    pub owner_id: UserId,
    pub status: ApplicationStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cover_letter: Option<String>,
    #[serde(default)]
    pub documents: Vec<DocumentDescriptor>,
    pub applied_at: DateTime<Utc>,
    pub reviewed_at: Option<DateTime<Utc>>,
    pub reviewed_by: Option<UserId>,
    pub remarks: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub withdrawn_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReviewDecision {
    pub status: ApplicationStatus,
    #[serde(default)]
    pub remarks: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AdmissionStatus {
    Offered,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StudentResponse {
    Accepted,
    Declined,
}

/// Institution-issued offer that follows an accepted course application.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Admission {
    pub id: AdmissionId,
    pub student_id: UserId,
    pub course_id: ListingId,
    pub institution_id: UserId,
    pub status: AdmissionStatus,
    pub student_response: Option<StudentResponse>,
    pub offered_at: DateTime<Utc>,
    pub responded_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdmissionRequest {
    pub course_id: ListingId,
    pub student_ids: Vec<UserId>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdmissionResponse {
    pub admission_id: AdmissionId,
    pub accept: bool,
}
