//! Application, review, and admission lifecycle for the campus marketplace.
//!
//! Students apply to course and job listings, institutions and companies review those
//! applications, and institutions turn accepted course applications into admission offers
//! that each student may accept at most once. Every invariant check runs inside a single
//! [`LedgerStore`] transaction together with the write it guards.

mod admissions;
mod catalog;
mod directory;
pub mod domain;
pub mod error;
pub mod import;
mod ledger;
pub mod memory;
pub mod notify;
pub mod policy;
mod review;
pub mod router;
pub mod search;
pub mod service;
pub mod store;

#[cfg(test)]
mod tests;

pub use domain::{
    Admission, AdmissionId, AdmissionRequest, AdmissionResponse, AdmissionStatus, Application,
    ApplicationId, ApplicationStatus, ApplicationSubmission, ApprovalStatus, DocumentDescriptor,
    Listing, ListingId, ListingKind, ListingStatus, ListingView, NewListing, RegisterUser,
    ReviewDecision, Role, StudentResponse, User, UserId, UserProfile,
};
pub use error::{ConflictReason, LifecycleError, StoreError};
pub use import::{parse_listings, CatalogCsvError};
pub use memory::InMemoryLedger;
pub use notify::{Notification, NotificationTemplate, Notifier, NotifyError};
pub use policy::{JobCapacityMode, LifecyclePolicy, ReviewerApprovalMode};
pub use router::{enrollment_router, ACTOR_HEADER};
pub use search::{CandidateQuery, ListingQuery, ListingSearch, SearchError};
pub use service::{Clock, EnrollmentService, SystemClock};
pub use store::{LedgerStore, LedgerTxn, LedgerView};
