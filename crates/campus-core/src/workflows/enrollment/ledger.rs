use tracing::info;

use super::directory::require_role;
use super::domain::{
    Application, ApplicationId, ApplicationStatus, ApplicationSubmission, Listing, ListingId,
    ListingKind, ListingStatus, Role, UserId,
};
use super::error::{ConflictReason, LifecycleError};
use super::notify::{Notification, NotificationTemplate, Notifier};
use super::service::{load_owned, next_id, EnrollmentService};
use super::store::{LedgerStore, LedgerView};

const MAX_COVER_LETTER_LEN: usize = 5_000;
const MAX_DOCUMENTS: usize = 10;

impl<S, N> EnrollmentService<S, N>
where
    S: LedgerStore + 'static,
    N: Notifier + 'static,
{
    /// Record a student's application to a course or job. Duplicate, per-institution, and
    /// capacity checks run in the same transaction as the insert.
    pub fn submit_application(
        &self,
        student_id: &UserId,
        submission: ApplicationSubmission,
    ) -> Result<Application, LifecycleError> {
        validate_submission(&submission)?;
        let now = self.now();
        let policy = self.policy;

        let (application, email, title) = self.store.transact(|txn| {
            let student = require_role(&*txn, student_id, &[Role::Student], "apply to listings")?;
            let listing = txn
                .listing(&submission.target_id)
                .ok_or_else(|| LifecycleError::not_found("listing", &submission.target_id))?;
            if listing.kind != submission.target_type {
                return Err(LifecycleError::validation(format!(
                    "listing {} is a {}, not a {}",
                    listing.id,
                    listing.kind.label(),
                    submission.target_type.label()
                )));
            }
            ensure_open(&listing, now)?;

            let existing = txn.applications_by_student(student_id);
            if existing
                .iter()
                .any(|application| application.target_id == listing.id)
            {
                return Err(ConflictReason::DuplicateApplication.into());
            }

            if listing.kind == ListingKind::Course {
                let limit = policy.max_course_applications_per_institution;
                let held = institution_applications(&existing, &listing.owner_id);
                if held >= limit as usize {
                    return Err(ConflictReason::InstitutionApplicationLimit { limit }.into());
                }
            }

            if let Some(ceiling) = policy.capacity_ceiling(listing.kind, listing.capacity) {
                if txn.accepted_count(&listing.id) >= ceiling {
                    return Err(LifecycleError::CapacityExceeded {
                        listing: listing.id.clone(),
                        capacity: ceiling,
                    });
                }
            }

            let application = Application {
                id: ApplicationId(next_id("app")),
                student_id: student.id.clone(),
                target_id: listing.id.clone(),
                target_type: listing.kind,
                owner_id: listing.owner_id.clone(),
                status: ApplicationStatus::Pending,
                cover_letter: submission.cover_letter.clone(),
                documents: submission.documents.clone(),
                applied_at: now,
                reviewed_at: None,
                reviewed_by: None,
                remarks: None,
                withdrawn_at: None,
            };
            txn.put_application(application.clone());
            Ok((application, student.profile.email, listing.title))
        })?;

        info!(
            application_id = %application.id,
            student_id = %application.student_id,
            listing_id = %application.target_id,
            "application submitted"
        );
        self.dispatch(
            Notification::new(email, NotificationTemplate::ApplicationReceived)
                .with("application_id", &application.id)
                .with("listing_title", title),
        );
        Ok(application)
    }

    /// Withdraw a pending application. Only the applicant may do this.
    pub fn withdraw_application(
        &self,
        student_id: &UserId,
        application_id: &ApplicationId,
    ) -> Result<Application, LifecycleError> {
        let now = self.now();

        let withdrawn = self.store.transact(|txn| {
            let mut application = load_owned(
                student_id,
                "application",
                application_id,
                || txn.application(application_id),
                |application: &Application| &application.student_id,
                "withdraw this application",
            )?;
            if application.status != ApplicationStatus::Pending {
                return Err(ConflictReason::NotWithdrawable {
                    status: application.status,
                }
                .into());
            }
            application.status = ApplicationStatus::Withdrawn;
            application.withdrawn_at = Some(now);
            txn.put_application(application.clone());
            Ok(application)
        })?;

        info!(application_id = %withdrawn.id, student_id = %student_id, "application withdrawn");
        Ok(withdrawn)
    }

    /// Fetch an application visible to its applicant or to the listing owner.
    pub fn application(
        &self,
        actor: &UserId,
        application_id: &ApplicationId,
    ) -> Result<Application, LifecycleError> {
        self.store.read(|view| {
            let application = view
                .application(application_id)
                .ok_or_else(|| LifecycleError::not_found("application", application_id))?;
            if &application.student_id != actor && &application.owner_id != actor {
                return Err(LifecycleError::forbidden(actor, "view this application"));
            }
            Ok(application)
        })
    }

    pub fn applications_for_student(
        &self,
        student_id: &UserId,
    ) -> Result<Vec<Application>, LifecycleError> {
        self.store
            .read(|view| Ok(view.applications_by_student(student_id)))
    }

    /// Applications received by a listing, for its owner.
    pub fn applications_for_listing(
        &self,
        owner_id: &UserId,
        listing_id: &ListingId,
    ) -> Result<Vec<Application>, LifecycleError> {
        self.store.read(|view| {
            load_owned(
                owner_id,
                "listing",
                listing_id,
                || view.listing(listing_id),
                |listing: &Listing| &listing.owner_id,
                "view applications for this listing",
            )?;
            Ok(view.applications_for_listing(listing_id))
        })
    }
}

fn ensure_open(listing: &Listing, now: chrono::DateTime<chrono::Utc>) -> Result<(), LifecycleError> {
    if listing.accepts_applications_at(now) {
        Ok(())
    } else if listing.status != ListingStatus::Active {
        Err(ConflictReason::ListingNotOpen.into())
    } else {
        Err(ConflictReason::DeadlinePassed.into())
    }
}

/// Course applications a student has ever sent to one institution, whatever their status.
fn institution_applications(applications: &[Application], institution: &UserId) -> usize {
    applications
        .iter()
        .filter(|application| {
            application.target_type == ListingKind::Course && &application.owner_id == institution
        })
        .count()
}

fn validate_submission(submission: &ApplicationSubmission) -> Result<(), LifecycleError> {
    if submission.target_id.as_str().trim().is_empty() {
        return Err(LifecycleError::validation("target_id is required"));
    }
    if submission
        .cover_letter
        .as_deref()
        .is_some_and(|letter| letter.chars().count() > MAX_COVER_LETTER_LEN)
    {
        return Err(LifecycleError::validation(format!(
            "cover letter exceeds {MAX_COVER_LETTER_LEN} characters"
        )));
    }
    if submission.documents.len() > MAX_DOCUMENTS {
        return Err(LifecycleError::validation(format!(
            "at most {MAX_DOCUMENTS} documents may be attached"
        )));
    }
    if submission
        .documents
        .iter()
        .any(|document| document.name.trim().is_empty() || document.storage_key.trim().is_empty())
    {
        return Err(LifecycleError::validation(
            "documents require a name and storage key",
        ));
    }
    Ok(())
}
