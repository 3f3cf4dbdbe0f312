use tracing::info;

use super::domain::{Application, ApplicationId, ApplicationStatus, ReviewDecision, UserId};
use super::error::{ConflictReason, LifecycleError};
use super::notify::{Notification, NotificationTemplate, Notifier};
use super::policy::{is_reviewable, review_targets, ReviewerApprovalMode};
use super::service::{load_owned, EnrollmentService};
use super::store::{LedgerStore, LedgerView};

const MAX_REMARKS_LEN: usize = 2_000;

impl<S, N> EnrollmentService<S, N>
where
    S: LedgerStore + 'static,
    N: Notifier + 'static,
{
    /// Move an application out of `pending` (or a non-terminal job stage) on behalf of the
    /// owning institution or company. The capacity check for acceptances reads the accepted
    /// count inside the same transaction as the status write.
    pub fn review_application(
        &self,
        reviewer_id: &UserId,
        application_id: &ApplicationId,
        decision: ReviewDecision,
    ) -> Result<Application, LifecycleError> {
        validate_decision(&decision)?;
        let now = self.now();
        let policy = self.policy;

        let (application, email) = self.store.transact(|txn| {
            let mut application = load_owned(
                reviewer_id,
                "application",
                application_id,
                || txn.application(application_id),
                |application: &Application| &application.owner_id,
                "review this application",
            )?;

            if policy.reviewer_approval == ReviewerApprovalMode::Required {
                let approved = txn
                    .user(reviewer_id)
                    .is_some_and(|reviewer| reviewer.is_approved());
                if !approved {
                    return Err(LifecycleError::forbidden(
                        reviewer_id,
                        "review applications without an approved account",
                    ));
                }
            }

            if !is_reviewable(application.target_type, application.status) {
                return Err(ConflictReason::AlreadyDecided {
                    status: application.status,
                }
                .into());
            }
            if !review_targets(application.target_type).contains(&decision.status) {
                return Err(LifecycleError::validation(format!(
                    "{} applications cannot be moved to {}",
                    application.target_type.label(),
                    decision.status
                )));
            }

            if decision.status == ApplicationStatus::Accepted {
                let listing = txn.listing(&application.target_id).ok_or_else(|| {
                    LifecycleError::not_found("listing", &application.target_id)
                })?;
                if let Some(ceiling) = policy.capacity_ceiling(listing.kind, listing.capacity) {
                    if txn.accepted_count(&listing.id) >= ceiling {
                        return Err(LifecycleError::CapacityExceeded {
                            listing: listing.id,
                            capacity: ceiling,
                        });
                    }
                }
            }

            application.status = decision.status;
            application.reviewed_at = Some(now);
            application.reviewed_by = Some(reviewer_id.clone());
            application.remarks = decision.remarks.clone();
            txn.put_application(application.clone());

            let email = txn
                .user(&application.student_id)
                .map(|student| student.profile.email);
            Ok((application, email))
        })?;

        info!(
            application_id = %application.id,
            reviewer_id = %reviewer_id,
            status = application.status.label(),
            "application reviewed"
        );
        if let Some(email) = email {
            let mut notification =
                Notification::new(email, NotificationTemplate::ApplicationReviewed)
                    .with("application_id", &application.id)
                    .with("status", application.status.label());
            if let Some(remarks) = &application.remarks {
                notification = notification.with("remarks", remarks);
            }
            self.dispatch(notification);
        }
        Ok(application)
    }
}

fn validate_decision(decision: &ReviewDecision) -> Result<(), LifecycleError> {
    if matches!(
        decision.status,
        ApplicationStatus::Pending | ApplicationStatus::Withdrawn
    ) {
        return Err(LifecycleError::validation(format!(
            "reviewers cannot set status {}",
            decision.status
        )));
    }
    if decision
        .remarks
        .as_deref()
        .is_some_and(|remarks| remarks.chars().count() > MAX_REMARKS_LEN)
    {
        return Err(LifecycleError::validation(format!(
            "remarks exceed {MAX_REMARKS_LEN} characters"
        )));
    }
    Ok(())
}
