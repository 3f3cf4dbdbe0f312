use std::collections::HashSet;

use tracing::{debug, info};

use super::domain::{
    Admission, AdmissionId, AdmissionRequest, AdmissionResponse, AdmissionStatus,
    ApplicationStatus, Listing, ListingKind, Role, StudentResponse, UserId,
};
use super::directory::require_role;
use super::error::{ConflictReason, LifecycleError};
use super::notify::{Notification, NotificationTemplate, Notifier};
use super::policy::ReviewerApprovalMode;
use super::service::{load_owned, next_id, EnrollmentService};
use super::store::{LedgerStore, LedgerView};

const MAX_BATCH: usize = 500;

impl<S, N> EnrollmentService<S, N>
where
    S: LedgerStore + 'static,
    N: Notifier + 'static,
{
    /// Issue offers for a course in one batch. Students without an accepted application,
    /// or who already hold an admission for the course, are skipped without error; only
    /// the admissions actually created are returned.
    pub fn issue_admission_offers(
        &self,
        institution_id: &UserId,
        request: AdmissionRequest,
    ) -> Result<Vec<Admission>, LifecycleError> {
        validate_request(&request)?;
        let now = self.now();
        let policy = self.policy;

        let (created, course_title) = self.store.transact(|txn| {
            let course = load_owned(
                institution_id,
                "listing",
                &request.course_id,
                || txn.listing(&request.course_id),
                |listing: &Listing| &listing.owner_id,
                "issue admissions for this course",
            )?;
            if course.kind != ListingKind::Course {
                return Err(LifecycleError::validation(
                    "admissions can only be issued for courses",
                ));
            }
            if policy.reviewer_approval == ReviewerApprovalMode::Required
                && !txn
                    .user(institution_id)
                    .is_some_and(|institution| institution.is_approved())
            {
                return Err(LifecycleError::forbidden(
                    institution_id,
                    "issue admissions without an approved account",
                ));
            }

            let mut seen = HashSet::new();
            let mut created = Vec::new();
            for student_id in &request.student_ids {
                if !seen.insert(student_id.clone()) {
                    continue;
                }

                let accepted = txn.applications_by_student(student_id).iter().any(|application| {
                    application.target_id == course.id
                        && application.status == ApplicationStatus::Accepted
                });
                if !accepted {
                    debug!(student_id = %student_id, course_id = %course.id, "no accepted application, skipping offer");
                    continue;
                }

                let already_admitted = txn
                    .admissions_by_student(student_id)
                    .iter()
                    .any(|admission| admission.course_id == course.id);
                if already_admitted {
                    debug!(student_id = %student_id, course_id = %course.id, "admission exists, skipping offer");
                    continue;
                }

                let admission = Admission {
                    id: AdmissionId(next_id("adm")),
                    student_id: student_id.clone(),
                    course_id: course.id.clone(),
                    institution_id: institution_id.clone(),
                    status: AdmissionStatus::Offered,
                    student_response: None,
                    offered_at: now,
                    responded_at: None,
                };
                txn.put_admission(admission.clone());
                let email = txn.user(student_id).map(|student| student.profile.email);
                created.push((admission, email));
            }
            Ok((created, course.title))
        })?;

        info!(
            institution_id = %institution_id,
            course_id = %request.course_id,
            requested = request.student_ids.len(),
            issued = created.len(),
            "admission offers issued"
        );

        let mut admissions = Vec::with_capacity(created.len());
        for (admission, email) in created {
            if let Some(email) = email {
                self.dispatch(
                    Notification::new(email, NotificationTemplate::AdmissionOffered)
                        .with("admission_id", &admission.id)
                        .with("course_title", &course_title),
                );
            }
            admissions.push(admission);
        }
        Ok(admissions)
    }

    /// Record the student's one and only answer to an offer. A student may accept at most
    /// one admission across the whole system; the scan and the write share a transaction.
    pub fn respond_to_admission(
        &self,
        student_id: &UserId,
        response: AdmissionResponse,
    ) -> Result<Admission, LifecycleError> {
        let now = self.now();

        let admission = self.store.transact(|txn| {
            let mut admission = load_owned(
                student_id,
                "admission",
                &response.admission_id,
                || txn.admission(&response.admission_id),
                |admission: &Admission| &admission.student_id,
                "respond to this admission",
            )?;
            if admission.student_response.is_some() {
                return Err(ConflictReason::AdmissionAlreadyAnswered.into());
            }

            let answer = if response.accept {
                if let Some(existing) = txn.admissions_by_student(student_id).into_iter().find(
                    |other| {
                        other.id != admission.id
                            && other.student_response == Some(StudentResponse::Accepted)
                    },
                ) {
                    return Err(ConflictReason::AdmissionAlreadyAccepted {
                        existing: existing.id,
                    }
                    .into());
                }
                StudentResponse::Accepted
            } else {
                StudentResponse::Declined
            };

            admission.student_response = Some(answer);
            admission.responded_at = Some(now);
            txn.put_admission(admission.clone());
            Ok(admission)
        })?;

        info!(
            admission_id = %admission.id,
            student_id = %student_id,
            response = ?admission.student_response,
            "admission answered"
        );
        Ok(admission)
    }

    pub fn admissions_for_student(
        &self,
        student_id: &UserId,
    ) -> Result<Vec<Admission>, LifecycleError> {
        self.store
            .read(|view| Ok(view.admissions_by_student(student_id)))
    }

    pub fn admissions_for_institution(
        &self,
        institution_id: &UserId,
    ) -> Result<Vec<Admission>, LifecycleError> {
        self.store
            .read(|view| Ok(view.admissions_by_institution(institution_id)))
    }

    /// Admissions visible to the actor: issued ones for an institute, received ones for a student.
    pub fn admissions_for_actor(&self, actor: &UserId) -> Result<Vec<Admission>, LifecycleError> {
        self.store.read(|view| {
            let user = require_role(
                view,
                actor,
                &[Role::Student, Role::Institute],
                "view admissions",
            )?;
            Ok(match user.role {
                Role::Institute => view.admissions_by_institution(actor),
                _ => view.admissions_by_student(actor),
            })
        })
    }
}

fn validate_request(request: &AdmissionRequest) -> Result<(), LifecycleError> {
    if request.course_id.as_str().trim().is_empty() {
        return Err(LifecycleError::validation("course_id is required"));
    }
    if request.student_ids.is_empty() {
        return Err(LifecycleError::validation("student_ids must not be empty"));
    }
    if request.student_ids.len() > MAX_BATCH {
        return Err(LifecycleError::validation(format!(
            "at most {MAX_BATCH} students per batch"
        )));
    }
    Ok(())
}
