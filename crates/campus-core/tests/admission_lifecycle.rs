//! End-to-end scenarios for the application, review, and admission lifecycle, driven through
//! the public service facade and the HTTP router.

mod common {
    use std::sync::{Arc, Mutex};

    use campus_core::workflows::enrollment::{
        ApplicationSubmission, ApprovalStatus, EnrollmentService, InMemoryLedger, LifecyclePolicy,
        Listing, ListingKind, NewListing, Notification, Notifier, NotifyError, RegisterUser, Role,
        UserId, UserProfile,
    };

    pub(super) const ADMIN: &str = "admin-e2e";

    #[derive(Default, Clone)]
    pub(super) struct Outbox {
        sent: Arc<Mutex<Vec<Notification>>>,
    }

    impl Outbox {
        pub(super) fn sent(&self) -> Vec<Notification> {
            self.sent.lock().expect("outbox mutex poisoned").clone()
        }
    }

    impl Notifier for Outbox {
        fn notify(&self, notification: Notification) -> Result<(), NotifyError> {
            self.sent
                .lock()
                .expect("outbox mutex poisoned")
                .push(notification);
            Ok(())
        }
    }

    pub(super) type Service = EnrollmentService<InMemoryLedger, Outbox>;

    pub(super) fn build_service() -> (Arc<Service>, Outbox) {
        let outbox = Outbox::default();
        let service = EnrollmentService::new(
            Arc::new(InMemoryLedger::new()),
            Arc::new(outbox.clone()),
            LifecyclePolicy::default(),
        );
        service
            .bootstrap_admin(UserId::new(ADMIN), "admin@e2e.test")
            .expect("admin bootstrap");
        (Arc::new(service), outbox)
    }

    pub(super) fn register(service: &Service, role: Role, name: &str) -> UserId {
        let user = service
            .register_user(RegisterUser {
                role,
                profile: UserProfile {
                    name: name.to_string(),
                    email: format!("{}@e2e.test", name.to_lowercase().replace(' ', "-")),
                    ..UserProfile::default()
                },
            })
            .expect("registration");
        if role.requires_approval() {
            service
                .set_approval(&UserId::new(ADMIN), &user.id, ApprovalStatus::Approved)
                .expect("approval");
        }
        user.id
    }

    pub(super) fn course(
        service: &Service,
        institution: &UserId,
        title: &str,
        seats: u32,
    ) -> Listing {
        service
            .create_listing(
                institution,
                NewListing {
                    kind: ListingKind::Course,
                    title: title.to_string(),
                    description: String::new(),
                    location: None,
                    skills: Vec::new(),
                    capacity: Some(seats),
                    deadline: None,
                },
            )
            .expect("course")
    }

    pub(super) fn submission(listing: &Listing) -> ApplicationSubmission {
        ApplicationSubmission {
            target_id: listing.id.clone(),
            target_type: listing.kind,
            cover_letter: None,
            documents: Vec::new(),
        }
    }
}

mod service_facade {
    use std::sync::Barrier;

    use super::common::*;
    use campus_core::workflows::enrollment::{
        AdmissionRequest, AdmissionResponse, AdmissionStatus, ApplicationStatus, ConflictReason,
        LifecycleError, NotificationTemplate, ReviewDecision, Role, StudentResponse,
    };

    #[test]
    fn student_flows_from_application_to_single_acceptance() {
        let (service, outbox) = build_service();
        let s1 = register(&service, Role::Student, "S One");
        let i1 = register(&service, Role::Institute, "Institute One");
        let i2 = register(&service, Role::Institute, "Institute Two");
        let c1 = course(&service, &i1, "Course One", 1);
        let c2 = course(&service, &i1, "Course Two", 10);
        let c3 = course(&service, &i1, "Course Three", 10);
        let d1 = course(&service, &i2, "Other Course", 10);

        let a1 = service.submit_application(&s1, submission(&c1)).expect("c1");
        let a2 = service.submit_application(&s1, submission(&c2)).expect("c2");
        assert_eq!(a1.status, ApplicationStatus::Pending);
        assert_eq!(a2.status, ApplicationStatus::Pending);

        match service.submit_application(&s1, submission(&c3)) {
            Err(LifecycleError::Conflict(ConflictReason::InstitutionApplicationLimit { limit })) => {
                assert_eq!(limit, 2)
            }
            other => panic!("expected institution limit conflict, got {other:?}"),
        }

        let accepted = service
            .review_application(
                &i1,
                &a1.id,
                ReviewDecision {
                    status: ApplicationStatus::Accepted,
                    remarks: Some("See you in class".to_string()),
                },
            )
            .expect("accept");
        assert_eq!(accepted.status, ApplicationStatus::Accepted);

        let offers = service
            .issue_admission_offers(
                &i1,
                AdmissionRequest {
                    course_id: c1.id.clone(),
                    student_ids: vec![s1.clone()],
                },
            )
            .expect("offers");
        assert_eq!(offers.len(), 1);
        assert_eq!(offers[0].status, AdmissionStatus::Offered);

        let first = service
            .respond_to_admission(
                &s1,
                AdmissionResponse {
                    admission_id: offers[0].id.clone(),
                    accept: true,
                },
            )
            .expect("first acceptance");
        assert_eq!(first.student_response, Some(StudentResponse::Accepted));

        let other = service.submit_application(&s1, submission(&d1)).expect("d1");
        service
            .review_application(
                &i2,
                &other.id,
                ReviewDecision {
                    status: ApplicationStatus::Accepted,
                    remarks: None,
                },
            )
            .expect("accept elsewhere");
        let second_offer = service
            .issue_admission_offers(
                &i2,
                AdmissionRequest {
                    course_id: d1.id.clone(),
                    student_ids: vec![s1.clone()],
                },
            )
            .expect("second offer")
            .remove(0);

        assert!(matches!(
            service.respond_to_admission(
                &s1,
                AdmissionResponse {
                    admission_id: second_offer.id.clone(),
                    accept: true,
                },
            ),
            Err(LifecycleError::Conflict(
                ConflictReason::AdmissionAlreadyAccepted { .. }
            ))
        ));

        let accepted_admissions: Vec<_> = service
            .admissions_for_student(&s1)
            .expect("admissions")
            .into_iter()
            .filter(|admission| admission.student_response == Some(StudentResponse::Accepted))
            .collect();
        assert_eq!(accepted_admissions.len(), 1);
        assert_eq!(accepted_admissions[0].id, offers[0].id);

        let templates: Vec<_> = outbox.sent().into_iter().map(|sent| sent.template).collect();
        assert!(templates.contains(&NotificationTemplate::ApplicationReceived));
        assert!(templates.contains(&NotificationTemplate::ApplicationReviewed));
        assert!(templates.contains(&NotificationTemplate::AdmissionOffered));
    }

    #[test]
    fn full_course_rejects_further_acceptances() {
        let (service, _) = build_service();
        let institution = register(&service, Role::Institute, "Small Institute");
        let seminar = course(&service, &institution, "Seminar", 1);
        let first = register(&service, Role::Student, "First Student");
        let second = register(&service, Role::Student, "Second Student");
        let first_app = service
            .submit_application(&first, submission(&seminar))
            .expect("first");
        let second_app = service
            .submit_application(&second, submission(&seminar))
            .expect("second");

        let accept = ReviewDecision {
            status: ApplicationStatus::Accepted,
            remarks: None,
        };
        service
            .review_application(&institution, &first_app.id, accept.clone())
            .expect("seat one");
        assert!(matches!(
            service.review_application(&institution, &second_app.id, accept),
            Err(LifecycleError::CapacityExceeded { capacity: 1, .. })
        ));
    }

    #[test]
    fn concurrent_duplicate_submissions_store_one_application() {
        let (service, _) = build_service();
        let institution = register(&service, Role::Institute, "Busy Institute");
        let listing = course(&service, &institution, "Popular Course", 50);
        let student = register(&service, Role::Student, "Eager Student");

        let barrier = Barrier::new(6);
        let (barrier, service, student, listing) = (&barrier, &service, &student, &listing);
        let successes = std::thread::scope(|scope| {
            let handles: Vec<_> = (0..6)
                .map(|_| {
                    scope.spawn(move || {
                        barrier.wait();
                        service
                            .submit_application(student, submission(listing))
                            .is_ok()
                    })
                })
                .collect();
            handles
                .into_iter()
                .map(|handle| handle.join().expect("thread joins"))
                .filter(|ok| *ok)
                .count()
        });

        assert_eq!(successes, 1);
        assert_eq!(
            service
                .applications_for_student(student)
                .expect("applications")
                .len(),
            1
        );
    }
}

mod http_surface {
    use super::common::*;
    use axum::body::{to_bytes, Body};
    use axum::http::{Request, StatusCode};
    use campus_core::workflows::enrollment::{enrollment_router, Role, ACTOR_HEADER};
    use serde_json::{json, Value};
    use tower::ServiceExt;

    async fn call(router: &axum::Router, request: Request<Body>) -> (StatusCode, Value) {
        let response = router
            .clone()
            .oneshot(request)
            .await
            .expect("router dispatch");
        let status = response.status();
        let body = to_bytes(response.into_body(), 1024 * 1024)
            .await
            .expect("body");
        let payload = if body.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&body).expect("json payload")
        };
        (status, payload)
    }

    fn post(uri: &str, actor: &str, body: Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", "application/json")
            .header(ACTOR_HEADER, actor)
            .body(Body::from(serde_json::to_vec(&body).expect("serialize")))
            .expect("request")
    }

    #[tokio::test]
    async fn withdraw_over_http_enforces_applicant_ownership() {
        let (service, _) = build_service();
        let student = register(&service, Role::Student, "Http Student");
        let intruder = register(&service, Role::Student, "Http Intruder");
        let institution = register(&service, Role::Institute, "Http Institute");
        let listing = course(&service, &institution, "Http Course", 5);
        let router = enrollment_router(service.clone());

        let (status, created) = call(
            &router,
            post(
                "/api/v1/applications",
                student.as_str(),
                json!({ "target_id": listing.id, "target_type": "course" }),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        let application_id = created["id"].as_str().expect("application id").to_string();

        let delete = |actor: &str| {
            Request::builder()
                .method("DELETE")
                .uri(format!("/api/v1/applications/{application_id}"))
                .header(ACTOR_HEADER, actor)
                .body(Body::empty())
                .expect("request")
        };

        let (status, payload) = call(&router, delete(intruder.as_str())).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(payload["code"], json!("forbidden"));

        let (status, payload) = call(&router, delete(student.as_str())).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(payload["status"], json!("withdrawn"));

        let (status, payload) = call(&router, delete(student.as_str())).await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(payload["code"], json!("not_withdrawable"));
    }

    #[tokio::test]
    async fn capacity_exhaustion_maps_to_conflict() {
        let (service, _) = build_service();
        let institution = register(&service, Role::Institute, "Tiny Institute");
        let listing = course(&service, &institution, "Tiny Course", 1);
        let router = enrollment_router(service.clone());

        let mut application_ids = Vec::new();
        for name in ["Tiny One", "Tiny Two"] {
            let student = register(&service, Role::Student, name);
            let (status, created) = call(
                &router,
                post(
                    "/api/v1/applications",
                    student.as_str(),
                    json!({ "target_id": listing.id, "target_type": "course" }),
                ),
            )
            .await;
            assert_eq!(status, StatusCode::CREATED);
            application_ids.push(created["id"].as_str().expect("id").to_string());
        }

        let review = |id: &str| {
            Request::builder()
                .method("PUT")
                .uri(format!("/api/v1/applications/{id}/review"))
                .header("content-type", "application/json")
                .header(ACTOR_HEADER, institution.as_str())
                .body(Body::from(r#"{"status":"accepted"}"#))
                .expect("request")
        };

        let (status, _) = call(&router, review(&application_ids[0])).await;
        assert_eq!(status, StatusCode::OK);
        let (status, payload) = call(&router, review(&application_ids[1])).await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(payload["code"], json!("capacity_exceeded"));
    }
}
