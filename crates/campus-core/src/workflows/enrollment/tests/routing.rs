use std::sync::Arc;

use axum::body::Body;
use axum::extract::State;
use axum::http::{Request, StatusCode};
use axum::Router;
use serde_json::{json, Value};
use tower::ServiceExt;

use super::common::*;
use crate::workflows::enrollment::domain::{ApplicationStatus, ReviewDecision};
use crate::workflows::enrollment::policy::LifecyclePolicy;
use crate::workflows::enrollment::router::{
    enrollment_router, search_listings_handler, ACTOR_HEADER,
};
use crate::workflows::enrollment::search::ListingQuery;
use crate::workflows::enrollment::service::EnrollmentService;

fn router_for(fixture: &Fixture) -> Router {
    enrollment_router(fixture.service.clone())
}

fn json_request(method: &str, uri: &str, actor: Option<&str>, body: Value) -> Request<Body> {
    let mut builder = Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json");
    if let Some(actor) = actor {
        builder = builder.header(ACTOR_HEADER, actor);
    }
    builder
        .body(Body::from(serde_json::to_vec(&body).expect("serialize body")))
        .expect("request")
}

fn empty_request(method: &str, uri: &str, actor: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(actor) = actor {
        builder = builder.header(ACTOR_HEADER, actor);
    }
    builder.body(Body::empty()).expect("request")
}

#[tokio::test]
async fn register_route_creates_student() {
    let fixture = Fixture::new();
    let response = router_for(&fixture)
        .oneshot(json_request(
            "POST",
            "/api/v1/users",
            None,
            json!({
                "role": "student",
                "profile": {
                    "name": "Route Student",
                    "email": "route.student@example.test",
                    "skills": ["rust"]
                }
            }),
        ))
        .await
        .expect("router dispatch");

    assert_eq!(response.status(), StatusCode::CREATED);
    let payload = read_json_body(response).await;
    assert_eq!(payload.get("role"), Some(&json!("student")));
    assert_eq!(payload.get("approval"), Some(&json!("approved")));
}

#[tokio::test]
async fn submit_route_requires_actor_header() {
    let fixture = Fixture::new();
    let institute = fixture.institute("Header College");
    let course = fixture.course(&institute, 3);

    let response = router_for(&fixture)
        .oneshot(json_request(
            "POST",
            "/api/v1/applications",
            None,
            json!({ "target_id": course.id, "target_type": "course" }),
        ))
        .await
        .expect("router dispatch");

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let payload = read_json_body(response).await;
    assert_eq!(payload.get("code"), Some(&json!("unauthenticated")));
}

#[tokio::test]
async fn submit_route_maps_lifecycle_errors() {
    let fixture = Fixture::new();
    let institute = fixture.institute("Mapping College");
    let course = fixture.course(&institute, 3);
    let student = fixture.student("Map Student");
    let router = router_for(&fixture);
    let body = json!({
        "target_id": course.id,
        "target_type": "course",
        "cover_letter": "Hello"
    });

    let created = router
        .clone()
        .oneshot(json_request(
            "POST",
            "/api/v1/applications",
            Some(student.as_str()),
            body.clone(),
        ))
        .await
        .expect("router dispatch");
    assert_eq!(created.status(), StatusCode::CREATED);
    let payload = read_json_body(created).await;
    assert_eq!(payload.get("status"), Some(&json!("pending")));
    assert_eq!(payload.get("owner_id"), Some(&json!(institute.as_str())));

    let duplicate = router
        .clone()
        .oneshot(json_request(
            "POST",
            "/api/v1/applications",
            Some(student.as_str()),
            body.clone(),
        ))
        .await
        .expect("router dispatch");
    assert_eq!(duplicate.status(), StatusCode::CONFLICT);
    let payload = read_json_body(duplicate).await;
    assert_eq!(payload.get("code"), Some(&json!("duplicate_application")));

    let forbidden = router
        .clone()
        .oneshot(json_request(
            "POST",
            "/api/v1/applications",
            Some(institute.as_str()),
            body,
        ))
        .await
        .expect("router dispatch");
    assert_eq!(forbidden.status(), StatusCode::FORBIDDEN);

    let invalid = router
        .oneshot(json_request(
            "POST",
            "/api/v1/applications",
            Some(student.as_str()),
            json!({ "target_id": "", "target_type": "course" }),
        ))
        .await
        .expect("router dispatch");
    assert_eq!(invalid.status(), StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn review_route_returns_conflict_after_decision() {
    let fixture = Fixture::new();
    let institute = fixture.institute("Review Route College");
    let course = fixture.course(&institute, 3);
    let student = fixture.student("Review Route Student");
    let application = fixture
        .service
        .submit_application(&student, apply_to(&course))
        .expect("apply");
    fixture
        .service
        .review_application(
            &institute,
            &application.id,
            ReviewDecision {
                status: ApplicationStatus::Rejected,
                remarks: None,
            },
        )
        .expect("reject");

    let response = router_for(&fixture)
        .oneshot(json_request(
            "PUT",
            &format!("/api/v1/applications/{}/review", application.id),
            Some(institute.as_str()),
            json!({ "status": "accepted" }),
        ))
        .await
        .expect("router dispatch");

    assert_eq!(response.status(), StatusCode::CONFLICT);
    let payload = read_json_body(response).await;
    assert_eq!(payload.get("code"), Some(&json!("already_decided")));
}

#[tokio::test]
async fn listing_route_reports_missing_listing() {
    let fixture = Fixture::new();
    let response = router_for(&fixture)
        .oneshot(empty_request("GET", "/api/v1/listings/course-missing", None))
        .await
        .expect("router dispatch");

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let payload = read_json_body(response).await;
    assert_eq!(payload.get("code"), Some(&json!("not_found")));
}

#[tokio::test]
async fn admissions_routes_cover_offer_and_response() {
    let fixture = Fixture::new();
    let institute = fixture.institute("Admit Route College");
    let course = fixture.course(&institute, 3);
    let student = fixture.student("Admit Route Student");
    let application = fixture
        .service
        .submit_application(&student, apply_to(&course))
        .expect("apply");
    fixture
        .service
        .review_application(
            &institute,
            &application.id,
            ReviewDecision {
                status: ApplicationStatus::Accepted,
                remarks: None,
            },
        )
        .expect("accept");
    let router = router_for(&fixture);

    let issued = router
        .clone()
        .oneshot(json_request(
            "POST",
            "/api/v1/admissions",
            Some(institute.as_str()),
            json!({ "course_id": course.id, "student_ids": [student.as_str()] }),
        ))
        .await
        .expect("router dispatch");
    assert_eq!(issued.status(), StatusCode::CREATED);
    let payload = read_json_body(issued).await;
    let admission_id = payload[0]["id"].as_str().expect("admission id").to_string();

    let answered = router
        .clone()
        .oneshot(json_request(
            "POST",
            "/api/v1/admissions/respond",
            Some(student.as_str()),
            json!({ "admission_id": admission_id, "accept": true }),
        ))
        .await
        .expect("router dispatch");
    assert_eq!(answered.status(), StatusCode::OK);
    let payload = read_json_body(answered).await;
    assert_eq!(payload.get("student_response"), Some(&json!("accepted")));

    let listed = router
        .oneshot(empty_request(
            "GET",
            "/api/v1/admissions",
            Some(institute.as_str()),
        ))
        .await
        .expect("router dispatch");
    assert_eq!(listed.status(), StatusCode::OK);
    let payload = read_json_body(listed).await;
    assert_eq!(payload.as_array().map(Vec::len), Some(1));
}

#[tokio::test]
async fn admissions_listing_forbids_unknown_and_company_actors() {
    let fixture = Fixture::new();
    let company = fixture.company("Recruiting Ltd");
    let router = router_for(&fixture);

    for actor in ["usr-ghost", company.as_str()] {
        let response = router
            .clone()
            .oneshot(empty_request("GET", "/api/v1/admissions", Some(actor)))
            .await
            .expect("router dispatch");
        assert_eq!(response.status(), StatusCode::FORBIDDEN, "actor {actor}");
        let payload = read_json_body(response).await;
        assert_eq!(payload.get("code"), Some(&json!("forbidden")));
    }
}

#[tokio::test]
async fn search_handler_returns_internal_error_when_store_is_down() {
    let service = Arc::new(EnrollmentService::new(
        Arc::new(UnavailableStore),
        Arc::new(MemoryNotifier::default()),
        LifecyclePolicy::default(),
    ));

    let response = search_listings_handler::<UnavailableStore, MemoryNotifier>(
        State(service),
        axum::extract::Query(ListingQuery::default()),
    )
    .await;

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let payload = read_json_body(response).await;
    assert_eq!(payload.get("error"), Some(&json!("internal error")));
    assert_eq!(payload.get("code"), Some(&json!("internal_error")));
}
