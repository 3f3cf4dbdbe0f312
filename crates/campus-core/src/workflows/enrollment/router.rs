use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post, put},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::error;

use super::domain::{
    AdmissionRequest, AdmissionResponse, ApplicationId, ApplicationSubmission, ApprovalStatus,
    ListingId, NewListing, RegisterUser, ReviewDecision, UserId,
};
use super::error::LifecycleError;
use super::notify::Notifier;
use super::search::{CandidateQuery, ListingQuery};
use super::service::EnrollmentService;
use super::store::LedgerStore;

/// Header carrying the authenticated user id, set by the upstream auth layer.
pub const ACTOR_HEADER: &str = "x-actor-id";

type SharedService<S, N> = State<Arc<EnrollmentService<S, N>>>;

/// Router builder exposing the lifecycle over HTTP.
pub fn enrollment_router<S, N>(service: Arc<EnrollmentService<S, N>>) -> Router
where
    S: LedgerStore + 'static,
    N: Notifier + 'static,
{
    Router::new()
        .route("/api/v1/users", post(register_handler::<S, N>))
        .route(
            "/api/v1/users/:user_id/approval",
            put(approval_handler::<S, N>),
        )
        .route(
            "/api/v1/users/:user_id/verification",
            put(verification_handler::<S, N>),
        )
        .route("/api/v1/candidates", get(candidates_handler::<S, N>))
        .route(
            "/api/v1/listings",
            post(create_listing_handler::<S, N>).get(search_listings_handler::<S, N>),
        )
        .route(
            "/api/v1/listings/import",
            post(import_listings_handler::<S, N>),
        )
        .route(
            "/api/v1/listings/:listing_id",
            get(listing_handler::<S, N>),
        )
        .route(
            "/api/v1/listings/:listing_id/close",
            put(close_listing_handler::<S, N>),
        )
        .route(
            "/api/v1/applications",
            post(submit_handler::<S, N>).get(list_applications_handler::<S, N>),
        )
        .route(
            "/api/v1/applications/:application_id",
            get(application_handler::<S, N>).delete(withdraw_handler::<S, N>),
        )
        .route(
            "/api/v1/applications/:application_id/review",
            put(review_handler::<S, N>),
        )
        .route(
            "/api/v1/admissions",
            post(issue_admissions_handler::<S, N>).get(list_admissions_handler::<S, N>),
        )
        .route(
            "/api/v1/admissions/respond",
            post(respond_handler::<S, N>),
        )
        .with_state(service)
}

impl IntoResponse for LifecycleError {
    fn into_response(self) -> Response {
        let status = match &self {
            LifecycleError::NotFound { .. } => StatusCode::NOT_FOUND,
            LifecycleError::Conflict(_) | LifecycleError::CapacityExceeded { .. } => {
                StatusCode::CONFLICT
            }
            LifecycleError::Forbidden { .. } => StatusCode::FORBIDDEN,
            LifecycleError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            LifecycleError::Store(err) => {
                error!(error = %err, "lifecycle store failure");
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };

        let message = match &self {
            LifecycleError::Store(_) => "internal error".to_string(),
            other => other.to_string(),
        };
        let payload = json!({
            "error": message,
            "code": self.code(),
        });
        (status, Json(payload)).into_response()
    }
}

fn respond<T: Serialize>(status: StatusCode, result: Result<T, LifecycleError>) -> Response {
    match result {
        Ok(body) => (status, Json(body)).into_response(),
        Err(err) => err.into_response(),
    }
}

pub(crate) fn actor_from(headers: &HeaderMap) -> Result<UserId, Response> {
    headers
        .get(ACTOR_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(UserId::new)
        .ok_or_else(|| {
            let payload = json!({
                "error": format!("missing {ACTOR_HEADER} header"),
                "code": "unauthenticated",
            });
            (StatusCode::UNAUTHORIZED, Json(payload)).into_response()
        })
}

macro_rules! actor_or_return {
    ($headers:expr) => {
        match actor_from(&$headers) {
            Ok(actor) => actor,
            Err(response) => return response,
        }
    };
}

#[derive(Debug, Deserialize)]
pub(crate) struct ApprovalBody {
    pub(crate) status: ApprovalStatus,
}

#[derive(Debug, Deserialize)]
pub(crate) struct CatalogImportBody {
    pub(crate) csv: String,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct ApplicationsQuery {
    #[serde(default)]
    pub(crate) listing_id: Option<ListingId>,
}

pub(crate) async fn register_handler<S, N>(
    State(service): SharedService<S, N>,
    Json(request): Json<RegisterUser>,
) -> Response
where
    S: LedgerStore + 'static,
    N: Notifier + 'static,
{
    respond(StatusCode::CREATED, service.register_user(request))
}

pub(crate) async fn approval_handler<S, N>(
    State(service): SharedService<S, N>,
    headers: HeaderMap,
    Path(user_id): Path<String>,
    Json(body): Json<ApprovalBody>,
) -> Response
where
    S: LedgerStore + 'static,
    N: Notifier + 'static,
{
    let actor = actor_or_return!(headers);
    respond(
        StatusCode::OK,
        service.set_approval(&actor, &UserId(user_id), body.status),
    )
}

pub(crate) async fn verification_handler<S, N>(
    State(service): SharedService<S, N>,
    headers: HeaderMap,
    Path(user_id): Path<String>,
) -> Response
where
    S: LedgerStore + 'static,
    N: Notifier + 'static,
{
    let actor = actor_or_return!(headers);
    respond(StatusCode::OK, service.verify_user(&actor, &UserId(user_id)))
}

pub(crate) async fn candidates_handler<S, N>(
    State(service): SharedService<S, N>,
    headers: HeaderMap,
    Query(query): Query<CandidateQuery>,
) -> Response
where
    S: LedgerStore + 'static,
    N: Notifier + 'static,
{
    let actor = actor_or_return!(headers);
    respond(StatusCode::OK, service.search_candidates(&actor, &query))
}

pub(crate) async fn create_listing_handler<S, N>(
    State(service): SharedService<S, N>,
    headers: HeaderMap,
    Json(listing): Json<NewListing>,
) -> Response
where
    S: LedgerStore + 'static,
    N: Notifier + 'static,
{
    let actor = actor_or_return!(headers);
    respond(StatusCode::CREATED, service.create_listing(&actor, listing))
}

pub(crate) async fn import_listings_handler<S, N>(
    State(service): SharedService<S, N>,
    headers: HeaderMap,
    Json(body): Json<CatalogImportBody>,
) -> Response
where
    S: LedgerStore + 'static,
    N: Notifier + 'static,
{
    let actor = actor_or_return!(headers);
    respond(StatusCode::CREATED, service.import_listings(&actor, &body.csv))
}

pub(crate) async fn search_listings_handler<S, N>(
    State(service): SharedService<S, N>,
    Query(query): Query<ListingQuery>,
) -> Response
where
    S: LedgerStore + 'static,
    N: Notifier + 'static,
{
    respond(StatusCode::OK, service.search_listings(&query))
}

pub(crate) async fn listing_handler<S, N>(
    State(service): SharedService<S, N>,
    Path(listing_id): Path<String>,
) -> Response
where
    S: LedgerStore + 'static,
    N: Notifier + 'static,
{
    respond(StatusCode::OK, service.listing_view(&ListingId(listing_id)))
}

pub(crate) async fn close_listing_handler<S, N>(
    State(service): SharedService<S, N>,
    headers: HeaderMap,
    Path(listing_id): Path<String>,
) -> Response
where
    S: LedgerStore + 'static,
    N: Notifier + 'static,
{
    let actor = actor_or_return!(headers);
    respond(
        StatusCode::OK,
        service.close_listing(&actor, &ListingId(listing_id)),
    )
}

pub(crate) async fn submit_handler<S, N>(
    State(service): SharedService<S, N>,
    headers: HeaderMap,
    Json(submission): Json<ApplicationSubmission>,
) -> Response
where
    S: LedgerStore + 'static,
    N: Notifier + 'static,
{
    let actor = actor_or_return!(headers);
    respond(
        StatusCode::CREATED,
        service.submit_application(&actor, submission),
    )
}

pub(crate) async fn list_applications_handler<S, N>(
    State(service): SharedService<S, N>,
    headers: HeaderMap,
    Query(query): Query<ApplicationsQuery>,
) -> Response
where
    S: LedgerStore + 'static,
    N: Notifier + 'static,
{
    let actor = actor_or_return!(headers);
    let result = match query.listing_id {
        Some(listing_id) => service.applications_for_listing(&actor, &listing_id),
        None => service.applications_for_student(&actor),
    };
    respond(StatusCode::OK, result)
}

pub(crate) async fn application_handler<S, N>(
    State(service): SharedService<S, N>,
    headers: HeaderMap,
    Path(application_id): Path<String>,
) -> Response
where
    S: LedgerStore + 'static,
    N: Notifier + 'static,
{
    let actor = actor_or_return!(headers);
    respond(
        StatusCode::OK,
        service.application(&actor, &ApplicationId(application_id)),
    )
}

pub(crate) async fn review_handler<S, N>(
    State(service): SharedService<S, N>,
    headers: HeaderMap,
    Path(application_id): Path<String>,
    Json(decision): Json<ReviewDecision>,
) -> Response
where
    S: LedgerStore + 'static,
    N: Notifier + 'static,
{
    let actor = actor_or_return!(headers);
    respond(
        StatusCode::OK,
        service.review_application(&actor, &ApplicationId(application_id), decision),
    )
}

pub(crate) async fn withdraw_handler<S, N>(
    State(service): SharedService<S, N>,
    headers: HeaderMap,
    Path(application_id): Path<String>,
) -> Response
where
    S: LedgerStore + 'static,
    N: Notifier + 'static,
{
    let actor = actor_or_return!(headers);
    respond(
        StatusCode::OK,
        service.withdraw_application(&actor, &ApplicationId(application_id)),
    )
}

pub(crate) async fn issue_admissions_handler<S, N>(
    State(service): SharedService<S, N>,
    headers: HeaderMap,
    Json(request): Json<AdmissionRequest>,
) -> Response
where
    S: LedgerStore + 'static,
    N: Notifier + 'static,
{
    let actor = actor_or_return!(headers);
    respond(
        StatusCode::CREATED,
        service.issue_admission_offers(&actor, request),
    )
}

pub(crate) async fn respond_handler<S, N>(
    State(service): SharedService<S, N>,
    headers: HeaderMap,
    Json(response): Json<AdmissionResponse>,
) -> Response
where
    S: LedgerStore + 'static,
    N: Notifier + 'static,
{
    let actor = actor_or_return!(headers);
    respond(StatusCode::OK, service.respond_to_admission(&actor, response))
}

pub(crate) async fn list_admissions_handler<S, N>(
    State(service): SharedService<S, N>,
    headers: HeaderMap,
) -> Response
where
    S: LedgerStore + 'static,
    N: Notifier + 'static,
{
    let actor = actor_or_return!(headers);
    respond(StatusCode::OK, service.admissions_for_actor(&actor))
}
