use std::sync::{Arc, Mutex};

use axum::response::Response;
use chrono::{DateTime, Duration, TimeZone, Utc};
use serde_json::Value;

use crate::workflows::enrollment::domain::{
    ApplicationSubmission, ApprovalStatus, Listing, ListingKind, NewListing, RegisterUser, Role,
    User, UserId, UserProfile,
};
use crate::workflows::enrollment::error::{LifecycleError, StoreError};
use crate::workflows::enrollment::notify::{Notification, Notifier, NotifyError};
use crate::workflows::enrollment::policy::LifecyclePolicy;
use crate::workflows::enrollment::service::{Clock, EnrollmentService};
use crate::workflows::enrollment::store::{LedgerStore, LedgerTxn, LedgerView};
use crate::workflows::enrollment::InMemoryLedger;

pub(super) const ADMIN: &str = "admin-root";

pub(super) fn start_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, 1, 9, 0, 0).unwrap()
}

/// Clock that only moves when a test advances it.
#[derive(Debug)]
pub(super) struct ManualClock {
    now: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    pub(super) fn new(now: DateTime<Utc>) -> Self {
        Self {
            now: Mutex::new(now),
        }
    }

    pub(super) fn advance(&self, by: Duration) {
        let mut guard = self.now.lock().expect("clock mutex poisoned");
        *guard += by;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().expect("clock mutex poisoned")
    }
}

#[derive(Default, Clone)]
pub(super) struct MemoryNotifier {
    events: Arc<Mutex<Vec<Notification>>>,
}

impl MemoryNotifier {
    pub(super) fn events(&self) -> Vec<Notification> {
        self.events.lock().expect("notifier mutex poisoned").clone()
    }
}

impl Notifier for MemoryNotifier {
    fn notify(&self, notification: Notification) -> Result<(), NotifyError> {
        self.events
            .lock()
            .expect("notifier mutex poisoned")
            .push(notification);
        Ok(())
    }
}

pub(super) struct FailingNotifier;

impl Notifier for FailingNotifier {
    fn notify(&self, _notification: Notification) -> Result<(), NotifyError> {
        Err(NotifyError::Transport("smtp offline".to_string()))
    }
}

pub(super) struct UnavailableStore;

impl LedgerStore for UnavailableStore {
    fn read<T, F>(&self, _f: F) -> Result<T, LifecycleError>
    where
        F: FnOnce(&dyn LedgerView) -> Result<T, LifecycleError>,
    {
        Err(StoreError::Unavailable("database offline".to_string()).into())
    }

    fn transact<T, F>(&self, _f: F) -> Result<T, LifecycleError>
    where
        F: FnOnce(&mut dyn LedgerTxn) -> Result<T, LifecycleError>,
    {
        Err(StoreError::Unavailable("database offline".to_string()).into())
    }
}

pub(super) type MemoryService = EnrollmentService<InMemoryLedger, MemoryNotifier>;

pub(super) struct Fixture {
    pub(super) service: Arc<MemoryService>,
    pub(super) notifier: Arc<MemoryNotifier>,
    pub(super) clock: Arc<ManualClock>,
}

impl Fixture {
    pub(super) fn new() -> Self {
        Self::with_policy(LifecyclePolicy::default())
    }

    pub(super) fn with_policy(policy: LifecyclePolicy) -> Self {
        let notifier = Arc::new(MemoryNotifier::default());
        let clock = Arc::new(ManualClock::new(start_time()));
        let service = EnrollmentService::new(Arc::new(InMemoryLedger::new()), notifier.clone(), policy)
            .with_clock(clock.clone());
        service
            .bootstrap_admin(UserId::new(ADMIN), "root@campus.test")
            .expect("admin bootstrap");

        Self {
            service: Arc::new(service),
            notifier,
            clock,
        }
    }

    pub(super) fn admin(&self) -> UserId {
        UserId::new(ADMIN)
    }

    fn register(&self, role: Role, name: &str) -> User {
        self.service
            .register_user(RegisterUser {
                role,
                profile: profile(name),
            })
            .expect("registration succeeds")
    }

    pub(super) fn student(&self, name: &str) -> UserId {
        self.register(Role::Student, name).id
    }

    /// Registered and approved institute.
    pub(super) fn institute(&self, name: &str) -> UserId {
        let user = self.register(Role::Institute, name);
        self.service
            .set_approval(&self.admin(), &user.id, ApprovalStatus::Approved)
            .expect("approval succeeds");
        user.id
    }

    pub(super) fn company(&self, name: &str) -> UserId {
        let user = self.register(Role::Company, name);
        self.service
            .set_approval(&self.admin(), &user.id, ApprovalStatus::Approved)
            .expect("approval succeeds");
        user.id
    }

    pub(super) fn course(&self, institute: &UserId, seats: u32) -> Listing {
        self.service
            .create_listing(institute, new_listing(ListingKind::Course, Some(seats)))
            .expect("course created")
    }

    pub(super) fn job(&self, company: &UserId, positions: Option<u32>) -> Listing {
        self.service
            .create_listing(company, new_listing(ListingKind::Job, positions))
            .expect("job created")
    }
}

pub(super) fn profile(name: &str) -> UserProfile {
    let slug = name.to_lowercase().replace(' ', ".");
    UserProfile {
        name: name.to_string(),
        email: format!("{slug}@example.test"),
        headline: Some(format!("{name} headline")),
        location: Some("Pune".to_string()),
        skills: vec!["rust".to_string()],
    }
}

pub(super) fn new_listing(kind: ListingKind, capacity: Option<u32>) -> NewListing {
    NewListing {
        kind,
        title: format!("{} listing", kind.label()),
        description: "Open to all".to_string(),
        location: Some("Pune".to_string()),
        skills: vec!["rust".to_string()],
        capacity,
        deadline: None,
    }
}

pub(super) fn apply_to(listing: &Listing) -> ApplicationSubmission {
    ApplicationSubmission {
        target_id: listing.id.clone(),
        target_type: listing.kind,
        cover_letter: Some("I would like to join.".to_string()),
        documents: Vec::new(),
    }
}

pub(super) async fn read_json_body(response: Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), 1024 * 1024)
        .await
        .expect("read body");
    serde_json::from_slice(&body).expect("json payload")
}
