use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::warn;

use super::domain::UserId;
use super::error::LifecycleError;
use super::notify::{Notification, Notifier};
use super::policy::LifecyclePolicy;
use super::search::ListingSearch;
use super::store::LedgerStore;

/// Source of "now" for every timestamp the lifecycle writes.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Service composing the ledger store, notification hook, and lifecycle policy. Operations
/// are grouped by concern in `directory`, `catalog`, `ledger`, `review`, and `admissions`.
pub struct EnrollmentService<S, N> {
    pub(crate) store: Arc<S>,
    pub(crate) notifier: Arc<N>,
    pub(crate) policy: LifecyclePolicy,
    pub(crate) clock: Arc<dyn Clock>,
    pub(crate) search_index: Option<Arc<dyn ListingSearch>>,
}

impl<S, N> Clone for EnrollmentService<S, N> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            notifier: Arc::clone(&self.notifier),
            policy: self.policy,
            clock: Arc::clone(&self.clock),
            search_index: self.search_index.clone(),
        }
    }
}

static ID_SEQUENCE: AtomicU64 = AtomicU64::new(1);

pub(crate) fn next_id(prefix: &str) -> String {
    let id = ID_SEQUENCE.fetch_add(1, Ordering::Relaxed);
    format!("{prefix}-{id:06}")
}

impl<S, N> EnrollmentService<S, N>
where
    S: LedgerStore + 'static,
    N: Notifier + 'static,
{
    pub fn new(store: Arc<S>, notifier: Arc<N>, policy: LifecyclePolicy) -> Self {
        Self {
            store,
            notifier,
            policy,
            clock: Arc::new(SystemClock),
            search_index: None,
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Attach an external full-text index. Store scans remain the fallback.
    pub fn with_search_index(mut self, index: Arc<dyn ListingSearch>) -> Self {
        self.search_index = Some(index);
        self
    }

    pub fn policy(&self) -> &LifecyclePolicy {
        &self.policy
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    pub(crate) fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    /// Best-effort delivery. Failures are logged and never reach the caller.
    pub(crate) fn dispatch(&self, notification: Notification) {
        let template = notification.template.label();
        if let Err(err) = self.notifier.notify(notification) {
            warn!(template, error = %err, "notification dispatch failed");
        }
    }
}

/// Ownership guard shared by every owner-gated mutation: load the resource, extract its
/// owner field, and compare it with the acting user.
pub(crate) fn authorize_owner<'r, R, F>(
    actor: &UserId,
    resource: &'r R,
    owner_of: F,
    action: &'static str,
) -> Result<&'r R, LifecycleError>
where
    F: Fn(&R) -> &UserId,
{
    if owner_of(resource) == actor {
        Ok(resource)
    } else {
        Err(LifecycleError::forbidden(actor, action))
    }
}

/// Loader variant of [`authorize_owner`] for resources that may be absent.
pub(crate) fn load_owned<R, L, F>(
    actor: &UserId,
    entity: &'static str,
    id: &impl std::fmt::Display,
    load: L,
    owner_of: F,
    action: &'static str,
) -> Result<R, LifecycleError>
where
    L: FnOnce() -> Option<R>,
    F: Fn(&R) -> &UserId,
{
    let resource = load().ok_or_else(|| LifecycleError::not_found(entity, id))?;
    authorize_owner(actor, &resource, owner_of, action)?;
    Ok(resource)
}
