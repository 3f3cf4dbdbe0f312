use std::collections::{BTreeMap, HashMap};
use std::sync::Mutex;

use super::domain::{
    Admission, AdmissionId, Application, ApplicationId, Listing, ListingId, User, UserId,
};
use super::error::{LifecycleError, StoreError};
use super::store::{LedgerStore, LedgerTxn, LedgerView};

#[derive(Debug, Default)]
struct LedgerState {
    users: HashMap<UserId, User>,
    listings: BTreeMap<ListingId, Listing>,
    applications: BTreeMap<ApplicationId, Application>,
    admissions: BTreeMap<AdmissionId, Admission>,
}

impl LedgerState {
    fn apply(&mut self, writes: WriteSet) {
        self.users.extend(writes.users);
        self.listings.extend(writes.listings);
        self.applications.extend(writes.applications);
        self.admissions.extend(writes.admissions);
    }
}

/// Records written during one transaction, keyed like the committed maps.
#[derive(Debug, Default)]
struct WriteSet {
    users: HashMap<UserId, User>,
    listings: BTreeMap<ListingId, Listing>,
    applications: BTreeMap<ApplicationId, Application>,
    admissions: BTreeMap<AdmissionId, Admission>,
}

/// Transaction view: reads consult the write set first, then the committed state.
struct StagedTxn<'a> {
    committed: &'a LedgerState,
    writes: WriteSet,
}

impl StagedTxn<'_> {
    fn merged<K, V, P>(
        committed: &BTreeMap<K, V>,
        staged: &BTreeMap<K, V>,
        keep: P,
    ) -> Vec<V>
    where
        K: Ord,
        V: Clone,
        P: Fn(&V) -> bool,
    {
        let mut merged: BTreeMap<&K, &V> = committed.iter().collect();
        merged.extend(staged.iter());
        merged
            .into_values()
            .filter(|value| keep(*value))
            .cloned()
            .collect()
    }
}

/// Process-local ledger. A single mutex serializes transactions; writes are staged in a
/// per-transaction write set and applied to the committed maps only when the closure succeeds.
#[derive(Debug, Default)]
pub struct InMemoryLedger {
    state: Mutex<LedgerState>,
}

impl InMemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }

    fn poisoned() -> LifecycleError {
        StoreError::Unavailable("ledger mutex poisoned".to_string()).into()
    }
}

impl LedgerStore for InMemoryLedger {
    fn read<T, F>(&self, f: F) -> Result<T, LifecycleError>
    where
        F: FnOnce(&dyn LedgerView) -> Result<T, LifecycleError>,
    {
        let guard = self.state.lock().map_err(|_| Self::poisoned())?;
        f(&*guard)
    }

    fn transact<T, F>(&self, f: F) -> Result<T, LifecycleError>
    where
        F: FnOnce(&mut dyn LedgerTxn) -> Result<T, LifecycleError>,
    {
        let mut guard = self.state.lock().map_err(|_| Self::poisoned())?;
        let mut txn = StagedTxn {
            committed: &guard,
            writes: WriteSet::default(),
        };
        let outcome = f(&mut txn)?;
        let writes = txn.writes;
        guard.apply(writes);
        Ok(outcome)
    }
}

impl LedgerView for LedgerState {
    fn user(&self, id: &UserId) -> Option<User> {
        self.users.get(id).cloned()
    }

    fn users(&self) -> Vec<User> {
        let mut users: Vec<User> = self.users.values().cloned().collect();
        users.sort_by(|a, b| a.id.cmp(&b.id));
        users
    }

    fn listing(&self, id: &ListingId) -> Option<Listing> {
        self.listings.get(id).cloned()
    }

    fn listings(&self) -> Vec<Listing> {
        self.listings.values().cloned().collect()
    }

    fn application(&self, id: &ApplicationId) -> Option<Application> {
        self.applications.get(id).cloned()
    }

    fn applications_by_student(&self, student: &UserId) -> Vec<Application> {
        self.applications
            .values()
            .filter(|application| &application.student_id == student)
            .cloned()
            .collect()
    }

    fn applications_for_listing(&self, listing: &ListingId) -> Vec<Application> {
        self.applications
            .values()
            .filter(|application| &application.target_id == listing)
            .cloned()
            .collect()
    }

    fn admission(&self, id: &AdmissionId) -> Option<Admission> {
        self.admissions.get(id).cloned()
    }

    fn admissions_by_student(&self, student: &UserId) -> Vec<Admission> {
        self.admissions
            .values()
            .filter(|admission| &admission.student_id == student)
            .cloned()
            .collect()
    }

    fn admissions_by_institution(&self, institution: &UserId) -> Vec<Admission> {
        self.admissions
            .values()
            .filter(|admission| &admission.institution_id == institution)
            .cloned()
            .collect()
    }
}

impl LedgerView for StagedTxn<'_> {
    fn user(&self, id: &UserId) -> Option<User> {
        self.writes
            .users
            .get(id)
            .or_else(|| self.committed.users.get(id))
            .cloned()
    }

    fn users(&self) -> Vec<User> {
        let mut merged: HashMap<&UserId, &User> = self.committed.users.iter().collect();
        merged.extend(self.writes.users.iter());
        let mut users: Vec<User> = merged.into_values().cloned().collect();
        users.sort_by(|a, b| a.id.cmp(&b.id));
        users
    }

    fn listing(&self, id: &ListingId) -> Option<Listing> {
        self.writes
            .listings
            .get(id)
            .or_else(|| self.committed.listings.get(id))
            .cloned()
    }

    fn listings(&self) -> Vec<Listing> {
        Self::merged(&self.committed.listings, &self.writes.listings, |_| true)
    }

    fn application(&self, id: &ApplicationId) -> Option<Application> {
        self.writes
            .applications
            .get(id)
            .or_else(|| self.committed.applications.get(id))
            .cloned()
    }

    fn applications_by_student(&self, student: &UserId) -> Vec<Application> {
        Self::merged(
            &self.committed.applications,
            &self.writes.applications,
            |application| &application.student_id == student,
        )
    }

    fn applications_for_listing(&self, listing: &ListingId) -> Vec<Application> {
        Self::merged(
            &self.committed.applications,
            &self.writes.applications,
            |application| &application.target_id == listing,
        )
    }

    fn admission(&self, id: &AdmissionId) -> Option<Admission> {
        self.writes
            .admissions
            .get(id)
            .or_else(|| self.committed.admissions.get(id))
            .cloned()
    }

    fn admissions_by_student(&self, student: &UserId) -> Vec<Admission> {
        Self::merged(
            &self.committed.admissions,
            &self.writes.admissions,
            |admission| &admission.student_id == student,
        )
    }

    fn admissions_by_institution(&self, institution: &UserId) -> Vec<Admission> {
        Self::merged(
            &self.committed.admissions,
            &self.writes.admissions,
            |admission| &admission.institution_id == institution,
        )
    }
}

impl LedgerTxn for StagedTxn<'_> {
    fn put_user(&mut self, user: User) {
        self.writes.users.insert(user.id.clone(), user);
    }

    fn put_listing(&mut self, listing: Listing) {
        self.writes.listings.insert(listing.id.clone(), listing);
    }

    fn put_application(&mut self, application: Application) {
        self.writes
            .applications
            .insert(application.id.clone(), application);
    }

    fn put_admission(&mut self, admission: Admission) {
        self.writes.admissions.insert(admission.id.clone(), admission);
    }
}
