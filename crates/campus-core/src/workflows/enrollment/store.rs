use super::domain::{
    Admission, AdmissionId, Application, ApplicationId, ApplicationStatus, Listing, ListingId,
    User, UserId,
};
use super::error::LifecycleError;

/// Read access to the ledger inside a store scope.
pub trait LedgerView {
    fn user(&self, id: &UserId) -> Option<User>;
    fn users(&self) -> Vec<User>;
    fn listing(&self, id: &ListingId) -> Option<Listing>;
    fn listings(&self) -> Vec<Listing>;
    fn application(&self, id: &ApplicationId) -> Option<Application>;
    fn applications_by_student(&self, student: &UserId) -> Vec<Application>;
    fn applications_for_listing(&self, listing: &ListingId) -> Vec<Application>;
    fn admission(&self, id: &AdmissionId) -> Option<Admission>;
    fn admissions_by_student(&self, student: &UserId) -> Vec<Admission>;
    fn admissions_by_institution(&self, institution: &UserId) -> Vec<Admission>;

    fn accepted_count(&self, listing: &ListingId) -> u32 {
        self.applications_for_listing(listing)
            .iter()
            .filter(|application| application.status == ApplicationStatus::Accepted)
            .count() as u32
    }
}

/// Write access granted for the duration of one transaction.
pub trait LedgerTxn: LedgerView {
    fn put_user(&mut self, user: User);
    fn put_listing(&mut self, listing: Listing);
    fn put_application(&mut self, application: Application);
    fn put_admission(&mut self, admission: Admission);
}

/// Storage abstraction so the service can run against any backend offering serializable
/// transactions. Every write made inside `transact` commits together or not at all.
pub trait LedgerStore: Send + Sync {
    fn read<T, F>(&self, f: F) -> Result<T, LifecycleError>
    where
        F: FnOnce(&dyn LedgerView) -> Result<T, LifecycleError>;

    fn transact<T, F>(&self, f: F) -> Result<T, LifecycleError>
    where
        F: FnOnce(&mut dyn LedgerTxn) -> Result<T, LifecycleError>;
}
