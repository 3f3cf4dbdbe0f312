use tracing::info;

use super::directory::require_role;
use super::domain::{
    Listing, ListingId, ListingKind, ListingStatus, ListingView, NewListing, UserId,
};
use super::error::LifecycleError;
use super::import::parse_listings;
use super::notify::Notifier;
use super::service::{load_owned, next_id, EnrollmentService};
use super::store::{LedgerStore, LedgerTxn, LedgerView};

const MAX_TITLE_LEN: usize = 200;

impl<S, N> EnrollmentService<S, N>
where
    S: LedgerStore + 'static,
    N: Notifier + 'static,
{
    /// Publish a course (institutes) or job (companies) listing.
    pub fn create_listing(
        &self,
        owner_id: &UserId,
        listing: NewListing,
    ) -> Result<Listing, LifecycleError> {
        validate_new_listing(&listing)?;
        let now = self.now();

        let created = self
            .store
            .transact(|txn| insert_listing(txn, owner_id, listing, now))?;

        info!(
            listing_id = %created.id,
            owner_id = %created.owner_id,
            kind = created.kind.label(),
            capacity = ?created.capacity,
            "listing published"
        );
        Ok(created)
    }

    /// Create every listing in a CSV export or none of them.
    pub fn import_listings(
        &self,
        owner_id: &UserId,
        csv: &str,
    ) -> Result<Vec<Listing>, LifecycleError> {
        let rows = parse_listings(csv.as_bytes())
            .map_err(|err| LifecycleError::validation(format!("invalid catalog CSV: {err}")))?;
        if rows.is_empty() {
            return Err(LifecycleError::validation("catalog CSV contains no rows"));
        }
        for (index, row) in rows.iter().enumerate() {
            validate_new_listing(row).map_err(|err| match err {
                LifecycleError::Validation(message) => {
                    LifecycleError::Validation(format!("row {}: {message}", index + 1))
                }
                other => other,
            })?;
        }
        let now = self.now();

        let created = self.store.transact(|txn| {
            rows.into_iter()
                .map(|row| insert_listing(&mut *txn, owner_id, row, now))
                .collect::<Result<Vec<_>, _>>()
        })?;

        info!(owner_id = %owner_id, count = created.len(), "catalog imported");
        Ok(created)
    }

    pub fn close_listing(
        &self,
        owner_id: &UserId,
        listing_id: &ListingId,
    ) -> Result<Listing, LifecycleError> {
        let closed = self.store.transact(|txn| {
            let mut listing = load_owned(
                owner_id,
                "listing",
                listing_id,
                || txn.listing(listing_id),
                |listing: &Listing| &listing.owner_id,
                "close this listing",
            )?;
            listing.status = ListingStatus::Closed;
            txn.put_listing(listing.clone());
            Ok(listing)
        })?;

        info!(listing_id = %closed.id, "listing closed");
        Ok(closed)
    }

    /// Listing with application aggregates computed from the ledger.
    pub fn listing_view(&self, listing_id: &ListingId) -> Result<ListingView, LifecycleError> {
        self.store.read(|view| {
            let listing = view
                .listing(listing_id)
                .ok_or_else(|| LifecycleError::not_found("listing", listing_id))?;
            Ok(build_listing_view(view, listing))
        })
    }
}

fn insert_listing(
    txn: &mut dyn LedgerTxn,
    owner_id: &UserId,
    listing: NewListing,
    now: chrono::DateTime<chrono::Utc>,
) -> Result<Listing, LifecycleError> {
    let required = listing.kind.owner_role();
    let owner = require_role(&*txn, owner_id, &[required], publish_action(listing.kind))?;
    if !owner.is_approved() {
        return Err(LifecycleError::forbidden(
            owner_id,
            "publish listings before approval",
        ));
    }

    let created = Listing {
        id: ListingId(next_id(listing.kind.label())),
        kind: listing.kind,
        owner_id: owner.id,
        title: listing.title.trim().to_string(),
        description: listing.description,
        location: listing.location,
        skills: listing.skills,
        capacity: listing.capacity,
        status: ListingStatus::Active,
        deadline: listing.deadline,
        created_at: now,
    };
    txn.put_listing(created.clone());
    Ok(created)
}

fn publish_action(kind: ListingKind) -> &'static str {
    match kind {
        ListingKind::Course => "publish courses",
        ListingKind::Job => "publish jobs",
    }
}

pub(crate) fn build_listing_view<V: LedgerView + ?Sized>(view: &V, listing: Listing) -> ListingView {
    let applications = view.applications_for_listing(&listing.id);
    let accepted_count = view.accepted_count(&listing.id);
    let seats_available = listing
        .capacity
        .map(|capacity| capacity.saturating_sub(accepted_count));

    ListingView {
        application_count: applications.len() as u32,
        accepted_count,
        seats_available,
        listing,
    }
}

fn validate_new_listing(listing: &NewListing) -> Result<(), LifecycleError> {
    let title = listing.title.trim();
    if title.is_empty() {
        return Err(LifecycleError::validation("listing title is required"));
    }
    if title.chars().count() > MAX_TITLE_LEN {
        return Err(LifecycleError::validation(format!(
            "listing title exceeds {MAX_TITLE_LEN} characters"
        )));
    }
    match (listing.kind, listing.capacity) {
        (ListingKind::Course, None) => {
            Err(LifecycleError::validation("course listings require a seat capacity"))
        }
        (_, Some(0)) => Err(LifecycleError::validation("capacity must be at least 1")),
        _ => Ok(()),
    }
}

